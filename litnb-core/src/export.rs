//! Export stream: the export-tagged cells handed to the module emitter.
//!
//! Collected before any stage runs, so later stages that clear exported
//! source cannot destroy it. Each entry keeps the cell's original index.

use crate::directives::EXPORT_KEYS;
use crate::document::Document;
use crate::syntax::{DeclarationKind, ExtractorRegistry, ParseError};

/// One exported code cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedCell {
    /// Index of the cell in the document as loaded
    pub offset: usize,
    /// Target module, from the directive or the document's `default_exp`
    pub module: Option<String>,
    pub source: String,
    pub language: String,
    /// Tagged `exporti`: exported but left out of the public manifest
    pub private: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportStream {
    cells: Vec<ExportedCell>,
    default_exp: Option<String>,
}

impl ExportStream {
    pub fn collect(doc: &Document) -> Self {
        let default_exp = doc
            .cells()
            .filter(|c| c.is_code())
            .find_map(|c| c.directives().value("default_exp").map(str::to_string));

        let cells = doc
            .cells()
            .filter(|c| c.is_code() && c.directives().contains_any(EXPORT_KEYS))
            .map(|c| {
                let directives = c.directives();
                let key = EXPORT_KEYS
                    .iter()
                    .find(|k| directives.contains(k))
                    .copied()
                    .unwrap_or("export");
                ExportedCell {
                    offset: c.index(),
                    module: directives
                        .value(key)
                        .map(str::to_string)
                        .or_else(|| default_exp.clone()),
                    source: c.text().to_string(),
                    language: c.language().to_string(),
                    private: key == "exporti",
                }
            })
            .collect();

        Self { cells, default_exp }
    }

    pub fn default_exp(&self) -> Option<&str> {
        self.default_exp.as_deref()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExportedCell> {
        self.cells.iter()
    }

    /// Distinct target modules, in first-seen order
    pub fn modules(&self) -> Vec<&str> {
        let mut modules: Vec<&str> = Vec::new();
        for module in self.cells.iter().filter_map(|c| c.module.as_deref()) {
            if !modules.contains(&module) {
                modules.push(module);
            }
        }
        modules
    }

    /// Public top-level names for an `__all__`-style manifest.
    ///
    /// `exporti` cells and private names are left out, as are methods
    /// patched onto other classes.
    pub fn public_names(&self, extractors: &ExtractorRegistry) -> Result<Vec<String>, ParseError> {
        let mut names: Vec<String> = Vec::new();
        for cell in self.cells.iter().filter(|c| !c.private) {
            if cell.source.starts_with('%') {
                continue;
            }
            let parsed = extractors.for_language(&cell.language).parse(&cell.source)?;
            for decl in parsed.public_declarations() {
                let patched = decl.kind != DeclarationKind::Alias && decl.doc_name != decl.name;
                if !patched && !names.contains(&decl.name) {
                    names.push(decl.name.clone());
                }
            }
        }
        Ok(names)
    }

    /// Cells as module text, each preceded by `{header} {offset}`
    pub fn render(&self, header: &str) -> String {
        let mut out = String::new();
        for cell in self.cells.iter().filter(|c| !c.source.trim().is_empty()) {
            out.push_str(&format!("\n\n{} {}\n{}", header, cell.offset, cell.source));
        }
        out
    }
}
