use crate::document::{Cell, Document};
use crate::pipeline::{CellMut, PipelineContext, Stage, StageError};
use once_cell::sync::Lazy;
use regex::Regex;

static LANG_MAGIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*%%\s*(bash|html|javascript|js|latex|markdown|perl|ruby|sh|svg)\s*$")
        .unwrap()
});

/// Language named by a `%%lang` cell magic, if any
pub fn magic_language(source: &str) -> Option<&str> {
    LANG_MAGIC_RE
        .captures(source)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Records each code cell's language in its metadata
#[derive(Debug, Default)]
pub struct PopulateLanguage {
    language: String,
}

impl PopulateLanguage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Stage for PopulateLanguage {
    fn name(&self) -> &str {
        "populate_language"
    }

    fn wants(&self, cell: &Cell) -> bool {
        cell.is_code()
    }

    fn begin(&mut self, doc: &mut Document, _ctx: &mut PipelineContext) -> Result<(), StageError> {
        self.language = doc.primary_language();
        Ok(())
    }

    fn cell(&mut self, cell: &mut CellMut<'_>, _ctx: &mut PipelineContext) -> Result<(), StageError> {
        let language = magic_language(cell.text())
            .unwrap_or(self.language.as_str())
            .to_string();
        cell.set_language(language);
        Ok(())
    }
}
