//! The `add_show_docs` stage.

use crate::directives::DOCUMENTED_KEYS;
use crate::document::{Cell, Document};
use crate::pipeline::{Annotation, CellMut, PipelineContext, Stage, StageError, VisitOrder};
use crate::syntax::SHOW_DOC;
use std::collections::HashSet;

/// Adds a `show_doc(name)` cell after each exported declaration that is
/// not already documented somewhere in the document.
#[derive(Debug, Default)]
pub struct AddShowDocs {
    shown: HashSet<String>,
}

impl AddShowDocs {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Code cell tagged for documentation and not excluded with `include: false`
pub fn wants_doc(cell: &Cell) -> bool {
    let directives = cell.directives();
    cell.is_code()
        && !cell.is_empty()
        && directives.contains_any(DOCUMENTED_KEYS)
        && !directives.is_false("include")
}

pub fn show_doc_source(doc_name: &str) -> String {
    format!("{}({})", SHOW_DOC, doc_name)
}

impl Stage for AddShowDocs {
    fn name(&self) -> &str {
        "add_show_docs"
    }

    fn provides(&self) -> &[Annotation] {
        &[Annotation::HasDocs]
    }

    fn visit_order(&self) -> VisitOrder {
        VisitOrder::Reverse
    }

    fn wants(&self, cell: &Cell) -> bool {
        wants_doc(cell)
    }

    fn begin(&mut self, doc: &mut Document, ctx: &mut PipelineContext) -> Result<(), StageError> {
        self.shown.clear();
        let mut exports = 0;

        for id in doc.ids() {
            let Some(cell) = doc.cell_mut(id) else {
                continue;
            };
            if !cell.is_code() {
                continue;
            }
            let extractor = ctx.extractor_for(cell.language());
            let parsed = cell.parsed(extractor.as_ref())?;
            self.shown.extend(parsed.doc_references.iter().cloned());
            if wants_doc(cell) {
                exports += 1;
            }
        }

        tracing::debug!(exports, documented = self.shown.len(), "Collected documentation state");
        ctx.has_docs = Some(!self.shown.is_empty() || exports > 0);
        Ok(())
    }

    fn cell(&mut self, cell: &mut CellMut<'_>, ctx: &mut PipelineContext) -> Result<(), StageError> {
        if !cell.language().eq_ignore_ascii_case(ctx.primary_language()) {
            return Err(StageError::Classification {
                language: cell.language().to_string(),
                cell_source: cell.text().to_string(),
                cell_index: cell.index(),
            });
        }

        let extractor = ctx.extractor_for(ctx.primary_language());
        let parsed = cell.parsed(extractor.as_ref())?;
        let names: Vec<&str> = parsed
            .public_declarations()
            .map(|d| d.doc_name.as_str())
            .filter(|name| !self.shown.contains(*name))
            .collect();

        for name in names {
            tracing::debug!(cell = cell.index(), name, "Inserting show_doc");
            cell.insert_after(Cell::code(show_doc_source(name)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Pipeline, PipelineError};
    use crate::syntax::{
        Declaration, DeclarationExtractor, DeclarationKind, ExtractorRegistry, ParseError,
        ParsedSource,
    };
    use serde_json::Map;
    use std::sync::Arc;

    /// Line-based stand-in for a real parser: `def name` / `class name`
    /// declare, `show_doc(x)` references
    struct LineExtractor;

    impl DeclarationExtractor for LineExtractor {
        fn language(&self) -> &str {
            "python"
        }

        fn parse(&self, source: &str) -> Result<ParsedSource, ParseError> {
            let mut parsed = ParsedSource::default();
            for (n, line) in source.lines().enumerate() {
                if let Some(rest) = line.strip_prefix("def ").or(line.strip_prefix("class ")) {
                    let name: String = rest
                        .chars()
                        .take_while(|c| c.is_alphanumeric() || *c == '_')
                        .collect();
                    parsed
                        .declarations
                        .push(Declaration::new(name, DeclarationKind::Function, n + 1));
                } else if let Some(rest) = line.strip_prefix("show_doc(") {
                    parsed
                        .doc_references
                        .push(rest.trim_end_matches(')').to_string());
                }
                parsed.statement_count += 1;
            }
            Ok(parsed)
        }
    }

    fn run(cells: Vec<Cell>) -> Result<crate::pipeline::PipelineOutput, PipelineError> {
        let mut pipeline = Pipeline::new(vec![Box::new(AddShowDocs::new())])?;
        let registry = ExtractorRegistry::new().with(Arc::new(LineExtractor));
        pipeline.run(
            Document::new(cells, Map::new()),
            PipelineContext::new("python", registry),
        )
    }

    fn texts(out: &crate::pipeline::PipelineOutput) -> Vec<&str> {
        out.document.cells().map(|c| c.text()).collect()
    }

    #[test]
    fn test_one_reference_per_public_declaration() {
        let out = run(vec![
            Cell::code("#| export\ndef a(): pass\ndef _hidden(): pass\nclass B: pass"),
            Cell::markdown("prose"),
            Cell::code("#| export\ndef c(): pass"),
        ])
        .unwrap();

        assert_eq!(
            texts(&out),
            vec![
                "#| export\ndef a(): pass\ndef _hidden(): pass\nclass B: pass",
                "show_doc(a)",
                "show_doc(B)",
                "prose",
                "#| export\ndef c(): pass",
                "show_doc(c)",
            ]
        );
        assert!(out.has_docs);
    }

    #[test]
    fn test_anchor_positions_shift_by_prior_insertions() {
        let cells = vec![
            Cell::code("#| export\ndef a(): pass\ndef b(): pass"),
            Cell::code("#| export\ndef c(): pass"),
            Cell::code("#| export\ndef d(): pass"),
        ];
        let out = run(cells).unwrap();
        let anchors: Vec<usize> = out
            .document
            .cells()
            .filter(|c| c.directives().contains("export"))
            .map(|c| c.index())
            .collect();
        assert_eq!(anchors, vec![0, 3, 5]);
    }

    #[test]
    fn test_existing_references_not_duplicated() {
        let out = run(vec![
            Cell::code("#| export\ndef a(): pass\ndef b(): pass"),
            Cell::code("show_doc(b)"),
        ])
        .unwrap();
        let refs = texts(&out).iter().filter(|t| **t == "show_doc(b)").count();
        assert_eq!(refs, 1);
        assert_eq!(texts(&out)[1], "show_doc(a)");
    }

    #[test]
    fn test_include_false_and_exporti_are_skipped() {
        let out = run(vec![
            Cell::code("#| export\n#| include: false\ndef a(): pass"),
            Cell::code("#| exporti\ndef b(): pass"),
        ])
        .unwrap();
        assert_eq!(out.document.len(), 2);
        assert!(!out.has_docs);
    }

    #[test]
    fn test_exec_doc_cells_are_documented() {
        let out = run(vec![Cell::code("#| exec_doc\ndef a(): pass")]).unwrap();
        assert_eq!(texts(&out)[1], "show_doc(a)");
    }

    #[test]
    fn test_references_alone_set_has_docs() {
        let out = run(vec![Cell::code("show_doc(x)")]).unwrap();
        assert!(out.has_docs);
    }

    #[test]
    fn test_non_primary_language_is_a_classification_fault() {
        let mut cell = Cell::code("#| export\necho hi");
        cell.set_language("bash");
        let err = run(vec![Cell::markdown("intro"), cell]).unwrap_err();

        match err.stage_error() {
            Some(StageError::Classification {
                language,
                cell_source,
                cell_index,
            }) => {
                assert_eq!(language, "bash");
                assert_eq!(cell_source, "#| export\necho hi");
                assert_eq!(*cell_index, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
