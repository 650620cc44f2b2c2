//! Stages that prepare the rendered document: banners, hidden cells and
//! the removal of exported source once nothing needs it anymore.

use crate::directives::comment_prefix;
use crate::document::{Cell, Document};
use crate::pipeline::{CellMut, PipelineContext, Stage, StageError};
use once_cell::sync::Lazy;
use regex::Regex;

pub const WARNING_BANNER: &str = "<!-- WARNING: THIS FILE WAS AUTOGENERATED! DO NOT EDIT! -->";

/// Directives whose cells are dropped from the rendered document
pub const HIDDEN_KEYS: &[&str] = &["export", "exporti", "hide", "default_exp"];

const SHOW_DOC_PREFIX: &str = "#|output: asis\n#| echo: false\n";

static SHOW_DOC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^show_doc").unwrap());

/// Inserts the autogenerated-file banner after the first cell
#[derive(Debug, Default)]
pub struct InsertWarning;

impl Stage for InsertWarning {
    fn name(&self) -> &str {
        "insert_warning"
    }

    fn begin(&mut self, doc: &mut Document, _ctx: &mut PipelineContext) -> Result<(), StageError> {
        doc.insert(1, Cell::markdown(WARNING_BANNER));
        Ok(())
    }
}

/// Clears cells tagged `hide`
#[derive(Debug, Default)]
pub struct Hide;

impl Stage for Hide {
    fn name(&self) -> &str {
        "hide"
    }

    fn wants(&self, cell: &Cell) -> bool {
        cell.directives().contains("hide")
    }

    fn cell(&mut self, cell: &mut CellMut<'_>, _ctx: &mut PipelineContext) -> Result<(), StageError> {
        cell.clear_source();
        Ok(())
    }
}

/// Drops source lines ending in a `hide_line` directive
#[derive(Debug, Default)]
pub struct HideLine;

static HIDE_LINE_HASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#\s*\|\s*hide_line\s*$").unwrap());
static HIDE_LINE_SLASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"//\s*\|\s*hide_line\s*$").unwrap());
static HIDE_LINE_DASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"--\s*\|\s*hide_line\s*$").unwrap());

fn hide_line_re(language: &str) -> &'static Regex {
    match comment_prefix(language) {
        "//" => &HIDE_LINE_SLASH_RE,
        "--" => &HIDE_LINE_DASH_RE,
        _ => &HIDE_LINE_HASH_RE,
    }
}

impl Stage for HideLine {
    fn name(&self) -> &str {
        "hide_line"
    }

    fn wants(&self, cell: &Cell) -> bool {
        cell.is_code() && cell.text().contains("hide_line")
    }

    fn cell(&mut self, cell: &mut CellMut<'_>, _ctx: &mut PipelineContext) -> Result<(), StageError> {
        let re = hide_line_re(cell.language());
        if !cell.text().lines().any(|l| re.is_match(l)) {
            return Ok(());
        }
        let kept: Vec<&str> = cell.text().lines().filter(|l| !re.is_match(l)).collect();
        let source = kept.join("\n");
        cell.set_source(source);
        Ok(())
    }
}

/// Marks documentation cells so only their rendered output is shown
#[derive(Debug, Default)]
pub struct CleanShowDoc;

impl Stage for CleanShowDoc {
    fn name(&self) -> &str {
        "clean_show_doc"
    }

    fn after(&self) -> &[&str] {
        &["add_show_docs"]
    }

    fn wants(&self, cell: &Cell) -> bool {
        cell.is_code() && SHOW_DOC_RE.is_match(cell.text())
    }

    fn cell(&mut self, cell: &mut CellMut<'_>, _ctx: &mut PipelineContext) -> Result<(), StageError> {
        let source = format!("{}{}", SHOW_DOC_PREFIX, cell.text());
        cell.set_source(source);
        Ok(())
    }
}

/// Clears exported and hidden cells
#[derive(Debug, Default)]
pub struct RmExport;

impl Stage for RmExport {
    fn name(&self) -> &str {
        "rm_export"
    }

    fn after(&self) -> &[&str] {
        &["add_show_docs", "exec_show_docs"]
    }

    fn wants(&self, cell: &Cell) -> bool {
        cell.directives().contains_any(HIDDEN_KEYS)
    }

    fn cell(&mut self, cell: &mut CellMut<'_>, _ctx: &mut PipelineContext) -> Result<(), StageError> {
        tracing::debug!(cell = cell.index(), "Removing exported source");
        cell.clear_source();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Pipeline, PipelineError};
    use crate::syntax::ExtractorRegistry;
    use serde_json::Map;

    fn run(stage: Box<dyn Stage>, cells: Vec<Cell>) -> Document {
        let mut pipeline = Pipeline::new(vec![stage]).unwrap();
        pipeline
            .run(
                Document::new(cells, Map::new()),
                PipelineContext::new("python", ExtractorRegistry::new()),
            )
            .unwrap()
            .document
    }

    #[test]
    fn test_warning_after_first_cell() {
        let doc = run(
            Box::new(InsertWarning),
            vec![Cell::raw("---\ntitle: x\n---"), Cell::code("x = 1")],
        );
        assert_eq!(doc.get(1).unwrap().text(), WARNING_BANNER);

        let empty = run(Box::new(InsertWarning), vec![]);
        assert_eq!(empty.get(0).unwrap().text(), WARNING_BANNER);
    }

    #[test]
    fn test_hide_keeps_placeholder() {
        let doc = run(Box::new(Hide), vec![Cell::code("#| hide\nsecret = 1"), Cell::code("x")]);
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.get(0).unwrap().source(), None);
        assert!(doc.get(0).unwrap().is_empty());
        assert_eq!(doc.get(1).unwrap().text(), "x");
    }

    #[test]
    fn test_hide_line() {
        let doc = run(
            Box::new(HideLine),
            vec![Cell::code("a = 1\nb = 2 #| hide_line\nc = 3")],
        );
        assert_eq!(doc.get(0).unwrap().text(), "a = 1\nc = 3");
    }

    #[test]
    fn test_hide_line_uses_language_prefix() {
        let mut cell = Cell::code("let a = 1; //| hide_line\nlet b = 2; #| hide_line");
        cell.set_language("javascript");
        let doc = run(Box::new(HideLine), vec![cell]);
        assert_eq!(doc.get(0).unwrap().text(), "let b = 2; #| hide_line");
    }

    #[test]
    fn test_hide_line_pattern_per_comment_prefix() {
        assert!(std::ptr::eq(hide_line_re("python"), hide_line_re("r")));
        assert!(std::ptr::eq(hide_line_re("rust"), hide_line_re("js")));
        assert!(hide_line_re("sql").is_match("select 1 --| hide_line"));
        assert!(!hide_line_re("sql").is_match("select 1 #| hide_line"));
        assert!(hide_line_re("python").is_match("x = 1 # | hide_line  "));
    }

    #[test]
    fn test_clean_show_doc() {
        let doc = run(
            Box::new(CleanShowDoc),
            vec![Cell::code("show_doc(f)"), Cell::code("x = show_doc")],
        );
        let cleaned = doc.get(0).unwrap();
        assert_eq!(cleaned.text(), "#|output: asis\n#| echo: false\nshow_doc(f)");
        assert_eq!(cleaned.directives().value("output"), Some("asis"));
        assert!(cleaned.directives().is_false("echo"));
        assert_eq!(doc.get(1).unwrap().text(), "x = show_doc");
    }

    #[test]
    fn test_rm_export() {
        let doc = run(
            Box::new(RmExport),
            vec![
                Cell::code("#| default_exp core"),
                Cell::code("#| export\ndef f(): pass"),
                Cell::code("#| exports\ndef g(): pass"),
                Cell::code("show_doc(f)"),
            ],
        );
        let kept: Vec<Option<&str>> = doc.cells().map(|c| c.source()).collect();
        assert_eq!(
            kept,
            vec![None, None, Some("#| exports\ndef g(): pass"), Some("show_doc(f)")]
        );
    }

    #[test]
    fn test_rm_export_must_follow_show_docs() {
        let err = Pipeline::new(vec![
            Box::new(RmExport),
            Box::new(crate::processors::AddShowDocs::new()),
        ])
        .unwrap_err();
        match err {
            PipelineError::OutOfOrder { stage, dependency } => {
                assert_eq!(stage, "rm_export");
                assert_eq!(dependency, "add_show_docs");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
