//! The `frontmatter` stage.

use crate::document::{Cell, CellId, Document, DocumentError};
use crate::frontmatter::{
    infer_from_markdown, is_frontmatter, is_title_cell, parse_yaml, Frontmatter,
};
use crate::notebook::CellType;
use crate::pipeline::{Annotation, PipelineContext, Stage, StageError};

/// Resolves front matter and re-inserts it as the first cell.
///
/// An explicit `---` raw cell wins. Later fenced raw cells only fill keys
/// the first one lacks. A `# Title` markdown cell is only consulted when
/// no explicit block has a title, and its keys never replace explicit
/// ones. Every source cell is cleared, so the document ends up with at
/// most one front matter block.
#[derive(Debug, Default)]
pub struct FrontmatterStage;

impl FrontmatterStage {
    pub fn new() -> Self {
        Self
    }
}

fn find_cell(doc: &Document, f: impl Fn(&Cell) -> bool) -> Option<CellId> {
    doc.cells().find(|c| f(c)).map(Cell::id)
}

impl Stage for FrontmatterStage {
    fn name(&self) -> &str {
        "frontmatter"
    }

    fn provides(&self) -> &[Annotation] {
        &[Annotation::Frontmatter]
    }

    fn begin(&mut self, doc: &mut Document, ctx: &mut PipelineContext) -> Result<(), StageError> {
        let mut fm = Frontmatter::new();

        let explicit: Vec<CellId> = doc
            .cells()
            .filter(|c| c.cell_type() == CellType::Raw && c.source().is_some_and(is_frontmatter))
            .map(Cell::id)
            .collect();
        for id in explicit {
            let cell = doc.cell_mut(id).ok_or(DocumentError::UnknownCell(id))?;
            let block = parse_yaml(cell.text())?;
            tracing::debug!(cell = cell.index(), keys = block.len(), "Explicit front matter");
            fm.merge_missing(block);
            cell.clear_source();
        }

        if fm.title().is_none() {
            let title_cell = find_cell(doc, |c| {
                c.cell_type() == CellType::Markdown && is_title_cell(c.text())
            });
            if let Some(id) = title_cell {
                let cell = doc.cell_mut(id).ok_or(DocumentError::UnknownCell(id))?;
                if let Some(inferred) = infer_from_markdown(cell.text())? {
                    tracing::debug!(cell = cell.index(), "Inferred front matter from title cell");
                    fm.merge_missing(inferred);
                    cell.clear_source();
                }
            }
        }

        fm.apply_aliases();
        if let Some(block) = fm.filtered().to_block()? {
            doc.insert(0, Cell::raw(block));
        }
        ctx.frontmatter = Some(fm);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use crate::syntax::ExtractorRegistry;
    use serde_json::Map;

    fn run(cells: Vec<Cell>) -> crate::pipeline::PipelineOutput {
        let mut pipeline = Pipeline::new(vec![Box::new(FrontmatterStage::new())]).unwrap();
        pipeline
            .run(
                Document::new(cells, Map::new()),
                PipelineContext::new("python", ExtractorRegistry::new()),
            )
            .unwrap()
    }

    #[test]
    fn test_inferred_block_becomes_first_cell() {
        let out = run(vec![
            Cell::markdown("# Foo\n> bar"),
            Cell::code("#| export\ndef baz(): pass"),
        ]);
        let first = out.document.get(0).unwrap();
        assert_eq!(first.cell_type(), CellType::Raw);
        assert_eq!(first.text(), "---\ntitle: Foo\ndescription: bar\n---");
        // The title cell is an inert placeholder now
        assert_eq!(out.document.get(1).unwrap().source(), None);
        assert_eq!(out.frontmatter.unwrap().title(), Some("Foo".to_string()));
    }

    #[test]
    fn test_explicit_block_wins() {
        let out = run(vec![
            Cell::raw("---\ntitle: Explicit\nauthor: Me\n---"),
            Cell::markdown("# Inferred\n> from markdown"),
        ]);
        let fm = out.frontmatter.unwrap();
        assert_eq!(fm.title(), Some("Explicit".to_string()));
        assert!(!fm.contains_key("description"));
        // Title cell untouched since the explicit block had a title
        assert_eq!(out.document.get(2).unwrap().text(), "# Inferred\n> from markdown");
    }

    #[test]
    fn test_explicit_without_title_is_completed() {
        let out = run(vec![
            Cell::raw("---\nauthor: Me\ndescription: explicit\n---"),
            Cell::markdown("# Inferred\n> ignored"),
        ]);
        let fm = out.frontmatter.unwrap();
        assert_eq!(fm.title(), Some("Inferred".to_string()));
        assert_eq!(fm.get_str("description"), Some("explicit".to_string()));
        assert_eq!(fm.get_str("author"), Some("Me".to_string()));
    }

    #[test]
    fn test_filtered_output_keeps_flags_in_context() {
        let out = run(vec![Cell::raw("---\ntitle: T\nskip_showdoc: true\n---")]);
        let block = out.document.get(0).unwrap().text().to_string();
        assert!(!block.contains("skip_showdoc"));
        assert!(out.frontmatter.unwrap().flag("skip_showdoc"));
    }

    #[test]
    fn test_no_front_matter_inserts_nothing() {
        let out = run(vec![Cell::markdown("Some prose"), Cell::code("x = 1")]);
        assert_eq!(out.document.len(), 2);
        assert!(out.frontmatter.unwrap().is_empty());
    }

    #[test]
    fn test_later_explicit_blocks_are_merged_and_cleared() {
        let out = run(vec![
            Cell::raw("---\ntitle: A\n---"),
            Cell::raw("---\ntitle: B\nauthor: Me\n---"),
        ]);
        let fm = out.frontmatter.unwrap();
        assert_eq!(fm.title(), Some("A".to_string()));
        assert_eq!(fm.get_str("author"), Some("Me".to_string()));

        let notebook = out.document.into_notebook();
        let blocks: Vec<_> = notebook
            .cells
            .iter()
            .filter(|c| is_frontmatter(c.source.as_str()))
            .collect();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].source.as_str().contains("title: A"));
    }

    #[test]
    fn test_prose_before_heading_is_not_a_title_cell() {
        let out = run(vec![
            Cell::markdown("Some prose\n# Heading later"),
            Cell::markdown("# Real\n> desc"),
        ]);
        assert_eq!(out.frontmatter.unwrap().title(), Some("Real".to_string()));
        assert_eq!(out.document.get(1).unwrap().text(), "Some prose\n# Heading later");
        assert_eq!(out.document.get(2).unwrap().source(), None);
    }

    #[test]
    fn test_single_front_matter_cell_after_save() {
        let out = run(vec![
            Cell::markdown("Intro"),
            Cell::raw("---\ntitle: One\n---"),
            Cell::markdown("# Not used"),
        ]);
        let notebook = out.document.into_notebook();
        let blocks = notebook
            .cells
            .iter()
            .filter(|c| is_frontmatter(c.source.as_str()))
            .count();
        assert_eq!(blocks, 1);
        assert!(notebook.cells[0].source.as_str().contains("title: One"));
        assert_eq!(notebook.cells.len(), 3);
    }
}
