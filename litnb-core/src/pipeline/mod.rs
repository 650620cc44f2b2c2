//! Stage pipeline over a [`Document`].
//!
//! Each stage gets an optional whole-document `begin`, a per-cell pass over
//! a snapshot of the cell order taken when the stage starts, and an
//! optional `end`. Stages that insert cells next to an anchor visit in
//! reverse order so pending anchors keep their positions. The first fault
//! aborts the run and no output is produced.
//!
//! Document-scoped state (front matter, the has-docs flag) lives in an
//! explicit [`PipelineContext`]. Stages declare which [`Annotation`]s they
//! need and provide, and [`Pipeline::new`] rejects orderings that would
//! read an annotation before it is written.

mod error;
pub mod registry;

pub use error::{BoxError, PipelineError, StageError};
pub use registry::{StageFactory, StageRegistry};

use crate::diagnostics::{Diagnostic, DiagnosticCollector};
use crate::document::{Cell, CellId, Document};
use crate::export::ExportStream;
use crate::frontmatter::Frontmatter;
use crate::syntax::{DeclarationExtractor, ExtractorRegistry};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Document-scoped state written by one stage and read by later ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Annotation {
    Frontmatter,
    HasDocs,
}

impl Annotation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Annotation::Frontmatter => "frontmatter",
            Annotation::HasDocs => "has_docs",
        }
    }
}

impl std::fmt::Display for Annotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order in which a stage visits the cell snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisitOrder {
    #[default]
    Forward,
    Reverse,
}

/// Explicit context threaded through every stage of a run
#[derive(Debug)]
pub struct PipelineContext {
    primary_language: String,
    extractors: ExtractorRegistry,
    /// Set by the show-doc inserter
    pub has_docs: Option<bool>,
    /// Unfiltered front matter, set by the front matter stage
    pub frontmatter: Option<Frontmatter>,
    pub diagnostics: DiagnosticCollector,
    stage: String,
}

impl PipelineContext {
    pub fn new(primary_language: impl Into<String>, extractors: ExtractorRegistry) -> Self {
        Self {
            primary_language: primary_language.into(),
            extractors,
            has_docs: None,
            frontmatter: None,
            diagnostics: DiagnosticCollector::new(),
            stage: String::new(),
        }
    }

    pub fn primary_language(&self) -> &str {
        &self.primary_language
    }

    pub fn extractors(&self) -> &ExtractorRegistry {
        &self.extractors
    }

    pub fn extractor_for(&self, language: &str) -> Arc<dyn DeclarationExtractor> {
        self.extractors.for_language(language)
    }

    pub fn has_docs(&self) -> bool {
        self.has_docs.unwrap_or(false)
    }

    /// Document title from the resolved front matter
    pub fn title(&self) -> Option<String> {
        self.frontmatter.as_ref().and_then(Frontmatter::title)
    }

    /// Truthy front matter flag
    pub fn flag(&self, key: &str) -> bool {
        self.frontmatter
            .as_ref()
            .map(|fm| fm.flag(key))
            .unwrap_or(false)
    }

    /// Name of the stage currently running
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Record a non-fatal warning against the running stage
    pub fn warn(&mut self, cell_index: Option<usize>, message: impl Into<String>) {
        let mut diagnostic = Diagnostic::warning(self.stage.clone(), message);
        diagnostic.cell_index = cell_index;
        self.diagnostics.emit(diagnostic);
    }

    pub fn info(&mut self, cell_index: Option<usize>, message: impl Into<String>) {
        let mut diagnostic = Diagnostic::info(self.stage.clone(), message);
        diagnostic.cell_index = cell_index;
        self.diagnostics.emit(diagnostic);
    }
}

/// Mutable view of the cell being visited.
///
/// Cells passed to [`CellMut::insert_after`] are placed directly after
/// this cell, in call order, once the hook returns.
pub struct CellMut<'a> {
    cell: &'a mut Cell,
    inserted: Vec<Cell>,
}

impl<'a> CellMut<'a> {
    pub fn new(cell: &'a mut Cell) -> Self {
        Self {
            cell,
            inserted: Vec::new(),
        }
    }

    pub fn insert_after(&mut self, cell: Cell) {
        self.inserted.push(cell);
    }

    pub fn into_inserted(self) -> Vec<Cell> {
        self.inserted
    }
}

impl Deref for CellMut<'_> {
    type Target = Cell;

    fn deref(&self) -> &Cell {
        self.cell
    }
}

impl DerefMut for CellMut<'_> {
    fn deref_mut(&mut self) -> &mut Cell {
        self.cell
    }
}

/// One unit of the transformation pipeline
pub trait Stage {
    /// Registry name, also used in diagnostics and ordering constraints
    fn name(&self) -> &str;

    /// Annotations that an earlier stage must provide
    fn requires(&self) -> &[Annotation] {
        &[]
    }

    fn provides(&self) -> &[Annotation] {
        &[]
    }

    /// Stages that, when present, must run before this one
    fn after(&self) -> &[&str] {
        &[]
    }

    fn visit_order(&self) -> VisitOrder {
        VisitOrder::Forward
    }

    /// Per-cell interest filter
    fn wants(&self, _cell: &Cell) -> bool {
        true
    }

    fn begin(&mut self, _doc: &mut Document, _ctx: &mut PipelineContext) -> Result<(), StageError> {
        Ok(())
    }

    fn cell(&mut self, _cell: &mut CellMut<'_>, _ctx: &mut PipelineContext) -> Result<(), StageError> {
        Ok(())
    }

    fn end(&mut self, _doc: &mut Document, _ctx: &mut PipelineContext) -> Result<(), StageError> {
        Ok(())
    }
}

/// Result of a complete run
#[derive(Debug)]
pub struct PipelineOutput {
    pub document: Document,
    /// Export-tagged cells as they were before any stage ran
    pub exports: ExportStream,
    pub frontmatter: Option<Frontmatter>,
    pub has_docs: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Ordered, validated list of stages
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl Pipeline {
    /// Build a pipeline, checking declared dependencies
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Result<Self, PipelineError> {
        validate(&stages)?;
        Ok(Self { stages })
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage over `doc`
    pub fn run(
        &mut self,
        mut doc: Document,
        mut ctx: PipelineContext,
    ) -> Result<PipelineOutput, PipelineError> {
        doc.reindex();
        let exports = ExportStream::collect(&doc);
        tracing::debug!(exports = exports.len(), cells = doc.len(), "Collected export stream");

        for stage in self.stages.iter_mut() {
            let name = stage.name().to_string();
            ctx.stage = name.clone();
            doc.reindex();
            tracing::info!(stage = %name, cells = doc.len(), "Running stage");

            run_stage(stage.as_mut(), &mut doc, &mut ctx).map_err(|source| {
                tracing::debug!(stage = %name, error = %source, "Stage failed");
                PipelineError::Stage {
                    stage: name.clone(),
                    source,
                }
            })?;
        }

        doc.reindex();
        Ok(PipelineOutput {
            document: doc,
            exports,
            has_docs: ctx.has_docs(),
            frontmatter: ctx.frontmatter,
            diagnostics: ctx.diagnostics.take(),
        })
    }
}

fn run_stage(
    stage: &mut dyn Stage,
    doc: &mut Document,
    ctx: &mut PipelineContext,
) -> Result<(), StageError> {
    stage.begin(doc, ctx)?;
    doc.reindex();

    let mut snapshot: Vec<CellId> = doc.ids();
    if stage.visit_order() == VisitOrder::Reverse {
        snapshot.reverse();
    }

    for id in snapshot {
        let Some(cell) = doc.cell_mut(id) else {
            continue;
        };
        if !stage.wants(cell) {
            continue;
        }

        let mut view = CellMut::new(cell);
        stage.cell(&mut view, ctx)?;

        let mut anchor = id;
        for new_cell in view.into_inserted() {
            anchor = doc.insert_after(anchor, new_cell)?;
        }
    }

    doc.reindex();
    stage.end(doc, ctx)
}

fn validate(stages: &[Box<dyn Stage>]) -> Result<(), PipelineError> {
    for (pos, stage) in stages.iter().enumerate() {
        let earlier = &stages[..pos];
        let later = &stages[pos + 1..];

        for annotation in stage.requires() {
            if earlier.iter().any(|s| s.provides().contains(annotation)) {
                continue;
            }
            return Err(match later.iter().find(|s| s.provides().contains(annotation)) {
                Some(provider) => PipelineError::OutOfOrder {
                    stage: stage.name().to_string(),
                    dependency: provider.name().to_string(),
                },
                None => PipelineError::MissingDependency {
                    stage: stage.name().to_string(),
                    annotation: *annotation,
                },
            });
        }

        for dependency in stage.after() {
            if later.iter().any(|s| s.name() == *dependency) {
                return Err(PipelineError::OutOfOrder {
                    stage: stage.name().to_string(),
                    dependency: dependency.to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    /// Appends a marker cell after every code cell
    struct Marker {
        order: VisitOrder,
        visited: Vec<usize>,
    }

    impl Stage for Marker {
        fn name(&self) -> &str {
            "marker"
        }

        fn visit_order(&self) -> VisitOrder {
            self.order
        }

        fn wants(&self, cell: &Cell) -> bool {
            cell.is_code()
        }

        fn cell(&mut self, cell: &mut CellMut<'_>, _ctx: &mut PipelineContext) -> Result<(), StageError> {
            self.visited.push(cell.index());
            let text = format!("after {}", cell.text());
            cell.insert_after(Cell::markdown(text.clone()));
            cell.insert_after(Cell::markdown(format!("{} again", text)));
            Ok(())
        }
    }

    struct Named {
        name: &'static str,
        requires: Vec<Annotation>,
        provides: Vec<Annotation>,
        after: Vec<&'static str>,
        fail: bool,
    }

    impl Named {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                requires: vec![],
                provides: vec![],
                after: vec![],
                fail: false,
            }
        }
    }

    impl Stage for Named {
        fn name(&self) -> &str {
            self.name
        }

        fn requires(&self) -> &[Annotation] {
            &self.requires
        }

        fn provides(&self) -> &[Annotation] {
            &self.provides
        }

        fn after(&self) -> &[&str] {
            &self.after
        }

        fn begin(&mut self, doc: &mut Document, ctx: &mut PipelineContext) -> Result<(), StageError> {
            if self.fail {
                return Err(StageError::Other("boom".into()));
            }
            if self.provides.contains(&Annotation::HasDocs) {
                ctx.has_docs = Some(true);
            }
            doc.push(Cell::raw(self.name));
            Ok(())
        }
    }

    fn doc(cells: Vec<Cell>) -> Document {
        Document::new(cells, Map::new())
    }

    fn ctx() -> PipelineContext {
        PipelineContext::new("python", ExtractorRegistry::new())
    }

    fn texts(doc: &Document) -> Vec<String> {
        doc.cells().map(|c| c.text().to_string()).collect()
    }

    #[test]
    fn test_reverse_insertion_keeps_anchor_positions() {
        let stage = Marker {
            order: VisitOrder::Reverse,
            visited: vec![],
        };
        let mut pipeline = Pipeline::new(vec![Box::new(stage)]).unwrap();
        let out = pipeline
            .run(
                doc(vec![Cell::code("a"), Cell::markdown("m"), Cell::code("b")]),
                ctx(),
            )
            .unwrap();

        assert_eq!(
            texts(&out.document),
            vec!["a", "after a", "after a again", "m", "b", "after b", "after b again"]
        );
        for (index, cell) in out.document.cells().enumerate() {
            assert_eq!(cell.index(), index);
        }
    }

    #[test]
    fn test_inserted_cells_not_revisited() {
        let mut stage = Marker {
            order: VisitOrder::Forward,
            visited: vec![],
        };
        let mut document = doc(vec![Cell::code("a"), Cell::code("b")]);
        let mut context = ctx();
        run_stage(&mut stage, &mut document, &mut context).unwrap();

        // The second anchor had shifted by two when visited
        assert_eq!(stage.visited, vec![0, 3]);
        assert_eq!(document.len(), 6);
    }

    #[test]
    fn test_fault_aborts_remaining_stages() {
        let mut failing = Named::new("second");
        failing.fail = true;
        let mut pipeline = Pipeline::new(vec![
            Box::new(Named::new("first")),
            Box::new(failing),
            Box::new(Named::new("third")),
        ])
        .unwrap();

        let err = pipeline.run(doc(vec![]), ctx()).unwrap_err();
        match err {
            PipelineError::Stage { stage, source } => {
                assert_eq!(stage, "second");
                assert!(matches!(source, StageError::Other(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_dependency_rejected() {
        let mut consumer = Named::new("consumer");
        consumer.requires = vec![Annotation::HasDocs];
        let err = Pipeline::new(vec![Box::new(consumer)]).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MissingDependency { annotation: Annotation::HasDocs, .. }
        ));
    }

    #[test]
    fn test_provider_after_consumer_rejected() {
        let mut consumer = Named::new("consumer");
        consumer.requires = vec![Annotation::HasDocs];
        let mut provider = Named::new("provider");
        provider.provides = vec![Annotation::HasDocs];

        let err = Pipeline::new(vec![Box::new(consumer), Box::new(provider)]).unwrap_err();
        match err {
            PipelineError::OutOfOrder { stage, dependency } => {
                assert_eq!(stage, "consumer");
                assert_eq!(dependency, "provider");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_soft_ordering() {
        let mut late = Named::new("late");
        late.after = vec!["early"];

        let err = Pipeline::new(vec![Box::new(late), Box::new(Named::new("early"))]).unwrap_err();
        assert!(matches!(err, PipelineError::OutOfOrder { .. }));

        // Absent stages impose nothing
        let mut alone = Named::new("late");
        alone.after = vec!["early"];
        assert!(Pipeline::new(vec![Box::new(alone)]).is_ok());
    }

    #[test]
    fn test_context_carries_annotations() {
        let mut provider = Named::new("provider");
        provider.provides = vec![Annotation::HasDocs];
        let mut consumer = Named::new("consumer");
        consumer.requires = vec![Annotation::HasDocs];

        let mut pipeline = Pipeline::new(vec![Box::new(provider), Box::new(consumer)]).unwrap();
        assert_eq!(pipeline.stage_names(), vec!["provider", "consumer"]);
        let out = pipeline.run(doc(vec![]), ctx()).unwrap();
        assert!(out.has_docs);
        assert_eq!(texts(&out.document), vec!["provider", "consumer"]);
    }
}
