//! # litnb-core
//!
//! Core library for litnb, the literate-notebook processor.
//!
//! This crate provides the document model, the directive classifier, front
//! matter resolution and the stage pipeline that turns a notebook into
//! rendered documentation plus a stream of exported source cells.

pub mod config;
pub mod diagnostics;
pub mod directives;
pub mod document;
pub mod export;
pub mod frontmatter;
pub mod notebook;
pub mod pipeline;
pub mod processors;
pub mod syntax;

pub use config::{Config, ConfigError, ExecConfig};
pub use diagnostics::{Diagnostic, DiagnosticCollector, Severity};
pub use directives::Directives;
pub use document::{Cell, CellId, Document, DocumentError};
pub use export::{ExportStream, ExportedCell};
pub use frontmatter::{yaml_quote, Frontmatter, FrontmatterError};
pub use notebook::{CellOutput, CellType, Notebook, NotebookError};
pub use pipeline::{
    Annotation, CellMut, Pipeline, PipelineContext, PipelineError, PipelineOutput, Stage,
    StageError, StageRegistry, VisitOrder,
};
pub use syntax::{
    Declaration, DeclarationExtractor, DeclarationKind, ExtractorRegistry, ParseError,
    ParsedSource,
};
