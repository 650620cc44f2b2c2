use super::Annotation;
use crate::document::DocumentError;
use crate::frontmatter::FrontmatterError;
use crate::syntax::ParseError;
use thiserror::Error;

/// Boxed error raised by an interpreter session
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Fault raised by a single stage
#[derive(Error, Debug)]
pub enum StageError {
    /// An export-tagged cell is written in a non-primary language
    #[error("{language} can't export:\n{cell_source}")]
    Classification {
        language: String,
        cell_source: String,
        cell_index: usize,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The interpreter raised while evaluating a cell
    #[error("Error{} in cell {cell_index} :\n{cell_source}", in_notebook(.title))]
    Execution {
        cell_index: usize,
        title: Option<String>,
        cell_source: String,
        #[source]
        cause: BoxError,
    },

    /// The interpreter session could not be started or driven
    #[error("Interpreter session failed: {0}")]
    Kernel(#[source] BoxError),

    #[error(transparent)]
    Frontmatter(#[from] FrontmatterError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("{0}")]
    Other(String),
}

fn in_notebook(title: &Option<String>) -> String {
    match title {
        Some(title) => format!(" in notebook: {}", title),
        None => String::new(),
    }
}

impl StageError {
    /// Index of the cell the fault is attributed to, if any
    pub fn cell_index(&self) -> Option<usize> {
        match self {
            StageError::Classification { cell_index, .. }
            | StageError::Execution { cell_index, .. } => Some(*cell_index),
            _ => None,
        }
    }
}

/// Errors raised while building or running a pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    #[error("Stage '{stage}' requires {annotation}, which no stage provides")]
    MissingDependency {
        stage: String,
        annotation: Annotation,
    },

    #[error("Stage '{stage}' must run after '{dependency}'")]
    OutOfOrder { stage: String, dependency: String },

    #[error("Stage '{stage}' failed")]
    Stage {
        stage: String,
        #[source]
        source: StageError,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl PipelineError {
    /// The stage fault behind a run-time failure
    pub fn stage_error(&self) -> Option<&StageError> {
        match self {
            PipelineError::Stage { source, .. } => Some(source),
            _ => None,
        }
    }
}
