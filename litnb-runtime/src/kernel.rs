//! Interpreter sessions used by the execution stage.
//!
//! A [`Kernel`] runs cell source one snippet at a time and reports the
//! captured outputs. Faults raised by the evaluated code come back in
//! [`KernelReply::error`]; [`KernelError`] is reserved for a session that
//! can no longer be driven.

use litnb_core::config::ExecConfig;
use litnb_core::notebook::CellOutput;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KernelError {
    #[error("Interpreter not found: {0}")]
    InterpreterNotFound(String),

    #[error("Failed to spawn interpreter '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Kernel I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Kernel protocol error: {0}")]
    Protocol(String),

    #[error("Kernel has been shut down")]
    Closed,

    /// The session came up but the prelude raised
    #[error("Prelude failed: {0}")]
    Prelude(KernelFault),
}

/// Exception raised by evaluated code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelFault {
    pub ename: String,
    pub evalue: String,
    #[serde(default)]
    pub traceback: Vec<String>,
}

impl std::fmt::Display for KernelFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.ename, self.evalue)
    }
}

impl std::error::Error for KernelFault {}

impl KernelFault {
    pub fn new(ename: impl Into<String>, evalue: impl Into<String>) -> Self {
        Self {
            ename: ename.into(),
            evalue: evalue.into(),
            traceback: Vec::new(),
        }
    }

    /// Jupyter `error` output for this fault
    pub fn to_output(&self) -> CellOutput {
        CellOutput::Error {
            ename: self.ename.clone(),
            evalue: self.evalue.clone(),
            traceback: self.traceback.clone(),
        }
    }
}

/// Result of running one snippet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KernelReply {
    #[serde(default)]
    pub outputs: Vec<CellOutput>,
    #[serde(default)]
    pub error: Option<KernelFault>,
    pub execution_count: u32,
}

impl KernelReply {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// A live interpreter session
pub trait Kernel: Send {
    /// Evaluate `code` in the session namespace
    fn run(&mut self, code: &str) -> Result<KernelReply, KernelError>;

    /// Captured interactive-widget state, if the session has any
    fn widget_state(&mut self) -> Result<Option<Map<String, Value>>, KernelError> {
        Ok(None)
    }

    fn shutdown(&mut self) -> Result<(), KernelError> {
        Ok(())
    }
}

/// Starts kernels for the execution stage
pub trait KernelFactory: Send + Sync {
    fn start(&self, config: &ExecConfig) -> Result<Box<dyn Kernel>, KernelError>;
}

impl<F> KernelFactory for F
where
    F: Fn(&ExecConfig) -> Result<Box<dyn Kernel>, KernelError> + Send + Sync,
{
    fn start(&self, config: &ExecConfig) -> Result<Box<dyn Kernel>, KernelError> {
        self(config)
    }
}
