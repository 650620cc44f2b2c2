//! litnb Runtime - interpreter sessions for documentation rendering
//!
//! This crate provides the `exec_show_docs` stage, which evaluates the cells
//! a notebook's rendered documentation depends on, and the sessions it
//! drives:
//!
//! - **Kernels**: the [`Kernel`] trait and its reply/fault types
//! - **Python worker**: an isolated interpreter process speaking a
//!   line-delimited JSON protocol
//! - **Widgets**: merging captured widget state into notebook metadata
//!
//! ## Example
//!
//! ```ignore
//! use litnb_core::{Config, StageRegistry};
//!
//! let config = Config::default();
//! let mut registry = StageRegistry::builtin();
//! litnb_runtime::register_exec_stages(&mut registry);
//! let pipeline = registry.from_config(&config)?;
//! ```

pub mod exec;
pub mod kernel;
pub mod protocol;
pub mod python;
pub mod widgets;

pub use exec::{should_eval, EngineState, EvalReason, ExecShowDocs, EXEC_STAGE};
pub use kernel::{Kernel, KernelError, KernelFactory, KernelFault, KernelReply};
pub use python::{PythonKernel, PythonKernelFactory};
pub use widgets::merge_widget_state;

use litnb_core::config::{Config, ExecConfig};
use litnb_core::pipeline::StageRegistry;
use std::sync::Arc;

/// Exec settings with the interpreter resolved against the config file
fn resolved_exec(config: &Config) -> ExecConfig {
    ExecConfig {
        interpreter: config.interpreter(),
        ..config.exec.clone()
    }
}

/// Register `exec_show_docs` backed by Python worker processes
pub fn register_exec_stages(registry: &mut StageRegistry) {
    register_exec_stages_with(registry, Arc::new(PythonKernelFactory));
}

/// Register `exec_show_docs` backed by `factory`
pub fn register_exec_stages_with(registry: &mut StageRegistry, factory: Arc<dyn KernelFactory>) {
    registry.register(EXEC_STAGE, move |config: &Config| {
        Box::new(ExecShowDocs::new(resolved_exec(config), factory.clone()))
    });
}

/// Built-in stages plus the execution stage
pub fn stage_registry() -> StageRegistry {
    let mut registry = StageRegistry::builtin();
    register_exec_stages(&mut registry);
    registry
}
