//! The `exec_show_docs` stage.
//!
//! Runs the cells needed to render documentation output: exported cells,
//! import cells and cells that call `show_doc`. The session is started in
//! `begin` and shut down in `end`; the first fault aborts the run.

use crate::kernel::{Kernel, KernelError, KernelFactory};
use crate::widgets::merge_widget_state;
use litnb_core::config::ExecConfig;
use litnb_core::directives::EVAL_KEYS;
use litnb_core::document::{Cell, Document};
use litnb_core::pipeline::{Annotation, CellMut, PipelineContext, Stage, StageError};
use std::sync::Arc;

pub const EXEC_STAGE: &str = "exec_show_docs";

/// Front matter flags that turn execution off for a document
pub const SKIP_FLAGS: &[&str] = &["skip_showdoc", "skip_exec"];

/// Lifecycle of the stage's session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Uninitialized,
    Ready,
    Errored,
}

/// Why a cell is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalReason {
    /// Tagged `export`, `exports`, `exporti` or `exec_doc`
    Directive,
    /// Contains a top-level import; `mixed` when it also computes
    Imports { mixed: bool },
    /// Calls `show_doc`
    DocReference,
}

pub struct ExecShowDocs {
    config: ExecConfig,
    factory: Arc<dyn KernelFactory>,
    kernel: Option<Box<dyn Kernel>>,
    state: EngineState,
}

impl std::fmt::Debug for ExecShowDocs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecShowDocs")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish()
    }
}

impl ExecShowDocs {
    pub fn new(config: ExecConfig, factory: Arc<dyn KernelFactory>) -> Self {
        Self {
            config,
            factory,
            kernel: None,
            state: EngineState::Uninitialized,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    fn close(&mut self) {
        if let Some(mut kernel) = self.kernel.take() {
            if let Err(e) = kernel.shutdown() {
                tracing::warn!("Failed to shut down interpreter session: {}", e);
            }
        }
    }
}

/// Decide whether `cell` has to run for its documentation to render
pub fn should_eval(
    cell: &mut Cell,
    ctx: &PipelineContext,
    bootstrap_marker: &str,
) -> Result<Option<EvalReason>, StageError> {
    if !ctx.has_docs() || SKIP_FLAGS.iter().any(|flag| ctx.flag(flag)) {
        return Ok(None);
    }
    if !cell.is_code() || !cell.language().eq_ignore_ascii_case(ctx.primary_language()) {
        return Ok(None);
    }
    if cell.is_empty() || (!bootstrap_marker.is_empty() && cell.text().contains(bootstrap_marker)) {
        return Ok(None);
    }

    let extractor = ctx.extractor_for(cell.language());
    let parsed = cell.parsed(extractor.as_ref())?;
    if parsed.is_empty() {
        return Ok(None);
    }

    let directives = cell.directives();
    if directives.is_false("eval") {
        return Ok(None);
    }
    if directives.contains_any(EVAL_KEYS) {
        return Ok(Some(EvalReason::Directive));
    }
    if parsed.has_imports {
        return Ok(Some(EvalReason::Imports {
            mixed: parsed.has_computation,
        }));
    }
    if parsed.has_doc_references() {
        return Ok(Some(EvalReason::DocReference));
    }
    Ok(None)
}

fn mixed_imports_message(source: &str) -> String {
    format!(
        "Found a cell containing mix of imports and computations. Please use separate cells.\n---\n{}\n---",
        source
    )
}

impl Stage for ExecShowDocs {
    fn name(&self) -> &str {
        EXEC_STAGE
    }

    fn requires(&self) -> &[Annotation] {
        &[Annotation::HasDocs]
    }

    fn after(&self) -> &[&str] {
        &["frontmatter"]
    }

    fn wants(&self, cell: &Cell) -> bool {
        cell.is_code()
    }

    fn begin(&mut self, doc: &mut Document, ctx: &mut PipelineContext) -> Result<(), StageError> {
        self.close();
        self.state = EngineState::Uninitialized;

        let language = doc.primary_language();
        if !language.eq_ignore_ascii_case(ctx.primary_language()) {
            tracing::debug!(language = %language, "Skipping execution for non-primary notebook");
            return Ok(());
        }
        if !ctx.has_docs() {
            tracing::debug!("No documentation to render, skipping execution");
            return Ok(());
        }

        let mut kernel = self
            .factory
            .start(&self.config)
            .map_err(|e| StageError::Kernel(Box::new(e)))?;

        if !self.config.prelude.trim().is_empty() {
            let reply = kernel
                .run(&self.config.prelude)
                .map_err(|e| StageError::Kernel(Box::new(e)))?;
            if let Some(fault) = reply.error {
                self.state = EngineState::Errored;
                let _ = kernel.shutdown();
                return Err(StageError::Kernel(Box::new(KernelError::Prelude(fault))));
            }
        }

        tracing::info!("Interpreter session started");
        self.kernel = Some(kernel);
        self.state = EngineState::Ready;
        Ok(())
    }

    fn cell(&mut self, cell: &mut CellMut<'_>, ctx: &mut PipelineContext) -> Result<(), StageError> {
        if self.state != EngineState::Ready {
            return Ok(());
        }
        let Some(reason) = should_eval(cell, ctx, &self.config.bootstrap_marker)? else {
            return Ok(());
        };
        if reason == (EvalReason::Imports { mixed: true }) {
            ctx.warn(Some(cell.index()), mixed_imports_message(cell.text()));
        }

        let Some(kernel) = self.kernel.as_mut() else {
            return Ok(());
        };
        tracing::debug!(cell = cell.index(), ?reason, "Executing cell");
        let reply = match kernel.run(cell.text()) {
            Ok(reply) => reply,
            Err(e) => {
                self.state = EngineState::Errored;
                self.close();
                return Err(StageError::Kernel(Box::new(e)));
            }
        };

        cell.outputs = reply.outputs;
        cell.execution_count = Some(reply.execution_count);

        if let Some(fault) = reply.error {
            cell.outputs.push(fault.to_output());
            self.state = EngineState::Errored;
            self.close();
            return Err(StageError::Execution {
                cell_index: cell.index(),
                title: ctx.title(),
                cell_source: cell.text().to_string(),
                cause: Box::new(fault),
            });
        }
        Ok(())
    }

    fn end(&mut self, doc: &mut Document, _ctx: &mut PipelineContext) -> Result<(), StageError> {
        let Some(kernel) = self.kernel.as_mut() else {
            return Ok(());
        };
        let state = kernel
            .widget_state()
            .map_err(|e| StageError::Kernel(Box::new(e)))?;
        if let Some(state) = state {
            merge_widget_state(doc.metadata_mut(), state);
        }
        self.close();
        self.state = EngineState::Uninitialized;
        Ok(())
    }
}

impl Drop for ExecShowDocs {
    fn drop(&mut self) {
        self.close();
    }
}
