//! Python sessions in an isolated worker process.
//!
//! The worker is the system interpreter running the bundled driver script,
//! which speaks the [`crate::protocol`] line protocol on stdin/stdout. The
//! driver registers a `litnb_showdoc` module so the default prelude works
//! without any package installed.

use crate::kernel::{Kernel, KernelError, KernelFactory, KernelReply};
use crate::protocol::{read_message, write_message, WorkerCommand, WorkerResponse};
use litnb_core::config::ExecConfig;
use serde_json::{Map, Value};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

const DRIVER: &str = include_str!("worker.py");

/// Handle to a running Python worker
pub struct PythonKernel {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    closed: bool,
}

impl std::fmt::Debug for PythonKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PythonKernel")
            .field("pid", &self.child.id())
            .field("closed", &self.closed)
            .finish()
    }
}

impl PythonKernel {
    /// Spawn a worker and wait for its handshake
    pub fn spawn(interpreter: &Path) -> Result<Self, KernelError> {
        let program = find_interpreter(interpreter)?;

        let mut child = Command::new(&program)
            .arg("-u")
            .arg("-c")
            .arg(DRIVER)
            .env("PYTHONIOENCODING", "utf-8")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| KernelError::Spawn {
                program: program.display().to_string(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| KernelError::Protocol("Failed to get worker stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| KernelError::Protocol("Failed to get worker stdout".to_string()))?;

        let mut kernel = Self {
            child,
            stdin: BufWriter::new(stdin),
            stdout: BufReader::new(stdout),
            closed: false,
        };

        match kernel.request(&WorkerCommand::Ping)? {
            WorkerResponse::Pong => {
                tracing::debug!(pid = kernel.pid(), interpreter = %program.display(), "Python worker ready");
                Ok(kernel)
            }
            other => Err(unexpected("ping", &other)),
        }
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    fn request(&mut self, command: &WorkerCommand) -> Result<WorkerResponse, KernelError> {
        if self.closed {
            return Err(KernelError::Closed);
        }
        write_message(&mut self.stdin, command)?;
        match read_message(&mut self.stdout)? {
            WorkerResponse::Error { message } => Err(KernelError::Protocol(message)),
            response => Ok(response),
        }
    }

    fn kill(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.child.kill() {
            tracing::debug!("Worker already exited: {}", e);
        }
        let _ = self.child.wait();
    }
}

impl Kernel for PythonKernel {
    fn run(&mut self, code: &str) -> Result<KernelReply, KernelError> {
        match self.request(&WorkerCommand::Execute { code: code.to_string() })? {
            WorkerResponse::Result(reply) => Ok(reply),
            other => Err(unexpected("execute", &other)),
        }
    }

    fn widget_state(&mut self) -> Result<Option<Map<String, Value>>, KernelError> {
        match self.request(&WorkerCommand::WidgetState)? {
            WorkerResponse::WidgetState { state } => Ok(state.filter(|s| !s.is_empty())),
            other => Err(unexpected("widget_state", &other)),
        }
    }

    fn shutdown(&mut self) -> Result<(), KernelError> {
        if self.closed {
            return Ok(());
        }
        let response = self.request(&WorkerCommand::Shutdown);
        self.closed = true;
        let _ = self.child.wait();
        match response? {
            WorkerResponse::Bye => Ok(()),
            other => Err(unexpected("shutdown", &other)),
        }
    }
}

impl Drop for PythonKernel {
    fn drop(&mut self) {
        self.kill();
    }
}

fn unexpected(request: &str, response: &WorkerResponse) -> KernelError {
    KernelError::Protocol(format!(
        "Unexpected response to {}: {:?}",
        request, response
    ))
}

/// Resolve the interpreter: explicit paths are used as given, bare names
/// are looked up on PATH.
pub fn find_interpreter(interpreter: &Path) -> Result<PathBuf, KernelError> {
    if interpreter.components().count() > 1 || interpreter.is_absolute() {
        if interpreter.exists() {
            return Ok(interpreter.to_path_buf());
        }
        return Err(KernelError::InterpreterNotFound(
            interpreter.display().to_string(),
        ));
    }
    which::which(interpreter)
        .map_err(|_| KernelError::InterpreterNotFound(interpreter.display().to_string()))
}

/// Starts a [`PythonKernel`] for the configured interpreter
#[derive(Debug, Default, Clone, Copy)]
pub struct PythonKernelFactory;

impl KernelFactory for PythonKernelFactory {
    fn start(&self, config: &ExecConfig) -> Result<Box<dyn Kernel>, KernelError> {
        Ok(Box::new(PythonKernel::spawn(&config.interpreter)?))
    }
}
