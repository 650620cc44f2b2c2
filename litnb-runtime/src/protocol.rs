//! Line protocol spoken with the interpreter worker.
//!
//! One JSON object per line over the worker's stdin/stdout. Each request
//! gets exactly one response.

use crate::kernel::{KernelError, KernelReply};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::{BufRead, Write};

/// Request sent from the host to the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerCommand {
    /// Check the worker is alive
    Ping,

    /// Run source in the session namespace
    Execute { code: String },

    /// Report captured widget state
    WidgetState,

    /// Exit the worker
    Shutdown,
}

/// Response sent from the worker to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerResponse {
    Pong,

    /// Outcome of an `execute`, including faults raised by the code
    Result(KernelReply),

    WidgetState {
        #[serde(default)]
        state: Option<Map<String, Value>>,
    },

    Bye,

    /// The worker itself failed to handle a request
    Error { message: String },
}

pub fn write_message<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<(), KernelError> {
    let line = serde_json::to_string(message)
        .map_err(|e| KernelError::Protocol(format!("Failed to encode message: {}", e)))?;
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Read the next message, skipping blank lines
pub fn read_message<R: BufRead, T: for<'de> Deserialize<'de>>(
    reader: &mut R,
) -> Result<T, KernelError> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(KernelError::Protocol(
                "Worker closed its output stream".to_string(),
            ));
        }
        if !line.trim().is_empty() {
            break;
        }
    }
    serde_json::from_str(line.trim_end())
        .map_err(|e| KernelError::Protocol(format!("Failed to decode message: {}", e)))
}
