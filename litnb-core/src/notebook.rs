//! Jupyter notebook (nbformat 4) JSON shapes.
//!
//! These are the on-disk types. The pipeline works on [`crate::Document`],
//! which is built from a [`Notebook`] and converted back after a run.

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotebookError {
    #[error("Failed to read notebook: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Invalid notebook JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A Jupyter notebook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notebook {
    /// Notebook metadata (kernelspec, language_info, widgets, ...)
    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// Format version (always 4)
    #[serde(default = "default_nbformat")]
    pub nbformat: u32,

    /// Minor format version
    #[serde(default = "default_nbformat_minor")]
    pub nbformat_minor: u32,

    /// Notebook cells
    pub cells: Vec<NotebookCell>,
}

fn default_nbformat() -> u32 {
    4
}

fn default_nbformat_minor() -> u32 {
    5
}

impl Notebook {
    /// Read a notebook from a `.ipynb` file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, NotebookError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, NotebookError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Pretty JSON with the one-space indent Jupyter writes
    pub fn to_json(&self) -> Result<String, NotebookError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        buf.push(b'\n');
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Cell type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Code,
    Markdown,
    Raw,
}

impl CellType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CellType::Code => "code",
            CellType::Markdown => "markdown",
            CellType::Raw => "raw",
        }
    }
}

/// A Jupyter cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotebookCell {
    pub cell_type: CellType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// Cell source, stored by Jupyter as a list of lines or a single string
    #[serde(default)]
    pub source: MultilineText,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<CellOutput>>,

    /// `null` for code cells that never ran, absent for other cells
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_count: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Value>,
}

/// Cell output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "output_type")]
pub enum CellOutput {
    /// Standard output/error
    #[serde(rename = "stream")]
    Stream { name: String, text: MultilineText },

    /// Value of the last expression
    #[serde(rename = "execute_result")]
    ExecuteResult {
        #[serde(default)]
        execution_count: Option<u32>,
        #[serde(default)]
        data: Map<String, Value>,
        #[serde(default)]
        metadata: Map<String, Value>,
    },

    /// Rich display data
    #[serde(rename = "display_data")]
    DisplayData {
        #[serde(default)]
        data: Map<String, Value>,
        #[serde(default)]
        metadata: Map<String, Value>,
    },

    /// Error output
    #[serde(rename = "error")]
    Error {
        ename: String,
        evalue: String,
        #[serde(default)]
        traceback: Vec<String>,
    },
}

impl CellOutput {
    pub fn stdout(text: impl Into<String>) -> Self {
        CellOutput::Stream {
            name: "stdout".to_string(),
            text: MultilineText(text.into()),
        }
    }

    pub fn stderr(text: impl Into<String>) -> Self {
        CellOutput::Stream {
            name: "stderr".to_string(),
            text: MultilineText(text.into()),
        }
    }
}

/// Text that Jupyter may store either as one string or as a list of lines.
///
/// Always serialized as a list of lines, each keeping its trailing newline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultilineText(pub String);

impl MultilineText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<&str> for MultilineText {
    fn from(s: &str) -> Self {
        MultilineText(s.to_string())
    }
}

impl From<String> for MultilineText {
    fn from(s: String) -> Self {
        MultilineText(s)
    }
}

impl Serialize for MultilineText {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let lines: Vec<&str> = self.0.split_inclusive('\n').collect();
        let mut seq = serializer.serialize_seq(Some(lines.len()))?;
        for line in lines {
            seq.serialize_element(line)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for MultilineText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TextVisitor;

        impl<'de> Visitor<'de> for TextVisitor {
            type Value = MultilineText;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a string or a list of strings")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(MultilineText(v.to_string()))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(MultilineText::default())
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut text = String::new();
                while let Some(line) = seq.next_element::<String>()? {
                    text.push_str(&line);
                }
                Ok(MultilineText(text))
            }
        }

        deserializer.deserialize_any(TextVisitor)
    }
}
