//! In-memory document model.
//!
//! A [`Document`] is an arena of [`Cell`]s addressed by stable [`CellId`]s
//! plus an order vector. Stages insert and remove cells through the
//! document, so positions are looked up from ids instead of being tracked
//! by hand.

use crate::directives::Directives;
use crate::notebook::{CellOutput, CellType, MultilineText, Notebook, NotebookCell};
use crate::syntax::{DeclarationExtractor, ParseError, ParsedSource};
use serde_json::{Map, Value};
use std::cell::OnceCell;
use std::sync::Arc;
use thiserror::Error;

/// Language assumed when a notebook does not name one
pub const DEFAULT_LANGUAGE: &str = "python";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Cell {0} is not part of the document")]
    UnknownCell(CellId),
}

/// Stable cell identifier, valid for the lifetime of one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(usize);

impl CellId {
    const DETACHED: CellId = CellId(usize::MAX);
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One cell of a literate document
#[derive(Debug, Clone)]
pub struct Cell {
    id: CellId,
    index: usize,
    cell_type: CellType,
    source: Option<String>,
    metadata: Map<String, Value>,
    pub outputs: Vec<CellOutput>,
    pub execution_count: Option<u32>,
    notebook_id: Option<String>,
    attachments: Option<Value>,
    /// Language used when `metadata.language` is unset
    fallback_language: String,
    directives: OnceCell<Directives>,
    parsed: Option<(String, Arc<ParsedSource>)>,
}

impl Cell {
    pub fn new(cell_type: CellType, source: impl Into<String>) -> Self {
        Self {
            id: CellId::DETACHED,
            index: 0,
            cell_type,
            source: Some(source.into()),
            metadata: Map::new(),
            outputs: Vec::new(),
            execution_count: None,
            notebook_id: None,
            attachments: None,
            fallback_language: DEFAULT_LANGUAGE.to_string(),
            directives: OnceCell::new(),
            parsed: None,
        }
    }

    pub fn code(source: impl Into<String>) -> Self {
        Self::new(CellType::Code, source)
    }

    pub fn markdown(source: impl Into<String>) -> Self {
        Self::new(CellType::Markdown, source)
    }

    pub fn raw(source: impl Into<String>) -> Self {
        Self::new(CellType::Raw, source)
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    /// Position in the document as of the last reindex
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    pub fn is_code(&self) -> bool {
        self.cell_type == CellType::Code
    }

    /// Current source; `None` once the content has been deleted
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Source text, empty for deleted cells
    pub fn text(&self) -> &str {
        self.source.as_deref().unwrap_or("")
    }

    /// True for deleted or blank cells
    pub fn is_empty(&self) -> bool {
        self.text().trim().is_empty()
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = Some(source.into());
        self.invalidate();
    }

    /// Delete the content but keep the cell in place
    pub fn clear_source(&mut self) {
        self.source = None;
        self.invalidate();
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Mutable metadata; drops derived state since the language may change
    pub fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        self.invalidate();
        &mut self.metadata
    }

    /// Assigned source language, or the document language if unset
    pub fn language(&self) -> &str {
        self.metadata
            .get("language")
            .and_then(Value::as_str)
            .unwrap_or(&self.fallback_language)
    }

    pub fn set_language(&mut self, language: impl Into<String>) {
        self.metadata_mut()
            .insert("language".to_string(), Value::String(language.into()));
    }

    /// Directive set derived from the current source
    pub fn directives(&self) -> &Directives {
        self.directives.get_or_init(|| {
            if self.cell_type == CellType::Code {
                Directives::parse(self.text(), self.language())
            } else {
                Directives::default()
            }
        })
    }

    /// Parsed summary of the current source, cached until the source changes.
    ///
    /// Non-code cells, deleted cells and cells starting with a `%` magic
    /// parse to an empty summary.
    pub fn parsed(
        &mut self,
        extractor: &dyn DeclarationExtractor,
    ) -> Result<Arc<ParsedSource>, ParseError> {
        if let Some((language, parsed)) = &self.parsed {
            if language == extractor.language() {
                return Ok(Arc::clone(parsed));
            }
        }

        let parsed = if self.cell_type != CellType::Code || self.text().starts_with('%') {
            ParsedSource::default()
        } else {
            extractor.parse(self.text())?
        };
        let parsed = Arc::new(parsed);
        self.parsed = Some((extractor.language().to_string(), Arc::clone(&parsed)));
        Ok(parsed)
    }

    fn invalidate(&mut self) {
        self.directives = OnceCell::new();
        self.parsed = None;
    }

    fn from_notebook(cell: NotebookCell, fallback_language: &str) -> Self {
        let execution_count = cell
            .execution_count
            .as_ref()
            .and_then(Value::as_u64)
            .map(|n| n as u32);
        Self {
            id: CellId::DETACHED,
            index: 0,
            cell_type: cell.cell_type,
            source: Some(cell.source.into_string()),
            metadata: cell.metadata,
            outputs: cell.outputs.unwrap_or_default(),
            execution_count,
            notebook_id: cell.id,
            attachments: cell.attachments,
            fallback_language: fallback_language.to_string(),
            directives: OnceCell::new(),
            parsed: None,
        }
    }

    fn into_notebook(self) -> NotebookCell {
        let is_code = self.cell_type == CellType::Code;
        NotebookCell {
            cell_type: self.cell_type,
            id: self.notebook_id,
            metadata: self.metadata,
            source: MultilineText(self.source.unwrap_or_default()),
            outputs: is_code.then_some(self.outputs),
            execution_count: is_code
                .then(|| self.execution_count.map(Value::from).unwrap_or(Value::Null)),
            attachments: self.attachments,
        }
    }
}

/// Mutable literate document
#[derive(Debug, Clone)]
pub struct Document {
    arena: Vec<Option<Cell>>,
    order: Vec<CellId>,
    metadata: Map<String, Value>,
    nbformat: u32,
    nbformat_minor: u32,
}

impl Document {
    pub fn new(cells: Vec<Cell>, metadata: Map<String, Value>) -> Self {
        let mut doc = Self {
            arena: Vec::with_capacity(cells.len()),
            order: Vec::with_capacity(cells.len()),
            metadata,
            nbformat: 4,
            nbformat_minor: 5,
        };
        let language = doc.primary_language();
        for mut cell in cells {
            cell.fallback_language = language.clone();
            let id = doc.alloc(cell);
            doc.order.push(id);
        }
        doc.reindex();
        doc
    }

    pub fn from_notebook(notebook: Notebook) -> Self {
        let mut doc = Self::new(Vec::new(), notebook.metadata);
        doc.nbformat = notebook.nbformat;
        doc.nbformat_minor = notebook.nbformat_minor;
        let language = doc.primary_language();
        for cell in notebook.cells {
            let id = doc.alloc(Cell::from_notebook(cell, &language));
            doc.order.push(id);
        }
        doc.reindex();
        doc
    }

    /// Convert back to a notebook, dropping cells whose content was deleted
    pub fn into_notebook(mut self) -> Notebook {
        let cells = self
            .order
            .iter()
            .filter_map(|id| self.arena[id.0].take())
            .filter(|cell| cell.source.is_some())
            .map(Cell::into_notebook)
            .collect();
        Notebook {
            metadata: self.metadata,
            nbformat: self.nbformat,
            nbformat_minor: self.nbformat_minor,
            cells,
        }
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.metadata
    }

    /// Language of the notebook's kernel
    pub fn primary_language(&self) -> String {
        let kernel = self
            .metadata
            .get("kernelspec")
            .and_then(|k| k.get("language"))
            .and_then(Value::as_str);
        let info = self
            .metadata
            .get("language_info")
            .and_then(|k| k.get("name"))
            .and_then(Value::as_str);
        kernel.or(info).unwrap_or(DEFAULT_LANGUAGE).to_string()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Snapshot of the current cell order
    pub fn ids(&self) -> Vec<CellId> {
        self.order.clone()
    }

    /// Cells in document order
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.order.iter().filter_map(|id| self.arena[id.0].as_ref())
    }

    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.arena.get(id.0).and_then(Option::as_ref)
    }

    pub fn cell_mut(&mut self, id: CellId) -> Option<&mut Cell> {
        self.arena.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Cell at position `index`
    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.order.get(index).and_then(|id| self.cell(*id))
    }

    pub fn position_of(&self, id: CellId) -> Option<usize> {
        self.order.iter().position(|other| *other == id)
    }

    /// Insert `cell` at `position` (clamped to the end)
    pub fn insert(&mut self, position: usize, mut cell: Cell) -> CellId {
        if cell.fallback_language == DEFAULT_LANGUAGE {
            cell.fallback_language = self.primary_language();
        }
        let id = self.alloc(cell);
        let position = position.min(self.order.len());
        self.order.insert(position, id);
        self.reindex();
        id
    }

    /// Insert `cell` directly after `anchor`
    pub fn insert_after(&mut self, anchor: CellId, cell: Cell) -> Result<CellId, DocumentError> {
        let position = self
            .position_of(anchor)
            .ok_or(DocumentError::UnknownCell(anchor))?;
        Ok(self.insert(position + 1, cell))
    }

    pub fn push(&mut self, cell: Cell) -> CellId {
        self.insert(self.order.len(), cell)
    }

    /// Remove a cell from the document entirely
    pub fn remove(&mut self, id: CellId) -> Option<Cell> {
        let position = self.position_of(id)?;
        self.order.remove(position);
        let cell = self.arena.get_mut(id.0).and_then(Option::take);
        self.reindex();
        cell
    }

    /// Recompute every cell's `index` from the current order
    pub fn reindex(&mut self) {
        for (index, id) in self.order.iter().enumerate() {
            if let Some(cell) = self.arena[id.0].as_mut() {
                cell.index = index;
            }
        }
    }

    fn alloc(&mut self, mut cell: Cell) -> CellId {
        let id = CellId(self.arena.len());
        cell.id = id;
        self.arena.push(Some(cell));
        id
    }
}
