//! Language-neutral view of a parsed code cell.
//!
//! A [`DeclarationExtractor`] turns a cell's source into a [`ParsedSource`]:
//! the top-level declarations worth documenting, explicit documentation
//! references, and a few statement-kind flags the execution stage needs.
//! Only the primary language needs a real parser; everything else can use
//! [`NoopExtractor`].

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Name of the call that requests rendered documentation for a symbol
pub const SHOW_DOC: &str = "show_doc";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to parse {language} source at line {line}: {message}")]
pub struct ParseError {
    pub language: String,
    /// 1-indexed line of the first syntax error
    pub line: usize,
    pub message: String,
}

/// The kind of a top-level declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    Function,
    Class,
    /// `name = obj.attr`
    Alias,
}

impl DeclarationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclarationKind::Function => "function",
            DeclarationKind::Class => "class",
            DeclarationKind::Alias => "alias",
        }
    }
}

/// A top-level declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Name bound by the declaration
    pub name: String,
    pub kind: DeclarationKind,
    /// Qualified name used in documentation references (e.g. `Foo.bar`)
    pub doc_name: String,
    /// 1-indexed start line
    pub line: usize,
}

impl Declaration {
    pub fn new(name: impl Into<String>, kind: DeclarationKind, line: usize) -> Self {
        let name = name.into();
        Self {
            doc_name: name.clone(),
            name,
            kind,
            line,
        }
    }

    pub fn with_doc_name(mut self, doc_name: impl Into<String>) -> Self {
        self.doc_name = doc_name.into();
        self
    }

    /// Leading underscore, unless the name is dunder-style (`__init__`)
    pub fn is_private(&self) -> bool {
        is_private_name(&self.name)
    }
}

pub fn is_private_name(name: &str) -> bool {
    let dunder = name.len() > 4 && name.starts_with("__") && name.ends_with("__");
    name.starts_with('_') && !dunder
}

/// Summary of a parsed code cell
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSource {
    /// Top-level declarations, in source order
    pub declarations: Vec<Declaration>,
    /// Qualified names passed to top-level `show_doc(...)` calls
    pub doc_references: Vec<String>,
    /// An import statement is present, at top level or nested
    pub has_imports: bool,
    /// A top-level expression statement or assignment is present
    pub has_computation: bool,
    /// Number of top-level statements
    pub statement_count: usize,
}

impl ParsedSource {
    pub fn is_empty(&self) -> bool {
        self.statement_count == 0
    }

    /// Declarations that should get documentation or be exported
    pub fn public_declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter().filter(|d| !d.is_private())
    }

    pub fn has_doc_references(&self) -> bool {
        !self.doc_references.is_empty()
    }
}

/// Per-language parser capability
pub trait DeclarationExtractor: Send + Sync {
    /// Language this extractor parses (e.g. "python")
    fn language(&self) -> &str;

    /// Parse `source` into a declaration summary
    fn parse(&self, source: &str) -> Result<ParsedSource, ParseError>;
}

/// Extractor for languages without a parser; always returns an empty summary
#[derive(Debug, Clone)]
pub struct NoopExtractor {
    language: String,
}

impl NoopExtractor {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }
}

impl DeclarationExtractor for NoopExtractor {
    fn language(&self) -> &str {
        &self.language
    }

    fn parse(&self, _source: &str) -> Result<ParsedSource, ParseError> {
        Ok(ParsedSource::default())
    }
}

/// Extractors keyed by language name
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: HashMap<String, Arc<dyn DeclarationExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, extractor: Arc<dyn DeclarationExtractor>) -> Self {
        self.register(extractor);
        self
    }

    pub fn register(&mut self, extractor: Arc<dyn DeclarationExtractor>) {
        self.extractors
            .insert(extractor.language().to_lowercase(), extractor);
    }

    pub fn has_parser(&self, language: &str) -> bool {
        self.extractors.contains_key(&language.to_lowercase())
    }

    /// Extractor for `language`, falling back to a no-op extractor
    pub fn for_language(&self, language: &str) -> Arc<dyn DeclarationExtractor> {
        match self.extractors.get(&language.to_lowercase()) {
            Some(extractor) => Arc::clone(extractor),
            None => Arc::new(NoopExtractor::new(language)),
        }
    }

    pub fn languages(&self) -> Vec<&str> {
        let mut langs: Vec<&str> = self.extractors.keys().map(|s| s.as_str()).collect();
        langs.sort_unstable();
        langs
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field("languages", &self.languages())
            .finish()
    }
}
