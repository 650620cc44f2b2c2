//! # litnb-adapters
//!
//! Language-specific declaration extractors using tree-sitter.
//!
//! Each extractor implements [`DeclarationExtractor`] from `litnb-core`
//! and is feature-gated by language:
//!
//! - `python` (default) - Python cells
//!
//! Languages without an extractor fall back to the no-op extractor of
//! [`ExtractorRegistry`], which reports no declarations.
//!
//! ## Usage
//!
//! ```ignore
//! use litnb_adapters::default_registry;
//!
//! let registry = default_registry()?;
//! let parsed = registry.for_language("python").parse("def f(): pass")?;
//! ```

use litnb_core::syntax::{DeclarationExtractor, ExtractorRegistry};
use std::sync::Arc;
use thiserror::Error;

#[cfg(feature = "python")]
mod lang_python;

#[cfg(feature = "python")]
pub use lang_python::PythonExtractor;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Failed to load grammar: {0}")]
    LanguageError(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
}

// ============================================================================
// Extractor Registry
// ============================================================================

/// Get an extractor by language name (e.g., "python")
pub fn extractor_by_name(name: &str) -> Result<Arc<dyn DeclarationExtractor>, AdapterError> {
    match name.to_ascii_lowercase().as_str() {
        #[cfg(feature = "python")]
        "python" | "py" => Ok(Arc::new(lang_python::PythonExtractor::new()?)),
        other => Err(AdapterError::UnsupportedLanguage(other.to_string())),
    }
}

/// List names of all available extractors (based on enabled features)
pub fn available_extractors() -> Vec<&'static str> {
    #[allow(unused_mut)]
    let mut extractors = Vec::new();

    #[cfg(feature = "python")]
    extractors.push("python");

    extractors
}

/// Registry holding every available extractor
pub fn default_registry() -> Result<ExtractorRegistry, AdapterError> {
    let mut registry = ExtractorRegistry::new();
    for name in available_extractors() {
        registry.register(extractor_by_name(name)?);
    }
    Ok(registry)
}
