//! Typed stage registry.
//!
//! Stages are resolved by name when a pipeline is built, never while it
//! runs. Crates with extra stages register their factories on top of
//! [`StageRegistry::builtin`].

use super::{Pipeline, PipelineError, Stage};
use crate::config::Config;
use crate::processors::{
    AddShowDocs, CleanShowDoc, FrontmatterStage, Hide, HideLine, InsertWarning, PopulateLanguage,
    RmExport,
};

/// Builds a stage from configuration
pub type StageFactory = Box<dyn Fn(&Config) -> Box<dyn Stage> + Send + Sync>;

#[derive(Default)]
pub struct StageRegistry {
    factories: Vec<(String, StageFactory)>,
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRegistry")
            .field("stages", &self.names())
            .finish()
    }
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every stage defined in this crate
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("populate_language", |_| Box::new(PopulateLanguage::new()));
        registry.register("insert_warning", |_| Box::new(InsertWarning));
        registry.register("frontmatter", |_| Box::new(FrontmatterStage::new()));
        registry.register("add_show_docs", |_| Box::new(AddShowDocs::new()));
        registry.register("clean_show_doc", |_| Box::new(CleanShowDoc));
        registry.register("hide", |_| Box::new(Hide));
        registry.register("hide_line", |_| Box::new(HideLine));
        registry.register("rm_export", |_| Box::new(RmExport));
        registry
    }

    /// Register `factory` under `name`, replacing any earlier entry
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Config) -> Box<dyn Stage> + Send + Sync + 'static,
    {
        let name = name.into();
        let factory: StageFactory = Box::new(factory);
        match self.factories.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = factory,
            None => self.factories.push((name, factory)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.iter().any(|(n, _)| n == name)
    }

    /// Registered names, in registration order
    pub fn names(&self) -> Vec<&str> {
        self.factories.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn create(&self, name: &str, config: &Config) -> Result<Box<dyn Stage>, PipelineError> {
        self.factories
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, factory)| factory(config))
            .ok_or_else(|| PipelineError::UnknownStage(name.to_string()))
    }

    /// Resolve `names` into a validated pipeline
    pub fn build(&self, names: &[&str], config: &Config) -> Result<Pipeline, PipelineError> {
        let stages = names
            .iter()
            .map(|name| self.create(name, config))
            .collect::<Result<Vec<_>, _>>()?;
        Pipeline::new(stages)
    }

    /// Pipeline for the stages listed in `config`
    pub fn from_config(&self, config: &Config) -> Result<Pipeline, PipelineError> {
        self.build(&config.active_stages(), config)
    }
}
