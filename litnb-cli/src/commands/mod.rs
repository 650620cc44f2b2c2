//! CLI command implementations.

pub mod process;
pub mod stages;

pub use process::{process_notebooks, ProcessOptions};
pub use stages::list_stages;

use anyhow::{Context, Result};
use litnb_core::Config;
use std::path::Path;

/// Load `litnb.yml`, falling back to defaults when it does not exist
pub(crate) fn load_config(config_path: &Path) -> Result<Config> {
    Config::load_or_default(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))
}
