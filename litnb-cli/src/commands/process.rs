//! Run the stage pipeline over notebooks.

use super::load_config;
use anyhow::{bail, Context, Result};
use litnb_core::{
    Config, Document, ExtractorRegistry, Notebook, PipelineContext, PipelineOutput, StageRegistry,
};
use std::fs;
use std::io::{stdout, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub struct ProcessOptions {
    pub out: Option<PathBuf>,
    pub no_exec: bool,
    pub exports: bool,
}

pub fn process_notebooks(config_path: &Path, path: &Path, opts: ProcessOptions) -> Result<()> {
    let mut config = load_config(config_path)?;
    if opts.no_exec {
        config.exec.enabled = false;
    }

    let notebooks = collect_notebooks(path)?;
    if notebooks.is_empty() {
        bail!("No notebooks found under {}", path.display());
    }
    if opts.out.is_none() && path.is_dir() {
        bail!("--out is required when processing a directory");
    }

    let registry = litnb_runtime::stage_registry();
    let extractors =
        litnb_adapters::default_registry().context("Failed to load language parsers")?;

    let mut warnings = 0;
    for notebook_path in &notebooks {
        let output = process_one(&config, &registry, &extractors, notebook_path)
            .with_context(|| format!("Failed to process {}", notebook_path.display()))?;
        warnings += output.diagnostics.len();

        let file_name = notebook_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let text = if opts.exports {
            module_text(&file_name, &output, &extractors)?
        } else {
            output.document.into_notebook().to_json()?
        };

        match &opts.out {
            Some(out_dir) => {
                let relative = notebook_path
                    .strip_prefix(path)
                    .ok()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new(&file_name));
                let mut target = out_dir.join(relative);
                if opts.exports {
                    target.set_extension("py");
                }
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("Failed to create {}", parent.display()))?;
                }
                fs::write(&target, text)
                    .with_context(|| format!("Failed to write {}", target.display()))?;
                tracing::info!(path = %target.display(), "Wrote output");
            }
            None => {
                let mut handle = stdout().lock();
                handle.write_all(text.as_bytes())?;
                handle.flush()?;
            }
        }
    }

    tracing::info!(notebooks = notebooks.len(), warnings, "Processing complete");
    Ok(())
}

fn process_one(
    config: &Config,
    registry: &StageRegistry,
    extractors: &ExtractorRegistry,
    path: &Path,
) -> Result<PipelineOutput> {
    let notebook = Notebook::from_file(path)
        .with_context(|| format!("Failed to read notebook {}", path.display()))?;
    let document = Document::from_notebook(notebook);

    let mut pipeline = registry.from_config(config)?;
    tracing::debug!(stages = ?pipeline.stage_names(), "Built pipeline");
    let ctx = PipelineContext::new(config.primary_language.clone(), extractors.clone());
    Ok(pipeline.run(document, ctx)?)
}

/// A notebook file, or every `.ipynb` below a directory.
///
/// Hidden directories (including `.ipynb_checkpoints`) and files whose
/// name starts with `_` are skipped.
fn collect_notebooks(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        bail!("No such file or directory: {}", path.display());
    }

    let mut notebooks = Vec::new();
    let walker = WalkDir::new(path).sort_by_file_name().into_iter();
    for entry in walker.filter_entry(|e| e.depth() == 0 || !is_skipped(e.file_name())) {
        let entry = entry.with_context(|| format!("Failed to walk {}", path.display()))?;
        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == "ipynb")
        {
            notebooks.push(entry.into_path());
        }
    }
    Ok(notebooks)
}

fn is_skipped(name: &std::ffi::OsStr) -> bool {
    let name = name.to_string_lossy();
    name.starts_with('.') || name.starts_with('_')
}

/// Module source for the export stream, with an `__all__` manifest
fn module_text(
    file_name: &str,
    output: &PipelineOutput,
    extractors: &ExtractorRegistry,
) -> Result<String> {
    let names = output
        .exports
        .public_names(extractors)
        .context("Failed to collect exported names")?;
    let manifest = names
        .iter()
        .map(|n| format!("'{}'", n))
        .collect::<Vec<_>>()
        .join(", ");

    let mut text = format!(
        "# AUTOGENERATED! DO NOT EDIT! File to edit: {}.\n\n# %% auto 0\n__all__ = [{}]",
        file_name, manifest
    );
    text.push_str(&output.exports.render(&format!("# %% {}", file_name)));
    text.push('\n');
    Ok(text)
}
