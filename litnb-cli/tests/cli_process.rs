use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const NOTEBOOK: &str = r##"{
 "cells": [
  {"cell_type": "markdown", "metadata": {}, "source": ["# Foo\n", "> bar"]},
  {"cell_type": "code", "execution_count": null, "metadata": {}, "outputs": [],
   "source": ["#| export\n", "def baz(): pass"]}
 ],
 "metadata": {"kernelspec": {"display_name": "Python 3", "language": "python", "name": "python3"}},
 "nbformat": 4,
 "nbformat_minor": 5
}"##;

fn write_notebook(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

#[allow(deprecated)]
fn litnb() -> Command {
    Command::cargo_bin("litnb").unwrap()
}

#[test]
fn process_single_notebook_to_stdout() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    write_notebook(&dir.path().join("00_core.ipynb"), NOTEBOOK);

    let assert = litnb()
        .current_dir(dir.path())
        .args(["process", "00_core.ipynb", "--no-exec"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
    let value: Value = serde_json::from_str(&stdout)?;
    let cells = value["cells"].as_array().expect("cells array");
    assert_eq!(cells[0]["cell_type"], "raw");
    assert_eq!(
        cells[0]["source"],
        serde_json::json!(["---\n", "title: Foo\n", "description: bar\n", "---"])
    );
    let show_doc = cells
        .iter()
        .find(|c| c["source"].as_array().is_some_and(|s| s.last() == Some(&Value::from("show_doc(baz)"))))
        .expect("show_doc cell");
    assert_eq!(show_doc["cell_type"], "code");
    Ok(())
}

#[test]
fn process_exports_prints_module() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    write_notebook(&dir.path().join("00_core.ipynb"), NOTEBOOK);

    litnb()
        .current_dir(dir.path())
        .args(["process", "00_core.ipynb", "--no-exec", "--exports"])
        .assert()
        .success()
        .stdout(predicate::str::contains("__all__ = ['baz']"))
        .stdout(predicate::str::contains("# %% 00_core.ipynb 1\n#| export\ndef baz(): pass"));
    Ok(())
}

#[test]
fn process_directory_requires_out() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    write_notebook(&dir.path().join("nbs/a.ipynb"), NOTEBOOK);

    litnb()
        .current_dir(dir.path())
        .args(["process", "nbs", "--no-exec"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--out is required"));
    Ok(())
}

#[test]
fn process_directory_writes_tree() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    write_notebook(&dir.path().join("nbs/a.ipynb"), NOTEBOOK);
    write_notebook(&dir.path().join("nbs/sub/b.ipynb"), NOTEBOOK);
    write_notebook(&dir.path().join("nbs/.ipynb_checkpoints/a-checkpoint.ipynb"), "not json");

    litnb()
        .current_dir(dir.path())
        .args(["process", "nbs", "--out", "_proc", "--no-exec"])
        .assert()
        .success();

    let written: Value = serde_json::from_str(&fs::read_to_string(dir.path().join("_proc/a.ipynb"))?)?;
    assert_eq!(written["nbformat"], 4);
    assert!(dir.path().join("_proc/sub/b.ipynb").exists());
    assert!(!dir.path().join("_proc/.ipynb_checkpoints").exists());
    Ok(())
}

#[test]
fn export_in_other_language_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let notebook = NOTEBOOK.replace(
        r##""source": ["#| export\n", "def baz(): pass"]"##,
        r##""source": ["%%bash\n", "echo hi"]},
  {"cell_type": "code", "execution_count": null, "metadata": {"language": "bash"}, "outputs": [],
   "source": ["#| export\n", "echo hi"]"##,
    );
    write_notebook(&dir.path().join("bad.ipynb"), &notebook);
    fs::write(
        dir.path().join("litnb.yml"),
        "stages: [frontmatter, add_show_docs, rm_export]\n",
    )?;

    litnb()
        .current_dir(dir.path())
        .args(["process", "bad.ipynb"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("bash can't export"));
    Ok(())
}

#[test]
fn missing_interpreter_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    write_notebook(&dir.path().join("00_core.ipynb"), NOTEBOOK);
    fs::write(
        dir.path().join("litnb.yml"),
        "exec:\n  interpreter: litnb-no-such-python\n",
    )?;

    litnb()
        .current_dir(dir.path())
        .args(["process", "00_core.ipynb"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Interpreter session failed"));
    Ok(())
}

#[test]
fn stages_lists_pipeline() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;

    litnb()
        .current_dir(dir.path())
        .arg("stages")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline (9 stages):"))
        .stdout(predicate::str::contains("5. exec_show_docs"));

    fs::write(dir.path().join("litnb.yml"), "exec:\n  enabled: false\n")?;
    let assert = litnb()
        .current_dir(dir.path())
        .args(["stages", "--json"])
        .assert()
        .success();
    let value: Value = serde_json::from_slice(&assert.get_output().stdout)?;
    let exec = value
        .as_array()
        .expect("json array")
        .iter()
        .find(|s| s["name"] == "exec_show_docs")
        .expect("exec stage listed");
    assert_eq!(exec["active"], false);
    Ok(())
}

#[test]
fn unknown_stage_in_config_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("litnb.yml"), "stages: [frontmatter, nope]\n")?;

    litnb()
        .current_dir(dir.path())
        .arg("stages")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown stage: nope"));
    Ok(())
}
