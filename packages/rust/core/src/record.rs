//! Build record: side files under `.paper_data/` describing the last build.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use paper_history::git;
use paper_markdown::INPUT_FORMAT;
use paper_shared::{
    OutputFormat, PaperError, ProcessRunner, ProjectContext, Result, TOOL_NAME, TOOL_VERSION,
    Tool, version_stamp,
};

use crate::command::BuildPlan;
use crate::finish::DEFAULT_ENGINE;

pub const VERSION_FILE: &str = "version.txt";
pub const ENVIRONMENT_FILE: &str = "environment.json";
pub const CITED_REFERENCES_FILE: &str = "cited_references.json";

/// Contents of `environment.json`.
#[derive(Debug, Clone, Serialize)]
pub struct BuildEnvironment {
    pub tool: String,
    pub tool_version: String,
    /// First line of `pandoc --version`, when available.
    pub converter: Option<String>,
    /// Typesetting engine, for typesetting formats.
    pub engine: Option<String>,
    pub format: OutputFormat,
    pub output: String,
    /// SHA-256 of the final output file.
    pub output_sha256: Option<String>,
    pub built_at: DateTime<Utc>,
}

/// Write every record file. Failures are logged and never fail the build.
#[instrument(skip_all, fields(format = %plan.format))]
pub fn record_build(
    ctx: &ProjectContext,
    runner: &dyn ProcessRunner,
    plan: &BuildPlan,
    output: &Path,
) {
    let data_dir = ctx.data_dir();
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        warn!(path = %data_dir.display(), error = %e, "could not create build record directory");
        return;
    }

    if let Err(e) = write_version(ctx, runner) {
        warn!(error = %e, "could not write version record");
    }
    if let Err(e) = write_environment(ctx, runner, plan.format, output) {
        warn!(error = %e, "could not write environment record");
    }
    if plan.processes_citations() {
        if let Err(e) = write_cited_references(ctx, runner, plan) {
            warn!(error = %e, "could not write cited references");
        }
    }
    info!(path = %data_dir.display(), "wrote build record");
}

fn write_version(ctx: &ProjectContext, runner: &dyn ProcessRunner) -> Result<()> {
    let mut text = format!("{}\n", version_stamp());
    match git::head_short_hash(runner, ctx.root()) {
        Ok(hash) if !hash.is_empty() => text.push_str(&format!("project {hash}\n")),
        Ok(_) => {}
        Err(e) => debug!(error = %e, "no project revision for version record"),
    }
    write_text(&ctx.data_dir().join(VERSION_FILE), &text)
}

fn write_environment(
    ctx: &ProjectContext,
    runner: &dyn ProcessRunner,
    format: OutputFormat,
    output: &Path,
) -> Result<()> {
    let converter = runner
        .run_checked(&Tool::Pandoc.invocation().arg("--version"))
        .ok()
        .and_then(|out| out.stdout_string().lines().next().map(str::to_string));

    let engine = (format == OutputFormat::LatexPdf).then(|| {
        ctx.settings()
            .ok()
            .and_then(|s| s.meta().latex.engine.clone())
            .unwrap_or_else(|| DEFAULT_ENGINE.to_string())
    });

    let env = BuildEnvironment {
        tool: TOOL_NAME.to_string(),
        tool_version: TOOL_VERSION.to_string(),
        converter,
        engine,
        format,
        output: output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        output_sha256: file_sha256(output).ok(),
        built_at: Utc::now(),
    };
    write_json(&ctx.data_dir().join(ENVIRONMENT_FILE), &env)
}

/// Run the converter over the content with citation processing and keep the
/// CSL JSON of the works actually cited.
fn write_cited_references(
    ctx: &ProjectContext,
    runner: &dyn ProcessRunner,
    plan: &BuildPlan,
) -> Result<()> {
    let mut invocation = Tool::Pandoc
        .invocation()
        .args(["--from", INPUT_FORMAT, "--to", "csljson", "--citeproc"])
        .current_dir(ctx.root());
    for bib in &plan.bibliographies {
        invocation = invocation
            .arg("--bibliography")
            .arg(bib.to_string_lossy().into_owned());
    }
    invocation = invocation.args(plan.content_inputs.iter().cloned());

    let output = runner.run_checked(&invocation)?;
    let value: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| PaperError::validation(format!("converter wrote invalid CSL JSON: {e}")))?;
    write_json(&ctx.data_dir().join(CITED_REFERENCES_FILE), &value)
}

/// Hex-encoded SHA-256 of a file's contents.
pub fn file_sha256(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| PaperError::io(path, e))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Write a JSON file (pretty-printed).
fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| PaperError::validation(format!("JSON serialization failed: {e}")))?;
    write_text(path, &format!("{json}\n"))
}

/// Write via a temporary sibling and an atomic rename.
fn write_text(path: &Path, text: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{file_name}.tmp"));
    std::fs::write(&temp, text).map_err(|e| PaperError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| PaperError::io(path, e))?;
    debug!(path = %path.display(), "wrote record file");
    Ok(())
}
