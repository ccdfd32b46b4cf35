//! End-to-end `build` pipeline: settings → command → converter → finish → record.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use paper_shared::{OutputFormat, PaperError, ProcessRunner, ProjectContext, Result};

use crate::command::{self, BuildPlan};
use crate::finish;
use crate::record;

/// What the caller asked for.
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    /// `--format`; falls back to `default_format`, then `docx`.
    pub format: Option<OutputFormat>,
    /// `--docx-revision`; overrides `docx.revision`.
    pub docx_revision: Option<u32>,
    /// Write the `.paper_data/` build record.
    pub record: bool,
}

/// Result of a successful build.
#[derive(Debug)]
pub struct BuildOutcome {
    pub format: OutputFormat,
    /// The converter's output (`.docx`, `.tex`, `.json`).
    pub output: PathBuf,
    /// The fixed-layout derivative, for `+pdf` formats.
    pub pdf: Option<PathBuf>,
    pub elapsed: Duration,
}

impl BuildOutcome {
    /// The file the user asked for.
    pub fn primary(&self) -> &PathBuf {
        self.pdf.as_ref().unwrap_or(&self.output)
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the pipeline completes.
    fn done(&self, outcome: &BuildOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _outcome: &BuildOutcome) {}
}

/// Run the full `build` pipeline.
///
/// 1. Resolve settings and the output format
/// 2. Assemble the converter command (temporary inputs included)
/// 3. Run the converter
/// 4. Format-specific finishing
/// 5. Build record (best effort)
///
/// Temporary inputs belong to the plan and are removed when it drops, on
/// every path out of this function.
#[instrument(skip_all, fields(root = %ctx.root().display()))]
pub fn build(
    ctx: &ProjectContext,
    runner: &dyn ProcessRunner,
    request: &BuildRequest,
    progress: &dyn ProgressReporter,
) -> Result<BuildOutcome> {
    let start = Instant::now();

    // --- Phase 1: Settings ---
    progress.phase("Resolving settings");
    let settings = ctx.settings()?;
    let format = command::resolve_format(request.format, settings)?;
    info!(%format, "building");

    let output_dir = ctx.output_dir();
    std::fs::create_dir_all(&output_dir).map_err(|e| PaperError::io(&output_dir, e))?;

    // --- Phase 2: Command ---
    progress.phase("Assembling command");
    let plan = command::assemble(ctx, runner, format)?;

    // --- Phase 3: Converter ---
    progress.phase("Running pandoc");
    runner.run_checked(&plan.invocation(ctx.root()))?;
    info!(path = %plan.output_path.display(), "converter finished");

    // --- Phase 4: Finish ---
    let pdf = finish_output(ctx, runner, request, &plan, progress)?;

    // --- Phase 5: Record ---
    if request.record {
        progress.phase("Recording build");
        let final_output = pdf.as_ref().unwrap_or(&plan.output_path);
        record::record_build(ctx, runner, &plan, final_output);
    }

    let outcome = BuildOutcome {
        format,
        output: plan.output_path.clone(),
        pdf,
        elapsed: start.elapsed(),
    };
    drop(plan);

    info!(
        path = %outcome.primary().display(),
        elapsed_ms = outcome.elapsed.as_millis() as u64,
        "build complete"
    );
    progress.done(&outcome);
    Ok(outcome)
}

fn finish_output(
    ctx: &ProjectContext,
    runner: &dyn ProcessRunner,
    request: &BuildRequest,
    plan: &BuildPlan,
    progress: &dyn ProgressReporter,
) -> Result<Option<PathBuf>> {
    let output = &plan.output_path;
    match plan.format {
        OutputFormat::Docx | OutputFormat::DocxPdf => {
            progress.phase("Post-processing document");
            let pinned = request
                .docx_revision
                .or(ctx.settings()?.meta().docx.revision);
            let revision = finish::docx_revision(runner, ctx.root(), pinned);
            finish::finish_docx(ctx, output, revision)?;

            if plan.format == OutputFormat::DocxPdf {
                progress.phase("Exporting PDF");
                return finish::export_docx_pdf(ctx, runner, output).map(Some);
            }
            Ok(None)
        }
        OutputFormat::Latex => Ok(None),
        OutputFormat::LatexPdf => {
            progress.phase("Typesetting");
            finish::typeset_pdf(ctx, runner, output).map(Some)
        }
        OutputFormat::Json => {
            finish::pretty_print_json(output)?;
            Ok(None)
        }
    }
}
