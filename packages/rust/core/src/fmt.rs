//! `fmt`: normalize every content file through the converter, in place.

use tracing::{debug, info, instrument};

use paper_markdown::{INPUT_FORMAT, content_files};
use paper_shared::{CONTENT_DIR, Invocation, ProcessRunner, ProjectContext, Result, Tool};

/// Line-wrapping behaviour for `fmt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrap {
    /// Re-wrap paragraphs at the given column.
    Columns(u32),
    /// Keep the existing line breaks.
    Preserve,
}

/// Rewrite each content file as normalized Markdown. Returns the number of
/// files formatted.
#[instrument(skip_all)]
pub fn fmt(ctx: &ProjectContext, runner: &dyn ProcessRunner, wrap: Wrap) -> Result<usize> {
    let files = content_files(&ctx.content_dir())?;
    for file in &files {
        let relative = format!("{CONTENT_DIR}/{}", file.relative);
        let invocation = fmt_invocation(&relative, wrap).current_dir(ctx.root());
        runner.run_checked(&invocation)?;
        debug!(file = %relative, "formatted");
    }
    info!(count = files.len(), "formatted content files");
    Ok(files.len())
}

fn fmt_invocation(file: &str, wrap: Wrap) -> Invocation {
    let invocation = Tool::Pandoc.invocation().args([
        "--from",
        INPUT_FORMAT,
        "--to",
        INPUT_FORMAT,
        "--standalone",
        "--output",
        file,
    ]);
    let invocation = match wrap {
        Wrap::Columns(columns) => invocation
            .args(["--wrap", "auto", "--columns"])
            .arg(columns.to_string()),
        Wrap::Preserve => invocation.args(["--wrap", "preserve"]),
    };
    invocation.arg(file)
}
