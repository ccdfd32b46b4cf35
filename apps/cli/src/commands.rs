//! CLI command definitions, routing, and tracing setup.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use paper_core::fmt::Wrap;
use paper_core::pipeline::{BuildOutcome, BuildRequest, ProgressReporter};
use paper_core::project::{self, DevOutcome};
use paper_core::{Prompter, save};
use paper_markdown::{wc_table, word_counts};
use paper_shared::{OutputFormat, PaperError, ProjectContext, SystemRunner};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// paper: academic writing projects from Markdown to submission.
#[derive(Parser)]
#[command(
    name = "paper",
    version,
    about = "Build, track, and publish academic papers written in Markdown.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Create the scaffolding for a new writing/research project.
    New {
        /// Name of the project directory to create.
        project_name: String,
    },

    /// While in an empty directory, set it up for a project.
    Init,

    /// Link the project's resources to the tool's own template sources.
    Dev,

    /// Generate versions of the paper ready for submission.
    Build {
        /// Output format: docx, docx+pdf, latex, latex+pdf, or json.
        #[arg(long)]
        format: Option<OutputFormat>,

        /// Revision number stamped into the document properties.
        #[arg(long)]
        docx_revision: Option<u32>,
    },

    /// Run an automated formatter on all the local Markdown files.
    Fmt {
        /// Re-wrap paragraphs; `false` keeps existing line breaks.
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        wrap: bool,

        /// Column to wrap at.
        #[arg(long, default_value_t = 80)]
        columns: u32,
    },

    /// Print word count metrics for the project.
    Wc,

    /// Make a git commit with some extra tracking data.
    Save {
        /// Commit message; asked for when omitted.
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Push local git changes to the remote repository.
    Push,

    /// Open the remote repository's GitHub site.
    Web,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "paper=info",
        1 => "paper=debug",
        _ => "paper=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::New { project_name } => cmd_new(&project_name),
        Command::Init => cmd_init(),
        Command::Dev => cmd_dev(),
        Command::Build {
            format,
            docx_revision,
        } => cmd_build(format, docx_revision),
        Command::Fmt { wrap, columns } => cmd_fmt(wrap, columns),
        Command::Wc => cmd_wc(),
        Command::Save { message } => cmd_save(message.as_deref()),
        Command::Push => cmd_push(),
        Command::Web => cmd_web(),
    }
}

fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().wrap_err("cannot determine working directory")
}

fn open_project() -> Result<ProjectContext> {
    Ok(ProjectContext::open(current_dir()?)?)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_new(name: &str) -> Result<()> {
    println!("Starting new project called '{name}'...");
    let dir = project::new_project(&current_dir()?, name, &SystemRunner)?;
    println!("Project ready at {}", dir.display());
    Ok(())
}

fn cmd_init() -> Result<()> {
    let dir = current_dir()?;
    project::init_project(&dir, &SystemRunner)?;
    println!("Project ready at {}", dir.display());
    Ok(())
}

fn cmd_dev() -> Result<()> {
    let ctx = open_project()?;
    match project::dev(&ctx, &TerminalPrompter)? {
        DevOutcome::Linked => println!("Linked {}", ctx.resources_dir().display()),
        DevOutcome::Declined => println!("Left the project unchanged."),
    }
    Ok(())
}

fn cmd_build(format: Option<OutputFormat>, docx_revision: Option<u32>) -> Result<()> {
    let ctx = open_project()?;
    let request = BuildRequest {
        format,
        docx_revision,
        record: true,
    };

    let reporter = CliProgress::new();
    let result = paper_core::build(&ctx, &SystemRunner, &request, &reporter);
    reporter.spinner.finish_and_clear();
    let outcome = result?;

    println!("{}", outcome.primary().display());
    Ok(())
}

fn cmd_fmt(wrap: bool, columns: u32) -> Result<()> {
    let ctx = open_project()?;
    let wrap = if wrap {
        Wrap::Columns(columns)
    } else {
        Wrap::Preserve
    };
    let count = paper_core::fmt::fmt(&ctx, &SystemRunner, wrap)?;
    info!(count, "formatting done");
    Ok(())
}

fn cmd_wc() -> Result<()> {
    let ctx = open_project()?;
    let snapshot = word_counts(&ctx.content_dir())?;
    println!("{}", wc_table(&snapshot));
    Ok(())
}

fn cmd_save(message: Option<&str>) -> Result<()> {
    let ctx = open_project()?;
    let outcome = save::save(&ctx, &SystemRunner, &TerminalPrompter, message, Utc::now())?;
    println!("Saved at {} words.", outcome.snapshot.total);
    Ok(())
}

fn cmd_push() -> Result<()> {
    let ctx = open_project()?;
    save::push(&ctx, &SystemRunner, &TerminalPrompter)?;
    Ok(())
}

fn cmd_web() -> Result<()> {
    let ctx = open_project()?;
    save::web(&ctx, &SystemRunner)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, outcome: &BuildOutcome) {
        self.spinner.finish_and_clear();
        info!(
            format = %outcome.format,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "built"
        );
    }
}

// ---------------------------------------------------------------------------
// Terminal prompts
// ---------------------------------------------------------------------------

/// Asks on stderr and reads answers from stdin.
struct TerminalPrompter;

impl TerminalPrompter {
    fn ask(&self, prompt: &str) -> paper_shared::Result<Option<String>> {
        ask_with(&mut std::io::stdin().lock(), &mut std::io::stderr(), prompt)
    }
}

/// Write `prompt` to `output` and read one answer line from `input`.
///
/// `None` means the input is exhausted.
fn ask_with(
    input: &mut impl BufRead,
    output: &mut impl Write,
    prompt: &str,
) -> paper_shared::Result<Option<String>> {
    write!(output, "{prompt}").map_err(|e| PaperError::io("<stderr>", e))?;
    output.flush().map_err(|e| PaperError::io("<stderr>", e))?;

    let mut line = String::new();
    let read = input
        .read_line(&mut line)
        .map_err(|e| PaperError::io("<stdin>", e))?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

impl Prompter for TerminalPrompter {
    fn text(&self, question: &str, default: Option<&str>) -> paper_shared::Result<String> {
        let prompt = match default {
            Some(d) => format!("{question} [{d}]: "),
            None => format!("{question}: "),
        };
        loop {
            match (self.ask(&prompt)?, default) {
                (None, Some(d)) => return Ok(d.to_string()),
                (None, None) => return Err(PaperError::validation("no answer given")),
                (Some(answer), Some(d)) if answer.is_empty() => return Ok(d.to_string()),
                (Some(answer), _) if answer.is_empty() => continue,
                (Some(answer), _) => return Ok(answer),
            }
        }
    }

    fn confirm(&self, question: &str, default: bool) -> paper_shared::Result<bool> {
        let prompt = format!("{question} [{}]: ", if default { "Y/n" } else { "y/N" });
        loop {
            let Some(answer) = self.ask(&prompt)? else {
                return Ok(default);
            };
            match answer.to_ascii_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => eprintln!("Error: invalid input"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }
    }

    #[test]
    fn prompt_is_written_before_reading_the_answer() {
        let mut output = Vec::new();
        let answer = ask_with(&mut "  Final Essay \n".as_bytes(), &mut output, "Title: ").unwrap();
        assert_eq!(answer.as_deref(), Some("Final Essay"));
        assert_eq!(output, b"Title: ");
    }

    #[test]
    fn exhausted_input_gives_no_answer() {
        let answer = ask_with(&mut "".as_bytes(), &mut Vec::new(), "Title: ").unwrap();
        assert_eq!(answer, None);
    }

    #[test]
    fn failed_prompt_write_is_an_io_error() {
        let err = ask_with(&mut "yes\n".as_bytes(), &mut ClosedPipe, "Continue? ").unwrap_err();
        assert!(matches!(err, PaperError::Io { .. }));
    }
}
