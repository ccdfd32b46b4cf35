//! paper CLI: build, track, and publish academic writing projects.
//!
//! Orchestrates pandoc, a LaTeX engine, git, and gh around a directory of
//! Markdown content and a cascade of `paper_meta.yml` settings.

mod commands;

use clap::Parser;
use color_eyre::eyre::Report;

use commands::Cli;
use paper_shared::PaperError;

fn main() {
    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error reporting: {e}");
    }
    let cli = Cli::parse();
    commands::init_tracing(&cli);

    if let Err(report) = commands::run(cli) {
        std::process::exit(report_error(&report));
    }
}

/// Print `report` the way its kind calls for and return the exit code.
fn report_error(report: &Report) -> i32 {
    match report.downcast_ref::<PaperError>() {
        Some(PaperError::Typesetting { code, output }) => {
            eprint!("{output}");
            eprintln!("Typesetting failed with status {code}.");
            (*code).clamp(1, 255)
        }
        Some(err) if err.is_user_error() => {
            eprintln!("{err}");
            err.exit_code()
        }
        Some(err) => {
            eprintln!("Error: {report:?}");
            err.exit_code()
        }
        None => {
            eprintln!("Error: {report:?}");
            1
        }
    }
}
