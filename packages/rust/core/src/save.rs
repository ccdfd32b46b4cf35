//! `save`, `push`, and `web`: the git side of a project.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use paper_history::chart::{ProgressChart, parse_due_date};
use paper_history::readme::{self, PROGRESS_CHART_FILE};
use paper_history::{commit_message_with_trailer, git};
use paper_markdown::{wc_table, word_counts};
use paper_shared::{PaperError, ProcessRunner, ProjectContext, Result, WordCountSnapshot};

use crate::prompt::Prompter;

pub const README_FILE: &str = "README.md";

/// Result of a `save`.
#[derive(Debug)]
pub struct SaveOutcome {
    pub snapshot: WordCountSnapshot,
    pub readme: PathBuf,
    pub chart: PathBuf,
}

/// Refresh the README metadata and progress chart, then commit everything
/// with the current word counts attached to the message.
///
/// Asks for a commit message when `message` is `None`.
#[instrument(skip_all, fields(root = %ctx.root().display()))]
pub fn save(
    ctx: &ProjectContext,
    runner: &dyn ProcessRunner,
    prompter: &dyn Prompter,
    message: Option<&str>,
    now: DateTime<Utc>,
) -> Result<SaveOutcome> {
    let message = match message {
        Some(m) => m.to_string(),
        None => prompter.text("Commit message?", None)?,
    };
    let settings = ctx.settings()?;
    let snapshot = word_counts(&ctx.content_dir())?;
    info!(total = snapshot.total, "counted words");

    // --- Phase 1: Chart ---
    let history = git::commit_history(runner, ctx.root()).unwrap_or_else(|e| {
        warn!(error = %e, "could not read word-count history");
        Vec::new()
    });
    let meta = settings.meta();
    let due = meta.data.date.as_deref().and_then(parse_due_date);
    let chart =
        ProgressChart::from_history(&history, snapshot.total, now, meta.target_word_count, due);
    let chart_path = ctx.root().join(PROGRESS_CHART_FILE);
    std::fs::write(&chart_path, chart.render_svg()).map_err(|e| PaperError::io(&chart_path, e))?;
    debug!(points = chart.points.len(), "wrote progress chart");

    // --- Phase 2: README ---
    let readme_path = ctx.root().join(README_FILE);
    let current = match std::fs::read_to_string(&readme_path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            readme::initial_readme(settings.class_mnemonic(), settings.assignment())
        }
        Err(e) => return Err(PaperError::io(&readme_path, e)),
    };
    let section = readme::metadata_section(&wc_table(&snapshot));
    std::fs::write(&readme_path, readme::splice_metadata(&current, &section))
        .map_err(|e| PaperError::io(&readme_path, e))?;

    // --- Phase 3: Commit ---
    git::add_all(runner, ctx.root())?;
    git::commit(
        runner,
        ctx.root(),
        &commit_message_with_trailer(&message, &snapshot)?,
    )?;
    info!("saved");

    Ok(SaveOutcome {
        snapshot,
        readme: readme_path,
        chart: chart_path,
    })
}

/// Push to the existing remote, or create one on GitHub first.
#[instrument(skip_all)]
pub fn push(ctx: &ProjectContext, runner: &dyn ProcessRunner, prompter: &dyn Prompter) -> Result<()> {
    if git::has_remote(runner, ctx.root())? {
        return git::push(runner, ctx.root());
    }

    let settings = ctx.settings()?;
    let default_name = format!(
        "{}_{}",
        settings.class_mnemonic().unwrap_or_default(),
        settings.assignment().unwrap_or_default()
    );
    let name = prompter.text("What should be the repository name?", Some(&default_name))?;
    let private = prompter.confirm("Private repository?", true)?;
    info!(%name, private, "creating remote repository");
    git::create_remote_repo(runner, ctx.root(), &name, private)
}

/// Open the repository's web page.
pub fn web(ctx: &ProjectContext, runner: &dyn ProcessRunner) -> Result<()> {
    git::browse(runner, ctx.root())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ScriptedPrompter;
    use crate::test_support::project;
    use chrono::TimeZone;
    use paper_history::readme::{END_SENTINEL, START_SENTINEL};
    use paper_history::{LOG_FORMAT, PAPER_DATA_SENTINEL};
    use paper_shared::{CommandOutput, Invocation, ScriptedRunner, Tool};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 2, 12, 0, 0).unwrap()
    }

    fn git_responder(inv: &Invocation) -> Result<CommandOutput> {
        Ok(match inv.args.first().map(String::as_str) {
            Some("log") => CommandOutput::ok(
                "aaa|||1711000000|||Draft\n\nPAPER_DATA\n{\"total\":40,\"breakdown\":{}}\n||-30-||\n\
                 bbb|||1710000000|||Initial project creation\n---\npaper 0.1.0\n||-30-||\n",
            ),
            _ => CommandOutput::ok(""),
        })
    }

    #[test]
    fn save_writes_readme_chart_and_commits_payload() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = project(tmp.path());
        let runner = ScriptedRunner::new(git_responder);

        let prompter = ScriptedPrompter::new(["Add intro"]);
        let outcome = save(&ctx, &runner, &prompter, None, now()).unwrap();
        assert_eq!(prompter.asked.borrow().as_slice(), ["Commit message?"]);

        let readme = std::fs::read_to_string(&outcome.readme).unwrap();
        assert!(readme.starts_with("# CS 101: Final Essay\n"));
        assert!(readme.contains(START_SENTINEL) && readme.contains(END_SENTINEL));
        assert!(readme.contains("![WordCountProgress](./progress.svg)"));
        assert!(readme.contains("**TOTAL**"));

        let svg = std::fs::read_to_string(&outcome.chart).unwrap();
        assert!(svg.starts_with("<svg"));

        let calls = runner.calls();
        assert_eq!(calls[0].args, ["log", LOG_FORMAT]);
        assert_eq!(calls[1].args, ["add", "."]);
        let message = &calls[2].args[2];
        let (head, payload) = message.split_once(PAPER_DATA_SENTINEL).unwrap();
        assert_eq!(head, "Add intro\n");
        let parsed: WordCountSnapshot = serde_json::from_str(payload).unwrap();
        assert_eq!(parsed, outcome.snapshot);
    }

    #[test]
    fn save_keeps_text_around_existing_markers() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = project(tmp.path());
        std::fs::write(
            ctx.root().join(README_FILE),
            format!("# Mine\n\nNotes.\n\n{START_SENTINEL}\nstale\n{END_SENTINEL}\n\nFooter\n"),
        )
        .unwrap();

        let runner = ScriptedRunner::new(git_responder);
        let prompter = ScriptedPrompter::new(Vec::<String>::new());
        let outcome = save(&ctx, &runner, &prompter, Some("wip"), now()).unwrap();

        let readme = std::fs::read_to_string(outcome.readme).unwrap();
        assert!(readme.starts_with("# Mine\n\nNotes.\n\n"));
        assert!(readme.ends_with(&format!("{END_SENTINEL}\n\nFooter\n")));
        assert!(!readme.contains("stale"));
    }

    #[test]
    fn save_survives_unreadable_history() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = project(tmp.path());
        let runner = ScriptedRunner::new(|inv| {
            Ok(match inv.args.first().map(String::as_str) {
                Some("log") => CommandOutput::failed(128, "fatal: no commits yet"),
                _ => CommandOutput::ok(""),
            })
        });

        save(&ctx, &runner, &ScriptedPrompter::new(["first"]), None, now()).unwrap();
        assert_eq!(runner.calls().len(), 3);
    }

    #[test]
    fn push_without_remote_creates_repository() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = project(tmp.path());
        let runner = ScriptedRunner::succeeding();
        let prompter = ScriptedPrompter::new(["", "n"]);

        push(&ctx, &runner, &prompter).unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].args, ["remote", "-v"]);
        assert_eq!(calls[1].program, Tool::Gh.program());
        assert_eq!(
            calls[1].args,
            ["repo", "create", "CS 101_Final Essay", "--source=.", "--push"]
        );
        assert!(calls[1].interactive);
    }

    #[test]
    fn push_with_remote_pushes() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = project(tmp.path());
        let runner = ScriptedRunner::new(|inv| {
            Ok(if inv.args.first().map(String::as_str) == Some("remote") {
                CommandOutput::ok("origin\tgit@github.com:me/essay.git (fetch)\n")
            } else {
                CommandOutput::ok("")
            })
        });
        let prompter = ScriptedPrompter::new(Vec::<String>::new());

        push(&ctx, &runner, &prompter).unwrap();

        assert_eq!(runner.calls()[1].args, ["push"]);
        assert!(prompter.asked.borrow().is_empty());
    }
}
