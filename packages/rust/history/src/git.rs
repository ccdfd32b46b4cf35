//! The git and gh invocations the tool relies on.

use std::path::Path;

use tracing::debug;

use paper_shared::{Invocation, ProcessRunner, Result, Tool};

use crate::{CommitRecord, LOG_FORMAT, parse_log};

fn git(root: &Path) -> Invocation {
    Tool::Git.invocation().current_dir(root)
}

fn gh(root: &Path) -> Invocation {
    Tool::Gh.invocation().current_dir(root)
}

/// Word-count history of the repository at `root`, newest first.
pub fn commit_history(runner: &dyn ProcessRunner, root: &Path) -> Result<Vec<CommitRecord>> {
    let output = runner.run_checked(&git(root).args(["log", LOG_FORMAT]))?;
    let records = parse_log(&output.stdout_string());
    debug!(count = records.len(), "read word-count history");
    Ok(records)
}

/// Number of commits reachable from `HEAD`.
pub fn commit_count(runner: &dyn ProcessRunner, root: &Path) -> Result<u32> {
    let output = runner.run_checked(&git(root).args(["rev-list", "--count", "HEAD"]))?;
    let text = output.stdout_string();
    text.trim().parse().map_err(|_| {
        paper_shared::PaperError::validation(format!("unexpected commit count: {text:?}"))
    })
}

/// Abbreviated hash of `HEAD`.
pub fn head_short_hash(runner: &dyn ProcessRunner, root: &Path) -> Result<String> {
    let output = runner.run_checked(&git(root).args(["rev-parse", "--short", "HEAD"]))?;
    Ok(output.stdout_string().trim().to_string())
}

/// Whether any remote is configured.
pub fn has_remote(runner: &dyn ProcessRunner, root: &Path) -> Result<bool> {
    let output = runner.run_checked(&git(root).args(["remote", "-v"]))?;
    Ok(!output.stdout.iter().all(u8::is_ascii_whitespace))
}

pub fn init(runner: &dyn ProcessRunner, root: &Path) -> Result<()> {
    runner.run_checked(&git(root).arg("init"))?;
    Ok(())
}

/// Stage everything.
pub fn add_all(runner: &dyn ProcessRunner, root: &Path) -> Result<()> {
    runner.run_checked(&git(root).args(["add", "."]))?;
    Ok(())
}

pub fn commit(runner: &dyn ProcessRunner, root: &Path, message: &str) -> Result<()> {
    runner.run_checked(&git(root).args(["commit", "-m", message]))?;
    Ok(())
}

/// Push the current branch, with the terminal attached for credentials.
pub fn push(runner: &dyn ProcessRunner, root: &Path) -> Result<()> {
    runner.run_checked(&git(root).arg("push").interactive())?;
    Ok(())
}

/// Create a GitHub repository from the project and push to it.
pub fn create_remote_repo(
    runner: &dyn ProcessRunner,
    root: &Path,
    name: &str,
    private: bool,
) -> Result<()> {
    let mut invocation = gh(root).args(["repo", "create", name, "--source=.", "--push"]);
    if private {
        invocation = invocation.arg("--private");
    }
    runner.run_checked(&invocation.interactive())?;
    Ok(())
}

/// Open the repository page in a browser.
pub fn browse(runner: &dyn ProcessRunner, root: &Path) -> Result<()> {
    runner.run_checked(&gh(root).arg("browse").interactive())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use paper_shared::{CommandOutput, PaperError, ScriptedRunner};

    #[test]
    fn commit_count_parses_stdout() {
        let runner = ScriptedRunner::new(|_| Ok(CommandOutput::ok("17\n")));
        assert_eq!(commit_count(&runner, Path::new("/p")).unwrap(), 17);

        let call = &runner.calls()[0];
        assert_eq!(call.args, vec!["rev-list", "--count", "HEAD"]);
        assert_eq!(call.cwd.as_deref(), Some(Path::new("/p")));
    }

    #[test]
    fn commit_count_fails_without_history() {
        let runner = ScriptedRunner::new(|_| {
            Ok(CommandOutput::failed(128, "fatal: bad revision 'HEAD'"))
        });
        let err = commit_count(&runner, Path::new("/p")).unwrap_err();
        assert!(matches!(err, PaperError::ToolFailed { code: 128, .. }));
    }

    #[test]
    fn remote_detection() {
        let none = ScriptedRunner::new(|_| Ok(CommandOutput::ok("\n")));
        assert!(!has_remote(&none, Path::new("/p")).unwrap());

        let some = ScriptedRunner::new(|_| {
            Ok(CommandOutput::ok("origin\tgit@github.com:me/x.git (fetch)\n"))
        });
        assert!(has_remote(&some, Path::new("/p")).unwrap());
    }

    #[test]
    fn private_repo_creation_arguments() {
        let runner = ScriptedRunner::succeeding();
        create_remote_repo(&runner, Path::new("/p"), "CS101_Essay", true).unwrap();

        let call = &runner.calls()[0];
        assert_eq!(
            call.args,
            vec!["repo", "create", "CS101_Essay", "--source=.", "--push", "--private"]
        );
        assert!(call.interactive);
    }

    #[test]
    fn history_uses_log_format() {
        let runner = ScriptedRunner::new(|_| {
            Ok(CommandOutput::ok(
                "abc|||100|||Save\n\nPAPER_DATA\n{\"total\":5}\n||-30-||\n",
            ))
        });
        let records = commit_history(&runner, Path::new("/p")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(runner.calls()[0].args, vec!["log", LOG_FORMAT]);
    }
}
