//! Project scaffolding: `new`, `init`, and `dev`.

use std::path::{Component, Path, PathBuf};

use include_dir::{Dir, include_dir};
use tracing::{debug, info, instrument, warn};

use paper_history::git;
use paper_shared::{
    CONFIG_FILE_NAME, PaperError, ProcessRunner, ProjectContext, RESEARCH_DIR,
    Result, TOOL_NAME, resolve_settings, version_stamp,
};

use crate::prompt::Prompter;

/// Files every new project starts from.
static TEMPLATE: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/resources/project_template");

/// The template's resource directory in the source tree, linked by `dev`.
pub const TEMPLATE_RESOURCES: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/resources/project_template/.paper_resources"
);

/// What `dev` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevOutcome {
    Linked,
    Declined,
}

/// Accept only a single plain path component, written in normal form.
pub fn validate_project_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    let valid = match (components.next(), components.next()) {
        (Some(Component::Normal(c)), None) => c == name,
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(PaperError::InvalidProjectName(name.to_string()))
    }
}

/// Create `parent/name` and initialize a project in it.
#[instrument(skip_all, fields(name = %name))]
pub fn new_project(parent: &Path, name: &str, runner: &dyn ProcessRunner) -> Result<PathBuf> {
    validate_project_name(name)?;

    let dir = parent.join(name);
    if dir.exists() {
        return Err(PaperError::DirectoryExists(PathBuf::from(name)));
    }
    std::fs::create_dir(&dir).map_err(|e| PaperError::io(&dir, e))?;
    info!(path = %dir.display(), "starting new project");

    init_project(&dir, runner)?;
    Ok(dir)
}

/// Set up a project in the empty directory `dir`.
///
/// The settings chain is folded from `dir` upward and the merged result is
/// written back, so values set by enclosing directories show up in the new
/// project's `paper_meta.yml`.
#[instrument(skip_all, fields(dir = %dir.display()))]
pub fn init_project(dir: &Path, runner: &dyn ProcessRunner) -> Result<()> {
    let mut entries = std::fs::read_dir(dir).map_err(|e| PaperError::io(dir, e))?;
    if entries.next().is_some() {
        return Err(PaperError::DirectoryNotEmpty(dir.to_path_buf()));
    }

    // --- Phase 1: Template ---
    TEMPLATE.extract(dir).map_err(|e| PaperError::io(dir, e))?;
    debug!("extracted project template");

    // --- Phase 2: Settings ---
    let settings = resolve_settings(dir)?;
    let config_path = dir.join(CONFIG_FILE_NAME);
    std::fs::write(&config_path, settings.to_yaml_document()?)
        .map_err(|e| PaperError::io(&config_path, e))?;
    debug!(layers = settings.chain().len(), "wrote merged settings");

    let research = dir.join(RESEARCH_DIR);
    std::fs::create_dir_all(&research).map_err(|e| PaperError::io(&research, e))?;

    // --- Phase 3: Repository ---
    let message = format!("Initial project creation\n---\n{}", version_stamp());
    let repo = git::init(runner, dir)
        .and_then(|()| git::add_all(runner, dir))
        .and_then(|()| git::commit(runner, dir, &message));
    if let Err(e) = repo {
        warn!(error = %e, "could not create the initial commit");
    }

    info!("project initialized");
    Ok(())
}

/// Replace the project's resources with a link to the template sources.
pub fn dev(ctx: &ProjectContext, prompter: &dyn Prompter) -> Result<DevOutcome> {
    dev_link(ctx, prompter, Path::new(TEMPLATE_RESOURCES))
}

/// [`dev`] against an explicit source directory.
#[instrument(skip_all, fields(source = %source.display()))]
pub fn dev_link(ctx: &ProjectContext, prompter: &dyn Prompter, source: &Path) -> Result<DevOutcome> {
    let target = ctx.resources_dir();
    if !source.is_dir() {
        return Err(PaperError::validation(format!(
            "template resources not found at {}",
            source.display()
        )));
    }

    let is_link = std::fs::symlink_metadata(&target)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false);
    if is_link && same_file(&target, source) {
        return Err(PaperError::AlreadyLinked(target));
    }

    let question = format!(
        "This symlinks the package resource directory to this local one, deleting the local version.\n\
         It's meant for development on {TOOL_NAME} itself.\n\
         Is that what you're up to?"
    );
    if !prompter.confirm(&question, false)? {
        return Ok(DevOutcome::Declined);
    }

    if is_link {
        remove_link(&target)?;
    } else if target.exists() {
        std::fs::remove_dir_all(&target).map_err(|e| PaperError::io(&target, e))?;
    }
    symlink_dir(source, &target)?;
    info!(link = %target.display(), "linked template resources");
    Ok(DevOutcome::Linked)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(unix)]
fn remove_link(link: &Path) -> Result<()> {
    std::fs::remove_file(link).map_err(|e| PaperError::io(link, e))
}

#[cfg(windows)]
fn remove_link(link: &Path) -> Result<()> {
    std::fs::remove_dir(link).map_err(|e| PaperError::io(link, e))
}

#[cfg(unix)]
fn symlink_dir(source: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(source, link).map_err(|e| PaperError::io(link, e))
}

#[cfg(windows)]
fn symlink_dir(source: &Path, link: &Path) -> Result<()> {
    std::os::windows::fs::symlink_dir(source, link).map_err(|e| PaperError::io(link, e))
}

#[cfg(not(any(unix, windows)))]
fn remove_link(_link: &Path) -> Result<()> {
    Err(PaperError::UnsupportedPlatform("symbolic links".into()))
}

#[cfg(not(any(unix, windows)))]
fn symlink_dir(_source: &Path, _link: &Path) -> Result<()> {
    Err(PaperError::UnsupportedPlatform("symbolic links".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ScriptedPrompter;
    use paper_shared::{CommandOutput, RESOURCES_DIR, ScriptedRunner, is_project_dir};

    #[test]
    fn project_names_must_be_plain() {
        for good in ["essay", "final-paper", "2024_thesis"] {
            assert!(validate_project_name(good).is_ok(), "{good}");
        }
        for bad in ["", ".", "..", "a/b", "essay/", "./essay", "/essay"] {
            let err = validate_project_name(bad).unwrap_err();
            assert!(matches!(err, PaperError::InvalidProjectName(_)), "{bad}");
            assert_eq!(err.exit_code(), 1);
        }
    }

    #[test]
    fn new_refuses_existing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("essay")).unwrap();
        let runner = ScriptedRunner::succeeding();

        let err = new_project(tmp.path(), "essay", &runner).unwrap_err();
        assert!(matches!(err, PaperError::DirectoryExists(_)));
        assert_eq!(err.to_string(), "Directory already exists: 'essay'");
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn init_refuses_non_empty_directory() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "x").unwrap();

        let err = init_project(tmp.path(), &ScriptedRunner::succeeding()).unwrap_err();
        assert!(matches!(err, PaperError::DirectoryNotEmpty(_)));
    }

    #[test]
    fn new_scaffolds_merges_and_commits() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            "data:\n  author: Liesegang, Shane\n  class_mnemonic: CS 101\n",
        )
        .unwrap();
        let runner = ScriptedRunner::succeeding();

        let dir = new_project(tmp.path(), "essay", &runner).unwrap();

        assert!(is_project_dir(&dir));
        assert!(dir.join(RESEARCH_DIR).is_dir());
        assert!(dir.join(".gitignore").is_file());
        assert!(dir.join(RESOURCES_DIR).join("filters").is_dir());

        let meta = std::fs::read_to_string(dir.join(CONFIG_FILE_NAME)).unwrap();
        assert!(meta.starts_with("---\n") && meta.ends_with("---\n"));
        let settings = resolve_settings(&dir).unwrap();
        assert_eq!(settings.author(), Some("Liesegang, Shane"));
        assert_eq!(settings.class_mnemonic(), Some("CS 101"));
        assert_eq!(settings.meta().data.title.as_deref(), Some("[TITLE]"));

        let calls = runner.calls();
        let args: Vec<Vec<String>> = calls.iter().map(|c| c.args.clone()).collect();
        assert_eq!(args[0], ["init"]);
        assert_eq!(args[1], ["add", "."]);
        assert_eq!(args[2][..2], ["commit", "-m"]);
        assert!(args[2][2].starts_with("Initial project creation\n---\n"));
        assert!(calls.iter().all(|c| c.cwd.as_deref() == Some(dir.as_path())));
    }

    #[test]
    fn git_failure_during_init_is_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new(|_| Ok(CommandOutput::failed(128, "not a repo")));

        init_project(tmp.path(), &runner).unwrap();
        assert!(is_project_dir(tmp.path()));
        assert_eq!(runner.calls().len(), 1, "stops after the first git failure");
    }

    #[cfg(unix)]
    #[test]
    fn dev_links_after_confirmation_then_refuses() {
        let tmp = tempfile::tempdir().unwrap();
        let project = tmp.path().join("essay");
        std::fs::create_dir(&project).unwrap();
        init_project(&project, &ScriptedRunner::succeeding()).unwrap();
        let source = tmp.path().join("template-resources");
        std::fs::create_dir(&source).unwrap();
        let ctx = ProjectContext::new(&project);

        let declined = dev_link(&ctx, &ScriptedPrompter::new(["n"]), &source).unwrap();
        assert_eq!(declined, DevOutcome::Declined);
        assert!(!ctx.resources_dir().is_symlink());

        let linked = dev_link(&ctx, &ScriptedPrompter::new(["y"]), &source).unwrap();
        assert_eq!(linked, DevOutcome::Linked);
        assert!(ctx.resources_dir().is_symlink());

        let prompter = ScriptedPrompter::new(["y"]);
        let err = dev_link(&ctx, &prompter, &source).unwrap_err();
        assert!(matches!(err, PaperError::AlreadyLinked(_)));
        assert_eq!(err.exit_code(), 1);
        assert!(prompter.asked.borrow().is_empty());
    }
}
