//! Per-invocation project context.
//!
//! A [`ProjectContext`] is created once by the CLI and threaded through every
//! stage. Settings are resolved on first access and memoized, so repeated
//! queries return the same object without touching the disk again.

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;

use crate::config::{CONFIG_FILE_NAME, Settings, resolve_settings};
use crate::error::{PaperError, Result};

/// Directory holding the Markdown sources.
pub const CONTENT_DIR: &str = "content";
/// Directory receiving build outputs.
pub const OUTPUT_DIR: &str = "output";
/// Directory receiving build records.
pub const DATA_DIR: &str = ".paper_data";
/// Directory holding filters, styles, and templates.
pub const RESOURCES_DIR: &str = ".paper_resources";
/// Scratch directory for research notes, created by `init`.
pub const RESEARCH_DIR: &str = "research";

/// A project root plus its lazily resolved settings.
#[derive(Debug)]
pub struct ProjectContext {
    root: PathBuf,
    settings: OnceCell<Settings>,
}

impl ProjectContext {
    /// Context for `root` without checking the project layout.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            settings: OnceCell::new(),
        }
    }

    /// Context for `root`, failing unless it is a project directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !is_project_dir(&root) {
            return Err(PaperError::NotProjectDir { path: root });
        }
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    pub fn content_dir(&self) -> PathBuf {
        self.root.join(CONTENT_DIR)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    pub fn resources_dir(&self) -> PathBuf {
        self.root.join(RESOURCES_DIR)
    }

    /// The merged settings, resolved once per context.
    pub fn settings(&self) -> Result<&Settings> {
        self.settings.get_or_try_init(|| resolve_settings(&self.root))
    }
}

/// Whether `path` has the layout of a paper project.
pub fn is_project_dir(path: &Path) -> bool {
    path.join(CONFIG_FILE_NAME).is_file()
        && path.join(CONTENT_DIR).is_dir()
        && path.join(RESOURCES_DIR).is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scaffold(root: &Path) {
        std::fs::write(root.join(CONFIG_FILE_NAME), "data:\n  title: Essay\n").unwrap();
        std::fs::create_dir_all(root.join(CONTENT_DIR)).unwrap();
        std::fs::create_dir_all(root.join(RESOURCES_DIR)).unwrap();
    }

    #[test]
    fn open_rejects_plain_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let err = ProjectContext::open(tmp.path()).unwrap_err();
        assert!(matches!(err, PaperError::NotProjectDir { .. }));
    }

    #[test]
    fn settings_are_memoized() {
        let tmp = tempfile::tempdir().unwrap();
        scaffold(tmp.path());
        let ctx = ProjectContext::open(tmp.path()).unwrap();

        let first = ctx.settings().unwrap() as *const Settings;
        // Later edits are not observed: the first resolution sticks.
        std::fs::write(ctx.config_path(), "data:\n  title: Changed\n").unwrap();
        let second = ctx.settings().unwrap();

        assert!(std::ptr::eq(first, second));
        assert_eq!(second.assignment(), Some("Essay"));
    }
}
