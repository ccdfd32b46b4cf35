//! Error types for paper.
//!
//! Library crates use [`PaperError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` and maps it to a process exit code.

use std::path::PathBuf;

/// Top-level error type for all paper operations.
#[derive(Debug, thiserror::Error)]
pub enum PaperError {
    /// The working directory does not look like a paper project.
    #[error("Not in a paper project directory: {path:?} (expected paper_meta.yml, content/ and .paper_resources/)")]
    NotProjectDir { path: PathBuf },

    /// A project name that is not a single plain path component.
    #[error("Invalid project name: '{0}'")]
    InvalidProjectName(String),

    /// Target directory for `new` already exists.
    #[error("Directory already exists: '{}'", .0.display())]
    DirectoryExists(PathBuf),

    /// `init` requires an empty directory.
    #[error("Directory needs to be empty to initialize project: '{}'", .0.display())]
    DirectoryNotEmpty(PathBuf),

    /// `dev` found the resource directory already linked to the template.
    #[error("Looks like this project is already set up for dev!")]
    AlreadyLinked(PathBuf),

    /// A configuration file held more than one YAML document.
    #[error("Found more than one meta document at '{}'.", .path.display())]
    MultipleDocuments { path: PathBuf },

    /// An output format string that names no known format.
    #[error(
        "Error: Invalid value for '--format': '{value}' is not one of {}.",
        .valid.iter().map(|v| format!("'{v}'")).collect::<Vec<_>>().join(", ")
    )]
    InvalidFormat {
        value: String,
        valid: Vec<&'static str>,
    },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An external program could not be found or started.
    #[error("could not run '{program}': {reason}")]
    ToolMissing { program: String, reason: String },

    /// An external program exited unsuccessfully.
    #[error("'{program}' exited with status {code}\n{stderr}")]
    ToolFailed {
        program: String,
        code: i32,
        stdout: String,
        stderr: String,
    },

    /// The typesetting engine failed; its output is surfaced verbatim.
    #[error("typesetting engine failed with status {code}")]
    Typesetting { code: i32, output: String },

    /// Word-processor archive could not be read or rewritten.
    #[error("document package error: {0}")]
    Package(String),

    /// The requested step has no implementation on this platform.
    #[error("unsupported on this platform: {0}")]
    UnsupportedPlatform(String),

    /// Data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PaperError>;

impl PaperError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a package error from any displayable message.
    pub fn package(msg: impl Into<String>) -> Self {
        Self::Package(msg.into())
    }

    /// Process exit code this error should terminate the CLI with.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidFormat { .. } => 2,
            Self::Typesetting { code, .. } if *code != 0 => *code,
            _ => 1,
        }
    }

    /// Whether this error is a plain user/environment mistake that should be
    /// reported as a single line rather than a full diagnostic report.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::NotProjectDir { .. }
                | Self::InvalidProjectName(_)
                | Self::DirectoryExists(_)
                | Self::DirectoryNotEmpty(_)
                | Self::AlreadyLinked(_)
                | Self::MultipleDocuments { .. }
                | Self::InvalidFormat { .. }
                | Self::Typesetting { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = PaperError::config("bad yaml");
        assert_eq!(err.to_string(), "config error: bad yaml");

        let err = PaperError::InvalidProjectName("../up".into());
        assert_eq!(err.to_string(), "Invalid project name: '../up'");
    }

    #[test]
    fn invalid_format_lists_all_values() {
        let err = PaperError::InvalidFormat {
            value: "pdf".into(),
            valid: vec!["docx", "json"],
        };
        assert_eq!(
            err.to_string(),
            "Error: Invalid value for '--format': 'pdf' is not one of 'docx', 'json'."
        );
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn exit_codes() {
        assert_eq!(
            PaperError::NotProjectDir { path: "/tmp".into() }.exit_code(),
            1
        );
        assert_eq!(
            PaperError::Typesetting {
                code: 12,
                output: String::new()
            }
            .exit_code(),
            12
        );
        assert!(PaperError::DirectoryNotEmpty("x".into()).is_user_error());
        assert!(!PaperError::package("zip").is_user_error());
    }
}
