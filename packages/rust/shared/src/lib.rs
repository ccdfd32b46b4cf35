//! Shared types, error model, settings, and process plumbing for paper.
//!
//! This crate is the foundation depended on by all other paper crates.
//! It provides:
//! - [`PaperError`] — the unified error type
//! - Settings resolution ([`Settings`], [`resolve_settings`], [`merge_mapping`])
//! - The per-invocation [`ProjectContext`]
//! - Domain types ([`OutputFormat`], [`WordCountSnapshot`])
//! - External process invocation ([`ProcessRunner`], [`Invocation`])

pub mod config;
pub mod context;
pub mod error;
pub mod process;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    CONFIG_FILE_NAME, DocumentData, DocxSettings, LatexSettings, PaperMeta, Settings,
    discover_chain, is_placeholder, load_document, merge_mapping, resolve_settings,
};
pub use context::{
    CONTENT_DIR, DATA_DIR, OUTPUT_DIR, ProjectContext, RESEARCH_DIR, RESOURCES_DIR,
    is_project_dir,
};
pub use error::{PaperError, Result};
#[cfg(any(test, feature = "test-support"))]
pub use process::ScriptedRunner;
pub use process::{CommandOutput, Invocation, ProcessRunner, SystemRunner, Tool};
pub use types::{OutputFormat, TOOL_NAME, TOOL_VERSION, WordCountSnapshot, version_stamp};
