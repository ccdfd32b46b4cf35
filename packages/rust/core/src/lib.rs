//! Core workflows for paper.
//!
//! This crate ties settings, content discovery, the external converter, and
//! the document post-processors together into the commands the CLI exposes:
//! [`pipeline::build`], [`project`] setup, [`save`] and friends, and
//! [`fmt::fmt`].

pub mod command;
pub mod finish;
pub mod fmt;
pub mod pipeline;
pub mod project;
pub mod prompt;
pub mod record;
pub mod save;

pub use pipeline::{BuildOutcome, BuildRequest, ProgressReporter, SilentProgress, build};
pub use prompt::Prompter;
