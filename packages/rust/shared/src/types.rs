//! Core domain types shared across paper crates.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PaperError;

/// Tool name used in version stamps and generated metadata.
pub const TOOL_NAME: &str = "paper";

/// Tool version baked in at compile time.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Human-readable version stamp, written into commits and build records.
pub fn version_stamp() -> String {
    format!("{TOOL_NAME} v{TOOL_VERSION}")
}

// ---------------------------------------------------------------------------
// OutputFormat
// ---------------------------------------------------------------------------

/// Every output the build pipeline can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Word-processor document.
    #[default]
    #[serde(rename = "docx")]
    Docx,
    /// Word-processor document plus a PDF exported by the word processor.
    #[serde(rename = "docx+pdf")]
    DocxPdf,
    /// Typesetting-engine source.
    #[serde(rename = "latex")]
    Latex,
    /// Typesetting-engine source plus the typeset PDF.
    #[serde(rename = "latex+pdf")]
    LatexPdf,
    /// The converter's structured AST dump.
    #[serde(rename = "json")]
    Json,
}

impl OutputFormat {
    /// All formats in presentation order.
    pub const ALL: [OutputFormat; 5] = [
        Self::Docx,
        Self::DocxPdf,
        Self::Latex,
        Self::LatexPdf,
        Self::Json,
    ];

    /// The user-facing names of every format, in presentation order.
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|f| f.as_str()).collect()
    }

    /// The user-facing name of this format.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Docx => "docx",
            Self::DocxPdf => "docx+pdf",
            Self::Latex => "latex",
            Self::LatexPdf => "latex+pdf",
            Self::Json => "json",
        }
    }

    /// File suffix of the converter's own output.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Docx | Self::DocxPdf => "docx",
            Self::Latex | Self::LatexPdf => "tex",
            Self::Json => "json",
        }
    }

    /// The converter's `--to` writer name.
    pub fn writer(&self) -> &'static str {
        match self {
            Self::Docx | Self::DocxPdf => "docx",
            Self::Latex | Self::LatexPdf => "latex",
            Self::Json => "json",
        }
    }

    pub fn is_docx(&self) -> bool {
        matches!(self, Self::Docx | Self::DocxPdf)
    }

    pub fn is_latex(&self) -> bool {
        matches!(self, Self::Latex | Self::LatexPdf)
    }

    /// Whether a fixed-layout PDF derivative is produced after conversion.
    pub fn wants_pdf(&self) -> bool {
        matches!(self, Self::DocxPdf | Self::LatexPdf)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = PaperError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| PaperError::InvalidFormat {
                value: s.to_string(),
                valid: Self::names(),
            })
    }
}

// ---------------------------------------------------------------------------
// WordCountSnapshot
// ---------------------------------------------------------------------------

/// Word counts for a project at one point in time.
///
/// Serialized as the payload of the commit-message trailer, so the field
/// names are part of the on-disk history format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordCountSnapshot {
    /// Sum of every file's count.
    pub total: u64,
    /// Count per content file, keyed by path relative to `content/`.
    #[serde(default)]
    pub breakdown: BTreeMap<String, u64>,
}

impl WordCountSnapshot {
    /// Build a snapshot from per-file counts.
    pub fn from_counts(counts: impl IntoIterator<Item = (String, u64)>) -> Self {
        let breakdown: BTreeMap<String, u64> = counts.into_iter().collect();
        let total = breakdown.values().sum();
        Self { total, breakdown }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_roundtrip_through_names() {
        for format in OutputFormat::ALL {
            let parsed: OutputFormat = format.as_str().parse().expect("parse format");
            assert_eq!(parsed, format);
        }
    }

    #[test]
    fn unknown_format_names_every_valid_value() {
        let err = "pdf".parse::<OutputFormat>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'pdf'"));
        for name in OutputFormat::names() {
            assert!(msg.contains(&format!("'{name}'")), "missing {name} in {msg}");
        }
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn format_properties() {
        assert_eq!(OutputFormat::LatexPdf.suffix(), "tex");
        assert_eq!(OutputFormat::DocxPdf.writer(), "docx");
        assert!(OutputFormat::DocxPdf.wants_pdf());
        assert!(!OutputFormat::Json.wants_pdf());
        assert_eq!(OutputFormat::default(), OutputFormat::Docx);
    }

    #[test]
    fn snapshot_totals_breakdown() {
        let snap = WordCountSnapshot::from_counts([
            ("01_intro.md".to_string(), 120),
            ("02_body.md".to_string(), 30),
        ]);
        assert_eq!(snap.total, 150);
        let json = serde_json::to_string(&snap).expect("serialize");
        assert_eq!(
            json,
            r#"{"total":150,"breakdown":{"01_intro.md":120,"02_body.md":30}}"#
        );
    }

    #[test]
    fn version_stamp_names_tool() {
        assert!(version_stamp().starts_with("paper v"));
    }
}
