//! Word-count history kept in git.
//!
//! Every `save` commit carries a trailer of the form
//!
//! ```text
//! <message>
//!
//! PAPER_DATA
//! {"total":1234,"breakdown":{...}}
//! ```
//!
//! This crate writes that trailer, mines it back out of `git log`, splices the
//! current counts into the project README ([`readme`]), and renders the
//! progress chart ([`chart`]). Thin wrappers over the git commands the tool
//! needs live in [`git`].

pub mod chart;
pub mod git;
pub mod readme;

use tracing::debug;

use paper_shared::{PaperError, Result, WordCountSnapshot};

/// Line that separates a commit message from its word-count payload.
pub const PAPER_DATA_SENTINEL: &str = "\nPAPER_DATA\n";

/// `git log` format: hash, commit time, raw body, record terminator.
pub const LOG_FORMAT: &str = "--format=%H|||%ct|||%B||-30-||";

const RECORD_SEPARATOR: &str = "||-30-||";
const FIELD_SEPARATOR: &str = "|||";

/// One commit that carried a word-count payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub hash: String,
    /// Commit time, seconds since the Unix epoch.
    pub timestamp: i64,
    /// Message text before the payload.
    pub message: String,
    pub snapshot: WordCountSnapshot,
}

impl CommitRecord {
    pub fn word_count(&self) -> u64 {
        self.snapshot.total
    }
}

/// Append the word-count payload to a commit message.
pub fn commit_message_with_trailer(message: &str, snapshot: &WordCountSnapshot) -> Result<String> {
    let payload = serde_json::to_string(snapshot)
        .map_err(|e| PaperError::validation(format!("JSON serialization failed: {e}")))?;
    Ok(format!("{message}\n{PAPER_DATA_SENTINEL}{payload}"))
}

/// Parse the output of `git log` run with [`LOG_FORMAT`].
///
/// Commits without a payload, or with one that is not valid JSON, are
/// skipped. The result keeps git's order (newest first).
pub fn parse_log(output: &str) -> Vec<CommitRecord> {
    output
        .trim()
        .split(RECORD_SEPARATOR)
        .map(str::trim)
        .filter(|record| !record.is_empty())
        .filter_map(parse_record)
        .collect()
}

fn parse_record(record: &str) -> Option<CommitRecord> {
    let mut fields = record.splitn(3, FIELD_SEPARATOR);
    let hash = fields.next()?.trim().to_string();
    let timestamp = fields.next()?.trim().parse::<i64>().ok()?;
    let body = fields.next()?;

    let (message, payload) = body.split_once(PAPER_DATA_SENTINEL)?;
    let snapshot: WordCountSnapshot = match serde_json::from_str(payload.trim()) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            debug!(hash = %hash, error = %e, "skipping commit with unreadable payload");
            return None;
        }
    };

    Some(CommitRecord {
        hash,
        timestamp,
        message: message.trim_end().to_string(),
        snapshot,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(hash: &str, ts: i64, body: &str) -> String {
        format!("{hash}|||{ts}|||{body}{RECORD_SEPARATOR}\n")
    }

    #[test]
    fn trailer_layout() {
        let snap = WordCountSnapshot::from_counts([("a.md".to_string(), 3)]);
        let message = commit_message_with_trailer("Draft intro", &snap).unwrap();
        assert_eq!(
            message,
            "Draft intro\n\nPAPER_DATA\n{\"total\":3,\"breakdown\":{\"a.md\":3}}"
        );
    }

    #[test]
    fn parses_payload_commits_newest_first() {
        let log = [
            record("bbb", 200, "More\n\nPAPER_DATA\n{\"total\":50,\"breakdown\":{}}\n"),
            record("aaa", 100, "Start\n\nPAPER_DATA\n{\"total\":10}\n"),
        ]
        .concat();

        let records = parse_log(&log);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].hash, "bbb");
        assert_eq!(records[0].word_count(), 50);
        assert_eq!(records[0].message, "More");
        assert_eq!(records[1].timestamp, 100);
        assert_eq!(records[1].word_count(), 10);
    }

    #[test]
    fn skips_commits_without_valid_payload() {
        let log = [
            record("ccc", 300, "Initial project creation\n---\npaper v0.1.0\n"),
            record("ddd", 400, "Broken\n\nPAPER_DATA\n{not json\n"),
            record("eee", 500, "Good\n\nPAPER_DATA\n{\"total\":7,\"breakdown\":{\"x.md\":7}}\n"),
        ]
        .concat();

        let records = parse_log(&log);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].hash, "eee");
    }

    #[test]
    fn trailer_roundtrips_through_log_format() {
        let snap = WordCountSnapshot::from_counts([("01.md".to_string(), 42)]);
        let message = commit_message_with_trailer("Save", &snap).unwrap();
        let log = record("fff", 600, &format!("{message}\n"));

        let records = parse_log(&log);
        assert_eq!(records[0].snapshot, snap);
    }

    #[test]
    fn empty_log_has_no_records() {
        assert!(parse_log("").is_empty());
        assert!(parse_log("\n").is_empty());
    }
}
