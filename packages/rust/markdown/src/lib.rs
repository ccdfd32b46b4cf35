//! Markdown content handling for paper projects.
//!
//! Discovers the content files that make up a document, strips their front
//! matter, counts words, and renders the word-count report. The generated
//! Markdown fragments spliced around the content at build time live in
//! [`fragments`].

pub mod fragments;

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};
use walkdir::WalkDir;

use paper_shared::{PaperError, Result, WordCountSnapshot};

/// Extension of content files.
pub const CONTENT_EXTENSION: &str = "md";

/// Input dialect handed to the converter: bracketed spans and raw TeX on,
/// automatic heading identifiers off.
pub const INPUT_FORMAT: &str = "markdown+bracketed_spans+raw_tex-auto_identifiers";

// ---------------------------------------------------------------------------
// Content discovery
// ---------------------------------------------------------------------------

/// One Markdown source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFile {
    /// Full path on disk.
    pub path: PathBuf,
    /// Path relative to the content directory, `/`-separated.
    pub relative: String,
}

/// All content files under `content_dir`, in document assembly order.
///
/// The order is lexicographic by relative path, independent of the order the
/// filesystem lists directory entries in.
#[instrument(skip_all, fields(dir = %content_dir.display()))]
pub fn content_files(content_dir: &Path) -> Result<Vec<ContentFile>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(content_dir).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(content_dir).to_path_buf();
            PaperError::io(path, std::io::Error::other(e.to_string()))
        })?;

        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(CONTENT_EXTENSION) {
            continue;
        }

        let relative = path
            .strip_prefix(content_dir)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        files.push(ContentFile {
            path: path.to_path_buf(),
            relative,
        });
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    debug!(count = files.len(), "discovered content files");
    Ok(files)
}

// ---------------------------------------------------------------------------
// Word counts
// ---------------------------------------------------------------------------

/// The body of a content file without its leading `---` front-matter block.
pub fn strip_front_matter(text: &str) -> &str {
    static FRONT_MATTER_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)\A---\r?\n.*?---\r?\n").expect("valid regex"));

    let trimmed = text.trim();
    match FRONT_MATTER_RE.find(trimmed) {
        Some(m) => &trimmed[m.end()..],
        None => trimmed,
    }
}

/// Number of whitespace-separated tokens in the body (front matter excluded).
pub fn count_words(text: &str) -> u64 {
    strip_front_matter(text).split_whitespace().count() as u64
}

/// Word counts for every content file under `content_dir`.
pub fn word_counts(content_dir: &Path) -> Result<WordCountSnapshot> {
    let mut counts = Vec::new();
    for file in content_files(content_dir)? {
        let text = std::fs::read_to_string(&file.path)
            .map_err(|e| PaperError::io(&file.path, e))?;
        counts.push((file.relative, count_words(&text)));
    }
    Ok(WordCountSnapshot::from_counts(counts))
}

/// Render the word-count report as a Markdown table.
pub fn wc_table(snapshot: &WordCountSnapshot) -> String {
    const FILE_HEADER: &str = "File";
    const COUNT_HEADER: &str = "Word Count";
    const TOTAL_LABEL: &str = "**TOTAL**";

    let name_width = snapshot
        .breakdown
        .keys()
        .map(|name| name.chars().count() + 2)
        .chain(["Files".len(), TOTAL_LABEL.len()])
        .max()
        .unwrap_or(TOTAL_LABEL.len());
    let count_width = snapshot
        .breakdown
        .values()
        .map(|count| count.to_string().len())
        .chain([COUNT_HEADER.len()])
        .max()
        .unwrap_or(COUNT_HEADER.len());

    let mut out = String::from("## Current word count:\n");
    out.push_str(&format!(
        "| {FILE_HEADER:<name_width$} | {COUNT_HEADER:<count_width$} |\n"
    ));
    out.push_str(&format!(
        "| {:-<name_width$} | {:-<count_width$} |\n",
        "", ""
    ));
    for (name, count) in &snapshot.breakdown {
        let quoted = format!("`{name}`");
        out.push_str(&format!(
            "| {quoted:<name_width$} | {count:<count_width$} |\n"
        ));
    }
    out.push_str(&format!(
        "| {TOTAL_LABEL:<name_width$} | {:<count_width$} |",
        snapshot.total
    ));
    out
}

/// Render the snapshot as the compact JSON used in commit trailers.
pub fn wc_json(snapshot: &WordCountSnapshot) -> Result<String> {
    serde_json::to_string(snapshot)
        .map_err(|e| PaperError::validation(format!("JSON serialization failed: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn content_files_are_sorted_by_relative_path() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "b.md", "b");
        touch(tmp.path(), "a/z.md", "z");
        touch(tmp.path(), "a-c.md", "c");
        touch(tmp.path(), "a.md", "a");
        touch(tmp.path(), "notes.txt", "ignored");

        let files = content_files(tmp.path()).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(names, vec!["a-c.md", "a.md", "a/z.md", "b.md"]);
    }

    #[test]
    fn front_matter_is_excluded_from_count() {
        let text = "---\ntitle: Something long here\n---\nOne two three.\n";
        assert_eq!(strip_front_matter(text), "One two three.");
        assert_eq!(count_words(text), 3);
    }

    #[test]
    fn body_after_front_matter_keeps_rules() {
        let text = "---\na: b\n---\nbefore\n---\nafter\n";
        assert_eq!(count_words(text), 3);
    }

    #[test]
    fn front_matter_with_crlf_line_endings_is_excluded() {
        assert_eq!(count_words("---\r\ntitle: A long title here\r\n---\r\nOne two\r\n"), 2);
        assert_eq!(strip_front_matter("---\r\na: b\r\n---\r\nBody\r\n"), "Body");
    }

    #[test]
    fn no_front_matter_counts_everything() {
        assert_eq!(count_words("  just some words \n\n here "), 4);
        assert_eq!(count_words(""), 0);
    }

    #[test]
    fn word_counts_key_by_relative_path() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "01_intro.md", "one two");
        touch(tmp.path(), "parts/02_body.md", "---\nx: y\n---\nthree four five");

        let snapshot = word_counts(tmp.path()).unwrap();
        assert_eq!(snapshot.total, 5);
        assert_eq!(snapshot.breakdown["01_intro.md"], 2);
        assert_eq!(snapshot.breakdown["parts/02_body.md"], 3);
    }

    #[test]
    fn wc_table_layout() {
        let snapshot = WordCountSnapshot::from_counts([
            ("01_intro.md".to_string(), 120),
            ("02.md".to_string(), 7),
        ]);
        let table = wc_table(&snapshot);
        let expected = "## Current word count:\n\
| File          | Word Count |\n\
| ------------- | ---------- |\n\
| `01_intro.md` | 120        |\n\
| `02.md`       | 7          |\n\
| **TOTAL**     | 127        |";
        assert_eq!(table, expected);
    }

    #[test]
    fn wc_table_empty_project() {
        let table = wc_table(&WordCountSnapshot::default());
        assert!(table.ends_with("| **TOTAL** | 0          |"));
    }

    #[test]
    fn wc_json_is_compact_and_parseable() {
        let snapshot = WordCountSnapshot::from_counts([("a \"b\".md".to_string(), 3)]);
        let json = wc_json(&snapshot).unwrap();
        assert_eq!(json, r#"{"total":3,"breakdown":{"a \"b\".md":3}}"#);
    }
}
