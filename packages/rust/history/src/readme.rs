//! The generated metadata section of the project README.

/// Opening marker of the generated section.
pub const START_SENTINEL: &str = "<!-- begin paper metadata -->";
/// Closing marker of the generated section.
pub const END_SENTINEL: &str = "<!-- end paper metadata -->";

/// Name of the chart file written next to the README.
pub const PROGRESS_CHART_FILE: &str = "progress.svg";

/// A fresh README with a heading and an empty metadata section.
pub fn initial_readme(mnemonic: Option<&str>, assignment: Option<&str>) -> String {
    let heading = match (mnemonic, assignment) {
        (Some(m), Some(a)) => format!("{m}: {a}"),
        (Some(m), None) => m.to_string(),
        (None, Some(a)) => a.to_string(),
        (None, None) => "Paper".to_string(),
    };
    format!("# {heading}\n\n{START_SENTINEL}\n{END_SENTINEL}\n")
}

/// The body placed between the markers: the word-count table and the chart.
pub fn metadata_section(wc_table: &str) -> String {
    format!("{wc_table}\n\n![WordCountProgress](./{PROGRESS_CHART_FILE})")
}

/// Replace whatever sits between the markers with `section`.
///
/// Text outside the markers is preserved. When either marker is missing, a
/// fresh pair is appended at the end.
pub fn splice_metadata(readme: &str, section: &str) -> String {
    let bounds = readme.find(START_SENTINEL).and_then(|start| {
        readme[start..]
            .find(END_SENTINEL)
            .map(|end| (start, start + end + END_SENTINEL.len()))
    });

    let (before, after) = match bounds {
        Some((start, end)) => (&readme[..start], &readme[end..]),
        None => (readme, "\n"),
    };

    let mut out = String::with_capacity(readme.len() + section.len() + 64);
    out.push_str(before);
    if bounds.is_none() && !before.is_empty() && !before.ends_with("\n\n") {
        out.push_str(if before.ends_with('\n') { "\n" } else { "\n\n" });
    }
    out.push_str(START_SENTINEL);
    out.push('\n');
    out.push_str(section);
    out.push('\n');
    out.push_str(END_SENTINEL);
    out.push_str(after);
    out
}
