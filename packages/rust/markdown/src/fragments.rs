//! Generated Markdown spliced around the content files at build time.

use paper_shared::DocumentData;

/// Raw OpenXML page break, passed through by the docx writer.
const DOCX_PAGE_BREAK: &str = "```{=openxml}\n<w:p><w:r><w:br w:type=\"page\"/></w:r></w:p>\n```\n";

/// Raw LaTeX page break.
const LATEX_PAGE_BREAK: &str = "```{=latex}\n\\clearpage\n```\n";

/// Heading placed above the bibliography.
pub const WORKS_CITED_HEADING: &str = "Works Cited";

/// Title page for word-processor output.
///
/// Each line becomes a paragraph in a custom style (`Title`, `Author`) so the
/// reference document controls its appearance.
pub fn docx_title_page(data: &DocumentData) -> String {
    let mut out = String::new();

    styled(&mut out, "Title", data.title.as_deref().unwrap_or_default());
    if let Some(subtitle) = data.subtitle.as_deref().filter(|s| !s.is_empty()) {
        styled(&mut out, "Subtitle", subtitle);
    }
    if let Some(author) = data.author.as_deref() {
        styled(&mut out, "Author", "by");
        styled(&mut out, "Author", author);
    }

    let course = match (data.class_mnemonic.as_deref(), data.class_name.as_deref()) {
        (Some(m), Some(n)) => Some(format!("{m} — {n}")),
        (Some(m), None) => Some(m.to_string()),
        (None, Some(n)) => Some(n.to_string()),
        (None, None) => None,
    };
    let details: Vec<&str> = [data.professor.as_deref(), course.as_deref(), data.date.as_deref()]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect();
    if !details.is_empty() {
        // Line blocks keep one entry per line inside a single paragraph.
        let lines: Vec<String> = details.iter().map(|d| format!("| {d}")).collect();
        styled(&mut out, "Author", &lines.join("\n"));
    }

    out.push_str(DOCX_PAGE_BREAK);
    out
}

/// Bibliography heading and placement for word-processor output.
pub fn docx_works_cited() -> String {
    let mut out = String::new();
    out.push('\n');
    out.push_str(DOCX_PAGE_BREAK);
    styled(&mut out, "Bibliography Heading", WORKS_CITED_HEADING);
    out.push_str(REFS_DIV);
    out
}

/// Bibliography heading and placement for typesetting output.
pub fn latex_works_cited() -> String {
    let mut out = String::new();
    out.push('\n');
    out.push_str(LATEX_PAGE_BREAK);
    out.push_str(&format!("\n# {WORKS_CITED_HEADING} {{.unnumbered}}\n\n"));
    out.push_str(REFS_DIV);
    out
}

const REFS_DIV: &str = "\n::: {#refs}\n:::\n";

fn styled(out: &mut String, style: &str, text: &str) {
    out.push_str(&format!("\n::: {{custom-style=\"{style}\"}}\n{text}\n:::\n"));
}
