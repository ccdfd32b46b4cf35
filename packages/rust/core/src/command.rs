//! Converter command assembly.
//!
//! Turns resolved settings and an output format into a [`BuildPlan`]: the
//! ordered converter arguments plus the temporary inputs they reference. The
//! temporaries live exactly as long as the plan, so dropping it (on success
//! or on any error path) removes them.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

use paper_markdown::{INPUT_FORMAT, content_files, fragments};
use paper_shared::{
    CONTENT_DIR, Invocation, OUTPUT_DIR, OutputFormat, PaperError, ProcessRunner,
    ProjectContext, Result, Settings, Tool,
};

/// Citation style used when `use_ibid` is off.
pub const CSL_SHORT_TITLE: &str = "chicago-fullnote-bibliography-short-title-subsequent.csl";
/// Citation style used when `use_ibid` is on.
pub const CSL_IBID: &str = "chicago-fullnote-bibliography-with-ibid.csl";

const DEFAULT_REFERENCE_DOC: &str = "reference.docx";
const DEFAULT_LATEX_TEMPLATE: &str = "latex/template.tex";

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// Everything needed to run the converter once.
#[derive(Debug)]
pub struct BuildPlan {
    pub format: OutputFormat,
    /// Extension of the converter's output file.
    pub suffix: &'static str,
    /// Converter arguments, in order.
    pub args: Vec<String>,
    /// Absolute path of the converter's output.
    pub output_path: PathBuf,
    /// Bibliographies that exist on disk; citations are processed when non-empty.
    pub bibliographies: Vec<PathBuf>,
    /// Content files relative to the project root, in assembly order.
    pub content_inputs: Vec<String>,
    temp_inputs: Vec<NamedTempFile>,
}

impl BuildPlan {
    /// The converter invocation, run from the project root.
    pub fn invocation(&self, root: &Path) -> Invocation {
        Tool::Pandoc
            .invocation()
            .args(self.args.iter().cloned())
            .current_dir(root)
    }

    /// Paths of the temporary inputs (metadata file and fragments).
    pub fn temp_paths(&self) -> Vec<PathBuf> {
        self.temp_inputs.iter().map(|t| t.path().to_path_buf()).collect()
    }

    pub fn processes_citations(&self) -> bool {
        !self.bibliographies.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Format and filename
// ---------------------------------------------------------------------------

/// Command-line format, else the configured default, else `docx`.
///
/// An invalid configured default is an error even when `requested` is set.
pub fn resolve_format(requested: Option<OutputFormat>, settings: &Settings) -> Result<OutputFormat> {
    let configured = settings.default_format()?;
    Ok(requested.or(configured).unwrap_or_default())
}

/// Output file stem: the configured `filename`, or
/// `{last name}[_{mnemonic}]_{assignment}`.
pub fn derive_filename(settings: &Settings) -> Result<String> {
    static WHITESPACE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

    if let Some(filename) = settings.meta().filename.as_deref() {
        return Ok(filename.to_string());
    }

    let author = settings
        .author()
        .ok_or_else(|| PaperError::config("data.author is required to derive a filename"))?;
    let last_name = author
        .split(',')
        .next()
        .and_then(|first| first.split_whitespace().last())
        .ok_or_else(|| PaperError::config("data.author is empty"))?;

    let mut stem = last_name.to_string();
    if let Some(mnemonic) = settings.class_mnemonic() {
        let compact: String = mnemonic.split_whitespace().collect();
        stem.push('_');
        stem.push_str(&compact);
    }

    let assignment = settings.assignment().ok_or_else(|| {
        PaperError::config("assignment (or data.title) is required to derive a filename")
    })?;
    stem.push('_');
    stem.push_str(&WHITESPACE_RE.replace_all(assignment, "_"));

    debug!(filename = %stem, "derived output filename");
    Ok(stem)
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Build the converter plan for `format`.
///
/// `runner` is used to render `data` fields to LaTeX for typesetting formats.
#[instrument(skip_all, fields(format = %format))]
pub fn assemble(
    ctx: &ProjectContext,
    runner: &dyn ProcessRunner,
    format: OutputFormat,
) -> Result<BuildPlan> {
    let settings = ctx.settings()?;
    let root = ctx.root();
    let resources = ctx.resources_dir();
    let mut temp_inputs = Vec::new();

    let metadata = temp_file(".yml", &settings.to_yaml_document()?)?;
    let mut args: Vec<String> = vec![
        "--from".into(),
        INPUT_FORMAT.into(),
        "--metadata-file".into(),
        path_arg(metadata.path()),
        "--resource-path".into(),
        format!("./{CONTENT_DIR}"),
    ];
    temp_inputs.push(metadata);

    let suffix = format.suffix();
    args.push("--to".into());
    args.push(format.writer().into());
    match format {
        OutputFormat::Docx | OutputFormat::DocxPdf => {
            if let Some(reference) = existing_resource(
                root,
                settings.meta().docx.reference_doc.as_deref(),
                &resources.join(DEFAULT_REFERENCE_DOC),
            ) {
                args.push("--reference-doc".into());
                args.push(path_arg(&reference));
            }
        }
        OutputFormat::Latex | OutputFormat::LatexPdf => {
            args.push("--standalone".into());
            if let Some(template) = existing_resource(
                root,
                settings.meta().latex.template.as_deref(),
                &resources.join(DEFAULT_LATEX_TEMPLATE),
            ) {
                args.push("--template".into());
                args.push(path_arg(&template));
            }
            for (key, value) in settings.data_strings() {
                let rendered = render_latex(runner, root, &value)?;
                args.push("--variable".into());
                args.push(format!("{key}={rendered}"));
            }
            for (key, value) in &settings.meta().latex.variables {
                args.push("--variable".into());
                args.push(format!("{key}={value}"));
            }
        }
        OutputFormat::Json => {}
    }

    let filename = derive_filename(settings)?;
    let output_rel = format!("{OUTPUT_DIR}/{filename}.{suffix}");
    args.push("--output".into());
    args.push(output_rel);

    let filters_dir = resources.join("filters");
    for filter in lua_filters(&filters_dir, "filter-")? {
        args.push("--lua-filter".into());
        args.push(path_arg(&filter));
    }

    let bibliographies = settings.bibliography_paths(root);
    if !bibliographies.is_empty() {
        args.push("--citeproc".into());
        let csl = resources
            .join("csl")
            .join(if settings.meta().use_ibid { CSL_IBID } else { CSL_SHORT_TITLE });
        if csl.is_file() {
            args.push("--csl".into());
            args.push(path_arg(&csl));
        }
        for bib in &bibliographies {
            args.push("--bibliography".into());
            args.push(path_arg(bib));
        }
        for filter in lua_filters(&filters_dir, "post-filter-")? {
            args.push("--lua-filter".into());
            args.push(path_arg(&filter));
        }
    }

    if format.is_docx() {
        let title_page = temp_file(".md", &fragments::docx_title_page(&settings.meta().data))?;
        args.push(path_arg(title_page.path()));
        temp_inputs.push(title_page);
    }

    let content_inputs: Vec<String> = content_files(&ctx.content_dir())?
        .into_iter()
        .map(|f| format!("{CONTENT_DIR}/{}", f.relative))
        .collect();
    args.extend(content_inputs.iter().cloned());

    if !bibliographies.is_empty() {
        let works_cited = if format.is_docx() {
            Some(fragments::docx_works_cited())
        } else if format.is_latex() {
            Some(fragments::latex_works_cited())
        } else {
            None
        };
        if let Some(text) = works_cited {
            let fragment = temp_file(".md", &text)?;
            args.push(path_arg(fragment.path()));
            temp_inputs.push(fragment);
        }
    }

    debug!(args = ?args, "assembled converter arguments");

    Ok(BuildPlan {
        format,
        suffix,
        args,
        output_path: root.join(OUTPUT_DIR).join(format!("{filename}.{suffix}")),
        bibliographies,
        content_inputs,
        temp_inputs,
    })
}

/// The configured resource (relative to `root`) when it exists, else the
/// default when that exists.
fn existing_resource(root: &Path, configured: Option<&str>, default: &Path) -> Option<PathBuf> {
    if let Some(configured) = configured {
        let path = root.join(configured);
        if path.is_file() {
            return Some(path);
        }
        debug!(path = %path.display(), "configured resource missing, trying default");
    }
    default.is_file().then(|| default.to_path_buf())
}

/// `*.lua` files in `dir` whose names start with `prefix`, sorted by name.
fn lua_filters(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut filters = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| PaperError::io(dir, e))? {
        let entry = entry.map_err(|e| PaperError::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(prefix) && name.ends_with(".lua") {
            filters.push(entry.path());
        }
    }
    filters.sort();
    Ok(filters)
}

/// Render an inline Markdown value to LaTeX with the converter itself.
fn render_latex(runner: &dyn ProcessRunner, root: &Path, value: &str) -> Result<String> {
    let invocation = Tool::Pandoc
        .invocation()
        .args(["--from", INPUT_FORMAT, "--to", "latex"])
        .current_dir(root)
        .stdin(value.as_bytes().to_vec());
    let output = runner.run_checked(&invocation)?;
    Ok(output.stdout_string().trim().to_string())
}

fn temp_file(suffix: &str, content: &str) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("paper-")
        .suffix(suffix)
        .tempfile()
        .map_err(|e| PaperError::io(std::env::temp_dir(), e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| PaperError::io(file.path(), e))?;
    file.flush().map_err(|e| PaperError::io(file.path(), e))?;
    Ok(file)
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
