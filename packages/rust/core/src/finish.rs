//! Format-specific steps after the converter has written its output.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, instrument, warn};

use paper_docx::{CoreProperties, PdfInfo, PostProcess};
use paper_history::git;
use paper_shared::{
    DocumentData, Invocation, PaperError, ProcessRunner, ProjectContext, Result, version_stamp,
};

/// Engine used for `latex+pdf` when `latex.engine` is unset.
pub const DEFAULT_ENGINE: &str = "xelatex";

/// Name of the typesetting report written to the data directory.
pub const LATEX_LOG_FILE: &str = "latex.log";

// ---------------------------------------------------------------------------
// docx
// ---------------------------------------------------------------------------

/// Revision stamped into the document: the pinned value, else one more than
/// the number of commits, else 1.
pub fn docx_revision(runner: &dyn ProcessRunner, root: &Path, pinned: Option<u32>) -> u32 {
    if let Some(revision) = pinned {
        return revision;
    }
    match git::commit_count(runner, root) {
        Ok(count) => count + 1,
        Err(e) => {
            debug!(error = %e, "no git history, using revision 1");
            1
        }
    }
}

/// Post-process a converted word-processor document in place.
#[instrument(skip_all, fields(path = %path.display(), revision = revision))]
pub fn finish_docx(ctx: &ProjectContext, path: &Path, revision: u32) -> Result<()> {
    let meta = ctx.settings()?.meta();

    let opts = PostProcess {
        font_overrides: meta.docx.font_overrides.clone(),
        core: CoreProperties {
            title: meta.data.title.clone(),
            author: meta.data.author.clone(),
            subject: course_label(&meta.data),
            revision,
            timestamp: None,
        },
        epoch: paper_docx::source_date_epoch(),
    };
    paper_docx::post_process(path, &opts)
}

/// Export a PDF next to `docx` through the platform word processor, then fix
/// its document information.
#[instrument(skip_all, fields(path = %docx.display()))]
pub fn export_docx_pdf(
    ctx: &ProjectContext,
    runner: &dyn ProcessRunner,
    docx: &Path,
) -> Result<PathBuf> {
    let docx = std::path::absolute(docx).map_err(|e| PaperError::io(docx, e))?;
    let pdf = docx.with_extension("pdf");

    let invocation = pdf_export_invocation(std::env::consts::OS, &docx, &pdf)?;
    runner.run_checked(&invocation)?;

    if !pdf.is_file() {
        return Err(PaperError::validation(format!(
            "word processor reported success but {} was not written",
            pdf.display()
        )));
    }

    let meta = ctx.settings()?.meta();
    paper_docx::correct_pdf_metadata(
        &pdf,
        &PdfInfo {
            title: meta.data.title.clone(),
            author: meta.data.author.clone(),
            subject: course_label(&meta.data),
            creator: Some(version_stamp()),
        },
    )?;

    info!(path = %pdf.display(), "exported PDF");
    Ok(pdf)
}

/// Automation command that makes the word processor save `docx` as `pdf`.
pub fn pdf_export_invocation(os: &str, docx: &Path, pdf: &Path) -> Result<Invocation> {
    match os {
        "macos" => {
            let quote = |p: &Path| {
                p.to_string_lossy()
                    .replace('\\', "\\\\")
                    .replace('"', "\\\"")
            };
            let script = format!(
                "tell application \"Microsoft Word\"\n\
                 \topen POSIX file \"{docx}\"\n\
                 \tset theDoc to active document\n\
                 \tsave as theDoc file name (POSIX file \"{pdf}\" as string) file format format PDF\n\
                 \tclose theDoc saving no\n\
                 end tell",
                docx = quote(docx),
                pdf = quote(pdf),
            );
            Ok(Invocation::new("osascript").args(["-e".to_string(), script]))
        }
        "windows" => {
            let quote = |p: &Path| p.to_string_lossy().replace('\'', "''");
            let script = format!(
                "$word = New-Object -ComObject Word.Application; \
                 $doc = $word.Documents.Open('{docx}'); \
                 $doc.SaveAs([ref] '{pdf}', [ref] 17); \
                 $doc.Close(); \
                 $word.Quit()",
                docx = quote(docx),
                pdf = quote(pdf),
            );
            Ok(Invocation::new("powershell").args([
                "-NoProfile".to_string(),
                "-Command".to_string(),
                script,
            ]))
        }
        other => Err(PaperError::UnsupportedPlatform(format!(
            "exporting a PDF from the word processor needs macOS or Windows (running on {other})"
        ))),
    }
}

fn course_label(data: &DocumentData) -> Option<String> {
    match (data.class_mnemonic.as_deref(), data.class_name.as_deref()) {
        (Some(m), Some(n)) => Some(format!("{m}: {n}")),
        (Some(one), None) | (None, Some(one)) => Some(one.to_string()),
        (None, None) => None,
    }
}

// ---------------------------------------------------------------------------
// latex+pdf
// ---------------------------------------------------------------------------

/// Typeset `tex` in a scratch directory and copy the PDF into the output
/// directory. The engine runs twice so cross-references settle.
#[instrument(skip_all, fields(path = %tex.display()))]
pub fn typeset_pdf(
    ctx: &ProjectContext,
    runner: &dyn ProcessRunner,
    tex: &Path,
) -> Result<PathBuf> {
    let engine = ctx
        .settings()?
        .meta()
        .latex
        .engine
        .clone()
        .unwrap_or_else(|| DEFAULT_ENGINE.to_string());

    let file_name = tex
        .file_name()
        .ok_or_else(|| PaperError::validation(format!("not a file: {}", tex.display())))?;
    let scratch = tempfile::Builder::new()
        .prefix("paper-latex-")
        .tempdir()
        .map_err(|e| PaperError::io(std::env::temp_dir(), e))?;
    let scratch_tex = scratch.path().join(file_name);
    std::fs::copy(tex, &scratch_tex).map_err(|e| PaperError::io(&scratch_tex, e))?;

    // Bundled classes first, then figures relative to the content and the
    // project root; the trailing separator keeps the engine's own tree.
    let separator = if cfg!(windows) { ';' } else { ':' };
    let texinputs: String = [
        ctx.resources_dir().join("latex"),
        ctx.content_dir(),
        ctx.root().to_path_buf(),
    ]
    .iter()
    .map(|dir| format!("{}//{separator}", dir.display()))
    .collect();
    let invocation = Invocation::new(&engine)
        .args([
            "-interaction=nonstopmode".to_string(),
            "-halt-on-error".to_string(),
            file_name.to_string_lossy().into_owned(),
        ])
        .current_dir(scratch.path())
        .env("TEXINPUTS", texinputs);

    for pass in 1..=2 {
        debug!(pass, engine = %engine, "running typesetting engine");
        let output = runner.run(&invocation)?;
        if !output.success() {
            return Err(PaperError::Typesetting {
                code: output.code,
                output: format!("{}{}", output.stdout_string(), output.stderr_string()),
            });
        }
    }

    let scratch_pdf = scratch_tex.with_extension("pdf");
    let pdf = tex.with_extension("pdf");
    std::fs::copy(&scratch_pdf, &pdf).map_err(|e| PaperError::io(&scratch_pdf, e))?;

    let report = latex_report(runner, &engine, &scratch_tex.with_extension("log"));
    let data_dir = ctx.data_dir();
    let log_path = data_dir.join(LATEX_LOG_FILE);
    if let Err(e) = std::fs::create_dir_all(&data_dir).and_then(|()| std::fs::write(&log_path, report)) {
        warn!(path = %log_path.display(), error = %e, "could not write typesetting report");
    }

    info!(path = %pdf.display(), "typeset PDF");
    Ok(pdf)
}

/// Engine version line followed by the classes and packages the run loaded.
fn latex_report(runner: &dyn ProcessRunner, engine: &str, log: &Path) -> String {
    let version = runner
        .run_checked(&Invocation::new(engine).arg("--version"))
        .map(|out| out.stdout_string().lines().next().unwrap_or_default().to_string())
        .unwrap_or_else(|e| {
            debug!(error = %e, "engine version unavailable");
            engine.to_string()
        });

    let log_text = std::fs::read_to_string(log).unwrap_or_default();
    let mut report = format!("{version}\n\nPackages:\n");
    for package in loaded_packages(&log_text) {
        report.push_str(&format!("- {package}\n"));
    }
    report
}

/// Names of document classes and packages announced in an engine log, in
/// load order, without duplicates.
pub fn loaded_packages(log: &str) -> Vec<String> {
    static PACKAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^(?:Package|Document Class): (\S+)").expect("valid regex")
    });

    let mut seen = Vec::new();
    for caps in PACKAGE_RE.captures_iter(log) {
        let name = caps[1].to_string();
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

// ---------------------------------------------------------------------------
// json
// ---------------------------------------------------------------------------

/// Re-serialize the converter's JSON with two-space indentation.
pub fn pretty_print_json(path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path).map_err(|e| PaperError::io(path, e))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| PaperError::validation(format!("converter wrote invalid JSON: {e}")))?;
    let pretty = serde_json::to_string_pretty(&value)
        .map_err(|e| PaperError::validation(format!("JSON serialization failed: {e}")))?;
    std::fs::write(path, format!("{pretty}\n")).map_err(|e| PaperError::io(path, e))?;
    debug!(path = %path.display(), "pretty-printed JSON output");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::project;
    use paper_shared::{CommandOutput, ScriptedRunner};

    #[test]
    fn revision_prefers_pinned_then_git() {
        let runner = ScriptedRunner::new(|_| Ok(CommandOutput::ok("4\n")));
        assert_eq!(docx_revision(&runner, Path::new("."), Some(9)), 9);
        assert!(runner.calls().is_empty());
        assert_eq!(docx_revision(&runner, Path::new("."), None), 5);

        let no_git = ScriptedRunner::new(|_| Ok(CommandOutput::failed(128, "not a git repository")));
        assert_eq!(docx_revision(&no_git, Path::new("."), None), 1);
    }

    #[test]
    fn export_command_per_platform() {
        let docx = Path::new("/p/output/Essay.docx");
        let pdf = Path::new("/p/output/Essay.pdf");

        let mac = pdf_export_invocation("macos", docx, pdf).unwrap();
        assert_eq!(mac.program, "osascript");
        assert!(mac.args[1].contains("open POSIX file \"/p/output/Essay.docx\""));
        assert!(mac.args[1].contains("format PDF"));

        let win = pdf_export_invocation("windows", docx, pdf).unwrap();
        assert_eq!(win.program, "powershell");
        assert!(win.args[2].contains("SaveAs([ref] '/p/output/Essay.pdf', [ref] 17)"));

        let err = pdf_export_invocation("linux", docx, pdf).unwrap_err();
        assert!(matches!(err, PaperError::UnsupportedPlatform(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn packages_parsed_from_engine_log() {
        let log = "This is XeTeX\nDocument Class: article 2023/05/17\nPackage: fontspec 2024/02/13\nPackage: xparse\nPackage: fontspec 2024/02/13\n";
        assert_eq!(loaded_packages(log), vec!["article", "fontspec", "xparse"]);
    }

    #[test]
    fn typesetting_failure_surfaces_engine_output_and_code() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = project(tmp.path());
        let tex = tmp.path().join("output/Essay.tex");
        std::fs::create_dir_all(tex.parent().unwrap()).unwrap();
        std::fs::write(&tex, "\\documentclass{article}").unwrap();

        let runner = ScriptedRunner::new(|_| {
            Ok(CommandOutput {
                code: 3,
                stdout: b"! Undefined control sequence.\n".to_vec(),
                stderr: Vec::new(),
            })
        });
        let err = typeset_pdf(&ctx, &runner, &tex).unwrap_err();
        match &err {
            PaperError::Typesetting { code, output } => {
                assert_eq!(*code, 3);
                assert!(output.contains("Undefined control sequence"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.exit_code(), 3);

        let call = &runner.calls()[0];
        assert_eq!(call.program, DEFAULT_ENGINE);
        assert_eq!(call.args, vec!["-interaction=nonstopmode", "-halt-on-error", "Essay.tex"]);
        let scratch = call.cwd.clone().unwrap();
        assert!(!scratch.exists(), "scratch directory removed");
        let (key, value) = &call.env[0];
        assert_eq!(key, "TEXINPUTS");
        let separator = if cfg!(windows) { ';' } else { ':' };
        let dirs: Vec<&str> = value.split(separator).collect();
        assert_eq!(
            dirs,
            vec![
                format!("{}//", ctx.resources_dir().join("latex").display()),
                format!("{}//", ctx.content_dir().display()),
                format!("{}//", tmp.path().display()),
                String::new(),
            ]
        );
    }

    #[test]
    fn typesetting_success_copies_pdf_and_writes_report() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = project(tmp.path());
        let tex = tmp.path().join("output/Essay.tex");
        std::fs::create_dir_all(tex.parent().unwrap()).unwrap();
        std::fs::write(&tex, "\\documentclass{article}").unwrap();

        let runner = ScriptedRunner::new(|inv| {
            if inv.args.iter().any(|a| a == "--version") {
                return Ok(CommandOutput::ok("XeTeX 3.141592653\nmore\n"));
            }
            let dir = inv.cwd.clone().unwrap();
            std::fs::write(dir.join("Essay.pdf"), b"%PDF-1.5").unwrap();
            std::fs::write(dir.join("Essay.log"), "Package: geometry 2020/01/02\n").unwrap();
            Ok(CommandOutput::ok(""))
        });

        let pdf = typeset_pdf(&ctx, &runner, &tex).unwrap();
        assert_eq!(pdf, tmp.path().join("output/Essay.pdf"));
        assert_eq!(std::fs::read(&pdf).unwrap(), b"%PDF-1.5");

        let engine_runs = runner
            .calls()
            .iter()
            .filter(|c| c.args.iter().any(|a| a == "-halt-on-error"))
            .count();
        assert_eq!(engine_runs, 2);

        let report = std::fs::read_to_string(ctx.data_dir().join(LATEX_LOG_FILE)).unwrap();
        assert!(report.starts_with("XeTeX 3.141592653\n"));
        assert!(report.contains("- geometry"));
    }

    #[test]
    fn json_reparses_to_same_content() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("doc.json");
        let raw = r#"{"pandoc-api-version":[1,23],"meta":{},"blocks":[{"t":"Para","c":[{"t":"Str","c":"Hi"}]}]}"#;
        std::fs::write(&path, raw).unwrap();

        pretty_print_json(&path).unwrap();

        let pretty = std::fs::read_to_string(&path).unwrap();
        assert!(pretty.contains("\n  \"blocks\": ["));
        let before: serde_json::Value = serde_json::from_str(raw).unwrap();
        let after: serde_json::Value = serde_json::from_str(&pretty).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn json_keeps_converter_key_order() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("doc.json");
        std::fs::write(&path, r#"{"pandoc-api-version":[1,23],"meta":{},"blocks":[]}"#).unwrap();

        pretty_print_json(&path).unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "{\n  \"pandoc-api-version\": [\n    1,\n    23\n  ],\n  \"meta\": {},\n  \"blocks\": []\n}\n"
        );
    }
}
