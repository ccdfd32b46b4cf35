//! Post-processing of word-processor output.
//!
//! After the converter writes a `.docx`, this crate applies configured font
//! overrides, stamps the core document properties, resets the editing-time
//! counter, and (optionally) normalizes every archive timestamp so identical
//! inputs produce identical bytes. [`pdf`] fixes up the metadata of PDFs
//! exported from those documents.

pub mod package;
pub mod pdf;
pub mod properties;
pub mod styles;
mod xml;

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{instrument, warn};

use paper_shared::{PaperError, Result};

pub use package::{DocxPackage, zip_time_from_epoch};
pub use pdf::{PdfInfo, correct_pdf_metadata};
pub use properties::{CoreProperties, apply_core_properties, reset_total_time};
pub use styles::apply_font_overrides;

const STYLES_PART: &str = "word/styles.xml";
const CORE_PART: &str = "docProps/core.xml";
const APP_PART: &str = "docProps/app.xml";

/// Everything applied to a freshly converted document.
#[derive(Debug, Clone, Default)]
pub struct PostProcess {
    /// Style name or id → font family.
    pub font_overrides: BTreeMap<String, String>,
    pub core: CoreProperties,
    /// `SOURCE_DATE_EPOCH`: fixes property and archive timestamps.
    pub epoch: Option<i64>,
}

/// Rewrite the document at `path` in place.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn post_process(path: &Path, opts: &PostProcess) -> Result<()> {
    let mut pkg = DocxPackage::open(path)?;

    if !opts.font_overrides.is_empty() {
        match pkg.part_string(STYLES_PART)? {
            Some(styles) => {
                let (rewritten, missing) = apply_font_overrides(&styles, &opts.font_overrides)?;
                for name in missing {
                    warn!(style = %name, "font override names no style in the document");
                }
                pkg.set_part(STYLES_PART, rewritten);
            }
            None => warn!("document has no style sheet; font overrides skipped"),
        }
    }

    let mut core = opts.core.clone();
    if let Some(epoch) = opts.epoch {
        core.timestamp = Some(epoch_datetime(epoch)?);
    } else if core.timestamp.is_none() {
        core.timestamp = Some(Utc::now());
    }
    let core_xml = pkg
        .part_string(CORE_PART)?
        .unwrap_or_else(|| properties::EMPTY_CORE.to_string());
    pkg.set_part(CORE_PART, apply_core_properties(&core_xml, &core)?);

    if let Some(app) = pkg.part_string(APP_PART)? {
        pkg.set_part(APP_PART, reset_total_time(&app)?);
    }

    pkg.save(path, opts.epoch)
}

/// `SOURCE_DATE_EPOCH` from the environment, when set to an integer.
pub fn source_date_epoch() -> Option<i64> {
    let raw = std::env::var("SOURCE_DATE_EPOCH").ok()?;
    match raw.trim().parse() {
        Ok(epoch) => Some(epoch),
        Err(_) => {
            warn!(value = %raw, "ignoring non-numeric SOURCE_DATE_EPOCH");
            None
        }
    }
}

fn epoch_datetime(epoch: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(epoch, 0)
        .ok_or_else(|| PaperError::validation(format!("invalid SOURCE_DATE_EPOCH: {epoch}")))
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use std::io::{Cursor, Write};

    use zip::write::SimpleFileOptions;

    /// A two-part archive: content types first, then the main document.
    pub fn sample_archive() -> Vec<u8> {
        archive(&[
            ("[Content_Types].xml", "<Types/>"),
            ("word/document.xml", "<w:document/>"),
        ])
    }

    pub fn archive(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            for (name, content) in parts {
                zip.start_file(*name, SimpleFileOptions::default()).unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf.into_inner()
    }
}
