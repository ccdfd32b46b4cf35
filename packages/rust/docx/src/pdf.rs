//! Document information dictionary of exported PDFs.
//!
//! Word-processor exports ignore most core properties, so the Info dictionary
//! is rewritten after export.

use std::path::Path;

use lopdf::{Dictionary, Document, Object, StringFormat};
use tracing::debug;

use paper_shared::{PaperError, Result};

/// Values written into the PDF Info dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdfInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
}

impl PdfInfo {
    fn entries(&self) -> Vec<(&'static str, &str)> {
        [
            ("Title", self.title.as_deref()),
            ("Author", self.author.as_deref()),
            ("Subject", self.subject.as_deref()),
            ("Creator", self.creator.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect()
    }
}

/// Rewrite the Info dictionary of the PDF at `path` in place.
pub fn correct_pdf_metadata(path: &Path, info: &PdfInfo) -> Result<()> {
    let mut doc = Document::load(path)
        .map_err(|e| PaperError::package(format!("reading {}: {e}", path.display())))?;

    apply_info(&mut doc, info)?;

    doc.save(path)
        .map_err(|e| PaperError::package(format!("writing {}: {e}", path.display())))?;
    debug!(path = %path.display(), "corrected PDF metadata");
    Ok(())
}

fn apply_info(doc: &mut Document, info: &PdfInfo) -> Result<()> {
    let entries = info.entries();
    if entries.is_empty() {
        return Ok(());
    }

    let existing = doc.trailer.get(b"Info").ok().cloned();
    match existing {
        Some(Object::Reference(id)) => {
            let dict = doc
                .get_object_mut(id)
                .and_then(Object::as_dict_mut)
                .map_err(|e| PaperError::package(format!("PDF Info dictionary: {e}")))?;
            set_entries(dict, &entries);
        }
        Some(Object::Dictionary(mut dict)) => {
            set_entries(&mut dict, &entries);
            doc.trailer.set("Info", Object::Dictionary(dict));
        }
        _ => {
            let mut dict = Dictionary::new();
            set_entries(&mut dict, &entries);
            let id = doc.add_object(Object::Dictionary(dict));
            doc.trailer.set("Info", Object::Reference(id));
        }
    }
    Ok(())
}

fn set_entries(dict: &mut Dictionary, entries: &[(&'static str, &str)]) {
    for (key, value) in entries {
        dict.set(*key, text_string(value));
    }
}

/// A PDF text string: literal for ASCII, UTF-16BE with a byte-order mark otherwise.
fn text_string(value: &str) -> Object {
    if value.is_ascii() {
        return Object::String(value.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}
