//! In-memory view of a word-processor archive.
//!
//! The archive is read fully, parts are edited as bytes, and the whole thing
//! is written back in the original entry order (`[Content_Types].xml` must
//! stay first for some readers).

use std::io::{Read, Seek, Write};
use std::path::Path;

use chrono::{DateTime, Datelike, Timelike, Utc};
use tracing::debug;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use paper_shared::{PaperError, Result};

/// One entry of the archive.
#[derive(Debug, Clone)]
struct Entry {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    modified: Option<zip::DateTime>,
    is_dir: bool,
}

/// A docx archive loaded into memory.
#[derive(Debug, Clone, Default)]
pub struct DocxPackage {
    entries: Vec<Entry>,
}

impl DocxPackage {
    /// Load an archive from disk.
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| PaperError::io(path, e))?;
        Self::from_reader(file)
    }

    /// Load an archive from any seekable reader.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(reader).map_err(zip_error)?;
        let mut entries = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            let mut file = archive.by_index(index).map_err(zip_error)?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)
                .map_err(|e| PaperError::package(format!("reading {}: {e}", file.name())))?;

            entries.push(Entry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                modified: file.last_modified(),
                is_dir: file.is_dir(),
            });
        }

        debug!(entries = entries.len(), "loaded docx package");
        Ok(Self { entries })
    }

    /// Names of all parts, in archive order.
    pub fn part_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Raw bytes of a part.
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.data.as_slice())
    }

    /// A part decoded as UTF-8.
    pub fn part_string(&self, name: &str) -> Result<Option<String>> {
        self.part(name)
            .map(|bytes| {
                String::from_utf8(bytes.to_vec())
                    .map_err(|e| PaperError::package(format!("{name} is not UTF-8: {e}")))
            })
            .transpose()
    }

    /// Replace a part, or append it when missing.
    pub fn set_part(&mut self, name: &str, data: impl Into<Vec<u8>>) {
        let data = data.into();
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => entry.data = data,
            None => self.entries.push(Entry {
                name: name.to_string(),
                data,
                compression: CompressionMethod::Deflated,
                modified: None,
                is_dir: false,
            }),
        }
    }

    /// Write the archive. With `epoch`, every entry gets that timestamp.
    pub fn write_to<W: Write + Seek>(&self, writer: W, epoch: Option<i64>) -> Result<()> {
        let fixed_time = epoch.map(zip_time_from_epoch).transpose()?;
        let mut zip = zip::ZipWriter::new(writer);

        for entry in &self.entries {
            let compression = match entry.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let mut options = SimpleFileOptions::default().compression_method(compression);
            if let Some(time) = fixed_time.or(entry.modified) {
                options = options.last_modified_time(time);
            }

            if entry.is_dir {
                zip.add_directory(entry.name.as_str(), options)
                    .map_err(zip_error)?;
                continue;
            }

            zip.start_file(entry.name.as_str(), options)
                .map_err(zip_error)?;
            zip.write_all(&entry.data)
                .map_err(|e| PaperError::package(format!("writing {}: {e}", entry.name)))?;
        }

        zip.finish().map_err(zip_error)?;
        Ok(())
    }

    /// Write the archive to `path` via a temporary sibling and a rename.
    pub fn save(&self, path: &Path, epoch: Option<i64>) -> Result<()> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.docx".to_string());
        let temp = path.with_file_name(format!(".{file_name}.tmp"));

        let file = std::fs::File::create(&temp).map_err(|e| PaperError::io(&temp, e))?;
        if let Err(e) = self.write_to(file, epoch) {
            let _ = std::fs::remove_file(&temp);
            return Err(e);
        }

        std::fs::rename(&temp, path).map_err(|e| PaperError::io(path, e))?;
        debug!(path = %path.display(), "wrote docx package");
        Ok(())
    }
}

/// Convert a Unix timestamp to an archive timestamp, clamped to the range
/// the format can represent (1980–2107).
pub fn zip_time_from_epoch(epoch: i64) -> Result<zip::DateTime> {
    let moment = DateTime::<Utc>::from_timestamp(epoch, 0)
        .ok_or_else(|| PaperError::validation(format!("invalid SOURCE_DATE_EPOCH: {epoch}")))?;

    let (year, month, day, hour, minute, second) = if moment.year() < 1980 {
        (1980, 1, 1, 0, 0, 0)
    } else if moment.year() > 2107 {
        (2107, 12, 31, 23, 59, 58)
    } else {
        (
            moment.year() as u16,
            moment.month() as u8,
            moment.day() as u8,
            moment.hour() as u8,
            moment.minute() as u8,
            moment.second() as u8,
        )
    };

    zip::DateTime::from_date_and_time(year, month, day, hour, minute, second)
        .map_err(|e| PaperError::validation(format!("timestamp out of range: {e}")))
}

fn zip_error(err: zip::result::ZipError) -> PaperError {
    PaperError::package(err.to_string())
}
