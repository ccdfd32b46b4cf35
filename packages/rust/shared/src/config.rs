//! Cascading project settings.
//!
//! Every directory from the filesystem root down to the project may hold a
//! `paper_meta.yml`. The documents are folded root-most first, so a project's
//! own file wins over a parent's, with two exceptions encoded in
//! [`merge_mapping`]: sequences concatenate, and a bracketed placeholder such
//! as `"[AUTHOR]"` never replaces a value a parent already supplied.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_yaml::{Mapping, Value};
use tracing::{debug, instrument};

use crate::error::{PaperError, Result};
use crate::types::OutputFormat;

/// File name of the configuration document at every directory level.
pub const CONFIG_FILE_NAME: &str = "paper_meta.yml";

// ---------------------------------------------------------------------------
// Typed view (matching paper_meta.yml schema)
// ---------------------------------------------------------------------------

/// Typed view over the merged settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PaperMeta {
    /// Document data, also exposed to templates.
    pub data: DocumentData,
    /// Assignment name; falls back to `data.title`.
    #[serde(deserialize_with = "scalar_string")]
    pub assignment: Option<String>,
    /// Explicit output file stem.
    #[serde(deserialize_with = "scalar_string")]
    pub filename: Option<String>,
    /// Bibliography files (`~` is expanded, missing files are skipped).
    pub sources: Vec<String>,
    /// Use the ibid variant of the citation style.
    pub use_ibid: bool,
    /// Goal drawn on the progress chart.
    pub target_word_count: Option<u64>,
    /// Format used by `build` when none is given on the command line.
    pub default_format: Option<String>,
    /// `docx:` section.
    pub docx: DocxSettings,
    /// `latex:` section.
    pub latex: LatexSettings,
}

/// `data:` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DocumentData {
    #[serde(deserialize_with = "scalar_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub subtitle: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub author: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub professor: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub class_mnemonic: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub class_name: Option<String>,
    /// Due date, `YYYY-MM-DD`.
    #[serde(deserialize_with = "scalar_string")]
    pub date: Option<String>,
}

/// `docx:` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DocxSettings {
    /// Pin the revision number instead of deriving it from git history.
    pub revision: Option<u32>,
    /// Style name → font family.
    #[serde(deserialize_with = "scalar_map")]
    pub font_overrides: BTreeMap<String, String>,
    /// Reference document, relative to the project root.
    pub reference_doc: Option<String>,
}

/// `latex:` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LatexSettings {
    /// Typesetting engine binary (default `xelatex`).
    pub engine: Option<String>,
    /// Template, relative to the project root.
    pub template: Option<String>,
    /// Extra `--variable` pairs passed verbatim.
    #[serde(deserialize_with = "scalar_map")]
    pub variables: BTreeMap<String, String>,
}

/// Text of a YAML scalar: `1984` and `true` read the same as `"1984"` and `"true"`.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn scalar_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        value => scalar_text(&value)
            .map(Some)
            .ok_or_else(|| D::Error::custom("expected a scalar value")),
    }
}

fn scalar_map<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, String>, D::Error> {
    BTreeMap::<String, Value>::deserialize(deserializer)?
        .into_iter()
        .map(|(key, value)| match scalar_text(&value) {
            Some(text) => Ok((key, text)),
            None => Err(D::Error::custom(format!("`{key}` must be a scalar value"))),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// The effective settings of one project: the merged mapping plus its typed view.
#[derive(Debug, Clone)]
pub struct Settings {
    raw: Mapping,
    meta: PaperMeta,
    chain: Vec<PathBuf>,
}

impl Settings {
    /// Wrap an already merged mapping.
    pub fn from_mapping(raw: Mapping, chain: Vec<PathBuf>) -> Result<Self> {
        let meta: PaperMeta = serde_yaml::from_value(Value::Mapping(raw.clone()))
            .map_err(|e| PaperError::config(format!("invalid project settings: {e}")))?;
        Ok(Self { raw, meta, chain })
    }

    /// The merged mapping, in document order.
    pub fn raw(&self) -> &Mapping {
        &self.raw
    }

    pub fn meta(&self) -> &PaperMeta {
        &self.meta
    }

    /// Configuration files that contributed, root-most first.
    pub fn chain(&self) -> &[PathBuf] {
        &self.chain
    }

    pub fn author(&self) -> Option<&str> {
        self.meta.data.author.as_deref()
    }

    pub fn class_mnemonic(&self) -> Option<&str> {
        self.meta.data.class_mnemonic.as_deref()
    }

    /// Assignment name, falling back to the document title.
    pub fn assignment(&self) -> Option<&str> {
        self.meta
            .assignment
            .as_deref()
            .or(self.meta.data.title.as_deref())
    }

    /// The configured default output format, validated.
    pub fn default_format(&self) -> Result<Option<OutputFormat>> {
        self.meta
            .default_format
            .as_deref()
            .map(str::parse)
            .transpose()
    }

    /// Scalar entries of the `data:` section as text, in document order.
    pub fn data_strings(&self) -> Vec<(String, String)> {
        let Some(Value::Mapping(data)) = self.raw.get("data") else {
            return Vec::new();
        };
        data.iter()
            .filter_map(|(k, v)| Some((scalar_text(k)?, scalar_text(v)?)))
            .collect()
    }

    /// Existing bibliography files, `~`-expanded and resolved against `base`.
    pub fn bibliography_paths(&self, base: &Path) -> Vec<PathBuf> {
        self.meta
            .sources
            .iter()
            .map(|s| expand_home(s))
            .map(|p| if p.is_absolute() { p } else { base.join(p) })
            .filter(|p| {
                let exists = p.exists();
                if !exists {
                    debug!(path = %p.display(), "bibliography source missing, skipping");
                }
                exists
            })
            .collect()
    }

    /// Serialize as a single YAML document delimited by `---` lines.
    pub fn to_yaml_document(&self) -> Result<String> {
        let body = serde_yaml::to_string(&self.raw)
            .map_err(|e| PaperError::config(format!("failed to serialize settings: {e}")))?;
        Ok(format!("---\n{body}---\n"))
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// A string of the form `[...]`: an unfilled template value.
pub fn is_placeholder(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.len() >= 2 && s.starts_with('[') && s.ends_with(']'))
}

/// Fold `incoming` (the more specific layer) into `target`.
///
/// - mapping into mapping merges recursively
/// - a sequence extends an existing sequence, otherwise replaces
/// - a placeholder string never replaces an existing key
/// - anything else replaces
pub fn merge_mapping(target: &mut Mapping, incoming: &Mapping) {
    for (key, value) in incoming {
        if let (Some(Value::Mapping(existing)), Value::Mapping(child)) =
            (target.get_mut(key), value)
        {
            merge_mapping(existing, child);
            continue;
        }

        if let Value::Sequence(items) = value {
            if let Some(Value::Sequence(existing)) = target.get_mut(key) {
                existing.extend(items.iter().cloned());
            } else {
                target.insert(key.clone(), value.clone());
            }
            continue;
        }

        if target.contains_key(key) && is_placeholder(value) {
            continue;
        }

        target.insert(key.clone(), value.clone());
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Configuration files from `start` up to the root, root-most first.
pub fn discover_chain(start: &Path) -> Vec<PathBuf> {
    let mut chain = Vec::new();
    let mut current = Some(start);

    while let Some(dir) = current {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            chain.push(candidate);
        }
        current = dir.parent();
    }

    chain.reverse();
    chain
}

/// Load the single YAML document of one configuration file.
///
/// Empty documents are ignored; more than one non-empty document is fatal.
pub fn load_document(path: &Path) -> Result<Option<Mapping>> {
    let content = std::fs::read_to_string(path).map_err(|e| PaperError::io(path, e))?;

    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(&content) {
        let value = Value::deserialize(document).map_err(|e| {
            PaperError::config(format!("failed to parse {}: {e}", path.display()))
        })?;
        if !value.is_null() {
            documents.push(value);
        }
    }

    if documents.len() > 1 {
        return Err(PaperError::MultipleDocuments {
            path: path.to_path_buf(),
        });
    }

    match documents.pop() {
        None => Ok(None),
        Some(Value::Mapping(mapping)) => Ok(Some(mapping)),
        Some(_) => Err(PaperError::config(format!(
            "{} must contain a mapping at the top level",
            path.display()
        ))),
    }
}

/// Resolve the effective settings for `start` by folding every ancestor's
/// configuration document.
#[instrument(skip_all, fields(start = %start.display()))]
pub fn resolve_settings(start: &Path) -> Result<Settings> {
    let start = std::path::absolute(start).map_err(|e| PaperError::io(start, e))?;
    let chain = discover_chain(&start);

    let mut merged = Mapping::new();
    for path in &chain {
        if let Some(layer) = load_document(path)? {
            merge_mapping(&mut merged, &layer);
        }
        debug!(path = %path.display(), "merged settings layer");
    }

    Settings::from_mapping(merged, chain)
}
