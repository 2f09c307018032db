//! BibTeX reference libraries (JabRef exports) as evaluation data.
//!
//! Each entry becomes one example: the title is the query, the abstract (or
//! the note when there is no abstract) is the context, and the abstract is
//! the ground truth. Entries carry no generated answer.

use crate::dataset::{EvaluationDataset, EvaluationRecord};
use crate::error::IngestError;
use crate::table::{extension, field, json_objects};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

static ENTRY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)@(\w+)\{([^,]+),\s*(.*?)\n\}").expect("entry pattern is valid")
});

static FIELD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\w+)\s*=\s*\{([^}]*)\}|(\w+)\s*=\s*"([^"]*)""#).expect("field pattern is valid")
});

/// One parsed BibTeX entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BibEntry {
    /// Entry type as written, e.g. `article`.
    pub entry_type: String,
    /// Citation key.
    pub key: String,
    /// Fields by lowercased name, in file order.
    pub fields: IndexMap<String, String>,
}

impl BibEntry {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// Convert to an evaluation record.
    pub fn to_record(&self) -> EvaluationRecord {
        let context = self
            .field("abstract")
            .or_else(|| self.field("note"))
            .unwrap_or_default();
        EvaluationRecord::new(
            self.field("title").unwrap_or_default(),
            context,
            "",
            self.field("abstract").unwrap_or_default(),
        )
    }
}

/// Parse every entry in BibTeX source text.
///
/// Braced values may not contain nested braces; such fields are skipped.
pub fn parse_entries(content: &str) -> Vec<BibEntry> {
    ENTRY_PATTERN
        .captures_iter(content)
        .map(|entry| {
            let fields = FIELD_PATTERN
                .captures_iter(&entry[3])
                .filter_map(|f| {
                    let (name, value) = match (f.get(1), f.get(2)) {
                        (Some(name), Some(value)) => (name, value),
                        _ => (f.get(3)?, f.get(4)?),
                    };
                    Some((
                        name.as_str().to_lowercase(),
                        value.as_str().trim().to_string(),
                    ))
                })
                .collect();
            BibEntry {
                entry_type: entry[1].to_string(),
                key: entry[2].trim().to_string(),
                fields,
            }
        })
        .collect()
}

/// Loader for `.bib`/`.bibtex` files and their JSON exports.
#[derive(Debug, Clone, Default)]
pub struct BibtexLoader;

impl BibtexLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load `path`; `.json` files are read as exported entries, anything
    /// else as BibTeX source.
    pub fn load(&self, path: &Path) -> Result<EvaluationDataset, IngestError> {
        if !path.exists() {
            return Err(IngestError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        let dataset = if extension(path) == "json" {
            Self::from_json(&content)?
        } else {
            let entries = parse_entries(&content);
            debug!(path = %path.display(), entries = entries.len(), "Parsed BibTeX entries");
            entries.iter().map(BibEntry::to_record).collect()
        };
        dataset.validate()?;
        Ok(dataset)
    }

    /// JSON objects with `query`/`title`, `context`/`abstract`, `answer` and
    /// `ground_truth`/`abstract` keys; the first key present wins.
    fn from_json(content: &str) -> Result<EvaluationDataset, IngestError> {
        Ok(json_objects(serde_json::from_str(content)?)?
            .iter()
            .map(|object| {
                EvaluationRecord::new(
                    field(object, &["query", "title"]),
                    field(object, &["context", "abstract"]),
                    field(object, &["answer"]),
                    field(object, &["ground_truth", "abstract"]),
                )
            })
            .collect())
    }
}
