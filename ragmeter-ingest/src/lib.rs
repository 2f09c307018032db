//! Loading evaluation datasets from disk.
//!
//! Four sources are understood: CSV tables and Excel workbooks with a header
//! row, JSON objects (a single object or an array), and BibTeX reference
//! libraries. All of them load into an [`EvaluationDataset`] of four equal-length columns.
//!
//! ```no_run
//! use ragmeter_ingest::{DataKind, load_dataset};
//! use std::path::Path;
//!
//! let dataset = load_dataset(Path::new("eval.csv"), DataKind::Auto)?;
//! println!("{} examples", dataset.len());
//! # Ok::<(), ragmeter_ingest::IngestError>(())
//! ```

pub mod bibtex;
pub mod dataset;
pub mod error;
pub mod table;

pub use bibtex::{BibEntry, BibtexLoader};
pub use dataset::{EvaluationDataset, EvaluationRecord};
pub use error::IngestError;
pub use table::{ColumnMapping, DataTableLoader, TableFormat};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Which loader reads a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    /// Decide from the file extension.
    #[default]
    Auto,
    Csv,
    Json,
    Excel,
    Bibtex,
}

impl DataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Excel => "excel",
            Self::Bibtex => "bibtex",
        }
    }

    /// Resolve `Auto` against the extension of `path`.
    pub fn resolve(self, path: &Path) -> Result<Self, IngestError> {
        if self != Self::Auto {
            return Ok(self);
        }
        let ext = table::extension(path);
        match ext.as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "xlsx" | "xls" => Ok(Self::Excel),
            "bib" | "bibtex" => Ok(Self::Bibtex),
            _ => Err(IngestError::unsupported(format!(
                "cannot detect data type of '{}'; pass an explicit format",
                path.display()
            ))),
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataKind {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "excel" | "xlsx" | "xls" => Ok(Self::Excel),
            "bib" | "bibtex" => Ok(Self::Bibtex),
            other => Err(IngestError::unsupported(format!(
                "unknown data type '{other}' (expected auto, csv, json, excel or bibtex)"
            ))),
        }
    }
}

/// Load `path` with the loader selected by `kind`.
pub fn load_dataset(path: &Path, kind: DataKind) -> Result<EvaluationDataset, IngestError> {
    if !path.exists() {
        return Err(IngestError::NotFound(path.to_path_buf()));
    }
    let kind = kind.resolve(path)?;
    let dataset = match kind {
        DataKind::Bibtex => BibtexLoader::new().load(path)?,
        DataKind::Json => DataTableLoader::new().load(path, Some(TableFormat::Json))?,
        DataKind::Excel => DataTableLoader::new().load(path, Some(TableFormat::Excel))?,
        DataKind::Csv | DataKind::Auto => {
            DataTableLoader::new().load(path, Some(TableFormat::Csv))?
        }
    };
    info!(
        path = %path.display(),
        kind = %kind,
        examples = dataset.len(),
        with_ground_truth = dataset.has_ground_truths(),
        "Loaded evaluation dataset"
    );
    Ok(dataset)
}
