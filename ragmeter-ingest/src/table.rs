//! Tabular evaluation files: CSV or Excel with a header row, or JSON objects.

use crate::dataset::{EvaluationDataset, EvaluationRecord};
use crate::error::IngestError;
use calamine::{Reader, open_workbook_auto};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Tabular file formats understood by [`DataTableLoader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    Csv,
    Json,
    /// First worksheet of an `.xlsx`/`.xls` workbook.
    Excel,
}

impl TableFormat {
    /// Infer the format from the file extension.
    pub fn from_path(path: &Path) -> Result<Self, IngestError> {
        let ext = extension(path);
        match ext.as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "xlsx" | "xls" => Ok(Self::Excel),
            _ => Err(IngestError::unsupported(format!(
                "cannot infer table format from extension '{ext}'"
            ))),
        }
    }
}

/// Names of the columns holding each field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub query: String,
    pub context: String,
    pub answer: String,
    pub ground_truth: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            query: "query".into(),
            context: "context".into(),
            answer: "answer".into(),
            ground_truth: "ground_truth".into(),
        }
    }
}

/// Loader for CSV, Excel and JSON evaluation tables.
///
/// Missing columns and cells read as empty strings.
#[derive(Debug, Clone, Default)]
pub struct DataTableLoader {
    columns: ColumnMapping,
}

impl DataTableLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_columns(columns: ColumnMapping) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &ColumnMapping {
        &self.columns
    }

    /// Load `path`, inferring the format from its extension when `format`
    /// is `None`.
    pub fn load(
        &self,
        path: &Path,
        format: Option<TableFormat>,
    ) -> Result<EvaluationDataset, IngestError> {
        if !path.exists() {
            return Err(IngestError::NotFound(path.to_path_buf()));
        }
        let format = match format {
            Some(format) => format,
            None => TableFormat::from_path(path)?,
        };
        debug!(path = %path.display(), ?format, "Loading evaluation table");

        let dataset = match format {
            TableFormat::Csv => self.load_csv(path)?,
            TableFormat::Json => self.load_json(path)?,
            TableFormat::Excel => self.load_excel(path)?,
        };
        dataset.validate()?;
        Ok(dataset)
    }

    fn load_csv(&self, path: &Path) -> Result<EvaluationDataset, IngestError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_path(path)?;

        let headers = reader.headers()?.clone();
        let [query, context, answer, ground_truth] =
            self.column_positions(&headers.iter().collect::<Vec<_>>(), path);

        let mut dataset = EvaluationDataset::new();
        for row in reader.records() {
            let row = row?;
            let cell = |index: Option<usize>| index.and_then(|i| row.get(i)).unwrap_or_default();
            dataset.push(EvaluationRecord::new(
                cell(query),
                cell(context),
                cell(answer),
                cell(ground_truth),
            ));
        }
        Ok(dataset)
    }

    /// Reads the first worksheet; its first row holds the column names.
    fn load_excel(&self, path: &Path) -> Result<EvaluationDataset, IngestError> {
        let mut workbook = open_workbook_auto(path)?;
        let range = workbook.worksheet_range_at(0).ok_or_else(|| {
            IngestError::invalid(format!("workbook {} has no worksheets", path.display()))
        })??;

        let mut rows = range.rows();
        let Some(header) = rows.next() else {
            return Ok(EvaluationDataset::new());
        };
        let headers: Vec<String> = header
            .iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect();
        let [query, context, answer, ground_truth] = self.column_positions(
            &headers.iter().map(String::as_str).collect::<Vec<_>>(),
            path,
        );

        let mut dataset = EvaluationDataset::new();
        for row in rows {
            let cell = |index: Option<usize>| {
                index
                    .and_then(|i| row.get(i))
                    .map(|c| c.to_string())
                    .unwrap_or_default()
            };
            dataset.push(EvaluationRecord::new(
                cell(query),
                cell(context),
                cell(answer),
                cell(ground_truth),
            ));
        }
        Ok(dataset)
    }

    /// Index of each mapped column in `headers`, in query, context, answer,
    /// ground truth order.
    fn column_positions(&self, headers: &[&str], path: &Path) -> [Option<usize>; 4] {
        let columns = &self.columns;
        [
            columns.query.as_str(),
            columns.context.as_str(),
            columns.answer.as_str(),
            columns.ground_truth.as_str(),
        ]
        .map(|name| {
            let index = headers.iter().position(|h| *h == name);
            if index.is_none() {
                warn!(
                    column = name,
                    path = %path.display(),
                    "Column not found; using empty values"
                );
            }
            index
        })
    }

    fn load_json(&self, path: &Path) -> Result<EvaluationDataset, IngestError> {
        let content = fs::read_to_string(path)?;
        let columns = &self.columns;
        Ok(json_objects(serde_json::from_str(&content)?)?
            .iter()
            .map(|object| {
                EvaluationRecord::new(
                    field(object, &[columns.query.as_str()]),
                    field(object, &[columns.context.as_str()]),
                    field(object, &[columns.answer.as_str()]),
                    field(object, &[columns.ground_truth.as_str()]),
                )
            })
            .collect())
    }
}

/// Lowercased file extension, or an empty string.
pub(crate) fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default()
}

/// Accept either a single object or an array of objects.
pub(crate) fn json_objects(value: Value) -> Result<Vec<Map<String, Value>>, IngestError> {
    match value {
        Value::Object(object) => Ok(vec![object]),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(object) => Ok(object),
                other => Err(IngestError::invalid(format!(
                    "entry {i} is not a JSON object: {other}"
                ))),
            })
            .collect(),
        other => Err(IngestError::invalid(format!(
            "expected a JSON object or array, found {other}"
        ))),
    }
}

/// The first present key among `keys`, rendered as text.
///
/// Strings are taken verbatim, `null` reads as empty, and any other value is
/// rendered as JSON.
pub(crate) fn field(object: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| object.get(*key))
        .map(|value| match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "data.csv",
            "query,context,answer,ground_truth\n\
             What is AI?,\"AI is intelligence, artificially.\",AI is smart.,AI is intelligence.\n\
             Why?,Because.,Reasons.,\n",
        );
        let dataset = DataTableLoader::new().load(&path, None).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.queries[0], "What is AI?");
        assert_eq!(dataset.contexts[0], "AI is intelligence, artificially.");
        assert_eq!(
            dataset.ground_truths,
            vec![Some("AI is intelligence.".to_string()), None]
        );
    }

    #[test]
    fn test_csv_missing_column_and_short_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "data.csv", "query,context,answer\nq1,c1\nq2,c2,a2\n");
        let dataset = DataTableLoader::new().load(&path, None).unwrap();
        assert_eq!(dataset.answers, vec!["".to_string(), "a2".to_string()]);
        assert_eq!(dataset.ground_truths, vec![None, None]);
    }

    #[test]
    fn test_custom_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "data.csv",
            "question,passage,response,reference\nq,c,a,r\n",
        );
        let loader = DataTableLoader::with_columns(ColumnMapping {
            query: "question".into(),
            context: "passage".into(),
            answer: "response".into(),
            ground_truth: "reference".into(),
        });
        let dataset = loader.load(&path, None).unwrap();
        assert_eq!(dataset.queries, vec!["q"]);
        assert_eq!(dataset.ground_truths, vec![Some("r".to_string())]);
    }

    /// Minimal single-sheet `.xlsx` with inline strings; numeric-looking
    /// cells are written as numbers and empty cells are omitted.
    fn write_xlsx(dir: &tempfile::TempDir, name: &str, grid: &[&[&str]]) -> std::path::PathBuf {
        use zip::write::SimpleFileOptions;

        let mut sheet_rows = String::new();
        for (r, row) in grid.iter().enumerate() {
            sheet_rows.push_str(&format!("<row r=\"{}\">", r + 1));
            for (c, value) in row.iter().enumerate() {
                let cell_ref = format!("{}{}", (b'A' + c as u8) as char, r + 1);
                if value.is_empty() {
                    continue;
                } else if value.parse::<f64>().is_ok() {
                    sheet_rows.push_str(&format!("<c r=\"{cell_ref}\"><v>{value}</v></c>"));
                } else {
                    sheet_rows.push_str(&format!(
                        "<c r=\"{cell_ref}\" t=\"inlineStr\"><is><t>{value}</t></is></c>"
                    ));
                }
            }
            sheet_rows.push_str("</row>");
        }

        const MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
        const REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
        let parts = [
            (
                "[Content_Types].xml".to_string(),
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                 <Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
                 <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
                 <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
                 <Override PartName=\"/xl/workbook.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>\
                 <Override PartName=\"/xl/worksheets/sheet1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>\
                 </Types>"
                    .to_string(),
            ),
            (
                "_rels/.rels".to_string(),
                format!(
                    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                     <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
                     <Relationship Id=\"rId1\" Type=\"{REL}/officeDocument\" Target=\"xl/workbook.xml\"/>\
                     </Relationships>"
                ),
            ),
            (
                "xl/workbook.xml".to_string(),
                format!(
                    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                     <workbook xmlns=\"{MAIN}\" xmlns:r=\"{REL}\">\
                     <sheets><sheet name=\"Sheet1\" sheetId=\"1\" r:id=\"rId1\"/></sheets>\
                     </workbook>"
                ),
            ),
            (
                "xl/_rels/workbook.xml.rels".to_string(),
                format!(
                    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                     <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
                     <Relationship Id=\"rId1\" Type=\"{REL}/worksheet\" Target=\"worksheets/sheet1.xml\"/>\
                     </Relationships>"
                ),
            ),
            (
                "xl/worksheets/sheet1.xml".to_string(),
                format!(
                    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                     <worksheet xmlns=\"{MAIN}\"><sheetData>{sheet_rows}</sheetData></worksheet>"
                ),
            ),
        ];

        let path = dir.path().join(name);
        let mut zip = zip::ZipWriter::new(fs::File::create(&path).unwrap());
        for (part, body) in &parts {
            zip.start_file(part.as_str(), SimpleFileOptions::default())
                .unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
        path
    }

    #[test]
    fn test_load_excel() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_xlsx(
            &dir,
            "data.xlsx",
            &[
                &["query", "context", "answer", "ground_truth"],
                &["What is AI?", "AI is intelligence.", "AI is smart.", "AI is intelligence."],
                &["Count", "42", "Forty-two.", ""],
            ],
        );
        assert_eq!(TableFormat::from_path(&path).unwrap(), TableFormat::Excel);

        let dataset = DataTableLoader::new().load(&path, None).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.queries, vec!["What is AI?", "Count"]);
        assert_eq!(dataset.contexts[1], "42");
        assert_eq!(dataset.answers[0], "AI is smart.");
        assert_eq!(
            dataset.ground_truths,
            vec![Some("AI is intelligence.".to_string()), None]
        );
    }

    #[test]
    fn test_excel_custom_columns_and_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_xlsx(
            &dir,
            "data.xlsx",
            &[&["question", "passage", "response"], &["q", "c", "a"]],
        );
        let loader = DataTableLoader::with_columns(ColumnMapping {
            query: "question".into(),
            context: "passage".into(),
            answer: "response".into(),
            ground_truth: "reference".into(),
        });
        let dataset = loader.load(&path, None).unwrap();
        assert_eq!(dataset.queries, vec!["q"]);
        assert_eq!(dataset.answers, vec!["a"]);
        assert_eq!(dataset.ground_truths, vec![None]);
    }

    #[test]
    fn test_corrupt_excel_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "data.xlsx", "not a workbook");
        let err = DataTableLoader::new().load(&path, None).unwrap_err();
        assert!(matches!(err, IngestError::Excel(_)));
    }

    #[test]
    fn test_load_json_array_and_single_object() {
        let dir = tempfile::tempdir().unwrap();
        let array = write_file(
            &dir,
            "array.json",
            r#"[{"query": "What is AI?", "context": "AI is intelligence.", "answer": "AI is smart."},
                {"query": "Count", "context": 42, "answer": null, "ground_truth": "forty-two"}]"#,
        );
        let dataset = DataTableLoader::new().load(&array, None).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.contexts[1], "42");
        assert_eq!(dataset.answers[1], "");
        assert_eq!(dataset.ground_truths[0], None);

        let single = write_file(
            &dir,
            "single.json",
            r#"{"query": "What is AI?", "context": "AI is intelligence.", "answer": "AI is smart."}"#,
        );
        assert_eq!(DataTableLoader::new().load(&single, None).unwrap().len(), 1);
    }

    #[test]
    fn test_json_scalar_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "data.json", "[1, 2]");
        let err = DataTableLoader::new().load(&path, None).unwrap_err();
        assert!(matches!(err, IngestError::Invalid(_)));
    }

    #[test]
    fn test_explicit_format_overrides_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "data.txt", "query,context,answer\nq,c,a\n");
        assert!(matches!(
            DataTableLoader::new().load(&path, None),
            Err(IngestError::UnsupportedFormat(_))
        ));
        let dataset = DataTableLoader::new()
            .load(&path, Some(TableFormat::Csv))
            .unwrap();
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn test_file_not_found() {
        let err = DataTableLoader::new()
            .load(Path::new("/nonexistent/file.csv"), None)
            .unwrap_err();
        assert!(matches!(err, IngestError::NotFound(_)));
    }
}
