//! Export a [`QueryResult`] as CSV, JSON, JSON Lines or plain arrays.
//!
//! Column selection keeps the requested order. Columns that the result does
//! not have are written as empty CSV cells and left out of JSON objects.

use std::sync::Arc;

use super::result::{QueryResult, Row};
use crate::backend::Value;
use crate::error::DbError;

#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    /// Emit a header line (CSV and arrays only).
    pub include_header: bool,
    pub delimiter: char,
    /// Indent JSON output. Ignored by JSON Lines.
    pub pretty: bool,
    /// Columns to export; all result columns when `None`.
    pub columns: Option<Vec<String>>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_header: true,
            delimiter: ',',
            pretty: false,
            columns: None,
        }
    }
}

impl ExportOptions {
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn without_header(mut self) -> Self {
        self.include_header = false;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }
}

impl QueryResult {
    /// Render as delimited text. An empty result renders as an empty string
    /// with no header line.
    pub fn to_csv(&self, options: &ExportOptions) -> String {
        if self.is_empty() {
            return String::new();
        }
        let columns = self.export_columns(options);
        let delimiter = options.delimiter.to_string();

        let mut lines = Vec::with_capacity(self.len() + 1);
        if options.include_header {
            lines.push(
                columns
                    .iter()
                    .map(|c| escape_csv(c, options.delimiter))
                    .collect::<Vec<_>>()
                    .join(&delimiter),
            );
        }
        for row in self.rows() {
            lines.push(
                columns
                    .iter()
                    .map(|c| escape_csv(&csv_text(row.get(c)), options.delimiter))
                    .collect::<Vec<_>>()
                    .join(&delimiter),
            );
        }
        lines.join("\n")
    }

    /// Render the rows as one JSON array of objects.
    pub fn to_json(&self, options: &ExportOptions) -> Result<String, DbError> {
        let rows = self.projected_rows(options);
        let encoded = if options.pretty {
            serde_json::to_string_pretty(&rows)
        } else {
            serde_json::to_string(&rows)
        };
        encoded.map_err(export_error)
    }

    /// Render one compact JSON object per line.
    pub fn to_json_lines(&self, options: &ExportOptions) -> Result<String, DbError> {
        let lines = self
            .projected_rows(options)
            .iter()
            .map(|row| serde_json::to_string(row).map_err(export_error))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lines.join("\n"))
    }

    /// Rows as value arrays, optionally preceded by the column names. Missing
    /// columns read as null.
    pub fn to_arrays(&self, options: &ExportOptions) -> Vec<Vec<Value>> {
        if self.is_empty() {
            return Vec::new();
        }
        let columns = self.export_columns(options);
        let header: Option<Vec<Value>> = options
            .include_header
            .then(|| columns.iter().map(|c| Value::from(c.as_str())).collect());
        header
            .into_iter()
            .chain(self.rows().iter().map(|row| {
                columns
                    .iter()
                    .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                    .collect()
            }))
            .collect()
    }

    fn export_columns(&self, options: &ExportOptions) -> Vec<String> {
        match &options.columns {
            Some(columns) => columns.clone(),
            None => self.column_names().into_iter().map(String::from).collect(),
        }
    }

    /// Rows narrowed to the selected columns that exist in this result.
    fn projected_rows(&self, options: &ExportOptions) -> Vec<Row> {
        let Some(selected) = &options.columns else {
            return self.rows().to_vec();
        };
        let present: Vec<&String> = selected
            .iter()
            .filter(|c| self.column_names().contains(&c.as_str()))
            .collect();
        let names: Arc<[String]> = present.iter().map(|c| c.to_string()).collect();
        self.rows()
            .iter()
            .map(|row| {
                let values = present
                    .iter()
                    .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                    .collect();
                Row::new(Arc::clone(&names), values)
            })
            .collect()
    }
}

fn csv_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(other) => other.to_label(),
    }
}

/// Quote a field when it holds the delimiter, a quote or a line break.
fn escape_csv(field: &str, delimiter: char) -> String {
    if field.contains(delimiter) || field.contains(['"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn export_error(e: serde_json::Error) -> DbError {
    DbError::Transformation {
        message: format!("failed to export rows: {e}"),
        row_index: None,
        field_name: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ColumnMetadata, RawResult};
    use rstest::{fixture, rstest};
    use std::time::Duration;

    #[fixture]
    fn result() -> QueryResult {
        let raw = RawResult {
            columns: vec![
                ColumnMetadata::new("id", "VARCHAR"),
                ColumnMetadata::new("gene", "VARCHAR"),
                ColumnMetadata::new("quality", "DOUBLE"),
            ],
            rows: vec![
                vec![Value::from("v1"), Value::from("BRCA1"), Value::Float(30.5)],
                vec![
                    Value::from("v2"),
                    Value::from("HLA-A, \"class I\""),
                    Value::Null,
                ],
            ],
            rows_affected: None,
        };
        QueryResult::from_raw(raw, Duration::from_millis(3))
    }

    fn empty() -> QueryResult {
        let raw = RawResult {
            columns: vec![ColumnMetadata::new("id", "VARCHAR")],
            rows: vec![],
            rows_affected: None,
        };
        QueryResult::from_raw(raw, Duration::ZERO)
    }

    #[rstest]
    fn test_csv_quotes_delimiters_and_quotes(result: QueryResult) {
        assert_eq!(
            result.to_csv(&ExportOptions::default()),
            "id,gene,quality\nv1,BRCA1,30.5\nv2,\"HLA-A, \"\"class I\"\"\","
        );
    }

    #[rstest]
    fn test_csv_custom_delimiter_changes_quoting(result: QueryResult) {
        let options = ExportOptions::default().with_delimiter('\t').without_header();
        assert_eq!(
            result.to_csv(&options),
            "v1\tBRCA1\t30.5\nv2\t\"HLA-A, \"\"class I\"\"\"\t"
        );
    }

    #[rstest]
    #[case("plain", "plain")]
    #[case("a;b", "\"a;b\"")]
    #[case("two\nlines", "\"two\nlines\"")]
    #[case("cr\rhere", "\"cr\rhere\"")]
    #[case("a,b", "a,b")]
    fn test_escape_csv_with_semicolon(#[case] field: &str, #[case] expected: &str) {
        assert_eq!(escape_csv(field, ';'), expected);
    }

    #[rstest]
    fn test_csv_column_selection_keeps_order(result: QueryResult) {
        let options = ExportOptions::default().with_columns(["quality", "missing", "id"]);
        assert_eq!(
            result.to_csv(&options),
            "quality,missing,id\n30.5,,v1\n,,v2"
        );
    }

    #[rstest]
    fn test_empty_result_exports_nothing() {
        let result = empty();
        assert_eq!(result.to_csv(&ExportOptions::default()), "");
        assert!(result.to_arrays(&ExportOptions::default()).is_empty());
        assert_eq!(result.to_json(&ExportOptions::default()).unwrap(), "[]");
        assert_eq!(result.to_json_lines(&ExportOptions::default()).unwrap(), "");
    }

    #[rstest]
    fn test_json_lines_one_object_per_row(result: QueryResult) {
        let options = ExportOptions::default().with_columns(["gene", "missing", "id"]);
        let text = result.to_json_lines(&options).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"gene":"BRCA1","id":"v1"}"#);
    }

    #[rstest]
    fn test_json_array_compact_and_pretty(result: QueryResult) {
        let compact = result.to_json(&ExportOptions::default()).unwrap();
        assert!(compact.starts_with(r#"[{"id":"v1","gene":"BRCA1","quality":30.5}"#));
        assert!(!compact.contains('\n'));

        let pretty = result.to_json(&ExportOptions::default().pretty()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&pretty).unwrap();
        assert_eq!(parsed[1]["quality"], serde_json::Value::Null);
        assert!(pretty.contains('\n'));
    }

    #[rstest]
    fn test_arrays_with_header(result: QueryResult) {
        let arrays = result.to_arrays(&ExportOptions::default().with_columns(["id", "quality"]));
        assert_eq!(
            arrays,
            vec![
                vec![Value::from("id"), Value::from("quality")],
                vec![Value::from("v1"), Value::Float(30.5)],
                vec![Value::from("v2"), Value::Null],
            ]
        );
    }
}
