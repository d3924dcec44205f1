//! Output formatting for command results.
//!
//! Supports multiple output formats: table (human-readable), JSON, toon,
//! and the row exports CSV and JSON Lines.

use clap::ValueEnum;
use genoquery_db::{
    ComparisonResult, CrossTabResult, ExportOptions, HistogramResult, PaginatedResult,
    QueryResult, Statistics, Value,
};
use serde::Serialize;

/// Output format for command results
#[derive(Debug, Clone, Copy, Default, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// Token-efficient toon format
    Toon,
    /// Comma-separated rows with a header line
    Csv,
    /// One JSON object per row
    Jsonl,
}

/// Trait for types that can be formatted for output
pub trait Outputable: Serialize {
    /// Format as a human-readable table
    fn to_table(&self) -> String;

    /// The row set behind this output, for the row export formats
    fn row_set(&self) -> Option<&QueryResult> {
        None
    }

    /// Format according to the specified output format
    ///
    /// Results without a row set are written as one line of JSON under the
    /// CSV and JSON Lines formats.
    fn format(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Table => self.to_table(),
            OutputFormat::Json => serde_json::to_string_pretty(self).unwrap_or_default(),
            OutputFormat::Toon => {
                let json_value = serde_json::to_value(self).unwrap_or_default();
                toon::encode(&json_value, None)
            }
            OutputFormat::Csv => match self.row_set() {
                Some(result) => result.to_csv(&ExportOptions::default()),
                None => serde_json::to_string(self).unwrap_or_default(),
            },
            OutputFormat::Jsonl => match self.row_set() {
                Some(result) => result
                    .to_json_lines(&ExportOptions::default())
                    .unwrap_or_default(),
                None => serde_json::to_string(self).unwrap_or_default(),
            },
        }
    }
}

const BAR_WIDTH: usize = 40;

/// Render left-aligned columns separated by two spaces, with a dashed rule
/// under the header.
pub fn render_grid(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(line(headers));
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    lines.extend(rows.iter().map(|row| line(row.as_slice())));
    lines.join("\n")
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        other => other.to_label(),
    }
}

fn number(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{v:.0}"),
        Some(v) => format!("{v:.4}"),
        None => "-".to_string(),
    }
}

fn rows_grid(result: &QueryResult) -> String {
    let headers: Vec<String> = result.column_names().into_iter().map(String::from).collect();
    let rows: Vec<Vec<String>> = result
        .rows()
        .iter()
        .map(|row| row.values().iter().map(cell).collect())
        .collect();
    render_grid(&headers, &rows)
}

impl Outputable for QueryResult {
    fn row_set(&self) -> Option<&QueryResult> {
        Some(self)
    }

    fn to_table(&self) -> String {
        let elapsed = self.execution_time().as_secs_f64() * 1000.0;
        if let Some(affected) = self.rows_affected() {
            return format!("{affected} row(s) affected ({elapsed:.1} ms)");
        }
        if self.is_empty() {
            return format!("No rows. ({elapsed:.1} ms)");
        }
        format!("{}\n\n{} row(s) ({elapsed:.1} ms)", rows_grid(self), self.len())
    }
}

impl Outputable for PaginatedResult {
    fn row_set(&self) -> Option<&QueryResult> {
        Some(&self.result)
    }

    fn to_table(&self) -> String {
        let footer = format!(
            "Page {} of {} ({} total)",
            self.page, self.total_pages, self.total
        );
        if self.result.is_empty() {
            return format!("No rows on this page.\n\n{footer}");
        }
        format!("{}\n\n{footer}", rows_grid(&self.result))
    }
}

impl Outputable for Statistics {
    fn to_table(&self) -> String {
        let mut lines = vec![format!("Total: {}", self.total_count)];

        for (field, counts) in &self.breakdowns {
            lines.push(String::new());
            lines.push(format!("{field}:"));
            let width = counts.keys().map(|k| k.chars().count()).max().unwrap_or(0);
            for (value, count) in counts {
                lines.push(format!("  {:<width$}  {count}", value, width = width));
            }
        }

        if !self.numeric.is_empty() {
            lines.push(String::new());
            let headers: Vec<String> = ["field", "count", "nulls", "min", "max", "mean", "median", "stddev"]
                .iter()
                .map(|h| h.to_string())
                .collect();
            let rows: Vec<Vec<String>> = self
                .numeric
                .iter()
                .map(|(field, s)| {
                    vec![
                        field.clone(),
                        s.count.to_string(),
                        s.null_count.to_string(),
                        number(s.min),
                        number(s.max),
                        number(s.mean),
                        number(s.median),
                        number(s.stddev),
                    ]
                })
                .collect();
            lines.push(render_grid(&headers, &rows));
        }

        lines.join("\n")
    }
}

impl Outputable for HistogramResult {
    fn to_table(&self) -> String {
        let mut lines = vec![format!(
            "Histogram: {} ({} values, bin width {})",
            self.field,
            self.total_count,
            number(Some(self.bin_width))
        )];
        lines.push(String::new());

        if self.bins.is_empty() {
            lines.push("No values.".to_string());
            return lines.join("\n");
        }

        let peak = self.bins.iter().map(|b| b.count).max().unwrap_or(0).max(1);
        let last = self.bins.len() - 1;
        let ranges: Vec<String> = self
            .bins
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let close = if i == last { ']' } else { ')' };
                format!("[{}, {}{close}", number(Some(b.start)), number(Some(b.end)))
            })
            .collect();
        let width = ranges.iter().map(|r| r.chars().count()).max().unwrap_or(0);

        for (range, bin) in ranges.iter().zip(&self.bins) {
            let bar = "#".repeat((bin.count as usize * BAR_WIDTH).div_ceil(peak as usize));
            lines.push(format!(
                "{:<width$}  {:>6}  {:>5.1}%  {bar}",
                range,
                bin.count,
                bin.percentage,
                width = width
            ));
        }
        lines.join("\n")
    }
}

impl Outputable for ComparisonResult {
    fn to_table(&self) -> String {
        let mut lines = Vec::new();
        for group in [&self.group1, &self.group2] {
            lines.push(format!(
                "{} ({} samples): {} variants, {} unique, {:.2} per sample",
                group.label,
                group.sample_ids.len(),
                group.total_variants,
                group.unique_variants,
                group.avg_variants_per_sample
            ));
            let types: Vec<String> = group
                .type_distribution
                .iter()
                .map(|(t, n)| format!("{t}={n}"))
                .collect();
            if !types.is_empty() {
                lines.push(format!("  types: {}", types.join(", ")));
            }
        }

        if let Some(overlap) = &self.overlap {
            lines.push(String::new());
            lines.push(format!(
                "Overlap: {} shared, {} only in {}, {} only in {} (Jaccard {:.3})",
                overlap.shared,
                overlap.group1_only,
                self.group1.label,
                overlap.group2_only,
                self.group2.label,
                overlap.jaccard_index
            ));
        }

        if !self.field_comparisons.is_empty() {
            lines.push(String::new());
            let headers = vec![
                "field".to_string(),
                format!("{} mean", self.group1.label),
                format!("{} mean", self.group2.label),
                "difference".to_string(),
                "% difference".to_string(),
            ];
            let rows: Vec<Vec<String>> = self
                .field_comparisons
                .iter()
                .map(|c| {
                    vec![
                        c.field.clone(),
                        number(c.group1.mean),
                        number(c.group2.mean),
                        number(c.mean_difference),
                        c.percent_difference
                            .map(|p| format!("{p:.1}%"))
                            .unwrap_or_else(|| "-".to_string()),
                    ]
                })
                .collect();
            lines.push(render_grid(&headers, &rows));
        }

        lines.join("\n")
    }
}

impl Outputable for CrossTabResult {
    fn to_table(&self) -> String {
        if self.row_labels.is_empty() {
            return format!("{} x {}: no rows", self.row_field, self.column_field);
        }

        let mut headers = vec![format!("{} \\ {}", self.row_field, self.column_field)];
        headers.extend(self.column_labels.iter().cloned());
        if self.row_totals.is_some() {
            headers.push("total".to_string());
        }

        let mut rows: Vec<Vec<String>> = self
            .row_labels
            .iter()
            .zip(&self.data)
            .enumerate()
            .map(|(i, (label, counts))| {
                let mut row = vec![label.clone()];
                row.extend(counts.iter().map(u64::to_string));
                if let Some(totals) = &self.row_totals {
                    row.push(totals.get(i).copied().unwrap_or(0).to_string());
                }
                row
            })
            .collect();

        if let Some(totals) = &self.column_totals {
            let mut row = vec!["total".to_string()];
            row.extend(totals.iter().map(u64::to_string));
            row.push(self.grand_total.to_string());
            rows.push(row);
        }

        render_grid(&headers, &rows)
    }
}
