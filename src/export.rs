//! Export Module
//!
//! Renders a ranked report as an aligned text table, pretty-printed JSON,
//! or JSON Lines for piping into other tools.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregate::{LocalHostRecord, PointToPointRecord, RawRecord};
use crate::fields::{fields_for, label, Columns, Field};
use crate::filter::FilterSpec;
use crate::query::{QueryContext, Report};
use crate::settings::{SortKey, View};

/// Output format for exports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    JsonLines, // One JSON object per line (JSONL)
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "jsonl" | "jsonlines" => Ok(Self::JsonLines),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
            Self::JsonLines => write!(f, "jsonl"),
        }
    }
}

/// What a report was computed from.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMeta {
    pub generated_at: DateTime<Utc>,
    pub sort_key: SortKey,
    pub threshold: u64,
    pub filters: FilterSpec,
    pub batches: usize,
    pub sessions: usize,
}

impl From<&QueryContext> for ReportMeta {
    fn from(ctx: &QueryContext) -> Self {
        let settings = ctx.settings();
        Self {
            generated_at: Utc::now(),
            sort_key: settings.sort_key,
            threshold: settings.threshold,
            filters: settings.filters.clone(),
            batches: ctx.store().len(),
            sessions: ctx.store().session_count(),
        }
    }
}

/// Borrowed, possibly truncated rows of a report.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(untagged)]
enum Rows<'a> {
    Raw(&'a [RawRecord]),
    PointToPoint(&'a [PointToPointRecord]),
    LocalHost(&'a [LocalHostRecord]),
}

impl<'a> Rows<'a> {
    fn new(report: &'a Report, limit: Option<usize>) -> Self {
        fn head<T>(rows: &[T], limit: Option<usize>) -> &[T] {
            &rows[..limit.map_or(rows.len(), |n| n.min(rows.len()))]
        }
        match report {
            Report::Raw(rows) => Self::Raw(head(rows, limit)),
            Report::PointToPoint(rows) => Self::PointToPoint(head(rows, limit)),
            Report::LocalHost(rows) => Self::LocalHost(head(rows, limit)),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Raw(rows) => rows.len(),
            Self::PointToPoint(rows) => rows.len(),
            Self::LocalHost(rows) => rows.len(),
        }
    }

    fn cells(&self, fields: &[Field]) -> Vec<Vec<String>> {
        fn collect<T: Columns>(rows: &[T], fields: &[Field]) -> Vec<Vec<String>> {
            rows.iter()
                .map(|row| {
                    fields
                        .iter()
                        .map(|f| row.value(*f).unwrap_or_else(|| "-".to_string()))
                        .collect()
                })
                .collect()
        }
        match self {
            Self::Raw(rows) => collect(rows, fields),
            Self::PointToPoint(rows) => collect(rows, fields),
            Self::LocalHost(rows) => collect(rows, fields),
        }
    }

    fn json_lines(&self) -> Vec<String> {
        fn encode<T: Serialize>(rows: &[T]) -> Vec<String> {
            rows.iter().filter_map(|r| serde_json::to_string(r).ok()).collect()
        }
        match self {
            Self::Raw(rows) => encode(rows),
            Self::PointToPoint(rows) => encode(rows),
            Self::LocalHost(rows) => encode(rows),
        }
    }
}

/// JSON-serializable report
#[derive(Serialize)]
struct JsonReport<'a> {
    version: &'static str,
    #[serde(flatten)]
    meta: &'a ReportMeta,
    view: String,
    total_rows: usize,
    rows: Rows<'a>,
}

impl<'a> JsonReport<'a> {
    fn new(report: &'a Report, meta: &'a ReportMeta, limit: Option<usize>) -> Self {
        Self {
            version: "1.0",
            meta,
            view: report.view().to_string(),
            total_rows: report.len(),
            rows: Rows::new(report, limit),
        }
    }
}

/// Exports a report in the specified format, keeping at most `limit` rows.
pub fn export_report(
    report: &Report,
    meta: &ReportMeta,
    format: OutputFormat,
    limit: Option<usize>,
) -> String {
    match format {
        OutputFormat::Text => export_text(report, meta, limit),
        OutputFormat::Json => export_json(report, meta, limit),
        OutputFormat::JsonLines => export_jsonl(report, meta, limit),
    }
}

/// Exports report as pretty-printed JSON
pub fn export_json(report: &Report, meta: &ReportMeta, limit: Option<usize>) -> String {
    serde_json::to_string_pretty(&JsonReport::new(report, meta, limit))
        .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

/// Exports report as JSON Lines (one record per line)
pub fn export_jsonl(report: &Report, meta: &ReportMeta, limit: Option<usize>) -> String {
    let rows = Rows::new(report, limit);
    let mut lines = Vec::with_capacity(rows.len() + 1);

    // First line is the summary
    let summary = serde_json::json!({
        "type": "summary",
        "generated_at": meta.generated_at.to_rfc3339(),
        "sort_key": meta.sort_key,
        "threshold": meta.threshold,
        "filters": meta.filters,
        "view": report.view().to_string(),
        "batches": meta.batches,
        "sessions": meta.sessions,
        "total_rows": report.len(),
    });
    lines.push(serde_json::to_string(&summary).unwrap_or_default());

    lines.extend(rows.json_lines());
    lines.join("\n")
}

/// Exports report as an aligned text table
pub fn export_text(report: &Report, meta: &ReportMeta, limit: Option<usize>) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "--- Flow Report ---\nTime: {}\n{}: {}\n{}: {}\nBatches: {} ({} sessions)\n",
        meta.generated_at.format("%Y-%m-%d %H:%M:%S"),
        label("sort-key"),
        meta.sort_key,
        label("threshold"),
        meta.threshold,
        meta.batches,
        meta.sessions,
    ));
    for (name, value) in meta.filters.iter() {
        output.push_str(&format!("{}: {}\n", label(name.as_str()), value));
    }

    if report.is_empty() {
        output.push_str("Rows: None\n");
        return output;
    }

    let key = if report.view() == View::Raw { SortKey::Raw } else { meta.sort_key };
    let fields = fields_for(key, true);
    let rows = Rows::new(report, limit);
    output.push_str(&format!("Rows: {} of {}\n\n", rows.len(), report.len()));
    output.push_str(&render_table(&fields, &rows.cells(&fields)));
    output
}

fn render_table(fields: &[Field], cells: &[Vec<String>]) -> String {
    let headers: Vec<String> = fields.iter().map(Field::label).collect();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |row: &[String]| -> String {
        let padded: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect();
        format!("{}\n", padded.join("  ").trim_end())
    };

    let mut table = line(&headers);
    let rule_width = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
    table.push_str(&"-".repeat(rule_width));
    table.push('\n');
    for row in cells {
        table.push_str(&line(row));
    }
    table
}
