//! Plain-text summary table printed by the `detect` command.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::processor::FieldSummary;

const HEADERS: [&str; 7] = ["id", "field", "type", "options", "total", "invalid", "null"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryTable {
    rows: Vec<[String; 7]>,
}

impl SummaryTable {
    pub fn from_summaries(summaries: &[FieldSummary]) -> Self {
        let rows = summaries
            .iter()
            .map(|summary| {
                let options = summary.decision.describe_options();
                [
                    summary.field_id.to_string(),
                    summary.title.clone(),
                    summary.decision.field_type().to_string(),
                    if options.is_empty() { "-".to_string() } else { options },
                    summary.health_stats.total.to_string(),
                    summary.health_stats.invalid.to_string(),
                    summary.health_stats.null.to_string(),
                ]
            })
            .collect();
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self) -> String {
        let mut widths = HEADERS.map(|header| header.chars().count());
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(sanitize_cell(cell).chars().count());
            }
        }

        let mut output = String::new();
        let _ = writeln!(output, "{}", format_row(HEADERS.iter().copied(), &widths));
        let rules: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
        let _ = writeln!(output, "{}", format_row(rules.iter().map(String::as_str), &widths));
        for row in &self.rows {
            let _ = writeln!(output, "{}", format_row(row.iter().map(String::as_str), &widths));
        }
        output
    }
}

fn format_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let mut line = String::new();
    for (idx, (cell, width)) in cells.zip(widths).enumerate() {
        if idx > 0 {
            line.push_str("  ");
        }
        let cell = sanitize_cell(cell);
        let _ = write!(line, "{cell:<width$}");
    }
    line.truncate(line.trim_end().len());
    line
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
