//! Result rendering for the log.
//!
//! The first rows of every result are written to the log as an ASCII table
//! so a failing test's log shows what the database returned.

use crate::models::{ColumnMetadata, StatementOutcome};
use serde_json::Value as JsonValue;
use unicode_width::UnicodeWidthStr;

pub fn format_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(arr) => serde_json::to_string(arr).unwrap_or_default(),
        JsonValue::Object(obj) => serde_json::to_string(obj).unwrap_or_default(),
    }
}

/// Render at most `max_rows` rows as a table, followed by a row-count line.
pub fn format_as_table(
    columns: &[ColumnMetadata],
    rows: &[Vec<JsonValue>],
    max_rows: usize,
) -> String {
    if columns.is_empty() {
        return "Empty set".to_string();
    }

    let shown = &rows[..rows.len().min(max_rows)];
    let mut widths: Vec<usize> = columns.iter().map(|c| c.name.width()).collect();
    for row in shown {
        for (i, value) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(format_value(value).width());
        }
    }

    let mut output = String::new();
    let separator: String = widths
        .iter()
        .map(|w| format!("+{}", "-".repeat(w + 2)))
        .collect::<String>()
        + "+\n";

    output.push_str(&separator);
    let header: String = columns
        .iter()
        .zip(&widths)
        .map(|(col, w)| format!("| {} ", pad(&col.name, *w, Align::Center)))
        .collect::<String>()
        + "|\n";
    output.push_str(&header);
    output.push_str(&separator);

    for row in shown {
        let row_str: String = widths
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let value = row.get(i).unwrap_or(&JsonValue::Null);
                let align = if matches!(value, JsonValue::Number(_)) {
                    Align::Right
                } else {
                    Align::Left
                };
                format!("| {} ", pad(&format_value(value), *w, align))
            })
            .collect::<String>()
            + "|\n";
        output.push_str(&row_str);
    }

    output.push_str(&separator);

    let row_text = if rows.len() == 1 { "row" } else { "rows" };
    if shown.len() < rows.len() {
        output.push_str(&format!(
            "{} {} in set ({} shown)\n",
            rows.len(),
            row_text,
            shown.len()
        ));
    } else {
        output.push_str(&format!("{} {} in set\n", rows.len(), row_text));
    }

    output
}

/// One-line or tabular summary of a statement outcome.
pub fn format_outcome(outcome: &StatementOutcome, max_rows: usize) -> String {
    match outcome {
        StatementOutcome::Rows { columns, rows } if columns.is_empty() && rows.is_empty() => {
            "0 rows in set".to_string()
        }
        StatementOutcome::Rows { columns, rows } => format_as_table(columns, rows, max_rows),
        StatementOutcome::RowsAffected(n) => {
            let row_text = if *n == 1 { "row" } else { "rows" };
            format!("{n} {row_text} affected")
        }
    }
}

enum Align {
    Left,
    Right,
    Center,
}

/// Pad by display width, so wide characters line up.
fn pad(text: &str, width: usize, align: Align) -> String {
    let fill = width.saturating_sub(text.width());
    match align {
        Align::Left => format!("{}{}", text, " ".repeat(fill)),
        Align::Right => format!("{}{}", " ".repeat(fill), text),
        Align::Center => {
            let left = fill / 2;
            format!("{}{}{}", " ".repeat(left), text, " ".repeat(fill - left))
        }
    }
}
