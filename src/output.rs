//! Rendering of query results and verdicts for the command line.

use serde_json::{json, Map};

use crate::error::{RelayError, Result};
use crate::job::SyntaxVerdict;
use crate::result::{QueryResult, Value};

/// Output format for query results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned plain-text table.
    #[default]
    Text,
    /// JSON object with columns, rows (as objects) and metadata.
    Json,
    /// CSV with a header row.
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => Err(format!(
                "Invalid output format: {s}. Expected: text, json, or csv"
            )),
        }
    }
}

/// Renders `result` in the given format.
pub fn render_result(result: &QueryResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_table(result)),
        OutputFormat::Json => render_json(result),
        OutputFormat::Csv => render_csv(result),
    }
}

/// Renders a syntax verdict as a single line.
pub fn render_verdict(verdict: &SyntaxVerdict) -> String {
    match verdict {
        SyntaxVerdict::Passed => "Passed".to_string(),
        SyntaxVerdict::Failed(reason) => format!("Failed: {reason}"),
        SyntaxVerdict::Unavailable(err) => format!("Unavailable: {err}"),
    }
}

fn render_table(result: &QueryResult) -> String {
    let headers: Vec<String> = result.columns.iter().map(|c| c.name.clone()).collect();
    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(Value::to_display_string).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let format_line = |values: &[String]| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(v, &w)| format!("{v:<w$}"))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&format_line(&headers));
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    out.push('\n');
    for row in &cells {
        out.push_str(&format_line(row));
        out.push('\n');
    }

    let noun = if result.row_count == 1 { "row" } else { "rows" };
    out.push_str(&format!(
        "({} {noun}, {:.2}s)",
        result.row_count,
        result.execution_time.as_secs_f64()
    ));
    out
}

fn render_json(result: &QueryResult) -> Result<String> {
    let rows: Vec<serde_json::Value> = result
        .rows
        .iter()
        .map(|row| {
            let object: Map<String, serde_json::Value> = result
                .columns
                .iter()
                .zip(row)
                .map(|(col, value)| (col.name.clone(), value_to_json(value)))
                .collect();
            serde_json::Value::Object(object)
        })
        .collect();

    let output = json!({
        "execution_id": result.execution_id,
        "columns": result.columns,
        "rows": rows,
        "row_count": result.row_count,
        "execution_time_ms": result.execution_time.as_millis() as u64,
    });

    serde_json::to_string_pretty(&output)
        .map_err(|e| RelayError::parse(format!("Failed to encode JSON output: {e}")))
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => json!(b),
        Value::Int(i) => json!(i),
        Value::Float(f) => json!(f),
        Value::String(s) => json!(s),
    }
}

fn render_csv(result: &QueryResult) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let encode_err = |e: csv::Error| RelayError::parse(format!("Failed to encode CSV output: {e}"));

    writer
        .write_record(result.columns.iter().map(|c| c.name.as_str()))
        .map_err(encode_err)?;
    for row in &result.rows {
        writer
            .write_record(row.iter().map(|v| match v {
                Value::Null => String::new(),
                other => other.to_display_string(),
            }))
            .map_err(encode_err)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| RelayError::parse(format!("Failed to flush CSV output: {e}")))?;
    String::from_utf8(bytes).map_err(|e| RelayError::parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ColumnInfo;
    use pretty_assertions::assert_eq;

    fn sample() -> QueryResult {
        QueryResult::with_data(
            vec![
                ColumnInfo::new("title", "varchar"),
                ColumnInfo::new("votes", "bigint"),
            ],
            vec![
                vec![Value::from("Heat"), Value::Int(712)],
                vec![Value::from("The Matrix"), Value::Null],
            ],
        )
    }

    #[test]
    fn test_parse_output_format() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("TEXT".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("csv".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_render_table() {
        let text = render_result(&sample(), OutputFormat::Text).unwrap();
        let expected = "title      | votes\n\
                        -----------+------\n\
                        Heat       | 712\n\
                        The Matrix | NULL\n\
                        (2 rows, 0.00s)";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_render_json() {
        let text = render_result(&sample(), OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(parsed["row_count"], 2);
        assert_eq!(parsed["rows"][0]["title"], "Heat");
        assert_eq!(parsed["rows"][0]["votes"], 712);
        assert!(parsed["rows"][1]["votes"].is_null());
        assert_eq!(parsed["columns"][1]["data_type"], "bigint");
    }

    #[test]
    fn test_render_csv() {
        let text = render_result(&sample(), OutputFormat::Csv).unwrap();
        assert_eq!(text, "title,votes\nHeat,712\nThe Matrix,\n");
    }

    #[test]
    fn test_render_verdict() {
        assert_eq!(render_verdict(&SyntaxVerdict::Passed), "Passed");
        assert_eq!(
            render_verdict(&SyntaxVerdict::Failed("bad token".to_string())),
            "Failed: bad token"
        );
        assert_eq!(
            render_verdict(&SyntaxVerdict::Unavailable(RelayError::transport("offline"))),
            "Unavailable: Transport error: offline"
        );
    }
}
