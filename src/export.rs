//! Rendering of fetched rows: CSV, TSV, JSON, INSERT statements and an
//! aligned text table for the terminal.
use unicode_width::UnicodeWidthStr;

use crate::db::ResultSet;
use crate::types::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Csv,
    Tsv,
    Json,
    /// One INSERT statement per row.
    Insert,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "csv" => Ok(OutputFormat::Csv),
            "tsv" => Ok(OutputFormat::Tsv),
            "json" => Ok(OutputFormat::Json),
            "insert" | "sql" => Ok(OutputFormat::Insert),
            other => Err(format!("unknown format {:?}", other)),
        }
    }
}

/// `table_name` is only used by the INSERT format.
pub fn render(result: &ResultSet, format: OutputFormat, table_name: &str) -> String {
    match format {
        OutputFormat::Table => to_table(result),
        OutputFormat::Csv => to_csv(result),
        OutputFormat::Tsv => to_tsv(result),
        OutputFormat::Json => to_json(result),
        OutputFormat::Insert => to_sql_insert(result, table_name),
    }
}

pub fn to_csv(result: &ResultSet) -> String {
    let mut output = String::new();

    let headers: Vec<String> = result.columns.iter().map(|c| csv_escape(&c.name)).collect();
    output.push_str(&headers.join(","));
    output.push('\n');

    for row in &result.rows {
        let cells: Vec<String> = row.values().map(|v| csv_escape(&plain(v))).collect();
        output.push_str(&cells.join(","));
        output.push('\n');
    }

    output
}

pub fn to_tsv(result: &ResultSet) -> String {
    let mut output = String::new();

    let headers: Vec<&str> = result.columns.iter().map(|c| c.name.as_str()).collect();
    output.push_str(&headers.join("\t"));
    output.push('\n');

    for row in &result.rows {
        let cells: Vec<String> = row.values().map(|v| plain(v).replace('\t', " ")).collect();
        output.push_str(&cells.join("\t"));
        output.push('\n');
    }

    output
}

/// One JSON object per row, keyed by column label.
pub fn to_json(result: &ResultSet) -> String {
    let rows: Vec<serde_json::Value> = result
        .rows
        .iter()
        .map(|row| {
            let object = row
                .iter()
                .map(|(name, value)| (name.to_string(), value_to_json(value)))
                .collect();
            serde_json::Value::Object(object)
        })
        .collect();

    serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string())
}

pub fn to_sql_insert(result: &ResultSet, table_name: &str) -> String {
    if result.rows.is_empty() || result.columns.is_empty() {
        return String::new();
    }

    let columns: Vec<&str> = result.columns.iter().map(|c| c.name.as_str()).collect();
    let mut output = String::new();
    for row in &result.rows {
        let values: Vec<String> = row.values().map(value_to_sql).collect();
        output.push_str(&format!(
            "INSERT INTO {} ({}) VALUES ({});\n",
            table_name,
            columns.join(", "),
            values.join(", ")
        ));
    }
    output
}

/// Columns padded to their widest cell, measured in terminal columns.
pub fn to_table(result: &ResultSet) -> String {
    let headers: Vec<&str> = result.columns.iter().map(|c| c.name.as_str()).collect();
    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.values().map(display).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.width()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.width());
            }
        }
    }

    let line = |values: &mut dyn Iterator<Item = &str>| -> String {
        let padded: Vec<String> = values
            .zip(&widths)
            .map(|(v, w)| format!("{}{}", v, " ".repeat(w.saturating_sub(v.width()))))
            .collect();
        padded.join(" | ").trim_end().to_string()
    };

    let mut output = line(&mut headers.iter().copied());
    output.push('\n');
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    output.push_str(&rule.join("-+-"));
    output.push('\n');
    for row in &cells {
        output.push_str(&line(&mut row.iter().map(String::as_str)));
        output.push('\n');
    }
    output.push_str(&format!(
        "({} row{})\n",
        result.rows.len(),
        if result.rows.len() == 1 { "" } else { "s" }
    ));
    output
}

fn plain(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Short(i) => serde_json::json!(*i),
        Value::Int(i) => serde_json::json!(*i),
        Value::Long(i) => serde_json::json!(*i),
        Value::Float(f) => serde_json::json!(*f),
        Value::Double(f) => serde_json::json!(*f),
        Value::Json(j) => j.clone(),
        other => serde_json::Value::String(other.to_string()),
    }
}

fn value_to_sql(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Short(_)
        | Value::Int(_)
        | Value::Long(_)
        | Value::Float(_)
        | Value::Double(_)
        | Value::Decimal(_) => value.to_string(),
        other => format!("'{}'", other.to_string().replace('\'', "''")),
    }
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ColumnDescriptor, DataRow};
    use crate::types::JdbcType;

    fn make_result() -> ResultSet {
        ResultSet {
            columns: vec![
                ColumnDescriptor::new("ARTIST_ID", JdbcType::BigInt),
                ColumnDescriptor::new("ARTIST_NAME", JdbcType::VarChar),
                ColumnDescriptor::new("ACTIVE", JdbcType::Boolean),
            ],
            rows: vec![
                DataRow::new()
                    .with("ARTIST_ID", 1i64)
                    .with("ARTIST_NAME", "Monet")
                    .with("ACTIVE", true),
                DataRow::new()
                    .with("ARTIST_ID", 2i64)
                    .with("ARTIST_NAME", "O'Keeffe, Georgia")
                    .with("ACTIVE", Value::Null),
            ],
        }
    }

    #[test]
    fn test_csv_export() {
        let csv = to_csv(&make_result());
        assert!(csv.starts_with("ARTIST_ID,ARTIST_NAME,ACTIVE\n"));
        assert!(csv.contains("1,Monet,true\n"));
        assert!(csv.contains("2,\"O'Keeffe, Georgia\",\n"));
    }

    #[test]
    fn test_csv_escaping() {
        assert_eq!(csv_escape("hello"), "hello");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_json_export() {
        let json = to_json(&make_result());
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0]["ARTIST_ID"], 1);
        assert_eq!(parsed[0]["ACTIVE"], true);
        assert!(parsed[1]["ACTIVE"].is_null());
    }

    #[test]
    fn test_sql_insert_export() {
        let sql = to_sql_insert(&make_result(), "ARTIST");
        assert!(sql.contains("INSERT INTO ARTIST (ARTIST_ID, ARTIST_NAME, ACTIVE) VALUES (1, 'Monet', TRUE);"));
        assert!(sql.contains("'O''Keeffe, Georgia', NULL"));
        assert!(to_sql_insert(&ResultSet::default(), "ARTIST").is_empty());
    }

    #[test]
    fn test_tsv_export() {
        assert!(to_tsv(&make_result()).contains("1\tMonet\ttrue\n"));
    }

    #[test]
    fn test_table_pads_by_display_width() {
        let result = ResultSet {
            columns: vec![ColumnDescriptor::new("NAME", JdbcType::VarChar)],
            rows: vec![
                DataRow::new().with("NAME", "葛飾北斎"),
                DataRow::new().with("NAME", "Ai"),
            ],
        };
        let table = to_table(&result);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "NAME");
        assert_eq!(lines[1], "--------");
        assert_eq!(lines[3], "Ai");
        assert_eq!(lines[4], "(2 rows)");
    }

    #[test]
    fn test_render_insert_uses_table_name() {
        let mut result = make_result();
        result.columns.push(ColumnDescriptor::new("PRICE", JdbcType::Decimal));
        result.rows[0].push("PRICE".to_string(), Value::Decimal(rust_decimal::Decimal::new(12050, 2)));
        result.rows[1].push("PRICE".to_string(), Value::Null);

        let sql = render(&result, OutputFormat::Insert, "ARTIST");
        assert_eq!(sql.lines().count(), 2);
        assert!(sql.starts_with("INSERT INTO ARTIST (ARTIST_ID, ARTIST_NAME, ACTIVE, PRICE) VALUES (1, 'Monet', TRUE, 120.50);"));
    }

    #[test]
    fn test_format_names() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("insert".parse::<OutputFormat>(), Ok(OutputFormat::Insert));
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
