use crate::error::{Result, VarianceError};
use crate::schema::CellValue;
use crate::utils::strip_quotes;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One source row keyed by header.
pub type RawRow = BTreeMap<String, CellValue>;

/// Header row plus data rows, before any column roles are known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    /// Parses pasted delimited text.
    ///
    /// The first non-empty line is the header. It fixes the delimiter for the
    /// whole input: tab if the header contains one, comma otherwise. A data
    /// line is kept only when it has exactly as many fields as the header and
    /// at least one of them is non-empty; every other line is dropped.
    pub fn parse_text(text: &str) -> Result<Self> {
        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();

        if lines.len() < 2 {
            return Err(VarianceError::Format(
                "Expected a header row and at least one data row".to_string(),
            ));
        }

        let header_line = lines[0];
        let delimiter = if header_line.contains('\t') { b'\t' } else { b',' };
        let headers = split_line(header_line, delimiter).ok_or_else(|| {
            VarianceError::Format(format!("Could not read header row: {}", header_line))
        })?;

        let mut rows = Vec::new();
        let mut dropped = 0usize;

        for line in &lines[1..] {
            match split_line(line, delimiter) {
                Some(fields)
                    if fields.len() == headers.len() && fields.iter().any(|f| !f.is_empty()) =>
                {
                    rows.push(
                        headers
                            .iter()
                            .cloned()
                            .zip(fields.into_iter().map(CellValue::Text))
                            .collect(),
                    );
                }
                _ => dropped += 1,
            }
        }

        if dropped > 0 {
            debug!(
                "Dropped {} malformed line(s) while parsing {} column(s)",
                dropped,
                headers.len()
            );
        }

        if rows.is_empty() {
            return Err(VarianceError::Format(format!(
                "No valid data rows found; each row needs {} fields matching the header",
                headers.len()
            )));
        }

        Ok(Self { headers, rows })
    }

    /// Builds a table from a decoded spreadsheet grid. Row 0 is the header;
    /// missing trailing cells read as empty and fully blank rows are skipped.
    pub fn from_cells(cells: &[Vec<CellValue>]) -> Result<Self> {
        let (header_row, data_rows) = cells
            .split_first()
            .ok_or_else(|| VarianceError::Format("Spreadsheet has no header row".to_string()))?;

        let headers: Vec<String> = header_row
            .iter()
            .map(|c| strip_quotes(&c.as_text()).to_string())
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(VarianceError::Format(
                "Spreadsheet header row is empty".to_string(),
            ));
        }

        let rows: Vec<RawRow> = data_rows
            .iter()
            .map(|row| {
                headers
                    .iter()
                    .enumerate()
                    .map(|(i, h)| (h.clone(), row.get(i).cloned().unwrap_or_default()))
                    .collect::<RawRow>()
            })
            .filter(|row| row.values().any(|c| !c.is_blank()))
            .collect();

        if rows.is_empty() {
            return Err(VarianceError::Format(
                "Spreadsheet has no data rows".to_string(),
            ));
        }

        Ok(Self { headers, rows })
    }

    /// Builds a table from header-to-value objects. Headers are every key
    /// seen, in first-seen order.
    pub fn from_records(records: &[serde_json::Map<String, Value>]) -> Result<Self> {
        let mut headers: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
        }

        if headers.is_empty() {
            return Err(VarianceError::Format(
                "No columns found in records".to_string(),
            ));
        }

        let rows: Vec<RawRow> = records
            .iter()
            .map(|record| {
                headers
                    .iter()
                    .map(|h| (h.clone(), record.get(h).map(cell_from_json).unwrap_or_default()))
                    .collect::<RawRow>()
            })
            .filter(|row| row.values().any(|c| !c.is_blank()))
            .collect();

        if rows.is_empty() {
            return Err(VarianceError::Format("No data rows found in records".to_string()));
        }

        Ok(Self { headers, rows })
    }
}

/// Text returned by an AI extraction service. A reply starting with
/// `error_prefix` is a failure report, not data.
pub fn parse_extracted_text(text: &str, error_prefix: &str) -> Result<RawTable> {
    let trimmed = text.trim();

    if !error_prefix.is_empty() {
        if let Some(reason) = trimmed.strip_prefix(error_prefix) {
            return Err(VarianceError::Extraction(reason.trim().to_string()));
        }
    }

    RawTable::parse_text(strip_code_fence(trimmed))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (```csv) along with the opening fence line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => "",
    };
    body.trim_end().strip_suffix("```").unwrap_or(body)
}

fn split_line(line: &str, delimiter: u8) -> Option<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(line.as_bytes());

    let record = reader.records().next()?.ok()?;
    let quoted = csv_quoted_fields(line, delimiter);
    Some(
        record
            .iter()
            .enumerate()
            .map(|(i, field)| {
                // The csv reader already removed the quoting layer.
                if quoted.get(i).copied().unwrap_or(false) {
                    field.trim().to_string()
                } else {
                    strip_quotes(field.trim()).to_string()
                }
            })
            .collect(),
    )
}

/// Which fields of `line` open with a double quote, the only case in which
/// the csv reader unquotes them itself.
fn csv_quoted_fields(line: &str, delimiter: u8) -> Vec<bool> {
    let bytes = line.as_bytes();
    let mut flags = Vec::new();
    let mut i = 0;

    loop {
        let quoted = bytes.get(i) == Some(&b'"');
        flags.push(quoted);

        let mut in_quotes = quoted;
        if quoted {
            i += 1;
        }
        while i < bytes.len() {
            let b = bytes[i];
            if in_quotes && b == b'"' {
                if bytes.get(i + 1) == Some(&b'"') {
                    i += 2;
                    continue;
                }
                in_quotes = false;
            } else if !in_quotes && b == delimiter {
                break;
            }
            i += 1;
        }

        if i >= bytes.len() {
            break;
        }
        i += 1;
    }

    flags
}

fn cell_from_json(value: &Value) -> CellValue {
    match value {
        Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or_default(),
        Value::String(s) => CellValue::Text(s.clone()),
        Value::Null => CellValue::empty(),
        Value::Bool(b) => CellValue::Text(b.to_string()),
        other => CellValue::Text(other.to_string()),
    }
}
