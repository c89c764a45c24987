use crate::error::{Result, VarianceError};
use crate::ingestion::RawTable;
use crate::schema::CellValue;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;

/// Decodes the first worksheet of an xlsx/xls/ods workbook into a cell grid.
pub fn read_first_sheet(bytes: &[u8]) -> Result<Vec<Vec<CellValue>>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| VarianceError::Spreadsheet(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| VarianceError::Spreadsheet("Workbook has no worksheets".to_string()))?
        .map_err(|e| VarianceError::Spreadsheet(e.to_string()))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_from_data).collect())
        .collect())
}

impl RawTable {
    pub fn from_spreadsheet(bytes: &[u8]) -> Result<Self> {
        let cells = read_first_sheet(bytes)?;
        Self::from_cells(&cells)
    }
}

fn cell_from_data(cell: &Data) -> CellValue {
    match cell {
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        // Dates stay as Excel serial numbers.
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) | Data::Empty => CellValue::empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_bytes_are_spreadsheet_error() {
        let err = RawTable::from_spreadsheet(b"definitely not a workbook").unwrap_err();
        assert!(matches!(err, VarianceError::Spreadsheet(_)));
    }

    const WORKBOOK: &[u8] = include_bytes!("../tests/fixtures/variance.xlsx");

    #[test]
    fn test_reads_first_sheet_of_workbook() {
        let grid = read_first_sheet(WORKBOOK).unwrap();
        assert_eq!(grid.len(), 4);
        assert!(grid.iter().all(|row| row.len() == 5));

        let table = RawTable::from_spreadsheet(WORKBOOK).unwrap();
        assert_eq!(
            table.headers,
            vec!["Category", "Cost Center", "Budget", "Actual", "Period"]
        );
        assert_eq!(table.rows.len(), 3);

        let rent = &table.rows[0];
        assert_eq!(rent["Category"], CellValue::Text("Rent".to_string()));
        assert_eq!(rent["Budget"], CellValue::Number(1000.0));
        assert_eq!(rent["Actual"], CellValue::Number(1200.0));
        // 2024-01-01 as an Excel serial date.
        assert_eq!(rent["Period"], CellValue::Number(45292.0));

        assert!(table.rows[1]["Period"].is_blank());
        assert!(table.rows[2]["Actual"].is_blank());
        assert_eq!(table.rows[2]["Budget"], CellValue::Number(300.0));
    }

    #[test]
    fn test_cell_conversion() {
        assert_eq!(cell_from_data(&Data::Int(7)), CellValue::Number(7.0));
        assert_eq!(cell_from_data(&Data::Empty), CellValue::empty());
        assert_eq!(
            cell_from_data(&Data::String("Rent".to_string())),
            CellValue::Text("Rent".to_string())
        );
    }
}
