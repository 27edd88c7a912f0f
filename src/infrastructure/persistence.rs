//! File persistence for spreadsheets.
//!
//! The shell's dialogs pick the paths; this layer does the synchronous
//! reads and writes. The document format is the flat JSON mapping
//! produced by [`Spreadsheet::serialize`] (`"A1"` keys for display
//! values, `"A1_formula"` keys for raw formulas). CSV export writes the
//! used rectangle of display values; CSV import reads every field back
//! as a literal. Errors are returned as plain strings for the shell to
//! show verbatim, and a failed load leaves the caller's current sheet
//! untouched.

use std::collections::BTreeMap;
use std::fs;

use crate::domain::{CellAddress, CellData, CellValue, Spreadsheet};

pub struct FileRepository;

impl FileRepository {
    pub fn save_spreadsheet(spreadsheet: &Spreadsheet, filename: &str) -> Result<String, String> {
        match serde_json::to_string_pretty(&spreadsheet.serialize()) {
            Ok(json) => match fs::write(filename, &json) {
                Ok(_) => Ok(filename.to_string()),
                Err(e) => Err(e.to_string()),
            },
            Err(e) => Err(format!("Serialization failed: {}", e)),
        }
    }

    pub fn load_spreadsheet(filename: &str) -> Result<(Spreadsheet, String), String> {
        match fs::read_to_string(filename) {
            Ok(content) => {
                match serde_json::from_str::<BTreeMap<String, CellValue>>(&content) {
                    Ok(mapping) => {
                        let mut spreadsheet = Spreadsheet::default();
                        spreadsheet.load(mapping);
                        Ok((spreadsheet, filename.to_string()))
                    }
                    Err(e) => Err(format!("Invalid file format - {}", e)),
                }
            }
            Err(e) => Err(e.to_string()),
        }
    }

    pub fn export_csv(spreadsheet: &Spreadsheet, filename: &str) -> Result<String, String> {
        let mut writer = csv::Writer::from_path(filename).map_err(|e| e.to_string())?;

        if let Some((max_row, max_col)) = spreadsheet.used_extent() {
            for row in 0..=max_row {
                let record: Vec<String> = (0..=max_col)
                    .map(|col| {
                        spreadsheet
                            .get_cell(CellAddress::new(row, col))
                            .value
                            .to_string()
                    })
                    .collect();
                writer.write_record(&record).map_err(|e| e.to_string())?;
            }
        }

        writer.flush().map_err(|e| e.to_string())?;
        Ok(filename.to_string())
    }

    pub fn import_csv(filename: &str) -> Result<Spreadsheet, String> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(filename)
            .map_err(|e| e.to_string())?;

        let mut spreadsheet = Spreadsheet::default();
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(|e| e.to_string())?;
            if row >= spreadsheet.rows {
                break;
            }
            for (col, field) in record.iter().enumerate() {
                if col >= spreadsheet.cols {
                    break;
                }
                if field.is_empty() {
                    continue;
                }
                spreadsheet.set_cell(
                    CellAddress::new(row, col),
                    CellData {
                        value: CellValue::Text(field.to_string()),
                        formula: None,
                    },
                );
            }
        }

        Ok(spreadsheet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::SheetSession;

    #[test]
    fn test_json_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.json");
        let path = path.to_str().unwrap();

        let mut session = SheetSession::new();
        session.set_cell("A1", "5").unwrap();
        session.set_cell("B2", "words").unwrap();
        session.set_cell("C3", "=A1*2").unwrap();

        FileRepository::save_spreadsheet(&session.spreadsheet, path).unwrap();
        let (restored, name) = FileRepository::load_spreadsheet(path).unwrap();

        assert_eq!(name, path);
        for addr in ["A1", "B2", "C3"] {
            let addr = CellAddress::parse(addr).unwrap();
            assert_eq!(restored.get_cell(addr), session.spreadsheet.get_cell(addr));
        }
    }

    #[test]
    fn test_json_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.json");
        let path = path.to_str().unwrap();

        let mut session = SheetSession::new();
        session.set_cell("A1", "5").unwrap();
        session.set_cell("A2", "=A1+1").unwrap();
        FileRepository::save_spreadsheet(&session.spreadsheet, path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["A1"], serde_json::json!("5"));
        assert_eq!(json["A2"], serde_json::json!(6.0));
        assert_eq!(json["A2_formula"], serde_json::json!("=A1+1"));
    }

    #[test]
    fn test_load_missing_or_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(FileRepository::load_spreadsheet(missing.to_str().unwrap()).is_err());

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "not json at all").unwrap();
        assert!(FileRepository::load_spreadsheet(bad.to_str().unwrap()).is_err());
    }

    #[test]
    fn test_csv_export_and_import() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.csv");
        let path = path.to_str().unwrap();

        let mut session = SheetSession::new();
        session.set_cell("A1", "1").unwrap();
        session.set_cell("B1", "2").unwrap();
        session.set_cell("A2", "3").unwrap();
        session.set_cell("B2", "=A1+B1").unwrap();

        FileRepository::export_csv(&session.spreadsheet, path).unwrap();
        let imported = FileRepository::import_csv(path).unwrap();

        // Export writes display values; import reads them back as literals
        assert_eq!(
            imported.get_cell(CellAddress::parse("A2").unwrap()).value,
            CellValue::Text("3".to_string())
        );
        let b2 = imported.get_cell(CellAddress::parse("B2").unwrap());
        assert_eq!(b2.value, CellValue::Text("3".to_string()));
        assert_eq!(b2.formula, None);
    }

    #[test]
    fn test_csv_export_empty_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        let path = path.to_str().unwrap();

        FileRepository::export_csv(&Spreadsheet::default(), path).unwrap();
        let imported = FileRepository::import_csv(path).unwrap();
        assert!(imported.is_empty());
    }
}
