use crate::error::Result;
use crate::schema::{CellValue, EncounterRow, EncounterTable};
use csv::{ReaderBuilder, Trim};
use log::debug;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Reads a headered CSV into an [`EncounterTable`]. Cells stay textual; blank cells are empty.
pub fn read_encounter_csv<R: Read>(reader: R) -> Result<EncounterTable> {
    let mut csv_reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);

    let columns: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let row: EncounterRow = columns
            .iter()
            .zip(record.iter())
            .map(|(column, raw)| {
                let cell = if raw.is_empty() {
                    CellValue::Empty
                } else {
                    CellValue::Text(raw.to_string())
                };
                (column.clone(), cell)
            })
            .collect();
        rows.push(row);
    }

    debug!("Read {} encounter rows with columns {:?}", rows.len(), columns);

    Ok(EncounterTable::new(columns, rows))
}

pub fn read_encounter_csv_path(path: impl AsRef<Path>) -> Result<EncounterTable> {
    let file = File::open(path)?;
    read_encounter_csv(file)
}

/// Reads a JSON array of flat objects. Columns are the union of keys across all records.
/// Values must be numbers, strings or null.
pub fn read_encounter_json(json: &str) -> Result<EncounterTable> {
    let records: Vec<EncounterRow> = serde_json::from_str(json)?;

    let mut table = EncounterTable::default();
    for row in records {
        table.push_row(row);
    }

    debug!(
        "Read {} encounter records with columns {:?}",
        table.len(),
        table.columns
    );

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CPT_CODE, DURATION_MIN, ENCOUNTER_DATE};

    #[test]
    fn test_read_csv() {
        let data = "encounter_date,cpt_code,duration_min\n\
                    2024-01-05,90834,50\n\
                    2024-01-20, H0038 ,\n";
        let table = read_encounter_csv(data.as_bytes()).unwrap();

        assert_eq!(table.columns, vec![ENCOUNTER_DATE, CPT_CODE, DURATION_MIN]);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.rows[0].get(CPT_CODE),
            Some(&CellValue::Text("90834".to_string()))
        );
        assert_eq!(
            table.rows[1].get(CPT_CODE),
            Some(&CellValue::Text("H0038".to_string()))
        );
        assert_eq!(table.rows[1].get(DURATION_MIN), Some(&CellValue::Empty));
    }

    #[test]
    fn test_read_csv_header_only_keeps_columns() {
        let table = read_encounter_csv("encounter_date,duration_min\n".as_bytes()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.missing_columns(&[CPT_CODE]), vec!["cpt_code"]);
    }

    #[test]
    fn test_read_csv_ragged_row_is_error() {
        let data = "encounter_date,cpt_code,duration_min\n2024-01-05,90834\n";
        assert!(read_encounter_csv(data.as_bytes()).is_err());
    }

    #[test]
    fn test_read_csv_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("encounters.csv");
        std::fs::write(
            &path,
            "encounter_date,cpt_code,duration_min\n2024-03-04,H0004,45\n",
        )
        .unwrap();

        let table = read_encounter_csv_path(&path).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0].get(DURATION_MIN).and_then(|c| c.as_f64()), Some(45.0));

        assert!(read_encounter_csv_path(dir.path().join("absent.csv")).is_err());
    }

    #[test]
    fn test_read_json_records() {
        let json = r#"[
            {"encounter_date": "2024-01-05", "cpt_code": "90834", "duration_min": 50},
            {"encounter_date": "2024-01-20", "cpt_code": 90837, "duration_min": null}
        ]"#;
        let table = read_encounter_json(json).unwrap();

        assert_eq!(table.len(), 2);
        assert!(table.has_column(DURATION_MIN));
        assert_eq!(
            table.rows[1].get(CPT_CODE).and_then(|c| c.as_text()).as_deref(),
            Some("90837")
        );
        assert_eq!(table.rows[1].get(DURATION_MIN), Some(&CellValue::Empty));
    }
}
