use crate::{Error, Result, Row};
use serde_json::Value;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub struct DumpReader;

impl DumpReader {
    /// Read rows from a JSON dump file
    pub fn from_file(path: &Path) -> Result<Vec<Row>> {
        tracing::debug!("Reading dump from: {}", path.display());

        let file = File::open(path)?;
        let value: Value = serde_json::from_reader(BufReader::new(file))?;
        let rows = Self::from_value(value)?;

        tracing::info!("Read {} rows from {}", rows.len(), path.display());
        Ok(rows)
    }

    /// Parse rows from a JSON dump string
    pub fn from_str(content: &str) -> Result<Vec<Row>> {
        Self::from_value(serde_json::from_str(content)?)
    }

    /// Rows are indexed by their position in the array
    fn from_value(value: Value) -> Result<Vec<Row>> {
        let Value::Array(items) = value else {
            return Err(Error::InvalidDump("expected a JSON array of records".to_string()));
        };

        items
            .into_iter()
            .enumerate()
            .map(|(position, item)| {
                if !item.is_object() {
                    return Err(Error::InvalidDump(format!(
                        "record {} is not a JSON object",
                        position
                    )));
                }
                let mut row: Row = serde_json::from_value(item)?;
                row.index = position as u32;
                Ok(row)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dump::DumpWriter;
    use crate::RowDetails;
    use std::collections::BTreeMap;

    #[test]
    fn test_read_written_dump() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roadmap.json");

        let mut fields = BTreeMap::new();
        fields.insert("title".to_string(), "Item".to_string());
        let mut row = Row::new(0, fields);
        row.attach_details(RowDetails {
            url: "https://example.com".to_string(),
            description: "Desc".to_string(),
            overview: "Over".to_string(),
        });

        DumpWriter::to_file(std::slice::from_ref(&row), &path).unwrap();
        let rows = DumpReader::from_file(&path).unwrap();

        assert_eq!(rows, vec![row]);
    }

    #[test]
    fn test_read_keeps_record_order_and_positions() {
        let rows =
            DumpReader::from_str(r#"[{"zeta": "1", "alpha": "2"}, {"title": "second"}]"#).unwrap();

        assert_eq!(rows[0].fields.keys().collect::<Vec<_>>(), ["zeta", "alpha"]);
        assert_eq!(rows[1].index, 1);
        assert_eq!(rows[1].title(), "second");
    }

    #[test]
    fn test_rejects_non_array() {
        let err = DumpReader::from_str(r#"{"title": "x"}"#).unwrap_err();
        assert!(err.to_string().contains("expected a JSON array"));
    }

    #[test]
    fn test_rejects_non_object_record() {
        let err = DumpReader::from_str(r#"[{"title": "x"}, 3]"#).unwrap_err();
        assert!(err.to_string().contains("record 1"));
    }
}
