use changetracker_core::Row;
use changetracker_core::config::ListTarget;
use serde_json::{Map, Value};

/// SharePoint's required title column
pub const TITLE_FIELD: &str = "Title";

/// Build list item fields for a row from a list's field mapping
///
/// Each SharePoint field takes the row value under its mapped key, or an
/// empty string. `Title` falls back to the row's title column and then to
/// `Item {position}` (1-based).
pub fn map_row(row: &Row, position: usize, target: &ListTarget) -> Map<String, Value> {
    let mut fields: Map<String, Value> = target
        .mapping
        .iter()
        .map(|(field, key)| {
            let value = row.value(key).unwrap_or_default();
            (field.clone(), Value::String(value.to_string()))
        })
        .collect();

    if !fields.contains_key(TITLE_FIELD) {
        let title = match row.title() {
            "" => format!("Item {}", position + 1),
            title => title.to_string(),
        };
        fields.insert(TITLE_FIELD.to_string(), Value::String(title));
    }
    fields
}

/// A mapped field as text, for duplicate checks
pub fn field_text<'a>(fields: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    fields.get(name).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn target(mapping: &[(&str, &str)]) -> ListTarget {
        ListTarget {
            name: "EntraRoadmapItems".to_string(),
            mapping: mapping
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            date_field: Some("ReleaseDate".to_string()),
        }
    }

    fn row() -> Row {
        let mut fields = BTreeMap::new();
        fields.insert("title".to_string(), "Passkeys".to_string());
        fields.insert("releaseDate".to_string(), "March 2025".to_string());
        let mut row = Row::new(0, fields);
        row.url = "https://example.com".to_string();
        row
    }

    #[test]
    fn test_mapping_reads_columns_and_details() {
        let fields = map_row(
            &row(),
            0,
            &target(&[
                ("Title", "title"),
                ("ReleaseDate", "releaseDate"),
                ("Link", "url"),
                ("Missing", "nope"),
            ]),
        );

        assert_eq!(field_text(&fields, "Title"), Some("Passkeys"));
        assert_eq!(field_text(&fields, "ReleaseDate"), Some("March 2025"));
        assert_eq!(field_text(&fields, "Link"), Some("https://example.com"));
        assert_eq!(field_text(&fields, "Missing"), Some(""));
    }

    #[test]
    fn test_title_falls_back_to_title_column() {
        let fields = map_row(&row(), 0, &target(&[("ReleaseDate", "releaseDate")]));
        assert_eq!(field_text(&fields, "Title"), Some("Passkeys"));
    }

    #[test]
    fn test_title_falls_back_to_position() {
        let untitled = Row::new(3, BTreeMap::new());
        let fields = map_row(&untitled, 4, &target(&[("Body", "description")]));
        assert_eq!(field_text(&fields, "Title"), Some("Item 5"));
    }
}
