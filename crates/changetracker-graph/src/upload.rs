use crate::mapping::{TITLE_FIELD, field_text, map_row};
use crate::{Error, GraphSession, Result};
use changetracker_core::Row;
use changetracker_core::config::ListTarget;
use std::fmt;

/// Outcome of uploading one view into one list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadStats {
    pub total: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl UploadStats {
    pub fn processed(&self) -> usize {
        self.inserted + self.skipped + self.errors
    }
}

impl fmt::Display for UploadStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} inserted, {} duplicates skipped, {} errors",
            self.inserted, self.skipped, self.errors
        )
    }
}

/// Insert rows into a SharePoint list, skipping duplicates
///
/// When the list has a date field that the mapping produces, a row whose
/// Title and date already exist is skipped. Per-row failures are counted,
/// not returned. `on_progress` is called after every row.
pub async fn upload_rows<F>(
    session: &mut GraphSession,
    site_url: &str,
    target: &ListTarget,
    rows: &[Row],
    mut on_progress: F,
) -> Result<UploadStats>
where
    F: FnMut(&UploadStats),
{
    if target.mapping.is_empty() {
        return Err(Error::MissingMapping(target.name.clone()));
    }

    tracing::info!("Inserting {} items into list {}", rows.len(), target.name);
    let site_id = session.site_id(site_url).await?;
    let list_id = session.list_id(&site_id, &target.name).await?;

    let mut stats = UploadStats {
        total: rows.len(),
        ..Default::default()
    };

    for (position, row) in rows.iter().enumerate() {
        let fields = map_row(row, position, target);

        let duplicate = match target.date_field.as_deref() {
            Some(date_field) => match field_text(&fields, date_field) {
                Some(date_value) => {
                    let title = field_text(&fields, TITLE_FIELD).unwrap_or_default();
                    session
                        .item_exists(&site_id, &list_id, title, date_field, date_value)
                        .await
                }
                None => false,
            },
            None => false,
        };

        if duplicate {
            stats.skipped += 1;
        } else {
            match session.create_item(&site_id, &list_id, &fields).await {
                Ok(_) => stats.inserted += 1,
                Err(e) => {
                    stats.errors += 1;
                    tracing::warn!("Error inserting item {}:\n{}", position + 1, e);
                }
            }
        }

        if (position + 1) % 10 == 0 {
            tracing::info!("Progress: {}/{} processed ({})", position + 1, rows.len(), stats);
        }
        on_progress(&stats);
    }

    tracing::info!("Finished {}: {}", target.name, stats);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GraphClient;
    use std::collections::BTreeMap;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn target() -> ListTarget {
        let mut mapping = BTreeMap::new();
        mapping.insert("Title".to_string(), "title".to_string());
        mapping.insert("ReleaseDate".to_string(), "releaseDate".to_string());
        mapping.insert("Description".to_string(), "description".to_string());
        ListTarget {
            name: "EntraWhatsNew".to_string(),
            mapping,
            date_field: Some("ReleaseDate".to_string()),
        }
    }

    fn row(index: u32, title: &str) -> Row {
        let mut fields = BTreeMap::new();
        fields.insert("title".to_string(), title.to_string());
        fields.insert("releaseDate".to_string(), "March 2025".to_string());
        let mut row = Row::new(index, fields);
        row.description = format!("About {}", title);
        row
    }

    async fn mount_site_and_list(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/sites/contoso.sharepoint.com:/sites/tracker"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":"site-1"}"#))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sites/site-1/lists"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"value":[{"id":"list-1","displayName":"EntraWhatsNew"}]}"#,
            ))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_upload_skips_duplicates_and_counts_errors() {
        let server = MockServer::start().await;
        mount_site_and_list(&server).await;

        Mock::given(method("GET"))
            .and(path("/sites/site-1/lists/list-1/items"))
            .and(query_param(
                "$filter",
                "fields/Title eq 'Existing' and fields/ReleaseDate eq 'March 2025'",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"value":[{"id":"1"}]}"#))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sites/site-1/lists/list-1/items"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"value":[]}"#))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/sites/site-1/lists/list-1/items"))
            .and(body_partial_json(serde_json::json!({"fields": {"Title": "Broken"}})))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalidRequest"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/sites/site-1/lists/list-1/items"))
            .and(body_partial_json(serde_json::json!({
                "fields": {"Title": "Fresh", "Description": "About Fresh"}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_string(r#"{"id":"2"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let mut session =
            GraphSession::new(GraphClient::new("t").unwrap().with_base_url(server.uri()));
        let rows = vec![row(0, "Existing"), row(1, "Fresh"), row(2, "Broken")];
        let mut updates = 0;

        let stats = upload_rows(
            &mut session,
            "https://contoso.sharepoint.com/sites/tracker",
            &target(),
            &rows,
            |_| updates += 1,
        )
        .await
        .unwrap();

        assert_eq!(
            stats,
            UploadStats {
                total: 3,
                inserted: 1,
                skipped: 1,
                errors: 1
            }
        );
        assert_eq!(stats.processed(), 3);
        assert_eq!(updates, 3);
    }

    #[tokio::test]
    async fn test_missing_mapping_fails_before_any_request() {
        let server = MockServer::start().await;
        let mut session =
            GraphSession::new(GraphClient::new("t").unwrap().with_base_url(server.uri()));
        let target = ListTarget {
            name: "EntraRoadmapItems".to_string(),
            mapping: BTreeMap::new(),
            date_field: None,
        };

        let err = upload_rows(&mut session, "https://x.sharepoint.com/sites/a", &target, &[], |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingMapping(name) if name == "EntraRoadmapItems"));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_list_fails_the_upload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sites/contoso.sharepoint.com:/sites/tracker"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":"site-1"}"#))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sites/site-1/lists"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"value":[]}"#))
            .mount(&server)
            .await;

        let mut session =
            GraphSession::new(GraphClient::new("t").unwrap().with_base_url(server.uri()));
        let result = upload_rows(
            &mut session,
            "https://contoso.sharepoint.com/sites/tracker",
            &target(),
            &[row(0, "A")],
            |_| {},
        )
        .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
