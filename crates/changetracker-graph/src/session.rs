use crate::{Error, GraphClient, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use url::Url;

/// Graph calls for one run, with the site and list ids it has resolved
///
/// The caches live as long as the session; call [`GraphSession::reset`] at
/// the start of a run that reuses one.
pub struct GraphSession {
    client: GraphClient,
    site_id: Option<String>,
    list_ids: HashMap<String, String>,
}

impl GraphSession {
    pub fn new(client: GraphClient) -> Self {
        Self {
            client,
            site_id: None,
            list_ids: HashMap::new(),
        }
    }

    /// Forget every resolved id
    pub fn reset(&mut self) {
        self.site_id = None;
        self.list_ids.clear();
    }

    /// Resolve the site id for `https://{host}/{path}`
    pub async fn site_id(&mut self, site_url: &str) -> Result<String> {
        if let Some(id) = &self.site_id {
            return Ok(id.clone());
        }

        let url = Url::parse(site_url)
            .map_err(|e| Error::InvalidSiteUrl(format!("{}: {}", site_url, e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| Error::InvalidSiteUrl(format!("{} has no host", site_url)))?;
        let site_path = url.path().trim_end_matches('/');

        let endpoint = if site_path.is_empty() {
            format!("/sites/{}", host)
        } else {
            format!("/sites/{}:{}", host, site_path)
        };

        let site = self.client.get(&endpoint, &[]).await?;
        let id = site["id"]
            .as_str()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::NotFound(format!("Could not resolve site id for {}", site_url)))?
            .to_string();

        tracing::debug!("Resolved site {} to {}", site_url, id);
        self.site_id = Some(id.clone());
        Ok(id)
    }

    /// Resolve a list id by its exact display name
    pub async fn list_id(&mut self, site_id: &str, title: &str) -> Result<String> {
        if let Some(id) = self.list_ids.get(title) {
            return Ok(id.clone());
        }

        let filter = format!("displayName eq '{}'", odata_quote(title));
        let result = self
            .client
            .get(
                &format!("/sites/{}/lists", site_id),
                &[("$filter", filter.as_str()), ("$select", "id,displayName")],
            )
            .await?;

        let id = result["value"]
            .as_array()
            .into_iter()
            .flatten()
            .find(|list| list["displayName"].as_str() == Some(title))
            .and_then(|list| list["id"].as_str())
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "List not found by title \"{}\" (check list name/spelling)",
                    title
                ))
            })?
            .to_string();

        self.list_ids.insert(title.to_string(), id.clone());
        Ok(id)
    }

    /// Whether an item with this Title and date value exists
    ///
    /// Blank values never match. A failed query is logged and treated as
    /// "not found" so insertion is not blocked.
    pub async fn item_exists(
        &self,
        site_id: &str,
        list_id: &str,
        title: &str,
        date_field: &str,
        date_value: &str,
    ) -> bool {
        if title.is_empty() || date_value.is_empty() {
            return false;
        }

        let filter = format!(
            "fields/Title eq '{}' and fields/{} eq '{}'",
            odata_quote(title),
            date_field,
            odata_quote(date_value)
        );
        let result = self
            .client
            .get_with_headers(
                &format!("/sites/{}/lists/{}/items", site_id, list_id),
                &[("$filter", filter.as_str()), ("$select", "id"), ("$top", "1")],
                &[("Prefer", "HonorNonIndexedQueriesWarningMayFailRandomly")],
            )
            .await;

        match result {
            Ok(value) => value["value"].as_array().is_some_and(|items| !items.is_empty()),
            Err(e) => {
                tracing::warn!("Could not check for duplicate: {}", e);
                false
            }
        }
    }

    pub async fn create_item(
        &self,
        site_id: &str,
        list_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<Value> {
        self.client
            .post(
                &format!("/sites/{}/lists/{}/items", site_id, list_id),
                &serde_json::json!({ "fields": fields }),
            )
            .await
    }
}

/// Escape a value for a single-quoted OData string literal
pub fn odata_quote(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn session(server: &MockServer) -> GraphSession {
        GraphSession::new(GraphClient::new("t").unwrap().with_base_url(server.uri()))
    }

    #[test]
    fn test_odata_quote_doubles_quotes() {
        assert_eq!(odata_quote("Partner's list"), "Partner''s list");
        assert_eq!(odata_quote("plain"), "plain");
    }

    #[tokio::test]
    async fn test_site_id_is_resolved_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sites/contoso.sharepoint.com:/sites/EntraChangeTrackers"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":"site-1"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let mut session = session(&server).await;
        let url = "https://contoso.sharepoint.com/sites/EntraChangeTrackers/";
        assert_eq!(session.site_id(url).await.unwrap(), "site-1");
        assert_eq!(session.site_id(url).await.unwrap(), "site-1");
    }

    #[tokio::test]
    async fn test_reset_forgets_cached_ids() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sites/contoso.sharepoint.com:/sites/a"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":"site-1"}"#))
            .expect(2)
            .mount(&server)
            .await;

        let mut session = session(&server).await;
        session.site_id("https://contoso.sharepoint.com/sites/a").await.unwrap();
        session.reset();
        session.site_id("https://contoso.sharepoint.com/sites/a").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_id_requires_exact_display_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sites/site-1/lists"))
            .and(query_param("$filter", "displayName eq 'Bob''s Items'"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"value":[{"id":"x","displayName":"bob's items"},{"id":"l1","displayName":"Bob's Items"}]}"#,
            ))
            .mount(&server)
            .await;

        let mut session = session(&server).await;
        assert_eq!(session.list_id("site-1", "Bob's Items").await.unwrap(), "l1");
    }

    #[tokio::test]
    async fn test_missing_list_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sites/site-1/lists"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"value":[]}"#))
            .mount(&server)
            .await;

        let mut session = session(&server).await;
        let err = session.list_id("site-1", "Missing").await.unwrap_err();
        assert!(err.to_string().contains("List not found by title \"Missing\""));
    }

    #[tokio::test]
    async fn test_item_exists_filters_on_title_and_date() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sites/s/lists/l/items"))
            .and(query_param(
                "$filter",
                "fields/Title eq 'It''s new' and fields/ReleaseDate eq 'March 2025'",
            ))
            .and(query_param("$top", "1"))
            .and(header("Prefer", "HonorNonIndexedQueriesWarningMayFailRandomly"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"value":[{"id":"7"}]}"#))
            .mount(&server)
            .await;

        let session = session(&server).await;
        assert!(session.item_exists("s", "l", "It's new", "ReleaseDate", "March 2025").await);
        assert!(!session.item_exists("s", "l", "It's new", "ReleaseDate", "").await);
    }

    #[tokio::test]
    async fn test_item_exists_treats_errors_as_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad filter"))
            .mount(&server)
            .await;

        let session = session(&server).await;
        assert!(!session.item_exists("s", "l", "Title", "Date", "2025").await);
    }
}
