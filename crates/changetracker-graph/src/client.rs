use crate::{Error, Result};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;
use std::time::Duration;

/// Microsoft Graph v1.0 endpoint
pub const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Thin JSON client for Microsoft Graph
///
/// Non-success responses become [`Error::Api`] carrying the status, the
/// request URL and the response body.
#[derive(Clone)]
pub struct GraphClient {
    http: Client,
    base_url: String,
    token: String,
}

impl GraphClient {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            base_url: GRAPH_BASE_URL.to_string(),
            token: token.into(),
        })
    }

    /// Point the client at another Graph-compatible endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        self.send(self.request(Method::GET, path).query(query)).await
    }

    /// GET with extra request headers
    pub async fn get_with_headers(
        &self,
        path: &str,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<Value> {
        let mut request = self.request(Method::GET, path).query(query);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        self.send(request).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(self.request(Method::POST, path).json(body)).await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("Graph {} {}", method, url);
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status();
        let url = response.url().to_string();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                url,
                body,
            });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}
