//! REST host: loads a record and grants attachment access through a
//! Grist-compatible document API.
//!
//! Endpoints used:
//! - `GET {server}/api/docs/{doc}/tables/{table}/records?filter={"id":[row]}`
//! - `{server}/api/docs/{doc}/attachments/{id}/download` (through the fetcher)

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{AccessGrant, AccessProvider, HostError, Record};

#[derive(Debug, Deserialize)]
struct RecordsResponse {
    records: Vec<Record>,
}

/// Client for a Grist-compatible document API.
///
/// Record requests always authenticate with the API key. Attachment downloads
/// use a query token when one is configured, the API key otherwise.
#[derive(Clone)]
pub struct GristClient {
    client: Client,
    server: Url,
    doc_id: String,
    api_key: String,
    access_token: Option<String>,
}

impl std::fmt::Debug for GristClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GristClient")
            .field("server", &self.server.as_str())
            .field("doc_id", &self.doc_id)
            .finish_non_exhaustive()
    }
}

impl GristClient {
    /// Creates a client for one document.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::InvalidUrl`] when `server` is not an absolute
    /// http(s) URL.
    pub fn new(
        client: Client,
        server: &str,
        doc_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, HostError> {
        let server = Url::parse(server.trim()).map_err(|_| HostError::invalid_url(server))?;
        if !matches!(server.scheme(), "http" | "https") || server.cannot_be_a_base() {
            return Err(HostError::invalid_url(server.as_str()));
        }
        Ok(Self {
            client,
            server,
            doc_id: doc_id.into(),
            api_key: api_key.into(),
            access_token: None,
        })
    }

    /// Uses a short-lived query token for attachment downloads.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Returns `{server}/api/docs/{doc}`.
    #[must_use]
    pub fn doc_base_url(&self) -> String {
        self.doc_url(&[]).map_or_else(
            || {
                format!(
                    "{}/api/docs/{}",
                    self.server.as_str().trim_end_matches('/'),
                    self.doc_id
                )
            },
            |url| url.to_string(),
        )
    }

    /// Loads one record by row id.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] on transport failures, non-success statuses,
    /// malformed bodies, or when the row does not exist.
    #[instrument(skip(self), fields(doc = %self.doc_id))]
    pub async fn fetch_record(&self, table: &str, row_id: i64) -> Result<Record, HostError> {
        let mut url = self
            .doc_url(&["tables", table, "records"])
            .ok_or_else(|| HostError::invalid_url(self.server.as_str()))?;
        url.query_pairs_mut()
            .append_pair("filter", &serde_json::json!({ "id": [row_id] }).to_string());
        let display_url = url.to_string();
        debug!(url = %display_url, "fetching record");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| HostError::network(display_url.clone(), e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HostError::http_status(display_url, status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| HostError::network(display_url.clone(), e.without_url()))?;
        let parsed: RecordsResponse = serde_json::from_slice(&body)
            .map_err(|e| HostError::invalid_response(display_url.clone(), e.to_string()))?;

        parsed
            .records
            .into_iter()
            .find(|record| record.id == row_id)
            .ok_or_else(|| HostError::record_not_found(table, row_id))
    }

    fn doc_url(&self, tail: &[&str]) -> Option<Url> {
        let mut url = self.server.clone();
        url.set_query(None);
        url.set_fragment(None);
        {
            let mut segments = url.path_segments_mut().ok()?;
            segments
                .pop_if_empty()
                .extend(["api", "docs", self.doc_id.as_str()])
                .extend(tail);
        }
        Some(url)
    }
}

#[async_trait]
impl AccessProvider for GristClient {
    async fn access_grant(&self) -> Result<AccessGrant, HostError> {
        let base = self.doc_base_url();
        Ok(match &self.access_token {
            Some(token) => AccessGrant::query_token(base, token.clone()),
            None => AccessGrant::bearer(base, self.api_key.clone()),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::host::Credential;

    fn client(server: &str) -> Result<GristClient, HostError> {
        GristClient::new(Client::new(), server, "doc123", "key")
    }

    #[test]
    fn test_doc_base_url_joins_segments() {
        let grist = client("https://grist.example.com").unwrap();
        assert_eq!(
            grist.doc_base_url(),
            "https://grist.example.com/api/docs/doc123"
        );
    }

    #[test]
    fn test_doc_base_url_keeps_server_prefix() {
        let grist = client("https://example.com/o/team/").unwrap();
        assert_eq!(
            grist.doc_base_url(),
            "https://example.com/o/team/api/docs/doc123"
        );
    }

    #[test]
    fn test_new_rejects_non_http_server() {
        assert!(matches!(
            client("ftp://example.com"),
            Err(HostError::InvalidUrl { .. })
        ));
        assert!(matches!(
            client("not a url"),
            Err(HostError::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn test_access_grant_prefers_query_token() {
        let grist = client("https://grist.example.com")
            .unwrap()
            .with_access_token("tok");
        let grant = grist.access_grant().await.unwrap();
        assert_eq!(grant.credential(), &Credential::QueryToken("tok".into()));
    }

    #[tokio::test]
    async fn test_access_grant_falls_back_to_api_key() {
        let grist = client("https://grist.example.com").unwrap();
        let grant = grist.access_grant().await.unwrap();
        assert_eq!(grant.credential(), &Credential::Bearer("key".into()));
        assert_eq!(grant.base_url(), "https://grist.example.com/api/docs/doc123");
    }

    #[test]
    fn test_debug_hides_api_key() {
        let grist = GristClient::new(Client::new(), "https://grist.example.com", "doc", "s3cr3t")
            .unwrap();
        assert!(!format!("{grist:?}").contains("s3cr3t"));
    }
}
