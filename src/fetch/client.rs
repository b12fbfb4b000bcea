//! HTTP implementation of [`AttachmentSource`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use tracing::{debug, instrument, warn};
use url::Url;

use super::error::FetchError;
use super::headers::parse_content_disposition;
use super::retry::{RetryDecision, RetryPolicy, classify_error};
use super::{AttachmentSource, CONNECT_TIMEOUT_SECS, FetchedAsset, READ_TIMEOUT_SECS};
use crate::host::{AccessGrant, AttachmentId, Credential};
use crate::user_agent;

/// Query parameters whose values never appear in logs or errors.
const SECRET_PARAMS: &[&str] = &["auth", "token", "access_token", "api_key"];

/// Downloads attachments over HTTP.
///
/// Create once and reuse; the inner client pools connections.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    retry_policy: RetryPolicy,
}

impl HttpFetcher {
    /// Creates a fetcher with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns the builder error when the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a fetcher with explicit connect and overall request timeouts.
    ///
    /// # Errors
    ///
    /// Returns the builder error when the TLS backend cannot be initialised.
    pub fn new_with_timeouts(
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()?;
        Ok(Self::from_client(client))
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy (single attempt by default).
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Returns the underlying client, for sharing with the REST host client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    async fn fetch_once(
        &self,
        id: AttachmentId,
        grant: &AccessGrant,
    ) -> Result<FetchedAsset, FetchError> {
        let url = grant.download_url(id);
        let shown = redact_url(&url);

        let mut request = self.client.get(&url);
        if let Credential::Bearer(key) = grant.credential() {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::timeout(id, shown.clone())
            } else {
                FetchError::network(id, shown.clone(), e.without_url())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(id, shown, status.as_u16()));
        }

        let headers = response.headers();
        let media_type = headers
            .get(CONTENT_TYPE)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());
        let filename_hint = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|v| parse_content_disposition(&String::from_utf8_lossy(v.as_bytes())));

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::timeout(id, shown.clone())
            } else {
                FetchError::body(id, shown.clone(), e.without_url())
            }
        })?;

        debug!(
            bytes = bytes.len(),
            media_type = media_type.as_deref().unwrap_or("-"),
            "attachment fetched"
        );
        Ok(FetchedAsset::new(
            bytes.to_vec(),
            media_type.as_deref(),
            filename_hint.as_deref(),
        ))
    }
}

#[async_trait]
impl AttachmentSource for HttpFetcher {
    #[instrument(skip(self, grant), fields(attachment = %id))]
    async fn fetch(
        &self,
        id: AttachmentId,
        grant: &AccessGrant,
    ) -> Result<FetchedAsset, FetchError> {
        let mut attempt = 1;
        loop {
            match self.fetch_once(id, grant).await {
                Ok(asset) => return Ok(asset),
                Err(error) => match self.retry_policy.should_retry(classify_error(&error), attempt) {
                    RetryDecision::Retry {
                        delay,
                        attempt: next,
                    } => {
                        warn!(error = %error, attempt, delay_ms = delay.as_millis(), "fetch failed, retrying");
                        tokio::time::sleep(delay).await;
                        attempt = next;
                    }
                    RetryDecision::DoNotRetry { reason } => {
                        debug!(reason = %reason, "giving up on attachment");
                        return Err(error);
                    }
                },
            }
        }
    }
}

/// Masks credential query parameters in `url`.
///
/// `.../download?auth=abc` → `.../download?auth=***`. Unparseable input keeps
/// only the part before `?`.
#[must_use]
pub fn redact_url(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.split('?').next().unwrap_or_default().to_string();
    };
    if parsed.query().is_none() {
        return parsed.to_string();
    }

    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(key, value)| {
            let value = if SECRET_PARAMS.iter().any(|s| key.eq_ignore_ascii_case(s)) {
                "***".to_string()
            } else {
                value.into_owned()
            };
            (key.into_owned(), value)
        })
        .collect();
    parsed.query_pairs_mut().clear().extend_pairs(pairs);
    parsed.to_string()
}
