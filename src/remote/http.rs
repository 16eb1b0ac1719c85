//! REST remote store.
//!
//! `GET {base}{path}` returns a [`RemoteRecord`] envelope or 404;
//! `PUT {base}{path}` stores one. Paths come from [`Key::remote_segments`].

use std::time::Duration;

use tracing::debug;

use super::{Fetched, RemoteRecord, RemoteResult, RemoteStore};
use crate::error::RemoteError;
use crate::model::Key;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP remote store client.
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: Option<String>,
    timeout: Duration,
}

impl HttpRemote {
    /// Create a client for the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_config(Some(base_url.into()), None)
    }

    /// Create a client with an optional base URL and timeout.
    ///
    /// Without a base URL every call fails as unreachable, which leaves the
    /// sync layer working purely from the local cache.
    #[must_use]
    pub fn with_config(base_url: Option<String>, timeout: Option<Duration>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
            timeout: timeout.unwrap_or(DEFAULT_TIMEOUT),
        }
    }

    /// Base URL, if configured.
    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Resolve the URL of a record.
    ///
    /// Each path segment is percent-encoded, so `/`, `?` and `#` inside an id
    /// stay part of that id.
    fn url(&self, key: &Key) -> RemoteResult<reqwest::Url> {
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| RemoteError::Unreachable("no remote store configured".to_string()))?;
        let mut url = reqwest::Url::parse(base)
            .map_err(|e| RemoteError::Unreachable(format!("invalid remote URL '{base}': {e}")))?;
        url.path_segments_mut()
            .map_err(|()| RemoteError::Unreachable(format!("remote URL '{base}' cannot take a path")))?
            .pop_if_empty()
            .extend(key.remote_segments());
        Ok(url)
    }
}

impl RemoteStore for HttpRemote {
    async fn fetch(&self, key: &Key) -> RemoteResult<Fetched> {
        let url = self.url(key)?;
        debug!(%url, "Fetching remote record");

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| RemoteError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(Fetched::NotFound);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let record: RemoteRecord = response
            .json()
            .await
            .map_err(|e| RemoteError::Malformed(e.to_string()))?;
        Ok(Fetched::Found(record))
    }

    async fn upsert(&self, key: &Key, record: &RemoteRecord) -> RemoteResult<()> {
        let url = self.url(key)?;
        debug!(%url, updated_at = record.updated_at, "Upserting remote record");

        let response = self
            .client
            .put(url)
            .timeout(self.timeout)
            .json(record)
            .send()
            .await
            .map_err(|e| RemoteError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Mode;

    #[test]
    fn test_url_building() {
        let remote = HttpRemote::new("https://fleet.example.com/api/");
        let key = Key::checklist("NAY-001", Mode::Exit).unwrap();
        assert_eq!(
            remote.url(&key).unwrap().as_str(),
            "https://fleet.example.com/api/checklists/NAY-001/exit"
        );

        let root = HttpRemote::new("https://fleet.example.com");
        let key: Key = "vessel:7".parse().unwrap();
        assert_eq!(root.url(&key).unwrap().as_str(), "https://fleet.example.com/vessels/7");
    }

    #[test]
    fn test_ids_cannot_escape_their_segment() {
        let remote = HttpRemote::new("https://fleet.example.com/api");
        let url = |raw: &str| remote.url(&raw.parse::<Key>().unwrap()).unwrap();

        let nested = url("vessel:7/bookings");
        assert_eq!(nested.as_str(), "https://fleet.example.com/api/vessels/7%2Fbookings");
        assert_ne!(nested, url("bookings:7"));

        let query = url("archive:A?x=1");
        assert!(query.query().is_none());
        assert!(query.path().starts_with("/api/archive/A%3F"));

        let fragment = url("archive:A#frag");
        assert!(fragment.fragment().is_none());
        assert_eq!(fragment.path(), "/api/archive/A%23frag");
    }

    #[test]
    fn test_invalid_base_url_is_unreachable() {
        let remote = HttpRemote::new("not a url");
        let key: Key = "vessel:7".parse().unwrap();
        assert!(matches!(remote.url(&key), Err(RemoteError::Unreachable(_))));
    }

    #[tokio::test]
    async fn test_unconfigured_remote_is_unreachable() {
        let remote = HttpRemote::with_config(None, None);
        let key: Key = "vessel:7".parse().unwrap();

        let err = remote.fetch(&key).await.unwrap_err();
        assert!(matches!(err, RemoteError::Unreachable(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_unreachable() {
        // port 9 (discard) is not listening on loopback in test environments
        let remote = HttpRemote::with_config(
            Some("http://127.0.0.1:9".to_string()),
            Some(Duration::from_secs(2)),
        );
        let key: Key = "archive:A1".parse().unwrap();
        let record = RemoteRecord {
            payload: serde_json::json!({}),
            updated_at: 1,
            device_id: None,
        };

        assert!(matches!(
            remote.upsert(&key, &record).await,
            Err(RemoteError::Unreachable(_))
        ));
    }
}
