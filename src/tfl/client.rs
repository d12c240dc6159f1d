use crate::error::UpstreamError;
use crate::fetch::{HttpClient, fetch_bytes};
use crate::tfl::types::{LineStatus, LineStatusEntry, Prediction};
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.tfl.gov.uk";

/// Client for the transit API.
///
/// Holds no credentials itself; wrap the transport in
/// [`UrlParam`](crate::fetch::auth::UrlParam) to authenticate.
pub struct TflClient<C> {
    http: C,
    base_url: String,
}

impl<C: HttpClient> TflClient<C> {
    pub fn new(http: C, base_url: &str) -> Result<Self, UpstreamError> {
        // Validate once so per-request joins can only fail on the path part.
        Url::parse(base_url)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, UpstreamError> {
        Ok(Url::parse(&format!("{}{}", self.base_url, path))?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, UpstreamError> {
        let url = self.url(path)?;
        let bytes = fetch_bytes(&self.http, url).await?;
        debug!(path, bytes = bytes.len(), "Upstream response received");
        serde_json::from_slice(&bytes).map_err(|source| UpstreamError::Decode {
            path: path.to_string(),
            source,
        })
    }

    /// Current status of `line_id`: the first status of the first entry.
    pub async fn line_status(&self, line_id: &str) -> Result<LineStatus, UpstreamError> {
        let path = format!("/Line/{line_id}/Status");
        let entries: Vec<LineStatusEntry> = self.get(&path).await?;

        entries
            .into_iter()
            .next()
            .and_then(|entry| entry.line_statuses.into_iter().next())
            .ok_or(UpstreamError::EmptyStatus { path })
    }

    /// Current arrival predictions across every stop on `line_id`.
    pub async fn line_arrivals(&self, line_id: &str) -> Result<Vec<Prediction>, UpstreamError> {
        self.get(&format!("/Line/{line_id}/Arrivals")).await
    }

    /// Fetches `path` and returns the body as untyped JSON.
    pub async fn get_json(&self, path: &str) -> Result<serde_json::Value, UpstreamError> {
        self.get(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::StubClient;

    const BASE: &str = "https://api.example.test";

    #[tokio::test]
    async fn test_line_status_takes_first_entry() {
        let stub = StubClient::new().with_json(
            "/Line/district/Status",
            r#"[{"lineStatuses": [
                {"statusSeverityDescription": "Part Suspended", "reason": "Engineering works"},
                {"statusSeverityDescription": "Good Service"}
            ]}]"#,
        );
        let client = TflClient::new(stub, BASE).unwrap();

        let status = client.line_status("district").await.unwrap();
        assert_eq!(status.status_severity_description, "Part Suspended");
        assert_eq!(status.reason.as_deref(), Some("Engineering works"));
    }

    #[tokio::test]
    async fn test_line_status_empty_array_is_error() {
        let stub = StubClient::new().with_json("/Line/district/Status", "[]");
        let client = TflClient::new(stub, BASE).unwrap();

        let err = client.line_status("district").await.unwrap_err();
        assert!(matches!(err, UpstreamError::EmptyStatus { .. }));
    }

    #[tokio::test]
    async fn test_line_status_without_statuses_is_error() {
        let stub = StubClient::new().with_json("/Line/district/Status", r#"[{"lineStatuses": []}]"#);
        let client = TflClient::new(stub, BASE).unwrap();

        let err = client.line_status("district").await.unwrap_err();
        assert!(matches!(err, UpstreamError::EmptyStatus { .. }));
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let stub = StubClient::new().with_json("/Line/circle/Arrivals", "<html>busy</html>");
        let client = TflClient::new(stub, BASE).unwrap();

        let err = client.line_arrivals("circle").await.unwrap_err();
        match err {
            UpstreamError::Decode { path, .. } => assert_eq!(path, "/Line/circle/Arrivals"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_base_url_prefix_is_kept() {
        let stub = std::sync::Arc::new(StubClient::new().with_json("/proxy/Line/circle/Arrivals", "[]"));
        let client = TflClient::new(stub.clone(), "https://api.example.test/proxy/").unwrap();

        let arrivals = client.line_arrivals("circle").await.unwrap();
        assert!(arrivals.is_empty());
        assert_eq!(stub.requests(), vec!["/proxy/Line/circle/Arrivals".to_string()]);
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(TflClient::new(StubClient::new(), "not a url").is_err());
    }
}
