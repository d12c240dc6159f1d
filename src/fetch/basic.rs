use super::client::HttpClient;
use async_trait::async_trait;
use std::time::Duration;

/// Budget for a single upstream call, connect through body.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct BasicClient {
    inner: reqwest::Client,
    timeout: Duration,
}

impl BasicClient {
    pub fn new() -> reqwest::Result<Self> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> reqwest::Result<Self> {
        let inner = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { inner, timeout })
    }

    /// Total timeout applied to every request.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.inner.execute(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeout_is_ten_seconds() {
        assert_eq!(REQUEST_TIMEOUT, Duration::from_secs(10));
        let client = BasicClient::new().unwrap();
        assert_eq!(client.timeout(), REQUEST_TIMEOUT);
    }

    #[test]
    fn test_custom_timeout() {
        let client = BasicClient::with_timeout(Duration::from_millis(250)).unwrap();
        assert_eq!(client.timeout(), Duration::from_millis(250));
    }
}
