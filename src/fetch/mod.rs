//! HTTP plumbing for upstream calls.
//!
//! Everything goes through the [`HttpClient`] trait so credentials
//! ([`auth::UrlParam`]) and test doubles can wrap or replace the real
//! [`BasicClient`]. The canned-response `StubClient` is only built for tests
//! and with the `test-utils` feature.

mod client;
mod basic;
#[cfg(any(test, feature = "test-utils"))]
mod stub;
pub mod auth;

pub use client::HttpClient;
pub use basic::{BasicClient, REQUEST_TIMEOUT};
#[cfg(any(test, feature = "test-utils"))]
pub use stub::StubClient;

use crate::error::UpstreamError;
use reqwest::Url;

/// Issues a GET for `url` and returns the body of a 2xx response.
pub async fn fetch_bytes<C: HttpClient + ?Sized>(
    client: &C,
    url: Url,
) -> Result<Vec<u8>, UpstreamError> {
    let path = url.path().to_string();
    let req = reqwest::Request::new(reqwest::Method::GET, url);

    let resp = client
        .execute(req)
        .await
        .map_err(|e| UpstreamError::from_reqwest(&path, e))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(UpstreamError::Status { path, status });
    }

    let bytes = resp
        .bytes()
        .await
        .map_err(|e| UpstreamError::from_reqwest(&path, e))?;
    Ok(bytes.to_vec())
}
