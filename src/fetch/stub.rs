use super::client::HttpClient;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

struct Route {
    status: u16,
    body: String,
    delay: Option<Duration>,
}

/// An [`HttpClient`] that serves canned responses keyed by URL path.
///
/// Unknown paths answer `404`. Every request is recorded (path plus query) so
/// tests can assert on what was sent.
#[derive(Default)]
pub struct StubClient {
    routes: HashMap<String, Route>,
    requests: Mutex<Vec<String>>,
}

impl StubClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `body` with status 200 for `path`.
    pub fn with_json(mut self, path: &str, body: impl Into<String>) -> Self {
        self.routes.insert(
            path.to_string(),
            Route {
                status: 200,
                body: body.into(),
                delay: None,
            },
        );
        self
    }

    /// Serves an empty body with `status` for `path`.
    pub fn with_status(mut self, path: &str, status: u16) -> Self {
        self.routes.insert(
            path.to_string(),
            Route {
                status,
                body: String::new(),
                delay: None,
            },
        );
        self
    }

    /// Holds the response for `path` back by `delay`. The route must exist.
    pub fn with_delay(mut self, path: &str, delay: Duration) -> Self {
        if let Some(route) = self.routes.get_mut(path) {
            route.delay = Some(delay);
        }
        self
    }

    /// Requests seen so far, in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl HttpClient for StubClient {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        let url = req.url();
        let path = url.path().to_string();
        let seen = match url.query() {
            Some(q) => format!("{path}?{q}"),
            None => path.clone(),
        };
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(seen);
        }

        let (status, body, delay) = match self.routes.get(&path) {
            Some(route) => (route.status, route.body.clone(), route.delay),
            None => (404, String::new(), None),
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut resp = http::Response::new(body);
        *resp.status_mut() =
            http::StatusCode::from_u16(status).unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR);
        Ok(reqwest::Response::from(resp))
    }
}
