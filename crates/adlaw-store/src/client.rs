//! Shared HTTP plumbing for the backend clients.

use crate::StoreError;

/// Connection to the workspace backend: base URL plus an optional session
/// token applied to every request.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    session: Option<String>,
}

impl BackendClient {
    /// Create a client for the given backend base URL.
    ///
    /// `base_url` should be like `http://localhost:4000` (no trailing slash).
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            session: None,
        }
    }

    /// Attach a session token; it is sent as a bearer credential on every
    /// request.
    pub fn with_session(mut self, token: impl Into<String>) -> Self {
        self.session = Some(token.into());
        self
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.authed(self.http.get(self.url(path)))
    }

    pub(crate) fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.authed(self.http.post(self.url(path)))
    }

    pub(crate) fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.authed(self.http.delete(self.url(path)))
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.session {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Fail fast before touching an authenticated endpoint without a session.
    pub(crate) fn require_session(&self) -> Result<(), StoreError> {
        if self.session.is_none() {
            return Err(StoreError::Unauthenticated);
        }
        Ok(())
    }

    /// Map a non-success response to [`StoreError::Server`].
    pub(crate) async fn check(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}
