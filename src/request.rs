use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::Error;

/// Which endpoint a request targets, as far as session refresh is concerned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RequestKind {
    #[default]
    Standard,
    /// Initial username/password login. A 401 here is a bad login, not an expiry.
    Login,
    /// The refresh-credential exchange itself.
    Exchange,
}

/// Replayable description of an outbound call.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<String>,
    authorization: Option<String>,
    kind: RequestKind,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            authorization: None,
            kind: RequestKind::Standard,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, Error> {
        self.body = Some(serde_json::to_string(body)?);
        Ok(self)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn kind(mut self, kind: RequestKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.set_bearer(token);
        self
    }

    pub fn set_bearer(&mut self, token: &str) {
        self.authorization = Some(format!("Bearer {}", token));
    }

    pub(crate) fn set_authorization(&mut self, value: String) {
        self.authorization = Some(value);
    }

    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    pub fn request_kind(&self) -> RequestKind {
        self.kind
    }

    pub fn retried(&self) -> bool {
        self.retried
    }

    /// Joins `base` and the path, appending URL-encoded query pairs.
    pub fn url(&self, base: &str) -> String {
        let base = base.trim_end_matches('/');
        let path = self.path.trim_start_matches('/');
        let mut url = format!("{}/{}", base, path);
        if !self.query.is_empty() {
            let pairs = self
                .query
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&pairs);
        }
        url
    }
}

#[derive(Clone, Debug)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.body
    }

    pub fn json<D: DeserializeOwned>(&self) -> Result<D, Error> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_and_encodes_query() {
        let req = ApiRequest::get("/documents")
            .query("folder", "Q3 reports")
            .query("sort", "name&date");
        assert_eq!(
            req.url("https://api.example.com/"),
            "https://api.example.com/documents?folder=Q3%20reports&sort=name%26date"
        );
    }

    #[test]
    fn url_appends_to_existing_query() {
        let req = ApiRequest::get("search?q=a").query("page", "2");
        assert_eq!(req.url("http://h"), "http://h/search?q=a&page=2");
    }

    #[test]
    fn new_requests_are_standard_and_not_retried() {
        let req = ApiRequest::post("/documents").bearer("T1");
        assert_eq!(req.request_kind(), RequestKind::Standard);
        assert!(!req.retried());
        assert_eq!(req.authorization(), Some("Bearer T1"));
    }
}
