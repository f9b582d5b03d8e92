use crate::http::protocol::HttpRequestFrame;
use bytes::Bytes;
use http::{HeaderMap, Method};
use serde::de::DeserializeOwned;
use std::borrow::Cow;

/// A request captured by the mock server, as seen by handlers
#[derive(Debug, Clone)]
pub struct MockRequest {
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Bytes,
}

impl MockRequest {
    pub fn new(method: Method, url: impl Into<String>, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            url: url.into(),
            headers,
            body,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path and query as sent by the client
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn path(&self) -> &str {
        match self.url.split_once('?') {
            Some((path, _)) => path,
            None => &self.url,
        }
    }

    pub fn query(&self) -> Option<&str> {
        self.url.split_once('?').map(|(_, query)| query)
    }

    /// Looks up a header by case-insensitive name.
    ///
    /// Returns `None` when the header is absent or not valid visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Body as text, with invalid UTF-8 replaced
    pub fn body(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn body_bytes(&self) -> &Bytes {
        &self.body
    }

    /// Decodes the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

impl From<HttpRequestFrame> for MockRequest {
    fn from(frame: HttpRequestFrame) -> Self {
        Self::new(frame.method, frame.target, frame.headers, frame.body)
    }
}
