use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use http::Method;
use serde::Serialize;
use std::borrow::Cow;
use std::time::Duration;
use tracing::warn;

/// Description of a single ajax call
///
/// # Examples
///
/// ```rust
/// use ajaxmock::AjaxRequest;
/// use http::Method;
///
/// let request = AjaxRequest::post("/api/user")
///     .header("Content-Type", "application/json")
///     .body(r#"{"foo":"bar"}"#);
///
/// assert_eq!(request.method(), &Method::POST);
/// assert_eq!(request.body_text(), r#"{"foo":"bar"}"#);
/// ```
#[derive(Debug, Clone)]
pub struct AjaxRequest {
    url: String,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
    timeout: Option<Duration>,
}

impl AjaxRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Appends a header. Invalid names or values are logged and skipped.
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        let name = match HeaderName::try_from(name) {
            Ok(name) => name,
            Err(e) => {
                let e: http::Error = e.into();
                warn!(error = %e, "Skipping invalid request header name");
                return self;
            }
        };
        match HeaderValue::try_from(value) {
            Ok(value) => {
                self.headers.append(name, value);
            }
            Err(e) => {
                let e: http::Error = e.into();
                warn!(header = %name, error = %e, "Skipping invalid request header value");
            }
        }
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Serializes `value` as the body and sets `Content-Type: application/json`
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> serde_json::Result<Self> {
        self.body = serde_json::to_vec(value)?.into();
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }

    /// Overrides the client's request timeout for this call
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn body_bytes(&self) -> &Bytes {
        &self.body
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.timeout
    }
}
