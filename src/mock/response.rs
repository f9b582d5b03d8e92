use super::request::MockRequest;
use crate::http::protocol::HttpResponseFrame;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use serde::Serialize;
use tracing::warn;

/// A canned response returned by the mock server
///
/// Defaults to `200 OK` with no headers and an empty body.
///
/// # Examples
///
/// ```rust
/// use ajaxmock::MockResponse;
/// use http::StatusCode;
///
/// let response = MockResponse::new()
///     .status(StatusCode::CREATED)
///     .reason("Created")
///     .body(r#"{"data":{"id":"abc-123"}}"#);
///
/// assert_eq!(response.status_code(), StatusCode::CREATED);
/// assert_eq!(response.reason_phrase(), "Created");
/// ```
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: StatusCode,
    reason: Option<String>,
    headers: HeaderMap,
    body: Bytes,
}

impl MockResponse {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            reason: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Overrides the reason phrase sent on the status line
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
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
                warn!(error = %e, "Skipping invalid mock response header name");
                return self;
            }
        };
        match HeaderValue::try_from(value) {
            Ok(value) => {
                self.headers.append(name, value);
            }
            Err(e) => {
                let e: http::Error = e.into();
                warn!(header = %name, error = %e, "Skipping invalid mock response header value");
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

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// The explicit reason, or the canonical one for the status
    pub fn reason_phrase(&self) -> &str {
        self.reason
            .as_deref()
            .or_else(|| self.status.canonical_reason())
            .unwrap_or("")
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body_bytes(&self) -> &Bytes {
        &self.body
    }
}

impl From<MockResponse> for HttpResponseFrame {
    fn from(response: MockResponse) -> Self {
        let reason = response.reason_phrase().to_string();
        Self {
            status: response.status,
            reason,
            headers: response.headers,
            body: response.body,
        }
    }
}

impl Default for MockResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// Produces the response for a matched request
///
/// Implemented by [`MockResponse`] for static replies and by closures
/// `Fn(&MockRequest, MockResponse) -> MockResponse` for replies that depend
/// on the request. Closures receive a fresh `200 OK` response to build on.
pub trait Responder: Send + Sync {
    fn respond(&self, request: &MockRequest) -> MockResponse;
}

impl Responder for MockResponse {
    fn respond(&self, _request: &MockRequest) -> MockResponse {
        self.clone()
    }
}

impl<F> Responder for F
where
    F: Fn(&MockRequest, MockResponse) -> MockResponse + Send + Sync,
{
    fn respond(&self, request: &MockRequest) -> MockResponse {
        self(request, MockResponse::new())
    }
}
