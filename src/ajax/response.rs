use super::request::AjaxRequest;
use crate::http::protocol::{HttpProtocolError, HttpResponseFrame};
use crate::rx::EmptyError;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::io;
use std::time::Duration;

/// A response delivered to ajax subscribers
#[derive(Debug, Clone)]
pub struct AjaxResponse {
    status: StatusCode,
    reason: String,
    headers: HeaderMap,
    body: Bytes,
    text: String,
    request: AjaxRequest,
}

impl AjaxResponse {
    pub(crate) fn new(frame: HttpResponseFrame, request: AjaxRequest) -> Self {
        let text = String::from_utf8_lossy(&frame.body).into_owned();
        Self {
            status: frame.status,
            reason: frame.reason,
            headers: frame.headers,
            body: frame.body,
            text,
            request,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Reason phrase from the status line, as sent by the server
    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Body text exactly as received, with invalid UTF-8 replaced
    pub fn response(&self) -> &str {
        &self.text
    }

    pub fn response_bytes(&self) -> &Bytes {
        &self.body
    }

    /// The request that produced this response
    pub fn request(&self) -> &AjaxRequest {
        &self.request
    }

    /// Decodes the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, AjaxError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Error notification of an ajax observable
#[derive(Debug, thiserror::Error)]
pub enum AjaxError {
    /// The server answered with a non-2xx status
    #[error("ajax error: {} {}", .0.status().as_u16(), .0.reason())]
    Status(Box<AjaxResponse>),

    #[error("ajax timeout after {0:?}")]
    Timeout(Duration),

    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Connection failure or malformed response
    #[error("transport error: {0}")]
    Transport(#[from] HttpProtocolError),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Empty(#[from] EmptyError),
}

impl AjaxError {
    pub(crate) fn invalid_url(url: &str, reason: impl Into<String>) -> Self {
        AjaxError::InvalidUrl {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// HTTP status of a status error
    pub fn status(&self) -> Option<StatusCode> {
        self.response().map(AjaxResponse::status)
    }

    /// The full response of a status error
    pub fn response(&self) -> Option<&AjaxResponse> {
        match self {
            AjaxError::Status(response) => Some(response.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for AjaxError {
    fn from(err: io::Error) -> Self {
        AjaxError::Transport(HttpProtocolError::Io(err))
    }
}
