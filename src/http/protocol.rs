use bytes::{BufMut, Bytes, BytesMut};
use http::header::{CONTENT_LENGTH, HeaderMap, HeaderName, HeaderValue, TRANSFER_ENCODING};
use http::{Method, StatusCode};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

/// Maximum number of headers accepted in a single message head
pub const MAX_HEADERS: usize = 64;

/// Default upper bound for a full message (head plus body)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum HttpProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("HTTP parsing error: {0}")]
    HttpParse(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Incomplete request")]
    IncompleteRequest,
    #[error("Incomplete response")]
    IncompleteResponse,
    #[error("Message too large: {size} bytes, max allowed: {limit}")]
    TooLarge { size: usize, limit: usize },
}

/// A complete HTTP/1.1 request as it travels on the wire
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequestFrame {
    pub method: Method,
    /// Request target, usually path and query (`/api/user?id=1`)
    pub target: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// A complete HTTP/1.1 response as it travels on the wire
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponseFrame {
    pub status: StatusCode,
    pub reason: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

struct RequestHead {
    method: Method,
    target: String,
    headers: HeaderMap,
    len: usize,
}

struct ResponseHead {
    status: StatusCode,
    reason: String,
    headers: HeaderMap,
    len: usize,
}

fn parse_request_head(src: &[u8]) -> Result<Option<RequestHead>, HttpProtocolError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);

    let len = match req.parse(src) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(e) => {
            return Err(HttpProtocolError::HttpParse(format!(
                "Failed to parse request head: {e}"
            )));
        }
    };

    let method = req
        .method
        .ok_or_else(|| HttpProtocolError::InvalidRequest("missing method".to_string()))?;
    let method = Method::from_bytes(method.as_bytes())
        .map_err(|e| HttpProtocolError::InvalidRequest(format!("invalid method {method}: {e}")))?;
    let target = req
        .path
        .ok_or_else(|| HttpProtocolError::InvalidRequest("missing request target".to_string()))?
        .to_string();
    let headers = collect_headers(&*req.headers)?;

    Ok(Some(RequestHead {
        method,
        target,
        headers,
        len,
    }))
}

fn parse_response_head(src: &[u8]) -> Result<Option<ResponseHead>, HttpProtocolError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut res = httparse::Response::new(&mut headers);

    let len = match res.parse(src) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(e) => {
            return Err(HttpProtocolError::HttpParse(format!(
                "Failed to parse response head: {e}"
            )));
        }
    };

    let code = res
        .code
        .ok_or_else(|| HttpProtocolError::HttpParse("missing status code".to_string()))?;
    let status = StatusCode::from_u16(code)
        .map_err(|e| HttpProtocolError::HttpParse(format!("invalid status code {code}: {e}")))?;
    let reason = res.reason.unwrap_or_default().to_string();
    let headers = collect_headers(&*res.headers)?;

    Ok(Some(ResponseHead {
        status,
        reason,
        headers,
        len,
    }))
}

fn collect_headers(raw: &[httparse::Header<'_>]) -> Result<HeaderMap, HttpProtocolError> {
    let mut map = HeaderMap::with_capacity(raw.len());
    for header in raw {
        let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(|e| {
            HttpProtocolError::HttpParse(format!("invalid header name {}: {e}", header.name))
        })?;
        let value = HeaderValue::from_bytes(header.value).map_err(|e| {
            HttpProtocolError::HttpParse(format!("invalid value for header {name}: {e}"))
        })?;
        map.append(name, value);
    }
    Ok(map)
}

fn content_length(headers: &HeaderMap) -> Result<Option<usize>, HttpProtocolError> {
    headers
        .get(CONTENT_LENGTH)
        .map(|value| {
            value
                .to_str()
                .ok()
                .and_then(|v| v.trim().parse::<usize>().ok())
                .ok_or_else(|| HttpProtocolError::HttpParse(format!("invalid Content-Length: {value:?}")))
        })
        .transpose()
}

fn reject_chunked(headers: &HeaderMap) -> Result<(), HttpProtocolError> {
    let chunked = headers
        .get_all(TRANSFER_ENCODING)
        .iter()
        .any(|value| value.as_bytes().eq_ignore_ascii_case(b"chunked"));
    if chunked {
        return Err(HttpProtocolError::InvalidRequest(
            "chunked transfer encoding is not supported".to_string(),
        ));
    }
    Ok(())
}

fn check_limit(size: usize, limit: usize) -> Result<(), HttpProtocolError> {
    if size > limit {
        return Err(HttpProtocolError::TooLarge { size, limit });
    }
    Ok(())
}

/// Writes every header except `Content-Length`, which is derived from the body
fn write_headers(headers: &HeaderMap, body_len: usize, dst: &mut BytesMut) {
    for (name, value) in headers {
        if *name == CONTENT_LENGTH {
            continue;
        }
        dst.put_slice(name.as_str().as_bytes());
        dst.put_slice(b": ");
        dst.put_slice(value.as_bytes());
        dst.put_slice(b"\r\n");
    }
    dst.put_slice(format!("content-length: {body_len}\r\n\r\n").as_bytes());
}

/// Server side of an HTTP/1.1 connection
///
/// Decodes requests framed by `Content-Length` and encodes responses.
/// A response to a `HEAD` request keeps its `Content-Length` but omits the body.
#[derive(Debug, Clone)]
pub struct ServerCodec {
    max_request_size: usize,
    head_request: bool,
}

impl ServerCodec {
    pub fn new(max_request_size: usize) -> Self {
        Self {
            max_request_size,
            head_request: false,
        }
    }
}

impl Default for ServerCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for ServerCodec {
    type Item = HttpRequestFrame;
    type Error = HttpProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.head_request = false;
        let Some(head) = parse_request_head(src)? else {
            check_limit(src.len(), self.max_request_size)?;
            return Ok(None);
        };

        reject_chunked(&head.headers)?;
        let total = head.len.saturating_add(content_length(&head.headers)?.unwrap_or(0));
        check_limit(total, self.max_request_size)?;

        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(total);
        let body = frame.split_off(head.len).freeze();
        self.head_request = head.method == Method::HEAD;

        Ok(Some(HttpRequestFrame {
            method: head.method,
            target: head.target,
            headers: head.headers,
            body,
        }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(HttpProtocolError::IncompleteRequest),
        }
    }
}

impl Encoder<HttpResponseFrame> for ServerCodec {
    type Error = HttpProtocolError;

    fn encode(&mut self, item: HttpResponseFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(128 + item.body.len());
        dst.put_slice(format!("HTTP/1.1 {} {}\r\n", item.status.as_u16(), item.reason).as_bytes());
        write_headers(&item.headers, item.body.len(), dst);
        if !self.head_request {
            dst.put_slice(&item.body);
        }
        Ok(())
    }
}

/// Client side of an HTTP/1.1 connection
///
/// Encodes requests and decodes responses. A response without
/// `Content-Length` is read until the server closes the connection.
#[derive(Debug, Clone)]
pub struct ClientCodec {
    max_response_size: usize,
    head_request: bool,
}

impl ClientCodec {
    pub fn new(max_response_size: usize) -> Self {
        Self {
            max_response_size,
            head_request: false,
        }
    }

    fn expects_body(&self, status: StatusCode) -> bool {
        !(self.head_request
            || status.is_informational()
            || status == StatusCode::NO_CONTENT
            || status == StatusCode::NOT_MODIFIED)
    }
}

impl Default for ClientCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Encoder<HttpRequestFrame> for ClientCodec {
    type Error = HttpProtocolError;

    fn encode(&mut self, item: HttpRequestFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.head_request = item.method == Method::HEAD;

        dst.reserve(128 + item.body.len());
        dst.put_slice(format!("{} {} HTTP/1.1\r\n", item.method, item.target).as_bytes());
        write_headers(&item.headers, item.body.len(), dst);
        dst.put_slice(&item.body);
        Ok(())
    }
}

impl Decoder for ClientCodec {
    type Item = HttpResponseFrame;
    type Error = HttpProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(head) = parse_response_head(src)? else {
            check_limit(src.len(), self.max_response_size)?;
            return Ok(None);
        };

        if !self.expects_body(head.status) {
            let _ = src.split_to(head.len);
            return Ok(Some(HttpResponseFrame {
                status: head.status,
                reason: head.reason,
                headers: head.headers,
                body: Bytes::new(),
            }));
        }

        reject_chunked(&head.headers)?;
        let Some(body_len) = content_length(&head.headers)? else {
            // body runs until the peer closes, see decode_eof
            check_limit(src.len(), self.max_response_size)?;
            return Ok(None);
        };

        let total = head.len.saturating_add(body_len);
        check_limit(total, self.max_response_size)?;

        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(total);
        let body = frame.split_off(head.len).freeze();

        Ok(Some(HttpResponseFrame {
            status: head.status,
            reason: head.reason,
            headers: head.headers,
            body,
        }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() {
            return Ok(None);
        }

        match parse_response_head(src)? {
            Some(head) if content_length(&head.headers)?.is_none() => {
                let mut frame = src.split_to(src.len());
                let body = frame.split_off(head.len).freeze();
                Ok(Some(HttpResponseFrame {
                    status: head.status,
                    reason: head.reason,
                    headers: head.headers,
                    body,
                }))
            }
            _ => Err(HttpProtocolError::IncompleteResponse),
        }
    }
}
