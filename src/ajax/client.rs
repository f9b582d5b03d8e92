use super::config::AjaxConfig;
use super::request::AjaxRequest;
use super::response::{AjaxError, AjaxResponse};
use crate::http::protocol::{ClientCodec, HttpProtocolError, HttpRequestFrame, HttpResponseFrame};
use crate::rx::Observable;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use http::Uri;
use http::header::{CONNECTION, HOST, HeaderValue};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::debug;

/// Sends one request frame and returns the response frame
#[async_trait]
pub trait Transport: Debug + Send + Sync {
    /// `address` is the `host:port` to connect to
    async fn send(
        &self,
        address: &str,
        frame: HttpRequestFrame,
    ) -> Result<HttpResponseFrame, AjaxError>;
}

/// Plain HTTP/1.1 over a fresh TCP connection per request
#[derive(Debug, Clone)]
pub struct TcpTransport {
    config: AjaxConfig,
}

impl TcpTransport {
    pub fn new(config: AjaxConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(
        &self,
        address: &str,
        frame: HttpRequestFrame,
    ) -> Result<HttpResponseFrame, AjaxError> {
        let stream = timeout(self.config.connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| AjaxError::Timeout(self.config.connect_timeout))??;

        let codec = ClientCodec::new(self.config.max_response_size);
        let mut framed = Framed::with_capacity(stream, codec, self.config.buffer_size);

        framed.send(frame).await?;

        match framed.next().await {
            Some(response) => Ok(response?),
            None => Err(HttpProtocolError::IncompleteResponse.into()),
        }
    }
}

/// Where a request URL points
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Target {
    /// `host:port` to connect to
    pub(crate) address: String,
    /// Value of the `Host` header
    pub(crate) host: String,
    pub(crate) path_and_query: String,
}

/// Resolves `url` against `base_url`; only `http` URLs are supported
pub(crate) fn resolve(base_url: Option<&str>, url: &str) -> Result<Target, AjaxError> {
    let absolute = if url.starts_with('/') {
        let base = base_url
            .ok_or_else(|| AjaxError::invalid_url(url, "relative url without a base url"))?;
        format!("{}{url}", base.trim_end_matches('/'))
    } else {
        url.to_string()
    };

    let uri: Uri = absolute
        .parse()
        .map_err(|e: http::uri::InvalidUri| AjaxError::invalid_url(url, e.to_string()))?;

    match uri.scheme_str() {
        Some("http") => {}
        Some(other) => {
            return Err(AjaxError::invalid_url(url, format!("unsupported scheme {other}")));
        }
        None => return Err(AjaxError::invalid_url(url, "missing scheme")),
    }

    let authority = uri
        .authority()
        .ok_or_else(|| AjaxError::invalid_url(url, "missing host"))?;
    let port = authority.port_u16().unwrap_or(80);
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .filter(|pq| !pq.is_empty())
        .unwrap_or("/");

    Ok(Target {
        address: format!("{}:{port}", authority.host()),
        host: authority.as_str().to_string(),
        path_and_query: path_and_query.to_string(),
    })
}

fn build_frame(request: &AjaxRequest, target: &Target) -> HttpRequestFrame {
    let mut headers = request.headers().clone();
    if !headers.contains_key(HOST) {
        if let Ok(host) = HeaderValue::from_str(&target.host) {
            headers.insert(HOST, host);
        }
    }
    headers.insert(CONNECTION, HeaderValue::from_static("close"));

    HttpRequestFrame {
        method: request.method().clone(),
        target: target.path_and_query.clone(),
        headers,
        body: request.body_bytes().clone(),
    }
}

/// Reactive HTTP client
///
/// Every call returns a cold [`Observable`]: the request is sent when it is
/// subscribed to, and sent again for every further subscription. A 2xx
/// response is delivered as the value; anything else is delivered as
/// [`AjaxError::Status`].
///
/// # Examples
///
/// ```no_run
/// use ajaxmock::ajax::{AjaxClient, AjaxConfigBuilder};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = AjaxClient::new(AjaxConfigBuilder::new().base_url("http://127.0.0.1:8080").build());
///
///     let subscription = client.get("/api/user").subscribe(
///         |response| println!("{}", response.response()),
///         |error| eprintln!("{error}"),
///     );
///     subscription.closed().await;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AjaxClient {
    config: AjaxConfig,
    transport: Arc<dyn Transport>,
}

impl AjaxClient {
    pub fn new(config: AjaxConfig) -> Self {
        let transport = Arc::new(TcpTransport::new(config.clone()));
        Self { config, transport }
    }

    pub fn with_transport(config: AjaxConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &AjaxConfig {
        &self.config
    }

    pub fn ajax(&self, request: AjaxRequest) -> Observable<AjaxResponse, AjaxError> {
        let client = self.clone();
        Observable::defer(move || {
            let client = client.clone();
            let request = request.clone();
            async move { client.execute(request).await }
        })
    }

    pub fn get(&self, url: &str) -> Observable<AjaxResponse, AjaxError> {
        self.ajax(AjaxRequest::get(url))
    }

    pub fn post(&self, url: &str, body: impl Into<Bytes>) -> Observable<AjaxResponse, AjaxError> {
        self.ajax(AjaxRequest::post(url).body(body))
    }

    /// GETs `url` and decodes the JSON body into `T`
    pub fn get_json<T>(&self, url: &str) -> Observable<T, AjaxError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.get(url).try_map(|response| response.json::<T>())
    }

    /// Sends `request` once, without the observable wrapper
    pub async fn execute(&self, request: AjaxRequest) -> Result<AjaxResponse, AjaxError> {
        let target = resolve(self.config.base_url.as_deref(), request.url())?;
        let limit = request
            .request_timeout()
            .unwrap_or(self.config.request_timeout);
        let frame = build_frame(&request, &target);

        debug!(
            method = %request.method(),
            url = request.url(),
            address = %target.address,
            "Sending ajax request"
        );

        let frame = timeout(limit, self.transport.send(&target.address, frame))
            .await
            .map_err(|_| AjaxError::Timeout(limit))??;
        let response = AjaxResponse::new(frame, request);

        debug!(status = response.status().as_u16(), size = response.response_bytes().len(), "Received ajax response");

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(AjaxError::Status(Box::new(response)))
        }
    }
}

/// Issues `request` with a default client; the URL must be absolute
pub fn ajax(request: AjaxRequest) -> Observable<AjaxResponse, AjaxError> {
    AjaxClient::new(AjaxConfig::default()).ajax(request)
}
