use super::config::MockServerConfig;
use super::matcher::{Handler, Mock, UrlPattern};
use super::request::MockRequest;
use super::response::{MockResponse, Responder};
use crate::ajax::{AjaxClient, AjaxConfig};
use crate::http::protocol::{HttpProtocolError, HttpResponseFrame, ServerCodec};
use crate::{MockError, Result};
use futures::{SinkExt, StreamExt};
use http::header::{CONNECTION, CONTENT_TYPE, HeaderMap, HeaderValue, SERVER};
use http::{Method, StatusCode};
use std::any::Any;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{Instrument, debug, error, info, warn};

/// Mock HTTP server standing in for a real backend during a test
///
/// `setup` binds an ephemeral loopback port and starts answering requests
/// with the registered mocks; `teardown` stops it and reports any handler
/// that panicked. Requests that match no mock get `404 Not Found`.
///
/// # Examples
///
/// ```no_run
/// use ajaxmock::{AjaxRequest, MockResponse, MockServer};
/// use http::StatusCode;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = MockServer::setup().await?;
///     server.post(
///         "/api/user",
///         MockResponse::new().status(StatusCode::CREATED).body(r#"{"data":{"id":"abc-123"}}"#),
///     );
///
///     let response = server
///         .ajax()
///         .ajax(AjaxRequest::post("/api/user").body(r#"{"name":"John"}"#))
///         .first()
///         .await?;
///     assert_eq!(response.status(), StatusCode::CREATED);
///
///     server.teardown().await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockServer {
    config: MockServerConfig,
    addr: SocketAddr,
    state: Arc<MockState>,
    shutdown_signal: broadcast::Sender<()>,
    task: Option<JoinHandle<Result<()>>>,
}

impl MockServer {
    /// Starts a server with the default configuration
    pub async fn setup() -> Result<Self> {
        Self::start(MockServerConfig::default()).await
    }

    pub async fn start(config: MockServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let addr = listener.local_addr()?;

        let (shutdown_signal, _) = broadcast::channel(1);
        let shutdown_rx = shutdown_signal.subscribe();
        let state = Arc::new(MockState::default());

        info!(address = %addr, max_connections = config.max_connections, "Mock server listening");

        let task = tokio::spawn(accept_loop(listener, config.clone(), state.clone(), shutdown_rx));

        Ok(Self {
            config,
            addr,
            state,
            shutdown_signal,
            task: Some(task),
        })
    }

    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &MockServerConfig {
        &self.config
    }

    /// `http://host:port` of the running server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Absolute URL for `path` on this server
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url())
        } else {
            format!("{}/{path}", self.base_url())
        }
    }

    /// Registers `responder` for requests with `method` whose URL matches `url`
    pub fn on(
        &self,
        method: Method,
        url: impl Into<UrlPattern>,
        responder: impl Responder + 'static,
    ) -> Mock {
        self.register(Some(method), url.into(), Box::new(responder))
    }

    /// Registers `responder` for requests with any method
    pub fn any(&self, url: impl Into<UrlPattern>, responder: impl Responder + 'static) -> Mock {
        self.register(None, url.into(), Box::new(responder))
    }

    pub fn get(&self, url: impl Into<UrlPattern>, responder: impl Responder + 'static) -> Mock {
        self.on(Method::GET, url, responder)
    }

    pub fn post(&self, url: impl Into<UrlPattern>, responder: impl Responder + 'static) -> Mock {
        self.on(Method::POST, url, responder)
    }

    pub fn put(&self, url: impl Into<UrlPattern>, responder: impl Responder + 'static) -> Mock {
        self.on(Method::PUT, url, responder)
    }

    pub fn patch(&self, url: impl Into<UrlPattern>, responder: impl Responder + 'static) -> Mock {
        self.on(Method::PATCH, url, responder)
    }

    pub fn delete(&self, url: impl Into<UrlPattern>, responder: impl Responder + 'static) -> Mock {
        self.on(Method::DELETE, url, responder)
    }

    pub fn head(&self, url: impl Into<UrlPattern>, responder: impl Responder + 'static) -> Mock {
        self.on(Method::HEAD, url, responder)
    }

    pub fn options(&self, url: impl Into<UrlPattern>, responder: impl Responder + 'static) -> Mock {
        self.on(Method::OPTIONS, url, responder)
    }

    fn register(
        &self,
        method: Option<Method>,
        url: UrlPattern,
        responder: Box<dyn Responder>,
    ) -> Mock {
        self.state.register(method, url, responder)
    }

    /// Removes every mock and forgets recorded requests and failures
    pub fn reset(&self) {
        self.state.clear();
    }

    /// Every request received so far, matched or not
    pub fn received_requests(&self) -> Vec<MockRequest> {
        self.state.received()
    }

    /// Requests that no registered mock matched
    pub fn unmatched_requests(&self) -> Vec<MockRequest> {
        self.state.unmatched()
    }

    /// An ajax client that resolves relative URLs against this server
    pub fn ajax(&self) -> AjaxClient {
        AjaxClient::new(AjaxConfig {
            base_url: Some(self.base_url()),
            ..AjaxConfig::default()
        })
    }

    /// Stops the server and clears its mocks
    ///
    /// Fails with [`MockError::Handler`] if any responder panicked while
    /// the server was running.
    pub async fn teardown(mut self) -> Result<()> {
        let _ = self.shutdown_signal.send(());
        if let Some(task) = self.task.take() {
            task.await??;
        }

        let failures = self.state.take_failures();
        self.state.clear();
        info!(address = %self.addr, "Mock server torn down");

        if failures.is_empty() {
            Ok(())
        } else {
            Err(MockError::Handler(failures.join("; ")))
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.shutdown_signal.send(());
        }
    }
}

/// Mocks and request history shared with connection tasks
#[derive(Debug, Default)]
pub(crate) struct MockState {
    handlers: RwLock<Vec<Handler>>,
    received: Mutex<Vec<MockRequest>>,
    unmatched: Mutex<Vec<MockRequest>>,
    failures: Mutex<Vec<String>>,
}

impl MockState {
    pub(crate) fn register(
        &self,
        method: Option<Method>,
        url: UrlPattern,
        responder: Box<dyn Responder>,
    ) -> Mock {
        let hits = Arc::new(AtomicUsize::new(0));
        let mock = Mock::new(method.clone(), &url, hits.clone());

        debug!(method = ?method, url = %url, "Registered mock");
        write(&self.handlers).push(Handler {
            method,
            url,
            responder: Arc::from(responder),
            hits,
        });

        mock
    }

    /// Answers `request` with the first matching mock
    pub(crate) fn dispatch(&self, request: &MockRequest) -> MockResponse {
        lock(&self.received).push(request.clone());

        // the lock is released before the responder runs, so responders may register mocks
        let matched = read(&self.handlers)
            .iter()
            .find(|handler| handler.matches(request))
            .map(|handler| {
                handler.record_hit();
                handler.responder.clone()
            });
        let Some(responder) = matched else {
            warn!(method = %request.method(), url = request.url(), "No mock registered for request");
            lock(&self.unmatched).push(request.clone());
            return MockResponse::new()
                .status(StatusCode::NOT_FOUND)
                .body(format!("No mock registered for {} {}", request.method(), request.url()));
        };

        match panic::catch_unwind(AssertUnwindSafe(|| responder.respond(request))) {
            Ok(response) => response,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(method = %request.method(), url = request.url(), %message, "Mock handler panicked");
                lock(&self.failures).push(format!(
                    "{} {}: {message}",
                    request.method(),
                    request.url()
                ));
                MockResponse::new()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body(message)
            }
        }
    }

    pub(crate) fn received(&self) -> Vec<MockRequest> {
        lock(&self.received).clone()
    }

    pub(crate) fn unmatched(&self) -> Vec<MockRequest> {
        lock(&self.unmatched).clone()
    }

    pub(crate) fn take_failures(&self) -> Vec<String> {
        std::mem::take(&mut *lock(&self.failures))
    }

    pub(crate) fn clear(&self) {
        write(&self.handlers).clear();
        lock(&self.received).clear();
        lock(&self.unmatched).clear();
        lock(&self.failures).clear();
    }
}

// A panicking responder must not wedge the server, so poisoned locks are recovered.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(rwlock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    rwlock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(rwlock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    rwlock.write().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "mock handler panicked".to_string()
    }
}

async fn accept_loop(
    listener: TcpListener,
    config: MockServerConfig,
    state: Arc<MockState>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let connection_count = Arc::new(AtomicUsize::new(0));

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, addr)) => {
                        let current_count = connection_count.load(Ordering::SeqCst);
                        if current_count >= config.max_connections {
                            warn!(%addr, current = current_count, limit = config.max_connections, "Connection rejected: limit reached");
                            continue;
                        }

                        let new_count = connection_count.fetch_add(1, Ordering::SeqCst) + 1;
                        debug!(%addr, current = new_count, "Accepted connection");

                        let config = config.clone();
                        let state = state.clone();
                        let connection_count = connection_count.clone();
                        let span = tracing::info_span!("connection", %addr);

                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, addr, config, state).instrument(span).await {
                                warn!(%addr, error = %e, "Error handling connection");
                            }
                            let final_count = connection_count.fetch_sub(1, Ordering::SeqCst) - 1;
                            debug!(%addr, current = final_count, "Connection closed");
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Received shutdown signal, stopping mock server");
                break;
            }
        }
    }

    info!("Mock server stopped");
    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    config: MockServerConfig,
    state: Arc<MockState>,
) -> Result<()> {
    let codec = ServerCodec::new(config.max_request_size);
    let mut framed = Framed::with_capacity(stream, codec, config.buffer_size);

    loop {
        let frame = match timeout(config.read_timeout, framed.next()).await {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(e))) => {
                let status = match e {
                    HttpProtocolError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                    _ => StatusCode::BAD_REQUEST,
                };
                let rejection = MockResponse::new().status(status).body(e.to_string());
                let _ = timeout(
                    config.write_timeout,
                    framed.send(render(rejection, &config)),
                )
                .await;
                return Err(e.into());
            }
            Ok(None) => {
                debug!(%addr, "Client closed connection");
                break;
            }
            Err(_) => {
                debug!(%addr, "Read timeout");
                break;
            }
        };

        let close = wants_close(&frame.headers);
        let request = MockRequest::from(frame);
        info!(
            %addr,
            method = %request.method(),
            url = request.url(),
            size = request.body_bytes().len(),
            "Received request"
        );

        let response = state.dispatch(&request);
        let status = response.status_code();
        match timeout(config.write_timeout, framed.send(render(response, &config))).await {
            Ok(Ok(())) => {
                info!(%addr, status = status.as_u16(), "Sent response");
            }
            Ok(Err(e)) => {
                return Err(e.into());
            }
            Err(_) => {
                warn!(%addr, "Write timeout");
                break;
            }
        }

        if close {
            break;
        }
    }

    Ok(())
}

/// Applies server-wide headers and converts to a wire frame
pub(crate) fn render(response: MockResponse, config: &MockServerConfig) -> HttpResponseFrame {
    let mut frame = HttpResponseFrame::from(response);

    if let Some(server_name) = &config.server_name {
        set_default_header(&mut frame.headers, SERVER, server_name);
    }
    if !frame.body.is_empty() {
        if let Some(content_type) = &config.default_content_type {
            set_default_header(&mut frame.headers, CONTENT_TYPE, content_type);
        }
    }

    frame
}

fn set_default_header(headers: &mut HeaderMap, name: http::header::HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.entry(name).or_insert(value);
        }
        Err(e) => {
            warn!(header = %name, error = %e, "Ignoring invalid configured header");
        }
    }
}

fn wants_close(headers: &HeaderMap) -> bool {
    headers
        .get(CONNECTION)
        .is_some_and(|value| value.as_bytes().eq_ignore_ascii_case(b"close"))
}
