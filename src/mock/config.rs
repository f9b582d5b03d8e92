use crate::http::protocol::DEFAULT_MAX_FRAME_SIZE;
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for the mock HTTP server
///
/// # Examples
///
/// ```rust
/// use ajaxmock::mock::MockServerConfig;
/// use std::time::Duration;
///
/// let config = MockServerConfig {
///     read_timeout: Duration::from_secs(2),
///     server_name: Some("MockServer/1.0".to_string()),
///     ..Default::default()
/// };
/// assert_eq!(config.bind_addr.port(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct MockServerConfig {
    /// Address to bind to. Port 0 picks an ephemeral port.
    pub bind_addr: SocketAddr,
    /// Maximum number of concurrent connections
    pub max_connections: usize,
    /// Initial read buffer capacity per connection
    pub buffer_size: usize,
    /// Maximum size of a request, head and body included
    pub max_request_size: usize,
    /// Read timeout for connections
    pub read_timeout: Duration,
    /// Write timeout for connections
    pub write_timeout: Duration,
    /// Server name to include in responses (optional)
    pub server_name: Option<String>,
    /// Content type applied to responses that carry a body but no `Content-Type`
    pub default_content_type: Option<String>,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            max_connections: 100,
            buffer_size: 8192,
            max_request_size: DEFAULT_MAX_FRAME_SIZE,
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
            server_name: None,
            default_content_type: None,
        }
    }
}
