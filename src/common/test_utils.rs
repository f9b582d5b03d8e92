use crate::Result;
use crate::mock::{MockServer, MockServerConfig};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Installs a tracing subscriber writing through the test harness
///
/// Honors `RUST_LOG`, defaulting to `ajaxmock=debug`. Safe to call from
/// every test; only the first call installs.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ajaxmock=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Creates a mock server with a connection limit and short timeouts for integration tests
pub async fn create_test_server_with_limit(max_connections: usize) -> Result<MockServer> {
    let config = MockServerConfig {
        max_connections,
        read_timeout: Duration::from_secs(2),
        write_timeout: Duration::from_secs(2),
        ..MockServerConfig::default()
    };

    MockServer::start(config).await
}
