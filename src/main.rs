use ajaxmock::{MockResponse, MockServer, MockServerConfig};
use color_eyre::eyre::{Result, WrapErr, eyre};
use http::{Method, StatusCode};
use std::time::Duration;

use tracing::info;

const USAGE: &str = "Usage: ajaxmock [port] [METHOD] [path] [status] [body]";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("ajaxmock=info")
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    if args.iter().skip(1).any(|arg| arg == "-h" || arg == "--help") {
        println!("{USAGE}");
        return Ok(());
    }

    let port = match args.get(1) {
        Some(port) => port
            .parse::<u16>()
            .wrap_err_with(|| format!("Invalid port {port:?}\n{USAGE}"))?,
        None => 8080,
    };
    let method = match args.get(2) {
        Some(method) => method
            .to_uppercase()
            .parse::<Method>()
            .wrap_err_with(|| format!("Invalid method {method:?}\n{USAGE}"))?,
        None => Method::GET,
    };
    let path = args.get(3).cloned().unwrap_or_else(|| "/".to_string());
    let status = match args.get(4) {
        Some(status) => status
            .parse::<u16>()
            .ok()
            .and_then(|code| StatusCode::from_u16(code).ok())
            .ok_or_else(|| eyre!("Invalid status {status:?}\n{USAGE}"))?,
        None => StatusCode::OK,
    };
    let body = args.get(5).cloned().unwrap_or_default();

    let config = MockServerConfig {
        bind_addr: format!("127.0.0.1:{port}").parse()?,
        max_connections: 1000, // Higher limit for standalone use
        read_timeout: Duration::from_secs(30),
        write_timeout: Duration::from_secs(30),
        server_name: Some("ajaxmock/0.1".to_string()),
        default_content_type: Some("application/json".to_string()),
        ..MockServerConfig::default()
    };

    let server = MockServer::start(config)
        .await
        .wrap_err("Failed to start mock server")?;
    let mock = server.on(
        method.clone(),
        path.as_str(),
        MockResponse::new().status(status).body(body),
    );

    info!(
        address = %server.address(),
        %method,
        %path,
        status = status.as_u16(),
        "Serving canned response, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .wrap_err("Failed to listen for Ctrl-C")?;

    info!(hits = mock.hits(), unmatched = server.unmatched_requests().len(), "Shutting down");
    server.teardown().await.wrap_err("Mock server reported failures")?;

    Ok(())
}
