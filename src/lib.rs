use crate::http::protocol::HttpProtocolError;
use thiserror::Error;

/// Error types for the ajaxmock library
#[derive(Error, Debug)]
pub enum MockError {
    /// Socket errors (bind, accept, read, write)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or oversized HTTP traffic
    #[error("HTTP protocol error: {0}")]
    Protocol(#[from] HttpProtocolError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// A mock handler panicked while answering a request
    #[error("Mock handler failed: {0}")]
    Handler(String),

    /// The server task could not be joined
    #[error("Server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// A test signalled failure through its completion handle
    #[error("Test failed: {0}")]
    Failed(String),
}

/// Result type for the ajaxmock library
pub type Result<T> = std::result::Result<T, MockError>;

pub mod ajax;
pub mod common;
pub mod http;
pub mod mock;
pub mod rx;

// Re-export main types for convenience
pub use ajax::{AjaxClient, AjaxConfig, AjaxError, AjaxRequest, AjaxResponse, ajax};
pub use common::{Completion, Done, done};
pub use mock::{Mock, MockRequest, MockResponse, MockServer, MockServerConfig, Responder, UrlPattern};
pub use rx::{Observable, Subscriber, Subscription};
