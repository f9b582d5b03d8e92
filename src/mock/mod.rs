//! Request interceptor for tests
//!
//! A [`MockServer`] listens on a loopback port and answers every request with
//! the first registered mock whose method and URL match, instead of letting
//! the request reach a real backend. Mocks are either canned
//! [`MockResponse`]s or closures that inspect the [`MockRequest`].

pub mod config;
pub mod matcher;
pub mod request;
pub mod response;
pub mod server;


pub use config::MockServerConfig;
pub use matcher::{Mock, UrlPattern};
pub use request::MockRequest;
pub use response::{MockResponse, Responder};
pub use server::MockServer;
