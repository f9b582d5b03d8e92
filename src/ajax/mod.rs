//! Reactive HTTP client
//!
//! Requests are described by [`AjaxRequest`] and issued through an
//! [`AjaxClient`], which hands back an [`Observable`](crate::rx::Observable)
//! of the response.

pub mod client;
pub mod config;
pub mod request;
pub mod response;


pub use client::{AjaxClient, TcpTransport, Transport, ajax};
pub use config::{AjaxConfig, AjaxConfigBuilder};
pub use request::AjaxRequest;
pub use response::{AjaxError, AjaxResponse};
