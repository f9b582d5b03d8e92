//! HTTP/1.1 wire format
//!
//! This module provides the codecs shared by the mock server and the ajax
//! client: request and response heads are parsed with `httparse`, bodies are
//! framed by `Content-Length`.

pub mod protocol;


pub use protocol::{
    ClientCodec, HttpProtocolError, HttpRequestFrame, HttpResponseFrame, ServerCodec,
};
