//! Test harness helpers shared by unit and integration tests
//!
//! [`done`] mirrors the completion callback of callback-style test
//! frameworks; [`test_utils`] starts servers and logging for tests.

pub mod completion;
pub mod test_utils;

pub use completion::{Completion, Done, done};
pub use test_utils::{create_test_server_with_limit, init_tracing};
