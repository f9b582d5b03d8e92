//! Minimal reactive streams
//!
//! An [`Observable`] is a cold source of values built on `futures` streams.
//! Subscribing runs it on the tokio runtime and delivers each notification
//! to a [`Subscriber`]; the returned [`Subscription`] releases it.

pub mod observable;
pub mod subscription;

#[cfg(test)]
mod tests;

pub use observable::{EmptyError, Observable};
pub use subscription::{Subscriber, Subscription};
