use futures::StreamExt;
use futures::stream::BoxStream;
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Callbacks receiving an observable's notifications
///
/// At most one of `error` or `complete` is ever called, and nothing is
/// delivered after it.
pub struct Subscriber<T, E> {
    next: Option<Box<dyn FnMut(T) + Send>>,
    error: Option<Box<dyn FnOnce(E) + Send>>,
    complete: Option<Box<dyn FnOnce() + Send>>,
}

impl<T, E> Subscriber<T, E> {
    pub fn new() -> Self {
        Self {
            next: None,
            error: None,
            complete: None,
        }
    }

    pub fn on_next(mut self, next: impl FnMut(T) + Send + 'static) -> Self {
        self.next = Some(Box::new(next));
        self
    }

    pub fn on_error(mut self, error: impl FnOnce(E) + Send + 'static) -> Self {
        self.error = Some(Box::new(error));
        self
    }

    pub fn on_complete(mut self, complete: impl FnOnce() + Send + 'static) -> Self {
        self.complete = Some(Box::new(complete));
        self
    }

    fn next(&mut self, value: T) {
        if let Some(next) = self.next.as_mut() {
            next(value);
        }
    }

    fn error(&mut self, error: E) {
        self.complete = None;
        match self.error.take() {
            Some(callback) => callback(error),
            None => debug!("Observable error without an error callback"),
        }
    }

    fn complete(&mut self) {
        self.error = None;
        if let Some(callback) = self.complete.take() {
            callback();
        }
    }
}

impl<T, E> Default for Subscriber<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for Subscriber<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("next", &self.next.is_some())
            .field("error", &self.error.is_some())
            .field("complete", &self.complete.is_some())
            .finish()
    }
}

/// Handle on an active subscription
///
/// Dropping the handle leaves the subscription running; call
/// [`unsubscribe`](Self::unsubscribe) to release it.
#[derive(Debug, Clone)]
pub struct Subscription {
    token: CancellationToken,
}

impl Subscription {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Stops delivery and cancels the in-flight source. Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        if !self.token.is_cancelled() {
            trace!("Unsubscribing");
            self.token.cancel();
        }
    }

    /// True once unsubscribed, errored or completed
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the subscription is closed
    pub async fn closed(&self) {
        self.token.cancelled().await
    }
}

/// Pumps `source` into `subscriber` until it terminates or `token` is cancelled
pub(crate) async fn drive<T, E>(
    mut source: BoxStream<'static, Result<T, E>>,
    mut subscriber: Subscriber<T, E>,
    token: CancellationToken,
) {
    // cancels on every exit, including a panicking callback
    let _closed = token.clone().drop_guard();

    loop {
        let item = tokio::select! {
            biased;
            _ = token.cancelled() => {
                trace!("Subscription cancelled before the source terminated");
                return;
            }
            item = source.next() => item,
        };

        match item {
            Some(Ok(value)) => subscriber.next(value),
            Some(Err(error)) => {
                subscriber.error(error);
                break;
            }
            None => {
                subscriber.complete();
                break;
            }
        }

        if token.is_cancelled() {
            return;
        }
    }
}
