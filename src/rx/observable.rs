use super::subscription::{Subscriber, Subscription, drive};
use futures::future;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

type Source<T, E> = Arc<dyn Fn() -> BoxStream<'static, Result<T, E>> + Send + Sync>;

/// Raised by [`Observable::first`] when the source completes without a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no elements in sequence")]
pub struct EmptyError;

/// A cold, asynchronous sequence of values terminated by completion or an error
///
/// Nothing runs until the observable is subscribed to, and every
/// subscription re-runs the source from scratch.
///
/// # Examples
///
/// ```rust
/// use ajaxmock::AjaxError;
/// use ajaxmock::rx::Observable;
///
/// # #[tokio::main]
/// # async fn main() {
/// let doubled = Observable::<u32, AjaxError>::defer(|| async { Ok(21) }).map(|n| n * 2);
/// assert_eq!(doubled.first().await.unwrap(), 42);
/// # }
/// ```
pub struct Observable<T, E> {
    source: Source<T, E>,
}

impl<T, E> Observable<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Creates an observable that calls `factory` for a fresh stream on every subscription
    pub fn from_stream<F, S>(factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Stream<Item = Result<T, E>> + Send + 'static,
    {
        Self {
            source: Arc::new(move || factory().boxed()),
        }
    }

    /// Creates an observable emitting the single outcome of a future
    pub fn defer<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::from_stream(move || stream::once(factory()))
    }

    pub fn of(value: T) -> Self
    where
        T: Clone + Sync,
    {
        Self::from_stream(move || stream::once(future::ready(Ok(value.clone()))))
    }

    pub fn throw(error: E) -> Self
    where
        E: Clone + Sync,
    {
        Self::from_stream(move || stream::once(future::ready(Err(error.clone()))))
    }

    pub fn map<U, F>(self, op: F) -> Observable<U, E>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let source = self.source;
        let op = Arc::new(op);
        Observable::from_stream(move || {
            let op = op.clone();
            source().map(move |item| item.map(|value| op(value)))
        })
    }

    /// Like [`map`](Self::map), but `op` may fail; a failure becomes the error notification
    pub fn try_map<U, F>(self, op: F) -> Observable<U, E>
    where
        U: Send + 'static,
        F: Fn(T) -> Result<U, E> + Send + Sync + 'static,
    {
        let source = self.source;
        let op = Arc::new(op);
        Observable::from_stream(move || {
            let op = op.clone();
            source().map(move |item| item.and_then(|value| op(value)))
        })
    }

    /// Subscribes with a value callback and an error callback
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime, like [`tokio::spawn`].
    pub fn subscribe<N, R>(&self, next: N, error: R) -> Subscription
    where
        N: FnMut(T) + Send + 'static,
        R: FnOnce(E) + Send + 'static,
    {
        self.subscribe_with(Subscriber::new().on_next(next).on_error(error))
    }

    /// Runs the source on the current tokio runtime, delivering to `subscriber`
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn subscribe_with(&self, subscriber: Subscriber<T, E>) -> Subscription {
        let token = CancellationToken::new();
        tokio::spawn(drive(self.to_stream(), subscriber, token.clone()));
        Subscription::new(token)
    }

    /// Runs the source once and resolves with its first notification
    pub async fn first(&self) -> Result<T, E>
    where
        E: From<EmptyError>,
    {
        match self.to_stream().next().await {
            Some(item) => item,
            None => Err(EmptyError.into()),
        }
    }

    /// A fresh run of the source as a plain stream
    pub fn to_stream(&self) -> BoxStream<'static, Result<T, E>> {
        (self.source)()
    }
}

impl<T, E> Clone for Observable<T, E> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Observable<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable").finish_non_exhaustive()
    }
}
