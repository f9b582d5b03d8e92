use super::{EmptyError, Observable, Subscriber, Subscription};
use futures::stream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

#[derive(Debug, Clone, PartialEq, Eq)]
enum TestError {
    Boom(&'static str),
    Empty,
}

impl From<EmptyError> for TestError {
    fn from(_: EmptyError) -> Self {
        TestError::Empty
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Event {
    Next(u32),
    Error(TestError),
    Complete,
}

fn recording_subscriber(events: mpsc::UnboundedSender<Event>) -> Subscriber<u32, TestError> {
    let on_error = events.clone();
    let on_complete = events.clone();
    Subscriber::new()
        .on_next(move |value| {
            let _ = events.send(Event::Next(value));
        })
        .on_error(move |error| {
            let _ = on_error.send(Event::Error(error));
        })
        .on_complete(move || {
            let _ = on_complete.send(Event::Complete);
        })
}

async fn collect(mut events: mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
    let mut collected = Vec::new();
    while let Ok(Some(event)) = timeout(Duration::from_secs(1), events.recv()).await {
        collected.push(event);
    }
    collected
}

#[tokio::test]
async fn test_map_transforms_value() {
    let observable = Observable::<u32, TestError>::of(20).map(|n| n + 1).map(|n| n * 2);

    assert_eq!(observable.first().await, Ok(42));
}

#[tokio::test]
async fn test_try_map_failure_becomes_error() {
    let observable = Observable::<u32, TestError>::of(7)
        .try_map(|n| if n > 5 { Err(TestError::Boom("too big")) } else { Ok(n) });

    assert_eq!(observable.first().await, Err(TestError::Boom("too big")));
}

#[tokio::test]
async fn test_first_on_empty_source() {
    let observable = Observable::<u32, TestError>::from_stream(stream::empty);

    assert_eq!(observable.first().await, Err(TestError::Empty));
}

#[tokio::test]
async fn test_subscriber_sees_values_then_complete() {
    let (tx, rx) = mpsc::unbounded_channel();
    let observable =
        Observable::<u32, TestError>::from_stream(|| stream::iter(vec![Ok(1), Ok(2), Ok(3)]));

    let subscription = observable.subscribe_with(recording_subscriber(tx));
    subscription.closed().await;

    assert_eq!(
        collect(rx).await,
        vec![Event::Next(1), Event::Next(2), Event::Next(3), Event::Complete]
    );
    assert!(subscription.is_closed());
}

#[tokio::test]
async fn test_error_terminates_without_complete() {
    let (tx, rx) = mpsc::unbounded_channel();
    let observable = Observable::<u32, TestError>::from_stream(|| {
        stream::iter(vec![Ok(1), Err(TestError::Boom("bad")), Ok(2)])
    });

    let subscription = observable.subscribe_with(recording_subscriber(tx));
    subscription.closed().await;

    assert_eq!(
        collect(rx).await,
        vec![Event::Next(1), Event::Error(TestError::Boom("bad"))]
    );
}

#[tokio::test]
async fn test_subscribe_with_callbacks() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let error_tx = tx.clone();

    let subscription = Observable::<u32, TestError>::throw(TestError::Boom("nope")).subscribe(
        move |value| {
            let _ = tx.send(Ok(value));
        },
        move |error| {
            let _ = error_tx.send(Err(error));
        },
    );

    let received = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
    assert_eq!(received, Some(Err(TestError::Boom("nope"))));
    subscription.closed().await;
}

#[tokio::test]
async fn test_each_subscription_reruns_source() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    let observable = Observable::<u32, TestError>::defer(move || {
        let run = counter.fetch_add(1, Ordering::SeqCst) as u32;
        async move { Ok(run) }
    });

    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(observable.first().await, Ok(0));
    assert_eq!(observable.clone().first().await, Ok(1));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_unsubscribe_suppresses_pending_notification() {
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let next_log = delivered.clone();
    let error_log = delivered.clone();

    let observable = Observable::<u32, TestError>::defer(|| async {
        sleep(Duration::from_millis(50)).await;
        Ok(1)
    });

    let subscription = observable.subscribe(
        move |value| next_log.lock().unwrap().push(format!("next {value}")),
        move |error| error_log.lock().unwrap().push(format!("error {error:?}")),
    );
    subscription.unsubscribe();
    assert!(subscription.is_closed());

    sleep(Duration::from_millis(150)).await;
    assert!(delivered.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unsubscribe_is_idempotent() {
    let subscription = Observable::<u32, TestError>::defer(|| async {
        sleep(Duration::from_secs(10)).await;
        Ok(1)
    })
    .subscribe(|_| {}, |_| {});

    subscription.unsubscribe();
    subscription.unsubscribe();
    subscription.clone().unsubscribe();

    timeout(Duration::from_secs(1), subscription.closed())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_panicking_callback_closes_subscription() {
    let subscription = Observable::<u32, TestError>::defer(|| async { Ok(1) })
        .subscribe(|value| panic!("unexpected value {value}"), |_| {});

    timeout(Duration::from_secs(1), subscription.closed())
        .await
        .unwrap();
    assert!(subscription.is_closed());
}

#[tokio::test]
async fn test_unsubscribe_from_next_stops_delivery() {
    let (tx, rx) = mpsc::unbounded_channel();
    let slot: Arc<OnceLock<Subscription>> = Arc::new(OnceLock::new());

    let handle = slot.clone();
    let on_next = tx.clone();
    let on_complete = tx.clone();
    let subscriber = Subscriber::new()
        .on_next(move |value| {
            if let Some(subscription) = handle.get() {
                subscription.unsubscribe();
            }
            let _ = on_next.send(Event::Next(value));
        })
        .on_error(move |error| {
            let _ = tx.send(Event::Error(error));
        })
        .on_complete(move || {
            let _ = on_complete.send(Event::Complete);
        });

    let observable =
        Observable::<u32, TestError>::from_stream(|| stream::iter(vec![Ok(1), Ok(2), Ok(3)]));
    // the current-thread test runtime only starts the source once this task yields
    let subscription = observable.subscribe_with(subscriber);
    slot.set(subscription.clone()).unwrap();

    subscription.closed().await;

    assert_eq!(collect(rx).await, vec![Event::Next(1)]);
    assert!(subscription.is_closed());
}

#[tokio::test]
async fn test_unsubscribe_from_error_callback() {
    let slot: Arc<OnceLock<Subscription>> = Arc::new(OnceLock::new());
    let handle = slot.clone();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let subscription = Observable::<u32, TestError>::throw(TestError::Boom("bad")).subscribe(
        |_| {},
        move |error| {
            if let Some(subscription) = handle.get() {
                subscription.unsubscribe();
            }
            let _ = tx.send(error);
        },
    );
    slot.set(subscription.clone()).unwrap();

    let received = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
    assert_eq!(received, Some(TestError::Boom("bad")));
    assert!(subscription.is_closed());
}

#[test]
#[should_panic]
fn test_subscribe_outside_runtime_panics() {
    let _ = Observable::<u32, TestError>::of(1).subscribe(|_| {}, |_| {});
}
