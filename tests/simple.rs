use ajaxmock::common::init_tracing;
use ajaxmock::{
    AjaxRequest, AjaxResponse, MockRequest, MockResponse, MockServer, Subscription, done,
};
use color_eyre::eyre::Result;
use http::StatusCode;
use serde::Deserialize;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, PartialEq, Deserialize)]
struct UserId {
    id: String,
}

#[derive(Debug, PartialEq, Deserialize)]
struct CreatedUser {
    data: UserId,
}

/// Lets a callback release the subscription it is running under
type SubscriptionSlot = Arc<OnceLock<Subscription>>;

fn unsubscribe(slot: &SubscriptionSlot) {
    if let Some(subscription) = slot.get() {
        subscription.unsubscribe();
    }
}

fn create_user(body: &str) -> AjaxRequest {
    AjaxRequest::post("/api/user")
        .header("Content-Type", "application/json")
        .body(body.to_string())
}

#[tokio::test]
async fn should_send_the_data_as_json() -> Result<()> {
    init_tracing();
    let server = MockServer::setup().await?;

    server.post("/api/user", |req: &MockRequest, res: MockResponse| {
        assert_eq!(req.header("Content-Type"), Some("application/json"));
        assert_eq!(req.body(), "{\"foo\":\"bar\"}");
        res.body(serde_json::json!({ "ok": 1 }).to_string())
    });

    let (signal, completion) = done();
    let on_error = signal.clone();
    let slot = SubscriptionSlot::default();
    let on_next_slot = slot.clone();
    let subscription = server
        .ajax()
        .ajax(create_user(&serde_json::json!({ "foo": "bar" }).to_string()))
        .subscribe(
            move |_response: AjaxResponse| {
                unsubscribe(&on_next_slot);
                signal.done();
            },
            move |error| on_error.fail(error.to_string()),
        );
    let _ = slot.set(subscription.clone());

    completion.wait(WAIT).await?;
    assert!(subscription.is_closed());
    server.teardown().await?;
    Ok(())
}

#[tokio::test]
async fn should_resolve_with_some_data_when_status_201() -> Result<()> {
    init_tracing();
    let server = MockServer::setup().await?;

    server.post(
        "/api/user",
        MockResponse::new()
            .status(StatusCode::CREATED)
            .reason("Created")
            .body("{\"data\":{\"id\":\"abc-123\"}}"),
    );

    let (signal, completion) = done();
    let on_error = signal.clone();
    let slot = SubscriptionSlot::default();
    let (on_next_slot, on_error_slot) = (slot.clone(), slot.clone());
    let subscription = server
        .ajax()
        .ajax(create_user(&serde_json::json!({ "name": "John" }).to_string()))
        .subscribe(
            move |response| {
                unsubscribe(&on_next_slot);
                if response.response() == "{\"data\":{\"id\":\"abc-123\"}}" {
                    signal.done();
                } else {
                    signal.fail(format!("unexpected body {}", response.response()));
                }
            },
            move |error| {
                unsubscribe(&on_error_slot);
                on_error.fail(error.to_string());
            },
        );
    let _ = slot.set(subscription.clone());

    completion.wait(WAIT).await?;
    assert!(subscription.is_closed());
    server.teardown().await?;
    Ok(())
}

#[tokio::test]
async fn should_resolve_with_some_data_when_status_201_typed() -> Result<()> {
    init_tracing();
    let server = MockServer::setup().await?;

    server.post(
        "/api/user",
        MockResponse::new()
            .status(StatusCode::CREATED)
            .reason("Created")
            .body("{\"data\":{\"id\":\"abc-123\"}}"),
    );

    let (signal, completion) = done();
    let on_error = signal.clone();
    let slot = SubscriptionSlot::default();
    let (on_next_slot, on_error_slot) = (slot.clone(), slot.clone());
    let subscription = server
        .ajax()
        .ajax(create_user(&serde_json::json!({ "name": "John" }).to_string()))
        .try_map(|response| response.json::<CreatedUser>())
        .subscribe(
            move |user| {
                unsubscribe(&on_next_slot);
                let expected = CreatedUser {
                    data: UserId {
                        id: "abc-123".to_string(),
                    },
                };
                if user == expected {
                    signal.done();
                } else {
                    signal.fail(format!("unexpected user {user:?}"));
                }
            },
            move |error| {
                unsubscribe(&on_error_slot);
                on_error.fail(error.to_string());
            },
        );
    let _ = slot.set(subscription.clone());

    completion.wait(WAIT).await?;
    assert!(subscription.is_closed());
    server.teardown().await?;
    Ok(())
}

#[tokio::test]
async fn should_reject_with_an_error_when_status_400() -> Result<()> {
    init_tracing();
    let server = MockServer::setup().await?;

    server.post(
        "/api/user",
        MockResponse::new()
            .status(StatusCode::BAD_REQUEST)
            .reason("Bad Request")
            .body("{\"error\":\"A user named \\\"John\\\" already exists.\"}"),
    );

    let (signal, completion) = done();
    let on_error = signal.clone();
    let slot = SubscriptionSlot::default();
    let on_error_slot = slot.clone();
    let subscription = server
        .ajax()
        .ajax(create_user(&serde_json::json!({ "name": "John" }).to_string()))
        .subscribe(
            move |_response| signal.fail("Unexpected"),
            move |error| {
                unsubscribe(&on_error_slot);
                if error.status() == Some(StatusCode::BAD_REQUEST) {
                    on_error.done();
                } else {
                    on_error.fail(format!("unexpected error {error}"));
                }
            },
        );
    let _ = slot.set(subscription.clone());

    completion.wait(WAIT).await?;
    assert!(subscription.is_closed());
    server.teardown().await?;
    Ok(())
}
