use ajaxmock::common::{create_test_server_with_limit, init_tracing};
use ajaxmock::{AjaxError, AjaxRequest, MockError, MockRequest, MockResponse, MockServer, ajax};
use color_eyre::eyre::{Context, Result};
use http::{Method, StatusCode};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_test::{assert_err, assert_ok};
use tracing::info;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct User {
    id: u32,
    name: String,
}

#[tokio::test]
async fn test_get_json_round_trip() -> Result<()> {
    init_tracing();
    let server = MockServer::setup().await?;
    let mock = server.get(
        "/api/user/1",
        MockResponse::new().json(&User {
            id: 1,
            name: "John".to_string(),
        })?,
    );

    let user: User = server
        .ajax()
        .get_json("/api/user/1")
        .first()
        .await
        .context("Failed to fetch user")?;

    assert_eq!(
        user,
        User {
            id: 1,
            name: "John".to_string()
        }
    );
    assert_eq!(mock.hits(), 1);
    server.teardown().await?;
    Ok(())
}

#[tokio::test]
async fn test_json_request_body_reaches_handler() -> Result<()> {
    init_tracing();
    let server = MockServer::setup().await?;
    server.put(
        Regex::new(r"^/api/user/\d+$")?,
        |req: &MockRequest, res: MockResponse| {
            let user: User = req.json().unwrap_or(User {
                id: 0,
                name: String::new(),
            });
            res.status(StatusCode::ACCEPTED).body(user.name)
        },
    );

    let request = AjaxRequest::put("/api/user/7").json(&User {
        id: 7,
        name: "Jane".to_string(),
    })?;
    let response = server.ajax().ajax(request).first().await?;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(response.response(), "Jane");

    let received = server.received_requests();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].method(), &Method::PUT);
    assert_eq!(received[0].header("content-type"), Some("application/json"));
    server.teardown().await?;
    Ok(())
}

#[tokio::test]
async fn test_unmatched_request_is_not_found() -> Result<()> {
    init_tracing();
    let server = MockServer::setup().await?;
    server.post("/api/user", MockResponse::new());

    let result = server.ajax().get("/api/user").first().await;
    let error = assert_err!(result);

    assert_eq!(error.status(), Some(StatusCode::NOT_FOUND));
    assert_eq!(server.unmatched_requests().len(), 1);
    server.teardown().await?;
    Ok(())
}

#[tokio::test]
async fn test_handler_assertion_fails_teardown() -> Result<()> {
    init_tracing();
    let server = MockServer::setup().await?;
    server.post("/api/user", |req: &MockRequest, res: MockResponse| {
        assert_eq!(req.body(), "{\"foo\":\"bar\"}");
        res
    });

    let error = assert_err!(
        server
            .ajax()
            .ajax(AjaxRequest::post("/api/user").body("{}"))
            .first()
            .await
    );
    assert_eq!(error.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));

    let teardown = server.teardown().await;
    assert!(matches!(teardown, Err(MockError::Handler(_))));
    Ok(())
}

#[tokio::test]
async fn test_head_request_has_no_body() -> Result<()> {
    init_tracing();
    let server = MockServer::setup().await?;
    server.head("/health", MockResponse::new().body("ignored"));

    let response = server
        .ajax()
        .ajax(AjaxRequest::new(Method::HEAD, "/health"))
        .first()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.response().is_empty());
    server.teardown().await?;
    Ok(())
}

#[tokio::test]
async fn test_request_timeout() -> Result<()> {
    init_tracing();
    // Accepts connections but never answers
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let holder = tokio::spawn(async move {
        let mut sockets = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            sockets.push(socket);
        }
    });

    let request =
        AjaxRequest::get(format!("http://{addr}/slow")).timeout(Duration::from_millis(100));
    let error = assert_err!(ajax(request).first().await);

    assert!(matches!(error, AjaxError::Timeout(_)));
    holder.abort();
    Ok(())
}

#[tokio::test]
async fn test_free_ajax_with_absolute_url() -> Result<()> {
    init_tracing();
    let server = MockServer::setup().await?;
    server.get("/ping", MockResponse::new().body("pong"));

    let response = assert_ok!(ajax(AjaxRequest::get(server.url("/ping"))).first().await);

    assert_eq!(response.response(), "pong");
    server.teardown().await?;
    Ok(())
}

#[tokio::test]
async fn test_relative_url_without_base_is_invalid() -> Result<()> {
    let error = assert_err!(ajax(AjaxRequest::get("/api/user")).first().await);

    assert!(matches!(error, AjaxError::InvalidUrl { .. }));
    Ok(())
}

#[tokio::test]
async fn test_connection_limit() -> Result<()> {
    init_tracing();
    let server = create_test_server_with_limit(1).await?;
    server.get("/ping", MockResponse::new().body("pong"));

    // Hold the only connection slot open
    let idle = TcpStream::connect(server.address()).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let request = AjaxRequest::get("/ping").timeout(Duration::from_secs(1));
    let rejected = server.ajax().ajax(request).first().await;
    info!(?rejected, "Request over the connection limit");
    assert!(rejected.is_err());

    drop(idle);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let response = server.ajax().get("/ping").first().await?;
    assert_eq!(response.response(), "pong");
    server.teardown().await?;
    Ok(())
}

#[tokio::test]
async fn test_teardown_stops_server() -> Result<()> {
    init_tracing();
    let server = MockServer::setup().await?;
    let addr = server.address();
    server.teardown().await?;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(TcpStream::connect(addr).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_servers_are_isolated() -> Result<()> {
    init_tracing();
    let first = MockServer::setup().await?;
    let second = MockServer::setup().await?;
    first.get("/who", MockResponse::new().body("first"));
    second.get("/who", MockResponse::new().body("second"));

    let first_ajax = first.ajax();
    let second_ajax = second.ajax();
    let first_req = first_ajax.get("/who");
    let second_req = second_ajax.get("/who");
    let (a, b) = tokio::join!(first_req.first(), second_req.first());

    assert_eq!(a?.response(), "first");
    assert_eq!(b?.response(), "second");
    first.teardown().await?;
    second.teardown().await?;
    Ok(())
}

#[tokio::test]
async fn test_mock_registered_with_absolute_url() -> Result<()> {
    init_tracing();
    let server = MockServer::setup().await?;
    let mock = server.post(
        server.url("/api/user"),
        MockResponse::new().status(StatusCode::CREATED),
    );

    let response = server.ajax().post("/api/user", "{}").first().await?;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(mock.hits(), 1);
    server.teardown().await?;
    Ok(())
}
