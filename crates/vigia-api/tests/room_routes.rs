use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use vigia_core::{events::EventBus, AppState, ChatSettings};

struct TestContext {
    app: Router,
}

impl TestContext {
    async fn new() -> anyhow::Result<Self> {
        let db = vigia_db::create_pool("sqlite::memory:", 1).await?;
        vigia_db::run_migrations(&db).await?;
        let state = AppState {
            db,
            event_bus: EventBus::default(),
            chat: ChatSettings::default(),
        };
        let app = vigia_api::build_router().with_state(state);
        Ok(Self { app })
    }

    async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> anyhow::Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = self.app.clone().oneshot(builder.body(body)?).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, value))
    }
}

#[tokio::test]
async fn health_responds_ok() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let (status, _) = ctx.request(Method::GET, "/health", None).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn neighborhoods_include_the_escape_option() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let (status, body) = ctx.request(Method::GET, "/api/neighborhoods", None).await?;
    assert_eq!(status, StatusCode::OK);
    let list = body.as_array().expect("array body");
    assert!(list.iter().any(|v| v.as_str() == Some("Centro")));
    assert_eq!(list.last().unwrap().as_str(), Some("Outro"));
    Ok(())
}

#[tokio::test]
async fn send_message_roundtrips_through_the_recent_window() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let (status, created) = ctx
        .request(
            Method::POST,
            "/api/messages",
            Some(json!({
                "sender_name": "Ana",
                "sender_neighborhood": "Centro",
                "content": "Ajuda no bairro"
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["sender_name"], "Ana");
    assert_eq!(created["content"], "Ajuda no bairro");

    let (status, body) = ctx.request(Method::GET, "/api/messages", None).await?;
    assert_eq!(status, StatusCode::OK);
    let list = body.as_array().expect("array body");
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], created["id"]);
    Ok(())
}

#[tokio::test]
async fn empty_message_content_is_rejected() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let (status, body) = ctx
        .request(
            Method::POST,
            "/api/messages",
            Some(json!({
                "sender_name": "Ana",
                "sender_neighborhood": "Centro",
                "content": "   "
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("bad request"));

    let (_, list) = ctx.request(Method::GET, "/api/messages", None).await?;
    assert!(list.as_array().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn oversized_content_is_truncated_to_the_cap() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let content = "x".repeat(700);
    let (status, created) = ctx
        .request(
            Method::POST,
            "/api/messages",
            Some(json!({
                "sender_name": "Ana",
                "sender_neighborhood": "Centro",
                "content": content
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["content"].as_str().unwrap().chars().count(), 500);
    Ok(())
}

#[tokio::test]
async fn recent_window_clamps_the_limit_parameter() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    for i in 0..5 {
        ctx.request(
            Method::POST,
            "/api/messages",
            Some(json!({
                "sender_name": "Ana",
                "sender_neighborhood": "Centro",
                "content": format!("msg {i}")
            })),
        )
        .await?;
    }
    let (status, body) = ctx
        .request(Method::GET, "/api/messages?limit=2", None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 2);
    // Oldest-first within the capped window of newest messages.
    assert_eq!(list[0]["content"], "msg 3");
    assert_eq!(list[1]["content"], "msg 4");
    Ok(())
}

#[tokio::test]
async fn announce_withdraw_flow_updates_the_roster() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let (status, entry) = ctx
        .request(
            Method::POST,
            "/api/presence/announce",
            Some(json!({
                "session_id": "s1",
                "display_name": "Ana",
                "neighborhood": "Centro"
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["session_id"], "s1");

    // Announcing again refreshes rather than duplicating.
    ctx.request(
        Method::POST,
        "/api/presence/announce",
        Some(json!({
            "session_id": "s1",
            "display_name": "Ana",
            "neighborhood": "Centro"
        })),
    )
    .await?;

    let (_, roster) = ctx.request(Method::GET, "/api/online", None).await?;
    assert_eq!(roster.as_array().unwrap().len(), 1);

    let (status, _) = ctx
        .request(
            Method::POST,
            "/api/presence/withdraw",
            Some(json!({ "session_id": "s1" })),
        )
        .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, roster) = ctx.request(Method::GET, "/api/online", None).await?;
    assert!(roster.as_array().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn announce_rejects_blank_session_id() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let (status, _) = ctx
        .request(
            Method::POST,
            "/api/presence/announce",
            Some(json!({
                "session_id": "  ",
                "display_name": "Ana",
                "neighborhood": "Centro"
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}
