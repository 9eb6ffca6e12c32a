//! 路由级集成测试：鉴权、会话生命周期、摘要状态

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use docchat::database::open_in_memory;
use docchat::models::{
    ChatResponse, HistoryResponse, SessionsResponse, SummarizeResponse, SummaryStatus,
    SummaryStatusResponse,
};
use docchat::providers::ExtractiveResponder;
use docchat::server::{build_router, AppState};
use docchat::services::ChatService;
use docchat::SourceType;

const TEST_KEY: &str = "test-key";

fn pdf_app() -> axum::Router {
    let db = open_in_memory(SourceType::Pdf).unwrap();
    let service = ChatService::new(db, SourceType::Pdf);
    let state = AppState::new(TEST_KEY, service, Arc::new(ExtractiveResponder::default()));
    build_router(state)
}

fn url_app() -> axum::Router {
    let db = open_in_memory(SourceType::Url).unwrap();
    let service = ChatService::new(db, SourceType::Url);
    let state = AppState::new(TEST_KEY, service, Arc::new(ExtractiveResponder::default()));
    build_router(state)
}

fn request(method: &str, uri: &str, key: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = key {
        builder = builder.header("X-API-Key", key);
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_missing_api_key_is_rejected() {
    let app = pdf_app();
    let response = app
        .oneshot(request("GET", "/sessions", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_api_key_is_rejected() {
    let app = pdf_app();
    let response = app
        .oneshot(request("GET", "/sessions", Some("wrong"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_needs_no_key() {
    let app = pdf_app();
    let response = app
        .oneshot(request("GET", "/health", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_chat_with_unknown_session_is_404() {
    let app = pdf_app();
    let body = serde_json::json!({"session_id": "ghost", "message": "hello"});
    let response = app
        .oneshot(request("POST", "/chat", Some(TEST_KEY), Some(body)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pdf_session_lifecycle() {
    let app = pdf_app();

    // 上传：建会话 + 排队摘要
    let body = serde_json::json!({
        "pdf_name": "report.pdf",
        "text": "Rust is a systems language. SQLite is an embedded database.",
    });
    let response = app
        .clone()
        .oneshot(request("POST", "/summarize", Some(TEST_KEY), Some(body)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let created: SummarizeResponse = json_body(response).await;
    let sid = created.session_id.clone();
    assert_eq!(created.status, SummaryStatus::Pending);

    // 后台摘要任务是即时的抽取实现，轮询等它落库
    let mut ready = false;
    for _ in 0..100 {
        let response = app
            .clone()
            .oneshot(request(
                "GET",
                &format!("/summary/{}", sid),
                Some(TEST_KEY),
                None,
            ))
            .await
            .unwrap();
        let status: SummaryStatusResponse = json_body(response).await;
        if status.status == SummaryStatus::Ready {
            assert!(status.summary.is_some());
            ready = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(ready, "summary never became ready");

    // 聊天：user + assistant 两条都会入库
    let body = serde_json::json!({"session_id": sid, "message": "what is sqlite?"});
    let response = app
        .clone()
        .oneshot(request("POST", "/chat", Some(TEST_KEY), Some(body)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let chat: ChatResponse = json_body(response).await;
    assert!(!chat.response.is_empty());

    let response = app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/history/{}", sid),
            Some(TEST_KEY),
            None,
        ))
        .await
        .unwrap();
    let history: HistoryResponse = json_body(response).await;
    // 摘要 assistant 消息 + user + assistant
    assert_eq!(history.messages.len(), 3);
    assert!(history
        .messages
        .windows(2)
        .all(|w| w[0].timestamp <= w[1].timestamp));

    // 会话列表包含该会话
    let response = app
        .clone()
        .oneshot(request("GET", "/sessions", Some(TEST_KEY), None))
        .await
        .unwrap();
    let sessions: SessionsResponse = json_body(response).await;
    assert!(sessions.sessions.iter().any(|s| s.session_id == sid));

    // 清空历史保留会话
    let response = app
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/history/{}", sid),
            Some(TEST_KEY),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/history/{}", sid),
            Some(TEST_KEY),
            None,
        ))
        .await
        .unwrap();
    let history: HistoryResponse = json_body(response).await;
    assert!(history.messages.is_empty());

    // 删除会话后一切 404/空
    let response = app
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/session/{}", sid),
            Some(TEST_KEY),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/session/{}", sid),
            Some(TEST_KEY),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(request("GET", "/sessions", Some(TEST_KEY), None))
        .await
        .unwrap();
    let sessions: SessionsResponse = json_body(response).await;
    assert!(sessions.sessions.iter().all(|s| s.session_id != sid));
}

#[tokio::test]
async fn test_clear_history_for_unknown_session_is_404() {
    let app = pdf_app();
    let response = app
        .oneshot(request("DELETE", "/history/ghost", Some(TEST_KEY), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sessions_accepts_cache_params() {
    let app = pdf_app();
    let response = app
        .oneshot(request(
            "GET",
            "/sessions?cache_buster=123&force_refresh=true",
            Some(TEST_KEY),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let sessions: SessionsResponse = json_body(response).await;
    assert!(sessions.sessions.is_empty());
}

#[tokio::test]
async fn test_url_backend_creates_fresh_session_with_inline_text() {
    let app = url_app();
    let body = serde_json::json!({
        "url": "https://example.com/article",
        "title": "An Example Article",
        "text": "Example body text. It has sentences.",
    });
    let response = app
        .clone()
        .oneshot(request("POST", "/summarize-url", Some(TEST_KEY), Some(body.clone())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let first: SummarizeResponse = json_body(response).await;

    // 同一 URL 再来一次永远是新会话
    let response = app
        .clone()
        .oneshot(request("POST", "/summarize-url", Some(TEST_KEY), Some(body)))
        .await
        .unwrap();
    let second: SummarizeResponse = json_body(response).await;
    assert_ne!(first.session_id, second.session_id);

    let response = app
        .oneshot(request("GET", "/sessions", Some(TEST_KEY), None))
        .await
        .unwrap();
    let sessions: SessionsResponse = json_body(response).await;
    assert_eq!(sessions.sessions.len(), 2);
    assert!(sessions
        .sessions
        .iter()
        .all(|s| s.url.as_deref() == Some("https://example.com/article")));
}
