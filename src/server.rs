//! HTTP API 服务器
//!
//! 两个后端共用同一套路由骨架：/chat、/history、/sessions、
//! /session 删除，外加各自的 summarize 入口。除 /health 外
//! 全部路由要求 X-API-Key。

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use subtle::ConstantTimeEq;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    ChatRequest, ChatResponse, HistoryResponse, SessionDescriptor, SessionSummary,
    SessionsResponse, SourceType, SummarizeRequest, SummarizeResponse, SummarizeUrlRequest,
    SummaryStatus, SummaryStatusResponse,
};
use crate::providers::Responder;
use crate::services::chat_service::{ChatService, SESSION_LIST_LIMIT};
use crate::services::page_fetcher;

#[derive(Clone)]
pub struct AppState {
    pub api_key: String,
    pub service: ChatService,
    pub responder: Arc<dyn Responder>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(api_key: &str, service: ChatService, responder: Arc<dyn Responder>) -> Self {
        Self {
            api_key: api_key.to_string(),
            service,
            responder,
            http: reqwest::Client::new(),
        }
    }
}

fn api_key_matches(provided_key: &str, expected_key: &str) -> bool {
    provided_key
        .as_bytes()
        .ct_eq(expected_key.as_bytes())
        .into()
}

fn verify_api_key(
    headers: &HeaderMap,
    expected_key: &str,
) -> Result<(), (StatusCode, Json<serde_json::Value>)> {
    let auth = headers
        .get("x-api-key")
        .or_else(|| headers.get("authorization"))
        .and_then(|v| v.to_str().ok());

    let key = match auth {
        Some(s) if s.starts_with("Bearer ") => &s[7..],
        Some(s) => s,
        None => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({"error": {"message": "No API key provided"}})),
            ))
        }
    };

    if !api_key_matches(key, expected_key) {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": {"message": "Invalid API key"}})),
        ));
    }

    Ok(())
}

fn error_json(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({"error": {"message": message}})),
    )
        .into_response()
}

fn store_error_response(e: StoreError) -> Response {
    match &e {
        StoreError::NotFound(id) => {
            error_json(StatusCode::NOT_FOUND, &format!("Session {} not found", id))
        }
        StoreError::Duplicate(id) => error_json(
            StatusCode::CONFLICT,
            &format!("Session {} already exists", id),
        ),
        StoreError::Sqlite(_) | StoreError::Poisoned => {
            tracing::error!("[Server] Store failure: {}", e);
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "Internal storage error")
        }
    }
}

// ---- 通用路由 ----

#[derive(Debug, serde::Serialize)]
struct CheckResult {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mut checks = HashMap::new();
    let db_check = match state.service.ping() {
        Ok(()) => CheckResult {
            status: "healthy".to_string(),
            message: None,
        },
        Err(e) => CheckResult {
            status: "unhealthy".to_string(),
            message: Some(e.to_string()),
        },
    };
    checks.insert("database", db_check);

    let healthy = checks.values().all(|c| c.status == "healthy");
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status_code,
        Json(serde_json::json!({
            "status": if healthy { "healthy" } else { "unhealthy" },
            "backend": state.service.kind().as_str(),
            "checks": checks,
        })),
    )
}

async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Response {
    if let Err(e) = verify_api_key(&headers, &state.api_key) {
        tracing::warn!("[Server] Unauthorized request to /chat");
        return e.into_response();
    }

    match state.service.session(&request.session_id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_json(
                StatusCode::NOT_FOUND,
                &format!("Session {} not found", request.session_id),
            )
        }
        Err(e) => return store_error_response(e),
    }

    if let Err(e) = state
        .service
        .add_message(&request.session_id, "user", &request.message)
    {
        return store_error_response(e);
    }

    let context = match state.service.session_content(&request.session_id) {
        Ok(content) => content.unwrap_or_default(),
        Err(e) => return store_error_response(e),
    };
    let history = match state.service.session_messages(&request.session_id) {
        Ok(messages) => messages,
        Err(e) => return store_error_response(e),
    };

    let answer = match state
        .responder
        .answer(&context, &history, &request.message)
        .await
    {
        Ok(answer) => answer,
        Err(e) => {
            tracing::error!("[Server] Responder failed for {}: {}", request.session_id, e);
            return error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate a response",
            );
        }
    };

    if let Err(e) = state
        .service
        .add_message(&request.session_id, "assistant", &answer)
    {
        return store_error_response(e);
    }

    Json(ChatResponse { response: answer }).into_response()
}

async fn history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Response {
    if let Err(e) = verify_api_key(&headers, &state.api_key) {
        return e.into_response();
    }
    // 未知会话返回空列表而不是错误，与消息表只存逻辑外键一致
    match state.service.session_messages(&session_id) {
        Ok(messages) => Json(HistoryResponse {
            session_id,
            messages,
        })
        .into_response(),
        Err(e) => store_error_response(e),
    }
}

async fn clear_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Response {
    if let Err(e) = verify_api_key(&headers, &state.api_key) {
        return e.into_response();
    }
    match state.service.clear_messages(&session_id) {
        Ok(deleted) => Json(serde_json::json!({
            "status": "cleared",
            "deleted": deleted,
        }))
        .into_response(),
        Err(e) => store_error_response(e),
    }
}

async fn delete_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Response {
    if let Err(e) = verify_api_key(&headers, &state.api_key) {
        return e.into_response();
    }
    match state.service.delete_session(&session_id) {
        Ok(()) => Json(serde_json::json!({"status": "deleted"})).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// 缓存穿透参数：接受但忽略，存储层没有需要绕过的缓存
#[derive(Debug, serde::Deserialize)]
struct SessionListQuery {
    #[allow(dead_code)]
    cache_buster: Option<String>,
    #[allow(dead_code)]
    force_refresh: Option<String>,
}

async fn list_sessions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(_query): Query<SessionListQuery>,
) -> Response {
    if let Err(e) = verify_api_key(&headers, &state.api_key) {
        return e.into_response();
    }
    // 列表接口保持「失败返回空列表」的对外契约，存储错误只记日志
    let sessions = match state.service.recent_sessions(SESSION_LIST_LIMIT) {
        Ok(sessions) => sessions,
        Err(e) => {
            tracing::error!("[Server] Failed to list sessions: {}", e);
            Vec::new()
        }
    };
    Json(SessionsResponse {
        sessions: sessions.into_iter().map(SessionSummary::from).collect(),
    })
    .into_response()
}

async fn summary_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Response {
    if let Err(e) = verify_api_key(&headers, &state.api_key) {
        return e.into_response();
    }
    match state.service.summary(&session_id) {
        Ok((summary, status)) => Json(SummaryStatusResponse { status, summary }).into_response(),
        Err(e) => store_error_response(e),
    }
}

// ---- 摘要入口 ----

/// 后台生成摘要：完成后写回状态并作为 assistant 消息入会话
fn spawn_summary_task(state: &AppState, session_id: String, text: String) {
    let service = state.service.clone();
    let responder = state.responder.clone();
    tokio::spawn(async move {
        match responder.summarize(&text).await {
            Ok(summary) => {
                if let Err(e) =
                    service.set_summary(&session_id, Some(&summary), SummaryStatus::Ready)
                {
                    tracing::error!("[Server] Failed to store summary for {}: {}", session_id, e);
                    return;
                }
                if let Err(e) = service.add_message(&session_id, "assistant", &summary) {
                    tracing::error!(
                        "[Server] Failed to append summary message for {}: {}",
                        session_id,
                        e
                    );
                }
                tracing::info!("[Server] Summary ready for session {}", session_id);
            }
            Err(e) => {
                tracing::warn!("[Server] Summarization failed for {}: {}", session_id, e);
                let _ = service.set_summary(&session_id, None, SummaryStatus::Failed);
            }
        }
    });
}

/// PDF 后端：文本抽取在上游完成，这里收 text 建会话并排队摘要。
/// 带已知 session_id 时复用会话并替换文档内容。
async fn summarize_pdf(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SummarizeRequest>,
) -> Response {
    if let Err(e) = verify_api_key(&headers, &state.api_key) {
        return e.into_response();
    }

    let session_id = request
        .session_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let exists = match state.service.session(&session_id) {
        Ok(existing) => existing.is_some(),
        Err(e) => return store_error_response(e),
    };
    if !exists {
        let descriptor = SessionDescriptor::Pdf {
            pdf_name: request.pdf_name.clone(),
        };
        if let Err(e) = state.service.create_session(&session_id, &descriptor) {
            return store_error_response(e);
        }
    }

    if let Err(e) = state.service.set_content(&session_id, &request.text) {
        return store_error_response(e);
    }
    if let Err(e) = state
        .service
        .set_summary(&session_id, None, SummaryStatus::Pending)
    {
        return store_error_response(e);
    }

    spawn_summary_task(&state, session_id.clone(), request.text);
    tracing::info!(
        "[Server] Queued summary for PDF session {} ({:?})",
        session_id,
        request.pdf_name
    );
    Json(SummarizeResponse {
        session_id,
        status: SummaryStatus::Pending,
    })
    .into_response()
}

/// URL 后端：每个 URL 都开新会话；正文缺失时现场抓取
async fn summarize_url(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SummarizeUrlRequest>,
) -> Response {
    if let Err(e) = verify_api_key(&headers, &state.api_key) {
        return e.into_response();
    }

    let (title, text) = match request.text {
        Some(text) => (request.title, text),
        None => match page_fetcher::fetch_page(&state.http, &request.url).await {
            Ok(page) => (request.title.or(page.title), page.text),
            Err(e) => {
                tracing::warn!("[Server] Failed to fetch {}: {}", request.url, e);
                return error_json(
                    StatusCode::BAD_GATEWAY,
                    &format!("Failed to fetch URL: {}", e),
                );
            }
        },
    };

    let session_id = Uuid::new_v4().to_string();
    let descriptor = SessionDescriptor::Url {
        url: Some(request.url.clone()),
        title: title.clone(),
    };
    if let Err(e) = state.service.create_session(&session_id, &descriptor) {
        return store_error_response(e);
    }
    if let Err(e) = state.service.set_content(&session_id, &text) {
        return store_error_response(e);
    }

    spawn_summary_task(&state, session_id.clone(), text);
    tracing::info!(
        "[Server] Created URL session {} for {}",
        session_id,
        request.url
    );
    Json(SummarizeResponse {
        session_id,
        status: SummaryStatus::Pending,
    })
    .into_response()
}

// ---- 组装与启动 ----

pub fn build_router(state: AppState) -> Router {
    let kind = state.service.kind();
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/history/:session_id", get(history))
        .route("/history/:session_id", delete(clear_history))
        .route("/session/:session_id", delete(delete_session))
        .route("/sessions", get(list_sessions))
        .route("/summary/:session_id", get(summary_status));

    app = match kind {
        SourceType::Pdf => app.route("/summarize", post(summarize_pdf)),
        SourceType::Url => app.route("/summarize-url", post(summarize_url)),
    };

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(
    state: AppState,
    host: &str,
    port: u16,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let kind = state.service.kind();
    let app = build_router(state);

    let addr: std::net::SocketAddr = format!("{host}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("[Server] {} backend listening on {}", kind, addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("[Server] Shutdown signal received");
        })
        .await?;

    Ok(())
}
