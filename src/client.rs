//! 后端 API 客户端
//!
//! 前端侧对单个后端（PDF 或 URL）的 HTTP 访问。每类调用带
//! 自己的超时；强制刷新时附加 cache_buster / force_refresh
//! 查询参数，用于穿透任何中间层缓存。

use std::time::Duration;

use chrono::Utc;
use thiserror::Error;

use crate::models::{
    ChatResponse, HistoryResponse, MessageRecord, SessionSummary, SessionsResponse, SourceType,
};

const LIST_TIMEOUT: Duration = Duration::from_secs(5);
const HISTORY_TIMEOUT: Duration = Duration::from_secs(10);
const CHAT_TIMEOUT: Duration = Duration::from_secs(60);

/// 超时与其它传输错误分开上报，调用方的提示语不同
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request timed out")]
    Timeout,

    #[error("authentication failed: invalid API key")]
    Unauthorized,

    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Clone)]
pub struct BackendClient {
    source: SourceType,
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl BackendClient {
    pub fn new(source: SourceType, base_url: &str, api_key: &str) -> Self {
        Self {
            source,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn source(&self) -> SourceType {
        self.source
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ClientError::Unauthorized);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Status {
            status: status.as_u16(),
            body,
        })
    }

    fn classify(e: reqwest::Error) -> ClientError {
        if e.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::Transport(e)
        }
    }

    /// 拉取会话列表；`force_refresh` 时附加缓存穿透参数
    pub async fn list_sessions(
        &self,
        force_refresh: bool,
    ) -> Result<Vec<SessionSummary>, ClientError> {
        let mut request = self
            .http
            .get(self.url("/sessions"))
            .header("X-API-Key", &self.api_key)
            .timeout(LIST_TIMEOUT);
        if force_refresh {
            request = request.query(&[
                ("cache_buster", Utc::now().timestamp().to_string()),
                ("force_refresh", "true".to_string()),
            ]);
        }
        let response = Self::check(request.send().await.map_err(Self::classify)?).await?;
        let body: SessionsResponse = response.json().await.map_err(Self::classify)?;
        Ok(body.sessions)
    }

    pub async fn history(&self, session_id: &str) -> Result<Vec<MessageRecord>, ClientError> {
        let response = self
            .http
            .get(self.url(&format!("/history/{}", session_id)))
            .header("X-API-Key", &self.api_key)
            .timeout(HISTORY_TIMEOUT)
            .send()
            .await
            .map_err(Self::classify)?;
        let body: HistoryResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(Self::classify)?;
        Ok(body.messages)
    }

    pub async fn send_chat(&self, session_id: &str, message: &str) -> Result<String, ClientError> {
        let response = self
            .http
            .post(self.url("/chat"))
            .header("X-API-Key", &self.api_key)
            .timeout(CHAT_TIMEOUT)
            .json(&ChatRequestBody {
                session_id,
                message,
            })
            .send()
            .await
            .map_err(Self::classify)?;
        let body: ChatResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(Self::classify)?;
        Ok(body.response)
    }

    pub async fn clear_history(&self, session_id: &str) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(self.url(&format!("/history/{}", session_id)))
            .header("X-API-Key", &self.api_key)
            .timeout(HISTORY_TIMEOUT)
            .send()
            .await
            .map_err(Self::classify)?;
        Self::check(response).await?;
        Ok(())
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(self.url(&format!("/session/{}", session_id)))
            .header("X-API-Key", &self.api_key)
            .timeout(HISTORY_TIMEOUT)
            .send()
            .await
            .map_err(Self::classify)?;
        Self::check(response).await?;
        Ok(())
    }
}

/// 服务端的 `ChatRequest` 是反序列化类型，客户端用借用版本
#[derive(serde::Serialize)]
struct ChatRequestBody<'a> {
    session_id: &'a str,
    message: &'a str,
}
