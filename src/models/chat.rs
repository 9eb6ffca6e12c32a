use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// 会话来源类型，决定后端与 schema 变体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    #[serde(rename = "PDF")]
    Pdf,
    #[serde(rename = "URL")]
    Url,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Pdf => "PDF",
            SourceType::Url => "URL",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 后端相关的会话描述符
///
/// PDF 后端存储文档名，URL 后端存储地址和标题。
#[derive(Debug, Clone)]
pub enum SessionDescriptor {
    Pdf {
        pdf_name: Option<String>,
    },
    Url {
        url: Option<String>,
        title: Option<String>,
    },
}

impl SessionDescriptor {
    pub fn source_type(&self) -> SourceType {
        match self {
            SessionDescriptor::Pdf { .. } => SourceType::Pdf,
            SessionDescriptor::Url { .. } => SourceType::Url,
        }
    }
}

/// 摘要生成状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStatus {
    Pending,
    Ready,
    Failed,
}

impl SummaryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryStatus::Pending => "pending",
            SummaryStatus::Ready => "ready",
            SummaryStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> SummaryStatus {
        match s {
            "ready" => SummaryStatus::Ready,
            "failed" => SummaryStatus::Failed,
            _ => SummaryStatus::Pending,
        }
    }
}

/// sessions 表的一行
#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord {
    #[serde(skip_serializing)]
    pub id: i64,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub created_at: String,
}

/// messages 表的一行（对外只暴露 role/content/timestamp）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub role: String,
    pub content: String,
    pub timestamp: String,
}

/// 会话列表接口的 wire 格式，两个后端共用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pdf_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl From<SessionRecord> for SessionSummary {
    fn from(r: SessionRecord) -> Self {
        SessionSummary {
            session_id: r.session_id,
            pdf_name: r.pdf_name,
            url: r.url,
            title: r.title,
            created_at: Some(r.created_at),
        }
    }
}

/// 当前时间的 RFC 3339 表示，固定微秒精度
///
/// 固定宽度保证字典序与时间序一致，消息回放直接按该列排序。
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ---- API 请求/响应类型 ----

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub messages: Vec<MessageRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionSummary>,
}

/// PDF 后端 /summarize 请求，文本抽取在上游完成
#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    pub session_id: Option<String>,
    pub pdf_name: Option<String>,
    pub text: String,
}

/// URL 后端 /summarize-url 请求
#[derive(Debug, Deserialize)]
pub struct SummarizeUrlRequest {
    pub url: String,
    pub title: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummarizeResponse {
    pub session_id: String,
    pub status: SummaryStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryStatusResponse {
    pub status: SummaryStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub summary: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_is_lexicographically_ordered() {
        let a = now_timestamp();
        let b = now_timestamp();
        assert!(a <= b);
        assert_eq!(a.len(), b.len());
    }

    #[test]
    fn test_session_summary_omits_absent_fields() {
        let s = SessionSummary {
            session_id: "s1".into(),
            pdf_name: Some("report.pdf".into()),
            url: None,
            title: None,
            created_at: Some("2024-01-01T00:00:00.000000Z".into()),
        };
        let json = serde_json::to_value(&s).unwrap();
        assert!(json.get("url").is_none());
        assert_eq!(json["pdf_name"], "report.pdf");
    }

    #[test]
    fn test_source_type_serde() {
        assert_eq!(serde_json::to_string(&SourceType::Pdf).unwrap(), "\"PDF\"");
        let t: SourceType = serde_json::from_str("\"URL\"").unwrap();
        assert_eq!(t, SourceType::Url);
    }
}
