//! URL 内容抓取
//!
//! URL 后端在请求方没有附带正文时，拉取页面并做最简化的
//! 标题/文本抽取。真正的正文抽取属于外部协作者，这里只到
//! 「去标签 + 收敛空白」为止。

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static SCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub title: Option<String>,
    pub text: String,
}

/// 抓取页面并抽取 `<title>` 与正文文本
pub async fn fetch_page(client: &reqwest::Client, url: &str) -> Result<FetchedPage, FetchError> {
    let response = client
        .get(url)
        .timeout(std::time::Duration::from_secs(30))
        .send()
        .await
        .map_err(|e| classify(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.text().await.map_err(|e| classify(url, e))?;
    Ok(extract(&body))
}

fn classify(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            source: e,
        }
    }
}

fn extract(html: &str) -> FetchedPage {
    let title = TITLE_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| WS_RE.replace_all(m.as_str().trim(), " ").into_owned())
        .filter(|t| !t.is_empty());

    let stripped = SCRIPT_RE.replace_all(html, " ");
    let stripped = TAG_RE.replace_all(&stripped, " ");
    let text = WS_RE.replace_all(stripped.trim(), " ").into_owned();

    FetchedPage { title, text }
}
