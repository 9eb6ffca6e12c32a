//! 会话聚合
//!
//! 把两个后端各自的会话列表合成一份去重、按时间倒序、
//! 带新鲜度约束的视图。缓存是显式对象（数据 + 上次拉取
//! 时间 + 脏标记），刷新判定是独立的纯函数。

use std::collections::HashSet;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::client::{BackendClient, ClientError};
use crate::models::{SessionSummary, SourceType};

/// 缓存超过该时长即视为过期
pub const CACHE_TTL: Duration = Duration::from_secs(30);

/// 缺失 created_at 的占位时间，保证这类行排在最后
pub const MISSING_CREATED_AT: &str = "2000-01-01T00:00:00";

/// 标题/URL 的展示长度上限
const DISPLAY_TITLE_MAX: usize = 30;

/// 合并视图中的一条会话，仅存在于前端内存
#[derive(Debug, Clone, Serialize)]
pub struct SessionEntry {
    pub session_id: String,
    pub source_type: SourceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_title: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl SessionEntry {
    fn from_source(summary: SessionSummary, source: SourceType) -> Self {
        let display_title = match source {
            SourceType::Pdf => None,
            SourceType::Url => {
                let raw = summary
                    .title
                    .as_deref()
                    .filter(|t| !t.is_empty())
                    .or(summary.url.as_deref())
                    .unwrap_or("Unknown URL");
                Some(truncate_title(raw))
            }
        };
        SessionEntry {
            session_id: summary.session_id,
            source_type: source,
            display_title,
            created_at: summary
                .created_at
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| MISSING_CREATED_AT.to_string()),
            pdf_name: summary.pdf_name,
            url: summary.url,
            title: summary.title,
        }
    }
}

/// 字符安全截断：超过 30 字符取前 27 个加省略号
pub fn truncate_title(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= DISPLAY_TITLE_MAX {
        s.to_string()
    } else {
        let head: String = chars[..DISPLAY_TITLE_MAX - 3].iter().collect();
        format!("{}...", head)
    }
}

/// 刷新判定，纯函数：脏标记、从未拉取、或距上次拉取超过 TTL
pub fn should_refresh(now: Instant, last_fetch: Option<Instant>, dirty: bool) -> bool {
    if dirty {
        return true;
    }
    match last_fetch {
        None => true,
        Some(at) => now.duration_since(at) >= CACHE_TTL,
    }
}

/// 显式缓存对象，取代散落在 UI 状态里的全局可变数据
#[derive(Default)]
pub struct SessionCache {
    entries: Option<Vec<SessionEntry>>,
    last_fetch: Option<Instant>,
    dirty: bool,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 变更型操作（上传、URL 处理、删除）之后调用
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn clear(&mut self) {
        self.entries = None;
        self.last_fetch = None;
        self.dirty = false;
    }

    fn fresh_entries(&self, now: Instant, force_refresh: bool) -> Option<&Vec<SessionEntry>> {
        if force_refresh || should_refresh(now, self.last_fetch, self.dirty) {
            return None;
        }
        self.entries.as_ref()
    }

    fn store(&mut self, entries: Vec<SessionEntry>, now: Instant) {
        self.entries = Some(entries);
        self.last_fetch = Some(now);
        self.dirty = false;
    }
}

/// 一侧拉取失败时降级为空列表：部分结果优于整体失败
fn fetch_or_empty(
    result: Result<Vec<SessionSummary>, ClientError>,
    source: SourceType,
) -> Vec<SessionSummary> {
    match result {
        Ok(sessions) => sessions,
        Err(e) => {
            tracing::warn!("[SessionAggregator] Failed to fetch {} sessions: {}", source, e);
            Vec::new()
        }
    }
}

/// 合并两侧列表：打来源标记、补缺失时间戳、重写重复 id、倒序排序
///
/// 任何一行都不会被丢弃；跨后端撞车的 session_id 追加位置后缀，
/// 保证每条目可寻址（接受对标识符的外观性改写）。
pub fn merge_sessions(
    pdf: Vec<SessionSummary>,
    url: Vec<SessionSummary>,
) -> Vec<SessionEntry> {
    let mut all: Vec<SessionEntry> = pdf
        .into_iter()
        .map(|s| SessionEntry::from_source(s, SourceType::Pdf))
        .chain(
            url.into_iter()
                .map(|s| SessionEntry::from_source(s, SourceType::Url)),
        )
        .collect();

    let mut seen: HashSet<String> = HashSet::new();
    for i in 0..all.len() {
        if !seen.insert(all[i].session_id.clone()) {
            let rewritten = format!("{}_{}", all[i].session_id, i);
            tracing::warn!(
                "[SessionAggregator] Duplicate session ID {}, rewritten to {}",
                all[i].session_id,
                rewritten
            );
            all[i].session_id = rewritten;
        }
    }

    all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    all
}

/// 前端侧的聚合器：持有两个后端客户端和显式缓存
pub struct SessionAggregator {
    pdf: BackendClient,
    url: BackendClient,
    cache: SessionCache,
}

impl SessionAggregator {
    pub fn new(pdf: BackendClient, url: BackendClient) -> Self {
        Self {
            pdf,
            url,
            cache: SessionCache::new(),
        }
    }

    /// 合并后的会话列表
    ///
    /// 缓存命中且未过期时不发任何网络请求；否则并发拉取两侧，
    /// 失败的一侧按空列表处理。
    pub async fn sessions(&mut self, force_refresh: bool) -> Vec<SessionEntry> {
        let now = Instant::now();
        if let Some(cached) = self.cache.fresh_entries(now, force_refresh) {
            return cached.clone();
        }

        let (pdf_result, url_result) = tokio::join!(
            self.pdf.list_sessions(force_refresh),
            self.url.list_sessions(force_refresh),
        );

        let merged = merge_sessions(
            fetch_or_empty(pdf_result, SourceType::Pdf),
            fetch_or_empty(url_result, SourceType::Url),
        );
        tracing::debug!("[SessionAggregator] Refreshed {} sessions", merged.len());
        self.cache.store(merged.clone(), now);
        merged
    }

    /// 变更型操作后标记缓存需要刷新
    pub fn invalidate(&mut self) {
        self.cache.mark_dirty();
    }

    fn client_for(&self, source: SourceType) -> &BackendClient {
        match source {
            SourceType::Pdf => &self.pdf,
            SourceType::Url => &self.url,
        }
    }

    /// 删除会话：成功后就地摘除缓存条目并标脏
    pub async fn delete_session(
        &mut self,
        source: SourceType,
        session_id: &str,
    ) -> Result<(), ClientError> {
        self.client_for(source).delete_session(session_id).await?;
        if let Some(entries) = self.cache.entries.as_mut() {
            entries.retain(|e| e.session_id != session_id);
        }
        self.cache.mark_dirty();
        Ok(())
    }

    /// 清空会话历史，之后的列表视图可能变化，标脏
    pub async fn clear_history(
        &mut self,
        source: SourceType,
        session_id: &str,
    ) -> Result<(), ClientError> {
        self.client_for(source).clear_history(session_id).await?;
        self.cache.mark_dirty();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn summary(id: &str, created_at: Option<&str>) -> SessionSummary {
        SessionSummary {
            session_id: id.to_string(),
            pdf_name: None,
            url: None,
            title: None,
            created_at: created_at.map(|s| s.to_string()),
        }
    }

    #[test]
    fn test_should_refresh_truth_table() {
        let now = Instant::now();
        // 脏标记永远刷新
        assert!(should_refresh(now, Some(now), true));
        // 从未拉取过
        assert!(should_refresh(now, None, false));
        // 新鲜缓存
        assert!(!should_refresh(now, Some(now), false));
        // 过期缓存
        let old = now.checked_sub(CACHE_TTL + Duration::from_secs(1)).unwrap();
        assert!(should_refresh(now, Some(old), false));
    }

    #[test]
    fn test_merge_tags_sources_and_sorts_desc() {
        let merged = merge_sessions(
            vec![summary("p1", Some("2024-03-01T10:00:00"))],
            vec![summary("u1", Some("2024-03-02T10:00:00"))],
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].session_id, "u1");
        assert_eq!(merged[0].source_type, SourceType::Url);
        assert_eq!(merged[1].source_type, SourceType::Pdf);
    }

    #[test]
    fn test_merge_rewrites_duplicate_ids_without_dropping_rows() {
        let merged = merge_sessions(
            vec![summary("shared", Some("2024-03-02T10:00:00"))],
            vec![summary("shared", Some("2024-03-01T10:00:00"))],
        );
        assert_eq!(merged.len(), 2);
        let ids: HashSet<&str> = merged.iter().map(|e| e.session_id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("shared"));
        assert!(ids.contains("shared_1"));
    }

    #[test]
    fn test_merge_backfills_missing_created_at_to_sort_last() {
        let merged = merge_sessions(
            vec![summary("dated", Some("2024-03-01T10:00:00"))],
            vec![summary("undated", None), summary("empty", Some(""))],
        );
        assert_eq!(merged[0].session_id, "dated");
        assert!(merged[1..]
            .iter()
            .all(|e| e.created_at == MISSING_CREATED_AT));
    }

    #[test]
    fn test_url_display_title_prefers_title_then_url() {
        let mut with_title = summary("u1", None);
        with_title.title = Some("A readable page title".into());
        with_title.url = Some("https://example.com/long/path".into());
        let mut without_title = summary("u2", None);
        without_title.url =
            Some("https://example.com/a/very/long/path/that/keeps/going".into());

        let merged = merge_sessions(vec![], vec![with_title, without_title]);
        let u1 = merged.iter().find(|e| e.session_id == "u1").unwrap();
        let u2 = merged.iter().find(|e| e.session_id == "u2").unwrap();
        assert_eq!(u1.display_title.as_deref(), Some("A readable page title"));
        let t2 = u2.display_title.as_deref().unwrap();
        assert!(t2.starts_with("https://example.com/a/very/"));
        assert!(t2.ends_with("..."));
        assert_eq!(t2.chars().count(), 30);
    }

    #[test]
    fn test_pdf_rows_have_no_display_title() {
        let mut pdf = summary("p1", None);
        pdf.pdf_name = Some("quarterly-report.pdf".into());
        let merged = merge_sessions(vec![pdf], vec![]);
        assert!(merged[0].display_title.is_none());
        assert_eq!(merged[0].pdf_name.as_deref(), Some("quarterly-report.pdf"));
    }

    #[test]
    fn test_one_unreachable_source_still_yields_partial_results() {
        let ok = vec![summary("p1", Some("2024-03-01T10:00:00"))];
        let merged = merge_sessions(
            fetch_or_empty(Ok(ok), SourceType::Pdf),
            fetch_or_empty(Err(ClientError::Timeout), SourceType::Url),
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].session_id, "p1");
    }

    #[test]
    fn test_cache_store_and_dirty_cycle() {
        let mut cache = SessionCache::new();
        let now = Instant::now();
        assert!(cache.fresh_entries(now, false).is_none());

        cache.store(vec![], now);
        assert!(cache.fresh_entries(now, false).is_some());
        // 强制刷新绕过新鲜缓存
        assert!(cache.fresh_entries(now, true).is_none());

        cache.mark_dirty();
        assert!(cache.fresh_entries(now, false).is_none());
    }

    proptest! {
        #[test]
        fn prop_truncate_title_bounds(s in "\\PC*") {
            let out = truncate_title(&s);
            prop_assert!(out.chars().count() <= 30);
            if s.chars().count() <= 30 {
                prop_assert_eq!(out, s);
            } else {
                prop_assert!(out.ends_with("..."));
            }
        }

        #[test]
        fn prop_merge_preserves_row_count(pdf_n in 0usize..8, url_n in 0usize..8) {
            let pdf: Vec<_> = (0..pdf_n).map(|i| summary(&format!("s{}", i), None)).collect();
            // 与 PDF 侧刻意同名，制造跨源撞车
            let url: Vec<_> = (0..url_n).map(|i| summary(&format!("s{}", i), None)).collect();
            let merged = merge_sessions(pdf, url);
            prop_assert_eq!(merged.len(), pdf_n + url_n);
            let ids: HashSet<_> = merged.iter().map(|e| e.session_id.clone()).collect();
            prop_assert_eq!(ids.len(), pdf_n + url_n);
        }
    }
}
