//! 会话/消息仓储服务
//!
//! 对 DAO 的 CRUD 门面：建会话、追加消息、回放历史、
//! 最近会话列表、清空消息、删除会话。每次调用拿一次锁、
//! 跑一个事务范围，返回前释放。

use crate::database::dao::ChatDao;
use crate::database::DbConnection;
use crate::error::{StoreError, StoreResult};
use crate::models::{
    now_timestamp, MessageRecord, SessionDescriptor, SessionRecord, SourceType, SummaryStatus,
};

/// 单个后端默认的会话列表上限
pub const SESSION_LIST_LIMIT: u32 = 20;

#[derive(Clone)]
pub struct ChatService {
    db: DbConnection,
    kind: SourceType,
}

impl ChatService {
    pub fn new(db: DbConnection, kind: SourceType) -> Self {
        Self { db, kind }
    }

    pub fn kind(&self) -> SourceType {
        self.kind
    }

    fn conn(&self) -> StoreResult<std::sync::MutexGuard<'_, rusqlite::Connection>> {
        self.db.lock().map_err(|_| StoreError::Poisoned)
    }

    /// 建新会话；`session_id` 已存在时返回 `Duplicate`，原行保持不变
    pub fn create_session(
        &self,
        session_id: &str,
        descriptor: &SessionDescriptor,
    ) -> StoreResult<SessionRecord> {
        debug_assert_eq!(descriptor.source_type(), self.kind);
        let conn = self.conn()?;
        if ChatDao::get_session(&conn, self.kind, session_id)?.is_some() {
            return Err(StoreError::Duplicate(session_id.to_string()));
        }
        ChatDao::insert_session(&conn, session_id, descriptor, &now_timestamp())?;
        let created = ChatDao::get_session(&conn, self.kind, session_id)?
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;
        tracing::debug!("[ChatService] Created {} session {}", self.kind, session_id);
        Ok(created)
    }

    pub fn session(&self, session_id: &str) -> StoreResult<Option<SessionRecord>> {
        let conn = self.conn()?;
        Ok(ChatDao::get_session(&conn, self.kind, session_id)?)
    }

    /// 无条件插入一条消息，时间戳由服务端分配；
    /// 不校验会话是否存在（与存储 schema 一致，外键只是逻辑上的）
    pub fn add_message(&self, session_id: &str, role: &str, content: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        ChatDao::insert_message(&conn, session_id, role, content, &now_timestamp())?;
        Ok(())
    }

    /// 按时间升序回放会话消息；没有消息时返回空列表而非错误
    pub fn session_messages(&self, session_id: &str) -> StoreResult<Vec<MessageRecord>> {
        let conn = self.conn()?;
        Ok(ChatDao::messages_for(&conn, session_id)?)
    }

    /// 最近会话，按创建时间倒序，最多 `limit` 条
    pub fn recent_sessions(&self, limit: u32) -> StoreResult<Vec<SessionRecord>> {
        let conn = self.conn()?;
        Ok(ChatDao::recent_sessions(&conn, self.kind, limit)?)
    }

    /// 清空会话消息，保留会话行本身；会话不存在时返回 `NotFound`
    pub fn clear_messages(&self, session_id: &str) -> StoreResult<u64> {
        let conn = self.conn()?;
        if ChatDao::get_session(&conn, self.kind, session_id)?.is_none() {
            return Err(StoreError::NotFound(session_id.to_string()));
        }
        let deleted = ChatDao::delete_messages(&conn, session_id)?;
        tracing::info!(
            "[ChatService] Cleared {} messages for session {}",
            deleted,
            session_id
        );
        Ok(deleted as u64)
    }

    /// 删除会话及其全部消息，单个事务内先删消息再删会话行
    pub fn delete_session(&self, session_id: &str) -> StoreResult<()> {
        let mut conn = self.conn()?;
        if ChatDao::get_session(&conn, self.kind, session_id)?.is_none() {
            return Err(StoreError::NotFound(session_id.to_string()));
        }
        let tx = conn.transaction()?;
        let messages = ChatDao::delete_messages(&tx, session_id)?;
        ChatDao::delete_session_row(&tx, session_id)?;
        tx.commit()?;
        tracing::info!(
            "[ChatService] Deleted session {} and {} messages",
            session_id,
            messages
        );
        Ok(())
    }

    pub fn set_content(&self, session_id: &str, content: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        if ChatDao::set_content(&conn, session_id, content)? == 0 {
            return Err(StoreError::NotFound(session_id.to_string()));
        }
        Ok(())
    }

    pub fn session_content(&self, session_id: &str) -> StoreResult<Option<String>> {
        let conn = self.conn()?;
        match ChatDao::get_content(&conn, session_id)? {
            Some(content) => Ok(content),
            None => Err(StoreError::NotFound(session_id.to_string())),
        }
    }

    pub fn set_summary(
        &self,
        session_id: &str,
        summary: Option<&str>,
        status: SummaryStatus,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        if ChatDao::set_summary(&conn, session_id, summary, status)? == 0 {
            return Err(StoreError::NotFound(session_id.to_string()));
        }
        Ok(())
    }

    pub fn summary(&self, session_id: &str) -> StoreResult<(Option<String>, SummaryStatus)> {
        let conn = self.conn()?;
        ChatDao::get_summary(&conn, session_id)?
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))
    }

    /// 健康检查用：跑一条最小查询确认存储可用
    pub fn ping(&self) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }
}
