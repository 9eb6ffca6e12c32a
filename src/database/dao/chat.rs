//! 会话与消息的 DAO
//!
//! 静态方法直接操作 `&Connection`，事务边界由上层 service 决定。

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::{MessageRecord, SessionDescriptor, SessionRecord, SourceType, SummaryStatus};

pub struct ChatDao;

impl ChatDao {
    fn session_from_row(row: &Row<'_>, kind: SourceType) -> Result<SessionRecord, rusqlite::Error> {
        match kind {
            SourceType::Pdf => Ok(SessionRecord {
                id: row.get(0)?,
                session_id: row.get(1)?,
                pdf_name: row.get(2)?,
                url: None,
                title: None,
                created_at: row.get(3)?,
            }),
            SourceType::Url => Ok(SessionRecord {
                id: row.get(0)?,
                session_id: row.get(1)?,
                pdf_name: None,
                url: row.get(2)?,
                title: row.get(3)?,
                created_at: row.get(4)?,
            }),
        }
    }

    fn session_columns(kind: SourceType) -> &'static str {
        match kind {
            SourceType::Pdf => "id, session_id, pdf_name, created_at",
            SourceType::Url => "id, session_id, url, title, created_at",
        }
    }

    pub fn get_session(
        conn: &Connection,
        kind: SourceType,
        session_id: &str,
    ) -> Result<Option<SessionRecord>, rusqlite::Error> {
        let sql = format!(
            "SELECT {} FROM sessions WHERE session_id = ?1",
            Self::session_columns(kind)
        );
        conn.query_row(&sql, params![session_id], |row| {
            Self::session_from_row(row, kind)
        })
        .optional()
    }

    pub fn insert_session(
        conn: &Connection,
        session_id: &str,
        descriptor: &SessionDescriptor,
        created_at: &str,
    ) -> Result<(), rusqlite::Error> {
        match descriptor {
            SessionDescriptor::Pdf { pdf_name } => conn.execute(
                "INSERT INTO sessions (session_id, pdf_name, summary_status, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![session_id, pdf_name, SummaryStatus::Pending.as_str(), created_at],
            )?,
            SessionDescriptor::Url { url, title } => conn.execute(
                "INSERT INTO sessions (session_id, url, title, summary_status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![session_id, url, title, SummaryStatus::Pending.as_str(), created_at],
            )?,
        };
        Ok(())
    }

    pub fn recent_sessions(
        conn: &Connection,
        kind: SourceType,
        limit: u32,
    ) -> Result<Vec<SessionRecord>, rusqlite::Error> {
        let sql = format!(
            "SELECT {} FROM sessions ORDER BY created_at DESC LIMIT ?1",
            Self::session_columns(kind)
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit], |row| Self::session_from_row(row, kind))?;
        rows.collect()
    }

    pub fn delete_session_row(
        conn: &Connection,
        session_id: &str,
    ) -> Result<usize, rusqlite::Error> {
        conn.execute(
            "DELETE FROM sessions WHERE session_id = ?1",
            params![session_id],
        )
    }

    pub fn insert_message(
        conn: &Connection,
        session_id: &str,
        role: &str,
        content: &str,
        timestamp: &str,
    ) -> Result<(), rusqlite::Error> {
        conn.execute(
            "INSERT INTO messages (session_id, role, content, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![session_id, role, content, timestamp],
        )?;
        Ok(())
    }

    /// 按时间升序取回会话消息，id 作并列时的次序键
    pub fn messages_for(
        conn: &Connection,
        session_id: &str,
    ) -> Result<Vec<MessageRecord>, rusqlite::Error> {
        let mut stmt = conn.prepare(
            "SELECT role, content, timestamp FROM messages
             WHERE session_id = ?1 ORDER BY timestamp ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            Ok(MessageRecord {
                role: row.get(0)?,
                content: row.get(1)?,
                timestamp: row.get(2)?,
            })
        })?;
        rows.collect()
    }

    pub fn delete_messages(conn: &Connection, session_id: &str) -> Result<usize, rusqlite::Error> {
        conn.execute(
            "DELETE FROM messages WHERE session_id = ?1",
            params![session_id],
        )
    }

    pub fn set_content(
        conn: &Connection,
        session_id: &str,
        content: &str,
    ) -> Result<usize, rusqlite::Error> {
        conn.execute(
            "UPDATE sessions SET content = ?2 WHERE session_id = ?1",
            params![session_id, content],
        )
    }

    pub fn get_content(
        conn: &Connection,
        session_id: &str,
    ) -> Result<Option<Option<String>>, rusqlite::Error> {
        conn.query_row(
            "SELECT content FROM sessions WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )
        .optional()
    }

    pub fn set_summary(
        conn: &Connection,
        session_id: &str,
        summary: Option<&str>,
        status: SummaryStatus,
    ) -> Result<usize, rusqlite::Error> {
        conn.execute(
            "UPDATE sessions SET summary = ?2, summary_status = ?3 WHERE session_id = ?1",
            params![session_id, summary, status.as_str()],
        )
    }

    pub fn get_summary(
        conn: &Connection,
        session_id: &str,
    ) -> Result<Option<(Option<String>, SummaryStatus)>, rusqlite::Error> {
        conn.query_row(
            "SELECT summary, summary_status FROM sessions WHERE session_id = ?1",
            params![session_id],
            |row| {
                let summary: Option<String> = row.get(0)?;
                let status: Option<String> = row.get(1)?;
                Ok((
                    summary,
                    SummaryStatus::parse(status.as_deref().unwrap_or("pending")),
                ))
            },
        )
        .optional()
    }
}
