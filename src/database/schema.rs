use rusqlite::Connection;

use crate::models::SourceType;

pub fn create_tables(conn: &Connection, kind: SourceType) -> Result<(), rusqlite::Error> {
    // Sessions 表，按后端变体携带不同描述字段
    match kind {
        SourceType::Pdf => {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS sessions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    session_id TEXT NOT NULL UNIQUE,
                    pdf_name TEXT,
                    content TEXT,
                    summary TEXT,
                    summary_status TEXT,
                    created_at TEXT NOT NULL
                )",
                [],
            )?;
        }
        SourceType::Url => {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS sessions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    session_id TEXT NOT NULL UNIQUE,
                    url TEXT,
                    title TEXT,
                    content TEXT,
                    summary TEXT,
                    summary_status TEXT,
                    created_at TEXT NOT NULL
                )",
                [],
            )?;
        }
    }

    // Messages 表，两个变体结构一致；session_id 只是逻辑外键
    conn.execute(
        "CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            timestamp TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_messages_session
            ON messages(session_id, timestamp)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_created
            ON sessions(created_at DESC)",
        [],
    )?;

    Ok(())
}
