//! 数据库模块
//!
//! 每个后端持有自己的 SQLite 文件；连接通过 `DbConnection`
//! 在服务间共享，一次调用一个事务。

pub mod dao;
pub mod schema;

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::models::SourceType;

pub type DbConnection = Arc<Mutex<Connection>>;

/// 打开（必要时创建）后端数据库并建表
pub fn open_database(path: &Path, kind: SourceType) -> Result<DbConnection, rusqlite::Error> {
    let conn = Connection::open(path)?;
    // journal_mode 返回一行结果，走 query_row 而不是 execute
    conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    schema::create_tables(&conn, kind)?;
    tracing::info!("[Database] Opened {} store at {:?}", kind, path);
    Ok(Arc::new(Mutex::new(conn)))
}

/// 测试用内存数据库
pub fn open_in_memory(kind: SourceType) -> Result<DbConnection, rusqlite::Error> {
    let conn = Connection::open_in_memory()?;
    schema::create_tables(&conn, kind)?;
    Ok(Arc::new(Mutex::new(conn)))
}
