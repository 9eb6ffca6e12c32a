//! 存储层错误类型
//!
//! 仓储操作不再把所有失败折叠成 bool：调用方可以区分
//! 「不存在」「重复创建」和真正的存储故障。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session {0} not found")]
    NotFound(String),

    #[error("session {0} already exists")]
    Duplicate(String),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;
