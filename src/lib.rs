//! docchat：双后端文档/URL 问答服务
//!
//! PDF 与 URL 两个后端各自独立运行、各持一份 SQLite 存储；
//! 前端侧的 `SessionAggregator` 把两边的会话列表合成一份
//! 去重、按时间倒序的视图。

pub mod client;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod providers;
pub mod server;
pub mod services;

pub use client::{BackendClient, ClientError};
pub use config::Config;
pub use error::{StoreError, StoreResult};
pub use models::SourceType;
pub use server::{build_router, run_server, AppState};
pub use services::{ChatService, SessionAggregator};
