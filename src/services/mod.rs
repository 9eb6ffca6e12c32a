pub mod chat_service;
pub mod page_fetcher;
pub mod session_aggregator;

pub use chat_service::{ChatService, SESSION_LIST_LIMIT};
pub use session_aggregator::{SessionAggregator, SessionCache, SessionEntry};
