pub mod chat;

pub use chat::{
    now_timestamp, ChatRequest, ChatResponse, HistoryResponse, MessageRecord, SessionDescriptor,
    SessionRecord, SessionSummary, SessionsResponse, SourceType, SummarizeRequest,
    SummarizeResponse, SummarizeUrlRequest, SummaryStatus, SummaryStatusResponse,
};
