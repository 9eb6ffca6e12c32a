//! 摘要/问答 Provider
//!
//! LLM 调用是外部协作者，这里只定义接缝：`Responder` 负责
//! 根据文档内容生成摘要和回答追问。默认实现是确定性的
//! 抽取式版本，便于离线运行和测试；真正的模型接入放在
//! 该 trait 后面即可。

pub mod extractive;

pub use extractive::ExtractiveResponder;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::MessageRecord;

#[derive(Debug, Error)]
pub enum ResponderError {
    #[error("provider error: {0}")]
    Provider(String),
}

#[async_trait]
pub trait Responder: Send + Sync {
    /// 为整篇文档生成摘要
    async fn summarize(&self, text: &str) -> Result<String, ResponderError>;

    /// 基于文档内容与历史消息回答一个问题
    async fn answer(
        &self,
        context: &str,
        history: &[MessageRecord],
        question: &str,
    ) -> Result<String, ResponderError>;
}
