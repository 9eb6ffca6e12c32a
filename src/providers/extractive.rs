//! 抽取式默认 Responder
//!
//! 摘要取文档开头若干句；问答按关键词重合度挑最相关的段落。

use async_trait::async_trait;

use super::{Responder, ResponderError};
use crate::models::MessageRecord;

/// 摘要的最大字符数
const DEFAULT_SUMMARY_CHARS: usize = 600;

pub struct ExtractiveResponder {
    max_summary_chars: usize,
}

impl Default for ExtractiveResponder {
    fn default() -> Self {
        Self {
            max_summary_chars: DEFAULT_SUMMARY_CHARS,
        }
    }
}

impl ExtractiveResponder {
    pub fn new(max_summary_chars: usize) -> Self {
        Self { max_summary_chars }
    }

    /// 在句边界处截断，避免摘要停在半句话中间
    fn leading_sentences(&self, text: &str) -> String {
        let trimmed = text.trim();
        let chars: Vec<char> = trimmed.chars().collect();
        if chars.len() <= self.max_summary_chars {
            return trimmed.to_string();
        }
        let head: String = chars[..self.max_summary_chars].iter().collect();
        let mut cut = None;
        for (i, ch) in head.char_indices() {
            if matches!(ch, '.' | '!' | '?' | '。' | '！' | '？') {
                cut = Some(i + ch.len_utf8());
            }
        }
        match cut {
            Some(pos) => head[..pos].to_string(),
            None => format!("{}...", head.trim_end()),
        }
    }

    fn keywords(question: &str) -> Vec<String> {
        question
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 3)
            .map(|w| w.to_lowercase())
            .collect()
    }
}

#[async_trait]
impl Responder for ExtractiveResponder {
    async fn summarize(&self, text: &str) -> Result<String, ResponderError> {
        if text.trim().is_empty() {
            return Err(ResponderError::Provider(
                "document has no extractable text".to_string(),
            ));
        }
        Ok(self.leading_sentences(text))
    }

    async fn answer(
        &self,
        context: &str,
        _history: &[MessageRecord],
        question: &str,
    ) -> Result<String, ResponderError> {
        let keywords = Self::keywords(question);
        let best = context
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| {
                let lower = p.to_lowercase();
                let hits = keywords.iter().filter(|k| lower.contains(k.as_str())).count();
                (hits, p)
            })
            .max_by_key(|(hits, _)| *hits);

        match best {
            Some((hits, paragraph)) if hits > 0 => Ok(self.leading_sentences(paragraph)),
            _ => Ok(
                "I could not find a relevant passage in the document for that question."
                    .to_string(),
            ),
        }
    }
}
