//! 意图分类器：调用 LLM 得到意图、情绪与回复
//!
//! 调用前先查缓存；命中则直接返回，不调用模型。模型失败或输出无法解析时返回默认分类，且不写缓存。

pub mod cache;
pub mod intent;
pub mod prompt;

use std::sync::Arc;

use crate::llm::LlmClient;
use crate::memory::{ConversationMemory, Message};
use crate::temporal::TemporalExpression;

pub use cache::{CacheKey, ResponseCache};
pub use intent::{parse_classification, ClassificationResult, Emotion, Intent};
pub use prompt::{build_messages, UserContext, SYSTEM_PROMPT};

/// 默认历史窗口（条）
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

pub struct IntentClassifier {
    llm: Arc<dyn LlmClient>,
    cache: Arc<ResponseCache>,
    history_window: usize,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn LlmClient>, cache: Arc<ResponseCache>) -> Self {
        Self {
            llm,
            cache,
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn history_window(&self) -> usize {
        self.history_window
    }

    /// 分类一条消息；永不失败
    pub async fn classify(
        &self,
        message: &str,
        temporal: &[TemporalExpression],
        history: &[Message],
        user: &UserContext,
    ) -> Arc<ClassificationResult> {
        let window =
            ConversationMemory::from_history(history.iter().cloned(), self.history_window);
        let key =
            CacheKey::new(message, temporal, window.messages()).with_city(user.city.as_deref());

        if let Some(hit) = self.cache.get(&key).await {
            tracing::debug!(user = %user.identity, "classification served from cache");
            return hit;
        }

        let messages = build_messages(message, temporal, window.messages(), user);
        let raw = match self.llm.complete_structured(&messages).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(user = %user.identity, "LLM call failed: {}", e);
                return Arc::new(ClassificationResult::unavailable());
            }
        };

        match parse_classification(&raw) {
            Ok(result) => {
                let result = Arc::new(result);
                self.cache.insert(key, Arc::clone(&result)).await;
                result
            }
            Err(e) => {
                tracing::warn!(user = %user.identity, "LLM output not parsable: {}", e);
                Arc::new(ClassificationResult::unparsable())
            }
        }
    }
}
