//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / DeepSeek / Mock）实现 LlmClient：complete（自由文本）、complete_structured（要求返回单个 JSON 文档）。

use async_trait::async_trait;

use crate::memory::Message;

/// LLM 客户端 trait；错误以字符串返回，由调用方决定降级策略
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;

    /// 结构化完成：要求模型只输出一个 JSON 对象。
    /// 默认退化为 complete，由提示词约束格式；支持 JSON 模式的后端应覆盖
    async fn complete_structured(&self, messages: &[Message]) -> Result<String, String> {
        self.complete(messages).await
    }
}
