//! LLM 层：客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）

pub mod deepseek;
pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{secret_or_env, AppConfig};

pub use deepseek::{create_deepseek_client, DEEPSEEK_CHAT};
pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::OpenAiClient;
pub use traits::LlmClient;

/// 根据配置与环境变量选择 LLM 后端（DeepSeek / OpenAI 兼容 / Mock）
///
/// 没有任何可用 Key 时退回 Mock，服务仍可启动。
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let timeout = Duration::from_secs(cfg.llm.timeouts.request);

    match provider.as_str() {
        "deepseek" => {
            if let Some(key) = secret_or_env(&cfg.llm.api_key, "DEEPSEEK_API_KEY") {
                let model = if cfg.llm.model.starts_with("deepseek") {
                    cfg.llm.model.as_str()
                } else {
                    DEEPSEEK_CHAT
                };
                tracing::info!("Using DeepSeek LLM ({})", model);
                return Arc::new(
                    create_deepseek_client(Some(model), Some(&key))
                        .with_temperature(cfg.llm.temperature)
                        .with_timeout(timeout),
                );
            }
        }
        "openai" => {
            if let Some(key) = secret_or_env(&cfg.llm.api_key, "OPENAI_API_KEY") {
                tracing::info!("Using OpenAI LLM ({})", cfg.llm.model);
                return Arc::new(
                    OpenAiClient::new(cfg.llm.base_url.as_deref(), &cfg.llm.model, Some(&key))
                        .with_temperature(cfg.llm.temperature)
                        .with_timeout(timeout),
                );
            }
        }
        "mock" => return Arc::new(MockLlmClient),
        other => tracing::warn!("Unknown LLM provider '{}'", other),
    }

    tracing::warn!("No API key set or provider unknown, using Mock LLM");
    Arc::new(MockLlmClient)
}
