//! Mock LLM 客户端（用于测试与无 API Key 的本地运行）
//!
//! - MockLlmClient：按关键词给出固定分类 JSON，便于本地跑通整条对话流程
//! - ScriptedLlmClient：按预设脚本依次返回结果并记录调用次数，供测试断言

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::memory::{Message, Role};

/// Mock 客户端：根据最后一条 User 消息的关键词猜测意图
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("");
        let lower = last_user.to_lowercase();

        let (intent, emotion) = if lower.contains("ayuda") || lower.contains("me caí") {
            ("EMERGENCIA", "Urgencia")
        } else if lower.contains("recuérdame") || lower.contains("recordatorio") {
            ("RECORDATORIO", "Neutra")
        } else if lower.contains("presión") || lower.contains("duele") {
            ("SALUD", "Preocupacion")
        } else if lower.contains("clima") || lower.contains("noticias") {
            ("INFORMACION", "Neutra")
        } else {
            ("CONVERSACION_GENERAL", "Neutra")
        };

        Ok(serde_json::json!({
            "intencion": intent,
            "emocion": emotion,
            "respuesta": format!("(mock) Entendido: {}", last_user),
        })
        .to_string())
    }
}

/// 脚本客户端：依次弹出预设结果；脚本耗尽后重复最后一条
#[derive(Debug)]
pub struct ScriptedLlmClient {
    script: Mutex<VecDeque<Result<String, String>>>,
    last: Mutex<Option<Result<String, String>>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlmClient {
    pub fn new(script: impl IntoIterator<Item = Result<String, String>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// 总是返回同一条结果
    pub fn always(response: Result<String, String>) -> Self {
        Self::new([response])
    }

    /// 已发生的模型调用次数
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 每次调用收到的完整消息列表
    pub fn seen_messages(&self) -> Vec<Vec<Message>> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(messages.to_vec());
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        let mut last = self.last.lock().map_err(|e| e.to_string())?;
        match next {
            Some(result) => {
                *last = Some(result.clone());
                result
            }
            None => last
                .clone()
                .unwrap_or_else(|| Err("script exhausted".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_guesses_emergency() {
        let out = MockLlmClient
            .complete(&[Message::user("¡Ayuda, me caí!")])
            .await
            .unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["intencion"], "EMERGENCIA");
    }

    #[tokio::test]
    async fn test_scripted_repeats_last_and_counts() {
        let llm = ScriptedLlmClient::new([Ok("a".to_string()), Err("down".to_string())]);
        assert_eq!(llm.complete(&[]).await, Ok("a".to_string()));
        assert_eq!(llm.complete(&[]).await, Err("down".to_string()));
        assert_eq!(llm.complete(&[]).await, Err("down".to_string()));
        assert_eq!(llm.calls(), 3);
    }
}
