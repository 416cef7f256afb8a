//! 短期记忆：对话历史窗口
//!
//! 保留最近 N 条消息（oldest first），超出时自动剪枝，供意图分类的上下文使用。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致，序列化为小写）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 短期记忆：最近 max_messages 条消息，按时间升序
#[derive(Clone, Debug)]
pub struct ConversationMemory {
    messages: Vec<Message>,
    max_messages: usize,
}

impl ConversationMemory {
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_messages,
        }
    }

    /// 用已有历史构建窗口，只保留尾部 max_messages 条
    pub fn from_history(history: impl IntoIterator<Item = Message>, max_messages: usize) -> Self {
        let mut memory = Self::new(max_messages);
        memory.messages = history.into_iter().collect();
        memory.prune();
        memory
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// 超出 max_messages 时丢弃最旧的消息
    fn prune(&mut self) {
        if self.messages.len() > self.max_messages {
            let drop = self.messages.len() - self.max_messages;
            self.messages.drain(..drop);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_keeps_most_recent() {
        let memory =
            ConversationMemory::from_history((0..5).map(|i| Message::user(format!("m{}", i))), 3);
        let contents: Vec<_> = memory.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn test_from_history_truncates_head() {
        let history = vec![
            Message::user("hola"),
            Message::assistant("¡Hola! ¿Cómo está?"),
            Message::user("bien"),
        ];
        let memory = ConversationMemory::from_history(history, 2);
        assert_eq!(memory.messages().len(), 2);
        assert_eq!(memory.messages()[0].role, Role::Assistant);
    }

    #[test]
    fn test_role_round_trip_str() {
        assert_eq!("Assistant".parse::<Role>().unwrap(), Role::Assistant);
        assert_eq!(Role::User.to_string(), "user");
        assert!("tool".parse::<Role>().is_err());
    }

    #[test]
    fn test_message_serializes_lowercase_role() {
        let json = serde_json::to_string(&Message::user("hola")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hola"}"#);
    }
}
