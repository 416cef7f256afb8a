//! 记忆层：对话消息与分类时使用的短期上下文窗口

pub mod conversation;

pub use conversation::{ConversationMemory, Message, Role};
