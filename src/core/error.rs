//! 错误类型
//!
//! StoreError：持久化层（SQLite / 内存）失败；TurnError：一轮对话整体失败，对外只表现为一个不透明的内部错误。
//! 上游服务（LLM、Duckling、天气、新闻、短信）的失败不在此列，它们在调用处降级为默认值。

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store lock poisoned: {0}")]
    Lock(String),

    #[error("Store task failed: {0}")]
    Task(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum TurnError {
    #[error("message cannot be empty")]
    EmptyMessage,

    #[error("user identity is required")]
    MissingUser,

    #[error("storage failure: {0}")]
    Store(#[from] StoreError),
}

impl TurnError {
    /// 输入错误（调用方可修正）与内部错误的区分，供 HTTP 层映射 4xx / 5xx
    pub fn is_client_error(&self) -> bool {
        matches!(self, TurnError::EmptyMessage | TurnError::MissingUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(TurnError::EmptyMessage.to_string(), "message cannot be empty");
        let err = TurnError::from(StoreError::Unavailable("disk full".to_string()));
        assert_eq!(err.to_string(), "storage failure: Store unavailable: disk full");
        assert!(!err.is_client_error());
        assert!(TurnError::EmptyMessage.is_client_error());
    }
}
