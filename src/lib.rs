//! SeniorAssist - 面向老年用户的对话助手后端
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、轮次阶段、对话编排器与构建器
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **memory**: 对话消息与上下文窗口
//! - **classifier**: 意图 / 情绪分类、提示词与结果缓存
//! - **temporal**: 时间表达式提取（Duckling）
//! - **store**: 历史、提醒、健康、紧急记录、联系人与用户资料的持久化
//! - **integrations**: 天气、新闻、短信
//! - **dispatch**: 按意图执行动作
//! - **api**: HTTP 接口（feature = "server"）

#[cfg(feature = "server")]
pub mod api;
pub mod classifier;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod integrations;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod store;
pub mod temporal;

pub use crate::core::{AssistantBuilder, TurnOrchestrator, TurnRequest, TurnResponse};
