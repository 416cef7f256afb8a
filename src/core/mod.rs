//! 核心编排层：错误、轮次阶段、对话编排器与构建器

pub mod builder;
pub mod error;
pub mod orchestrator;
pub mod state;

pub use builder::{create_assistant, AssistantBuilder};
pub use error::{StoreError, TurnError};
pub use orchestrator::{TurnOrchestrator, TurnRequest, TurnResponse};
pub use state::{TurnPhase, TurnProgress};
