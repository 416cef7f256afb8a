//! 存储抽象层
//!
//! 定义对话历史、提醒、健康记录、紧急记录、紧急联系人与用户资料的统一接口，支持 SQLite 与内存两种实现。
//! 所有调用都以同一个不透明的用户标识作为归属键。

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::core::StoreError;
use crate::memory::{Message, Role};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// 一条对话历史（只追加）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub user_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl HistoryRecord {
    pub fn to_message(&self) -> Message {
        Message {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: i64,
    pub user_id: String,
    pub text: String,
    pub due_at: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub id: i64,
    pub user_id: String,
    pub parameter: String,
    pub value: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyRecord {
    pub id: i64,
    pub user_id: String,
    pub category: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub phone_number: String,
    pub relationship: Option<String>,
}

/// 新建紧急联系人的参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContact {
    pub name: String,
    pub phone_number: String,
    pub relationship: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub age: Option<u32>,
    pub city: Option<String>,
}

/// 对话历史存储
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, user_id: &str, role: Role, content: &str) -> StoreResult<i64>;

    /// 写入一轮对话（先 user 后 assistant）；支持事务的实现应保证两条要么都写入要么都不写入
    async fn append_turn(
        &self,
        user_id: &str,
        user_message: &str,
        assistant_reply: &str,
    ) -> StoreResult<()> {
        self.append(user_id, Role::User, user_message).await?;
        self.append(user_id, Role::Assistant, assistant_reply).await?;
        Ok(())
    }

    /// 最近 limit 条，按时间升序（最旧在前）
    async fn recent(&self, user_id: &str, limit: usize) -> StoreResult<Vec<HistoryRecord>>;
}

#[async_trait]
pub trait ReminderStore: Send + Sync {
    async fn create_reminder(
        &self,
        user_id: &str,
        text: &str,
        due_at: DateTime<FixedOffset>,
    ) -> StoreResult<i64>;

    /// 按到期时间降序
    async fn reminders(&self, user_id: &str) -> StoreResult<Vec<Reminder>>;
}

#[async_trait]
pub trait HealthStore: Send + Sync {
    async fn create_health_record(
        &self,
        user_id: &str,
        parameter: &str,
        value: &str,
        recorded_at: DateTime<Utc>,
    ) -> StoreResult<i64>;

    /// 最新在前
    async fn health_records(&self, user_id: &str) -> StoreResult<Vec<HealthRecord>>;
}

#[async_trait]
pub trait EmergencyStore: Send + Sync {
    async fn create_emergency(
        &self,
        user_id: &str,
        category: &str,
        note: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> StoreResult<i64>;

    /// 最新在前
    async fn emergencies(&self, user_id: &str) -> StoreResult<Vec<EmergencyRecord>>;
}

#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn add_contact(&self, user_id: &str, contact: NewContact) -> StoreResult<i64>;

    async fn contacts(&self, user_id: &str) -> StoreResult<Vec<EmergencyContact>>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn upsert_profile(&self, profile: &UserProfile) -> StoreResult<()>;

    /// 不存在时返回 None，不视为错误
    async fn profile(&self, username: &str) -> StoreResult<Option<UserProfile>>;
}

/// 编排器依赖的全部存储句柄
#[derive(Clone)]
pub struct Stores {
    pub history: Arc<dyn HistoryStore>,
    pub reminders: Arc<dyn ReminderStore>,
    pub health: Arc<dyn HealthStore>,
    pub emergencies: Arc<dyn EmergencyStore>,
    pub contacts: Arc<dyn ContactStore>,
    pub profiles: Arc<dyn ProfileStore>,
}

impl Stores {
    /// 同一个实现同时充当所有存储
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: HistoryStore
            + ReminderStore
            + HealthStore
            + EmergencyStore
            + ContactStore
            + ProfileStore
            + 'static,
    {
        Self {
            history: store.clone(),
            reminders: store.clone(),
            health: store.clone(),
            emergencies: store.clone(),
            contacts: store.clone(),
            profiles: store,
        }
    }
}
