//! 内存存储（测试与无数据库运行时使用）
//!
//! 可通过 set_fail_writes 模拟存储故障：开启后所有写操作返回 StoreError::Unavailable。

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use tokio::sync::Mutex;

use super::{
    ContactStore, EmergencyContact, EmergencyRecord, EmergencyStore, HealthRecord, HealthStore,
    HistoryRecord, HistoryStore, NewContact, ProfileStore, Reminder, ReminderStore, StoreResult,
    UserProfile,
};
use crate::core::StoreError;
use crate::memory::Role;

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    history: Vec<HistoryRecord>,
    reminders: Vec<Reminder>,
    health: Vec<HealthRecord>,
    emergencies: Vec<EmergencyRecord>,
    contacts: Vec<EmergencyContact>,
    profiles: Vec<UserProfile>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 开启后所有写操作失败，用于模拟数据库不可用
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }

    /// 全部用户的历史条数（测试断言用）
    pub async fn history_len(&self) -> usize {
        self.state.lock().await.history.len()
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn append(&self, user_id: &str, role: Role, content: &str) -> StoreResult<i64> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.history.push(HistoryRecord {
            id,
            user_id: user_id.to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn append_turn(
        &self,
        user_id: &str,
        user_message: &str,
        assistant_reply: &str,
    ) -> StoreResult<()> {
        self.check_writable()?;
        // 持锁写两条，保证不会与其它轮次交错
        let mut state = self.state.lock().await;
        let now = Utc::now();
        for (role, content) in [(Role::User, user_message), (Role::Assistant, assistant_reply)] {
            let id = state.next_id();
            state.history.push(HistoryRecord {
                id,
                user_id: user_id.to_string(),
                role,
                content: content.to_string(),
                created_at: now,
            });
        }
        Ok(())
    }

    async fn recent(&self, user_id: &str, limit: usize) -> StoreResult<Vec<HistoryRecord>> {
        let state = self.state.lock().await;
        let mut records: Vec<HistoryRecord> = state
            .history
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .take(limit)
            .cloned()
            .collect();
        records.reverse();
        Ok(records)
    }
}

#[async_trait]
impl ReminderStore for MemoryStore {
    async fn create_reminder(
        &self,
        user_id: &str,
        text: &str,
        due_at: DateTime<FixedOffset>,
    ) -> StoreResult<i64> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.reminders.push(Reminder {
            id,
            user_id: user_id.to_string(),
            text: text.to_string(),
            due_at,
        });
        Ok(id)
    }

    async fn reminders(&self, user_id: &str) -> StoreResult<Vec<Reminder>> {
        let state = self.state.lock().await;
        let mut found: Vec<Reminder> = state
            .reminders
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.due_at.cmp(&a.due_at));
        Ok(found)
    }
}

#[async_trait]
impl HealthStore for MemoryStore {
    async fn create_health_record(
        &self,
        user_id: &str,
        parameter: &str,
        value: &str,
        recorded_at: DateTime<Utc>,
    ) -> StoreResult<i64> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.health.push(HealthRecord {
            id,
            user_id: user_id.to_string(),
            parameter: parameter.to_string(),
            value: value.to_string(),
            recorded_at,
        });
        Ok(id)
    }

    async fn health_records(&self, user_id: &str) -> StoreResult<Vec<HealthRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .health
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EmergencyStore for MemoryStore {
    async fn create_emergency(
        &self,
        user_id: &str,
        category: &str,
        note: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> StoreResult<i64> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.emergencies.push(EmergencyRecord {
            id,
            user_id: user_id.to_string(),
            category: category.to_string(),
            note: note.map(str::to_string),
            created_at,
        });
        Ok(id)
    }

    async fn emergencies(&self, user_id: &str) -> StoreResult<Vec<EmergencyRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .emergencies
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ContactStore for MemoryStore {
    async fn add_contact(&self, user_id: &str, contact: NewContact) -> StoreResult<i64> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.contacts.push(EmergencyContact {
            id,
            user_id: user_id.to_string(),
            name: contact.name,
            phone_number: contact.phone_number,
            relationship: contact.relationship,
        });
        Ok(id)
    }

    async fn contacts(&self, user_id: &str) -> StoreResult<Vec<EmergencyContact>> {
        let state = self.state.lock().await;
        Ok(state
            .contacts
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn upsert_profile(&self, profile: &UserProfile) -> StoreResult<()> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        match state.profiles.iter_mut().find(|p| p.username == profile.username) {
            Some(existing) => *existing = profile.clone(),
            None => state.profiles.push(profile.clone()),
        }
        Ok(())
    }

    async fn profile(&self, username: &str) -> StoreResult<Option<UserProfile>> {
        let state = self.state.lock().await;
        Ok(state.profiles.iter().find(|p| p.username == username).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fail_writes_blocks_all_writes() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        assert!(store.append_turn("ana", "hola", "¡Hola!").await.is_err());
        assert!(store
            .create_emergency("ana", "x", None, Utc::now())
            .await
            .is_err());
        assert_eq!(store.history_len().await, 0);

        store.set_fail_writes(false);
        store.append_turn("ana", "hola", "¡Hola!").await.unwrap();
        assert_eq!(store.history_len().await, 2);
    }

    #[tokio::test]
    async fn test_recent_filters_by_user() {
        let store = MemoryStore::new();
        store.append("ana", Role::User, "a1").await.unwrap();
        store.append("beto", Role::User, "b1").await.unwrap();
        store.append("ana", Role::Assistant, "a2").await.unwrap();

        let recent = store.recent("ana", 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "a1");
        assert_eq!(recent[1].content, "a2");
    }
}
