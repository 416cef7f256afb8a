//! SQLite 存储
//!
//! 单连接 + 互斥锁；每次访问在 spawn_blocking 中执行，避免阻塞异步运行时。
//! 时间以文本保存（提醒的到期时间保留原始时区）。一轮对话的两条历史在同一事务中提交。

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{
    ContactStore, EmergencyContact, EmergencyRecord, EmergencyStore, HealthRecord, HealthStore,
    HistoryRecord, HistoryStore, NewContact, ProfileStore, Reminder, ReminderStore, StoreResult,
    UserProfile,
};
use crate::core::StoreError;
use crate::memory::Role;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    username TEXT PRIMARY KEY,
    age INTEGER,
    city TEXT
);
CREATE TABLE IF NOT EXISTS conversation_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_history_user ON conversation_history(user_id);
CREATE TABLE IF NOT EXISTS reminders (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    text TEXT NOT NULL,
    due_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_reminders_user ON reminders(user_id);
CREATE TABLE IF NOT EXISTS health_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    parameter TEXT NOT NULL,
    value TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_health_user ON health_records(user_id);
CREATE TABLE IF NOT EXISTS emergencies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    category TEXT NOT NULL,
    note TEXT,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS emergency_contacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    name TEXT NOT NULL,
    phone_number TEXT NOT NULL,
    relationship TEXT
);
CREATE INDEX IF NOT EXISTS idx_contacts_user ON emergency_contacts(user_id);
";

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// 打开（或创建）数据库文件并建表；父目录不存在时自动创建
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn call<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|e| StoreError::Lock(e.to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn parse_role(raw: String) -> rusqlite::Result<Role> {
    raw.parse::<Role>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        )
    })
}

#[async_trait]
impl HistoryStore for SqliteStore {
    async fn append(&self, user_id: &str, role: Role, content: &str) -> StoreResult<i64> {
        let (user_id, content) = (user_id.to_string(), content.to_string());
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO conversation_history (user_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![user_id, role.as_str(), content, Utc::now()],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn append_turn(
        &self,
        user_id: &str,
        user_message: &str,
        assistant_reply: &str,
    ) -> StoreResult<()> {
        let (user_id, user_message, assistant_reply) = (
            user_id.to_string(),
            user_message.to_string(),
            assistant_reply.to_string(),
        );
        self.call(move |conn| {
            let tx = conn.transaction()?;
            let now = Utc::now();
            for (role, content) in [(Role::User, &user_message), (Role::Assistant, &assistant_reply)] {
                tx.execute(
                    "INSERT INTO conversation_history (user_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![user_id, role.as_str(), content, now],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn recent(&self, user_id: &str, limit: usize) -> StoreResult<Vec<HistoryRecord>> {
        let user_id = user_id.to_string();
        self.call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, role, content, created_at FROM conversation_history
                 WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
            )?;
            let mut records = stmt
                .query_map(params![user_id, limit as i64], |row| {
                    Ok(HistoryRecord {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        role: parse_role(row.get(2)?)?,
                        content: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            records.reverse();
            Ok(records)
        })
        .await
    }
}

#[async_trait]
impl ReminderStore for SqliteStore {
    async fn create_reminder(
        &self,
        user_id: &str,
        text: &str,
        due_at: DateTime<FixedOffset>,
    ) -> StoreResult<i64> {
        let (user_id, text) = (user_id.to_string(), text.to_string());
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO reminders (user_id, text, due_at) VALUES (?1, ?2, ?3)",
                params![user_id, text, due_at.to_rfc3339()],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn reminders(&self, user_id: &str) -> StoreResult<Vec<Reminder>> {
        let user_id = user_id.to_string();
        self.call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, text, due_at FROM reminders WHERE user_id = ?1",
            )?;
            let mut rows = stmt
                .query_map(params![user_id], |row| {
                    let raw: String = row.get(3)?;
                    let due_at = DateTime::parse_from_rfc3339(&raw).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            3,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?;
                    Ok(Reminder {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        text: row.get(2)?,
                        due_at,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            // 文本带不同时区偏移，只能按解析后的时刻排序
            rows.sort_by(|a, b| b.due_at.cmp(&a.due_at));
            Ok(rows)
        })
        .await
    }
}

#[async_trait]
impl HealthStore for SqliteStore {
    async fn create_health_record(
        &self,
        user_id: &str,
        parameter: &str,
        value: &str,
        recorded_at: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let (user_id, parameter, value) =
            (user_id.to_string(), parameter.to_string(), value.to_string());
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO health_records (user_id, parameter, value, recorded_at) VALUES (?1, ?2, ?3, ?4)",
                params![user_id, parameter, value, recorded_at],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn health_records(&self, user_id: &str) -> StoreResult<Vec<HealthRecord>> {
        let user_id = user_id.to_string();
        self.call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, parameter, value, recorded_at FROM health_records
                 WHERE user_id = ?1 ORDER BY recorded_at DESC, id DESC",
            )?;
            let rows = stmt
                .query_map(params![user_id], |row| {
                    Ok(HealthRecord {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        parameter: row.get(2)?,
                        value: row.get(3)?,
                        recorded_at: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }
}

#[async_trait]
impl EmergencyStore for SqliteStore {
    async fn create_emergency(
        &self,
        user_id: &str,
        category: &str,
        note: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let (user_id, category, note) = (
            user_id.to_string(),
            category.to_string(),
            note.map(str::to_string),
        );
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO emergencies (user_id, category, note, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![user_id, category, note, created_at],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn emergencies(&self, user_id: &str) -> StoreResult<Vec<EmergencyRecord>> {
        let user_id = user_id.to_string();
        self.call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, category, note, created_at FROM emergencies
                 WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
            )?;
            let rows = stmt
                .query_map(params![user_id], |row| {
                    Ok(EmergencyRecord {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        category: row.get(2)?,
                        note: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }
}

#[async_trait]
impl ContactStore for SqliteStore {
    async fn add_contact(&self, user_id: &str, contact: NewContact) -> StoreResult<i64> {
        let user_id = user_id.to_string();
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO emergency_contacts (user_id, name, phone_number, relationship) VALUES (?1, ?2, ?3, ?4)",
                params![user_id, contact.name, contact.phone_number, contact.relationship],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn contacts(&self, user_id: &str) -> StoreResult<Vec<EmergencyContact>> {
        let user_id = user_id.to_string();
        self.call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, name, phone_number, relationship FROM emergency_contacts
                 WHERE user_id = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt
                .query_map(params![user_id], |row| {
                    Ok(EmergencyContact {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        name: row.get(2)?,
                        phone_number: row.get(3)?,
                        relationship: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }
}

#[async_trait]
impl ProfileStore for SqliteStore {
    async fn upsert_profile(&self, profile: &UserProfile) -> StoreResult<()> {
        let profile = profile.clone();
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO users (username, age, city) VALUES (?1, ?2, ?3)
                 ON CONFLICT(username) DO UPDATE SET age = excluded.age, city = excluded.city",
                params![profile.username, profile.age, profile.city],
            )?;
            Ok(())
        })
        .await
    }

    async fn profile(&self, username: &str) -> StoreResult<Option<UserProfile>> {
        let username = username.to_string();
        self.call(move |conn| {
            let found = conn
                .query_row(
                    "SELECT username, age, city FROM users WHERE username = ?1",
                    params![username],
                    |row| {
                        Ok(UserProfile {
                            username: row.get(0)?,
                            age: row.get(1)?,
                            city: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(found)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_history_recent_is_oldest_first_and_limited() {
        let store = SqliteStore::open_in_memory().unwrap();
        for i in 0..3 {
            store
                .append_turn("ana", &format!("pregunta {}", i), &format!("respuesta {}", i))
                .await
                .unwrap();
        }
        store.append("beto", Role::User, "otro usuario").await.unwrap();

        let recent = store.recent("ana", 4).await.unwrap();
        let contents: Vec<_> = recent.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["pregunta 1", "respuesta 1", "pregunta 2", "respuesta 2"]
        );
        assert_eq!(recent[0].role, Role::User);
        assert_eq!(recent[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_reminder_round_trip_keeps_offset() {
        let store = SqliteStore::open_in_memory().unwrap();
        let due = DateTime::parse_from_rfc3339("2025-03-11T08:00:00-03:00").unwrap();
        let id = store.create_reminder("ana", "tomar pastillas", due).await.unwrap();

        let reminders = store.reminders("ana").await.unwrap();
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].id, id);
        assert_eq!(reminders[0].due_at, due);
        assert_eq!(reminders[0].due_at.offset(), due.offset());
        assert!(store.reminders("beto").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reminders_sorted_by_instant_across_offsets() {
        let store = SqliteStore::open_in_memory().unwrap();
        // 13:00 UTC，文本上却小于 12:00+00:00
        let later = DateTime::parse_from_rfc3339("2025-03-11T10:00:00-03:00").unwrap();
        let earlier = DateTime::parse_from_rfc3339("2025-03-11T12:00:00+00:00").unwrap();
        store.create_reminder("ana", "almuerzo", earlier).await.unwrap();
        store.create_reminder("ana", "control médico", later).await.unwrap();

        let reminders = store.reminders("ana").await.unwrap();
        let texts: Vec<_> = reminders.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["control médico", "almuerzo"]);
    }

    #[tokio::test]
    async fn test_health_emergency_contacts_profile() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .create_health_record("ana", "unknown", "me duele la cabeza", Utc::now())
            .await
            .unwrap();
        store
            .create_emergency("ana", "Solicitud de emergencia", Some("me caí"), Utc::now())
            .await
            .unwrap();
        store
            .add_contact(
                "ana",
                NewContact {
                    name: "Carla".into(),
                    phone_number: "+56911111111".into(),
                    relationship: Some("hija".into()),
                },
            )
            .await
            .unwrap();
        store
            .upsert_profile(&UserProfile {
                username: "ana".into(),
                age: Some(78),
                city: Some("Temuco".into()),
            })
            .await
            .unwrap();

        assert_eq!(store.health_records("ana").await.unwrap()[0].value, "me duele la cabeza");
        assert_eq!(
            store.emergencies("ana").await.unwrap()[0].note.as_deref(),
            Some("me caí")
        );
        assert_eq!(store.contacts("ana").await.unwrap()[0].name, "Carla");
        assert_eq!(
            store.profile("ana").await.unwrap().unwrap().city.as_deref(),
            Some("Temuco")
        );
        assert!(store.profile("nadie").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_file_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("assist.db");
        let store = SqliteStore::open(&path).unwrap();
        store.append("ana", Role::User, "hola").await.unwrap();
        drop(store);

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.recent("ana", 10).await.unwrap().len(), 1);
    }
}
