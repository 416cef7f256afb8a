//! 分类结果缓存
//!
//! 键为（消息原文、时间表达式序列化、历史序列化、用户城市）；城市会进入提示词，必须参与键。容量满时淘汰最早写入的条目，超过 ttl 的条目视为未命中。
//! 同一键的并发写入以最后一次为准。

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::classifier::ClassificationResult;
use crate::memory::Message;
use crate::temporal::TemporalExpression;

/// 缓存键：时间与历史分量是确定性的 JSON 文本（空列表为空串）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    message: String,
    temporal: String,
    history: String,
    city: Option<String>,
}

impl CacheKey {
    pub fn new(message: &str, temporal: &[TemporalExpression], history: &[Message]) -> Self {
        Self {
            message: message.to_string(),
            temporal: canonical_json(temporal),
            history: canonical_json(history),
            city: None,
        }
    }

    /// 提示词里带有用户城市时，城市也区分缓存条目
    pub fn with_city(mut self, city: Option<&str>) -> Self {
        self.city = city.map(str::to_string);
        self
    }
}

/// 序列化为 JSON；serde_json::Value 的对象键有序，因此同一输入得到同一文本
fn canonical_json<T: serde::Serialize>(items: &[T]) -> String {
    if items.is_empty() {
        return String::new();
    }
    serde_json::to_value(items)
        .map(|v| v.to_string())
        .unwrap_or_default()
}

#[derive(Debug)]
struct Entry {
    value: Arc<ClassificationResult>,
    inserted_at: Instant,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, Entry>,
    /// 写入顺序（最旧在前），用于容量淘汰与过期清理
    order: VecDeque<CacheKey>,
}

/// 有界、带过期时间的分类缓存；capacity 为 0 时不缓存
#[derive(Debug)]
pub struct ResponseCache {
    state: RwLock<CacheState>,
    capacity: usize,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            capacity,
            ttl,
        }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Arc<ClassificationResult>> {
        let state = self.state.read().await;
        state
            .entries
            .get(key)
            .filter(|e| e.inserted_at.elapsed() < self.ttl)
            .map(|e| Arc::clone(&e.value))
    }

    pub async fn insert(&self, key: CacheKey, value: Arc<ClassificationResult>) {
        if self.capacity == 0 {
            return;
        }
        let mut state = self.state.write().await;

        if state.entries.contains_key(&key) {
            state.order.retain(|k| k != &key);
        }
        state.entries.insert(
            key.clone(),
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
        state.order.push_back(key);

        // 先清过期（写入顺序即过期顺序），再按容量淘汰
        while let Some(oldest) = state.order.front().cloned() {
            let expired = state
                .entries
                .get(&oldest)
                .map(|e| e.inserted_at.elapsed() >= self.ttl)
                .unwrap_or(true);
            if !expired && state.order.len() <= self.capacity {
                break;
            }
            state.order.pop_front();
            state.entries.remove(&oldest);
        }
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Emotion, Intent};

    fn result(reply: &str) -> Arc<ClassificationResult> {
        Arc::new(ClassificationResult {
            intent: Intent::GeneralConversation,
            emotion: Emotion::Neutral,
            reply: reply.to_string(),
        })
    }

    #[test]
    fn test_key_depends_on_history() {
        let a = CacheKey::new("hola", &[], &[]);
        let b = CacheKey::new("hola", &[], &[Message::user("antes")]);
        assert_ne!(a, b);
        assert_eq!(a, CacheKey::new("hola", &[], &[]));
    }

    #[test]
    fn test_key_depends_on_city() {
        let temuco = CacheKey::new("¿qué tal mi ciudad?", &[], &[]).with_city(Some("Temuco"));
        let arica = CacheKey::new("¿qué tal mi ciudad?", &[], &[]).with_city(Some("Arica"));
        let nowhere = CacheKey::new("¿qué tal mi ciudad?", &[], &[]);
        assert_ne!(temuco, arica);
        assert_ne!(temuco, nowhere);
        assert_eq!(nowhere, CacheKey::new("¿qué tal mi ciudad?", &[], &[]).with_city(None));
    }

    #[tokio::test]
    async fn test_hit_returns_same_arc() {
        let cache = ResponseCache::new(4, Duration::from_secs(60));
        let key = CacheKey::new("hola", &[], &[]);
        let value = result("¡Hola!");
        cache.insert(key.clone(), Arc::clone(&value)).await;
        let hit = cache.get(&key).await.unwrap();
        assert!(Arc::ptr_eq(&hit, &value));
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let cache = ResponseCache::new(2, Duration::from_secs(60));
        for msg in ["uno", "dos", "tres"] {
            cache.insert(CacheKey::new(msg, &[], &[]), result(msg)).await;
        }
        assert_eq!(cache.len().await, 2);
        assert!(cache.get(&CacheKey::new("uno", &[], &[])).await.is_none());
        assert!(cache.get(&CacheKey::new("tres", &[], &[])).await.is_some());
    }

    #[tokio::test]
    async fn test_overwrite_is_last_write_wins() {
        let cache = ResponseCache::new(2, Duration::from_secs(60));
        let key = CacheKey::new("hola", &[], &[]);
        cache.insert(key.clone(), result("primero")).await;
        cache.insert(key.clone(), result("segundo")).await;
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get(&key).await.unwrap().reply, "segundo");
    }

    #[tokio::test]
    async fn test_expired_entry_is_miss() {
        let cache = ResponseCache::new(4, Duration::from_millis(0));
        let key = CacheKey::new("hola", &[], &[]);
        cache.insert(key.clone(), result("x")).await;
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_zero_capacity_disables() {
        let cache = ResponseCache::new(0, Duration::from_secs(60));
        cache.insert(CacheKey::new("hola", &[], &[]), result("x")).await;
        assert!(cache.is_empty().await);
    }
}
