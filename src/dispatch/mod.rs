//! 动作分发：按意图执行副作用并改写回复
//!
//! - 提醒：有可解析的日期才写提醒，否则在回复后追加追问
//! - 紧急：写紧急记录，回复固定为安抚语；开启通知时并发通知紧急联系人
//! - 健康：写一条通用健康记录
//! - 信息：按关键词查询天气/新闻并并入回复，查询失败不影响回复
//! - 普通对话及无法识别的意图：无副作用
//!
//! 存储写入失败向上传播；外部查询与通知失败只记日志。

pub mod enrichment;
pub mod notify;

use std::sync::Arc;

use chrono::Utc;

use crate::classifier::Intent;
use crate::core::StoreError;
use crate::integrations::{NewsProvider, NotificationGateway, WeatherProvider};
use crate::store::Stores;
use crate::temporal::TemporalExpression;

pub use enrichment::{detect_triggers, extract_news_query, extract_place, EnrichmentTriggers};
pub use notify::{notify_contacts, NotificationOutcome};

/// 提醒缺少日期时追加到回复末尾
pub const REMINDER_CLARIFICATION: &str =
    " Para guardar un recordatorio, necesito una fecha y hora específicas.";

pub const EMERGENCY_CATEGORY: &str = "Solicitud de emergencia";

pub const EMERGENCY_REPLY: &str =
    "¡Alerta de emergencia activada! Ya he notificado a los contactos de emergencia. Mantén la calma.";

/// 尚未做结构化提取时健康记录的参数名
pub const UNKNOWN_HEALTH_PARAMETER: &str = "unknown";

/// 一次分发所需的输入
#[derive(Debug, Clone, Copy)]
pub struct DispatchRequest<'a> {
    pub user_id: &'a str,
    pub message: &'a str,
    /// 分类器给出的回复
    pub reply: &'a str,
    pub temporal: &'a [TemporalExpression],
    /// 用户资料中的城市，天气查询的后备地点
    pub profile_city: Option<&'a str>,
}

pub struct ActionDispatcher {
    stores: Stores,
    weather: Arc<dyn WeatherProvider>,
    news: Arc<dyn NewsProvider>,
    notifier: Option<Arc<dyn NotificationGateway>>,
    default_city: String,
    default_news_query: String,
}

impl ActionDispatcher {
    pub fn new(
        stores: Stores,
        weather: Arc<dyn WeatherProvider>,
        news: Arc<dyn NewsProvider>,
    ) -> Self {
        Self {
            stores,
            weather,
            news,
            notifier: None,
            default_city: "Santiago".to_string(),
            default_news_query: "Chile".to_string(),
        }
    }

    /// 设置后紧急分支会通知紧急联系人
    pub fn with_notifier(mut self, notifier: Option<Arc<dyn NotificationGateway>>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_defaults(
        mut self,
        default_city: impl Into<String>,
        default_news_query: impl Into<String>,
    ) -> Self {
        self.default_city = default_city.into();
        self.default_news_query = default_news_query.into();
        self
    }

    /// 执行意图对应的动作，返回最终回复
    pub async fn dispatch(
        &self,
        intent: &Intent,
        req: DispatchRequest<'_>,
    ) -> Result<String, StoreError> {
        match intent {
            Intent::Reminder => self.reminder(req).await,
            Intent::Emergency => self.emergency(req).await,
            Intent::Health => self.health(req).await,
            Intent::Information => Ok(self.information(req).await),
            Intent::GeneralConversation => Ok(req.reply.to_string()),
            Intent::Unrecognized(label) => {
                tracing::warn!(label = %label, "unrecognized intent, treated as conversation");
                Ok(req.reply.to_string())
            }
        }
    }

    async fn reminder(&self, req: DispatchRequest<'_>) -> Result<String, StoreError> {
        let due = req.temporal.first().and_then(|expr| expr.due_time());
        match due {
            Some(due_at) => {
                let id = self
                    .stores
                    .reminders
                    .create_reminder(req.user_id, req.message, due_at)
                    .await?;
                tracing::info!(reminder_id = id, due_at = %due_at, "reminder saved");
                Ok(req.reply.to_string())
            }
            None => {
                tracing::debug!(
                    detected = req.temporal.len(),
                    "reminder intent without usable date"
                );
                Ok(format!("{}{}", req.reply, REMINDER_CLARIFICATION))
            }
        }
    }

    async fn emergency(&self, req: DispatchRequest<'_>) -> Result<String, StoreError> {
        let id = self
            .stores
            .emergencies
            .create_emergency(req.user_id, EMERGENCY_CATEGORY, Some(req.message), Utc::now())
            .await?;
        tracing::info!(emergency_id = id, "emergency recorded");

        if let Some(gateway) = &self.notifier {
            self.notify(gateway.as_ref(), req).await;
        }
        Ok(EMERGENCY_REPLY.to_string())
    }

    async fn notify(&self, gateway: &dyn NotificationGateway, req: DispatchRequest<'_>) {
        let contacts = match self.stores.contacts.contacts(req.user_id).await {
            Ok(contacts) => contacts,
            Err(e) => {
                tracing::warn!("failed to load emergency contacts: {}", e);
                return;
            }
        };
        if contacts.is_empty() {
            tracing::warn!("no emergency contacts configured");
            return;
        }
        let body = notify::emergency_sms_body(req.user_id, req.message);
        let outcomes = notify_contacts(gateway, &contacts, &body).await;
        for outcome in &outcomes {
            if outcome.delivered {
                tracing::info!(contact = %outcome.contact_name, "emergency contact notified");
            } else {
                tracing::warn!(contact = %outcome.contact_name, "emergency contact not notified");
            }
        }
    }

    async fn health(&self, req: DispatchRequest<'_>) -> Result<String, StoreError> {
        let id = self
            .stores
            .health
            .create_health_record(req.user_id, UNKNOWN_HEALTH_PARAMETER, req.message, Utc::now())
            .await?;
        tracing::info!(health_record_id = id, "health observation saved");
        Ok(req.reply.to_string())
    }

    async fn information(&self, req: DispatchRequest<'_>) -> String {
        let triggers = detect_triggers(req.message);
        if !triggers.any() {
            return req.reply.to_string();
        }

        let place = extract_place(req.message)
            .or_else(|| req.profile_city.map(str::to_string))
            .unwrap_or_else(|| self.default_city.clone());
        let query =
            extract_news_query(req.message).unwrap_or_else(|| self.default_news_query.clone());

        let weather = async {
            if triggers.weather {
                self.weather.lookup(&place).await
            } else {
                None
            }
        };
        let news = async {
            if triggers.news {
                self.news.lookup(&query).await
            } else {
                Vec::new()
            }
        };
        let (weather, news) = tokio::join!(weather, news);

        let mut sections = Vec::new();
        if let Some(report) = &weather {
            sections.push(enrichment::format_weather(report));
        }
        if let Some(summary) = enrichment::format_news(&news) {
            sections.push(summary);
        }
        tracing::debug!(
            weather = triggers.weather,
            news = triggers.news,
            sections = sections.len(),
            "information enrichment"
        );
        enrichment::merge_reply(req.reply, &sections.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::{NewsItem, WeatherReport};
    use crate::store::{
        ContactStore, EmergencyStore, HealthStore, MemoryStore, NewContact, ReminderStore,
    };
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct FixedWeather {
        report: Option<WeatherReport>,
        places: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl WeatherProvider for FixedWeather {
        async fn lookup(&self, place: &str) -> Option<WeatherReport> {
            self.places.lock().await.push(place.to_string());
            self.report.clone()
        }
    }

    #[derive(Default)]
    struct FixedNews {
        items: Vec<NewsItem>,
    }

    #[async_trait]
    impl NewsProvider for FixedNews {
        async fn lookup(&self, _query: &str) -> Vec<NewsItem> {
            self.items.clone()
        }
    }

    struct AlwaysDelivers;

    #[async_trait]
    impl NotificationGateway for AlwaysDelivers {
        async fn send(&self, _destination: &str, _body: &str) -> bool {
            true
        }
    }

    fn santiago() -> WeatherReport {
        WeatherReport {
            city: "Santiago".to_string(),
            country: "Chile".to_string(),
            temp_c: 24.0,
            condition: "Despejado".to_string(),
            icon: None,
        }
    }

    fn request<'a>(
        message: &'a str,
        reply: &'a str,
        temporal: &'a [TemporalExpression],
    ) -> DispatchRequest<'a> {
        DispatchRequest {
            user_id: "ana",
            message,
            reply,
            temporal,
            profile_city: None,
        }
    }

    fn dispatcher(store: Arc<MemoryStore>, weather: Arc<FixedWeather>) -> ActionDispatcher {
        ActionDispatcher::new(
            Stores::shared(store),
            weather,
            Arc::new(FixedNews::default()),
        )
    }

    #[tokio::test]
    async fn test_reminder_with_date_saves_and_keeps_reply() {
        let store = Arc::new(MemoryStore::new());
        let d = dispatcher(store.clone(), Arc::new(FixedWeather::default()));
        let temporal = crate::temporal::parse_entities(
            r#"[{"body":"mañana a las 10","start":0,"end":15,"dim":"time",
                "value":{"type":"value","value":"2025-03-11T10:00:00.000-03:00","grain":"hour"}}]"#,
        );
        let reply = d
            .dispatch(
                &Intent::Reminder,
                request("Recuérdame ir al médico mañana a las 10", "Anotado.", &temporal),
            )
            .await
            .unwrap();

        assert_eq!(reply, "Anotado.");
        let reminders = store.reminders("ana").await.unwrap();
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].text, "Recuérdame ir al médico mañana a las 10");
        assert_eq!(reminders[0].due_at.to_rfc3339(), "2025-03-11T10:00:00-03:00");
    }

    #[tokio::test]
    async fn test_reminder_with_unparsable_date_asks_again() {
        let store = Arc::new(MemoryStore::new());
        let d = dispatcher(store.clone(), Arc::new(FixedWeather::default()));
        let temporal = crate::temporal::parse_entities(
            r#"[{"body":"pronto","start":0,"end":6,"dim":"time","value":{"value":"pronto"}}]"#,
        );
        let reply = d
            .dispatch(&Intent::Reminder, request("Recuérdame pronto", "Claro.", &temporal))
            .await
            .unwrap();

        assert!(reply.ends_with(REMINDER_CLARIFICATION));
        assert!(store.reminders("ana").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_emergency_overrides_reply_and_notifies() {
        let store = Arc::new(MemoryStore::new());
        store
            .add_contact(
                "ana",
                NewContact {
                    name: "Luis".to_string(),
                    phone_number: "+56900000001".to_string(),
                    relationship: Some("hijo".to_string()),
                },
            )
            .await
            .unwrap();
        let d = dispatcher(store.clone(), Arc::new(FixedWeather::default()))
            .with_notifier(Some(Arc::new(AlwaysDelivers)));

        let reply = d
            .dispatch(&Intent::Emergency, request("¡Me caí!", "Tranquila.", &[]))
            .await
            .unwrap();

        assert_eq!(reply, EMERGENCY_REPLY);
        let records = store.emergencies("ana").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].category, EMERGENCY_CATEGORY);
        assert_eq!(records[0].note.as_deref(), Some("¡Me caí!"));
    }

    #[tokio::test]
    async fn test_health_write_failure_propagates() {
        let store = Arc::new(MemoryStore::new());
        store.set_fail_writes(true);
        let d = dispatcher(store.clone(), Arc::new(FixedWeather::default()));
        let result = d
            .dispatch(&Intent::Health, request("Me duele la cabeza", "Descansa.", &[]))
            .await;
        assert!(result.is_err());

        store.set_fail_writes(false);
        assert!(store.health_records("ana").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_information_uses_profile_city_when_message_has_none() {
        let store = Arc::new(MemoryStore::new());
        let weather = Arc::new(FixedWeather {
            report: Some(santiago()),
            ..Default::default()
        });
        let d = dispatcher(store, weather.clone());
        let mut req = request("¿Qué temperatura hace?", "No puedo consultar el clima.", &[]);
        req.profile_city = Some("Valdivia");

        let reply = d.dispatch(&Intent::Information, req).await.unwrap();

        assert_eq!(weather.places.lock().await.as_slice(), ["Valdivia"]);
        assert!(reply.starts_with("El clima en Santiago"));
        assert!(!reply.contains("No puedo"));
    }

    #[tokio::test]
    async fn test_information_without_trigger_skips_lookups() {
        let store = Arc::new(MemoryStore::new());
        let weather = Arc::new(FixedWeather::default());
        let d = dispatcher(store, weather.clone());
        let reply = d
            .dispatch(&Intent::Information, request("¿Quién ganó el partido?", "No sé.", &[]))
            .await
            .unwrap();
        assert_eq!(reply, "No sé.");
        assert!(weather.places.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_unrecognized_intent_passes_reply_through() {
        let store = Arc::new(MemoryStore::new());
        let d = dispatcher(store.clone(), Arc::new(FixedWeather::default()));
        let reply = d
            .dispatch(
                &Intent::Unrecognized("CHISTE".to_string()),
                request("Cuéntame un chiste", "¿Por qué...?", &[]),
            )
            .await
            .unwrap();
        assert_eq!(reply, "¿Por qué...?");
        assert_eq!(store.history_len().await, 0);
    }
}
