//! 助手构建器：按配置组装编排器的全部协作者
//!
//! 每个协作者都可在构建前替换（测试中注入内存存储、脚本 LLM 等）。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::classifier::{IntentClassifier, ResponseCache};
use crate::config::AppConfig;
use crate::core::{StoreError, TurnOrchestrator};
use crate::dispatch::ActionDispatcher;
use crate::integrations::{
    GNewsClient, NewsProvider, NotificationGateway, TwilioSms, WeatherApiClient, WeatherProvider,
};
use crate::llm::LlmClient;
use crate::store::{SqliteStore, Stores};
use crate::temporal::{DucklingExtractor, TemporalExtractor};

pub struct AssistantBuilder {
    config: AppConfig,
    llm: Option<Arc<dyn LlmClient>>,
    cache: Option<Arc<ResponseCache>>,
    stores: Option<Stores>,
    extractor: Option<Arc<dyn TemporalExtractor>>,
    weather: Option<Arc<dyn WeatherProvider>>,
    news: Option<Arc<dyn NewsProvider>>,
    notifier: Option<Arc<dyn NotificationGateway>>,
}

impl AssistantBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            llm: None,
            cache: None,
            stores: None,
            extractor: None,
            weather: None,
            news: None,
            notifier: None,
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// 共享同一个缓存（多个编排器或测试断言时）
    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_stores(mut self, stores: Stores) -> Self {
        self.stores = Some(stores);
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn TemporalExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_weather(mut self, weather: Arc<dyn WeatherProvider>) -> Self {
        self.weather = Some(weather);
        self
    }

    pub fn with_news(mut self, news: Arc<dyn NewsProvider>) -> Self {
        self.news = Some(news);
        self
    }

    /// 显式提供通知网关时，不再检查 [notifications] enabled
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationGateway>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn build_cache(&self) -> Arc<ResponseCache> {
        Arc::new(ResponseCache::new(
            self.config.cache.capacity,
            Duration::from_secs(self.config.cache.ttl_secs),
        ))
    }

    fn build_stores(&self) -> Result<Stores, StoreError> {
        let store = SqliteStore::open(&self.config.app.database_path)?;
        tracing::info!(path = %self.config.app.database_path.display(), "SQLite store opened");
        Ok(Stores::shared(Arc::new(store)))
    }

    fn build_notifier(&self) -> Option<Arc<dyn NotificationGateway>> {
        if !self.config.notifications.enabled {
            return None;
        }
        match TwilioSms::from_config(&self.config.notifications) {
            Some(sms) => Some(Arc::new(sms)),
            None => {
                tracing::warn!("notifications enabled but Twilio credentials missing");
                None
            }
        }
    }

    /// 组装编排器；只有打开数据库可能失败
    pub fn build(self) -> Result<TurnOrchestrator, StoreError> {
        let stores = match self.stores.clone() {
            Some(stores) => stores,
            None => self.build_stores()?,
        };
        let llm = self
            .llm
            .clone()
            .unwrap_or_else(|| crate::llm::create_llm_from_config(&self.config));
        let cache = self.cache.clone().unwrap_or_else(|| self.build_cache());
        let extractor = self
            .extractor
            .clone()
            .unwrap_or_else(|| Arc::new(DucklingExtractor::new(&self.config.temporal)));
        let weather = self
            .weather
            .clone()
            .unwrap_or_else(|| Arc::new(WeatherApiClient::new(&self.config.weather)));
        let news = self
            .news
            .clone()
            .unwrap_or_else(|| Arc::new(GNewsClient::new(&self.config.news)));
        let notifier = self.notifier.clone().or_else(|| self.build_notifier());

        let classifier =
            IntentClassifier::new(llm, cache).with_history_window(self.config.app.history_window);
        let dispatcher = ActionDispatcher::new(stores.clone(), weather, news)
            .with_notifier(notifier)
            .with_defaults(
                self.config.weather.default_city.clone(),
                self.config.news.default_query.clone(),
            );

        Ok(TurnOrchestrator::new(extractor, classifier, dispatcher, stores))
    }
}

/// 便捷函数：加载配置（失败时用默认值）并按配置构建编排器
pub fn create_assistant(config_path: Option<PathBuf>) -> anyhow::Result<TurnOrchestrator> {
    let config = crate::config::load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    Ok(AssistantBuilder::new(config).build()?)
}
