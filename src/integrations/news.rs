//! 新闻搜索（GNews）

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{secret_or_env, NewsSection};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
}

#[async_trait]
pub trait NewsProvider: Send + Sync {
    /// 可能为空；服务故障同样返回空列表
    async fn lookup(&self, query: &str) -> Vec<NewsItem>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    articles: Vec<ArticlePayload>,
}

#[derive(Debug, Deserialize)]
struct ArticlePayload {
    title: Option<String>,
    url: Option<String>,
}

/// 丢弃标题或链接为空的条目
fn collect_items(articles: Vec<ArticlePayload>) -> Vec<NewsItem> {
    articles
        .into_iter()
        .filter_map(|a| {
            let title = a.title.filter(|t| !t.trim().is_empty())?;
            let url = a.url.filter(|u| !u.trim().is_empty())?;
            Some(NewsItem { title, url })
        })
        .collect()
}

pub struct GNewsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    lang: String,
    max_results: u32,
}

impl GNewsClient {
    pub fn new(cfg: &NewsSection) -> Self {
        Self {
            client: super::http_client(cfg.timeout_secs),
            base_url: cfg.base_url.clone(),
            api_key: secret_or_env(&cfg.api_key, "GNEWS_API_KEY"),
            lang: cfg.lang.clone(),
            max_results: cfg.max_results,
        }
    }

    async fn fetch(&self, token: &str, query: &str) -> Result<Vec<NewsItem>, String> {
        let max = self.max_results.to_string();
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", query),
                ("lang", self.lang.as_str()),
                ("max", max.as_str()),
                ("token", token),
            ])
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = resp.status();
        if !status.is_success() {
            return Err(format!("status {}", status));
        }
        let body: SearchResponse = resp.json().await.map_err(|e| e.to_string())?;
        tracing::debug!(query, articles = body.articles.len(), "gnews response");
        Ok(collect_items(body.articles))
    }
}

#[async_trait]
impl NewsProvider for GNewsClient {
    async fn lookup(&self, query: &str) -> Vec<NewsItem> {
        let Some(token) = self.api_key.as_deref() else {
            tracing::warn!("gnews api key not configured");
            return Vec::new();
        };
        self.fetch(token, query).await.unwrap_or_else(|e| {
            tracing::warn!(query, "news lookup failed: {}", e);
            Vec::new()
        })
    }
}
