//! 时间表达式提取
//!
//! 通过 Duckling 服务（`POST {url}/parse`）识别消息中的日期/时间；
//! 服务不可达、非 2xx、返回体无法解析时一律得到空列表，调用方无需区分"没有日期"与"服务故障"。

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::config::TemporalSection;

/// 一条识别出的时间表达式；value 保留 Duckling 原始结构，原样回传给调用方
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemporalExpression {
    /// 原文片段
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub start: usize,
    #[serde(default)]
    pub end: usize,
    /// 维度（time / duration / ...）
    #[serde(default)]
    pub dim: String,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latent: Option<bool>,
}

impl TemporalExpression {
    /// 解析后的取值：单点取 `value.value`，区间取 `value.from.value`
    pub fn resolved_value(&self) -> Option<&str> {
        self.value
            .get("value")
            .and_then(|v| v.as_str())
            .or_else(|| {
                self.value
                    .get("from")
                    .and_then(|f| f.get("value"))
                    .and_then(|v| v.as_str())
            })
    }

    /// 解析为绝对时间点；失败视为"没有可用日期"
    pub fn due_time(&self) -> Option<DateTime<FixedOffset>> {
        self.resolved_value().and_then(parse_due_time)
    }
}

/// 将时间字符串解析为带时区的时间点；无时区的写法按 UTC 处理
pub fn parse_due_time(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt);
    }
    let utc = FixedOffset::east_opt(0)?;
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return utc.from_local_datetime(&naive).single();
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive).fixed_offset())
}

/// 解析 Duckling 返回体；非数组或结构不符时返回空列表
pub fn parse_entities(body: &str) -> Vec<TemporalExpression> {
    match serde_json::from_str::<Vec<TemporalExpression>>(body) {
        Ok(entities) => entities,
        Err(e) => {
            tracing::warn!("Duckling response not parsable: {}", e);
            Vec::new()
        }
    }
}

/// 时间表达式提取器
#[async_trait]
pub trait TemporalExtractor: Send + Sync {
    /// 永不失败：任何上游错误都返回空列表
    async fn extract(&self, text: &str) -> Vec<TemporalExpression>;
}

/// 不识别任何日期（未配置 Duckling 时使用）
#[derive(Debug, Default)]
pub struct NoopExtractor;

#[async_trait]
impl TemporalExtractor for NoopExtractor {
    async fn extract(&self, _text: &str) -> Vec<TemporalExpression> {
        Vec::new()
    }
}

/// Duckling HTTP 客户端
pub struct DucklingExtractor {
    client: reqwest::Client,
    url: String,
    locale: String,
    tz: String,
}

impl DucklingExtractor {
    pub fn new(cfg: &TemporalSection) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: format!("{}/parse", cfg.url.trim_end_matches('/')),
            locale: cfg.locale.clone(),
            tz: cfg.tz.clone(),
        }
    }

    async fn request(&self, text: &str) -> Result<Vec<TemporalExpression>, String> {
        let params = [
            ("text", text),
            ("locale", self.locale.as_str()),
            ("tz", self.tz.as_str()),
            ("dims", r#"["time"]"#),
        ];
        let resp = self
            .client
            .post(&self.url)
            .form(&params)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let body = resp.text().await.map_err(|e| format!("Read body: {}", e))?;
        Ok(parse_entities(&body))
    }
}

#[async_trait]
impl TemporalExtractor for DucklingExtractor {
    async fn extract(&self, text: &str) -> Vec<TemporalExpression> {
        match self.request(text).await {
            Ok(found) => {
                tracing::debug!(count = found.len(), "duckling extracted expressions");
                found
            }
            Err(e) => {
                tracing::warn!("Duckling unavailable, continuing without dates: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    const SAMPLE: &str = r#"[
        {"body": "mañana a las 8", "start": 14, "end": 28, "dim": "time", "latent": false,
         "value": {"type": "value", "grain": "hour", "value": "2025-03-11T08:00:00.000-03:00",
                   "values": []}},
        {"body": "del lunes al viernes", "start": 30, "end": 50, "dim": "time",
         "value": {"type": "interval", "from": {"grain": "day", "value": "2025-03-10T00:00:00.000-03:00"},
                   "to": {"grain": "day", "value": "2025-03-15T00:00:00.000-03:00"}}}
    ]"#;

    #[test]
    fn test_parse_entities_and_resolve() {
        let found = parse_entities(SAMPLE);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].body, "mañana a las 8");
        assert_eq!(
            found[0].resolved_value(),
            Some("2025-03-11T08:00:00.000-03:00")
        );
        assert_eq!(
            found[1].resolved_value(),
            Some("2025-03-10T00:00:00.000-03:00")
        );
        let due = found[0].due_time().unwrap();
        assert_eq!(due.hour(), 8);
        assert_eq!(due.offset().local_minus_utc(), -3 * 3600);
    }

    #[test]
    fn test_parse_entities_garbage_is_empty() {
        assert!(parse_entities("{\"error\": \"bad\"}").is_empty());
        assert!(parse_entities("not json").is_empty());
    }

    #[test]
    fn test_parse_due_time_formats() {
        assert!(parse_due_time("2025-03-11T08:00:00-03:00").is_some());
        assert!(parse_due_time("2025-03-11 08:00:00").is_some());
        assert!(parse_due_time("2025-03-11").is_some());
        assert!(parse_due_time("mañana").is_none());
        assert!(parse_due_time("").is_none());
    }

    #[test]
    fn test_unresolvable_value_has_no_due_time() {
        let expr = TemporalExpression {
            body: "pronto".into(),
            start: 0,
            end: 6,
            dim: "time".into(),
            value: serde_json::json!({"value": "algún día"}),
            latent: None,
        };
        assert_eq!(expr.resolved_value(), Some("algún día"));
        assert!(expr.due_time().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_service_yields_empty() {
        let extractor = DucklingExtractor::new(&TemporalSection {
            url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 1,
            ..TemporalSection::default()
        });
        assert!(extractor.extract("mañana a las 8").await.is_empty());
    }
}
