//! 天气查询（WeatherAPI current.json）

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{secret_or_env, WeatherSection};

/// 精简后的天气结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub city: String,
    pub country: String,
    pub temp_c: f64,
    pub condition: String,
    #[serde(default)]
    pub icon: Option<String>,
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// 查不到或服务故障都返回 None
    async fn lookup(&self, place: &str) -> Option<WeatherReport>;
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    location: Option<LocationPayload>,
    current: Option<CurrentPayload>,
}

#[derive(Debug, Deserialize)]
struct LocationPayload {
    name: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CurrentPayload {
    temp_c: Option<f64>,
    condition: Option<ConditionPayload>,
}

#[derive(Debug, Deserialize)]
struct ConditionPayload {
    text: Option<String>,
    icon: Option<String>,
}

impl CurrentResponse {
    /// 缺少城市名或温度的结果视为无效
    fn into_report(self) -> Option<WeatherReport> {
        let location = self.location?;
        let current = self.current?;
        let city = location.name.filter(|c| !c.trim().is_empty())?;
        let temp_c = current.temp_c?;
        let (condition, icon) = match current.condition {
            Some(c) => (c.text.unwrap_or_default(), c.icon),
            None => (String::new(), None),
        };
        Some(WeatherReport {
            city,
            country: location.country.unwrap_or_default(),
            temp_c,
            condition,
            icon,
        })
    }
}

pub struct WeatherApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    lang: String,
}

impl WeatherApiClient {
    pub fn new(cfg: &WeatherSection) -> Self {
        Self {
            client: super::http_client(cfg.timeout_secs),
            base_url: cfg.base_url.clone(),
            api_key: secret_or_env(&cfg.api_key, "WEATHER_API_KEY"),
            lang: cfg.lang.clone(),
        }
    }

    async fn fetch(&self, key: &str, place: &str) -> Result<Option<WeatherReport>, String> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("key", key), ("q", place), ("lang", self.lang.as_str())])
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = resp.status();
        if !status.is_success() {
            return Err(format!("status {}", status));
        }
        let body: CurrentResponse = resp.json().await.map_err(|e| e.to_string())?;
        Ok(body.into_report())
    }
}

#[async_trait]
impl WeatherProvider for WeatherApiClient {
    async fn lookup(&self, place: &str) -> Option<WeatherReport> {
        let Some(key) = self.api_key.as_deref() else {
            tracing::warn!("weather api key not configured");
            return None;
        };
        match self.fetch(key, place).await {
            Ok(report) => {
                if report.is_none() {
                    tracing::debug!(place, "weather response missing city or temperature");
                }
                report
            }
            Err(e) => {
                tracing::warn!(place, "weather lookup failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_report_filters_fields() {
        let raw = r#"{
            "location": {"name": "Santiago", "country": "Chile", "region": "RM"},
            "current": {"temp_c": 18.5, "humidity": 40, "condition": {"text": "Soleado", "icon": "//cdn/113.png"}}
        }"#;
        let parsed: CurrentResponse = serde_json::from_str(raw).unwrap();
        let report = parsed.into_report().unwrap();
        assert_eq!(report.city, "Santiago");
        assert_eq!(report.country, "Chile");
        assert_eq!(report.temp_c, 18.5);
        assert_eq!(report.condition, "Soleado");
        assert_eq!(report.icon.as_deref(), Some("//cdn/113.png"));
    }

    #[test]
    fn test_missing_temperature_is_absent() {
        let raw = r#"{"location": {"name": "Santiago"}, "current": {"condition": {"text": "Nublado"}}}"#;
        let parsed: CurrentResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.into_report().is_none());
    }

    #[tokio::test]
    async fn test_lookup_without_key_is_none() {
        let cfg = WeatherSection::default();
        let mut client = WeatherApiClient::new(&cfg);
        client.api_key = None;
        assert!(client.lookup("Santiago").await.is_none());
    }
}
