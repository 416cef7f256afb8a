//! 外部集成：天气（WeatherAPI）、新闻（GNews）、短信（Twilio）
//!
//! 每个服务一个 trait 加一个 reqwest 实现。调用失败只记 warn，对外表现为"没有数据"。

pub mod news;
pub mod sms;
pub mod weather;

pub use news::{GNewsClient, NewsItem, NewsProvider};
pub use sms::{NotificationGateway, TwilioSms};
pub use weather::{WeatherApiClient, WeatherProvider, WeatherReport};

use std::time::Duration;

/// 带超时的 HTTP 客户端；构建失败时退回默认客户端
pub(crate) fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
