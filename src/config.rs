//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `ASSIST__*` 覆盖（双下划线表示嵌套，如 `ASSIST__LLM__PROVIDER=openai`）。
//! API Key 未写入配置时回退到各服务惯用的环境变量（OPENAI_API_KEY、WEATHER_API_KEY 等）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub cache: CacheSection,
    pub temporal: TemporalSection,
    pub weather: WeatherSection,
    pub news: NewsSection,
    pub notifications: NotificationsSection,
    pub server: ServerSection,
}

/// [app] 段：应用名、数据库路径、分类时携带的历史条数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
    pub database_path: PathBuf,
    /// 送入分类器的最近历史条数（user/assistant 各算一条）
    pub history_window: usize,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            database_path: PathBuf::from("data/senior_assist.db"),
            history_window: 10,
        }
    }
}

/// [llm] 段：后端选择、模型、温度与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：openai / deepseek / mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            api_key: None,
            temperature: 0.7,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [cache] 段：分类结果缓存容量与存活时间
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub capacity: usize,
    pub ttl_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            capacity: 1024,
            ttl_secs: 3600,
        }
    }
}

/// [temporal] 段：Duckling 服务地址、语言区域与时区
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TemporalSection {
    pub url: String,
    pub locale: String,
    pub tz: String,
    pub timeout_secs: u64,
}

impl Default for TemporalSection {
    fn default() -> Self {
        Self {
            url: "http://localhost:8001".to_string(),
            locale: "es_ES".to_string(),
            tz: "America/Santiago".to_string(),
            timeout_secs: 10,
        }
    }
}

/// [weather] 段：WeatherAPI
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeatherSection {
    pub api_key: Option<String>,
    pub base_url: String,
    pub lang: String,
    /// 消息与用户资料都没有城市时使用
    pub default_city: String,
    pub timeout_secs: u64,
}

impl Default for WeatherSection {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.weatherapi.com/v1/current.json".to_string(),
            lang: "es".to_string(),
            default_city: "Santiago".to_string(),
            timeout_secs: 10,
        }
    }
}

/// [news] 段：GNews
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NewsSection {
    pub api_key: Option<String>,
    pub base_url: String,
    pub lang: String,
    pub max_results: u32,
    pub default_query: String,
    pub timeout_secs: u64,
}

impl Default for NewsSection {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://gnews.io/api/v4/search".to_string(),
            lang: "es".to_string(),
            max_results: 5,
            default_query: "Chile".to_string(),
            timeout_secs: 10,
        }
    }
}

/// [notifications] 段：紧急联系人短信（Twilio）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationsSection {
    pub enabled: bool,
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for NotificationsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            account_sid: None,
            auth_token: None,
            from_number: None,
            base_url: "https://api.twilio.com/2010-04-01".to_string(),
            timeout_secs: 10,
        }
    }
}

/// [server] 段：HTTP 监听地址
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
        }
    }
}

/// 配置值优先，其次环境变量；空字符串视为未设置
pub fn secret_or_env(value: &Option<String>, env_key: &str) -> Option<String> {
    value
        .clone()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| std::env::var(env_key).ok().filter(|v| !v.trim().is_empty()))
}

/// 从 config 目录加载配置，环境变量 ASSIST__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 ASSIST__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("ASSIST")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
