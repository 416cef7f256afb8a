//! 信息类消息的关键词触发、地点/主题提取与摘要格式化

use std::sync::OnceLock;

use regex::Regex;

use crate::integrations::{NewsItem, WeatherReport};

/// 天气触发词（小写子串匹配）
pub const WEATHER_KEYWORDS: &[&str] = &[
    "clima",
    "tiempo",
    "temperatura",
    "lluvia",
    "llover",
    "pronóstico",
    "pronostico",
    "weather",
];

/// 新闻触发词
pub const NEWS_KEYWORDS: &[&str] = &["noticias", "noticia", "titulares", "actualidad", "news"];

/// 模型表示"帮不上忙"的说法；命中时用查询结果整体替换回复
pub const REFUSAL_PHRASES: &[&str] = &[
    "no puedo",
    "no tengo acceso",
    "no tengo información",
    "no dispongo",
    "lo siento, no",
];

/// 摘要中最多列出的新闻条数
pub const MAX_HEADLINES: usize = 3;

/// 地点后面常跟的时间词，遇到即截断
const PLACE_STOP_WORDS: &[&str] = &[
    "hoy", "mañana", "manana", "ahora", "ayer", "esta", "este", "estos", "por", "para", "y", "en",
    "in", "today", "now",
];

const MAX_PLACE_WORDS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnrichmentTriggers {
    pub weather: bool,
    pub news: bool,
}

impl EnrichmentTriggers {
    pub fn any(&self) -> bool {
        self.weather || self.news
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// 按关键词判断需要哪些查询（忽略大小写）
pub fn detect_triggers(message: &str) -> EnrichmentTriggers {
    let lower = message.to_lowercase();
    EnrichmentTriggers {
        weather: contains_any(&lower, WEATHER_KEYWORDS),
        news: contains_any(&lower, NEWS_KEYWORDS),
    }
}

pub fn is_refusal(reply: &str) -> bool {
    contains_any(&reply.to_lowercase(), REFUSAL_PHRASES)
}

fn place_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:en|in)\s+([\p{L}][\p{L}\s\-]*)").ok())
        .as_ref()
}

fn topic_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:sobre|de)\s+([\p{L}\p{N}][\p{L}\p{N}\s\-]*)").ok())
        .as_ref()
}

/// 消息中 "en X" / "in X" 的地点；取最后一处，遇到时间词截断
pub fn extract_place(message: &str) -> Option<String> {
    let re = place_regex()?;
    re.captures_iter(message)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| trim_place(m.as_str()))
        .last()
}

/// 截取前几个词，遇到时间词或介词停止
fn trim_place(raw: &str) -> Option<String> {
    let words: Vec<&str> = raw
        .split_whitespace()
        .take_while(|w| !PLACE_STOP_WORDS.contains(&w.to_lowercase().as_str()))
        .take(MAX_PLACE_WORDS)
        .collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/// 新闻主题："sobre X" 优先，其次 "de X"；触发词本身不算主题
pub fn extract_news_query(message: &str) -> Option<String> {
    let re = topic_regex()?;
    let mut best: Option<(bool, String)> = None;
    for caps in re.captures_iter(message) {
        let (Some(whole), Some(topic)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Some(topic) = trim_place(topic.as_str()) else {
            continue;
        };
        if contains_any(&topic.to_lowercase(), NEWS_KEYWORDS) {
            continue;
        }
        let is_sobre = whole.as_str().to_lowercase().starts_with("sobre");
        match &best {
            Some((true, _)) => {}
            Some((false, _)) if !is_sobre => {}
            _ => best = Some((is_sobre, topic)),
        }
    }
    best.map(|(_, topic)| topic)
}

pub fn format_weather(report: &WeatherReport) -> String {
    let place = if report.country.is_empty() {
        report.city.clone()
    } else {
        format!("{}, {}", report.city, report.country)
    };
    if report.condition.is_empty() {
        format!("El clima en {}: {}°C.", place, report.temp_c)
    } else {
        format!(
            "El clima en {}: {}°C, {}.",
            place,
            report.temp_c,
            report.condition.to_lowercase()
        )
    }
}

/// 空列表返回 None
pub fn format_news(items: &[NewsItem]) -> Option<String> {
    if items.is_empty() {
        return None;
    }
    let lines: Vec<String> = items
        .iter()
        .take(MAX_HEADLINES)
        .map(|item| format!("- {} ({})", item.title, item.url))
        .collect();
    Some(format!("Estas son algunas noticias recientes:\n{}", lines.join("\n")))
}

/// 把查询结果并入模型回复
pub fn merge_reply(reply: &str, enrichment: &str) -> String {
    if enrichment.is_empty() {
        reply.to_string()
    } else if is_refusal(reply) {
        enrichment.to_string()
    } else {
        format!("{}\n\n{}", reply, enrichment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_triggers_case_insensitive() {
        let t = detect_triggers("¿Qué CLIMA hay en Santiago?");
        assert!(t.weather);
        assert!(!t.news);
        let t = detect_triggers("Cuéntame las Noticias de hoy");
        assert!(t.news);
        assert!(!detect_triggers("Hola, ¿cómo estás?").any());
    }

    #[test]
    fn test_extract_place() {
        assert_eq!(
            extract_place("¿qué clima hay en Santiago?").as_deref(),
            Some("Santiago")
        );
        assert_eq!(
            extract_place("¿Va a llover en Puerto Montt mañana?").as_deref(),
            Some("Puerto Montt")
        );
        assert_eq!(extract_place("¿Qué temperatura hace?"), None);
    }

    #[test]
    fn test_extract_news_query() {
        assert_eq!(
            extract_news_query("Dame noticias sobre salud").as_deref(),
            Some("salud")
        );
        assert_eq!(
            extract_news_query("¿Qué noticias hay de Valparaíso?").as_deref(),
            Some("Valparaíso")
        );
        assert_eq!(extract_news_query("Quiero noticias"), None);
        assert_eq!(extract_news_query("Las noticias de hoy"), None);
    }

    #[test]
    fn test_format_weather() {
        let report = WeatherReport {
            city: "Santiago".to_string(),
            country: "Chile".to_string(),
            temp_c: 21.0,
            condition: "Soleado".to_string(),
            icon: None,
        };
        assert_eq!(format_weather(&report), "El clima en Santiago, Chile: 21°C, soleado.");
    }

    #[test]
    fn test_format_news_limits_headlines() {
        let items: Vec<NewsItem> = (1..=5)
            .map(|i| NewsItem {
                title: format!("Titular {}", i),
                url: format!("https://example.cl/{}", i),
            })
            .collect();
        let summary = format_news(&items).unwrap();
        assert!(summary.contains("Titular 3"));
        assert!(!summary.contains("Titular 4"));
        assert!(format_news(&[]).is_none());
    }

    #[test]
    fn test_merge_reply() {
        assert_eq!(merge_reply("Claro.", ""), "Claro.");
        assert_eq!(merge_reply("Claro.", "Dato"), "Claro.\n\nDato");
        assert_eq!(
            merge_reply("Lo siento, no tengo acceso a internet.", "Dato"),
            "Dato"
        );
    }
}
