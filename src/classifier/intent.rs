//! 意图 / 情绪分类结果与模型输出解析
//!
//! 模型按西班牙语标签输出 `{"intencion", "emocion", "respuesta"}`；解析同时接受英文标签，
//! 忽略大小写与重音。任何缺失或无法识别的字段都落到安全默认值，结果三个字段始终存在。

use std::fmt;

use serde::{Deserialize, Serialize};

/// JSON 可以解析但没有 respuesta 字段时的回复
pub const MISSING_REPLY: &str = "Lo siento, no pude generar una respuesta.";
/// 模型输出无法解析为 JSON 时的回复
pub const UNPARSABLE_REPLY: &str =
    "Lo siento, me está costando un poco entenderte. ¿Podrías decírmelo de otra manera?";
/// 模型调用失败（网络、超时、配额）时的回复
pub const UNAVAILABLE_REPLY: &str =
    "Uhm, parece que tengo un pequeño problema técnico. Por favor, inténtalo de nuevo en un momento.";

/// 识别出的意图；Unrecognized 保留模型给出的原始标签，按普通对话处理
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Intent {
    Reminder,
    Emergency,
    Health,
    Information,
    GeneralConversation,
    Unrecognized(String),
}

impl Intent {
    pub fn from_label(label: &str) -> Self {
        match normalize_label(label).as_str() {
            "recordatorio" | "reminder" => Intent::Reminder,
            "emergencia" | "emergency" => Intent::Emergency,
            "salud" | "health" => Intent::Health,
            "informacion" | "information" | "info" => Intent::Information,
            "conversacion_general" | "general_conversation" | "conversacion" | "general" => {
                Intent::GeneralConversation
            }
            _ => Intent::Unrecognized(label.trim().to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Intent::Reminder => "REMINDER",
            Intent::Emergency => "EMERGENCY",
            Intent::Health => "HEALTH",
            Intent::Information => "INFORMATION",
            Intent::GeneralConversation => "GENERAL_CONVERSATION",
            Intent::Unrecognized(raw) => raw.as_str(),
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::Unrecognized(raw) => write!(f, "UNRECOGNIZED({})", raw),
            other => f.write_str(other.label()),
        }
    }
}

/// 推断出的用户情绪（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Emotion {
    Positive,
    #[default]
    Neutral,
    Negative,
    Concern,
    Urgency,
}

impl Emotion {
    pub fn from_label(label: &str) -> Option<Self> {
        match normalize_label(label).as_str() {
            "positiva" | "positivo" | "positive" => Some(Emotion::Positive),
            "neutra" | "neutro" | "neutral" => Some(Emotion::Neutral),
            "negativa" | "negativo" | "negative" => Some(Emotion::Negative),
            "preocupacion" | "concern" => Some(Emotion::Concern),
            "urgencia" | "urgency" => Some(Emotion::Urgency),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Emotion::Positive => "POSITIVE",
            Emotion::Neutral => "NEUTRAL",
            Emotion::Negative => "NEGATIVE",
            Emotion::Concern => "CONCERN",
            Emotion::Urgency => "URGENCY",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 一次分类的完整结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub intent: Intent,
    pub emotion: Emotion,
    pub reply: String,
}

impl ClassificationResult {
    fn fallback(reply: &str) -> Self {
        Self {
            intent: Intent::GeneralConversation,
            emotion: Emotion::Neutral,
            reply: reply.to_string(),
        }
    }

    /// 模型输出无法解析
    pub fn unparsable() -> Self {
        Self::fallback(UNPARSABLE_REPLY)
    }

    /// 模型不可用
    pub fn unavailable() -> Self {
        Self::fallback(UNAVAILABLE_REPLY)
    }
}

/// 模型原始 JSON；同时接受西语与英语字段名
#[derive(Debug, Deserialize)]
struct RawClassification {
    #[serde(default, alias = "intent", alias = "intención")]
    intencion: Option<String>,
    #[serde(default, alias = "emotion", alias = "emoción")]
    emocion: Option<String>,
    #[serde(default, alias = "reply", alias = "response")]
    respuesta: Option<String>,
}

/// 解析模型输出：提取 JSON 对象（```json 代码块或首个 `{` 至末个 `}`），缺失字段取默认值
pub fn parse_classification(output: &str) -> Result<ClassificationResult, String> {
    let trimmed = output.trim();

    let json_str = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim())
    } else {
        match (trimmed.find('{'), trimmed.rfind('}')) {
            (Some(start), Some(end)) if start < end => &trimmed[start..=end],
            _ => return Err(format!("no JSON object in model output: {}", trimmed)),
        }
    };

    let raw: RawClassification =
        serde_json::from_str(json_str).map_err(|e| format!("{}: {}", e, json_str))?;

    let intent = raw
        .intencion
        .as_deref()
        .map(Intent::from_label)
        .unwrap_or(Intent::GeneralConversation);

    let emotion = match raw.emocion.as_deref() {
        Some(label) => Emotion::from_label(label).unwrap_or_else(|| {
            tracing::debug!(label, "unknown emotion label, using NEUTRAL");
            Emotion::Neutral
        }),
        None => Emotion::Neutral,
    };

    let reply = raw
        .respuesta
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| MISSING_REPLY.to_string());

    Ok(ClassificationResult {
        intent,
        emotion,
        reply,
    })
}

/// 小写、去重音、空白与连字符转下划线
fn normalize_label(label: &str) -> String {
    label
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' => 'a',
            'é' | 'è' | 'ë' => 'e',
            'í' | 'ì' | 'ï' => 'i',
            'ó' | 'ò' | 'ö' => 'o',
            'ú' | 'ù' | 'ü' => 'u',
            ' ' | '-' => '_',
            other => other,
        })
        .collect()
}
