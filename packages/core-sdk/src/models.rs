use serde::{Deserialize, Serialize};

/** \brief 未指定模型时使用的默认模型。 */
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/** \brief 每次调用上游允许的最大输出 token 数。 */
pub const MAX_OUTPUT_TOKENS: u32 = 4096;

/**
 * \brief 消息结构，与 Anthropic Messages 格式对齐。
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /** \brief 角色：通常为 user/assistant */
    pub role: String,
    /** \brief 内容 */
    pub content: String,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/**
 * \brief 前端发来的聊天请求。
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /** \brief 本轮用户消息 */
    pub message: String,
    /** \brief 模型 ID */
    #[serde(default = "default_model")]
    pub model: String,
    /** \brief 历史消息，按时间先后排列 */
    #[serde(default)]
    pub conversation_history: Vec<Message>,
    /** \brief 调用方自带的 API Key，优先于服务端默认 Key */
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

/**
 * \brief token 用量，原样透传上游统计。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageInfo {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/**
 * \brief 返回给前端的聊天结果。
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    /** \brief 拼接后的回复文本 */
    pub content: String,
    /** \brief 上游实际使用的模型 */
    pub model: String,
    pub usage: UsageInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
}

const CATALOG: [(&str, &str); 3] = [
    ("claude-sonnet-4-20250514", "Claude Sonnet 4"),
    ("claude-opus-4-20250514", "Claude Opus 4"),
    ("claude-haiku-4-20250514", "Claude Haiku 4"),
];

/**
 * \brief 固定的模型目录，顺序不变。
 */
pub fn available_models() -> Vec<ModelInfo> {
    CATALOG
        .iter()
        .map(|(id, name)| ModelInfo {
            id: id.to_string(),
            name: name.to_string(),
        })
        .collect()
}
