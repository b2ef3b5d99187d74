use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::Message;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/**
 * \brief 上游调用失败。
 */
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid api key: {0}")]
    InvalidKey(#[from] reqwest::header::InvalidHeaderValue),

    #[error("anthropic request failed: {status} -> {message}")]
    Api { status: u16, message: String },
}

/**
 * \brief Messages 接口请求体。
 */
#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
}

/**
 * \brief 回复中的单个内容片段；只有 `Text` 携带可显示文本。
 */
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    Thinking {
        thinking: String,
    },
    #[serde(other)]
    Unknown,
}

impl ContentBlock {
    pub fn text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/**
 * \brief Messages 接口响应体（只解析用到的字段）。
 */
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    pub model: String,
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

/**
 * \brief Anthropic 客户端句柄。由凭据构造，按请求创建时只在该请求内使用。
 */
#[derive(Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    /**
     * \brief 单次非流式调用 `/v1/messages`，失败不重试。
     */
    pub async fn create_message(
        &self,
        request: &MessagesRequest,
    ) -> Result<MessagesResponse, UpstreamError> {
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let resp = self
            .http
            .post(url)
            .headers(headers)
            .json(request)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::Api {
                status,
                message: extract_error_message(&text),
            });
        }
        Ok(resp.json().await?)
    }
}

/// Pull `error.message` out of an Anthropic error body, falling back to the raw text.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| body.to_string())
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[test]
    fn test_content_block_variants() {
        let blocks: Vec<ContentBlock> = serde_json::from_value(json!([
            {"type": "text", "text": "a"},
            {"type": "tool_use", "id": "t1", "name": "lookup", "input": {"q": 1}},
            {"type": "thinking", "thinking": "hmm", "signature": "sig"},
            {"type": "server_tool_use", "id": "t2"}
        ]))
        .expect("decode blocks");
        assert_eq!(blocks[0].text(), Some("a"));
        assert!(matches!(blocks[1], ContentBlock::ToolUse { .. }));
        assert!(blocks[2].text().is_none());
        assert_eq!(blocks[3], ContentBlock::Unknown);
    }

    #[test]
    fn test_extract_error_message() {
        let body = r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
        assert_eq!(extract_error_message(body), "invalid x-api-key");
        assert_eq!(extract_error_message("bad gateway"), "bad gateway");
    }

    #[tokio::test]
    async fn test_create_message_sends_headers_and_body() {
        let upstream = mock::spawn(
            StatusCode::OK,
            mock::text_reply("claude-opus-4-20250514", json!([{"type": "text", "text": "hi"}]), 3, 5),
        )
        .await;
        let client = AnthropicClient::new("sk-abc", format!("{}/", upstream.base_url));
        let resp = client
            .create_message(&MessagesRequest {
                model: "claude-opus-4-20250514".into(),
                max_tokens: 4096,
                messages: vec![Message::new("user", "hello")],
            })
            .await
            .expect("create message");

        assert_eq!(resp.model, "claude-opus-4-20250514");
        assert_eq!(resp.usage, Usage { input_tokens: 3, output_tokens: 5 });

        let calls = upstream.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].api_key.as_deref(), Some("sk-abc"));
        assert_eq!(calls[0].version.as_deref(), Some(ANTHROPIC_VERSION));
        assert_eq!(calls[0].body["max_tokens"], 4096);
        assert_eq!(calls[0].body["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn test_create_message_maps_api_error() {
        let upstream = mock::spawn(
            StatusCode::UNAUTHORIZED,
            json!({"type": "error", "error": {"type": "authentication_error", "message": "invalid x-api-key"}}),
        )
        .await;
        let client = AnthropicClient::new("bad", upstream.base_url.clone());
        let err = client
            .create_message(&MessagesRequest {
                model: "m".into(),
                max_tokens: 1,
                messages: vec![],
            })
            .await
            .expect_err("should fail");
        match err {
            UpstreamError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid x-api-key");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_key_header_is_rejected_locally() {
        let client = AnthropicClient::new("bad\nkey", "http://127.0.0.1:9");
        let err = client
            .create_message(&MessagesRequest {
                model: "m".into(),
                max_tokens: 1,
                messages: vec![],
            })
            .await
            .expect_err("should fail");
        assert!(matches!(err, UpstreamError::InvalidKey(_)));
    }
}
