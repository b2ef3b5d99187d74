use std::borrow::Cow;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::Settings;
use crate::error::ChatError;
use crate::llm::{AnthropicClient, ContentBlock, MessagesRequest};
use crate::models::{
    available_models, ChatRequest, ChatResponse, Message, ModelInfo, UsageInfo,
    MAX_OUTPUT_TOKENS,
};
use crate::telemetry::Telemetry;

/**
 * \brief 聊天服务：选择凭据、调用上游、整理回复。
 */
pub struct ChatService {
    settings: Arc<Settings>,
    default_client: Option<AnthropicClient>,
    telemetry: Telemetry,
}

impl ChatService {
    /**
     * \brief 若配置了非空默认 Key，则在此时构造默认客户端。
     */
    pub fn new(settings: Arc<Settings>) -> Self {
        let default_client = settings.anthropic_configured().then(|| {
            AnthropicClient::new(
                settings.anthropic_api_key.clone(),
                settings.anthropic_base_url.clone(),
            )
        });
        let telemetry = Telemetry::from_settings(&settings);
        Self {
            settings,
            default_client,
            telemetry,
        }
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    pub fn anthropic_configured(&self) -> bool {
        self.default_client.is_some()
    }

    /**
     * \brief 凭据选择：请求自带 Key > 默认客户端 > 报错。空字符串视为未提供。
     */
    fn resolve_client(&self, api_key: Option<&str>) -> Result<Cow<'_, AnthropicClient>, ChatError> {
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            return Ok(Cow::Owned(AnthropicClient::new(
                key,
                self.settings.anthropic_base_url.clone(),
            )));
        }
        self.default_client
            .as_ref()
            .map(Cow::Borrowed)
            .ok_or(ChatError::MissingCredential)
    }

    /**
     * \brief 发送一轮对话并返回拼接后的结果；上游错误原样向上传递。
     */
    pub async fn send_message(&self, request: ChatRequest) -> Result<ChatResponse, ChatError> {
        let client = self.resolve_client(request.api_key.as_deref())?;
        let messages = build_messages(&request);
        debug!(
            model = %request.model,
            history = request.conversation_history.len(),
            caller_key = request.api_key.as_deref().is_some_and(|k| !k.is_empty()),
            "sending message upstream"
        );

        let upstream = MessagesRequest {
            model: request.model,
            max_tokens: MAX_OUTPUT_TOKENS,
            messages,
        };
        let response = match client.create_message(&upstream).await {
            Ok(r) => r,
            Err(e) => {
                self.telemetry
                    .log_error("service.chat", &format!("model={} error={}", upstream.model, e))
                    .await;
                return Err(e.into());
            }
        };

        let usage = UsageInfo {
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
        };
        info!(
            model = %response.model,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "message completed"
        );
        self.telemetry
            .log_event(
                "service.chat",
                &format!(
                    "model={} msgs={} input_tokens={} output_tokens={}",
                    response.model,
                    upstream.messages.len(),
                    usage.input_tokens,
                    usage.output_tokens
                ),
            )
            .await;

        Ok(ChatResponse {
            content: collect_text(&response.content),
            model: response.model,
            usage,
        })
    }

    pub fn models(&self) -> Vec<ModelInfo> {
        available_models()
    }
}

/**
 * \brief 历史消息按原顺序排列，本轮用户消息追加在末尾。
 */
pub fn build_messages(request: &ChatRequest) -> Vec<Message> {
    let mut messages = Vec::with_capacity(request.conversation_history.len() + 1);
    messages.extend(
        request
            .conversation_history
            .iter()
            .map(|m| Message::new(m.role.clone(), m.content.clone())),
    );
    messages.push(Message::new("user", request.message.clone()));
    messages
}

/// Concatenate the text of every text-bearing block, in order.
pub fn collect_text(blocks: &[ContentBlock]) -> String {
    blocks.iter().filter_map(ContentBlock::text).collect()
}
