//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；支持 OpenAI、DeepSeek、
//! 自建代理等。把本核心的 Message / 工具 schema 转为 API 格式，tool_calls 回复转为
//! ModelOutput::ToolCalls。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionMessageToolCall, ChatCompletionMessageToolCalls,
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionTool, ChatCompletionTools,
    CreateChatCompletionRequestArgs, FunctionCall, FunctionObject,
};
use async_openai::Client;
use async_trait::async_trait;
use serde_json::Value;

use crate::core::state::{Message, Role, ToolCallRequest};
use crate::llm::{LlmClient, ModelOutput, ModelSettings};

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// OpenAI 兼容客户端：持有 Client 与默认 model 名；settings.model 非空时覆盖默认
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            usage: TokenUsage::new(),
        }
    }

    fn to_openai_messages(
        &self,
        messages: &[Message],
    ) -> Result<Vec<ChatCompletionRequestMessage>, String> {
        messages
            .iter()
            .map(|m| match m.role {
                Role::System => ChatCompletionRequestSystemMessageArgs::default()
                    .content(m.content.clone())
                    .build()
                    .map(ChatCompletionRequestMessage::System)
                    .map_err(|e| e.to_string()),
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(m.content.clone())
                    .build()
                    .map(ChatCompletionRequestMessage::User)
                    .map_err(|e| e.to_string()),
                Role::Assistant => {
                    let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                    if !m.content.is_empty() {
                        builder.content(m.content.clone());
                    }
                    if !m.tool_calls.is_empty() {
                        let calls: Vec<ChatCompletionMessageToolCalls> = m
                            .tool_calls
                            .iter()
                            .map(|c| {
                                ChatCompletionMessageToolCalls::Function(
                                    ChatCompletionMessageToolCall {
                                        id: c.id.clone(),
                                        function: FunctionCall {
                                            name: c.tool.clone(),
                                            arguments: c.args.to_string(),
                                        },
                                    },
                                )
                            })
                            .collect();
                        builder.tool_calls(calls);
                    }
                    builder
                        .build()
                        .map(ChatCompletionRequestMessage::Assistant)
                        .map_err(|e| e.to_string())
                }
                Role::Tool => ChatCompletionRequestToolMessageArgs::default()
                    .content(m.content.clone())
                    .tool_call_id(m.tool_call_id.clone().unwrap_or_default())
                    .build()
                    .map(ChatCompletionRequestMessage::Tool)
                    .map_err(|e| e.to_string()),
            })
            .collect()
    }

    fn to_openai_tools(&self, tool_schemas: &[Value]) -> Vec<ChatCompletionTools> {
        tool_schemas
            .iter()
            .map(|schema| {
                ChatCompletionTools::Function(ChatCompletionTool {
                    function: FunctionObject {
                        name: schema
                            .get("name")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        description: schema
                            .get("description")
                            .and_then(Value::as_str)
                            .map(String::from),
                        parameters: schema.get("parameters").cloned(),
                        strict: None,
                    },
                })
            })
            .collect()
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(
        &self,
        messages: &[Message],
        tool_schemas: &[Value],
        settings: &ModelSettings,
    ) -> Result<ModelOutput, String> {
        let model = if settings.model.is_empty() {
            self.model.clone()
        } else {
            settings.model.clone()
        };

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&model)
            .messages(self.to_openai_messages(messages)?);
        if !tool_schemas.is_empty() {
            builder.tools(self.to_openai_tools(tool_schemas));
        }
        if let Some(t) = settings.temperature {
            builder.temperature(t);
        }
        if let Some(n) = settings.max_tokens {
            builder.max_tokens(n);
        }
        let request = builder.build().map_err(|e| e.to_string())?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| e.to_string())?;

        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| "empty choices".to_string())?;

        let requests: Vec<ToolCallRequest> = choice
            .message
            .tool_calls
            .into_iter()
            .flatten()
            .filter_map(|c| match c {
                ChatCompletionMessageToolCalls::Function(call) => Some(ToolCallRequest {
                    id: call.id,
                    tool: call.function.name,
                    args: serde_json::from_str(&call.function.arguments)
                        .unwrap_or_else(|_| serde_json::json!({})),
                }),
                _ => None,
            })
            .collect();
        if !requests.is_empty() {
            return Ok(ModelOutput::ToolCalls(requests));
        }

        Ok(ModelOutput::Final(choice.message.content.unwrap_or_default()))
    }
}
