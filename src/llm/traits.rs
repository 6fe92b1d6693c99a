//! LLM 客户端抽象
//!
//! 模型调用是外部协作者：本核心只递交 (messages, 工具 schema, 模型配置)，收回最终回复
//! 或一组 tool call 请求，从不检视消息内容本身。所有后端（OpenAI 兼容 / Mock）实现 LlmClient。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::state::{Message, ToolCallRequest};

/// 模型配置：模型名与采样参数；子智能体 spec 可整体覆盖
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelSettings {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ModelSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }
}

/// 一次模型调用的产出：最终回复，或一组（逻辑上并发的）tool call 请求
#[derive(Clone, Debug)]
pub enum ModelOutput {
    Final(String),
    ToolCalls(Vec<ToolCallRequest>),
}

/// LLM 客户端 trait：携带工具 schema 的补全
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[Message],
        tool_schemas: &[Value],
        settings: &ModelSettings,
    ) -> Result<ModelOutput, String>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
