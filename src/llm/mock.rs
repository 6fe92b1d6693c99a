//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 可注入脚本：每次 complete 按序弹出一个 ModelOutput；脚本耗尽后回显最后一条 User 消息，
//! 便于本地跑通完整编排流程。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::state::{Message, Role};
use crate::llm::{LlmClient, ModelOutput, ModelSettings};

/// Mock 客户端：脚本驱动，脚本耗尽后回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<ModelOutput>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(outputs: Vec<ModelOutput>) -> Self {
        Self {
            script: Mutex::new(outputs.into()),
        }
    }

    /// 追加脚本步骤（测试中途补脚本用）
    pub fn push(&self, output: ModelOutput) {
        self.script.lock().expect("mock script lock").push_back(output);
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(
        &self,
        messages: &[Message],
        _tool_schemas: &[Value],
        _settings: &ModelSettings,
    ) -> Result<ModelOutput, String> {
        if let Some(next) = self.script.lock().expect("mock script lock").pop_front() {
            return Ok(next);
        }

        let last_user = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        Ok(ModelOutput::Final(format!("Echo from Mock: {last_user}")))
    }
}
