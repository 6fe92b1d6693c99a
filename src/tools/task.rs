//! 子智能体调度内置工具：task
//!
//! 把任务描述递交给命名的子智能体做隔离的嵌套运行；返回的摘要作为工具结果，
//! 相对快照变化的文件作为 delta 回折给父回合。并发调度的多个 task 调用各自独立，
//! 父级 merge 按 last-writer-wins 合并它们的文件 delta。

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::merge::StateDelta;
use crate::core::state::TurnSnapshot;
use crate::subagent::SubAgentRuntime;
use crate::tools::schema::schema_value;
use crate::tools::{Tool, ToolOutcome};

#[derive(Deserialize, JsonSchema)]
struct TaskArgs {
    /// 交给子智能体的任务描述（子智能体能看到的唯一上下文）
    description: String,
    /// 子智能体名；"general-purpose" 总是可用
    subagent_type: String,
}

/// task 工具：调度子智能体嵌套运行
pub struct TaskTool {
    runtime: Arc<SubAgentRuntime>,
    description: String,
}

impl TaskTool {
    pub const NAME: &'static str = "task";

    pub fn new(runtime: Arc<SubAgentRuntime>) -> Self {
        let description = format!(
            "Launch an isolated sub-agent to handle a task. The sub-agent only sees the task \
             description and the current files; it returns a summary and its file changes. \
             Available agents:\n{}",
            runtime.agent_catalog()
        );
        Self {
            runtime,
            description,
        }
    }
}

#[async_trait]
impl Tool for TaskTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        schema_value::<TaskArgs>()
    }

    async fn execute(&self, args: Value, snapshot: &TurnSnapshot) -> Result<ToolOutcome, String> {
        let args: TaskArgs =
            serde_json::from_value(args).map_err(|e| format!("Error: Invalid arguments: {e}"))?;

        let result = self
            .runtime
            .dispatch(&args.subagent_type, &args.description, snapshot.files.clone())
            .await
            .map_err(|e| format!("Error: {e}"))?;

        let mut delta = StateDelta::new();
        delta.file_writes = result.files.diff_from(&snapshot.files);
        Ok(ToolOutcome::with_delta(result.summary, delta))
    }
}
