//! 子智能体：隔离调度
//!
//! 把命名的 SubAgentSpec 作为隔离的嵌套运行执行，并只回折有限的副作用集合。
//! 上下文检疫（context quarantine）是核心不变式：信息只通过任务描述与当前文件快照流入
//! 子智能体，只通过文件 delta 与单条摘要消息流出；父级对话历史对嵌套运行不可见，
//! 嵌套运行也绝不触碰父级 messages。spec.tool_names 在构造期校验（ToolUnavailable 致命），
//! 调度期只做兜底。子智能体可递归调度子智能体。

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::state::{AgentState, Message};
use crate::core::turn::run_to_completion;
use crate::core::AgentError;
use crate::llm::{LlmClient, ModelSettings};
use crate::store::FileStore;
use crate::tools::{TaskTool, ToolExecutor, ToolRegistry};

/// 保留的通用子智能体名：父级完整指令 + 完整工具集
pub const GENERAL_PURPOSE: &str = "general-purpose";

/// 子智能体规格；父 Agent 构造完成后不可变
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubAgentSpec {
    pub name: String,
    /// 供父级决定是否调度（进入 task 工具描述）
    pub description: String,
    /// 嵌套运行的 system prompt
    pub prompt: String,
    /// 限定嵌套运行可用的工具子集；None 表示完整继承父级工具集
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_names: Option<Vec<String>>,
    /// 仅对该嵌套运行生效的模型配置覆盖
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_settings: Option<ModelSettings>,
}

impl SubAgentSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            prompt: prompt.into(),
            tool_names: None,
            model_settings: None,
        }
    }

    pub fn with_tool_names(mut self, names: Vec<String>) -> Self {
        self.tool_names = Some(names);
        self
    }

    pub fn with_model_settings(mut self, settings: ModelSettings) -> Self {
        self.model_settings = Some(settings);
        self
    }
}

/// 嵌套运行回折给父级的副作用集合：文件终态 + 单条摘要
#[derive(Debug)]
pub struct SubAgentResult {
    pub files: FileStore,
    pub summary: String,
}

/// 子智能体运行时：规格表 + 父级基础工具 + LLM，按名调度嵌套运行
pub struct SubAgentRuntime {
    llm: Arc<dyn LlmClient>,
    /// 父级基础注册表（内置 + 用户工具，不含 task 工具；task 每次调度时重新挂上以支持递归）
    base_tools: Arc<ToolRegistry>,
    specs: HashMap<String, SubAgentSpec>,
    /// 注册顺序（task 工具描述用）
    order: Vec<String>,
    settings: ModelSettings,
    max_turns: usize,
    tool_timeout_secs: u64,
}

impl SubAgentRuntime {
    /// 构造运行时：隐式注册 general-purpose（父级指令、完整工具集），
    /// 并逐一校验 spec.tool_names 都在父级注册表内——缺失即 ToolUnavailable，构造期致命
    pub fn new(
        llm: Arc<dyn LlmClient>,
        base_tools: Arc<ToolRegistry>,
        instructions: &str,
        subagents: Vec<SubAgentSpec>,
        settings: ModelSettings,
        max_turns: usize,
        tool_timeout_secs: u64,
    ) -> Result<Self, AgentError> {
        let mut specs = HashMap::new();
        let mut order = Vec::new();

        let general = SubAgentSpec::new(
            GENERAL_PURPOSE,
            "General-purpose agent with the full tool set, for multi-step tasks",
            instructions,
        );
        order.push(general.name.clone());
        specs.insert(general.name.clone(), general);

        for spec in subagents {
            if let Some(names) = &spec.tool_names {
                for name in names {
                    if !base_tools.contains(name) && name != TaskTool::NAME {
                        return Err(AgentError::ToolUnavailable {
                            subagent: spec.name.clone(),
                            tool: name.clone(),
                        });
                    }
                }
            }
            if !specs.contains_key(&spec.name) {
                order.push(spec.name.clone());
            }
            specs.insert(spec.name.clone(), spec);
        }

        Ok(Self {
            llm,
            base_tools,
            specs,
            order,
            settings,
            max_turns,
            tool_timeout_secs,
        })
    }

    /// "- name: description" 列表（task 工具描述用）
    pub fn agent_catalog(&self) -> String {
        self.order
            .iter()
            .filter_map(|name| self.specs.get(name))
            .map(|spec| format!("- {}: {}", spec.name, spec.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 调度一次嵌套运行：全新消息序列（仅 spec prompt + 任务描述）、受限注册表、
    /// 可覆盖的模型配置；跑到嵌套运行自身完成后回折 {文件终态, 摘要}
    pub async fn dispatch(
        self: &Arc<Self>,
        name: &str,
        task: &str,
        files: FileStore,
    ) -> Result<SubAgentResult, AgentError> {
        let spec = self
            .specs
            .get(name)
            .ok_or_else(|| AgentError::UnknownSubAgent(name.to_string()))?;

        let mut registry = match &spec.tool_names {
            Some(names) => self.base_tools.subset(names)?,
            None => (*self.base_tools).clone(),
        };
        // 递归调度：嵌套注册表总是带上 task 工具
        registry.register(TaskTool::new(self.clone()));

        let executor = ToolExecutor::new(Arc::new(registry), self.tool_timeout_secs);
        let settings = spec
            .model_settings
            .clone()
            .unwrap_or_else(|| self.settings.clone());

        tracing::info!(subagent = %name, "dispatching sub-agent");

        let mut state = AgentState::with_files(files);
        state.messages.push(Message::user(task));

        let (state, summary) = run_to_completion(
            self.llm.as_ref(),
            &executor,
            &spec.prompt,
            &settings,
            state,
            self.max_turns,
        )
        .await?;

        tracing::info!(subagent = %name, files = state.files.len(), "sub-agent completed");
        Ok(SubAgentResult {
            files: state.files,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::tools::{LsTool, ReadFileTool, WriteFileTool};

    fn base_tools() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(ReadFileTool);
        registry.register(WriteFileTool);
        registry.register(LsTool);
        Arc::new(registry)
    }

    fn runtime(subagents: Vec<SubAgentSpec>) -> Result<SubAgentRuntime, AgentError> {
        SubAgentRuntime::new(
            Arc::new(MockLlmClient::new()),
            base_tools(),
            "You are a helpful assistant.",
            subagents,
            ModelSettings::new("mock"),
            10,
            5,
        )
    }

    #[test]
    fn test_general_purpose_always_present() {
        let runtime = runtime(vec![]).unwrap();
        assert!(runtime.specs.contains_key(GENERAL_PURPOSE));
        assert!(runtime.agent_catalog().contains(GENERAL_PURPOSE));
    }

    #[test]
    fn test_unknown_tool_name_fails_at_construction() {
        let spec = SubAgentSpec::new("researcher", "finds things", "Research.")
            .with_tool_names(vec!["read_file".to_string(), "browse".to_string()]);
        let Err(err) = runtime(vec![spec]) else {
            panic!("expected ToolUnavailable");
        };
        assert!(matches!(
            err,
            AgentError::ToolUnavailable { ref tool, .. } if tool == "browse"
        ));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_subagent() {
        let runtime = Arc::new(runtime(vec![]).unwrap());
        let err = runtime
            .dispatch("nope", "do something", FileStore::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::UnknownSubAgent(_)));
    }

    #[tokio::test]
    async fn test_dispatch_runs_to_completion() {
        // mock 脚本为空：直接回显任务描述为最终回复
        let runtime = Arc::new(runtime(vec![]).unwrap());
        let result = runtime
            .dispatch(GENERAL_PURPOSE, "summarize the files", FileStore::new())
            .await
            .unwrap();
        assert!(result.summary.contains("summarize the files"));
    }
}
