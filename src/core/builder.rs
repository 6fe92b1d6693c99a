//! Agent 构建器与完成循环
//!
//! AgentBuilder 是对外的配置面：{tools, instructions, subagents, model, interrupt_config}。
//! build 时装配内置工具 + 用户工具 + task 工具，构造期校验子智能体工具子集
//! （ToolUnavailable 致命）；未显式指定的项取 AppConfig 默认值。
//! Agent::run / resume 驱动完成循环：模型调用与回合驱动交替，直到最终回复或挂起等待人审。

use std::collections::HashMap;
use std::sync::Arc;

use crate::approval::{ApprovalConfig, ApprovalGate, Disposition};
use crate::config::{load_config, AppConfig};
use crate::core::compression::{trim_messages, truncate_oversized_files, CompressionConfig};
use crate::core::state::{AgentState, Message};
use crate::core::turn::{run_turn, RejectedDisposition};
use crate::core::AgentError;
use crate::llm::{create_llm_from_config, LlmClient, ModelOutput, ModelSettings};
use crate::subagent::{SubAgentRuntime, SubAgentSpec};
use crate::tools::{
    EditFileTool, LsTool, ReadFileTool, TaskTool, Tool, ToolExecutor, ToolRegistry,
    WriteFileTool, WriteTodosTool,
};

/// 拼在用户指令之后的基础提示：让模型知道规划与子智能体工具的存在
const BASE_PROMPT: &str = "\n\nYou have access to a number of standard tools.\n\n\
## `write_todos`\n\n\
Use `write_todos` to plan and track multi-step work. Always declare the full plan; \
the list is replaced wholesale each time. Mark todos completed as soon as they are done.\n\n\
## `task`\n\n\
Use `task` to delegate self-contained work to an isolated sub-agent and keep \
its intermediate reasoning out of this conversation.";

/// 一次 run / resume 的产出：完成（最终回复），或挂起等待处置
#[derive(Debug)]
pub enum RunOutcome {
    Completed {
        state: AgentState,
        response: String,
    },
    /// pending_approvals 非空；rejected 列出被拒绝的处置（配置不允许等）
    Suspended {
        state: AgentState,
        rejected: Vec<RejectedDisposition>,
    },
}

/// 编排核心对外的句柄：完成循环 + 审批门 + 工具执行器
pub struct Agent {
    llm: Arc<dyn LlmClient>,
    executor: ToolExecutor,
    gate: ApprovalGate,
    system_prompt: String,
    settings: ModelSettings,
    max_turns: usize,
    compression: Option<CompressionConfig>,
}

impl Agent {
    pub fn builder(instructions: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(instructions)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.executor.tool_names()
    }

    /// 获取 LLM 累计 token 使用统计
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    /// 处理一条用户输入：跑完成循环直到最终回复或挂起。
    /// 已有 pending 审批时不执行任何工具，原样挂起等待处置。
    pub async fn run(
        &self,
        mut state: AgentState,
        input: impl Into<String>,
    ) -> Result<RunOutcome, AgentError> {
        state.messages.push(Message::user(input));
        if !state.pending_approvals.is_empty() {
            tracing::info!(
                pending = state.pending_approvals.len(),
                "run requested while suspended, awaiting dispositions"
            );
            return Ok(RunOutcome::Suspended {
                state,
                rejected: Vec::new(),
            });
        }
        self.drive(state).await
    }

    /// 补上外部到达的处置并继续完成循环；仍有 pending（含处置被拒绝）则继续挂起
    pub async fn resume(
        &self,
        state: AgentState,
        dispositions: Vec<(String, Disposition)>,
    ) -> Result<RunOutcome, AgentError> {
        let outcome = run_turn(&self.executor, &self.gate, state, Vec::new(), dispositions).await;
        if outcome.suspended {
            return Ok(RunOutcome::Suspended {
                state: outcome.state,
                rejected: outcome.rejected,
            });
        }
        self.drive(outcome.state).await
    }

    async fn drive(&self, mut state: AgentState) -> Result<RunOutcome, AgentError> {
        let schemas = self.executor.registry().schemas();

        for _ in 0..self.max_turns {
            let mut full = Vec::with_capacity(state.messages.len() + 2);
            full.push(Message::system(&self.system_prompt));
            full.extend(state.messages.iter().cloned());

            // 压缩只整形模型输入；state.messages 不动，超大文件就地截断
            if let Some(config) = &self.compression {
                if config.compress_files {
                    let truncated = truncate_oversized_files(&mut state.files, config);
                    if !truncated.is_empty() {
                        full.push(Message::system(format!(
                            "[Files truncated due to size limit ({} chars): {}]",
                            config.max_file_size,
                            truncated.join(", ")
                        )));
                    }
                }
                full = trim_messages(full, config);
            }

            let output = self
                .llm
                .complete(&full, &schemas, &self.settings)
                .await
                .map_err(AgentError::LlmError)?;

            match output {
                ModelOutput::Final(text) => {
                    state.messages.push(Message::assistant(text.clone()));
                    return Ok(RunOutcome::Completed {
                        state,
                        response: text,
                    });
                }
                ModelOutput::ToolCalls(calls) => {
                    state.messages.push(Message::assistant_tool_calls(calls.clone()));
                    let outcome =
                        run_turn(&self.executor, &self.gate, state, calls, Vec::new()).await;
                    state = outcome.state;
                    if outcome.suspended {
                        return Ok(RunOutcome::Suspended {
                            state,
                            rejected: outcome.rejected,
                        });
                    }
                }
            }
        }
        Err(AgentError::TurnLimitExceeded(self.max_turns))
    }
}

/// Agent 构建器：配置面 {tools, instructions, subagents, model, interrupt_config}
pub struct AgentBuilder {
    instructions: String,
    llm: Option<Arc<dyn LlmClient>>,
    tools: Vec<Arc<dyn Tool>>,
    builtin_tools: Option<Vec<String>>,
    subagents: Vec<SubAgentSpec>,
    interrupt_config: HashMap<String, ApprovalConfig>,
    message_prefix: Option<String>,
    settings: Option<ModelSettings>,
    max_turns: Option<usize>,
    tool_timeout_secs: Option<u64>,
    compression: Option<CompressionConfig>,
}

impl AgentBuilder {
    pub fn new(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            llm: None,
            tools: Vec::new(),
            builtin_tools: None,
            subagents: Vec::new(),
            interrupt_config: HashMap::new(),
            message_prefix: None,
            settings: None,
            max_turns: None,
            tool_timeout_secs: None,
            compression: None,
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// 注册用户工具（对子智能体同样可见，可被 spec.tool_names 引用）
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn with_tool_arc(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// 限定要装配的内置工具子集（按给定顺序注册）；不调用则全部内置工具可用。
    /// 引用不存在的内置工具名在 build 时报 UnknownTool。
    pub fn with_builtin_tools(mut self, names: Vec<String>) -> Self {
        self.builtin_tools = Some(names);
        self
    }

    pub fn with_subagent(mut self, spec: SubAgentSpec) -> Self {
        self.subagents.push(spec);
        self
    }

    /// 为指定工具名注册审批门配置；该工具的调用将被截获等待人审
    pub fn with_interrupt(mut self, tool_name: impl Into<String>, config: ApprovalConfig) -> Self {
        self.interrupt_config.insert(tool_name.into(), config);
        self
    }

    pub fn with_message_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.message_prefix = Some(prefix.into());
        self
    }

    pub fn with_model_settings(mut self, settings: ModelSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    pub fn with_tool_timeout_secs(mut self, secs: u64) -> Self {
        self.tool_timeout_secs = Some(secs);
        self
    }

    /// 启用上下文压缩（消息裁剪 + 超大文件截断）；不调用则不压缩
    pub fn with_compression(mut self, config: CompressionConfig) -> Self {
        self.compression = Some(config);
        self
    }

    /// 装配 Agent。子智能体 spec 引用未注册工具时在这里失败（ToolUnavailable），
    /// 绝不延迟到调度期。
    pub fn build(self) -> Result<Agent, AgentError> {
        let cfg = load_config(None).unwrap_or_else(|e| {
            tracing::warn!("Config load failed ({}), using defaults", e);
            AppConfig::default()
        });

        let llm = self.llm.unwrap_or_else(|| create_llm_from_config(&cfg));
        let settings = self
            .settings
            .unwrap_or_else(|| ModelSettings::new(cfg.llm.model.clone()));
        let max_turns = self.max_turns.unwrap_or(cfg.agent.max_turns);
        let timeout_secs = self.tool_timeout_secs.unwrap_or(cfg.agent.tool_timeout_secs);
        let message_prefix = self
            .message_prefix
            .unwrap_or(cfg.agent.approval_message_prefix);

        let all_builtins: Vec<Arc<dyn Tool>> = vec![
            Arc::new(WriteTodosTool),
            Arc::new(WriteFileTool),
            Arc::new(ReadFileTool),
            Arc::new(EditFileTool),
            Arc::new(LsTool),
        ];
        let mut base = ToolRegistry::new();
        match &self.builtin_tools {
            Some(names) => {
                for name in names {
                    let tool = all_builtins
                        .iter()
                        .find(|t| t.name() == name)
                        .cloned()
                        .ok_or_else(|| AgentError::UnknownTool(name.clone()))?;
                    base.register_arc(tool);
                }
            }
            None => {
                for tool in all_builtins {
                    base.register_arc(tool);
                }
            }
        }
        for tool in self.tools {
            base.register_arc(tool);
        }
        let base = Arc::new(base);

        let runtime = Arc::new(SubAgentRuntime::new(
            llm.clone(),
            base.clone(),
            &self.instructions,
            self.subagents,
            settings.clone(),
            max_turns,
            timeout_secs,
        )?);

        let mut full = (*base).clone();
        full.register(TaskTool::new(runtime));

        Ok(Agent {
            llm,
            executor: ToolExecutor::new(Arc::new(full), timeout_secs),
            gate: ApprovalGate::new(self.interrupt_config).with_message_prefix(message_prefix),
            system_prompt: format!("{}{}", self.instructions, BASE_PROMPT),
            settings,
            max_turns,
            compression: self.compression,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::ToolCallRequest;
    use crate::llm::MockLlmClient;
    use serde_json::json;

    fn scripted_agent(script: Vec<ModelOutput>) -> Agent {
        Agent::builder("You are a test agent.")
            .with_llm(Arc::new(MockLlmClient::with_script(script)))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builtins_registered() {
        let agent = scripted_agent(vec![]);
        let names = agent.tool_names();
        for builtin in ["write_todos", "write_file", "read_file", "edit_file", "ls", "task"] {
            assert!(names.contains(&builtin.to_string()), "missing {builtin}");
        }
    }

    #[test]
    fn test_subagent_with_bad_tool_fails_build() {
        let spec = SubAgentSpec::new("helper", "helps", "Help.")
            .with_tool_names(vec!["no_such_tool".to_string()]);
        let Err(err) = Agent::builder("x")
            .with_llm(Arc::new(MockLlmClient::new()))
            .with_subagent(spec)
            .build()
        else {
            panic!("expected ToolUnavailable");
        };
        assert!(matches!(err, AgentError::ToolUnavailable { .. }));
    }

    #[test]
    fn test_builtin_tools_subset() {
        let agent = Agent::builder("x")
            .with_llm(Arc::new(MockLlmClient::new()))
            .with_builtin_tools(vec!["read_file".to_string(), "ls".to_string()])
            .build()
            .unwrap();
        assert_eq!(agent.tool_names(), vec!["read_file", "ls", "task"]);
    }

    #[test]
    fn test_unknown_builtin_fails_build() {
        let Err(err) = Agent::builder("x")
            .with_llm(Arc::new(MockLlmClient::new()))
            .with_builtin_tools(vec!["shell".to_string()])
            .build()
        else {
            panic!("expected UnknownTool");
        };
        assert!(matches!(err, AgentError::UnknownTool(_)));
    }

    #[tokio::test]
    async fn test_compression_truncates_large_file() {
        let agent = Agent::builder("x")
            .with_llm(Arc::new(MockLlmClient::with_script(vec![
                ModelOutput::ToolCalls(vec![ToolCallRequest::new(
                    "write_file",
                    json!({"file_path": "dump.txt", "content": "X".repeat(900)}),
                )]),
                ModelOutput::Final("done".to_string()),
            ])))
            .with_compression(CompressionConfig {
                max_tokens: 8000,
                compress_files: true,
                max_file_size: 300,
            })
            .build()
            .unwrap();

        let RunOutcome::Completed { state, .. } =
            agent.run(AgentState::new(), "dump it").await.unwrap()
        else {
            panic!("expected completion");
        };
        let content = state.files.read("dump.txt").unwrap();
        assert!(content.contains("characters omitted"));
        assert!(content.chars().count() < 900);
    }

    #[tokio::test]
    async fn test_run_tool_call_then_final() {
        let agent = scripted_agent(vec![
            ModelOutput::ToolCalls(vec![ToolCallRequest::new(
                "write_file",
                json!({"file_path": "notes.md", "content": "remember"}),
            )]),
            ModelOutput::Final("done".to_string()),
        ]);

        let outcome = agent.run(AgentState::new(), "take a note").await.unwrap();
        let RunOutcome::Completed { state, response } = outcome else {
            panic!("expected completion");
        };
        assert_eq!(response, "done");
        assert_eq!(state.files.read("notes.md").unwrap(), "remember");
        // user / assistant(tool_calls) / tool / assistant
        assert_eq!(state.messages.len(), 4);
    }

    #[tokio::test]
    async fn test_run_while_suspended_executes_nothing() {
        let agent = scripted_agent(vec![ModelOutput::ToolCalls(vec![ToolCallRequest::new(
            "write_file",
            json!({"file_path": "a.txt", "content": "x"}),
        )])]);
        let agent = Agent {
            gate: ApprovalGate::new(HashMap::from([(
                "write_file".to_string(),
                ApprovalConfig::default(),
            )])),
            ..agent
        };

        let outcome = agent.run(AgentState::new(), "write it").await.unwrap();
        let RunOutcome::Suspended { state, .. } = outcome else {
            panic!("expected suspension");
        };

        // 挂起状态下再次 run：不执行工具，继续挂起
        let outcome = agent.run(state, "hurry up").await.unwrap();
        let RunOutcome::Suspended { state, .. } = outcome else {
            panic!("expected suspension");
        };
        assert!(state.files.is_empty());
        assert_eq!(state.pending_approvals.len(), 1);
    }
}
