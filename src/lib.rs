//! Hive - 会话式深度智能体编排核心
//!
//! 模块划分：
//! - **approval**: 审批门（人审截获、处置校验）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 编排核心（状态、合并引擎、回合驱动、Agent 构建器）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **observability**: tracing 初始化
//! - **store**: 虚拟文件存储与任务清单
//! - **subagent**: 子智能体规格与隔离调度运行时
//! - **tools**: 工具箱（文件、规划、task 调度）与执行器

pub mod approval;
pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod store;
pub mod subagent;
pub mod tools;

pub use approval::{ApprovalConfig, ApprovalGate, ApprovalRecord, ApprovalStatus, Disposition};
pub use self::core::{
    Agent, AgentBuilder, AgentError, AgentState, CompressionConfig, Message, RejectedDisposition,
    Role, RunOutcome, StateDelta, ToolCallRequest, TurnOutcome, TurnSnapshot,
};
pub use llm::{LlmClient, MockLlmClient, ModelOutput, ModelSettings, OpenAiClient};
pub use store::{FileStore, TodoItem, TodoStatus};
pub use subagent::{SubAgentSpec, GENERAL_PURPOSE};
pub use tools::{Tool, ToolOutcome, ToolRegistry};
