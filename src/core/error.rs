//! Agent 错误类型
//!
//! 分两类传播：可恢复错误（文件不存在、匹配歧义、未知工具等）渲染为 tool result 文本返还给模型，
//! 让模型自行纠正参数重试；构造期错误（ToolUnavailable、配置解析失败）在 build 时直接返回 Err，
//! 绝不延迟到运行期。

use thiserror::Error;

/// Agent 运行过程中可能出现的错误（文件、审批、子智能体、LLM 等）
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("File '{0}' not found")]
    FileNotFound(String),

    /// edit 的 match 文本在文件中不存在
    #[error("String not found in file: '{0}'")]
    MatchNotFound(String),

    /// replace_all=false 且 match 文本出现多于一次，存储保持不变
    #[error("String '{needle}' appears {count} times in file '{file}'")]
    AmbiguousMatch {
        file: String,
        needle: String,
        count: usize,
    },

    #[error("Unknown sub-agent: {0}")]
    UnknownSubAgent(String),

    /// 子智能体 spec 引用了父注册表之外的工具名；构造期致命错误
    #[error("Sub-agent '{subagent}' references unregistered tool '{tool}'")]
    ToolUnavailable { subagent: String, tool: String },

    /// 审批配置不允许的处置方式；该审批保持 pending，等待修正后的处置
    #[error("Disposition '{disposition}' not allowed for tool '{tool}'")]
    IllegalDisposition { tool: String, disposition: String },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    /// 完成循环超过轮数上限仍未产生最终回复
    #[error("Turn limit exceeded: {0}")]
    TurnLimitExceeded(usize),
}
