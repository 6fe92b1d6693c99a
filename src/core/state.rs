//! 回合状态：消息、文件、任务清单与待审批集合
//!
//! AgentState 是一个编排回合的事实单元，回合期间由 turn driver 独占；回合之间交还外部调度器
//! （是否持久化 / 重放由其自理，全量 serde 可序列化）。messages 只追加；files / todos 是
//! 回合作用域的 copy-on-merge 值；pending_approvals 中出现某 call id 当且仅当该调用已被
//! 审批门截获且尚未处置。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::approval::ApprovalRecord;
use crate::store::{FileStore, TodoItem};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// 模型请求的一次工具调用：{id, tool, args}
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub tool: String,
    pub args: Value,
}

impl ToolCallRequest {
    /// 构造带随机 id 的调用请求（mock 后端与测试用）
    pub fn new(tool: impl Into<String>, args: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tool: tool.into(),
            args,
        }
    }
}

/// 单条消息；assistant 消息可携带 tool_calls，tool 消息通过 tool_call_id 关联请求
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// 请求工具调用的 assistant 消息
    pub fn assistant_tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_calls: calls,
            tool_call_id: None,
        }
    }

    /// 工具执行结果消息，关联到请求的 call id
    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// 一个编排回合的全部状态
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AgentState {
    pub messages: Vec<Message>,
    pub files: FileStore,
    pub todos: Vec<TodoItem>,
    pub pending_approvals: HashMap<String, ApprovalRecord>,
}

impl AgentState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 外部调度器可预置文件（如任务素材）
    pub fn with_files(files: FileStore) -> Self {
        Self {
            files,
            ..Self::default()
        }
    }

    /// 回合起点快照：并发执行的每个工具调用都只看这份快照，互不竞争
    pub fn snapshot(&self) -> TurnSnapshot {
        TurnSnapshot {
            files: self.files.clone(),
            todos: self.todos.clone(),
        }
    }
}

/// 回合起点的只读快照（files + todos），工具执行的输入
#[derive(Clone, Debug, Default)]
pub struct TurnSnapshot {
    pub files: FileStore,
    pub todos: Vec<TodoItem>,
}
