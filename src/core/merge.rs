//! 状态合并引擎
//!
//! 把回合起点状态与若干 partial delta（每个来自一次直接工具执行或一次已处置审批）合并成
//! 回合终点状态。全程不加锁：各执行只读快照、只产出 delta，仅本引擎每回合串行改一次正典状态。
//! 同名文件写入与多次 todos 整表替换按 delta 产生顺序 last-writer-wins——这是文档化策略，
//! 不是冲突错误；给定固定的 delta 产生顺序，合并结果确定。

use serde::{Deserialize, Serialize};

use crate::approval::ApprovalRecord;
use crate::core::state::{AgentState, Message};
use crate::store::TodoItem;

/// 一次工具执行产出的 partial 状态更新
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StateDelta {
    /// 文件写入（产生顺序）；合并时逐条 apply，同名后写者胜
    pub file_writes: Vec<(String, String)>,
    /// 任务清单整表替换；一回合多个 Some 时最后一个胜
    pub todos: Option<Vec<TodoItem>>,
    /// 新增消息（工具结果、子智能体摘要）
    pub messages: Vec<Message>,
}

impl StateDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_file(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.file_writes.push((name.into(), content.into()));
        self
    }

    pub fn set_todos(mut self, todos: Vec<TodoItem>) -> Self {
        self.todos = Some(todos);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.file_writes.is_empty() && self.todos.is_none() && self.messages.is_empty()
    }
}

/// 合并：起点状态 + 按产生顺序排列的 deltas + 本回合已处置的 call id + 本回合新停驻的审批记录。
/// 消息按 delta 顺序追加到既有消息之后；pending = 旧集合 - 已处置 + 新停驻。
pub fn merge(
    start: &AgentState,
    deltas: &[StateDelta],
    resolved_ids: &[String],
    parked: Vec<(String, ApprovalRecord)>,
) -> AgentState {
    let mut state = start.clone();

    for delta in deltas {
        for (name, content) in &delta.file_writes {
            state.files.write(name.clone(), content.clone());
        }
        if let Some(todos) = &delta.todos {
            state.todos = todos.clone();
        }
        state.messages.extend(delta.messages.iter().cloned());
    }

    for id in resolved_ids {
        state.pending_approvals.remove(id);
    }
    for (id, record) in parked {
        state.pending_approvals.insert(id, record);
    }

    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::{ApprovalGate, ApprovalStatus};
    use crate::core::state::ToolCallRequest;
    use crate::store::TodoStatus;
    use serde_json::json;

    #[test]
    fn test_file_writes_last_writer_wins() {
        let start = AgentState::new();
        let deltas = vec![
            StateDelta::new().write_file("a.txt", "x"),
            StateDelta::new().write_file("a.txt", "y"),
        ];
        let merged = merge(&start, &deltas, &[], vec![]);
        assert_eq!(merged.files.read("a.txt").unwrap(), "y");
    }

    #[test]
    fn test_merge_equals_sequential_application() {
        // 合并等价于按同一顺序逐条 apply
        let start = AgentState::new();
        let deltas = vec![
            StateDelta::new().write_file("a.txt", "1").write_file("b.txt", "2"),
            StateDelta::new().write_file("c.txt", "3"),
            StateDelta::new().write_file("b.txt", "4"),
        ];
        let merged = merge(&start, &deltas, &[], vec![]);

        let mut expected = start.files.clone();
        for delta in &deltas {
            for (name, content) in &delta.file_writes {
                expected.write(name.clone(), content.clone());
            }
        }
        assert_eq!(merged.files.read("a.txt").unwrap(), "1");
        assert_eq!(merged.files.read("b.txt").unwrap(), "4");
        assert_eq!(merged.files.list(), expected.list());
    }

    #[test]
    fn test_last_todos_delta_wins() {
        let start = AgentState::new();
        let deltas = vec![
            StateDelta::new().set_todos(vec![TodoItem::pending("old")]),
            StateDelta::new().set_todos(vec![
                TodoItem::pending("a"),
                TodoItem::in_progress("b"),
            ]),
        ];
        let merged = merge(&start, &deltas, &[], vec![]);
        assert_eq!(merged.todos.len(), 2);
        assert_eq!(merged.todos[1].status, TodoStatus::InProgress);
    }

    #[test]
    fn test_messages_append_after_existing() {
        let mut start = AgentState::new();
        start.messages.push(Message::user("hi"));

        let mut d1 = StateDelta::new();
        d1.messages.push(Message::tool("c1", "first"));
        let mut d2 = StateDelta::new();
        d2.messages.push(Message::tool("c2", "second"));

        let merged = merge(&start, &[d1, d2], &[], vec![]);
        assert_eq!(merged.messages.len(), 3);
        assert_eq!(merged.messages[0].content, "hi");
        assert_eq!(merged.messages[1].content, "first");
        assert_eq!(merged.messages[2].content, "second");
    }

    #[test]
    fn test_pending_recompute() {
        let gate = ApprovalGate::empty();
        let call_a = ToolCallRequest::new("write_file", json!({}));
        let call_b = ToolCallRequest::new("shell", json!({}));

        let mut start = AgentState::new();
        start
            .pending_approvals
            .insert(call_a.id.clone(), gate.park(&call_a));

        let parked = vec![(call_b.id.clone(), gate.park(&call_b))];
        let merged = merge(&start, &[], &[call_a.id.clone()], parked);

        assert!(!merged.pending_approvals.contains_key(&call_a.id));
        let record = &merged.pending_approvals[&call_b.id];
        assert_eq!(record.status, ApprovalStatus::Pending);
    }
}
