//! 规划内置工具：write_todos
//!
//! 「无副作用规划工具」：除整表替换 todos 外不做任何业务逻辑，存在的意义是让完整计划
//! 始终留在上下文中。

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::merge::StateDelta;
use crate::core::state::TurnSnapshot;
use crate::store::{set_all, TodoItem};
use crate::tools::schema::schema_value;
use crate::tools::{Tool, ToolOutcome};

#[derive(Deserialize, JsonSchema)]
struct WriteTodosArgs {
    /// 完整的新任务列表（整表替换旧列表）
    todos: Vec<TodoItem>,
}

/// write_todos 工具：整表替换任务清单
pub struct WriteTodosTool;

#[async_trait]
impl Tool for WriteTodosTool {
    fn name(&self) -> &str {
        "write_todos"
    }

    fn description(&self) -> &str {
        "Replace the entire todo list with a new plan. Args: {\"todos\": [{\"content\": \"...\", \"status\": \"pending|in_progress|completed\"}]}"
    }

    fn parameters_schema(&self) -> Value {
        schema_value::<WriteTodosArgs>()
    }

    async fn execute(&self, args: Value, _snapshot: &TurnSnapshot) -> Result<ToolOutcome, String> {
        let args: WriteTodosArgs =
            serde_json::from_value(args).map_err(|e| format!("Error: Invalid arguments: {e}"))?;
        let todos = set_all(args.todos);
        let rendered = serde_json::to_string(&todos).unwrap_or_else(|_| "[]".to_string());
        let delta = StateDelta::new().set_todos(todos);
        Ok(ToolOutcome::with_delta(
            format!("Updated todo list to {rendered}"),
            delta,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_write_todos_replaces_wholesale() {
        let args = json!({"todos": [
            {"content": "plan", "status": "completed"},
            {"content": "build", "status": "in_progress"},
        ]});
        let outcome = WriteTodosTool
            .execute(args, &TurnSnapshot::default())
            .await
            .unwrap();
        let todos = outcome.delta.todos.unwrap();
        assert_eq!(todos.len(), 2);
        assert!(outcome.message.starts_with("Updated todo list to"));
    }

    #[tokio::test]
    async fn test_bad_status_rejected() {
        let args = json!({"todos": [{"content": "x", "status": "someday"}]});
        let err = WriteTodosTool
            .execute(args, &TurnSnapshot::default())
            .await
            .unwrap_err();
        assert!(err.starts_with("Error: Invalid arguments"));
    }
}
