//! 任务清单（规划用）
//!
//! 有序 TodoItem 列表，仅作为规划痕迹存在：顺序由调用方决定，允许重复内容，
//! 不校验状态流转（pending 可直接跳到 completed）。唯一操作是整表替换（set_all），
//! 不提供增量修改——规划者每次都必须声明完整计划，避免局部更新与模型心智模型脱节。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// 任务状态：pending / in_progress / completed，不强制流转顺序
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

/// 单条任务：内容 + 状态，无唯一性约束
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TodoItem {
    pub content: String,
    pub status: TodoStatus,
}

impl TodoItem {
    pub fn pending(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            status: TodoStatus::Pending,
        }
    }

    pub fn in_progress(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            status: TodoStatus::InProgress,
        }
    }

    pub fn completed(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            status: TodoStatus::Completed,
        }
    }
}

/// 整表替换：丢弃旧列表，返回新列表（唯一暴露的任务清单操作）
pub fn set_all(items: Vec<TodoItem>) -> Vec<TodoItem> {
    items
}
