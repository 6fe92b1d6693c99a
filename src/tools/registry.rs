//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），由 ToolRegistry
//! 按名注册与查找。execute 只读回合起点快照并返回 ToolOutcome（结果文本 + StateDelta），
//! 绝不就地修改共享状态——合并交给 merge 引擎。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::merge::StateDelta;
use crate::core::state::TurnSnapshot;
use crate::core::AgentError;

/// 一次工具执行的产出：给模型看的结果文本 + 待合并的 partial 状态更新
#[derive(Clone, Debug, Default)]
pub struct ToolOutcome {
    pub message: String,
    pub delta: StateDelta,
}

impl ToolOutcome {
    /// 纯结果文本，无状态更新（读类工具）
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            message: text.into(),
            delta: StateDelta::new(),
        }
    }

    pub fn with_delta(text: impl Into<String>, delta: StateDelta) -> Self {
        Self {
            message: text.into(),
            delta,
        }
    }
}

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON、输入为快照）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（tool call 中的 "tool" 字段）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema（供 LLM 生成正确的参数格式）
    /// 默认返回空对象，表示无参数或参数格式不限
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 对回合起点快照执行工具；Err 文本会作为 tool result 返还给模型
    async fn execute(&self, args: Value, snapshot: &TurnSnapshot) -> Result<ToolOutcome, String>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>，注册顺序决定 schema 列表顺序
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// 取子集（子智能体的受限注册表）；名称缺失返回 UnknownTool——
    /// 正常路径下构造期已校验过，此处只是兜底
    pub fn subset(&self, names: &[String]) -> Result<ToolRegistry, AgentError> {
        let mut registry = ToolRegistry::new();
        for name in names {
            let tool = self
                .get(name)
                .ok_or_else(|| AgentError::UnknownTool(name.clone()))?;
            registry.register_arc(tool);
        }
        Ok(registry)
    }

    /// 按注册顺序生成 {name, description, parameters} 列表，供模型请求携带
    pub fn schemas(&self) -> Vec<Value> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| {
                serde_json::json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "parameters": tool.parameters_schema(),
                })
            })
            .collect()
    }

    /// 工具 schema 的 JSON 字符串（可拼入 prompt 或调试输出）
    pub fn to_schema_json(&self) -> String {
        serde_json::to_string_pretty(&self.schemas()).unwrap_or_else(|_| "[]".to_string())
    }
}
