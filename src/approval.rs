//! 审批门：人审截获与处置
//!
//! 每个 call id 的状态机：unseen -> pending -> resolved。工具名注册了 ApprovalConfig 的调用
//! 首次出现时生成 pending ApprovalRecord（含人类可读描述）并中止该调用的执行，记录由外部
//! 调度器呈现给人审边界；处置（Disposition）从外部到达后按配置校验合法性，不合法的处置
//! 是显式拒绝而非静默跳过，记录保持 pending。同一回合内多个被门控的调用相互独立，
//! 可按任意顺序处置。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::state::ToolCallRequest;
use crate::core::AgentError;

/// 审批描述的默认前缀
pub const DEFAULT_MESSAGE_PREFIX: &str = "Tool execution requires approval";

/// 每个工具名一份：声明哪些处置方式合法
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ApprovalConfig {
    pub allow_ignore: bool,
    pub allow_respond: bool,
    pub allow_edit: bool,
    pub allow_accept: bool,
}

impl Default for ApprovalConfig {
    /// 默认允许 accept / edit / respond，不允许 ignore
    fn default() -> Self {
        Self {
            allow_ignore: false,
            allow_respond: true,
            allow_edit: true,
            allow_accept: true,
        }
    }
}

impl ApprovalConfig {
    /// 仅允许 accept（最严格的放行配置）
    pub fn accept_only() -> Self {
        Self {
            allow_ignore: false,
            allow_respond: false,
            allow_edit: false,
            allow_accept: true,
        }
    }
}

/// 人审处置：ignore 丢弃调用 / accept 原样执行 / edit 换参执行 / respond 人类文本直接作为工具结果
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Disposition {
    Ignore,
    Accept,
    Edit { args: Value },
    Respond { text: String },
}

impl Disposition {
    pub fn label(&self) -> &'static str {
        match self {
            Disposition::Ignore => "ignore",
            Disposition::Accept => "accept",
            Disposition::Edit { .. } => "edit",
            Disposition::Respond { .. } => "respond",
        }
    }
}

/// 审批记录状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Resolved,
}

/// 一次被截获调用的审批记录；处置完成且效果合并后即从 pending 集合移除，
/// 翻成 resolved 的副本随 TurnOutcome 交还外部调度器留痕
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub tool_name: String,
    pub arguments: Value,
    pub config: ApprovalConfig,
    pub description: String,
    pub status: ApprovalStatus,
}

impl ApprovalRecord {
    /// 处置完成后的记录副本（状态翻到 resolved）
    pub fn resolve(&self) -> ApprovalRecord {
        let mut record = self.clone();
        record.status = ApprovalStatus::Resolved;
        record
    }
}

/// 审批门：按工具名查配置，生成记录并校验处置合法性
#[derive(Clone, Debug, Default)]
pub struct ApprovalGate {
    configs: HashMap<String, ApprovalConfig>,
    message_prefix: String,
}

impl ApprovalGate {
    pub fn new(configs: HashMap<String, ApprovalConfig>) -> Self {
        Self {
            configs,
            message_prefix: DEFAULT_MESSAGE_PREFIX.to_string(),
        }
    }

    /// 无门控（子智能体运行用：嵌套运行一跑到底，不设人审暂停点）
    pub fn empty() -> Self {
        Self::new(HashMap::new())
    }

    pub fn with_message_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.message_prefix = prefix.into();
        self
    }

    pub fn is_gated(&self, tool_name: &str) -> bool {
        self.configs.contains_key(tool_name)
    }

    /// 截获调用，生成 pending 记录（描述 = 前缀 + 工具名 + 参数）
    pub fn park(&self, call: &ToolCallRequest) -> ApprovalRecord {
        let config = self.configs.get(&call.tool).copied().unwrap_or_default();
        let description = format!(
            "{}\n\nTool: {}\nArgs: {}",
            self.message_prefix, call.tool, call.args
        );
        tracing::info!(call_id = %call.id, tool = %call.tool, "approval pending");
        ApprovalRecord {
            tool_name: call.tool.clone(),
            arguments: call.args.clone(),
            config,
            description,
            status: ApprovalStatus::Pending,
        }
    }

    /// 校验处置是否被该记录的配置允许；不允许返回 IllegalDisposition
    pub fn authorize(
        record: &ApprovalRecord,
        disposition: &Disposition,
    ) -> Result<(), AgentError> {
        let allowed = match disposition {
            Disposition::Ignore => record.config.allow_ignore,
            Disposition::Accept => record.config.allow_accept,
            Disposition::Edit { .. } => record.config.allow_edit,
            Disposition::Respond { .. } => record.config.allow_respond,
        };
        if allowed {
            Ok(())
        } else {
            Err(AgentError::IllegalDisposition {
                tool: record.tool_name.clone(),
                disposition: disposition.label().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gate_with(tool: &str, config: ApprovalConfig) -> ApprovalGate {
        let mut configs = HashMap::new();
        configs.insert(tool.to_string(), config);
        ApprovalGate::new(configs)
    }

    #[test]
    fn test_park_builds_description() {
        let gate = gate_with("write_file", ApprovalConfig::default());
        let call = ToolCallRequest::new("write_file", json!({"file_path": "a.txt"}));
        let record = gate.park(&call);
        assert_eq!(record.status, ApprovalStatus::Pending);
        assert!(record.description.starts_with(DEFAULT_MESSAGE_PREFIX));
        assert!(record.description.contains("Tool: write_file"));
        assert!(record.description.contains("a.txt"));
    }

    #[test]
    fn test_custom_message_prefix() {
        let gate = gate_with("shell", ApprovalConfig::default())
            .with_message_prefix("Needs a human");
        let record = gate.park(&ToolCallRequest::new("shell", json!({})));
        assert!(record.description.starts_with("Needs a human"));
    }

    #[test]
    fn test_authorize_rejects_disallowed() {
        let gate = gate_with("write_file", ApprovalConfig::accept_only());
        let record = gate.park(&ToolCallRequest::new("write_file", json!({})));

        assert!(ApprovalGate::authorize(&record, &Disposition::Accept).is_ok());
        let err = ApprovalGate::authorize(
            &record,
            &Disposition::Respond {
                text: "no".to_string(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, AgentError::IllegalDisposition { .. }));
    }

    #[test]
    fn test_ignore_only_config() {
        let config = ApprovalConfig {
            allow_ignore: true,
            allow_respond: false,
            allow_edit: false,
            allow_accept: false,
        };
        let gate = gate_with("shell", config);
        let record = gate.park(&ToolCallRequest::new("shell", json!({})));
        assert!(ApprovalGate::authorize(&record, &Disposition::Ignore).is_ok());
        assert!(ApprovalGate::authorize(&record, &Disposition::Accept).is_err());
    }
}
