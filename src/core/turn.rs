//! 回合驱动器
//!
//! 一个回合：外部调度器给出一组（逻辑上并发的）tool call 请求，按审批门分流为 {gated, direct}。
//! direct 调用针对回合起点快照并发执行，各产出一个 delta；gated 调用若已有处置则当场处置，
//! 否则停驻为 pending。末尾调用一次 merge 引擎。回合结束仍有 pending 即为挂起：返回非空
//! pending_approvals，不再执行任何工具，直到外部补来处置。
//!
//! 合并顺序约定：direct 按请求顺序，已处置的 gated 按处置到达顺序排在其后；消息只追加。

use futures_util::future::join_all;

use crate::approval::{ApprovalGate, ApprovalRecord, Disposition};
use crate::core::merge::{merge, StateDelta};
use crate::core::state::{AgentState, Message, ToolCallRequest};
use crate::core::AgentError;
use crate::llm::{LlmClient, ModelOutput, ModelSettings};
use crate::tools::{ToolExecutor, ToolOutcome};

/// 被拒绝的处置（配置不允许或 call id 不存在）；对应记录保持 pending
#[derive(Clone, Debug)]
pub struct RejectedDisposition {
    pub call_id: String,
    pub reason: String,
}

/// 一个回合的产出：合并后的状态、是否挂起、被拒绝的处置、
/// 本回合处置完成的审批记录（状态已翻到 resolved，供外部调度器留痕）
#[derive(Debug)]
pub struct TurnOutcome {
    pub state: AgentState,
    pub suspended: bool,
    pub rejected: Vec<RejectedDisposition>,
    pub resolved: Vec<(String, ApprovalRecord)>,
}

/// 驱动一个回合。calls 为本回合新请求的 tool call；dispositions 为外部到达的处置
/// （可针对上回合遗留的 pending，也可针对本回合新停驻的调用），按到达顺序应用。
pub async fn run_turn(
    executor: &ToolExecutor,
    gate: &ApprovalGate,
    state: AgentState,
    calls: Vec<ToolCallRequest>,
    dispositions: Vec<(String, Disposition)>,
) -> TurnOutcome {
    let snapshot = state.snapshot();

    let mut direct: Vec<ToolCallRequest> = Vec::new();
    let mut parked: Vec<(String, ApprovalRecord)> = Vec::new();
    for call in calls {
        if gate.is_gated(&call.tool) {
            let record = gate.park(&call);
            parked.push((call.id.clone(), record));
        } else {
            direct.push(call);
        }
    }

    // direct 调用针对同一快照并发执行；join_all 保持请求顺序，即 delta 产生顺序
    let results = join_all(direct.iter().map(|c| executor.execute(c, &snapshot))).await;
    let mut deltas: Vec<StateDelta> = direct
        .iter()
        .zip(results)
        .map(|(call, result)| outcome_to_delta(&call.id, result))
        .collect();

    let mut rejected: Vec<RejectedDisposition> = Vec::new();
    let mut resolved_ids: Vec<String> = Vec::new();
    let mut resolved: Vec<(String, ApprovalRecord)> = Vec::new();
    for (call_id, disposition) in dispositions {
        let record = state
            .pending_approvals
            .get(&call_id)
            .or_else(|| {
                parked
                    .iter()
                    .find(|(id, _)| *id == call_id)
                    .map(|(_, record)| record)
            });
        let Some(record) = record else {
            tracing::warn!(call_id = %call_id, "disposition for unknown call id");
            rejected.push(RejectedDisposition {
                call_id,
                reason: "unknown call id".to_string(),
            });
            continue;
        };

        if let Err(e) = ApprovalGate::authorize(record, &disposition) {
            tracing::warn!(call_id = %call_id, error = %e, "illegal disposition rejected");
            rejected.push(RejectedDisposition {
                call_id,
                reason: e.to_string(),
            });
            continue; // 记录保持 pending，等待修正后的处置
        }

        let tool_name = record.tool_name.clone();
        let arguments = record.arguments.clone();
        resolved.push((call_id.clone(), record.resolve()));
        let delta = match disposition {
            Disposition::Ignore => {
                let mut delta = StateDelta::new();
                delta
                    .messages
                    .push(Message::tool(&call_id, format!("Tool call skipped: {tool_name}")));
                delta
            }
            Disposition::Respond { text } => {
                let mut delta = StateDelta::new();
                delta.messages.push(Message::tool(&call_id, text));
                delta
            }
            Disposition::Accept => {
                let call = ToolCallRequest {
                    id: call_id.clone(),
                    tool: tool_name,
                    args: arguments,
                };
                outcome_to_delta(&call.id, executor.execute(&call, &snapshot).await)
            }
            Disposition::Edit { args } => {
                // 以人审替换后的参数执行，而非原始请求参数
                let call = ToolCallRequest {
                    id: call_id.clone(),
                    tool: tool_name,
                    args,
                };
                outcome_to_delta(&call.id, executor.execute(&call, &snapshot).await)
            }
        };
        resolved_ids.push(call_id);
        deltas.push(delta);
    }

    let still_parked: Vec<(String, ApprovalRecord)> = parked
        .into_iter()
        .filter(|(id, _)| !resolved_ids.contains(id))
        .collect();

    let state = merge(&state, &deltas, &resolved_ids, still_parked);
    let suspended = !state.pending_approvals.is_empty();
    if suspended {
        tracing::info!(pending = state.pending_approvals.len(), "turn suspended");
    }
    TurnOutcome {
        state,
        suspended,
        rejected,
        resolved,
    }
}

/// 工具执行结果转 delta：成功附上结果消息；失败把错误文本作为 tool result 返还给模型
fn outcome_to_delta(call_id: &str, result: Result<ToolOutcome, AgentError>) -> StateDelta {
    match result {
        Ok(outcome) => {
            let mut delta = outcome.delta;
            delta.messages.push(Message::tool(call_id, outcome.message));
            delta
        }
        // 工具自身返回的 Err 文本（"Error: ..."）原样透传
        Err(AgentError::ToolExecutionFailed(text)) => {
            let mut delta = StateDelta::new();
            delta.messages.push(Message::tool(call_id, text));
            delta
        }
        Err(e) => {
            let mut delta = StateDelta::new();
            delta.messages.push(Message::tool(call_id, format!("Error: {e}")));
            delta
        }
    }
}

/// 无门控的完成循环（子智能体嵌套运行用）：模型调用与回合驱动交替，直到产生最终回复。
/// 门为空，嵌套运行永不挂起；超过轮数上限返回 TurnLimitExceeded。
pub(crate) async fn run_to_completion(
    llm: &dyn LlmClient,
    executor: &ToolExecutor,
    system_prompt: &str,
    settings: &ModelSettings,
    mut state: AgentState,
    max_turns: usize,
) -> Result<(AgentState, String), AgentError> {
    let gate = ApprovalGate::empty();
    let schemas = executor.registry().schemas();

    for _ in 0..max_turns {
        let mut full = Vec::with_capacity(state.messages.len() + 1);
        full.push(Message::system(system_prompt));
        full.extend(state.messages.iter().cloned());

        let output = llm
            .complete(&full, &schemas, settings)
            .await
            .map_err(AgentError::LlmError)?;

        match output {
            ModelOutput::Final(text) => {
                state.messages.push(Message::assistant(text.clone()));
                return Ok((state, text));
            }
            ModelOutput::ToolCalls(calls) => {
                state.messages.push(Message::assistant_tool_calls(calls.clone()));
                let outcome = run_turn(executor, &gate, state, calls, Vec::new()).await;
                debug_assert!(!outcome.suspended);
                state = outcome.state;
            }
        }
    }
    Err(AgentError::TurnLimitExceeded(max_turns))
}
