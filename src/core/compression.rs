//! 上下文压缩
//!
//! 两个互相独立的压缩面：
//! - 消息裁剪：递交给模型的消息序列超过 token 预算时，保留开头的 system 消息与最近的后缀，
//!   末尾追加一条压缩告知；只作用于发给模型的输入，state.messages 本身不动。
//! - 大文件截断：虚拟文件超过 max_file_size 字符时保留头尾各三分之一并插入省略标记，
//!   直接写回文件存储。
//! token 计数为近似值（字符数 / 4），与压缩目的（防止上下文无界增长）匹配。

use serde::{Deserialize, Serialize};

use crate::core::state::{Message, Role};
use crate::store::FileStore;

/// 压缩配置；未配置时完全不压缩
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// 递交模型的消息序列的近似 token 预算
    pub max_tokens: usize,
    /// 是否截断超大文件
    pub compress_files: bool,
    /// 单文件字符数上限，超过即截断
    pub max_file_size: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_tokens: 8000,
            compress_files: true,
            max_file_size: 10_000,
        }
    }
}

/// 近似 token 计数：字符数 / 4，每条消息加固定开销
pub(crate) fn approx_tokens(messages: &[Message]) -> usize {
    messages.iter().map(message_tokens).sum()
}

fn message_tokens(message: &Message) -> usize {
    let mut chars = message.content.chars().count();
    for call in &message.tool_calls {
        chars += call.tool.len() + call.args.to_string().len();
    }
    chars / 4 + 4
}

/// 裁剪超预算的消息序列：保留开头连续的 system 消息，其余取装得下的最近后缀，
/// 后缀不以 tool 结果开头（避免孤儿工具结果），末尾追加压缩告知。
/// 未超预算时原样返回。
pub(crate) fn trim_messages(messages: Vec<Message>, config: &CompressionConfig) -> Vec<Message> {
    let total_tokens = approx_tokens(&messages);
    if total_tokens <= config.max_tokens {
        return messages;
    }

    let sys_end = messages
        .iter()
        .position(|m| m.role != Role::System)
        .unwrap_or(messages.len());
    let (system, rest) = messages.split_at(sys_end);

    let budget = config.max_tokens.saturating_sub(approx_tokens(system));
    let mut start = rest.len();
    let mut used = 0;
    while start > 0 {
        let t = message_tokens(&rest[start - 1]);
        if used + t > budget {
            break;
        }
        used += t;
        start -= 1;
    }
    // 工具结果必须跟在发起它的 assistant 消息之后
    while start < rest.len() && rest[start].role == Role::Tool {
        start += 1;
    }

    let mut trimmed: Vec<Message> = system.to_vec();
    trimmed.extend(rest[start..].iter().cloned());
    let kept = trimmed.len();
    trimmed.push(Message::system(format!(
        "[Context compressed: reduced from {} to {} messages, ~{} to ~{} tokens]",
        messages.len(),
        kept,
        total_tokens,
        approx_tokens(&trimmed),
    )));
    trimmed
}

/// 截断超过 max_file_size 字符的文件：保留头尾各三分之一，中间替换为省略标记。
/// 返回被截断的文件名（按存储顺序）。
pub(crate) fn truncate_oversized_files(
    files: &mut FileStore,
    config: &CompressionConfig,
) -> Vec<String> {
    let names: Vec<String> = files.list().iter().map(|s| s.to_string()).collect();
    let mut truncated = Vec::new();

    for name in names {
        let content = match files.read(&name) {
            Ok(content) => content.to_string(),
            Err(_) => continue,
        };
        let total = content.chars().count();
        if total <= config.max_file_size {
            continue;
        }

        let keep = config.max_file_size / 3;
        let head: String = content.chars().take(keep).collect();
        let tail: String = content.chars().skip(total - keep).collect();
        let omitted = total - 2 * keep;
        files.write(
            name.clone(),
            format!("{head}\n\n[... Content truncated - {omitted} characters omitted ...]\n\n{tail}"),
        );
        tracing::info!(file = %name, omitted, "file truncated for context compression");
        truncated.push(name);
    }
    truncated
}
