//! 虚拟文件内置工具：read_file / write_file / edit_file / ls
//!
//! 全部针对回合起点快照操作：读类工具只产出结果文本，写类工具把新内容放进 delta，
//! 由 merge 引擎按产生顺序落盘。文件相关错误以 "Error: ..." 文本返回给模型自行纠正。

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::merge::StateDelta;
use crate::core::state::TurnSnapshot;
use crate::core::AgentError;
use crate::tools::schema::schema_value;
use crate::tools::{Tool, ToolOutcome};

/// 单行超过该长度时截断（read_file 输出）
const MAX_LINE_CHARS: usize = 2000;

fn default_read_limit() -> usize {
    2000
}

fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, String> {
    serde_json::from_value(args).map_err(|e| format!("Error: Invalid arguments: {e}"))
}

#[derive(Deserialize, JsonSchema)]
struct ReadFileArgs {
    /// 要读取的文件名
    file_path: String,
    /// 起始行（0 起），默认 0
    #[serde(default)]
    offset: usize,
    /// 最多读取的行数，默认 2000
    #[serde(default = "default_read_limit")]
    limit: usize,
}

/// read_file 工具：按行窗口读取，cat -n 风格行号输出
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a file from the virtual file store. Args: {\"file_path\": \"name\", \"offset\": 0, \"limit\": 2000}"
    }

    fn parameters_schema(&self) -> Value {
        schema_value::<ReadFileArgs>()
    }

    async fn execute(&self, args: Value, snapshot: &TurnSnapshot) -> Result<ToolOutcome, String> {
        let args: ReadFileArgs = parse_args(args)?;
        let content = snapshot
            .files
            .read(&args.file_path)
            .map_err(|e| format!("Error: {e}"))?;

        if content.trim().is_empty() {
            return Ok(ToolOutcome::message(
                "System reminder: File exists but has empty contents",
            ));
        }

        let lines: Vec<&str> = content.lines().collect();
        if args.offset >= lines.len() {
            return Err(format!(
                "Error: Line offset {} exceeds file length ({} lines)",
                args.offset,
                lines.len()
            ));
        }

        let end = args.offset.saturating_add(args.limit).min(lines.len());
        let mut out = Vec::with_capacity(end - args.offset);
        for (i, line) in lines[args.offset..end].iter().enumerate() {
            let line: String = if line.chars().count() > MAX_LINE_CHARS {
                line.chars().take(MAX_LINE_CHARS).collect()
            } else {
                (*line).to_string()
            };
            out.push(format!("{:6}\t{}", args.offset + i + 1, line));
        }
        Ok(ToolOutcome::message(out.join("\n")))
    }
}

#[derive(Deserialize, JsonSchema)]
struct WriteFileArgs {
    /// 目标文件名（已存在则整体覆盖）
    file_path: String,
    /// 完整文件内容
    content: String,
}

/// write_file 工具：创建或覆盖文件
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Create or overwrite a file in the virtual file store. Args: {\"file_path\": \"name\", \"content\": \"text\"}"
    }

    fn parameters_schema(&self) -> Value {
        schema_value::<WriteFileArgs>()
    }

    async fn execute(&self, args: Value, _snapshot: &TurnSnapshot) -> Result<ToolOutcome, String> {
        let args: WriteFileArgs = parse_args(args)?;
        let message = format!("Updated file {}", args.file_path);
        let delta = StateDelta::new().write_file(args.file_path, args.content);
        Ok(ToolOutcome::with_delta(message, delta))
    }
}

#[derive(Deserialize, JsonSchema)]
struct EditFileArgs {
    /// 目标文件名
    file_path: String,
    /// 待替换的原文本
    old_string: String,
    /// 替换后的文本
    new_string: String,
    /// true 时替换全部出现；false（默认）要求原文本唯一
    #[serde(default)]
    replace_all: bool,
}

/// edit_file 工具：精确字符串替换；非 replace_all 时要求匹配唯一
pub struct EditFileTool;

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Replace a string in a file. Args: {\"file_path\": \"name\", \"old_string\": \"...\", \"new_string\": \"...\", \"replace_all\": false}"
    }

    fn parameters_schema(&self) -> Value {
        schema_value::<EditFileArgs>()
    }

    async fn execute(&self, args: Value, snapshot: &TurnSnapshot) -> Result<ToolOutcome, String> {
        let args: EditFileArgs = parse_args(args)?;
        let (content, replaced) = snapshot
            .files
            .edit(&args.file_path, &args.old_string, &args.new_string, args.replace_all)
            .map_err(|e| match e {
                AgentError::AmbiguousMatch { needle, count, .. } => format!(
                    "Error: String '{}' appears {} times in file. Use replace_all=true to replace all instances, or provide a more specific string with surrounding context.",
                    needle, count
                ),
                other => format!("Error: {other}"),
            })?;

        let message = if args.replace_all {
            format!(
                "Successfully replaced {} instance(s) of the string in '{}'",
                replaced, args.file_path
            )
        } else {
            format!("Successfully replaced string in '{}'", args.file_path)
        };
        let delta = StateDelta::new().write_file(args.file_path, content);
        Ok(ToolOutcome::with_delta(message, delta))
    }
}

/// ls 工具：按插入顺序列出虚拟文件名
pub struct LsTool;

#[async_trait]
impl Tool for LsTool {
    fn name(&self) -> &str {
        "ls"
    }

    fn description(&self) -> &str {
        "List all files in the virtual file store. Args: {}"
    }

    async fn execute(&self, _args: Value, snapshot: &TurnSnapshot) -> Result<ToolOutcome, String> {
        let names = snapshot.files.list();
        if names.is_empty() {
            Ok(ToolOutcome::message("(no files)"))
        } else {
            Ok(ToolOutcome::message(names.join("\n")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileStore;
    use serde_json::json;

    fn snapshot_with(name: &str, content: &str) -> TurnSnapshot {
        let mut files = FileStore::new();
        files.write(name, content);
        TurnSnapshot {
            files,
            todos: vec![],
        }
    }

    #[tokio::test]
    async fn test_read_file_line_numbers() {
        let snapshot = snapshot_with("a.txt", "first\nsecond\nthird");
        let args = json!({"file_path": "a.txt", "offset": 1, "limit": 1});
        let outcome = ReadFileTool.execute(args, &snapshot).await.unwrap();
        assert_eq!(outcome.message, "     2\tsecond");
        assert!(outcome.delta.is_empty());
    }

    #[tokio::test]
    async fn test_read_file_huge_limit() {
        let snapshot = snapshot_with("a.txt", "first\nsecond\nthird");
        let args = json!({"file_path": "a.txt", "offset": 1, "limit": u64::MAX});
        let outcome = ReadFileTool.execute(args, &snapshot).await.unwrap();
        assert_eq!(outcome.message, "     2\tsecond\n     3\tthird");
    }

    #[tokio::test]
    async fn test_read_file_offset_past_end() {
        let snapshot = snapshot_with("a.txt", "only");
        let args = json!({"file_path": "a.txt", "offset": 9});
        let err = ReadFileTool.execute(args, &snapshot).await.unwrap_err();
        assert!(err.contains("exceeds file length"));
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let snapshot = TurnSnapshot::default();
        let err = ReadFileTool
            .execute(json!({"file_path": "nope.txt"}), &snapshot)
            .await
            .unwrap_err();
        assert_eq!(err, "Error: File 'nope.txt' not found");
    }

    #[tokio::test]
    async fn test_read_empty_file_reminder() {
        let snapshot = snapshot_with("empty.txt", "");
        let outcome = ReadFileTool
            .execute(json!({"file_path": "empty.txt"}), &snapshot)
            .await
            .unwrap();
        assert!(outcome.message.contains("empty contents"));
    }

    #[tokio::test]
    async fn test_write_file_delta() {
        let outcome = WriteFileTool
            .execute(
                json!({"file_path": "new.txt", "content": "hello"}),
                &TurnSnapshot::default(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.message, "Updated file new.txt");
        assert_eq!(
            outcome.delta.file_writes,
            vec![("new.txt".to_string(), "hello".to_string())]
        );
    }

    #[tokio::test]
    async fn test_edit_file_ambiguous() {
        let snapshot = snapshot_with("a.txt", "x x");
        let err = EditFileTool
            .execute(
                json!({"file_path": "a.txt", "old_string": "x", "new_string": "y"}),
                &snapshot,
            )
            .await
            .unwrap_err();
        assert!(err.contains("appears 2 times"));
    }

    #[tokio::test]
    async fn test_edit_file_replace_all() {
        let snapshot = snapshot_with("a.txt", "x x");
        let outcome = EditFileTool
            .execute(
                json!({"file_path": "a.txt", "old_string": "x", "new_string": "y", "replace_all": true}),
                &snapshot,
            )
            .await
            .unwrap();
        assert!(outcome.message.contains("2 instance(s)"));
        assert_eq!(
            outcome.delta.file_writes,
            vec![("a.txt".to_string(), "y y".to_string())]
        );
    }

    #[tokio::test]
    async fn test_ls_insertion_order() {
        let mut files = FileStore::new();
        files.write("b.txt", "");
        files.write("a.txt", "");
        let snapshot = TurnSnapshot {
            files,
            todos: vec![],
        };
        let outcome = LsTool.execute(json!({}), &snapshot).await.unwrap();
        assert_eq!(outcome.message, "b.txt\na.txt");
    }
}
