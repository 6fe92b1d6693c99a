//! 虚拟文件存储
//!
//! 扁平的 name -> content 映射（无目录，名称为大小写敏感的不透明字符串），list 按插入顺序返回。
//! 读与 edit 是对当前快照的纯函数；写入只发生在合并阶段（merge 按 delta 产生顺序逐条 apply，
//! 同名冲突为 last-writer-wins）。revision 计数每次落盘写入递增，仅用于观测，不做冲突检测。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::AgentError;

/// 虚拟文件存储：插入顺序 + 内容映射 + 修订计数
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileStore {
    order: Vec<String>,
    entries: HashMap<String, String>,
    revision: u64,
}

impl FileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取文件内容；不存在返回 FileNotFound
    pub fn read(&self, name: &str) -> Result<&str, AgentError> {
        self.entries
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| AgentError::FileNotFound(name.to_string()))
    }

    /// 创建或覆盖文件；覆盖保留首次插入时的列表位置
    pub fn write(&mut self, name: impl Into<String>, content: impl Into<String>) {
        let name = name.into();
        if !self.entries.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.entries.insert(name, content.into());
        self.revision += 1;
    }

    /// 按插入顺序列出所有文件名
    pub fn list(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// 计算 edit 后的新内容，不修改存储本身（调用方将结果作为 delta 写入）。
    /// replace_all=false 且 needle 出现多次时返回 AmbiguousMatch；返回 (新内容, 替换次数)。
    pub fn edit(
        &self,
        name: &str,
        old: &str,
        new: &str,
        replace_all: bool,
    ) -> Result<(String, usize), AgentError> {
        let content = self.read(name)?;
        let count = content.matches(old).count();
        if count == 0 {
            return Err(AgentError::MatchNotFound(old.to_string()));
        }
        if replace_all {
            Ok((content.replace(old, new), count))
        } else if count > 1 {
            Err(AgentError::AmbiguousMatch {
                file: name.to_string(),
                needle: old.to_string(),
                count,
            })
        } else {
            Ok((content.replacen(old, new, 1), 1))
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// 相对 base 新增或内容不同的条目（按本存储的插入顺序），用于子智能体回传文件 delta
    pub fn diff_from(&self, base: &FileStore) -> Vec<(String, String)> {
        self.order
            .iter()
            .filter_map(|name| {
                let content = &self.entries[name];
                match base.entries.get(name) {
                    Some(prev) if prev == content => None,
                    _ => Some((name.clone(), content.clone())),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_list_order() {
        let mut store = FileStore::new();
        store.write("b.txt", "bee");
        store.write("a.txt", "ant");
        store.write("b.txt", "wasp"); // 覆盖不改变位置

        assert_eq!(store.read("b.txt").unwrap(), "wasp");
        assert_eq!(store.list(), vec!["b.txt", "a.txt"]);
        assert_eq!(store.revision(), 3);
    }

    #[test]
    fn test_read_not_found() {
        let store = FileStore::new();
        assert!(matches!(
            store.read("nope.txt"),
            Err(AgentError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_edit_single_occurrence() {
        let mut store = FileStore::new();
        store.write("a.txt", "hello world");
        let (content, n) = store.edit("a.txt", "world", "bee", false).unwrap();
        assert_eq!(content, "hello bee");
        assert_eq!(n, 1);
        // edit 是纯函数，存储未变
        assert_eq!(store.read("a.txt").unwrap(), "hello world");
    }

    #[test]
    fn test_edit_ambiguous_leaves_store_unchanged() {
        let mut store = FileStore::new();
        store.write("a.txt", "x x");
        let err = store.edit("a.txt", "x", "y", false).unwrap_err();
        assert!(matches!(err, AgentError::AmbiguousMatch { count: 2, .. }));
        assert_eq!(store.read("a.txt").unwrap(), "x x");
    }

    #[test]
    fn test_edit_replace_all() {
        let mut store = FileStore::new();
        store.write("a.txt", "x x x");
        let (content, n) = store.edit("a.txt", "x", "y", true).unwrap();
        assert_eq!(content, "y y y");
        assert_eq!(n, 3);
    }

    #[test]
    fn test_edit_match_not_found() {
        let mut store = FileStore::new();
        store.write("a.txt", "hello");
        assert!(matches!(
            store.edit("a.txt", "absent", "y", false),
            Err(AgentError::MatchNotFound(_))
        ));
        assert!(matches!(
            store.edit("missing.txt", "x", "y", false),
            Err(AgentError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_diff_from() {
        let mut base = FileStore::new();
        base.write("keep.txt", "same");
        base.write("change.txt", "old");

        let mut next = base.clone();
        next.write("change.txt", "new");
        next.write("added.txt", "fresh");

        let diff = next.diff_from(&base);
        assert_eq!(
            diff,
            vec![
                ("change.txt".to_string(), "new".to_string()),
                ("added.txt".to_string(), "fresh".to_string()),
            ]
        );
    }
}
