//! 回合作用域存储：虚拟文件与任务清单

pub mod files;
pub mod todos;

pub use files::FileStore;
pub use todos::{set_all, TodoItem, TodoStatus};
