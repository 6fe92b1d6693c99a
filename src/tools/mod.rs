//! 工具箱：注册表、执行器与内置工具（虚拟文件、规划、子智能体调度）

pub mod executor;
pub mod files;
pub mod registry;
pub mod schema;
pub mod task;
pub mod todos;

pub use executor::ToolExecutor;
pub use files::{EditFileTool, LsTool, ReadFileTool, WriteFileTool};
pub use registry::{Tool, ToolOutcome, ToolRegistry};
pub use schema::schema_value;
pub use task::TaskTool;
pub use todos::WriteTodosTool;
