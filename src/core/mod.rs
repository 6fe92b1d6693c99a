//! 编排核心：状态、合并、回合驱动与 Agent 构建器

pub mod builder;
pub mod compression;
pub mod error;
pub mod merge;
pub mod state;
pub mod turn;

pub use builder::{Agent, AgentBuilder, RunOutcome};
pub use compression::CompressionConfig;
pub use error::AgentError;
pub use merge::{merge, StateDelta};
pub use state::{AgentState, Message, Role, ToolCallRequest, TurnSnapshot};
pub use turn::{run_turn, RejectedDisposition, TurnOutcome};
