//! 可观测性
//!
//! RUST_LOG 未设置时默认 `info,hive=debug`；用 try_init 保证可重复调用
//! （集成测试里每个测试都可以先调一次）。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,hive=debug"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}
