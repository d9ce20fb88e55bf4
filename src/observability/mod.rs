//! 可观测性：tracing 日志初始化
//!
//! RUST_LOG 优先；未设置时使用传入的级别（来自 [app] log_level）。重复初始化只返回 false。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init(default_level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init()
        .is_ok()
}
