//! 日志初始化
//!
//! 基于 `tracing-subscriber` 的一次性初始化，环境变量 `RUST_LOG`
//! 控制过滤（默认 `info`）。宿主应用已有自己的 subscriber 时
//! 不要调用，重复初始化会被安静地忽略。

use tracing_subscriber::EnvFilter;

/// 初始化全局日志订阅器
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
