//! 日志初始化
//!
//! 所有 crate 通过 `tracing` 输出日志；这里安装 `tracing-subscriber`，
//! 并把 `log` 生态的记录桥接过来。过滤规则来自 `RUST_LOG`，未设置时使用 `default_directive`。

use tracing_subscriber::EnvFilter;

/// 初始化全局日志
///
/// 重复调用是安全的：已安装时直接返回 `false`。
///
/// # Example
///
/// ```
/// phaser_sdk::logging::init_logger("phaser_sdk=info");
/// ```
pub fn init_logger(default_directive: &str) -> bool {
    // 非法指令回退到 info
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if tracing_log::LogTracer::init().is_err() {
        return false;
    }
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_logger("debug");
        assert!(!init_logger("debug"));
    }
}
