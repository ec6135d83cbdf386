//! 可观测性：tracing 日志初始化

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 默认过滤指令（RUST_LOG 未设置时）
pub const DEFAULT_LOG_DIRECTIVE: &str = "info";

/// 初始化日志：默认 info，可通过 RUST_LOG 覆盖；输出到 stderr，不干扰 CLI 的回复输出。
/// 重复调用时保留已安装的 subscriber。
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_does_not_panic() {
        init();
        init();
        tracing::info!("observability initialised");
    }
}
