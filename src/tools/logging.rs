//! 日志初始化

use tracing_subscriber::EnvFilter;

/// 初始化 tracing 订阅器（输出到 stderr）
///
/// 默认级别 `warn`，`verbose` 时 `debug`；设置 `RUST_LOG` 时以环境变量为准。
/// 重复初始化静默忽略。
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
