//! 日志初始化 (tracing)

use tracing_subscriber::EnvFilter;

/// 安装全局日志订阅器, 级别由 `RUST_LOG` 控制 (默认 info)
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // 测试或重复调用时已安装订阅器, 忽略即可
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
