//! 日志初始化模块
//!
//! 基于 tracing-subscriber 组合环境过滤器与格式化层。

use anyhow::Result;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use super::ObservabilityConfig;

/// Tracing 资源守卫
///
/// 日志写到 stderr，stdout 留给命令行输出结果。
pub struct TracingGuard {
    service_name: String,
}

impl TracingGuard {
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Drop for TracingGuard {
    fn drop(&mut self) {
        tracing::debug!(service = %self.service_name, "Tracing guard dropped");
    }
}

/// 构建环境过滤器：RUST_LOG 优先，其次配置中的日志级别
pub fn build_filter(config: &ObservabilityConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// 初始化 tracing（日志）
pub fn init(config: &ObservabilityConfig) -> Result<TracingGuard> {
    let env_filter = build_filter(config);

    let fmt_layer = if config.json_logs {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(TracingGuard {
        service_name: config.service_name.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_falls_back() {
        let config = ObservabilityConfig {
            log_level: "not a [valid filter".to_string(),
            ..Default::default()
        };
        // 无效级别不应 panic
        let _ = build_filter(&config);
    }

    #[test]
    fn test_init_twice_fails() {
        let config = ObservabilityConfig::default();
        let first = init(&config);
        let second = init(&config);
        // 全局 subscriber 只能安装一次
        assert!(first.is_err() || second.is_err());
    }
}
