//! 统一可观测性模块
//!
//! 提供日志初始化与指标描述。引擎本身只通过 `tracing` 和 `metrics` 门面输出，
//! 由宿主应用决定是否安装指标 recorder。

pub mod metrics;
pub mod tracing;

use ::tracing::info;
use anyhow::Result;

pub use crate::config::ObservabilityConfig;

/// 可观测性资源守卫
///
/// 持有日志相关资源的生命周期。
pub struct ObservabilityGuard {
    _tracing_guard: Option<tracing::TracingGuard>,
}

impl ObservabilityGuard {
    /// 创建一个空的 Guard（用于测试或禁用可观测性时）
    pub fn empty() -> Self {
        Self {
            _tracing_guard: None,
        }
    }
}

/// 统一初始化可观测性
///
/// 初始化顺序：
/// 1. Tracing（日志）
/// 2. Metrics 描述（不启动导出器）
///
/// # Example
///
/// ```ignore
/// use conditions_shared::observability::{init, ObservabilityConfig};
///
/// fn main() -> anyhow::Result<()> {
///     let config = ObservabilityConfig::default().with_service_name("condition-engine");
///     let _guard = init(&config)?;
///     Ok(())
/// }
/// ```
pub fn init(config: &ObservabilityConfig) -> Result<ObservabilityGuard> {
    let tracing_guard = tracing::init(config)?;

    metrics::describe_metrics();

    info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Observability initialized"
    );

    Ok(ObservabilityGuard {
        _tracing_guard: Some(tracing_guard),
    })
}
