//! 条件引擎错误类型
//!
//! 规范化与评估本身从不失败，错误只出现在配置检查、JSON 解析和显式的正则预编译中。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConditionError {
    #[error("未注册的操作符: {0}")]
    UnknownOperator(String),

    #[error("无效的正则表达式 '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("JSON 序列化错误: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConditionError>;
