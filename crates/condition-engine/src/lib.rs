//! 条件匹配引擎
//!
//! 按字段对数据记录评估声明式条件表达式，支持：
//! - 可扩展的操作符注册表（比较、集合、区间、模式、存在性）
//! - 条件规范化（操作符与操作数形状修正）
//! - `meta_query` 风格 JSON 表达式编译
//! - AND/OR 短路求值与评估追踪
//! - 命令行工具

pub mod cli;
pub mod compare;
pub mod compiler;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod models;
pub mod normalizer;
pub mod operators;
pub mod registry;

pub use compiler::{CompiledExpression, ExpressionCompiler};
pub use engine::ConditionEngine;
pub use error::{ConditionError, Result};
pub use evaluator::ConditionEvaluator;
pub use executor::ExpressionEvaluator;
pub use models::{
    Condition, ConditionNode, ConditionOutcome, EvaluationContext, EvaluationResult, LogicalGroup,
    RawCondition,
};
pub use normalizer::ValueNormalizer;
pub use operators::{CheckKind, CompareOp, LogicalOperator, Operator, OperatorClass};
pub use registry::OperatorRegistry;
