//! 条件引擎
//!
//! 持有操作符注册表、表达式编译器和执行器，对外提供一站式的编译与评估接口。
//! 引擎可以廉价克隆，所有克隆共享同一份注册表与编译版本号。

use crate::compare::PatternCache;
use crate::compiler::{self, CompiledExpression, ExpressionCompiler};
use crate::error::Result;
use crate::executor::ExpressionEvaluator;
use crate::models::{Condition, ConditionNode, EvaluationContext, EvaluationResult, RawCondition};
use crate::normalizer::ValueNormalizer;
use crate::operators::CheckKind;
use crate::registry::OperatorRegistry;
use conditions_shared::config::EngineConfig;
use serde_json::Value;
use tracing::{debug, info, instrument};

/// 条件引擎
#[derive(Debug, Clone)]
pub struct ConditionEngine {
    registry: OperatorRegistry,
    compiler: ExpressionCompiler,
    executor: ExpressionEvaluator,
    dotted_paths: bool,
}

impl ConditionEngine {
    /// 使用默认配置创建引擎
    pub fn new() -> Self {
        Self::from_config(&EngineConfig::default())
    }

    /// 按配置创建引擎
    pub fn from_config(config: &EngineConfig) -> Self {
        let registry =
            OperatorRegistry::with_pattern_cache(PatternCache::new(config.regex_cache_capacity));

        let mut executor = ExpressionEvaluator::new(registry.clone());
        executor.set_trace(config.trace_enabled);

        info!(
            operators = registry.len(),
            trace_enabled = config.trace_enabled,
            regex_cache_capacity = config.regex_cache_capacity,
            dotted_paths = config.dotted_paths,
            "条件引擎已创建"
        );

        Self {
            compiler: ExpressionCompiler::new(registry.clone()),
            registry,
            executor,
            dotted_paths: config.dotted_paths,
        }
    }

    /// 启用评估追踪
    pub fn with_trace(mut self) -> Self {
        self.executor.set_trace(true);
        self
    }

    pub fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }

    /// 编译表达式
    pub fn compile(&self, expression: &Value) -> CompiledExpression {
        let compiled = self.compiler.compile(expression);
        debug!(
            version = compiled.compile_version,
            root = %compiler::describe(&compiled.root),
            "表达式已编译"
        );
        compiled
    }

    /// 编译并校验表达式中的每个操作符都已注册
    #[instrument(skip(self, expression))]
    pub fn check(&self, expression: &Value) -> Result<CompiledExpression> {
        let compiled = self.compile(expression);
        self.registry.check_expression(&compiled.root)?;
        Ok(compiled)
    }

    /// 规范化单个原始条件
    pub fn normalize(&self, raw: &RawCondition) -> Condition {
        ValueNormalizer::new(self.registry.clone()).normalize(raw)
    }

    /// 评估表达式是否匹配记录
    ///
    /// 临时构建的表达式树不占用编译版本号。
    pub fn evaluate(&self, expression: &Value, record: &Value) -> bool {
        let root = self.compiler.build(expression);
        self.evaluate_node(&root, record)
    }

    /// 评估表达式并返回明细
    pub fn execute(&self, expression: &Value, record: &Value) -> EvaluationResult {
        let root = self.compiler.build(expression);
        self.executor.execute(&root, &self.context(record))
    }

    /// 评估已编译的表达式
    pub fn evaluate_compiled(&self, compiled: &CompiledExpression, record: &Value) -> bool {
        self.evaluate_node(&compiled.root, record)
    }

    /// 评估已编译的表达式并返回明细
    pub fn execute_compiled(
        &self,
        compiled: &CompiledExpression,
        record: &Value,
    ) -> EvaluationResult {
        self.executor.execute(&compiled.root, &self.context(record))
    }

    /// 直接评估表达式树（跳过编译与规范化）
    pub fn evaluate_node(&self, node: &ConditionNode, record: &Value) -> bool {
        self.executor.evaluate(node, &self.context(record))
    }

    /// 注册（或覆盖）操作符
    pub fn register_operator<F>(
        &self,
        symbol: &str,
        scope: impl IntoIterator<Item = CheckKind>,
        comparator: F,
    ) where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.registry.register(symbol, scope, comparator);
    }

    /// 注册（或覆盖）自定义检查维度
    pub fn register_check_kind<F>(&self, name: &str, handler: F)
    where
        F: Fn(&Condition, &Value) -> bool + Send + Sync + 'static,
    {
        self.registry.register_check_kind(name, handler);
    }

    fn context<'a>(&self, record: &'a Value) -> EvaluationContext<'a> {
        let context = EvaluationContext::borrowed(record);
        if self.dotted_paths {
            context
        } else {
            context.literal_keys()
        }
    }
}

impl Default for ConditionEngine {
    fn default() -> Self {
        Self::new()
    }
}
