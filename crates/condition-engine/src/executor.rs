//! 表达式执行器
//!
//! 对表达式树做短路求值，返回匹配结果和评估追踪信息。

use crate::evaluator::ConditionEvaluator;
use crate::models::{
    Condition, ConditionNode, ConditionOutcome, EvaluationContext, EvaluationResult, LogicalGroup,
};
use crate::operators::LogicalOperator;
use crate::registry::OperatorRegistry;
use conditions_shared::observability::metrics;
use std::time::Instant;
use tracing::{debug, instrument};

/// 表达式执行器
#[derive(Debug, Clone, Default)]
pub struct ExpressionEvaluator {
    evaluator: ConditionEvaluator,
    /// 是否记录详细评估追踪
    trace_enabled: bool,
}

impl ExpressionEvaluator {
    pub fn new(registry: OperatorRegistry) -> Self {
        Self {
            evaluator: ConditionEvaluator::new(registry),
            trace_enabled: false,
        }
    }

    /// 启用评估追踪
    pub fn with_trace(mut self) -> Self {
        self.trace_enabled = true;
        self
    }

    pub fn set_trace(&mut self, enabled: bool) {
        self.trace_enabled = enabled;
    }

    /// 只求布尔结果，不收集条件明细
    pub fn evaluate(&self, node: &ConditionNode, context: &EvaluationContext<'_>) -> bool {
        match node {
            ConditionNode::Condition(cond) => self
                .evaluator
                .evaluate(cond, context.get_field(&cond.field)),
            ConditionNode::Group(group) => match group.relation {
                LogicalOperator::And => group
                    .children
                    .iter()
                    .all(|child| self.evaluate(child, context)),
                LogicalOperator::Or => group
                    .children
                    .iter()
                    .any(|child| self.evaluate(child, context)),
            },
        }
    }

    /// 执行表达式评估
    #[instrument(skip_all)]
    pub fn execute(
        &self,
        node: &ConditionNode,
        context: &EvaluationContext<'_>,
    ) -> EvaluationResult {
        let start = Instant::now();
        let mut result = EvaluationResult::default();

        result.matched = self.evaluate_node(node, context, &mut result, "root");

        let elapsed = start.elapsed();
        result.evaluation_time_us = elapsed.as_micros() as u64;
        metrics::record_expression_evaluation(result.matched, elapsed.as_secs_f64());

        debug!(
            matched = result.matched,
            evaluated = result.conditions.len(),
            elapsed_us = result.evaluation_time_us,
            "表达式评估完成"
        );

        result
    }

    fn evaluate_node(
        &self,
        node: &ConditionNode,
        context: &EvaluationContext<'_>,
        result: &mut EvaluationResult,
        path: &str,
    ) -> bool {
        match node {
            ConditionNode::Condition(cond) => self.evaluate_condition(cond, context, result, path),
            ConditionNode::Group(group) => self.evaluate_group(group, context, result, path),
        }
    }

    fn evaluate_condition(
        &self,
        cond: &Condition,
        context: &EvaluationContext<'_>,
        result: &mut EvaluationResult,
        path: &str,
    ) -> bool {
        let matched = self.evaluator.evaluate(cond, context.get_field(&cond.field));

        if self.trace_enabled {
            result.evaluation_trace.push(format!(
                "{}: {}({}) {} {} => {}",
                path,
                cond.check,
                cond.field,
                cond.compare,
                cond.value,
                if matched { "MATCHED" } else { "NOT_MATCHED" }
            ));
        }

        result.conditions.push(ConditionOutcome {
            path: path.to_string(),
            field: cond.field.clone(),
            check: cond.check.clone(),
            compare: cond.compare.clone(),
            matched,
        });

        matched
    }

    /// 评估逻辑组节点（短路求值）
    ///
    /// 空 AND 组为 true，空 OR 组为 false。
    fn evaluate_group(
        &self,
        group: &LogicalGroup,
        context: &EvaluationContext<'_>,
        result: &mut EvaluationResult,
        path: &str,
    ) -> bool {
        if self.trace_enabled {
            result.evaluation_trace.push(format!(
                "{}: 开始评估 {} 组 (共 {} 个子节点)",
                path,
                group.relation,
                group.children.len()
            ));
        }

        // AND 遇到 false 停止，OR 遇到 true 停止
        let stop_on = group.relation == LogicalOperator::Or;

        for (i, child) in group.children.iter().enumerate() {
            let child_path = format!("{}.children[{}]", path, i);
            let child_matched = self.evaluate_node(child, context, result, &child_path);

            if child_matched == stop_on {
                if self.trace_enabled {
                    let reason = if stop_on { "匹配" } else { "不匹配" };
                    result.evaluation_trace.push(format!(
                        "{}: {} 短路 - 子节点 {} {}",
                        path, group.relation, i, reason
                    ));
                }
                return stop_on;
            }
        }

        if self.trace_enabled {
            let summary = match group.relation {
                LogicalOperator::And => "AND 组全部匹配",
                LogicalOperator::Or => "OR 组无匹配",
            };
            result.evaluation_trace.push(format!("{}: {}", path, summary));
        }

        !stop_on
    }
}
