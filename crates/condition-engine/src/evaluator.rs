//! 条件评估器
//!
//! 对单个已规范化的条件求值。比较逻辑通过注册表查找，
//! 检查维度（原始值 / 长度 / 自定义）决定传给比较函数的是什么。

use crate::compare;
use crate::models::Condition;
use crate::operators::CheckKind;
use crate::registry::OperatorRegistry;
use conditions_shared::observability::metrics;
use serde_json::Value;
use tracing::{debug, warn};

/// 条件评估器
#[derive(Debug, Clone, Default)]
pub struct ConditionEvaluator {
    registry: OperatorRegistry,
}

impl ConditionEvaluator {
    pub fn new(registry: OperatorRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }

    /// 评估条件
    ///
    /// # Arguments
    /// * `cond` - 已规范化的条件
    /// * `field_value` - 从记录中取出的字段值，字段不存在时为 None（按 null 处理）
    pub fn evaluate(&self, cond: &Condition, field_value: Option<&Value>) -> bool {
        let value = field_value.unwrap_or(&Value::Null);

        let matched = match &cond.check {
            CheckKind::Custom(name) => match self.registry.check_handler(name) {
                Some(handler) => handler(cond, value),
                None => {
                    debug!(check = %name, field = %cond.field, "未注册的检查维度，按不匹配处理");
                    false
                }
            },
            CheckKind::Value | CheckKind::Length => self.evaluate_each(cond, value),
        };

        metrics::record_rule_check(cond.check.label(), cond.compare.label(), matched);
        matched
    }

    /// 列表值逐个评估：非空且每个元素都匹配才算匹配
    fn evaluate_each(&self, cond: &Condition, value: &Value) -> bool {
        match value {
            Value::Array(items) => {
                !items.is_empty() && items.iter().all(|item| self.evaluate_each(cond, item))
            }
            Value::Object(map) => {
                !map.is_empty() && map.values().all(|item| self.evaluate_each(cond, item))
            }
            scalar => self.evaluate_scalar(cond, scalar),
        }
    }

    fn evaluate_scalar(&self, cond: &Condition, value: &Value) -> bool {
        let symbol = cond.compare.symbol();

        let operator = match self.registry.lookup(symbol) {
            Ok(operator) => operator,
            Err(e) => {
                warn!(field = %cond.field, error = %e, "条件使用了未注册的操作符");
                return false;
            }
        };

        // 如 length 检查下由空列表退化得到的 EXISTS
        if !self.registry.allows(symbol, &cond.check) {
            debug!(
                field = %cond.field,
                check = %cond.check,
                compare = %symbol,
                "操作符不适用于该检查维度"
            );
            return false;
        }

        match cond.check {
            CheckKind::Length => {
                let length = Value::from(compare::char_length(value) as u64);
                operator.compare(&length, &length_operand(&cond.value))
            }
            _ => operator.compare(value, &cond.value),
        }
    }
}

/// 长度检查的操作数统一转为整数
fn length_operand(operand: &Value) -> Value {
    match operand {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| Value::from(compare::as_integer(item)))
                .collect(),
        ),
        other => Value::from(compare::as_integer(other)),
    }
}
