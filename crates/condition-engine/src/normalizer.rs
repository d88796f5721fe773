//! 条件规范化
//!
//! 把原始条件修正成操作符与操作数形状一致的 [`Condition`]。规范化是全函数：
//! 任何输入都会得到一个可评估的条件，不合法的组合退化为最接近的安全操作符。
//!
//! 修正顺序：
//! 1. 操作符不被检查维度支持时改为 `=`
//! 2. 列表操作数配非列表操作符：`!=`/`NOT LIKE` 改为 `NOT IN`，其余改为 `IN`
//! 3. 列表操作符配标量操作数：按逗号/空白拆分，只有一个词时退化为 `=`/`!=`；
//!    操作数为列表时去掉空值与重复值
//! 4. 正则类操作符配列表操作数：`REGEXP`/`RLIKE` 改为 `===`，`NOT REGEXP` 改为 `!==`
//! 5. 存在性操作符的操作数置为 null
//! 6. 区间操作数截取前两个，只剩一个时退化为 `=`
//! 7. 列表操作符配空列表时改为 `EXISTS`
//!
//! 第 2–5 步互斥，按顺序只执行第一个适用的。第 2 步已经把所有列表操作数
//! 转成了集合操作符，因此第 4 步在完整流程中不会触发，保留它以维持兼容的行为定义。

use crate::compare;
use crate::models::{Condition, RawCondition};
use crate::operators::{CheckKind, CompareOp, Operator, OperatorClass};
use crate::registry::OperatorRegistry;
use serde_json::Value;
use std::collections::HashSet;
use tracing::trace;

/// 条件规范化器
#[derive(Debug, Clone, Default)]
pub struct ValueNormalizer {
    registry: OperatorRegistry,
}

impl ValueNormalizer {
    pub fn new(registry: OperatorRegistry) -> Self {
        Self { registry }
    }

    /// 规范化单个条件
    pub fn normalize(&self, raw: &RawCondition) -> Condition {
        let field = raw.field.as_deref().unwrap_or_default().trim().to_string();
        let check = raw.check.clone();
        let mut value = prepare_operand(&raw.value);

        let mut compare = match raw.compare.as_deref().map(str::trim) {
            Some(symbol) if !symbol.is_empty() => CompareOp::parse(symbol),
            _ if value.is_array() => Operator::In.into(),
            _ => Operator::Eq.into(),
        };

        restrict_to_check(&self.registry, &mut compare, &check);

        if value.is_array() && !compare.takes_list() {
            coerce_list_operand(&mut compare);
        } else if compare.takes_list() {
            split_scalar_operand(&mut compare, &mut value);
        } else if compare.class() == OperatorClass::Pattern {
            degrade_pattern_list(&mut compare, &value);
        } else if compare.class() == OperatorClass::Presence {
            value = Value::Null;
        }

        limit_range_operand(&mut compare, &mut value);
        empty_list_to_exists(&mut compare, &mut value);

        trace!(
            field = %field,
            check = %check,
            raw_compare = ?raw.compare,
            compare = %compare,
            "条件已规范化"
        );

        Condition {
            field,
            check,
            compare,
            value,
        }
    }
}

/// 字符串去除首尾空白，对象取其值列表
fn prepare_operand(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.trim().to_string()),
        Value::Object(map) => Value::Array(map.values().cloned().collect()),
        other => other.clone(),
    }
}

/// 第 1 步：限制为检查维度支持的操作符
pub(crate) fn restrict_to_check(
    registry: &OperatorRegistry,
    compare: &mut CompareOp,
    check: &CheckKind,
) {
    if matches!(check, CheckKind::Custom(_)) {
        return;
    }

    if !registry.allows(compare.symbol(), check) {
        *compare = Operator::Eq.into();
    }
}

/// 第 2 步：列表操作数只能配集合/区间操作符
pub(crate) fn coerce_list_operand(compare: &mut CompareOp) {
    *compare = if compare.is_any(&[Operator::Neq, Operator::NotLike]) {
        Operator::NotIn.into()
    } else {
        Operator::In.into()
    };
}

/// 第 3 步：列表操作符的标量操作数拆分为列表，或退化为一元比较
pub(crate) fn split_scalar_operand(compare: &mut CompareOp, value: &mut Value) {
    if !value.is_array() {
        let text = compare::to_text(value);
        let tokens: Vec<&str> = text
            .split(|c: char| c == ',' || c.is_whitespace())
            .collect();

        if tokens.len() > 1 {
            *value = Value::Array(
                tokens
                    .into_iter()
                    .map(|t| Value::String(t.to_string()))
                    .collect(),
            );
        } else if compare.is_any(&[Operator::NotIn, Operator::NotBetween]) {
            *compare = Operator::Neq.into();
        } else {
            *compare = Operator::Eq.into();
        }
    }

    if let Value::Array(items) = value {
        dedup_non_empty(items);
    }
}

/// 去掉 null、空字符串、空数组，并按文本形式去重（保留首次出现）
fn dedup_non_empty(items: &mut Vec<Value>) {
    let mut seen = HashSet::new();
    items.retain(|item| {
        let empty = match item {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Array(arr) => arr.is_empty(),
            _ => false,
        };
        !empty && seen.insert(compare::to_text(item))
    });
}

/// 第 4 步：正则类操作符不支持列表操作数，退化为严格比较
pub(crate) fn degrade_pattern_list(compare: &mut CompareOp, value: &Value) {
    if !value.is_array() {
        return;
    }

    if compare.is_any(&[Operator::Regexp, Operator::Rlike]) {
        *compare = Operator::StrictEq.into();
    } else if compare.is(Operator::NotRegexp) {
        *compare = Operator::StrictNeq.into();
    }
}

/// 第 6 步：区间最多两个端点，只剩一个时退化
pub(crate) fn limit_range_operand(compare: &mut CompareOp, value: &mut Value) {
    if compare.class() != OperatorClass::Range {
        return;
    }

    let Value::Array(items) = value else {
        return;
    };
    items.truncate(2);

    if items.len() == 1 {
        // 与集合退化共用同一判断，区间操作符在这里总是得到 `=`
        *compare = if compare.is(Operator::NotIn) {
            Operator::Neq.into()
        } else {
            Operator::Eq.into()
        };
        let only = items.remove(0);
        *value = only;
    }
}

/// 第 7 步：空列表改为存在性检查
pub(crate) fn empty_list_to_exists(compare: &mut CompareOp, value: &mut Value) {
    if !compare.takes_list() {
        return;
    }

    let empty = match value {
        Value::Array(items) => items.is_empty(),
        Value::Null => true,
        _ => false,
    };

    if empty {
        *compare = Operator::Exists.into();
        *value = Value::Null;
    }
}
