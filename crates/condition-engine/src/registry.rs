//! 操作符注册表
//!
//! 使用 DashMap 保存操作符符号到比较函数的映射，以及自定义检查维度的处理函数。
//! 注册表在启动时创建并预置全部内置操作符，之后按需扩展；克隆开销很小，
//! 所有克隆共享同一份数据。

use crate::compare::{self, PatternCache};
use crate::error::{ConditionError, Result};
use crate::models::{Condition, ConditionNode};
use crate::operators::{CheckKind, Operator};
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// 比较函数：`(字段值, 操作数) -> 是否匹配`
pub type Comparator = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// 自定义检查维度的处理函数：`(规范化后的条件, 字段值) -> 是否匹配`
pub type CheckHandler = Arc<dyn Fn(&Condition, &Value) -> bool + Send + Sync>;

/// 已注册的操作符
#[derive(Clone)]
pub struct RegisteredOperator {
    pub symbol: String,
    /// 允许使用该操作符的检查维度
    pub scope: HashSet<CheckKind>,
    pub comparator: Comparator,
}

impl RegisteredOperator {
    pub fn compare(&self, value: &Value, operand: &Value) -> bool {
        (self.comparator)(value, operand)
    }
}

impl fmt::Debug for RegisteredOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredOperator")
            .field("symbol", &self.symbol)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// 操作符注册表
#[derive(Clone)]
pub struct OperatorRegistry {
    operators: Arc<DashMap<String, RegisteredOperator>>,
    check_kinds: Arc<DashMap<String, CheckHandler>>,
    patterns: PatternCache,
}

impl OperatorRegistry {
    /// 创建预置全部内置操作符的注册表
    pub fn new() -> Self {
        Self::with_pattern_cache(PatternCache::default())
    }

    pub fn with_pattern_cache(patterns: PatternCache) -> Self {
        let registry = Self {
            operators: Arc::new(DashMap::new()),
            check_kinds: Arc::new(DashMap::new()),
            patterns,
        };
        registry.register_builtins();
        registry
    }

    /// 获取当前注册的操作符数量
    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// 注册（或覆盖）操作符
    ///
    /// 覆盖内置符号是合法的，新的比较函数和作用范围会完全取代旧的。
    #[instrument(skip(self, scope, comparator))]
    pub fn register<F>(
        &self,
        symbol: &str,
        scope: impl IntoIterator<Item = CheckKind>,
        comparator: F,
    ) where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        let symbol = canonical_symbol(symbol);
        let replaced = self
            .operators
            .insert(
                symbol.clone(),
                RegisteredOperator {
                    symbol: symbol.clone(),
                    scope: scope.into_iter().collect(),
                    comparator: Arc::new(comparator),
                },
            )
            .is_some();

        info!(replaced, "操作符已注册: {}", symbol);
    }

    /// 查找操作符
    pub fn lookup(&self, symbol: &str) -> Result<RegisteredOperator> {
        let symbol = canonical_symbol(symbol);
        self.operators
            .get(&symbol)
            .map(|entry| entry.value().clone())
            .ok_or(ConditionError::UnknownOperator(symbol))
    }

    /// 检查是否已注册
    pub fn contains(&self, symbol: &str) -> bool {
        self.operators.contains_key(&canonical_symbol(symbol))
    }

    /// 该操作符是否可用于给定检查维度
    ///
    /// 自定义检查维度不限制操作符，只要求操作符已注册。
    pub fn allows(&self, symbol: &str, check: &CheckKind) -> bool {
        match self.operators.get(&canonical_symbol(symbol)) {
            Some(entry) => match check {
                CheckKind::Custom(_) => true,
                _ => entry.scope.contains(check),
            },
            None => false,
        }
    }

    /// 获取所有操作符符号（已排序）
    pub fn operators(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.operators.iter().map(|e| e.key().clone()).collect();
        symbols.sort();
        symbols
    }

    /// 注册（或覆盖）自定义检查维度
    #[instrument(skip(self, handler))]
    pub fn register_check_kind<F>(&self, name: &str, handler: F)
    where
        F: Fn(&Condition, &Value) -> bool + Send + Sync + 'static,
    {
        let name = name.trim().to_string();
        self.check_kinds.insert(name.clone(), Arc::new(handler));
        info!("检查维度已注册: {}", name);
    }

    /// 查找自定义检查维度
    pub fn check_handler(&self, name: &str) -> Option<CheckHandler> {
        self.check_kinds.get(name).map(|entry| entry.value().clone())
    }

    /// 校验表达式中用到的所有操作符都已注册
    ///
    /// 用于启动阶段的配置检查：评估时遇到未注册操作符只会静默返回 false。
    pub fn check_expression(&self, node: &ConditionNode) -> Result<()> {
        for cond in node.conditions() {
            self.lookup(cond.compare.symbol())?;
        }
        Ok(())
    }

    /// 正则缓存（供内置比较函数与测试使用）
    pub fn patterns(&self) -> &PatternCache {
        &self.patterns
    }

    fn register_builtins(&self) {
        for op in Operator::ALL {
            let scope = if op.supports_length() {
                vec![CheckKind::Value, CheckKind::Length]
            } else {
                vec![CheckKind::Value]
            };

            let symbol = op.symbol().to_string();
            let comparator = builtin_comparator(op, self.patterns.clone());
            self.operators.insert(
                symbol.clone(),
                RegisteredOperator {
                    symbol,
                    scope: scope.into_iter().collect(),
                    comparator,
                },
            );
        }

        debug!(count = self.operators.len(), "内置操作符已注册");
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("operators", &self.operators())
            .field("check_kinds", &self.check_kinds.len())
            .finish()
    }
}

/// 注册表中的键：已知符号取规范写法，其余大写化
fn canonical_symbol(symbol: &str) -> String {
    match Operator::from_symbol(symbol) {
        Some(op) => op.symbol().to_string(),
        None => symbol.trim().to_uppercase(),
    }
}

fn comparator<F>(f: F) -> Comparator
where
    F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

/// 内置比较函数
fn builtin_comparator(op: Operator, patterns: PatternCache) -> Comparator {
    use std::cmp::Ordering::{Equal, Greater, Less};

    match op {
        Operator::Eq => comparator(compare::loose_eq),
        Operator::Neq => comparator(|v, o| !compare::loose_eq(v, o)),
        Operator::StrictEq => comparator(compare::strict_eq),
        Operator::StrictNeq => comparator(|v, o| !compare::strict_eq(v, o)),
        Operator::Gt => comparator(|v, o| compare::compare_order(v, o) == Some(Greater)),
        Operator::Gte => {
            comparator(|v, o| matches!(compare::compare_order(v, o), Some(Greater | Equal)))
        }
        Operator::Lt => comparator(|v, o| compare::compare_order(v, o) == Some(Less)),
        Operator::Lte => {
            comparator(|v, o| matches!(compare::compare_order(v, o), Some(Less | Equal)))
        }
        Operator::In => comparator(in_list),
        Operator::NotIn => comparator(|v, o| !in_list(v, o)),
        Operator::Between => comparator(between),
        Operator::NotBetween => comparator(not_between),
        Operator::Like => comparator(compare::like),
        Operator::NotLike => comparator(|v, o| !compare::like(v, o)),
        Operator::Regexp | Operator::Rlike => {
            comparator(move |v, o| regex_match(&patterns, v, o) == Some(true))
        }
        Operator::NotRegexp => {
            comparator(move |v, o| regex_match(&patterns, v, o) == Some(false))
        }
        Operator::Exists => comparator(|v, _| !is_absent(v)),
        Operator::NotExists => comparator(|v, _| is_absent(v)),
    }
}

/// 列表宽松包含；标量操作数视为单元素列表
fn in_list(value: &Value, operand: &Value) -> bool {
    match operand {
        Value::Array(items) => items.iter().any(|item| compare::loose_eq(value, item)),
        other => compare::loose_eq(value, other),
    }
}

/// 闭区间 `[min, max]`
fn between(value: &Value, operand: &Value) -> bool {
    use std::cmp::Ordering::{Equal, Greater, Less};

    let Some((min, max)) = bounds(operand) else {
        return false;
    };

    matches!(compare::compare_order(value, min), Some(Greater | Equal))
        && matches!(compare::compare_order(value, max), Some(Less | Equal))
}

/// 严格在区间之外：`value < min || value > max`，两端点本身不算
fn not_between(value: &Value, operand: &Value) -> bool {
    use std::cmp::Ordering::{Greater, Less};

    let Some((min, max)) = bounds(operand) else {
        return false;
    };

    compare::compare_order(value, min) == Some(Less)
        || compare::compare_order(value, max) == Some(Greater)
}

fn bounds(operand: &Value) -> Option<(&Value, &Value)> {
    match operand.as_array()?.as_slice() {
        [min, max, ..] => Some((min, max)),
        _ => None,
    }
}

fn regex_match(patterns: &PatternCache, value: &Value, operand: &Value) -> Option<bool> {
    let pattern = compare::to_text(operand);
    patterns.is_match(&pattern, &compare::to_text(value))
}

/// null 或空字符串
fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compare(symbol: &str, value: Value, operand: Value) -> bool {
        OperatorRegistry::new()
            .lookup(symbol)
            .unwrap()
            .compare(&value, &operand)
    }

    #[test]
    fn test_builtins_registered() {
        let registry = OperatorRegistry::new();
        assert_eq!(registry.len(), Operator::ALL.len());
        for op in Operator::ALL {
            assert!(registry.contains(op.symbol()), "{} 未注册", op);
        }
    }

    #[test]
    fn test_lookup_unknown_operator() {
        let registry = OperatorRegistry::new();
        let err = registry.lookup("SOUNDS LIKE").unwrap_err();
        assert!(matches!(err, ConditionError::UnknownOperator(ref s) if s == "SOUNDS LIKE"));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = OperatorRegistry::new();
        assert_eq!(registry.lookup("not between").unwrap().symbol, "NOT BETWEEN");
        assert_eq!(registry.lookup("==").unwrap().symbol, "=");
    }

    #[test]
    fn test_scopes() {
        let registry = OperatorRegistry::new();
        assert!(registry.allows("BETWEEN", &CheckKind::Length));
        assert!(registry.allows("LIKE", &CheckKind::Value));
        assert!(!registry.allows("LIKE", &CheckKind::Length));
        assert!(!registry.allows("EXISTS", &CheckKind::Length));
        assert!(!registry.allows("NOPE", &CheckKind::Value));
        assert!(registry.allows("LIKE", &CheckKind::Custom("words".to_string())));
    }

    #[test]
    fn test_register_custom_operator() {
        let registry = OperatorRegistry::new();
        registry.register("STARTS WITH", [CheckKind::Value], |v, o| {
            compare::to_text(v).starts_with(&compare::to_text(o))
        });

        let op = registry.lookup("starts with").unwrap();
        assert!(op.compare(&json!("hello"), &json!("he")));
        assert!(!op.compare(&json!("hello"), &json!("lo")));
        assert!(registry.allows("STARTS WITH", &CheckKind::Value));
        assert!(!registry.allows("STARTS WITH", &CheckKind::Length));
    }

    #[test]
    fn test_register_overrides_builtin() {
        let registry = OperatorRegistry::new();
        registry.register("=", [CheckKind::Value], |v, o| {
            compare::to_text(v).eq_ignore_ascii_case(&compare::to_text(o))
        });

        let eq = registry.lookup("=").unwrap();
        assert!(eq.compare(&json!("ABC"), &json!("abc")));
        // 覆盖后作用范围也被替换
        assert!(!registry.allows("=", &CheckKind::Length));
        assert_eq!(registry.len(), Operator::ALL.len());
    }

    #[test]
    fn test_clones_share_state() {
        let registry = OperatorRegistry::new();
        let clone = registry.clone();
        clone.register("ODD", [CheckKind::Value], |v, _| compare::as_integer(v) % 2 != 0);
        assert!(registry.contains("ODD"));
    }

    #[test]
    fn test_check_kind_registration() {
        let registry = OperatorRegistry::new();
        assert!(registry.check_handler("words").is_none());

        registry.register_check_kind("words", |_, v| {
            compare::to_text(v).split_whitespace().count() > 1
        });
        let handler = registry.check_handler("words").unwrap();
        let cond = Condition::new("bio", Operator::Eq, json!(null));
        assert!(handler(&cond, &json!("two words")));
    }

    #[test]
    fn test_check_expression() {
        let registry = OperatorRegistry::new();
        let mut cond = Condition::new("a", Operator::Eq, 1);
        let ok = ConditionNode::Condition(cond.clone());
        assert!(registry.check_expression(&ok).is_ok());

        cond.compare = crate::operators::CompareOp::Custom("FUZZY".to_string());
        let bad = ConditionNode::Condition(cond);
        assert!(matches!(
            registry.check_expression(&bad),
            Err(ConditionError::UnknownOperator(_))
        ));
    }

    #[test]
    fn test_equality_comparators() {
        assert!(compare("=", json!("5"), json!(5)));
        assert!(!compare("===", json!("5"), json!(5)));
        assert!(compare("!==", json!("5"), json!(5)));
        assert!(!compare("!=", json!("5"), json!(5)));
    }

    #[test]
    fn test_ordering_comparators() {
        assert!(compare(">", json!(100), json!(50)));
        assert!(compare(">=", json!(100), json!(100)));
        assert!(compare("<", json!("1.2.9"), json!("1.2.10")));
        assert!(compare("<=", json!(3), json!("3")));
        assert!(!compare(">", json!({"a": 1}), json!(0)));
    }

    #[test]
    fn test_ordering_coerces_text_record_values() {
        assert!(!compare(">", json!("abc"), json!(18)));
        assert!(!compare(">", json!("9abc"), json!(18)));
        assert!(compare(">", json!("20abc"), json!(18)));
        assert!(!compare(">=", json!("x"), json!(100)));
        assert!(compare("<", json!("x"), json!(100)));
        assert!(compare(">=", json!(""), json!(0)));
    }

    #[test]
    fn test_between_coerces_text_record_values() {
        assert!(compare("BETWEEN", json!("3x"), json!([1, 5])));
        assert!(!compare("BETWEEN", json!("10x"), json!([1, 5])));
        assert!(compare("NOT BETWEEN", json!("10x"), json!([1, 5])));
        assert!(!compare("BETWEEN", json!("abc"), json!([1, 5])));
        assert!(compare("NOT BETWEEN", json!("abc"), json!([1, 5])));
    }

    #[test]
    fn test_membership() {
        assert!(compare("IN", json!("a"), json!(["a", "b"])));
        assert!(compare("IN", json!(1), json!(["1", "2"])));
        assert!(!compare("IN", json!("c"), json!(["a", "b"])));
        assert!(compare("NOT IN", json!("c"), json!(["a", "b"])));
        assert!(compare("IN", json!("a"), json!("a")));
    }

    #[test]
    fn test_between_boundaries() {
        assert!(compare("BETWEEN", json!(18), json!([18, 65])));
        assert!(compare("BETWEEN", json!(65), json!([18, 65])));
        assert!(!compare("BETWEEN", json!(70), json!([18, 65])));

        // 端点上 BETWEEN 与 NOT BETWEEN 都不是对方的取反
        assert!(!compare("NOT BETWEEN", json!(18), json!([18, 65])));
        assert!(!compare("NOT BETWEEN", json!(65), json!([18, 65])));
        assert!(compare("NOT BETWEEN", json!(17), json!([18, 65])));
        assert!(compare("NOT BETWEEN", json!(66), json!([18, 65])));

        // 操作数形状不对时保守返回 false
        assert!(!compare("BETWEEN", json!(5), json!([1])));
        assert!(!compare("NOT BETWEEN", json!(5), json!(1)));
    }

    #[test]
    fn test_like_and_regex() {
        assert!(compare("LIKE", json!("Lorem Ipsum"), json!("%lorem%")));
        assert!(compare("NOT LIKE", json!("Lorem Ipsum"), json!("%dolor%")));
        assert!(compare("REGEXP", json!("abc123"), json!(r"\d+$")));
        assert!(compare("RLIKE", json!("ABC"), json!("/^abc$/i")));
        assert!(compare("NOT REGEXP", json!("abc"), json!(r"^\d+$")));
    }

    #[test]
    fn test_invalid_regex_is_conservative() {
        assert!(!compare("REGEXP", json!("abc"), json!("[invalid")));
        assert!(!compare("NOT REGEXP", json!("abc"), json!("[invalid")));
    }

    #[test]
    fn test_presence() {
        assert!(compare("EXISTS", json!("x"), json!(null)));
        assert!(compare("EXISTS", json!(0), json!(null)));
        assert!(!compare("EXISTS", json!(""), json!(null)));
        assert!(!compare("EXISTS", json!(null), json!(null)));
        assert!(compare("NOT EXISTS", json!(""), json!(null)));
        assert!(!compare("NOT EXISTS", json!(false), json!(null)));
    }
}
