//! 条件引擎领域模型

use crate::operators::{CheckKind, CompareOp, LogicalOperator, Operator};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;

/// 规范化之前的原始条件
///
/// 各字段都可能缺失，由 [`crate::normalizer::ValueNormalizer`] 补全默认值并修正。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCondition {
    pub field: Option<String>,
    pub check: CheckKind,
    pub compare: Option<String>,
    pub value: Value,
}

impl RawCondition {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            ..Default::default()
        }
    }

    pub fn check(mut self, check: CheckKind) -> Self {
        self.check = check;
        self
    }

    pub fn compare(mut self, compare: impl Into<String>) -> Self {
        self.compare = Some(compare.into());
        self
    }

    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }
}

/// 条件节点（已规范化）
///
/// 操作数形状与操作符类别一致：集合操作符对应列表，区间操作符对应两元素列表，
/// 存在性操作符对应 null。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    #[serde(default)]
    pub check: CheckKind,
    pub compare: CompareOp,
    #[serde(default)]
    pub value: Value,
}

impl Condition {
    /// 直接构造，跳过规范化
    pub fn new(field: impl Into<String>, compare: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            check: CheckKind::Value,
            compare: CompareOp::Builtin(compare),
            value: value.into(),
        }
    }

    pub fn with_check(mut self, check: CheckKind) -> Self {
        self.check = check;
        self
    }
}

/// 逻辑组节点
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LogicalGroup {
    #[serde(default)]
    pub relation: LogicalOperator,
    #[serde(default)]
    pub children: Vec<ConditionNode>,
}

impl LogicalGroup {
    pub fn new(relation: LogicalOperator, children: Vec<ConditionNode>) -> Self {
        Self { relation, children }
    }

    pub fn and(children: Vec<ConditionNode>) -> Self {
        Self::new(LogicalOperator::And, children)
    }

    pub fn or(children: Vec<ConditionNode>) -> Self {
        Self::new(LogicalOperator::Or, children)
    }
}

/// 表达式节点（条件或逻辑组）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionNode {
    Condition(Condition),
    Group(LogicalGroup),
}

impl ConditionNode {
    /// 遍历所有条件（深度优先、保持顺序）
    pub fn conditions(&self) -> Vec<&Condition> {
        let mut out = Vec::new();
        self.collect_conditions(&mut out);
        out
    }

    fn collect_conditions<'a>(&'a self, out: &mut Vec<&'a Condition>) {
        match self {
            Self::Condition(cond) => out.push(cond),
            Self::Group(group) => {
                for child in &group.children {
                    child.collect_conditions(out);
                }
            }
        }
    }
}

impl From<Condition> for ConditionNode {
    fn from(cond: Condition) -> Self {
        Self::Condition(cond)
    }
}

impl From<LogicalGroup> for ConditionNode {
    fn from(group: LogicalGroup) -> Self {
        Self::Group(group)
    }
}

/// 评估上下文 - 提供给引擎的数据记录，只读
///
/// 既可以持有记录，也可以借用调用方的记录。
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext<'a> {
    data: Cow<'a, Value>,
    dotted_paths: bool,
}

impl EvaluationContext<'static> {
    pub fn new(data: Value) -> Self {
        Self {
            data: Cow::Owned(data),
            dotted_paths: true,
        }
    }

    /// 从 JSON 对象创建
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let data: Value = serde_json::from_str(json)?;
        Ok(Self::new(data))
    }
}

impl<'a> EvaluationContext<'a> {
    /// 借用记录，不复制
    pub fn borrowed(data: &'a Value) -> Self {
        Self {
            data: Cow::Borrowed(data),
            dotted_paths: true,
        }
    }

    /// 关闭点号路径查找，字段名只按字面匹配
    pub fn literal_keys(mut self) -> Self {
        self.dotted_paths = false;
        self
    }

    /// 获取字段值
    ///
    /// 先按字面键查找（字段名本身可以包含点号），找不到时再按点号路径
    /// （如 "user.profile.age" 或 "items.0.name"）逐级查找。
    pub fn get_field(&self, path: &str) -> Option<&Value> {
        if let Value::Object(map) = self.data.as_ref() {
            if let Some(value) = map.get(path) {
                return Some(value);
            }
        }

        if !self.dotted_paths || !path.contains('.') {
            return None;
        }

        let mut current = self.data.as_ref();
        for part in path.split('.') {
            match current {
                Value::Object(map) => {
                    current = map.get(part)?;
                }
                Value::Array(arr) => {
                    let index: usize = part.parse().ok()?;
                    current = arr.get(index)?;
                }
                _ => return None,
            }
        }

        Some(current)
    }

    /// 获取底层数据
    pub fn data(&self) -> &Value {
        &self.data
    }
}

/// 单条条件的评估结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionOutcome {
    /// 条件在表达式树中的位置，如 `root.children[1]`
    pub path: String,
    pub field: String,
    pub check: CheckKind,
    pub compare: CompareOp,
    pub matched: bool,
}

/// 评估结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvaluationResult {
    pub matched: bool,
    /// 实际被评估的条件（短路跳过的不在其中）
    pub conditions: Vec<ConditionOutcome>,
    pub evaluation_trace: Vec<String>,
    pub evaluation_time_us: u64,
}

impl EvaluationResult {
    /// 命中的条件路径
    pub fn matched_paths(&self) -> Vec<&str> {
        self.conditions
            .iter()
            .filter(|c| c.matched)
            .map(|c| c.path.as_str())
            .collect()
    }

    /// 查找某个路径上的条件结果
    pub fn outcome(&self, path: &str) -> Option<bool> {
        self.conditions
            .iter()
            .find(|c| c.path == path)
            .map(|c| c.matched)
    }
}
