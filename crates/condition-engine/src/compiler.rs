//! 表达式编译器
//!
//! 将 JSON 条件（`meta_query` 风格的嵌套数组/对象）解析并编译成内存中的表达式树，
//! 每个条件在编译时完成规范化，并预提取表达式引用的字段。
//!
//! 编译是全函数，形状不合法的部分会被跳过或退化，不会报错：
//! - null、标量、空数组、空对象：空 AND 组
//! - 含非空 `field` 或 `key` 的对象：单个条件（`field` 优先）
//! - 数组：AND 组
//! - 其他对象：逻辑组。`relation` 为 `OR`（不区分大小写）时为 OR 组，否则为 AND 组；
//!   `children` 数组与整数键为位置子节点；其余键视为字段名，对象值是默认该字段的条件，
//!   标量或列表值是 `{field: 键, value: 值}` 的简写

use crate::error::Result;
use crate::models::{ConditionNode, LogicalGroup, RawCondition};
use crate::normalizer::ValueNormalizer;
use crate::operators::{CheckKind, LogicalOperator};
use crate::registry::OperatorRegistry;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

const RELATION_KEY: &str = "relation";
const CHILDREN_KEY: &str = "children";

/// 编译后的表达式
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    pub root: ConditionNode,
    /// 表达式中使用的所有字段
    pub required_fields: HashSet<String>,
    /// 编译版本号（用于缓存失效）
    pub compile_version: u64,
}

impl CompiledExpression {
    pub fn root(&self) -> &ConditionNode {
        &self.root
    }

    /// 字段列表（已排序）
    pub fn sorted_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = self.required_fields.iter().map(String::as_str).collect();
        fields.sort_unstable();
        fields
    }
}

/// 表达式编译器
///
/// 克隆共享同一个版本计数器。
#[derive(Debug, Clone, Default)]
pub struct ExpressionCompiler {
    normalizer: ValueNormalizer,
    compile_version: Arc<AtomicU64>,
}

impl ExpressionCompiler {
    pub fn new(registry: OperatorRegistry) -> Self {
        Self {
            normalizer: ValueNormalizer::new(registry),
            compile_version: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 当前编译版本号
    pub fn version(&self) -> u64 {
        self.compile_version.load(Ordering::Relaxed)
    }

    /// 从 JSON 字符串编译，只在 JSON 语法错误时失败
    pub fn compile_from_json(&self, json: &str) -> Result<CompiledExpression> {
        let expression: Value = serde_json::from_str(json)?;
        Ok(self.compile(&expression))
    }

    /// 编译表达式，每次编译版本号加一
    pub fn compile(&self, expression: &Value) -> CompiledExpression {
        let root = self.build(expression);
        let required_fields = extract_fields(&root);
        let compile_version = self.compile_version.fetch_add(1, Ordering::Relaxed) + 1;

        debug!(
            version = compile_version,
            fields = required_fields.len(),
            "表达式编译完成"
        );

        CompiledExpression {
            root,
            required_fields,
            compile_version,
        }
    }

    /// 只构建表达式树，不提取字段也不占用版本号
    pub fn build(&self, expression: &Value) -> ConditionNode {
        self.compile_node(expression)
    }

    /// 规范化单个原始条件
    pub fn normalize(&self, raw: &RawCondition) -> ConditionNode {
        self.normalizer.normalize(raw).into()
    }

    fn compile_node(&self, value: &Value) -> ConditionNode {
        match value {
            Value::Object(map) if rule_field(map).is_some() => self.compile_rule(map, None),
            Value::Object(map) => self.compile_group(map),
            Value::Array(items) => LogicalGroup::and(
                items
                    .iter()
                    .filter_map(|item| self.compile_child(item, "[]"))
                    .collect(),
            )
            .into(),
            _ => LogicalGroup::default().into(),
        }
    }

    /// 子节点只接受对象或数组
    fn compile_child(&self, value: &Value, position: &str) -> Option<ConditionNode> {
        match value {
            Value::Object(_) | Value::Array(_) => Some(self.compile_node(value)),
            other => {
                warn!(position, value = %other, "忽略无法识别的子条件");
                None
            }
        }
    }

    fn compile_group(&self, map: &Map<String, Value>) -> ConditionNode {
        let relation = map
            .get(RELATION_KEY)
            .and_then(Value::as_str)
            .map(LogicalOperator::parse)
            .unwrap_or_default();

        let mut children = Vec::new();

        if let Some(explicit) = map.get(CHILDREN_KEY) {
            match explicit {
                Value::Array(items) => children.extend(
                    items
                        .iter()
                        .filter_map(|item| self.compile_child(item, CHILDREN_KEY)),
                ),
                other => {
                    if let Some(child) = self.compile_child(other, CHILDREN_KEY) {
                        children.push(child);
                    }
                }
            }
        }

        let mut positional: Vec<(u64, &String, &Value)> = Vec::new();
        let mut named: Vec<(&String, &Value)> = Vec::new();
        for (key, value) in map {
            if key == RELATION_KEY || key == CHILDREN_KEY {
                continue;
            }
            match key.trim().parse::<u64>() {
                Ok(index) => positional.push((index, key, value)),
                Err(_) => named.push((key, value)),
            }
        }

        // 整数键按数值排序
        positional.sort_by_key(|(index, _, _)| *index);
        children.extend(
            positional
                .into_iter()
                .filter_map(|(_, key, value)| self.compile_child(value, key)),
        );

        for (key, value) in named {
            let child = match value {
                Value::Object(rule) => self.compile_rule(rule, Some(key.as_str())),
                shorthand => {
                    self.normalize(&RawCondition::new(key.as_str()).value(shorthand.clone()))
                }
            };
            children.push(child);
        }

        LogicalGroup::new(relation, children).into()
    }

    fn compile_rule(
        &self,
        map: &Map<String, Value>,
        default_field: Option<&str>,
    ) -> ConditionNode {
        let raw = RawCondition {
            field: rule_field(map).or_else(|| default_field.map(str::to_string)),
            check: map
                .get("check")
                .and_then(Value::as_str)
                .map(CheckKind::parse)
                .unwrap_or_default(),
            compare: map.get("compare").and_then(Value::as_str).map(str::to_string),
            value: map.get("value").cloned().unwrap_or(Value::Null),
        };

        self.normalize(&raw)
    }
}

/// 条件对象的字段名：`field` 优先于 `key`，空值视为缺失
fn rule_field(map: &Map<String, Value>) -> Option<String> {
    ["field", "key"].iter().find_map(|name| {
        let text = match map.get(*name)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        (!text.is_empty()).then_some(text)
    })
}

/// 提取表达式中使用的所有字段
fn extract_fields(node: &ConditionNode) -> HashSet<String> {
    node.conditions()
        .into_iter()
        .map(|cond| cond.field.clone())
        .filter(|field| !field.is_empty())
        .collect()
}

/// 表达式的简短描述，用于日志
pub fn describe(node: &ConditionNode) -> String {
    match node {
        ConditionNode::Condition(cond) => format!(
            "{}({}) {} {}",
            cond.check, cond.field, cond.compare, cond.value
        ),
        ConditionNode::Group(group) => format!("{}[{}]", group.relation, group.children.len()),
    }
}
