//! 条件操作符定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 内置比较操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    // 一元比较
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Neq,
    #[serde(rename = "===")]
    StrictEq,
    #[serde(rename = "!==")]
    StrictNeq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,

    // 集合
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "NOT IN")]
    NotIn,

    // 区间
    #[serde(rename = "BETWEEN")]
    Between,
    #[serde(rename = "NOT BETWEEN")]
    NotBetween,

    // 模式匹配
    #[serde(rename = "LIKE")]
    Like,
    #[serde(rename = "NOT LIKE")]
    NotLike,
    #[serde(rename = "REGEXP")]
    Regexp,
    #[serde(rename = "NOT REGEXP")]
    NotRegexp,
    #[serde(rename = "RLIKE")]
    Rlike,

    // 存在性检查
    #[serde(rename = "EXISTS")]
    Exists,
    #[serde(rename = "NOT EXISTS")]
    NotExists,
}

/// 操作符的元数类别，决定操作数应有的形状
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorClass {
    /// 标量比较
    Compare,
    /// 列表成员
    Membership,
    /// 两端区间
    Range,
    /// 模式匹配
    Pattern,
    /// 存在性，操作数无意义
    Presence,
}

impl Operator {
    /// 完整的内置操作符目录
    pub const ALL: [Operator; 19] = [
        Self::Eq,
        Self::Neq,
        Self::StrictEq,
        Self::StrictNeq,
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::In,
        Self::NotIn,
        Self::Between,
        Self::NotBetween,
        Self::Like,
        Self::NotLike,
        Self::Regexp,
        Self::NotRegexp,
        Self::Rlike,
        Self::Exists,
        Self::NotExists,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Neq => "!=",
            Self::StrictEq => "===",
            Self::StrictNeq => "!==",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::Between => "BETWEEN",
            Self::NotBetween => "NOT BETWEEN",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::Regexp => "REGEXP",
            Self::NotRegexp => "NOT REGEXP",
            Self::Rlike => "RLIKE",
            Self::Exists => "EXISTS",
            Self::NotExists => "NOT EXISTS",
        }
    }

    /// 按符号解析（大小写不敏感，`==` 视为 `=`，多余空白会被压缩）
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let normalized = symbol
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase();

        if normalized == "==" {
            return Some(Self::Eq);
        }

        Self::ALL.into_iter().find(|op| op.symbol() == normalized)
    }

    pub fn class(&self) -> OperatorClass {
        match self {
            Self::Eq
            | Self::Neq
            | Self::StrictEq
            | Self::StrictNeq
            | Self::Gt
            | Self::Gte
            | Self::Lt
            | Self::Lte => OperatorClass::Compare,
            Self::In | Self::NotIn => OperatorClass::Membership,
            Self::Between | Self::NotBetween => OperatorClass::Range,
            Self::Like | Self::NotLike | Self::Regexp | Self::NotRegexp | Self::Rlike => {
                OperatorClass::Pattern
            }
            Self::Exists | Self::NotExists => OperatorClass::Presence,
        }
    }

    /// 是否为列表型操作符（集合或区间）
    pub fn takes_list(&self) -> bool {
        matches!(
            self.class(),
            OperatorClass::Membership | OperatorClass::Range
        )
    }

    /// `length` 检查是否支持该操作符
    pub fn supports_length(&self) -> bool {
        matches!(
            self.class(),
            OperatorClass::Compare | OperatorClass::Membership | OperatorClass::Range
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// 规则中使用的比较操作：内置操作符或运行时注册的自定义操作符
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CompareOp {
    Builtin(Operator),
    Custom(String),
}

impl CompareOp {
    /// 解析符号；目录外的符号保留为自定义操作符（大写化）
    pub fn parse(symbol: &str) -> Self {
        match Operator::from_symbol(symbol) {
            Some(op) => Self::Builtin(op),
            None => Self::Custom(symbol.trim().to_uppercase()),
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Self::Builtin(op) => op.symbol(),
            Self::Custom(symbol) => symbol,
        }
    }

    /// 指标标签：自定义操作符统一记为 `custom`，避免标签基数失控
    pub fn label(&self) -> &'static str {
        match self {
            Self::Builtin(op) => op.symbol(),
            Self::Custom(_) => "custom",
        }
    }

    pub fn builtin(&self) -> Option<Operator> {
        match self {
            Self::Builtin(op) => Some(*op),
            Self::Custom(_) => None,
        }
    }

    /// 自定义操作符按标量比较处理
    pub fn class(&self) -> OperatorClass {
        match self {
            Self::Builtin(op) => op.class(),
            Self::Custom(_) => OperatorClass::Compare,
        }
    }

    pub fn is(&self, op: Operator) -> bool {
        self.builtin() == Some(op)
    }

    pub fn is_any(&self, ops: &[Operator]) -> bool {
        self.builtin().is_some_and(|op| ops.contains(&op))
    }

    pub fn takes_list(&self) -> bool {
        matches!(
            self.class(),
            OperatorClass::Membership | OperatorClass::Range
        )
    }
}

impl From<Operator> for CompareOp {
    fn from(op: Operator) -> Self {
        Self::Builtin(op)
    }
}

impl From<String> for CompareOp {
    fn from(symbol: String) -> Self {
        Self::parse(&symbol)
    }
}

impl From<CompareOp> for String {
    fn from(op: CompareOp) -> Self {
        op.symbol().to_string()
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// 检查维度：原始值、字符长度或自定义检查
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CheckKind {
    #[default]
    Value,
    Length,
    Custom(String),
}

impl CheckKind {
    pub fn parse(name: &str) -> Self {
        let name = name.trim();
        if name.is_empty() || name.eq_ignore_ascii_case("value") {
            Self::Value
        } else if name.eq_ignore_ascii_case("length") {
            Self::Length
        } else {
            Self::Custom(name.to_string())
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Value => "value",
            Self::Length => "length",
            Self::Custom(name) => name,
        }
    }

    /// 指标标签
    pub fn label(&self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::Length => "length",
            Self::Custom(_) => "custom",
        }
    }
}

impl From<String> for CheckKind {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl From<CheckKind> for String {
    fn from(check: CheckKind) -> Self {
        check.name().to_string()
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 逻辑操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

impl LogicalOperator {
    /// 只有 "OR"（大小写不敏感）是 OR，其余一律 AND
    pub fn parse(relation: &str) -> Self {
        if relation.trim().eq_ignore_ascii_case("OR") {
            Self::Or
        } else {
            Self::And
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}
