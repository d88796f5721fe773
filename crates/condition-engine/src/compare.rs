//! 值比较与类型转换
//!
//! 内置比较函数全部建立在这里的几个原语之上。宽松相等的规则：
//!
//! - null 与 null、空字符串、`false`、`0`、空数组相等
//! - 布尔值与任意值比较时，比较对方的真值（`""`、`"0"`、`0`、null、空数组为假）
//! - 两侧都能解析为数字时按数值比较（`"10" == 10.0`）
//! - 数字与非数字字符串比较时，把数字格式化成字符串再比较
//! - 数组按位置逐个宽松比较，对象要求完全相等
//!
//! 严格相等要求 JSON 类型与值都相同，`1` 与 `1.0`、`"1"` 与 `1` 都不相等。
//!
//! 排序比较只要有一侧是数值，另一侧就取开头的数字部分（没有则为 0），
//! 所以 `"abc" > 18` 与 `"9abc" > 18` 都不成立。

use dashmap::DashMap;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::warn;

use crate::error::{ConditionError, Result};

/// 宽松相等
pub fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(b), other) | (other, Value::Bool(b)) => truthy(other) == *b,
        (Value::Null, other) | (other, Value::Null) => is_blank(other),
        (Value::Number(_), Value::Number(_)) => numbers_eq(left, right),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            match parse_number(s) {
                Some(parsed) => n.as_f64().is_some_and(|f| f == parsed),
                None => n.to_string() == *s,
            }
        }
        (Value::String(a), Value::String(b)) => match (parse_number(a), parse_number(b)) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| loose_eq(x, y))
        }
        _ => left == right,
    }
}

/// 严格相等：类型与值都相同
pub fn strict_eq(left: &Value, right: &Value) -> bool {
    left == right
}

fn numbers_eq(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// 真值判断
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(arr) => !arr.is_empty(),
        Value::Object(_) => true,
    }
}

/// 与 null 宽松相等的"空"值
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f == 0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(arr) => arr.is_empty(),
        Value::Object(_) => false,
    }
}

/// 解析数字字符串（允许前后空白）
pub fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|f| f.is_finite())
}

/// 尝试将 Value 转换为 f64（null 视为 0，布尔视为 0/1）
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// 转换为整数（取数字前缀，无前缀时为 0，向零截断）
pub fn as_integer(value: &Value) -> i64 {
    to_float(value).map(|f| f.trunc() as i64).unwrap_or(0)
}

/// 按浮点强制转换：字符串取开头的数字部分（`"9abc"` 为 9），没有数字前缀时为 0。
/// 数组和对象无法转换。
pub fn to_float(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => Some(leading_number(s)),
        Value::Array(_) | Value::Object(_) => None,
        other => as_number(other),
    }
}

/// 字符串开头的十进制数字（可带符号、小数与指数）
fn leading_number(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let int_end = digits_from(end);
    let mut mantissa_end = int_end;
    if bytes.get(int_end) == Some(&b'.') {
        let frac_end = digits_from(int_end + 1);
        if frac_end > int_end + 1 || int_end > end {
            mantissa_end = frac_end;
        }
    }
    if mantissa_end == end {
        return 0.0;
    }

    end = mantissa_end;
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    s[..end]
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .unwrap_or(0.0)
}

/// 数字、布尔、null 与数字字符串视为数值
fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Array(_) | Value::Object(_) => false,
        other => as_number(other).is_some(),
    }
}

/// 值的文本形式，用于字符串类比较
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => String::new(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 字符长度（按 Unicode 字符计数）
pub fn char_length(value: &Value) -> usize {
    to_text(value).chars().count()
}

/// 排序比较
///
/// 任一侧是数值时，两侧都按浮点强制转换后比较（`"abc"` 为 0，`"9abc"` 为 9）；
/// 两侧都是非数字字符串时，都像版本号则逐段比较，否则按文本字典序。
/// 数组、对象无法比较，返回 None。
pub fn compare_order(left: &Value, right: &Value) -> Option<Ordering> {
    if left.is_object() || right.is_object() || left.is_array() || right.is_array() {
        return None;
    }

    if is_numeric(left) || is_numeric(right) {
        let (a, b) = (to_float(left)?, to_float(right)?);
        return a.partial_cmp(&b);
    }

    let (a, b) = (to_text(left), to_text(right));
    if is_version(&a) && is_version(&b) {
        return Some(version_cmp(&a, &b));
    }

    Some(a.cmp(&b))
}

/// 形如 `1.2.10`、`v2.0-rc1` 的版本号
fn is_version(s: &str) -> bool {
    let s = s.strip_prefix(['v', 'V']).unwrap_or(s);
    s.starts_with(|c: char| c.is_ascii_digit())
        && s.contains('.')
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '+'))
}

/// 按 `.`、`-`、`_`、`+` 分段，数字段按数值比较，其余按字典序；缺失段视为 0
pub fn version_cmp(a: &str, b: &str) -> Ordering {
    let split = |s: &str| -> Vec<String> {
        s.strip_prefix(['v', 'V'])
            .unwrap_or(s)
            .split(['.', '-', '_', '+'])
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    };
    let (left, right) = (split(a), split(b));

    for i in 0..left.len().max(right.len()) {
        let x = left.get(i).map(String::as_str).unwrap_or("0");
        let y = right.get(i).map(String::as_str).unwrap_or("0");

        let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
            (Ok(m), Ok(n)) => m.cmp(&n),
            // 预发布段（如 rc1）排在纯数字段之前
            (Ok(_), Err(_)) => Ordering::Greater,
            (Err(_), Ok(_)) => Ordering::Less,
            (Err(_), Err(_)) => x.cmp(y),
        };

        if ord != Ordering::Equal {
            return ord;
        }
    }

    Ordering::Equal
}

/// LIKE 匹配：大小写不敏感的包含判断
///
/// `%` 表示任意长度字符，首尾的 `%` 不改变语义；`a%b` 要求 `a` 之后出现 `b`。
pub fn like(haystack: &Value, pattern: &Value) -> bool {
    let haystack = to_text(haystack).to_lowercase();
    let pattern = to_text(pattern).to_lowercase();

    let mut rest = haystack.as_str();
    for piece in pattern.split('%').filter(|p| !p.is_empty()) {
        match rest.find(piece) {
            Some(pos) => rest = &rest[pos + piece.len()..],
            None => return false,
        }
    }

    true
}

/// 正则编译缓存
///
/// 编译失败的模式同样会被缓存，避免每次评估都重新报错。
#[derive(Clone)]
pub struct PatternCache {
    patterns: Arc<DashMap<String, Option<Regex>>>,
    capacity: usize,
}

impl PatternCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            patterns: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// 判断文本是否匹配模式；模式无效时返回 None
    pub fn is_match(&self, pattern: &str, text: &str) -> Option<bool> {
        if let Some(entry) = self.patterns.get(pattern) {
            return entry.as_ref().map(|re| re.is_match(text));
        }

        let compiled = match compile_pattern(pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "正则表达式无效，按不匹配处理");
                conditions_shared::observability::metrics::record_pattern_error();
                None
            }
        };
        let result = compiled.as_ref().map(|re| re.is_match(text));

        if self.patterns.len() >= self.capacity {
            self.patterns.clear();
        }
        self.patterns.insert(pattern.to_string(), compiled);

        result
    }
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new(256)
    }
}

/// 编译模式
///
/// 支持两种写法：裸模式（`^a.*`）与带分隔符和修饰符的写法（`/^a/i`、`#x#s`）。
/// 修饰符 `i`、`m`、`s`、`x`、`U` 映射为对应的正则标志，`u`、`D` 被忽略。
pub fn compile_pattern(pattern: &str) -> Result<Regex> {
    let invalid = |reason: String| ConditionError::InvalidPattern {
        pattern: pattern.to_string(),
        reason,
    };

    if pattern.is_empty() {
        return Err(invalid("空模式".to_string()));
    }

    let (body, flags) = split_delimited(pattern).unwrap_or((pattern, ""));

    let mut builder = RegexBuilder::new(body);
    for flag in flags.chars() {
        match flag {
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            'x' => {
                builder.ignore_whitespace(true);
            }
            'U' => {
                builder.swap_greed(true);
            }
            _ => {}
        }
    }

    builder.build().map_err(|e| invalid(e.to_string()))
}

/// 拆出分隔符包裹的模式体与修饰符
fn split_delimited(pattern: &str) -> Option<(&str, &str)> {
    let delimiter = pattern.chars().next()?;
    if !matches!(delimiter, '/' | '#' | '~' | '!' | '@' | '%' | '|') {
        return None;
    }

    let end = pattern.rfind(delimiter)?;
    if end == 0 {
        return None;
    }

    let flags = &pattern[end + 1..];
    if !flags.chars().all(|c| "imsxuUD".contains(c)) {
        return None;
    }

    Some((&pattern[1..end], flags))
}
