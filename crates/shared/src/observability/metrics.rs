//! 指标模块
//!
//! 只依赖 metrics 门面：未安装 recorder 时所有记录都是空操作。

/// 注册指标描述
pub fn describe_metrics() {
    metrics::describe_counter!(
        "condition_evaluations_total",
        "Total number of expression evaluations"
    );
    metrics::describe_histogram!(
        "condition_evaluation_duration_seconds",
        "Expression evaluation duration in seconds"
    );
    metrics::describe_counter!(
        "condition_rule_checks_total",
        "Total number of single rule checks"
    );
    metrics::describe_counter!(
        "condition_pattern_errors_total",
        "Total number of regex patterns that failed to compile"
    );
}

/// 记录一次表达式评估
#[inline]
pub fn record_expression_evaluation(matched: bool, duration_secs: f64) {
    metrics::counter!(
        "condition_evaluations_total",
        "matched" => bool_label(matched)
    )
    .increment(1);

    metrics::histogram!("condition_evaluation_duration_seconds").record(duration_secs);
}

/// 记录一次单条规则检查
///
/// 标签只接受静态字符串，热路径上不分配。
#[inline]
pub fn record_rule_check(check: &'static str, operator: &'static str, matched: bool) {
    metrics::counter!(
        "condition_rule_checks_total",
        "check" => check,
        "operator" => operator,
        "matched" => bool_label(matched)
    )
    .increment(1);
}

/// 记录正则编译失败
#[inline]
pub fn record_pattern_error() {
    metrics::counter!("condition_pattern_errors_total").increment(1);
}

#[inline]
fn bool_label(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}
