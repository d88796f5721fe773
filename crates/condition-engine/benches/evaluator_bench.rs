//! 条件引擎性能基准测试
//!
//! 覆盖单条件评估、规范化、表达式编译以及整棵表达式树的执行。

use condition_engine::{
    CheckKind, Condition, ConditionEngine, ConditionEvaluator, Operator, OperatorRegistry,
    RawCondition, ValueNormalizer,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::{Value, json};
use std::hint::black_box;

fn evaluator() -> ConditionEvaluator {
    ConditionEvaluator::new(OperatorRegistry::new())
}

/// 比较类操作符基准
fn bench_compare_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare_operations");
    let ev = evaluator();
    let field = json!(1000);

    for op in [Operator::Eq, Operator::StrictEq, Operator::Gt, Operator::Lte] {
        let cond = Condition::new("n", op, json!(500));
        group.bench_function(op.symbol(), |b| {
            b.iter(|| ev.evaluate(black_box(&cond), black_box(Some(&field))))
        });
    }

    let version = json!("1.2.10");
    let cond = Condition::new("v", Operator::Gt, json!("1.2.9"));
    group.bench_function("version_gt", |b| {
        b.iter(|| ev.evaluate(black_box(&cond), black_box(Some(&version))))
    });

    group.finish();
}

/// 模式匹配基准（正则走缓存）
fn bench_pattern_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("pattern_operations");
    let ev = evaluator();
    let text = json!("Lorem ipsum dolor sit amet");
    let email = json!("user@example.com");

    let like = Condition::new("t", Operator::Like, json!("%dolor%"));
    group.bench_function("like", |b| {
        b.iter(|| ev.evaluate(black_box(&like), black_box(Some(&text))))
    });

    let regex = Condition::new("e", Operator::Regexp, json!(r"^[\w.-]+@[\w.-]+\.\w+$"));
    group.bench_function("regexp_cached", |b| {
        b.iter(|| ev.evaluate(black_box(&regex), black_box(Some(&email))))
    });

    let length = Condition::new("t", Operator::Between, json!([10, 40])).with_check(CheckKind::Length);
    group.bench_function("length_between", |b| {
        b.iter(|| ev.evaluate(black_box(&length), black_box(Some(&text))))
    });

    group.finish();
}

/// IN 操作符随列表长度的扩展性
fn bench_in_operator_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("in_operator_scaling");
    let ev = evaluator();
    let field = json!("target");

    for size in [10, 100, 1000].iter() {
        let mut items: Vec<Value> = (0..*size).map(|i| json!(format!("item-{}", i))).collect();
        items.push(json!("target"));
        let cond = Condition::new("f", Operator::In, Value::Array(items));

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| ev.evaluate(black_box(&cond), black_box(Some(&field))))
        });
    }

    group.finish();
}

/// 规范化基准
fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");
    let normalizer = ValueNormalizer::new(OperatorRegistry::new());

    let split = RawCondition::new("tags")
        .compare("NOT IN")
        .value("red, green, blue, red");
    group.bench_function("split_scalar", |b| {
        b.iter(|| normalizer.normalize(black_box(&split)))
    });

    let range = RawCondition::new("age").compare("between").value(json!([18, 65, 99]));
    group.bench_function("truncate_range", |b| {
        b.iter(|| normalizer.normalize(black_box(&range)))
    });

    group.finish();
}

/// 表达式编译与执行基准
fn bench_expression(c: &mut Criterion) {
    let mut group = c.benchmark_group("expression");
    let engine = ConditionEngine::new();

    let expression = json!({
        "relation": "AND",
        "children": [
            { "field": "age", "compare": "BETWEEN", "value": [18, 65] },
            {
                "relation": "OR",
                "children": [
                    { "field": "tags", "compare": "IN", "value": ["vip", "gold"] },
                    { "field": "name", "check": "length", "compare": ">", "value": 3 }
                ]
            }
        ]
    });
    let record = json!({ "age": 30, "tags": ["gold"], "name": "Alice" });

    group.bench_function("compile", |b| b.iter(|| engine.compile(black_box(&expression))));

    let compiled = engine.compile(&expression);
    group.bench_function("evaluate_compiled", |b| {
        b.iter(|| engine.evaluate_compiled(black_box(&compiled), black_box(&record)))
    });

    group.bench_function("execute_compiled", |b| {
        b.iter(|| engine.execute_compiled(black_box(&compiled), black_box(&record)))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_compare_operations,
    bench_pattern_operations,
    bench_in_operator_scaling,
    bench_normalize,
    bench_expression,
);

criterion_main!(benches);
