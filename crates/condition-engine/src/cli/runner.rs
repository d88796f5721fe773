//! 命令执行器
//!
//! 负责执行各 CLI 子命令的具体逻辑，返回进程退出码：
//! 匹配（或命令成功）为 0，不匹配为 1，读取或解析失败为 2。

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;

use super::Commands;
use crate::engine::ConditionEngine;

pub const EXIT_MATCHED: u8 = 0;
pub const EXIT_NOT_MATCHED: u8 = 1;
pub const EXIT_ERROR: u8 = 2;

/// 命令执行器
pub struct CommandRunner {
    engine: ConditionEngine,
}

impl CommandRunner {
    pub fn new(engine: ConditionEngine) -> Self {
        Self { engine }
    }

    /// 执行子命令，输出写到 `out`
    pub fn run(&self, command: Commands, out: &mut impl Write) -> Result<u8> {
        match command {
            Commands::Eval {
                expr,
                record,
                trace,
                json,
            } => self.run_eval(&expr, &record, trace, json, out),
            Commands::Normalize { expr } => self.run_normalize(&expr, out),
            Commands::Fields { expr } => self.run_fields(&expr, out),
        }
    }

    /// 执行 eval 命令
    pub fn run_eval(
        &self,
        expr: &Path,
        record: &Path,
        trace: bool,
        json: bool,
        out: &mut impl Write,
    ) -> Result<u8> {
        let expression = read_json(expr)?;
        let record = read_json(record)?;

        let engine = if trace {
            self.engine.clone().with_trace()
        } else {
            self.engine.clone()
        };
        let result = engine.execute(&expression, &record);

        info!(
            matched = result.matched,
            evaluated = result.conditions.len(),
            elapsed_us = result.evaluation_time_us,
            "评估完成"
        );

        if json {
            serde_json::to_writer_pretty(&mut *out, &result)?;
            writeln!(out)?;
        } else {
            for line in &result.evaluation_trace {
                writeln!(out, "{}", line)?;
            }
            writeln!(out, "{}", result.matched)?;
        }

        let code = if result.matched {
            EXIT_MATCHED
        } else {
            EXIT_NOT_MATCHED
        };
        Ok(code)
    }

    /// 执行 normalize 命令
    ///
    /// 输出前校验所有操作符都已注册。
    pub fn run_normalize(&self, expr: &Path, out: &mut impl Write) -> Result<u8> {
        let expression = read_json(expr)?;
        let compiled = self
            .engine
            .check(&expression)
            .with_context(|| format!("表达式校验失败: {}", expr.display()))?;

        serde_json::to_writer_pretty(&mut *out, &compiled.root)?;
        writeln!(out)?;
        Ok(EXIT_MATCHED)
    }

    /// 执行 fields 命令
    pub fn run_fields(&self, expr: &Path, out: &mut impl Write) -> Result<u8> {
        let expression = read_json(expr)?;
        let compiled = self.engine.compile(&expression);

        for field in compiled.sorted_fields() {
            writeln!(out, "{}", field)?;
        }
        Ok(EXIT_MATCHED)
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let text =
        fs::read_to_string(path).with_context(|| format!("读取文件失败: {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("JSON 解析失败: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn runner() -> CommandRunner {
        CommandRunner::new(ConditionEngine::new())
    }

    #[test]
    fn test_eval_match_and_no_match() {
        let dir = tempfile::tempdir().unwrap();
        let expr = write(
            dir.path(),
            "expr.json",
            r#"[{"field": "age", "compare": "BETWEEN", "value": [18, 65]}]"#,
        );
        let young = write(dir.path(), "young.json", r#"{"age": 30}"#);
        let old = write(dir.path(), "old.json", r#"{"age": 70}"#);

        let mut out = Vec::new();
        let code = runner().run_eval(&expr, &young, false, false, &mut out).unwrap();
        assert_eq!(code, EXIT_MATCHED);
        assert_eq!(String::from_utf8(out).unwrap(), "true\n");

        let mut out = Vec::new();
        let code = runner().run_eval(&expr, &old, false, false, &mut out).unwrap();
        assert_eq!(code, EXIT_NOT_MATCHED);
        assert_eq!(String::from_utf8(out).unwrap(), "false\n");
    }

    #[test]
    fn test_eval_json_output() {
        let dir = tempfile::tempdir().unwrap();
        let expr = write(
            dir.path(),
            "expr.json",
            r#"{"field": "tag", "compare": "LIKE", "value": "%lorem%"}"#,
        );
        let record = write(dir.path(), "record.json", r#"{"tag": "Lorem Ipsum"}"#);

        let mut out = Vec::new();
        runner().run_eval(&expr, &record, true, true, &mut out).unwrap();

        let parsed: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed["matched"], true);
        assert_eq!(parsed["conditions"][0]["path"], "root");
        assert!(!parsed["evaluation_trace"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let expr = write(dir.path(), "expr.json", "[]");
        let missing = dir.path().join("nope.json");

        let mut out = Vec::new();
        assert!(runner().run_eval(&expr, &missing, false, false, &mut out).is_err());
    }

    #[test]
    fn test_invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let expr = write(dir.path(), "expr.json", "{not json");

        let mut out = Vec::new();
        assert!(runner().run_fields(&expr, &mut out).is_err());
    }

    #[test]
    fn test_normalize_output() {
        let dir = tempfile::tempdir().unwrap();
        let expr = write(
            dir.path(),
            "expr.json",
            r#"{"field": "tags", "compare": "NOT IN", "value": "foo"}"#,
        );

        let mut out = Vec::new();
        runner().run_normalize(&expr, &mut out).unwrap();

        let parsed: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed["type"], "condition");
        assert_eq!(parsed["compare"], "!=");
        assert_eq!(parsed["value"], "foo");
    }

    #[test]
    fn test_fields_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let expr = write(
            dir.path(),
            "expr.json",
            r#"{"relation": "OR", "children": [{"field": "b"}, {"key": "a"}, {"field": "b"}]}"#,
        );

        let mut out = Vec::new();
        runner().run_fields(&expr, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a\nb\n");
    }
}
