//! CLI 命令定义
//!
//! 使用 clap derive 宏定义命令行接口结构。表达式与记录都从 JSON 文件读取。

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// 条件引擎命令行工具
///
/// 评估条件表达式、查看规范化结果或列出表达式引用的字段。
#[derive(Parser, Debug)]
#[command(name = "condition-engine")]
#[command(version, about = "条件匹配引擎命令行工具")]
#[command(propagate_version = true)]
pub struct Cli {
    /// 日志级别，覆盖配置文件 (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// 子命令枚举
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 评估表达式是否匹配记录
    ///
    /// 匹配时退出码为 0，不匹配时为 1，读取或解析失败时为 2。
    Eval {
        /// 表达式 JSON 文件
        #[arg(short, long)]
        expr: PathBuf,

        /// 记录 JSON 文件
        #[arg(short, long)]
        record: PathBuf,

        /// 输出评估追踪
        #[arg(long)]
        trace: bool,

        /// 以 JSON 输出完整评估结果
        #[arg(long)]
        json: bool,
    },

    /// 输出规范化后的表达式树
    Normalize {
        /// 表达式 JSON 文件
        #[arg(short, long)]
        expr: PathBuf,
    },

    /// 列出表达式引用的字段
    Fields {
        /// 表达式 JSON 文件
        #[arg(short, long)]
        expr: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_eval() {
        let cli = Cli::try_parse_from([
            "condition-engine",
            "eval",
            "--expr",
            "expr.json",
            "--record",
            "record.json",
            "--trace",
        ])
        .unwrap();

        match cli.command {
            Commands::Eval {
                expr,
                record,
                trace,
                json,
            } => {
                assert_eq!(expr, PathBuf::from("expr.json"));
                assert_eq!(record, PathBuf::from("record.json"));
                assert!(trace);
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_log_level() {
        let cli =
            Cli::try_parse_from(["condition-engine", "fields", "-e", "x.json", "-l", "debug"])
                .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_eval_requires_record() {
        assert!(Cli::try_parse_from(["condition-engine", "eval", "--expr", "x.json"]).is_err());
    }
}
