//! 条件引擎命令行入口
//!
//! 加载配置、初始化日志后执行子命令，并把结果映射为进程退出码。

use clap::Parser;
use condition_engine::ConditionEngine;
use condition_engine::cli::{Cli, CommandRunner, EXIT_ERROR};
use conditions_shared::config::AppConfig;
use conditions_shared::observability::{self, ObservabilityGuard};
use std::process::ExitCode;
use tracing::error;

const SERVICE_NAME: &str = "condition-engine";

fn main() -> ExitCode {
    let cli = Cli::parse();

    // 配置缺失或损坏时使用默认配置，不影响命令执行
    let config = AppConfig::load(SERVICE_NAME).unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    let mut obs_config = config.observability();
    if let Some(level) = &cli.log_level {
        obs_config.log_level = level.clone();
    }
    let _guard = observability::init(&obs_config).unwrap_or_else(|e| {
        eprintln!("Failed to initialize logging: {}", e);
        ObservabilityGuard::empty()
    });

    let runner = CommandRunner::new(ConditionEngine::from_config(&config.engine));
    let mut stdout = std::io::stdout().lock();

    match runner.run(cli.command, &mut stdout) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!(error = %e, "命令执行失败");
            eprintln!("error: {:#}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
