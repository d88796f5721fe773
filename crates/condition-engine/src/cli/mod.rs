//! 命令行模块
//!
//! 子命令定义与执行逻辑分开存放，main 只负责初始化与退出码。

mod commands;
mod runner;

pub use commands::{Cli, Commands};
pub use runner::{CommandRunner, EXIT_ERROR, EXIT_MATCHED, EXIT_NOT_MATCHED};
