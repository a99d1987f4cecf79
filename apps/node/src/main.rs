//! # BajaCAN Node
//!
//! 子系统节点运行器：打开 CAN 接口，按角色周期性发送本子系统拥有的变量，
//! 同时解码总线上所有已知变量。
//!
//! ```bash
//! # 以 CVT 角色运行在 can0 上
//! baja-node run --role cvt --interface can0
//!
//! # 使用配置文件，命令行参数优先
//! baja-node run --config node.toml --interval-ms 50
//!
//! # 查看整车变量表与所有权
//! baja-node schema
//!
//! # 生成配置模板
//! baja-node config init node.toml
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod status;

use commands::{ConfigCommand, RunCommand, SchemaCommand};

/// BajaCAN 子系统节点
#[derive(Parser, Debug)]
#[command(name = "baja-node")]
#[command(about = "Shared CAN communication node for the Baja vehicle", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 运行节点直到 Ctrl+C
    Run {
        #[command(flatten)]
        args: RunCommand,
    },

    /// 打印变量表与所有权
    Schema {
        #[command(flatten)]
        args: SchemaCommand,
    },

    /// 配置文件管理
    #[command(subcommand)]
    Config(ConfigCommand),
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("baja_node=info".parse()?)
                .add_directive("baja_driver=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { args } => args.execute(),
        Commands::Schema { args } => args.execute(),
        Commands::Config(cmd) => cmd.execute(),
    }
}
