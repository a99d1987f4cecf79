//! 配置管理命令

use super::NodeArgs;
use anyhow::{Context, Result, bail};
use baja_driver::NodeConfig;
use clap::Subcommand;
use std::fs;
use std::path::{Path, PathBuf};

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 写出默认配置模板
    Init {
        /// 目标文件
        path: PathBuf,

        /// 覆盖已存在的文件
        #[arg(long)]
        force: bool,
    },

    /// 显示合并后的生效配置
    Show {
        #[command(flatten)]
        node: NodeArgs,
    },
}

impl ConfigCommand {
    pub fn execute(&self) -> Result<()> {
        match self {
            ConfigCommand::Init { path, force } => {
                write_template(path, *force)?;
                println!("Wrote {}", path.display());
                Ok(())
            },
            ConfigCommand::Show { node } => {
                let config = node.resolve()?;
                print!("{}", config.to_toml_string()?);
                Ok(())
            },
        }
    }
}

fn write_template(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let content = format!(
        "# BajaCAN node configuration\n\n{}",
        NodeConfig::default().to_toml_string()?
    );
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}
