//! 节点配置参数
//!
//! 配置文件提供基础值，命令行参数逐项覆盖。

use anyhow::{Context, Result};
use baja_driver::NodeConfig;
use baja_protocol::Subsystem;
use clap::Args;
use std::path::PathBuf;

/// 节点配置来源
#[derive(Args, Debug, Clone, Default)]
pub struct NodeArgs {
    /// TOML 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// CAN 接口名称（如 can0、vcan0）
    #[arg(short, long)]
    pub interface: Option<String>,

    /// 总线波特率
    #[arg(short, long)]
    pub bitrate: Option<u32>,

    /// 子系统角色（如 cvt、wheel-speed、base-station）
    #[arg(short, long)]
    pub role: Option<Subsystem>,

    /// 发送周期（毫秒）
    #[arg(long)]
    pub interval_ms: Option<u64>,
}

impl NodeArgs {
    /// 合并配置文件与命令行覆盖项，并校验结果
    pub fn resolve(&self) -> Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => NodeConfig::default(),
        };

        if let Some(interface) = &self.interface {
            config.interface = interface.clone();
        }
        if let Some(bitrate) = self.bitrate {
            config.bitrate = bitrate;
        }
        if let Some(role) = self.role {
            config.role = role;
        }
        if let Some(interval_ms) = self.interval_ms {
            config.transmit_interval_ms = interval_ms;
        }

        config.validate().context("Invalid node configuration")?;
        Ok(config)
    }
}
