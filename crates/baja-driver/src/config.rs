//! 节点启动配置
//!
//! 启动时读取一次，`build()` 之后不可变。
//!
//! ```toml
//! interface = "can0"
//! bitrate = 1000000
//! role = "cvt"
//! transmit_interval_ms = 100
//! ```

use crate::clock::MILLIS_RANGE;
use crate::error::DriverError;
use baja_protocol::Subsystem;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 默认发送周期（毫秒）
pub const DEFAULT_TRANSMIT_INTERVAL_MS: u64 = 100;

/// 默认总线波特率
pub const DEFAULT_BITRATE: u32 = 1_000_000;

/// 节点配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    /// CAN 接口名称（如 "can0"、"vcan0"）
    pub interface: String,
    /// 总线波特率
    pub bitrate: u32,
    /// 本节点扮演的子系统角色
    pub role: Subsystem,
    /// 发送周期（毫秒）
    pub transmit_interval_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            interface: "can0".to_string(),
            bitrate: DEFAULT_BITRATE,
            role: Subsystem::BaseStation,
            transmit_interval_ms: DEFAULT_TRANSMIT_INTERVAL_MS,
        }
    }
}

impl NodeConfig {
    /// 从 TOML 文本解析并校验
    pub fn from_toml_str(text: &str) -> Result<Self, DriverError> {
        let config: Self =
            toml::from_str(text).map_err(|e| DriverError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DriverError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// 序列化为 TOML
    pub fn to_toml_string(&self) -> Result<String, DriverError> {
        toml::to_string(self).map_err(|e| DriverError::Config(e.to_string()))
    }

    /// 校验配置
    ///
    /// # 错误
    /// - `DriverError::Config`: 接口名为空、波特率或发送周期为 0
    /// - `DriverError::Config`: 发送周期不小于毫秒计数器的回绕范围（2^32）
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.interface.trim().is_empty() {
            return Err(DriverError::Config("interface must not be empty".into()));
        }
        if self.bitrate == 0 {
            return Err(DriverError::Config("bitrate must be positive".into()));
        }
        if self.transmit_interval_ms == 0 {
            return Err(DriverError::Config(
                "transmit_interval_ms must be positive".into(),
            ));
        }
        // 回绕计数器上的经过时间永远小于范围，这样的周期永远不会到期
        if self.transmit_interval_ms >= MILLIS_RANGE {
            return Err(DriverError::Config(format!(
                "transmit_interval_ms must be below {}",
                MILLIS_RANGE
            )));
        }
        Ok(())
    }

    pub fn transmit_interval(&self) -> Duration {
        Duration::from_millis(self.transmit_interval_ms)
    }
}
