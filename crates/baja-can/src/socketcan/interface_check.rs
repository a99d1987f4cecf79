//! CAN 接口状态检查模块
//!
//! 读取 `/sys/class/net/<iface>/flags` 判断接口是否存在且已启动（UP 状态）。
//!
//! 此模块仅提供检查功能，不进行任何配置操作，因此不需要特殊权限。

use crate::{CanDeviceError, CanDeviceErrorKind, CanError};
use std::path::Path;
use tracing::trace;

/// `IFF_UP`（linux/if.h）
const IFF_UP: u32 = 0x1;

/// ifr_name 为 IFNAMSIZ = 16 字节，包括结尾的 NUL
const MAX_IFACE_NAME_LEN: usize = 15;

/// 检查 CAN 接口是否存在且已启动（管理态 UP）
///
/// # 返回值
/// - `Ok(true)`: 接口存在且 IFF_UP 标志位为真
/// - `Ok(false)`: 接口存在但处于 DOWN 状态
/// - `Err(CanError::Device)`: 接口不存在或接口名无效
/// - `Err(CanError::Io)`: 读取 sysfs 失败
pub fn check_interface_status(interface: &str) -> Result<bool, CanError> {
    check_interface_status_in(Path::new("/sys/class/net"), interface)
}

fn check_interface_status_in(sysfs_net: &Path, interface: &str) -> Result<bool, CanError> {
    if interface.is_empty() || interface.len() > MAX_IFACE_NAME_LEN {
        return Err(CanError::Device(CanDeviceError::new(
            CanDeviceErrorKind::UnsupportedConfig,
            format!(
                "Interface name '{}' is invalid (1..={} characters)",
                interface, MAX_IFACE_NAME_LEN
            ),
        )));
    }
    if interface.contains(['/', '\0']) {
        return Err(CanError::Device(CanDeviceError::new(
            CanDeviceErrorKind::UnsupportedConfig,
            format!("Invalid interface name: {:?}", interface),
        )));
    }

    let iface_dir = sysfs_net.join(interface);
    if !iface_dir.exists() {
        return Err(CanError::Device(CanDeviceError::new(
            CanDeviceErrorKind::NotFound,
            format!(
                "CAN interface '{}' does not exist. Please create it first:\n  sudo ip link add dev {} type can",
                interface, interface
            ),
        )));
    }

    let raw = std::fs::read_to_string(iface_dir.join("flags"))?;
    let flags = parse_flags(&raw).ok_or_else(|| {
        CanError::Device(CanDeviceError::new(
            CanDeviceErrorKind::Backend,
            format!("Unexpected flags for '{}': {:?}", interface, raw.trim()),
        ))
    })?;
    let is_up = flags & IFF_UP != 0;

    trace!(
        "Interface '{}' status: {}",
        interface,
        if is_up { "UP" } else { "DOWN" }
    );
    Ok(is_up)
}

/// 解析 sysfs flags（形如 `0x1003`）
fn parse_flags(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    let hex = raw.strip_prefix("0x").unwrap_or(raw);
    u32::from_str_radix(hex, 16).ok()
}
