//! # Baja CAN Adapter Layer
//!
//! 总线能力抽象层：节点只依赖两个原语
//!
//! - `send(frame)`：发送即忘（fire-and-forget），不等待确认
//! - `try_receive()`：非阻塞轮询，没有帧时立即返回 `None`
//!
//! 物理层配置（引脚、电平、位时序）不在本层处理。

use thiserror::Error;

// 重新导出 baja-protocol 中的 BajaFrame
pub use baja_protocol::BajaFrame;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub mod socketcan;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub use socketcan::SocketCanAdapter;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockCanAdapter, MockHandle, VirtualBus, VirtualBusAdapter};

/// CAN 适配层统一错误类型
#[derive(Error, Debug)]
pub enum CanError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] CanDeviceError),
    #[error("Bus off")]
    BusOff,
    #[error("Device not started")]
    NotStarted,
}

/// 设备/后端错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanDeviceErrorKind {
    Unknown,
    NotFound,
    AccessDenied,
    Busy,
    UnsupportedConfig,
    InvalidFrame,
    Backend,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct CanDeviceError {
    pub kind: CanDeviceErrorKind,
    pub message: String,
}

impl CanDeviceError {
    pub fn new(kind: CanDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// 设备已不可用（拔出、无权限、不存在）
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            CanDeviceErrorKind::AccessDenied | CanDeviceErrorKind::NotFound
        )
    }
}

impl From<String> for CanDeviceError {
    fn from(message: String) -> Self {
        Self::new(CanDeviceErrorKind::Unknown, message)
    }
}

impl From<&str> for CanDeviceError {
    fn from(message: &str) -> Self {
        Self::new(CanDeviceErrorKind::Unknown, message)
    }
}

/// 总线能力 Trait
///
/// 总线服务循环独占一个适配器实例（`&mut self`），因此实现无需内部同步。
pub trait CanAdapter {
    /// 发送一帧（发送即忘）
    fn send(&mut self, frame: BajaFrame) -> Result<(), CanError>;

    /// 非阻塞接收：有帧返回 `Some`，无帧立即返回 `None`
    fn try_receive(&mut self) -> Result<Option<BajaFrame>, CanError>;
}

impl<T: CanAdapter + ?Sized> CanAdapter for Box<T> {
    fn send(&mut self, frame: BajaFrame) -> Result<(), CanError> {
        (**self).send(frame)
    }

    fn try_receive(&mut self) -> Result<Option<BajaFrame>, CanError> {
        (**self).try_receive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_fatality() {
        assert!(CanDeviceError::new(CanDeviceErrorKind::NotFound, "can9").is_fatal());
        assert!(!CanDeviceError::new(CanDeviceErrorKind::Busy, "tx queue").is_fatal());
    }

    #[test]
    fn test_can_error_display() {
        let err = CanError::Device("interface down".into());
        assert_eq!(format!("{}", err), "Device Error: Unknown: interface down");
        assert_eq!(format!("{}", CanError::BusOff), "Bus off");
    }
}
