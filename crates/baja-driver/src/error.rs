//! 驱动层错误类型定义

use baja_can::CanError;
use baja_protocol::{CodecError, ProtocolError, ValueKind};
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// CAN 驱动错误
    #[error("CAN driver error: {0}")]
    Can(#[from] CanError),

    /// 协议注册错误（重复 ID、所有权冲突等）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 负载编解码错误
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// 总线启动失败（致命，节点进入 Halted）
    #[error("Failed to bring up CAN bus on '{interface}': {source}")]
    BusInit {
        interface: String,
        #[source]
        source: CanError,
    },

    /// 标识符未注册
    #[error("Unknown identifier 0x{id:X}")]
    UnknownIdentifier { id: u32 },

    /// 写入值的类型与注册的 codec 不一致
    #[error("Identifier 0x{id:X} expects {expected:?}, got {actual:?}")]
    TypeMismatch {
        id: u32,
        expected: ValueKind,
        actual: ValueKind,
    },

    /// 配置错误
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO 线程错误
    #[error("IO thread error: {0}")]
    IoThread(String),
}

impl DriverError {
    /// 是否为启动期致命错误
    pub fn is_bus_init(&self) -> bool {
        matches!(self, DriverError::BusInit { .. })
    }
}
