//! # Baja Protocol
//!
//! 整车 CAN 总线共享协议定义（无硬件依赖）
//!
//! 每个子系统节点都链接同一份协议层，保证同一个 CAN ID 在所有节点上
//! 对应同一个变量、同一种编码、同一个单位。
//!
//! ## 模块
//!
//! - `ids`: CAN ID 常量定义（版本化的标识符表）
//! - `value`: 变量取值模型
//! - `codec`: 负载编码/解码
//! - `registry`: 编解码注册表（ID → 变量描述）
//! - `role`: 子系统角色与发送所有权
//! - `schema`: 注册表 + 所有权的整体校验

pub mod codec;
pub mod ids;
pub mod registry;
pub mod role;
pub mod schema;
pub mod value;

// 重新导出常用类型
pub use codec::{
    Codec, CodecError, EnumCodec, FixedPointCodec, FlagCodec, IntCodec, Payload, TextIntCodec,
};
pub use registry::{CodecRegistry, VariableDescriptor};
pub use role::{OwnershipTable, Subsystem};
pub use schema::{SCHEMA_VERSION, Schema};
pub use value::{FixedPoint, Value, ValueKind};

/// CAN 2.0 标准帧的统一抽象
///
/// 协议层与总线层之间的中间类型：协议层只产生/消费 `BajaFrame`，
/// 具体的 SocketCAN 或测试总线在 `baja-can` 中完成转换。
///
/// # 设计特性
///
/// - **Copy trait**：零成本复制
/// - **固定 8 字节**：避免堆分配
///
/// ```rust
/// use baja_protocol::BajaFrame;
///
/// let frame = BajaFrame::new_standard(0x01, b"1234");
/// assert_eq!(frame.id(), 0x01);
/// assert_eq!(frame.data_slice(), b"1234");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BajaFrame {
    /// CAN ID（标准帧或扩展帧）
    pub id: u32,

    /// 帧数据（固定 8 字节，未使用部分为 0）
    pub data: [u8; 8],

    /// 有效数据长度 (0-8)
    pub len: u8,

    /// 是否为扩展帧（29-bit ID）
    pub is_extended: bool,
}

impl BajaFrame {
    /// 创建标准帧
    pub fn new_standard(id: u16, data: &[u8]) -> Self {
        Self::new(id as u32, data, false)
    }

    /// 创建扩展帧
    pub fn new_extended(id: u32, data: &[u8]) -> Self {
        Self::new(id, data, true)
    }

    /// 按 ID 大小自动选择标准帧/扩展帧
    pub fn for_id(id: u32, data: &[u8]) -> Self {
        Self::new(id, data, id > ids::MAX_STANDARD_ID)
    }

    fn new(id: u32, data: &[u8], is_extended: bool) -> Self {
        let mut fixed_data = [0u8; 8];
        let len = data.len().min(8);
        fixed_data[..len].copy_from_slice(&data[..len]);

        Self {
            id,
            data: fixed_data,
            len: len as u8,
            is_extended,
        }
    }

    /// 获取数据切片（只包含有效数据）
    pub fn data_slice(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// 获取 CAN ID
    pub fn id(&self) -> u32 {
        self.id
    }
}

use thiserror::Error;

/// 协议/注册期错误类型
///
/// 这些错误都发生在启动注册阶段；任何一个出现都意味着节点不能进入运行状态。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Identifier 0x{id:X} is already registered")]
    DuplicateIdentifier { id: u32 },

    #[error("Identifier 0x{id:X} claimed by {claimant} is already owned by {owner}")]
    ConflictingOwnership {
        id: u32,
        owner: Subsystem,
        claimant: Subsystem,
    },

    #[error("Identifier 0x{id:X} owned by {role} has no registered descriptor")]
    UnregisteredIdentifier { id: u32, role: Subsystem },

    #[error("Default value of 0x{id:X} is {actual:?}, codec expects {expected:?}")]
    InvalidDefault {
        id: u32,
        expected: ValueKind,
        actual: ValueKind,
    },

    #[error("Default value of 0x{id:X} cannot be encoded: {source}")]
    UnencodableDefault {
        id: u32,
        #[source]
        source: CodecError,
    },

    #[error("Identifier 0x{id:X} does not fit in a 29-bit CAN ID")]
    InvalidCanId { id: u32 },

    #[error("Unknown subsystem: {0}")]
    UnknownSubsystem(String),
}
