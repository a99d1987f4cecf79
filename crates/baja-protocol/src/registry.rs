//! 编解码注册表
//!
//! 把 CAN ID 绑定到变量描述（名称、单位、codec、默认值）。
//! 只在启动注册阶段可变；放入 `Arc` 之后即为只读，运行期无需同步。

use crate::ProtocolError;
use crate::codec::{Codec, CodecError, MAX_PAYLOAD_LEN};
use crate::value::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// 变量描述（注册后不可变）
#[derive(Debug, Clone)]
pub struct VariableDescriptor {
    /// CAN ID（全车唯一，跨版本稳定）
    pub id: u32,
    /// 变量名
    pub name: &'static str,
    /// 物理单位（无单位时为空字符串）
    pub unit: &'static str,
    /// 负载编解码
    pub codec: Arc<dyn Codec>,
    /// 默认值（共享状态表的初始值）
    pub default: Value,
}

impl VariableDescriptor {
    pub fn new(
        id: u32,
        name: &'static str,
        unit: &'static str,
        codec: impl Codec + 'static,
        default: Value,
    ) -> Self {
        Self {
            id,
            name,
            unit,
            codec: Arc::new(codec),
            default,
        }
    }
}

/// 编解码注册表
///
/// # 示例
///
/// ```rust
/// use baja_protocol::{CodecRegistry, IntCodec, Value, VariableDescriptor};
///
/// let mut registry = CodecRegistry::new();
/// registry
///     .register(VariableDescriptor::new(1, "rpm", "rpm", IntCodec::i16(), Value::Integer(0)))
///     .unwrap();
/// assert!(registry.lookup(1).is_some());
/// assert!(registry.lookup(99).is_none());
/// ```
#[derive(Debug, Default, Clone)]
pub struct CodecRegistry {
    descriptors: BTreeMap<u32, VariableDescriptor>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册变量
    ///
    /// # 错误
    /// - `ProtocolError::DuplicateIdentifier`: ID 已注册
    /// - `ProtocolError::InvalidDefault`: 默认值类型与 codec 不一致
    /// - `ProtocolError::UnencodableDefault`: 默认值超出 codec 范围或超过 8 字节
    /// - `ProtocolError::InvalidCanId`: ID 超出 29-bit 范围
    pub fn register(&mut self, descriptor: VariableDescriptor) -> Result<(), ProtocolError> {
        let id = descriptor.id;
        if id > crate::ids::MAX_EXTENDED_ID {
            return Err(ProtocolError::InvalidCanId { id });
        }
        if self.descriptors.contains_key(&id) {
            return Err(ProtocolError::DuplicateIdentifier { id });
        }
        let expected = descriptor.codec.kind();
        if descriptor.default.kind() != expected {
            return Err(ProtocolError::InvalidDefault {
                id,
                expected,
                actual: descriptor.default.kind(),
            });
        }
        // 默认值会在第一个发送周期发出，必须可编码且装得进一帧
        match descriptor.codec.encode(&descriptor.default) {
            Ok(payload) if payload.len() > MAX_PAYLOAD_LEN => {
                return Err(ProtocolError::UnencodableDefault {
                    id,
                    source: CodecError::PayloadTooLong(payload.len()),
                });
            },
            Ok(_) => {},
            Err(source) => return Err(ProtocolError::UnencodableDefault { id, source }),
        }
        self.descriptors.insert(id, descriptor);
        Ok(())
    }

    /// 查找 codec
    pub fn lookup(&self, id: u32) -> Option<&Arc<dyn Codec>> {
        self.descriptors.get(&id).map(|d| &d.codec)
    }

    /// 查找完整描述
    pub fn descriptor(&self, id: u32) -> Option<&VariableDescriptor> {
        self.descriptors.get(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.descriptors.contains_key(&id)
    }

    /// 所有已注册 ID（升序）
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.descriptors.keys().copied()
    }

    /// 所有描述（按 ID 升序）
    pub fn descriptors(&self) -> impl Iterator<Item = &VariableDescriptor> {
        self.descriptors.values()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
