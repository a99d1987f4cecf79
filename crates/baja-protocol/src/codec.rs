//! 负载编解码
//!
//! 每个变量描述都携带自己的 codec，决定该变量在总线上的字节布局。
//! 所有 codec 必须满足往返律：`decode(encode(v)) == v`（对所有合法的 `v`）。
//!
//! # 内置布局
//!
//! | Codec | 布局 | 典型用途 |
//! |-------|------|----------|
//! | [`IntCodec`] | 大端有符号整数，1/2/4/8 字节 | 温度、计数 |
//! | [`TextIntCodec`] | ASCII 十进制文本（可带 `-`） | 旧版 CVT 帧（`print`/`parseInt`） |
//! | [`FixedPointCodec`] | 大端尾数 + 固定小数位 | 电压、轮速 |
//! | [`EnumCodec`] | 单字节判别值 | 模式、状态 |
//! | [`FlagCodec`] | 单字节 0/1 | 开关量 |

use crate::value::{FixedPoint, Value, ValueKind};
use smallvec::SmallVec;
use std::fmt;
use thiserror::Error;

/// 编码后的负载（CAN 2.0 最长 8 字节，栈上存储）
pub type Payload = SmallVec<[u8; 8]>;

/// CAN 2.0 数据段最大长度
pub const MAX_PAYLOAD_LEN: usize = 8;

/// 编解码错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid payload length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Payload is not a decimal integer")]
    InvalidText,

    #[error("Value {value} is out of range for this codec")]
    OutOfRange { value: i64 },

    #[error("Value kind mismatch: expected {expected:?}, got {actual:?}")]
    KindMismatch {
        expected: ValueKind,
        actual: ValueKind,
    },

    #[error("Fixed-point value has {actual} decimals, codec expects {expected}")]
    DecimalsMismatch { expected: u8, actual: u8 },

    #[error("Unknown enum discriminant: {0}")]
    UnknownVariant(u8),

    #[error("Encoded payload of {0} bytes exceeds the 8-byte frame limit")]
    PayloadTooLong(usize),
}

/// 变量编解码 Trait
///
/// 实现必须是纯函数（无 I/O、无内部可变状态），因为接收分发器在总线速率下调用它。
pub trait Codec: Send + Sync + fmt::Debug {
    /// 该 codec 处理的语义类型
    fn kind(&self) -> ValueKind;

    /// 编码为总线负载
    fn encode(&self, value: &Value) -> Result<Payload, CodecError>;

    /// 从总线负载解码
    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError>;
}

fn kind_mismatch(expected: ValueKind, value: &Value) -> CodecError {
    CodecError::KindMismatch {
        expected,
        actual: value.kind(),
    }
}

fn check_len(bytes: &[u8], expected: usize) -> Result<(), CodecError> {
    if bytes.len() != expected {
        return Err(CodecError::InvalidLength {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

/// 有符号整数的取值范围
fn signed_range(width: usize) -> (i64, i64) {
    if width >= 8 {
        return (i64::MIN, i64::MAX);
    }
    let bits = (width * 8) as u32;
    (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1)
}

/// 大端写入低 `width` 字节
fn write_be(value: i64, width: usize) -> Payload {
    Payload::from_slice(&value.to_be_bytes()[8 - width..])
}

/// 大端读取并做符号扩展
fn read_be(bytes: &[u8]) -> i64 {
    let mut buf = if bytes.first().is_some_and(|b| b & 0x80 != 0) {
        [0xFF; 8]
    } else {
        [0x00; 8]
    };
    buf[8 - bytes.len()..].copy_from_slice(bytes);
    i64::from_be_bytes(buf)
}

/// 大端有符号整数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntCodec {
    width: usize,
}

impl IntCodec {
    pub const fn i8() -> Self {
        Self { width: 1 }
    }

    pub const fn i16() -> Self {
        Self { width: 2 }
    }

    pub const fn i32() -> Self {
        Self { width: 4 }
    }

    pub const fn i64() -> Self {
        Self { width: 8 }
    }

    /// 编码宽度（字节）
    pub fn width(&self) -> usize {
        self.width
    }
}

impl Codec for IntCodec {
    fn kind(&self) -> ValueKind {
        ValueKind::Integer
    }

    fn encode(&self, value: &Value) -> Result<Payload, CodecError> {
        let v = value.as_integer().ok_or_else(|| kind_mismatch(ValueKind::Integer, value))?;
        let (min, max) = signed_range(self.width);
        if v < min || v > max {
            return Err(CodecError::OutOfRange { value: v });
        }
        Ok(write_be(v, self.width))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        check_len(bytes, self.width)?;
        Ok(Value::Integer(read_be(bytes)))
    }
}

/// ASCII 十进制整数（旧版文本布局）
///
/// 负载为 `-?[0-9]+`，最长 8 个字符，因此可表示范围为 `-9_999_999..=99_999_999`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextIntCodec;

impl TextIntCodec {
    pub const MIN: i64 = -9_999_999;
    pub const MAX: i64 = 99_999_999;
}

impl Codec for TextIntCodec {
    fn kind(&self) -> ValueKind {
        ValueKind::Integer
    }

    fn encode(&self, value: &Value) -> Result<Payload, CodecError> {
        let v = value.as_integer().ok_or_else(|| kind_mismatch(ValueKind::Integer, value))?;
        if !(Self::MIN..=Self::MAX).contains(&v) {
            return Err(CodecError::OutOfRange { value: v });
        }
        Ok(Payload::from_slice(v.to_string().as_bytes()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        let digits = bytes.strip_prefix(b"-").unwrap_or(bytes);
        if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
            return Err(CodecError::InvalidText);
        }
        let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidText)?;
        text.parse::<i64>().map(Value::Integer).map_err(|_| CodecError::InvalidText)
    }
}

/// 定点数：大端尾数 + 固定小数位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPointCodec {
    width: usize,
    decimals: u8,
}

impl FixedPointCodec {
    /// 2 字节尾数
    pub const fn i16(decimals: u8) -> Self {
        Self { width: 2, decimals }
    }

    /// 4 字节尾数
    pub const fn i32(decimals: u8) -> Self {
        Self { width: 4, decimals }
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }
}

impl Codec for FixedPointCodec {
    fn kind(&self) -> ValueKind {
        ValueKind::Fixed
    }

    fn encode(&self, value: &Value) -> Result<Payload, CodecError> {
        let v = value.as_fixed().ok_or_else(|| kind_mismatch(ValueKind::Fixed, value))?;
        // 小数位不一致时拒绝，不做静默缩放
        if v.decimals != self.decimals {
            return Err(CodecError::DecimalsMismatch {
                expected: self.decimals,
                actual: v.decimals,
            });
        }
        let mantissa = v.mantissa as i64;
        let (min, max) = signed_range(self.width);
        if mantissa < min || mantissa > max {
            return Err(CodecError::OutOfRange { value: mantissa });
        }
        Ok(write_be(mantissa, self.width))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        check_len(bytes, self.width)?;
        Ok(Value::Fixed(FixedPoint::new(
            read_be(bytes) as i32,
            self.decimals,
        )))
    }
}

/// 单字节枚举
///
/// 判别值即 `variants` 中的下标。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumCodec {
    variants: &'static [&'static str],
}

impl EnumCodec {
    pub const fn new(variants: &'static [&'static str]) -> Self {
        Self { variants }
    }

    /// 判别值对应的名称
    pub fn name_of(&self, discriminant: u8) -> Option<&'static str> {
        self.variants.get(discriminant as usize).copied()
    }

    pub fn variants(&self) -> &'static [&'static str] {
        self.variants
    }
}

impl Codec for EnumCodec {
    fn kind(&self) -> ValueKind {
        ValueKind::Enum
    }

    fn encode(&self, value: &Value) -> Result<Payload, CodecError> {
        let d = value.as_enum().ok_or_else(|| kind_mismatch(ValueKind::Enum, value))?;
        if self.name_of(d).is_none() {
            return Err(CodecError::UnknownVariant(d));
        }
        Ok(Payload::from_slice(&[d]))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        check_len(bytes, 1)?;
        let d = bytes[0];
        if self.name_of(d).is_none() {
            return Err(CodecError::UnknownVariant(d));
        }
        Ok(Value::Enum(d))
    }
}

/// 单字节开关量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlagCodec;

impl Codec for FlagCodec {
    fn kind(&self) -> ValueKind {
        ValueKind::Flag
    }

    fn encode(&self, value: &Value) -> Result<Payload, CodecError> {
        let b = value.as_flag().ok_or_else(|| kind_mismatch(ValueKind::Flag, value))?;
        Ok(Payload::from_slice(&[b as u8]))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        check_len(bytes, 1)?;
        match bytes[0] {
            0 => Ok(Value::Flag(false)),
            1 => Ok(Value::Flag(true)),
            other => Err(CodecError::UnknownVariant(other)),
        }
    }
}
