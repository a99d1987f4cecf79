//! 变量取值模型
//!
//! 总线上的每个变量都是一个强类型 [`Value`]，具体的字节布局由各自的 codec 决定。

use std::fmt;

/// 定点数（精确表示，无浮点往返误差）
///
/// 实际值 = `mantissa / 10^decimals`
///
/// ```rust
/// use baja_protocol::FixedPoint;
///
/// let voltage = FixedPoint::new(1256, 2); // 12.56
/// assert_eq!(voltage.to_f64(), 12.56);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FixedPoint {
    /// 缩放后的整数值
    pub mantissa: i32,
    /// 小数位数
    pub decimals: u8,
}

impl FixedPoint {
    pub const fn new(mantissa: i32, decimals: u8) -> Self {
        Self { mantissa, decimals }
    }

    /// 转换为浮点数（仅用于显示/业务计算，不用于编码）
    pub fn to_f64(self) -> f64 {
        self.mantissa as f64 / 10f64.powi(self.decimals as i32)
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.*}", self.decimals as usize, self.to_f64())
    }
}

/// 变量语义类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Integer,
    Fixed,
    Enum,
    Flag,
}

/// 共享变量的取值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// 有符号整数（RPM、温度等）
    Integer(i64),
    /// 定点数（电压、轮速等）
    Fixed(FixedPoint),
    /// 枚举判别值
    Enum(u8),
    /// 开关量
    Flag(bool),
}

impl Value {
    /// 取值对应的语义类型
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Integer(_) => ValueKind::Integer,
            Value::Fixed(_) => ValueKind::Fixed,
            Value::Enum(_) => ValueKind::Enum,
            Value::Flag(_) => ValueKind::Flag,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match *self {
            Value::Integer(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_fixed(&self) -> Option<FixedPoint> {
        match *self {
            Value::Fixed(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<u8> {
        match *self {
            Value::Enum(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match *self {
            Value::Flag(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::Fixed(v) => write!(f, "{}", v),
            Value::Enum(v) => write!(f, "#{}", v),
            Value::Flag(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<FixedPoint> for Value {
    fn from(value: FixedPoint) -> Self {
        Value::Fixed(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Flag(value)
    }
}
