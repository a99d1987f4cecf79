//! CAN ID 常量定义
//!
//! 全车共享的标识符表。修改此表是跨节点的破坏性变更，
//! 必须整车所有节点同时升级（见 [`SCHEMA_VERSION`](crate::SCHEMA_VERSION)）。
//!
//! ID 按子系统分段，每段 16 个：
//!
//! | 段 | 子系统 |
//! |----|--------|
//! | `0x01..=0x0F` | CVT |
//! | `0x10..=0x1F` | 轮速 |
//! | `0x20..=0x2F` | 踏板 |
//! | `0x30..=0x3F` | 悬架 |
//! | `0x40..=0x4F` | 电源 |
//! | `0x50..=0x5F` | 燃油 |
//! | `0x60..=0x6F` | 数据采集 |

/// 11-bit 标准帧最大 ID
pub const MAX_STANDARD_ID: u32 = 0x7FF;

/// 29-bit 扩展帧最大 ID
pub const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;

// ============================================================================
// CVT（旧版文本布局）
// ============================================================================

/// 主动轮转速
pub const ID_PRIMARY_RPM: u32 = 0x01;
/// 从动轮转速
pub const ID_SECONDARY_RPM: u32 = 0x02;
/// CVT 温度
pub const ID_CVT_TEMPERATURE: u32 = 0x03;

// ============================================================================
// 轮速
// ============================================================================

pub const ID_WHEEL_SPEED_FL: u32 = 0x10;
pub const ID_WHEEL_SPEED_FR: u32 = 0x11;
pub const ID_WHEEL_SPEED_RL: u32 = 0x12;
pub const ID_WHEEL_SPEED_RR: u32 = 0x13;

// ============================================================================
// 踏板
// ============================================================================

/// 油门开度
pub const ID_THROTTLE_POSITION: u32 = 0x20;
/// 制动压力
pub const ID_BRAKE_PRESSURE: u32 = 0x21;
/// 制动灯开关
pub const ID_BRAKE_SWITCH: u32 = 0x22;

// ============================================================================
// 悬架
// ============================================================================

pub const ID_SHOCK_TRAVEL_FL: u32 = 0x30;
pub const ID_SHOCK_TRAVEL_FR: u32 = 0x31;
pub const ID_SHOCK_TRAVEL_RL: u32 = 0x32;
pub const ID_SHOCK_TRAVEL_RR: u32 = 0x33;

// ============================================================================
// 电源
// ============================================================================

/// 电池电压
pub const ID_BATTERY_VOLTAGE: u32 = 0x40;
/// 低压告警
pub const ID_LOW_VOLTAGE_WARNING: u32 = 0x41;

// ============================================================================
// 燃油
// ============================================================================

/// 油位
pub const ID_FUEL_LEVEL: u32 = 0x50;

// ============================================================================
// 数据采集
// ============================================================================

/// 记录状态
pub const ID_DAS_LOGGING_STATE: u32 = 0x60;
/// 已记录圈数
pub const ID_DAS_LAP_COUNT: u32 = 0x61;
