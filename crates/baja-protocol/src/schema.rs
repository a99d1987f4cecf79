//! 整车协议模式
//!
//! [`Schema`] 把编解码注册表和所有权表绑在一起，并在构造时校验：
//! 所有权表中的每个 ID 都必须有且仅有一个变量描述。

use crate::ProtocolError;
use crate::codec::{EnumCodec, FixedPointCodec, FlagCodec, IntCodec, TextIntCodec};
use crate::ids::*;
use crate::registry::{CodecRegistry, VariableDescriptor};
use crate::role::{OwnershipTable, Subsystem};
use crate::value::{FixedPoint, Value};

/// 标识符表版本
///
/// 任何 ID、布局或单位变化都必须递增，并整车同步部署。
pub const SCHEMA_VERSION: u16 = 1;

/// 数据采集记录状态
pub const DAS_LOGGING_STATES: &[&str] = &["idle", "logging", "card_full", "fault"];

/// 已校验的协议模式
#[derive(Debug, Clone)]
pub struct Schema {
    registry: CodecRegistry,
    ownership: OwnershipTable,
}

impl Schema {
    /// 组合并校验
    ///
    /// # 错误
    /// - `ProtocolError::UnregisteredIdentifier`: 某角色拥有未注册的 ID
    pub fn new(registry: CodecRegistry, ownership: OwnershipTable) -> Result<Self, ProtocolError> {
        for (role, ids) in ownership.iter() {
            if let Some(&id) = ids.iter().find(|id| !registry.contains(**id)) {
                return Err(ProtocolError::UnregisteredIdentifier { id, role });
            }
        }
        Ok(Self {
            registry,
            ownership,
        })
    }

    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    pub fn ownership(&self) -> &OwnershipTable {
        &self.ownership
    }

    /// 整车标识符表（版本 [`SCHEMA_VERSION`]）
    ///
    /// 仪表盘与基站为被动节点，只接收不发送。
    pub fn fleet() -> Result<Self, ProtocolError> {
        let mut registry = CodecRegistry::new();
        let zero_mm = Value::Fixed(FixedPoint::new(0, 1));
        let zero_kph = Value::Fixed(FixedPoint::new(0, 1));

        #[rustfmt::skip]
        let descriptors = [
            // CVT：沿用文本布局，与旧节点互通
            VariableDescriptor::new(ID_PRIMARY_RPM, "primary_rpm", "rpm", TextIntCodec, Value::Integer(0)),
            VariableDescriptor::new(ID_SECONDARY_RPM, "secondary_rpm", "rpm", TextIntCodec, Value::Integer(0)),
            VariableDescriptor::new(ID_CVT_TEMPERATURE, "cvt_temperature", "degC", TextIntCodec, Value::Integer(0)),
            VariableDescriptor::new(ID_WHEEL_SPEED_FL, "wheel_speed_fl", "km/h", FixedPointCodec::i16(1), zero_kph),
            VariableDescriptor::new(ID_WHEEL_SPEED_FR, "wheel_speed_fr", "km/h", FixedPointCodec::i16(1), zero_kph),
            VariableDescriptor::new(ID_WHEEL_SPEED_RL, "wheel_speed_rl", "km/h", FixedPointCodec::i16(1), zero_kph),
            VariableDescriptor::new(ID_WHEEL_SPEED_RR, "wheel_speed_rr", "km/h", FixedPointCodec::i16(1), zero_kph),
            VariableDescriptor::new(ID_THROTTLE_POSITION, "throttle_position", "%", IntCodec::i8(), Value::Integer(0)),
            VariableDescriptor::new(ID_BRAKE_PRESSURE, "brake_pressure", "kPa", IntCodec::i16(), Value::Integer(0)),
            VariableDescriptor::new(ID_BRAKE_SWITCH, "brake_switch", "", FlagCodec, Value::Flag(false)),
            VariableDescriptor::new(ID_SHOCK_TRAVEL_FL, "shock_travel_fl", "mm", FixedPointCodec::i16(1), zero_mm),
            VariableDescriptor::new(ID_SHOCK_TRAVEL_FR, "shock_travel_fr", "mm", FixedPointCodec::i16(1), zero_mm),
            VariableDescriptor::new(ID_SHOCK_TRAVEL_RL, "shock_travel_rl", "mm", FixedPointCodec::i16(1), zero_mm),
            VariableDescriptor::new(ID_SHOCK_TRAVEL_RR, "shock_travel_rr", "mm", FixedPointCodec::i16(1), zero_mm),
            VariableDescriptor::new(ID_BATTERY_VOLTAGE, "battery_voltage", "V", FixedPointCodec::i16(2), Value::Fixed(FixedPoint::new(0, 2))),
            VariableDescriptor::new(ID_LOW_VOLTAGE_WARNING, "low_voltage_warning", "", FlagCodec, Value::Flag(false)),
            VariableDescriptor::new(ID_FUEL_LEVEL, "fuel_level", "%", IntCodec::i8(), Value::Integer(0)),
            VariableDescriptor::new(ID_DAS_LOGGING_STATE, "das_logging_state", "", EnumCodec::new(DAS_LOGGING_STATES), Value::Enum(0)),
            VariableDescriptor::new(ID_DAS_LAP_COUNT, "das_lap_count", "laps", IntCodec::i16(), Value::Integer(0)),
        ];
        for descriptor in descriptors {
            registry.register(descriptor)?;
        }

        let mut ownership = OwnershipTable::new();
        ownership.assign(
            Subsystem::Cvt,
            &[ID_PRIMARY_RPM, ID_SECONDARY_RPM, ID_CVT_TEMPERATURE],
        )?;
        ownership.assign(
            Subsystem::WheelSpeed,
            &[
                ID_WHEEL_SPEED_FL,
                ID_WHEEL_SPEED_FR,
                ID_WHEEL_SPEED_RL,
                ID_WHEEL_SPEED_RR,
            ],
        )?;
        ownership.assign(
            Subsystem::Pedals,
            &[ID_THROTTLE_POSITION, ID_BRAKE_PRESSURE, ID_BRAKE_SWITCH],
        )?;
        ownership.assign(
            Subsystem::Suspension,
            &[
                ID_SHOCK_TRAVEL_FL,
                ID_SHOCK_TRAVEL_FR,
                ID_SHOCK_TRAVEL_RL,
                ID_SHOCK_TRAVEL_RR,
            ],
        )?;
        ownership.assign(
            Subsystem::Power,
            &[ID_BATTERY_VOLTAGE, ID_LOW_VOLTAGE_WARNING],
        )?;
        ownership.assign(Subsystem::Fuel, &[ID_FUEL_LEVEL])?;
        ownership.assign(Subsystem::Das, &[ID_DAS_LOGGING_STATE, ID_DAS_LAP_COUNT])?;

        Self::new(registry, ownership)
    }
}
