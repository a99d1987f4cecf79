//! 子系统角色与发送所有权
//!
//! 每个节点启动时声明自己扮演的子系统（[`Subsystem`]），
//! 所有权表（[`OwnershipTable`]）决定该角色负责周期发送哪些 ID。
//! 同一个 ID 最多只能属于一个角色，避免多个节点同时写总线。

use crate::ProtocolError;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 子系统角色（封闭集合）
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, TryFromPrimitive, IntoPrimitive,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[repr(u8)]
pub enum Subsystem {
    /// 无级变速器
    Cvt = 0,
    /// 仪表盘
    Dashboard = 1,
    /// 数据采集系统
    Das = 2,
    /// 轮速传感
    WheelSpeed = 3,
    /// 踏板
    Pedals = 4,
    /// 悬架
    Suspension = 5,
    /// 电源
    Power = 6,
    /// 燃油
    Fuel = 7,
    /// 基站（被动监听）
    BaseStation = 8,
}

impl Subsystem {
    /// 全部角色（按判别值升序）
    pub const ALL: [Subsystem; 9] = [
        Subsystem::Cvt,
        Subsystem::Dashboard,
        Subsystem::Das,
        Subsystem::WheelSpeed,
        Subsystem::Pedals,
        Subsystem::Suspension,
        Subsystem::Power,
        Subsystem::Fuel,
        Subsystem::BaseStation,
    ];

    /// snake_case 名称（与配置文件一致）
    pub fn as_str(self) -> &'static str {
        match self {
            Subsystem::Cvt => "cvt",
            Subsystem::Dashboard => "dashboard",
            Subsystem::Das => "das",
            Subsystem::WheelSpeed => "wheel_speed",
            Subsystem::Pedals => "pedals",
            Subsystem::Suspension => "suspension",
            Subsystem::Power => "power",
            Subsystem::Fuel => "fuel",
            Subsystem::BaseStation => "base_station",
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subsystem {
    type Err = ProtocolError;

    /// 接受 snake_case / kebab-case，大小写不敏感
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Subsystem::ALL
            .into_iter()
            .find(|role| role.as_str() == normalized)
            .ok_or_else(|| ProtocolError::UnknownSubsystem(s.to_string()))
    }
}

/// 单个角色拥有的有序 ID 列表
pub type OwnedIds = SmallVec<[u32; 8]>;

/// 所有权表：角色 → 有序 ID 列表
///
/// 构造期即保证不变量：任意 ID 至多属于一个角色。
///
/// ```rust
/// use baja_protocol::{OwnershipTable, Subsystem};
///
/// let mut table = OwnershipTable::new();
/// table.assign(Subsystem::Cvt, &[1, 2]).unwrap();
/// table.assign(Subsystem::Dashboard, &[3]).unwrap();
/// assert_eq!(table.owned_by(Subsystem::Cvt), &[1, 2]);
/// assert!(table.assign(Subsystem::Fuel, &[2]).is_err());
/// ```
#[derive(Debug, Default, Clone)]
pub struct OwnershipTable {
    by_role: BTreeMap<Subsystem, OwnedIds>,
    owners: BTreeMap<u32, Subsystem>,
}

impl OwnershipTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为角色追加 ID（保持声明顺序）
    ///
    /// 失败时表保持不变。
    ///
    /// # 错误
    /// - `ProtocolError::ConflictingOwnership`: ID 已属于其他角色，或在本角色中重复声明
    pub fn assign(&mut self, role: Subsystem, ids: &[u32]) -> Result<(), ProtocolError> {
        for (i, &id) in ids.iter().enumerate() {
            if let Some(&owner) = self.owners.get(&id) {
                return Err(ProtocolError::ConflictingOwnership {
                    id,
                    owner,
                    claimant: role,
                });
            }
            if ids[..i].contains(&id) {
                return Err(ProtocolError::ConflictingOwnership {
                    id,
                    owner: role,
                    claimant: role,
                });
            }
        }

        let owned = self.by_role.entry(role).or_default();
        for &id in ids {
            owned.push(id);
            self.owners.insert(id, role);
        }
        Ok(())
    }

    /// 角色负责发送的 ID（声明顺序）；被动角色返回空切片
    pub fn owned_by(&self, role: Subsystem) -> &[u32] {
        self.by_role.get(&role).map(|ids| ids.as_slice()).unwrap_or(&[])
    }

    /// ID 的发送者
    pub fn owner_of(&self, id: u32) -> Option<Subsystem> {
        self.owners.get(&id).copied()
    }

    /// 遍历所有 (角色, ID 列表)
    pub fn iter(&self) -> impl Iterator<Item = (Subsystem, &[u32])> {
        self.by_role.iter().map(|(role, ids)| (*role, ids.as_slice()))
    }
}
