//! 总线服务循环阶段
//!
//! `Idle → Polling → Idle → CheckSchedule → {Transmitting → Idle | Idle}`，
//! 启动失败进入终止态 `Halted`，不可恢复。

use std::sync::atomic::{AtomicU8, Ordering};

/// 总线服务循环阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum BusPhase {
    /// 空闲（默认）
    #[default]
    Idle = 0,
    /// 轮询接收
    Polling = 1,
    /// 检查发送周期
    CheckSchedule = 2,
    /// 正在发送本角色拥有的变量
    Transmitting = 3,
    /// 终止态（总线启动失败或 IO 线程异常退出）
    Halted = 4,
}

impl BusPhase {
    /// 从 u8 转换
    ///
    /// 如果值无效，返回 Idle。
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Polling,
            2 => Self::CheckSchedule,
            3 => Self::Transmitting,
            4 => Self::Halted,
            _ => Self::Idle,
        }
    }

    /// 转换为 u8
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// 是否为终止态
    pub fn is_halted(self) -> bool {
        self == Self::Halted
    }
}

/// 循环阶段（原子版本，用于线程间共享）
///
/// IO 线程写入，应用线程读取，用于诊断。
///
/// ```rust
/// use baja_driver::{AtomicBusPhase, BusPhase};
/// use std::sync::atomic::Ordering;
///
/// let phase = AtomicBusPhase::new(BusPhase::Idle);
/// phase.set(BusPhase::Polling, Ordering::Relaxed);
/// assert_eq!(phase.get(Ordering::Relaxed), BusPhase::Polling);
/// ```
#[derive(Debug)]
pub struct AtomicBusPhase {
    inner: AtomicU8,
}

impl AtomicBusPhase {
    pub fn new(phase: BusPhase) -> Self {
        Self {
            inner: AtomicU8::new(phase.as_u8()),
        }
    }

    pub fn get(&self, ordering: Ordering) -> BusPhase {
        BusPhase::from_u8(self.inner.load(ordering))
    }

    /// 设置阶段
    ///
    /// `Halted` 是终止态：一旦进入，后续写入被忽略。
    pub fn set(&self, phase: BusPhase, ordering: Ordering) {
        let _ = self
            .inner
            .fetch_update(ordering, Ordering::Relaxed, |current| {
                if current == BusPhase::Halted.as_u8() {
                    None
                } else {
                    Some(phase.as_u8())
                }
            });
    }

    /// 进入终止态
    pub fn halt(&self) {
        self.inner.store(BusPhase::Halted.as_u8(), Ordering::Release);
    }
}

impl Default for AtomicBusPhase {
    fn default() -> Self {
        Self::new(BusPhase::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8() {
        for phase in [
            BusPhase::Idle,
            BusPhase::Polling,
            BusPhase::CheckSchedule,
            BusPhase::Transmitting,
            BusPhase::Halted,
        ] {
            assert_eq!(BusPhase::from_u8(phase.as_u8()), phase);
        }
        assert_eq!(BusPhase::from_u8(255), BusPhase::Idle); // 无效值
    }

    #[test]
    fn test_halted_is_terminal() {
        let phase = AtomicBusPhase::default();
        phase.set(BusPhase::Transmitting, Ordering::Relaxed);
        assert_eq!(phase.get(Ordering::Relaxed), BusPhase::Transmitting);

        phase.halt();
        phase.set(BusPhase::Idle, Ordering::Relaxed);
        assert!(phase.get(Ordering::Acquire).is_halted());
    }
}
