//! 发送周期时钟
//!
//! 底层计数器会回绕（如 32 位毫秒计数器约 49.7 天回绕一次），
//! 所以经过时间统一按 `(now - last) mod range` 计算。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// 32 位毫秒计数器的取值范围
pub const MILLIS_RANGE: u64 = 1 << 32;

/// 回绕安全的经过时间
///
/// `now` 和 `last` 都是取值范围为 `[0, range)` 的计数值；
/// `range == 0` 表示计数器占满整个 `u64`。
///
/// ```rust
/// use baja_driver::clock::elapsed_ticks;
///
/// // 计数器从 2^32 - 10 回绕到 5，实际经过 15
/// assert_eq!(elapsed_ticks(5, (1 << 32) - 10, 1 << 32), 15);
/// ```
pub fn elapsed_ticks(now: u64, last: u64, range: u64) -> u64 {
    if range == 0 {
        return now.wrapping_sub(last);
    }
    let range = range as u128;
    let now = now as u128 % range;
    let last = last as u128 % range;
    ((now + range - last) % range) as u64
}

/// 时间源
pub trait TimeSource: Send {
    /// 当前计数值，位于 `[0, range())`
    fn now(&self) -> u64;

    /// 计数器取值范围（`0` 表示整个 `u64`）
    fn range(&self) -> u64;
}

/// 回绕的毫秒计数器（与微控制器的毫秒 tick 行为一致）
#[derive(Debug, Clone)]
pub struct MillisClock {
    start: Instant,
}

impl MillisClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MillisClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MillisClock {
    fn now(&self) -> u64 {
        (self.start.elapsed().as_millis() % MILLIS_RANGE as u128) as u64
    }

    fn range(&self) -> u64 {
        MILLIS_RANGE
    }
}

/// 手动时钟（测试用，可跨线程共享）
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
    range: u64,
}

impl ManualClock {
    /// 创建取值范围为 `range` 的手动时钟，初始值为 `start`
    pub fn new(start: u64, range: u64) -> Self {
        let clock = Self {
            now: Arc::new(AtomicU64::new(0)),
            range,
        };
        clock.set(start);
        clock
    }

    /// 与毫秒计数器同范围的手动时钟
    pub fn millis(start: u64) -> Self {
        Self::new(start, MILLIS_RANGE)
    }

    pub fn set(&self, now: u64) {
        let now = if self.range == 0 {
            now
        } else {
            now % self.range
        };
        self.now.store(now, Ordering::Release);
    }

    /// 前进 `ticks`（按范围回绕）
    pub fn advance(&self, ticks: u64) {
        let current = self.now.load(Ordering::Acquire);
        let next = if self.range == 0 {
            current.wrapping_add(ticks)
        } else {
            ((current as u128 + ticks as u128) % self.range as u128) as u64
        };
        self.now.store(next, Ordering::Release);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::Acquire)
    }

    fn range(&self) -> u64 {
        self.range
    }
}

/// 发送周期判定
///
/// 首次调用即到期；之后当经过时间 ≥ `interval` 时到期，并把 `now` 记为上次发送时间。
#[derive(Debug, Clone)]
pub struct ScheduleClock {
    interval: u64,
    range: u64,
    last_send: Option<u64>,
}

impl ScheduleClock {
    pub fn new(interval: u64, range: u64) -> Self {
        Self {
            interval,
            range,
            last_send: None,
        }
    }

    /// 使用时间源的取值范围
    pub fn for_source(interval: u64, source: &impl TimeSource) -> Self {
        Self::new(interval, source.range())
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn last_send(&self) -> Option<u64> {
        self.last_send
    }

    /// 本次是否应当发送
    pub fn poll_due(&mut self, now: u64) -> bool {
        let due = match self.last_send {
            None => true,
            Some(last) => elapsed_ticks(now, last, self.range) >= self.interval,
        };
        if due {
            self.last_send = Some(now);
        }
        due
    }
}
