//! 总线性能指标模块
//!
//! 提供零开销的原子计数器，用于监控总线服务循环的健康状态。
//! 所有计数器都使用原子操作，可以在任何线程安全地读取，不会引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 总线实时指标
///
/// # 使用示例
///
/// ```rust
/// use baja_driver::BusMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = BusMetrics::new();
/// metrics.rx_frames_total.fetch_add(1, Ordering::Relaxed);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.rx_frames_total, 1);
/// ```
#[derive(Debug, Default)]
pub struct BusMetrics {
    /// RX 接收的总帧数
    pub rx_frames_total: AtomicU64,

    /// RX 成功解码并写入共享状态表的帧数
    pub rx_stored: AtomicU64,

    /// RX 未注册 ID 的帧数（混合版本车队中属正常现象）
    pub rx_unknown_ids: AtomicU64,

    /// RX 负载解码失败的帧数
    pub rx_decode_failures: AtomicU64,

    /// TX 发送成功的总帧数
    pub tx_frames_total: AtomicU64,

    /// TX 失败次数（编码失败或发送失败）
    pub tx_failures: AtomicU64,

    /// 发送调度触发次数
    pub tx_cycles: AtomicU64,

    /// 适配器接收错误次数
    pub device_errors: AtomicU64,
}

impl BusMetrics {
    /// 创建新的指标实例（所有计数器初始化为 0）
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指标快照
    ///
    /// 不同计数器之间可能有微小的时间差。
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rx_frames_total: self.rx_frames_total.load(Ordering::Relaxed),
            rx_stored: self.rx_stored.load(Ordering::Relaxed),
            rx_unknown_ids: self.rx_unknown_ids.load(Ordering::Relaxed),
            rx_decode_failures: self.rx_decode_failures.load(Ordering::Relaxed),
            tx_frames_total: self.tx_frames_total.load(Ordering::Relaxed),
            tx_failures: self.tx_failures.load(Ordering::Relaxed),
            tx_cycles: self.tx_cycles.load(Ordering::Relaxed),
            device_errors: self.device_errors.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        self.rx_frames_total.store(0, Ordering::Relaxed);
        self.rx_stored.store(0, Ordering::Relaxed);
        self.rx_unknown_ids.store(0, Ordering::Relaxed);
        self.rx_decode_failures.store(0, Ordering::Relaxed);
        self.tx_frames_total.store(0, Ordering::Relaxed);
        self.tx_failures.store(0, Ordering::Relaxed);
        self.tx_cycles.store(0, Ordering::Relaxed);
        self.device_errors.store(0, Ordering::Relaxed);
    }
}

/// 指标快照（不可变，用于读取）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub rx_frames_total: u64,
    pub rx_stored: u64,
    pub rx_unknown_ids: u64,
    pub rx_decode_failures: u64,
    pub tx_frames_total: u64,
    pub tx_failures: u64,
    pub tx_cycles: u64,
    pub device_errors: u64,
}

impl MetricsSnapshot {
    /// 解码失败率（百分比）
    ///
    /// 返回 0.0 到 100.0 之间的值。如果 `rx_frames_total` 为 0，返回 0.0。
    pub fn decode_failure_rate(&self) -> f64 {
        if self.rx_frames_total == 0 {
            return 0.0;
        }
        (self.rx_decode_failures as f64 / self.rx_frames_total as f64) * 100.0
    }
}
