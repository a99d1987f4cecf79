//! 共享状态表
//!
//! 每个注册的 CAN ID 对应一个 `ArcSwap<Sample>`：
//! - IO 线程（接收分发器）和应用线程都可以写入
//! - 读取是 Wait-Free 的，不会看到写了一半的值
//! - 不同 ID 之间互相独立，没有全局锁
//!
//! 表的结构（有哪些 ID）在构造时确定，运行期不会增删条目。

use crate::error::DriverError;
use arc_swap::ArcSwap;
use baja_protocol::{Codec, CodecRegistry, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

/// 单调时钟锚点（首次访问时设置）
static APP_START: OnceLock<Instant> = OnceLock::new();

/// 自进程启动以来的单调微秒数（不受系统时间调整影响）
///
/// 最小返回 1，0 保留给"从未更新"。
pub fn monotonic_micros() -> u64 {
    let start = APP_START.get_or_init(Instant::now);
    (start.elapsed().as_micros() as u64).max(1)
}

/// 某个 ID 的当前值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// 当前值
    pub value: Value,
    /// 最后更新时间（单调微秒，0 表示仍为默认值）
    pub updated_at_us: u64,
    /// 写入序号（每次写入 +1，0 表示仍为默认值）
    pub sequence: u64,
}

impl Sample {
    fn initial(value: Value) -> Self {
        Self {
            value,
            updated_at_us: 0,
            sequence: 0,
        }
    }

    /// 是否仍为注册时的默认值
    pub fn is_default(&self) -> bool {
        self.sequence == 0
    }
}

struct Entry {
    codec: Arc<dyn Codec>,
    sample: ArcSwap<Sample>,
    fresh: AtomicBool,
}

impl Entry {
    fn write(&self, value: Value) {
        let now = monotonic_micros();
        self.sample.rcu(|old| {
            Arc::new(Sample {
                value,
                updated_at_us: now,
                sequence: old.sequence + 1,
            })
        });
        self.fresh.store(true, Ordering::Release);
    }
}

/// 共享状态表
///
/// # 示例
///
/// ```rust
/// use baja_driver::SharedStateTable;
/// use baja_protocol::{CodecRegistry, IntCodec, Value, VariableDescriptor};
///
/// let mut registry = CodecRegistry::new();
/// registry
///     .register(VariableDescriptor::new(1, "rpm", "rpm", IntCodec::i16(), Value::Integer(0)))
///     .unwrap();
///
/// let state = SharedStateTable::from_registry(&registry);
/// assert_eq!(state.get(1), Some(Value::Integer(0)));
///
/// state.set(1, Value::Integer(3150)).unwrap();
/// assert_eq!(state.get(1), Some(Value::Integer(3150)));
/// assert!(state.set(1, Value::Flag(true)).is_err());
/// ```
pub struct SharedStateTable {
    entries: BTreeMap<u32, Entry>,
}

impl SharedStateTable {
    /// 为每个注册的 ID 创建一个条目（初始为默认值）
    pub fn from_registry(registry: &CodecRegistry) -> Self {
        // 提前锚定时钟，让时间戳从表创建开始计
        APP_START.get_or_init(Instant::now);

        let entries = registry
            .descriptors()
            .map(|descriptor| {
                (
                    descriptor.id,
                    Entry {
                        codec: descriptor.codec.clone(),
                        sample: ArcSwap::from_pointee(Sample::initial(descriptor.default)),
                        fresh: AtomicBool::new(false),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// 当前值（未注册的 ID 返回 `None`）
    pub fn get(&self, id: u32) -> Option<Value> {
        self.entries.get(&id).map(|entry| entry.sample.load().value)
    }

    /// 当前值及其更新时间
    pub fn sample(&self, id: u32) -> Option<Arc<Sample>> {
        self.entries.get(&id).map(|entry| entry.sample.load_full())
    }

    /// 写入新值（应用线程产生本地权威值时调用）
    ///
    /// # 错误
    /// - `DriverError::UnknownIdentifier`: ID 未注册
    /// - `DriverError::TypeMismatch`: 值类型与 codec 不一致
    /// - `DriverError::Codec`: 值超出 codec 可表示范围
    pub fn set(&self, id: u32, value: Value) -> Result<(), DriverError> {
        let entry = self
            .entries
            .get(&id)
            .ok_or(DriverError::UnknownIdentifier { id })?;

        let expected = entry.codec.kind();
        if value.kind() != expected {
            return Err(DriverError::TypeMismatch {
                id,
                expected,
                actual: value.kind(),
            });
        }
        // 提前拒绝发送时必然失败的值
        entry.codec.encode(&value)?;

        entry.write(value);
        Ok(())
    }

    /// 接收路径写入（值由该 ID 的 codec 解码得到，无需再校验）
    pub(crate) fn store_decoded(&self, id: u32, value: Value) -> bool {
        match self.entries.get(&id) {
            Some(entry) => {
                entry.write(value);
                true
            },
            None => false,
        }
    }

    /// 自上次 `take_fresh` 以来是否有新写入
    pub fn is_fresh(&self, id: u32) -> bool {
        self.entries
            .get(&id)
            .is_some_and(|entry| entry.fresh.load(Ordering::Acquire))
    }

    /// 读取并清除新鲜标志
    ///
    /// 有新写入时返回 `Some(value)`，否则返回 `None`。
    pub fn take_fresh(&self, id: u32) -> Option<Value> {
        let entry = self.entries.get(&id)?;
        if entry.fresh.swap(false, Ordering::AcqRel) {
            Some(entry.sample.load().value)
        } else {
            None
        }
    }

    pub fn contains(&self, id: u32) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 所有 ID（升序）
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.keys().copied()
    }

    /// 全表快照（按 ID 升序）
    ///
    /// 每个条目单独原子读取，条目之间不保证同一时刻。
    pub fn snapshot(&self) -> Vec<(u32, Arc<Sample>)> {
        self.entries
            .iter()
            .map(|(id, entry)| (*id, entry.sample.load_full()))
            .collect()
    }
}

impl std::fmt::Debug for SharedStateTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStateTable")
            .field("len", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use baja_protocol::{FlagCodec, IntCodec, VariableDescriptor};

    fn table() -> SharedStateTable {
        let mut registry = CodecRegistry::new();
        registry
            .register(VariableDescriptor::new(
                0x01,
                "rpm",
                "rpm",
                IntCodec::i16(),
                Value::Integer(0),
            ))
            .unwrap();
        registry
            .register(VariableDescriptor::new(
                0x22,
                "brake_switch",
                "",
                FlagCodec,
                Value::Flag(false),
            ))
            .unwrap();
        SharedStateTable::from_registry(&registry)
    }

    #[test]
    fn test_one_entry_per_registered_id() {
        let state = table();
        assert_eq!(state.len(), 2);
        assert_eq!(state.ids().collect::<Vec<_>>(), vec![0x01, 0x22]);
        assert!(state.sample(0x01).unwrap().is_default());
        assert_eq!(state.sample(0x01).unwrap().updated_at_us, 0);
        assert_eq!(state.get(0x99), None);
    }

    #[test]
    fn test_set_stamps_time_and_sequence() {
        let state = table();
        state.set(0x01, Value::Integer(1234)).unwrap();
        let first = state.sample(0x01).unwrap();
        assert_eq!(first.value, Value::Integer(1234));
        assert_eq!(first.sequence, 1);
        assert!(first.updated_at_us > 0);

        state.set(0x01, Value::Integer(-5)).unwrap();
        let second = state.sample(0x01).unwrap();
        assert_eq!(second.sequence, 2);
        assert!(second.updated_at_us >= first.updated_at_us);
    }

    #[test]
    fn test_set_rejects_unknown_and_mismatched() {
        let state = table();
        assert!(matches!(
            state.set(0x99, Value::Integer(1)),
            Err(DriverError::UnknownIdentifier { id: 0x99 })
        ));
        assert!(matches!(
            state.set(0x22, Value::Integer(1)),
            Err(DriverError::TypeMismatch { id: 0x22, .. })
        ));
        assert!(matches!(
            state.set(0x01, Value::Integer(40_000)),
            Err(DriverError::Codec(_))
        ));
        assert!(!state.contains(0x99));
        assert_eq!(state.get(0x01), Some(Value::Integer(0)));
    }

    #[test]
    fn test_take_fresh_clears_flag() {
        let state = table();
        assert!(!state.is_fresh(0x22));
        assert_eq!(state.take_fresh(0x22), None);

        state.set(0x22, Value::Flag(true)).unwrap();
        assert!(state.is_fresh(0x22));
        assert_eq!(state.take_fresh(0x22), Some(Value::Flag(true)));
        assert!(!state.is_fresh(0x22));
        assert_eq!(state.take_fresh(0x22), None);
        // 值本身保持不变
        assert_eq!(state.get(0x22), Some(Value::Flag(true)));
    }

    #[test]
    fn test_snapshot_ascending() {
        let state = table();
        state.set(0x22, Value::Flag(true)).unwrap();
        let snapshot = state.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].0, 0x01);
        assert_eq!(snapshot[1].1.value, Value::Flag(true));
    }
}
