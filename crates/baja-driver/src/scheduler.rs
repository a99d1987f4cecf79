//! 角色发送调度器
//!
//! 每次触发时，按所有权表声明的顺序，把本角色拥有的每个 ID：
//! 读取当前值 → 编码 → 发送。单个 ID 失败只记录并跳过，不中断本轮。

use crate::error::DriverError;
use crate::metrics::BusMetrics;
use crate::state::SharedStateTable;
use baja_can::{BajaFrame, CanAdapter};
use baja_protocol::codec::MAX_PAYLOAD_LEN;
use baja_protocol::role::OwnedIds;
use baja_protocol::{CodecError, Schema, Subsystem};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::{trace, warn};

/// 单轮发送统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// 发送成功的帧数
    pub sent: usize,
    /// 编码或发送失败的 ID 数
    pub failed: usize,
}

/// 发送调度器
pub struct TransmitScheduler {
    role: Subsystem,
    owned: OwnedIds,
    schema: Arc<Schema>,
    state: Arc<SharedStateTable>,
    metrics: Arc<BusMetrics>,
}

impl TransmitScheduler {
    /// 捕获角色的有序 ID 列表（被动角色为空列表）
    pub fn new(
        role: Subsystem,
        schema: Arc<Schema>,
        state: Arc<SharedStateTable>,
        metrics: Arc<BusMetrics>,
    ) -> Self {
        let owned = OwnedIds::from_slice(schema.ownership().owned_by(role));
        Self {
            role,
            owned,
            schema,
            state,
            metrics,
        }
    }

    pub fn role(&self) -> Subsystem {
        self.role
    }

    /// 本角色负责发送的 ID（声明顺序）
    pub fn owned_ids(&self) -> &[u32] {
        &self.owned
    }

    /// 执行一轮发送
    pub fn tick<A: CanAdapter + ?Sized>(&self, adapter: &mut A) -> TickReport {
        let mut report = TickReport::default();
        self.metrics.tx_cycles.fetch_add(1, Ordering::Relaxed);

        for &id in &self.owned {
            match self.transmit_one(adapter, id) {
                Ok(()) => {
                    report.sent += 1;
                    self.metrics.tx_frames_total.fetch_add(1, Ordering::Relaxed);
                },
                Err(reason) => {
                    warn!("Transmit of 0x{:X} skipped: {}", id, reason);
                    report.failed += 1;
                    self.metrics.tx_failures.fetch_add(1, Ordering::Relaxed);
                },
            }
        }

        trace!(
            "{} tick: sent={}, failed={}",
            self.role, report.sent, report.failed
        );
        report
    }

    fn transmit_one<A: CanAdapter + ?Sized>(
        &self,
        adapter: &mut A,
        id: u32,
    ) -> Result<(), DriverError> {
        let value = self
            .state
            .get(id)
            .ok_or(DriverError::UnknownIdentifier { id })?;
        let codec = self
            .schema
            .registry()
            .lookup(id)
            .ok_or(DriverError::UnknownIdentifier { id })?;
        let payload = codec.encode(&value)?;
        // BajaFrame 会截断超长负载
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(CodecError::PayloadTooLong(payload.len()).into());
        }

        adapter.send(BajaFrame::for_id(id, &payload))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use baja_can::MockCanAdapter;
    use baja_protocol::{
        Codec, CodecRegistry, IntCodec, OwnershipTable, Payload, Value, ValueKind,
        VariableDescriptor,
    };

    fn schema() -> Arc<Schema> {
        let mut registry = CodecRegistry::new();
        for id in [1, 2, 3] {
            registry
                .register(VariableDescriptor::new(
                    id,
                    "v",
                    "",
                    IntCodec::i16(),
                    Value::Integer(id as i64 * 10),
                ))
                .unwrap();
        }
        let mut ownership = OwnershipTable::new();
        ownership.assign(Subsystem::Cvt, &[2, 1]).unwrap();
        ownership.assign(Subsystem::Fuel, &[3]).unwrap();
        Arc::new(Schema::new(registry, ownership).unwrap())
    }

    fn scheduler(role: Subsystem) -> (TransmitScheduler, Arc<SharedStateTable>, Arc<BusMetrics>) {
        let schema = schema();
        let state = Arc::new(SharedStateTable::from_registry(schema.registry()));
        let metrics = Arc::new(BusMetrics::new());
        (
            TransmitScheduler::new(role, schema, state.clone(), metrics.clone()),
            state,
            metrics,
        )
    }

    #[test]
    fn test_tick_sends_in_declared_order() {
        let (scheduler, state, metrics) = scheduler(Subsystem::Cvt);
        state.set(1, Value::Integer(1234)).unwrap();

        let mut adapter = MockCanAdapter::new();
        let handle = adapter.handle();
        let report = scheduler.tick(&mut adapter);

        assert_eq!(report, TickReport { sent: 2, failed: 0 });
        let sent = handle.sent();
        assert_eq!(sent.iter().map(|f| f.id).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(sent[0].data_slice(), &[0x00, 0x14]); // 默认值 20
        assert_eq!(sent[1].data_slice(), &[0x04, 0xD2]); // 1234
        assert_eq!(metrics.snapshot().tx_cycles, 1);
    }

    #[test]
    fn test_passive_role_sends_nothing() {
        let (scheduler, _, metrics) = scheduler(Subsystem::Dashboard);
        let mut adapter = MockCanAdapter::new();
        let handle = adapter.handle();

        assert_eq!(scheduler.tick(&mut adapter), TickReport::default());
        assert!(handle.sent().is_empty());
        assert_eq!(handle.send_attempts(), 0);
        assert_eq!(metrics.snapshot().tx_frames_total, 0);
    }

    #[test]
    fn test_cycle_with_every_send_failing_still_counts() {
        let (scheduler, _, metrics) = scheduler(Subsystem::Cvt);
        let mut adapter = MockCanAdapter::new();
        let handle = adapter.handle();
        handle.set_fail_all_sends(true);

        assert_eq!(scheduler.tick(&mut adapter), TickReport { sent: 0, failed: 2 });
        assert_eq!(handle.send_attempts(), 2);
        assert!(handle.sent().is_empty());
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tx_cycles, 1);
        assert_eq!(snapshot.tx_failures, 2);

        // 恢复后下一轮照常发送
        handle.set_fail_all_sends(false);
        assert_eq!(scheduler.tick(&mut adapter), TickReport { sent: 2, failed: 0 });
        assert_eq!(metrics.snapshot().tx_cycles, 2);
    }

    #[test]
    fn test_send_failure_skips_to_next_id() {
        let (scheduler, _, metrics) = scheduler(Subsystem::Cvt);
        let mut adapter = MockCanAdapter::new();
        let handle = adapter.handle();
        handle.fail_sends_for(2);

        let report = scheduler.tick(&mut adapter);

        assert_eq!(report, TickReport { sent: 1, failed: 1 });
        assert_eq!(handle.sent()[0].id, 1);
        assert_eq!(metrics.snapshot().tx_failures, 1);
    }

    /// 默认值编码为 1 字节，其余值产生 9 字节负载
    #[derive(Debug)]
    struct OversizedCodec;

    impl Codec for OversizedCodec {
        fn kind(&self) -> ValueKind {
            ValueKind::Integer
        }

        fn encode(&self, value: &Value) -> Result<Payload, CodecError> {
            match value {
                Value::Integer(0) => Ok(Payload::from_slice(&[0])),
                _ => Ok(Payload::from_slice(&[0; 9])),
            }
        }

        fn decode(&self, _bytes: &[u8]) -> Result<Value, CodecError> {
            Ok(Value::Integer(0))
        }
    }

    #[test]
    fn test_oversized_payload_is_rejected() {
        let mut registry = CodecRegistry::new();
        registry
            .register(VariableDescriptor::new(
                7,
                "oversized",
                "",
                OversizedCodec,
                Value::Integer(0),
            ))
            .unwrap();
        let mut ownership = OwnershipTable::new();
        ownership.assign(Subsystem::Das, &[7]).unwrap();
        let schema = Arc::new(Schema::new(registry, ownership).unwrap());
        let state = Arc::new(SharedStateTable::from_registry(schema.registry()));
        state.set(7, Value::Integer(5)).unwrap();
        let scheduler =
            TransmitScheduler::new(Subsystem::Das, schema, state, Arc::new(BusMetrics::new()));

        let mut adapter = MockCanAdapter::new();
        let handle = adapter.handle();

        assert_eq!(scheduler.tick(&mut adapter), TickReport { sent: 0, failed: 1 });
        assert_eq!(handle.send_attempts(), 0);
    }
}
