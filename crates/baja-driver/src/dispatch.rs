//! 接收分发器
//!
//! 每收到一帧调用一次：查表 → 解码 → 写入共享状态表。
//! 任何单帧错误都在这里吸收，不会向上传播。

use crate::metrics::BusMetrics;
use crate::state::SharedStateTable;
use baja_can::BajaFrame;
use baja_protocol::Schema;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::{debug, trace};

/// 单帧分发结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// 解码成功并写入共享状态表
    Stored,
    /// ID 未注册，丢弃（车队中可能有新/旧版本的节点）
    UnknownIdentifier,
    /// 负载与 codec 不匹配，丢弃
    DecodeFailed,
}

/// 接收分发器
pub struct ReceiveDispatcher {
    schema: Arc<Schema>,
    state: Arc<SharedStateTable>,
    metrics: Arc<BusMetrics>,
}

impl ReceiveDispatcher {
    pub fn new(
        schema: Arc<Schema>,
        state: Arc<SharedStateTable>,
        metrics: Arc<BusMetrics>,
    ) -> Self {
        Self {
            schema,
            state,
            metrics,
        }
    }

    /// 分发一帧
    ///
    /// 不做 I/O，不阻塞。
    pub fn dispatch(&self, frame: &BajaFrame) -> DispatchOutcome {
        self.metrics.rx_frames_total.fetch_add(1, Ordering::Relaxed);

        let Some(codec) = self.schema.registry().lookup(frame.id) else {
            trace!("Ignoring frame with unregistered ID 0x{:X}", frame.id);
            self.metrics.rx_unknown_ids.fetch_add(1, Ordering::Relaxed);
            return DispatchOutcome::UnknownIdentifier;
        };

        let value = match codec.decode(frame.data_slice()) {
            Ok(value) => value,
            Err(e) => {
                debug!(
                    "Discarding malformed payload for 0x{:X} ({:02X?}): {}",
                    frame.id,
                    frame.data_slice(),
                    e
                );
                self.metrics.rx_decode_failures.fetch_add(1, Ordering::Relaxed);
                return DispatchOutcome::DecodeFailed;
            },
        };

        if !self.state.store_decoded(frame.id, value) {
            // 注册表和状态表同源，不应出现
            self.metrics.rx_unknown_ids.fetch_add(1, Ordering::Relaxed);
            return DispatchOutcome::UnknownIdentifier;
        }

        trace!("0x{:X} <- {}", frame.id, value);
        self.metrics.rx_stored.fetch_add(1, Ordering::Relaxed);
        DispatchOutcome::Stored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use baja_protocol::{
        Codec, CodecRegistry, IntCodec, OwnershipTable, TextIntCodec, Value, VariableDescriptor,
    };

    fn dispatcher() -> (ReceiveDispatcher, Arc<SharedStateTable>, Arc<BusMetrics>) {
        let mut registry = CodecRegistry::new();
        registry
            .register(VariableDescriptor::new(
                1,
                "value",
                "",
                IntCodec::i16(),
                Value::Integer(0),
            ))
            .unwrap();
        registry
            .register(VariableDescriptor::new(
                2,
                "text",
                "",
                TextIntCodec,
                Value::Integer(0),
            ))
            .unwrap();
        let schema = Arc::new(Schema::new(registry, OwnershipTable::new()).unwrap());
        let state = Arc::new(SharedStateTable::from_registry(schema.registry()));
        let metrics = Arc::new(BusMetrics::new());
        (
            ReceiveDispatcher::new(schema, state.clone(), metrics.clone()),
            state,
            metrics,
        )
    }

    #[test]
    fn test_dispatch_stores_decoded_value() {
        let (dispatcher, state, metrics) = dispatcher();
        let payload = IntCodec::i16().encode(&Value::Integer(1234)).unwrap();

        let outcome = dispatcher.dispatch(&BajaFrame::new_standard(1, &payload));

        assert_eq!(outcome, DispatchOutcome::Stored);
        assert_eq!(state.get(1), Some(Value::Integer(1234)));
        assert_eq!(metrics.snapshot().rx_stored, 1);
    }

    #[test]
    fn test_dispatch_ignores_unknown_identifier() {
        let (dispatcher, state, metrics) = dispatcher();
        let before = state.snapshot();

        let outcome = dispatcher.dispatch(&BajaFrame::new_standard(99, &[0x04, 0xD2]));

        assert_eq!(outcome, DispatchOutcome::UnknownIdentifier);
        assert!(!state.contains(99));
        assert_eq!(state.snapshot(), before);
        assert_eq!(metrics.snapshot().rx_unknown_ids, 1);
    }

    #[test]
    fn test_dispatch_discards_malformed_payload() {
        let (dispatcher, state, metrics) = dispatcher();

        // 长度错误
        assert_eq!(
            dispatcher.dispatch(&BajaFrame::new_standard(1, &[1, 2, 3, 4])),
            DispatchOutcome::DecodeFailed
        );
        // 非数字文本
        assert_eq!(
            dispatcher.dispatch(&BajaFrame::new_standard(2, b"12a4")),
            DispatchOutcome::DecodeFailed
        );

        assert_eq!(state.get(1), Some(Value::Integer(0)));
        assert_eq!(state.get(2), Some(Value::Integer(0)));
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.rx_decode_failures, 2);
        assert_eq!(snapshot.rx_frames_total, 2);
    }

    #[test]
    fn test_dispatch_legacy_text_frame() {
        let (dispatcher, state, _) = dispatcher();
        dispatcher.dispatch(&BajaFrame::new_standard(2, b"-42"));
        assert_eq!(state.get(2), Some(Value::Integer(-42)));
    }
}
