//! 总线服务循环
//!
//! 后台 IO 线程独占一个适配器，反复执行 [`BusService::step`]：
//!
//! 1. 非阻塞轮询至多一帧，交给接收分发器
//! 2. 检查发送周期，到期则执行一轮发送调度
//!
//! 循环从不睡眠、从不在接收上等待，发送周期的精度与接收流量无关。
//! 每轮至多处理一帧，积压依赖循环吞吐消化。

use crate::clock::{MillisClock, ScheduleClock, TimeSource};
use crate::dispatch::{DispatchOutcome, ReceiveDispatcher};
use crate::metrics::BusMetrics;
use crate::phase::{AtomicBusPhase, BusPhase};
use crate::scheduler::{TickReport, TransmitScheduler};
use baja_can::CanAdapter;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, trace};

/// 单轮迭代结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepReport {
    /// 本轮收到的帧及其分发结果
    pub received: Option<DispatchOutcome>,
    /// 本轮触发的发送统计
    pub transmitted: Option<TickReport>,
}

/// 总线服务
///
/// 拥有适配器、分发器、调度器和时钟；只在 IO 线程上运行。
pub struct BusService<A: CanAdapter, C: TimeSource = MillisClock> {
    adapter: A,
    dispatcher: ReceiveDispatcher,
    scheduler: TransmitScheduler,
    schedule: ScheduleClock,
    clock: C,
    phase: Arc<AtomicBusPhase>,
    metrics: Arc<BusMetrics>,
}

impl<A: CanAdapter, C: TimeSource> BusService<A, C> {
    /// 创建总线服务
    ///
    /// `interval` 的单位与 `clock` 的计数单位一致。
    pub fn new(
        adapter: A,
        dispatcher: ReceiveDispatcher,
        scheduler: TransmitScheduler,
        clock: C,
        interval: u64,
        metrics: Arc<BusMetrics>,
    ) -> Self {
        let schedule = ScheduleClock::for_source(interval, &clock);
        Self {
            adapter,
            dispatcher,
            scheduler,
            schedule,
            clock,
            phase: Arc::new(AtomicBusPhase::default()),
            metrics,
        }
    }

    /// 使用外部共享的阶段指示
    pub fn with_phase(mut self, phase: Arc<AtomicBusPhase>) -> Self {
        self.phase = phase;
        self
    }

    pub fn phase(&self) -> &Arc<AtomicBusPhase> {
        &self.phase
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    /// 执行一轮迭代
    pub fn step(&mut self) -> StepReport {
        // 1. 轮询至多一帧
        self.phase.set(BusPhase::Polling, Ordering::Relaxed);
        let received = match self.adapter.try_receive() {
            Ok(Some(frame)) => Some(self.dispatcher.dispatch(&frame)),
            Ok(None) => None,
            Err(e) => {
                // 运行期接收错误不终止循环
                error!("CAN receive error: {}", e);
                self.metrics.device_errors.fetch_add(1, Ordering::Relaxed);
                None
            },
        };
        self.phase.set(BusPhase::Idle, Ordering::Relaxed);

        // 2. 检查发送周期
        self.phase.set(BusPhase::CheckSchedule, Ordering::Relaxed);
        let transmitted = if self.schedule.poll_due(self.clock.now()) {
            self.phase.set(BusPhase::Transmitting, Ordering::Relaxed);
            Some(self.scheduler.tick(&mut self.adapter))
        } else {
            None
        };
        self.phase.set(BusPhase::Idle, Ordering::Relaxed);

        StepReport {
            received,
            transmitted,
        }
    }

    /// 持续运行直到 `is_running` 被清除（进程关闭）
    pub fn run(&mut self, is_running: &AtomicBool) {
        info!(
            "Bus service started: role={}, owned={:?}, interval={}",
            self.scheduler.role(),
            self.scheduler.owned_ids(),
            self.schedule.interval()
        );

        // Acquire: 看到 false 时，必须能看到关闭前的所有写入
        while is_running.load(Ordering::Acquire) {
            self.step();
            std::hint::spin_loop();
        }

        trace!("Bus service: is_running flag is false, exiting");
        info!("Bus service stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::state::SharedStateTable;
    use baja_can::{BajaFrame, MockCanAdapter, MockHandle};
    use baja_protocol::{Codec, IntCodec, Schema, Subsystem, Value, ids::*};

    fn service(role: Subsystem) -> (
        BusService<MockCanAdapter, ManualClock>,
        MockHandle,
        ManualClock,
        Arc<SharedStateTable>,
        Arc<BusMetrics>,
    ) {
        let schema = Arc::new(Schema::fleet().unwrap());
        let state = Arc::new(SharedStateTable::from_registry(schema.registry()));
        let metrics = Arc::new(BusMetrics::new());
        let adapter = MockCanAdapter::new();
        let handle = adapter.handle();
        let clock = ManualClock::millis(0);
        let service = BusService::new(
            adapter,
            ReceiveDispatcher::new(schema.clone(), state.clone(), metrics.clone()),
            TransmitScheduler::new(role, schema, state.clone(), metrics.clone()),
            clock.clone(),
            100,
            metrics.clone(),
        );
        (service, handle, clock, state, metrics)
    }

    #[test]
    fn test_step_handles_at_most_one_frame() {
        let (mut service, handle, _clock, state, _) = service(Subsystem::Dashboard);
        let lap = IntCodec::i16().encode(&Value::Integer(7)).unwrap();
        handle.push_frame(BajaFrame::new_standard(ID_DAS_LAP_COUNT as u16, &lap));
        handle.push_frame(BajaFrame::new_standard(ID_PRIMARY_RPM as u16, b"3150"));

        let report = service.step();
        assert_eq!(report.received, Some(DispatchOutcome::Stored));
        assert_eq!(handle.pending_inbound(), 1);
        assert_eq!(state.get(ID_DAS_LAP_COUNT), Some(Value::Integer(7)));

        service.step();
        assert_eq!(state.get(ID_PRIMARY_RPM), Some(Value::Integer(3150)));
        assert_eq!(service.step().received, None);
    }

    #[test]
    fn test_step_transmits_on_cadence() {
        let (mut service, handle, clock, _, metrics) = service(Subsystem::Cvt);

        // 首轮即发送
        let report = service.step();
        assert_eq!(report.transmitted, Some(TickReport { sent: 3, failed: 0 }));

        clock.advance(99);
        assert_eq!(service.step().transmitted, None);

        clock.advance(1);
        assert!(service.step().transmitted.is_some());

        assert_eq!(handle.sent().len(), 6);
        assert_eq!(metrics.snapshot().tx_cycles, 2);
        assert_eq!(service.phase().get(Ordering::Relaxed), BusPhase::Idle);
    }

    #[test]
    fn test_receive_error_does_not_stop_service() {
        let (mut service, handle, _clock, _, metrics) = service(Subsystem::BaseStation);
        handle.push_receive_error("controller glitch");
        handle.push_frame(BajaFrame::new_standard(ID_FUEL_LEVEL as u16, &[55]));

        assert_eq!(service.step().received, None);
        assert_eq!(service.step().received, Some(DispatchOutcome::Stored));
        assert_eq!(metrics.snapshot().device_errors, 1);
    }

    #[test]
    fn test_run_exits_when_flag_cleared() {
        let (mut service, handle, _clock, _, _) = service(Subsystem::Fuel);
        let is_running = Arc::new(AtomicBool::new(true));
        let flag = is_running.clone();

        let worker = std::thread::spawn(move || {
            service.run(&flag);
            service
        });
        while handle.sent().is_empty() {
            std::thread::yield_now();
        }
        is_running.store(false, Ordering::Release);

        let service = worker.join().unwrap();
        assert_eq!(service.adapter().handle().sent()[0].id, ID_FUEL_LEVEL);
    }
}
