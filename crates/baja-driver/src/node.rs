//! 节点 API 模块
//!
//! 提供对外的 `Node` 结构体，封装 IO 线程和共享状态表。
//!
//! 两个执行上下文：
//! - **IO 线程**（`baja-can-io`）：独占适配器，持续运行总线服务循环
//! - **应用线程**（调用方）：通过 `get`/`set` 读写共享状态表
//!
//! 二者之间唯一的共享资源是共享状态表（外加只读的指标和阶段指示）。

use crate::clock::TimeSource;
use crate::error::DriverError;
use crate::metrics::{BusMetrics, MetricsSnapshot};
use crate::phase::{AtomicBusPhase, BusPhase};
use crate::pipeline::BusService;
use crate::state::{Sample, SharedStateTable};
use baja_can::CanAdapter;
use baja_protocol::{Schema, Subsystem, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// IO 线程名称
pub const IO_THREAD_NAME: &str = "baja-can-io";

/// Drop 时等待 IO 线程退出的最长时间
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// 等待 IO 线程退出时的轮询间隔
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// IO 线程的退出结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IoExit {
    /// 正常返回
    Clean,
    /// 线程以 panic 结束（阶段已由 `HaltOnPanic` 置为 Halted）
    Panicked,
    /// 超时仍未退出，句柄被放弃（线程随进程结束）
    Abandoned,
}

/// 在 `timeout` 内等待 IO 线程结束
///
/// 只轮询 `is_finished`，确认结束后才 `join`，因此本函数不会阻塞超过 `timeout`。
fn await_io_exit(handle: JoinHandle<()>, timeout: Duration) -> IoExit {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return IoExit::Abandoned;
        }
        std::thread::sleep(JOIN_POLL_INTERVAL);
    }
    match handle.join() {
        Ok(()) => IoExit::Clean,
        Err(_) => IoExit::Panicked,
    }
}

/// IO 线程 panic 时把阶段置为 Halted
struct HaltOnPanic(Arc<AtomicBusPhase>);

impl Drop for HaltOnPanic {
    fn drop(&mut self) {
        if std::thread::panicking() {
            error!("Bus service thread panicked, node halted");
            self.0.halt();
        }
    }
}

/// 节点静态信息（构造时确定）
pub(crate) struct NodeInfo {
    pub role: Subsystem,
    pub interface: String,
    pub bitrate: u32,
    pub schema: Arc<Schema>,
    pub state: Arc<SharedStateTable>,
    pub metrics: Arc<BusMetrics>,
    pub phase: Arc<AtomicBusPhase>,
}

/// 子系统节点（对外 API）
///
/// 由 [`NodeBuilder`](crate::NodeBuilder) 创建。Drop 即进程关闭：
/// 清除运行标志并等待 IO 线程退出。
pub struct Node {
    role: Subsystem,
    interface: String,
    bitrate: u32,
    schema: Arc<Schema>,
    state: Arc<SharedStateTable>,
    metrics: Arc<BusMetrics>,
    phase: Arc<AtomicBusPhase>,
    is_running: Arc<AtomicBool>,
    io_thread: Option<JoinHandle<()>>,
}

impl Node {
    /// 启动 IO 线程
    pub(crate) fn spawn<A, C>(
        mut service: BusService<A, C>,
        info: NodeInfo,
    ) -> Result<Self, DriverError>
    where
        A: CanAdapter + Send + 'static,
        C: TimeSource + 'static,
    {
        let is_running = Arc::new(AtomicBool::new(true));
        let is_running_io = is_running.clone();
        let phase_io = info.phase.clone();

        let io_thread = std::thread::Builder::new()
            .name(IO_THREAD_NAME.to_string())
            .spawn(move || {
                let _guard = HaltOnPanic(phase_io);

                // 设置线程优先级（可选 feature）
                #[cfg(feature = "realtime")]
                {
                    use thread_priority::*;

                    match set_current_thread_priority(ThreadPriority::Max) {
                        Ok(_) => info!("IO thread priority set to MAX (realtime)"),
                        Err(e) => warn!(
                            "Failed to set IO thread priority: {}. \
                            On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                            e
                        ),
                    }
                }

                service.run(&is_running_io);
            })
            .map_err(|e| {
                info.phase.halt();
                DriverError::IoThread(e.to_string())
            })?;

        info!(
            "Node started: role={}, interface={}, bitrate={}",
            info.role, info.interface, info.bitrate
        );

        Ok(Self {
            role: info.role,
            interface: info.interface,
            bitrate: info.bitrate,
            schema: info.schema,
            state: info.state,
            metrics: info.metrics,
            phase: info.phase,
            is_running,
            io_thread: Some(io_thread),
        })
    }

    /// 读取当前值（未注册的 ID 返回 `None`）
    pub fn get(&self, id: u32) -> Option<Value> {
        self.state.get(id)
    }

    /// 读取当前值及其更新时间
    pub fn sample(&self, id: u32) -> Option<Arc<Sample>> {
        self.state.sample(id)
    }

    /// 写入值
    ///
    /// 本角色拥有的 ID 会在下一个发送周期发出；其他 ID 只更新本地副本。
    pub fn set(&self, id: u32, value: impl Into<Value>) -> Result<(), DriverError> {
        self.state.set(id, value.into())
    }

    /// 读取并清除新鲜标志
    pub fn take_fresh(&self, id: u32) -> Option<Value> {
        self.state.take_fresh(id)
    }

    /// 共享状态表（可交给其他应用线程）
    pub fn state(&self) -> &Arc<SharedStateTable> {
        &self.state
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// 指标快照
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 当前循环阶段
    pub fn phase(&self) -> BusPhase {
        self.phase.get(Ordering::Acquire)
    }

    pub fn role(&self) -> Subsystem {
        self.role
    }

    /// 本角色负责发送的 ID（声明顺序）
    pub fn owned_ids(&self) -> &[u32] {
        self.schema.ownership().owned_by(self.role)
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn bitrate(&self) -> u32 {
        self.bitrate
    }

    /// IO 线程仍在运行且未进入 Halted
    pub fn is_healthy(&self) -> bool {
        let thread_alive = self
            .io_thread
            .as_ref()
            .is_some_and(|handle| !handle.is_finished());
        thread_alive && !self.phase().is_halted()
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        // Release: IO 线程看到 false 时，之前的写入对其可见
        self.is_running.store(false, Ordering::Release);

        if let Some(handle) = self.io_thread.take() {
            match await_io_exit(handle, JOIN_TIMEOUT) {
                IoExit::Clean => {},
                IoExit::Panicked => warn!("IO thread had already panicked before shutdown"),
                IoExit::Abandoned => error!(
                    "IO thread did not exit within {:?}, abandoning it",
                    JOIN_TIMEOUT
                ),
            }
        }
        info!("Node stopped: role={}", self.role);
    }
}

#[cfg(test)]
mod tests {
    use super::{IoExit, await_io_exit};
    use crate::NodeBuilder;
    use crate::clock::ManualClock;
    use baja_can::{CanAdapter, CanError, MockCanAdapter};
    use baja_protocol::{BajaFrame, Subsystem, Value, ids::*};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn test_node_receives_into_shared_state() {
        let adapter = MockCanAdapter::new();
        let handle = adapter.handle();
        handle.push_frame(BajaFrame::new_standard(ID_CVT_TEMPERATURE as u16, b"87"));

        let node = NodeBuilder::new()
            .role(Subsystem::Dashboard)
            .build_with_adapter(adapter)
            .unwrap();

        assert!(wait_until(|| node.get(ID_CVT_TEMPERATURE) == Some(Value::Integer(87))));
        assert_eq!(node.take_fresh(ID_CVT_TEMPERATURE), Some(Value::Integer(87)));
        assert!(node.is_healthy());
    }

    #[test]
    fn test_node_transmits_owned_values() {
        let adapter = MockCanAdapter::new();
        let handle = adapter.handle();

        let node = NodeBuilder::new()
            .role(Subsystem::Fuel)
            .transmit_interval(Duration::from_millis(5))
            .build_with_adapter(adapter)
            .unwrap();
        node.set(ID_FUEL_LEVEL, Value::Integer(64)).unwrap();

        assert!(wait_until(|| {
            handle
                .sent()
                .iter()
                .any(|f| f.id == ID_FUEL_LEVEL && f.data_slice() == [64])
        }));
        assert_eq!(node.owned_ids(), &[ID_FUEL_LEVEL]);
    }

    struct PanickingAdapter;

    impl CanAdapter for PanickingAdapter {
        fn send(&mut self, _frame: BajaFrame) -> Result<(), CanError> {
            Ok(())
        }

        fn try_receive(&mut self) -> Result<Option<BajaFrame>, CanError> {
            panic!("adapter fault");
        }
    }

    #[test]
    fn test_io_thread_panic_halts_node() {
        let node = NodeBuilder::new()
            .build_with_adapter(PanickingAdapter)
            .unwrap();

        assert!(wait_until(|| node.phase().is_halted()));
        assert!(!node.is_healthy());
        // Drop 不应挂起
        drop(node);
    }

    #[test]
    fn test_drop_stops_io_thread_promptly() {
        let node = NodeBuilder::new()
            .role(Subsystem::Cvt)
            .build_with_adapter(MockCanAdapter::new())
            .unwrap();

        let start = Instant::now();
        drop(node);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_await_io_exit_clean() {
        let handle = std::thread::spawn(|| {});
        assert_eq!(await_io_exit(handle, Duration::from_secs(1)), IoExit::Clean);
    }

    #[test]
    fn test_await_io_exit_reports_panic() {
        let handle = std::thread::spawn(|| panic!("bus fault"));
        assert_eq!(await_io_exit(handle, Duration::from_secs(1)), IoExit::Panicked);
    }

    #[test]
    fn test_await_io_exit_gives_up_after_timeout() {
        let release = Arc::new(AtomicBool::new(false));
        let release_worker = release.clone();
        let handle = std::thread::spawn(move || {
            while !release_worker.load(Ordering::Acquire) {
                std::thread::sleep(Duration::from_millis(1));
            }
        });

        let start = Instant::now();
        assert_eq!(
            await_io_exit(handle, Duration::from_millis(20)),
            IoExit::Abandoned
        );
        assert!(start.elapsed() < Duration::from_secs(1));
        release.store(true, Ordering::Release);
    }

    #[test]
    fn test_node_transmits_on_injected_clock() {
        let adapter = MockCanAdapter::new();
        let handle = adapter.handle();
        let clock = ManualClock::millis(0);

        let node = NodeBuilder::new()
            .role(Subsystem::Fuel)
            .transmit_interval(Duration::from_millis(100))
            .build_with_clock(adapter, clock.clone())
            .unwrap();

        // 首个周期立即发送
        assert!(wait_until(|| handle.sent().len() == 1));
        // 时钟不动则不再发送
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(handle.sent().len(), 1);

        clock.advance(100);
        assert!(wait_until(|| handle.sent().len() == 2));
        assert!(handle.sent().iter().all(|f| f.id == ID_FUEL_LEVEL));
        drop(node);
    }
}
