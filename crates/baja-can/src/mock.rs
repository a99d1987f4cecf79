//! Mock CAN 适配器（无硬件依赖）
//!
//! - [`MockCanAdapter`]：脚本化适配器。测试通过 [`MockHandle`] 注入接收帧、
//!   注入错误、让指定 ID 的发送失败，并检查已发送的帧。
//! - [`VirtualBus`]：进程内虚拟总线。每个 [`VirtualBusAdapter`] 收到
//!   其他节点发出的帧，但收不到自己发出的帧（与 SocketCAN 默认行为一致）。

use crate::{BajaFrame, CanAdapter, CanDeviceError, CanDeviceErrorKind, CanError};
use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

enum MockEvent {
    Frame(BajaFrame),
    Error(CanDeviceError),
}

#[derive(Default)]
struct MockState {
    inbound: VecDeque<MockEvent>,
    sent: Vec<BajaFrame>,
    failing_ids: HashSet<u32>,
    fail_all_sends: bool,
    send_attempts: u64,
}

/// 脚本化 Mock 适配器
pub struct MockCanAdapter {
    state: Arc<Mutex<MockState>>,
}

/// Mock 适配器的测试侧句柄（可跨线程克隆）
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockCanAdapter {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// 获取测试侧句柄
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: self.state.clone(),
        }
    }
}

impl Default for MockCanAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl CanAdapter for MockCanAdapter {
    fn send(&mut self, frame: BajaFrame) -> Result<(), CanError> {
        let mut state = self.state.lock();
        state.send_attempts += 1;
        if state.fail_all_sends || state.failing_ids.contains(&frame.id) {
            return Err(CanError::Device(CanDeviceError::new(
                CanDeviceErrorKind::Busy,
                format!("mock transmit failure for 0x{:X}", frame.id),
            )));
        }
        state.sent.push(frame);
        Ok(())
    }

    fn try_receive(&mut self) -> Result<Option<BajaFrame>, CanError> {
        match self.state.lock().inbound.pop_front() {
            Some(MockEvent::Frame(frame)) => Ok(Some(frame)),
            Some(MockEvent::Error(err)) => Err(CanError::Device(err)),
            None => Ok(None),
        }
    }
}

impl MockHandle {
    /// 排队一帧，等待 `try_receive()` 取出
    pub fn push_frame(&self, frame: BajaFrame) {
        self.state.lock().inbound.push_back(MockEvent::Frame(frame));
    }

    /// 排队一个接收错误
    pub fn push_receive_error(&self, message: impl Into<String>) {
        self.state
            .lock()
            .inbound
            .push_back(MockEvent::Error(CanDeviceError::new(
                CanDeviceErrorKind::Backend,
                message,
            )));
    }

    /// 尚未被取出的接收事件数量
    pub fn pending_inbound(&self) -> usize {
        self.state.lock().inbound.len()
    }

    /// 让指定 ID 的发送失败
    pub fn fail_sends_for(&self, id: u32) {
        self.state.lock().failing_ids.insert(id);
    }

    /// 让所有发送失败
    pub fn set_fail_all_sends(&self, fail: bool) {
        self.state.lock().fail_all_sends = fail;
    }

    pub fn clear_send_failures(&self) {
        let mut state = self.state.lock();
        state.failing_ids.clear();
        state.fail_all_sends = false;
    }

    /// 已成功发送的帧（按发送顺序）
    pub fn sent(&self) -> Vec<BajaFrame> {
        self.state.lock().sent.clone()
    }

    /// 取出并清空已发送的帧
    pub fn take_sent(&self) -> Vec<BajaFrame> {
        std::mem::take(&mut self.state.lock().sent)
    }

    /// 发送尝试次数（含失败）
    pub fn send_attempts(&self) -> u64 {
        self.state.lock().send_attempts
    }
}

// ============================================================================
// 进程内虚拟总线
// ============================================================================

type Taps = Vec<(usize, Sender<BajaFrame>)>;

#[derive(Default)]
struct BusInner {
    taps: Mutex<Taps>,
    next_id: Mutex<usize>,
}

/// 进程内虚拟总线
///
/// 广播语义：一个节点发送的帧被投递到所有其他已连接的节点。
#[derive(Clone, Default)]
pub struct VirtualBus {
    inner: Arc<BusInner>,
}

impl VirtualBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self) -> (usize, Receiver<BajaFrame>) {
        let (tx, rx) = unbounded();
        let id = {
            let mut next = self.inner.next_id.lock();
            let id = *next;
            *next += 1;
            id
        };
        self.inner.taps.lock().push((id, tx));
        (id, rx)
    }

    /// 连接一个新节点
    pub fn attach(&self) -> VirtualBusAdapter {
        let (node, rx) = self.register();
        VirtualBusAdapter {
            node,
            rx,
            bus: self.clone(),
        }
    }

    /// 旁路监听：收到总线上的所有帧
    pub fn tap(&self) -> Receiver<BajaFrame> {
        self.register().1
    }

    /// 当前连接数（节点 + 监听）
    pub fn connections(&self) -> usize {
        self.inner.taps.lock().len()
    }

    fn broadcast(&self, from: usize, frame: BajaFrame) {
        let mut taps = self.inner.taps.lock();
        // 接收端已断开的连接直接移除
        taps.retain(|(id, tx)| *id == from || tx.send(frame).is_ok());
    }

    fn detach(&self, node: usize) {
        self.inner.taps.lock().retain(|(id, _)| *id != node);
    }
}

/// 虚拟总线上的一个节点
pub struct VirtualBusAdapter {
    node: usize,
    rx: Receiver<BajaFrame>,
    bus: VirtualBus,
}

impl CanAdapter for VirtualBusAdapter {
    fn send(&mut self, frame: BajaFrame) -> Result<(), CanError> {
        self.bus.broadcast(self.node, frame);
        Ok(())
    }

    fn try_receive(&mut self) -> Result<Option<BajaFrame>, CanError> {
        match self.rx.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(CanError::NotStarted),
        }
    }
}

impl Drop for VirtualBusAdapter {
    fn drop(&mut self) {
        self.bus.detach(self.node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_inbound_fifo() {
        let mut adapter = MockCanAdapter::new();
        let handle = adapter.handle();
        handle.push_frame(BajaFrame::new_standard(0x01, b"1"));
        handle.push_receive_error("glitch");
        handle.push_frame(BajaFrame::new_standard(0x02, b"2"));

        assert_eq!(adapter.try_receive().unwrap().unwrap().id, 0x01);
        assert!(matches!(adapter.try_receive(), Err(CanError::Device(_))));
        assert_eq!(adapter.try_receive().unwrap().unwrap().id, 0x02);
        assert!(adapter.try_receive().unwrap().is_none());
        assert_eq!(handle.pending_inbound(), 0);
    }

    #[test]
    fn test_mock_send_failure_per_id() {
        let mut adapter = MockCanAdapter::new();
        let handle = adapter.handle();
        handle.fail_sends_for(0x02);

        adapter.send(BajaFrame::new_standard(0x01, &[1])).unwrap();
        assert!(adapter.send(BajaFrame::new_standard(0x02, &[2])).is_err());
        adapter.send(BajaFrame::new_standard(0x03, &[3])).unwrap();

        let ids: Vec<u32> = handle.sent().iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![0x01, 0x03]);
        assert_eq!(handle.send_attempts(), 3);

        handle.clear_send_failures();
        adapter.send(BajaFrame::new_standard(0x02, &[2])).unwrap();
        assert_eq!(handle.take_sent().len(), 3);
        assert!(handle.sent().is_empty());
    }

    #[test]
    fn test_virtual_bus_does_not_echo_to_sender() {
        let bus = VirtualBus::new();
        let mut a = bus.attach();
        let mut b = bus.attach();
        let tap = bus.tap();

        a.send(BajaFrame::new_standard(0x01, b"42")).unwrap();

        assert!(a.try_receive().unwrap().is_none());
        assert_eq!(b.try_receive().unwrap().unwrap().data_slice(), b"42");
        assert_eq!(tap.try_recv().unwrap().id, 0x01);
    }

    #[test]
    fn test_virtual_bus_detach_on_drop() {
        let bus = VirtualBus::new();
        let a = bus.attach();
        let _b = bus.attach();
        assert_eq!(bus.connections(), 2);
        drop(a);
        assert_eq!(bus.connections(), 1);
    }
}
