//! SocketCAN CAN 适配器实现
//!
//! Linux 平台下的总线能力实现，使用内核级的 CAN 通讯接口。
//!
//! ## 特性
//!
//! - socket 设置为非阻塞，`try_receive()` 没有帧时立即返回 `None`
//! - 支持标准帧和扩展帧
//! - 自动过滤错误帧和远程帧
//!
//! ## 限制
//!
//! - **仅限 Linux 平台**：SocketCAN 是 Linux 内核特性
//! - **接口配置**：波特率等配置由系统工具（`ip link`）完成，不在应用层设置

use crate::{BajaFrame, CanAdapter, CanDeviceError, CanDeviceErrorKind, CanError};
use socketcan::{CanFrame, CanSocket, EmbeddedFrame, ExtendedId, Frame, Socket, StandardId};
use std::io::ErrorKind;
use tracing::{trace, warn};

mod interface_check;

pub use interface_check::check_interface_status;

/// 29-bit ID 掩码
const CAN_ID_MASK: u32 = 0x1FFF_FFFF;

/// SocketCAN 适配器
///
/// # 示例
///
/// ```no_run
/// use baja_can::{BajaFrame, CanAdapter, SocketCanAdapter};
///
/// let mut adapter = SocketCanAdapter::new("can0").unwrap();
/// adapter.send(BajaFrame::new_standard(0x01, b"3150")).unwrap();
/// if let Some(frame) = adapter.try_receive().unwrap() {
///     println!("0x{:X}: {:?}", frame.id, frame.data_slice());
/// }
/// ```
#[derive(Debug)]
pub struct SocketCanAdapter {
    /// SocketCAN socket
    socket: CanSocket,
    /// 接口名称（如 "can0"）
    interface: String,
    /// 期望的总线波特率（由系统配置，仅记录）
    bitrate: Option<u32>,
}

impl SocketCanAdapter {
    /// 打开 SocketCAN 接口
    ///
    /// 打开前检查接口是否存在且处于 UP 状态，失败时给出修复提示。
    ///
    /// # 错误
    /// - `CanError::Device`: 接口不存在、未启动或无法打开
    /// - `CanError::Io`: 设置非阻塞模式失败
    pub fn new(interface: impl Into<String>) -> Result<Self, CanError> {
        let interface = interface.into();

        // 1. 检查接口状态（仅检查，不自动配置）
        if !check_interface_status(&interface)? {
            return Err(CanError::Device(CanDeviceError::new(
                CanDeviceErrorKind::UnsupportedConfig,
                format!(
                    "CAN interface '{}' exists but is not UP. Please start it first:\n  sudo ip link set up {}",
                    interface, interface
                ),
            )));
        }

        // 2. 打开 SocketCAN 接口
        let socket = CanSocket::open(&interface).map_err(|e| {
            CanError::Device(CanDeviceError::new(
                CanDeviceErrorKind::Backend,
                format!("Failed to open CAN interface '{}': {}", interface, e),
            ))
        })?;

        // 3. 非阻塞：总线服务循环从不在接收上等待
        socket.set_nonblocking(true).map_err(CanError::Io)?;

        trace!("SocketCAN interface '{}' opened (non-blocking)", interface);

        Ok(Self {
            socket,
            interface,
            bitrate: None,
        })
    }

    /// 获取接口名称
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// 期望波特率
    pub fn bitrate(&self) -> Option<u32> {
        self.bitrate
    }

    /// 配置接口（仅记录）
    ///
    /// SocketCAN 的波特率由 `ip link set can0 type can bitrate 1000000` 配置，
    /// 这里只记录期望值用于日志。
    pub fn configure(&mut self, bitrate: u32) -> Result<(), CanError> {
        self.bitrate = Some(bitrate);
        trace!(
            "SocketCAN interface '{}' expects {} bps (bitrate set externally)",
            self.interface, bitrate
        );
        Ok(())
    }

    fn to_can_frame(frame: &BajaFrame) -> Result<CanFrame, CanError> {
        let data = frame.data_slice();
        let can_frame = if frame.is_extended {
            ExtendedId::new(frame.id).and_then(|id| CanFrame::new(id, data))
        } else {
            u16::try_from(frame.id)
                .ok()
                .and_then(StandardId::new)
                .and_then(|id| CanFrame::new(id, data))
        };
        can_frame.ok_or_else(|| {
            CanError::Device(CanDeviceError::new(
                CanDeviceErrorKind::InvalidFrame,
                format!("Failed to create frame with ID 0x{:X}", frame.id),
            ))
        })
    }
}

impl CanAdapter for SocketCanAdapter {
    /// 发送（Fire-and-Forget）
    ///
    /// 内核发送队列满时返回 `CanError::Io(WouldBlock)`，由调用方记录并跳过。
    fn send(&mut self, frame: BajaFrame) -> Result<(), CanError> {
        let can_frame = Self::to_can_frame(&frame)?;
        self.socket.write_frame(&can_frame).map_err(CanError::Io)?;
        trace!("Sent CAN frame: ID=0x{:X}, len={}", frame.id, frame.len);
        Ok(())
    }

    fn try_receive(&mut self) -> Result<Option<BajaFrame>, CanError> {
        loop {
            let can_frame = match self.socket.read_frame() {
                Ok(frame) => frame,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(None),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(CanError::Io(e)),
            };

            match can_frame {
                CanFrame::Data(_) => {},
                CanFrame::Remote(_) => {
                    trace!("Ignoring remote frame");
                    continue;
                },
                CanFrame::Error(_) => {
                    warn!("Error frame received on '{}'", self.interface);
                    continue;
                },
            }

            let id = can_frame.raw_id() & CAN_ID_MASK;
            let frame = if can_frame.is_extended() {
                BajaFrame::new_extended(id, can_frame.data())
            } else {
                BajaFrame::new_standard(id as u16, can_frame.data())
            };

            trace!("Received CAN frame: ID=0x{:X}, len={}", frame.id, frame.len);
            return Ok(Some(frame));
        }
    }
}
