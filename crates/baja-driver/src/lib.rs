//! 驱动层模块
//!
//! 本模块提供子系统节点的运行时，包括：
//! - 共享状态表（ArcSwap 无锁读写）
//! - 接收分发器（解码任意入站帧并写入共享状态表）
//! - 角色发送调度器（按固定周期发送本角色拥有的变量）
//! - 总线服务循环与 IO 线程管理
//!
//! # 使用场景
//!
//! ```no_run
//! use baja_driver::NodeBuilder;
//! use baja_protocol::{Subsystem, ids::ID_PRIMARY_RPM};
//!
//! let node = NodeBuilder::new().role(Subsystem::Dashboard).build().unwrap();
//! if let Some(rpm) = node.get(ID_PRIMARY_RPM) {
//!     println!("primary rpm = {}", rpm);
//! }
//! ```

mod builder;
pub mod clock;
pub mod config;
pub mod dispatch;
mod error;
pub mod metrics;
mod node;
pub mod phase;
pub mod pipeline;
pub mod scheduler;
pub mod state;

pub use builder::NodeBuilder;
pub use clock::{ManualClock, MillisClock, ScheduleClock, TimeSource, elapsed_ticks};
pub use config::NodeConfig;
pub use dispatch::{DispatchOutcome, ReceiveDispatcher};
pub use error::DriverError;
pub use metrics::{BusMetrics, MetricsSnapshot};
pub use node::{IO_THREAD_NAME, Node};
pub use phase::{AtomicBusPhase, BusPhase};
pub use pipeline::{BusService, StepReport};
pub use scheduler::{TickReport, TransmitScheduler};
pub use state::{Sample, SharedStateTable, monotonic_micros};
