//! Builder 模式实现
//!
//! 提供链式构造 `Node` 实例的便捷方式。启动顺序：
//!
//! 1. 校验配置
//! 2. 校验协议模式（重复 ID、所有权冲突在此暴露，早于任何总线操作）
//! 3. 打开总线适配器（失败即 `DriverError::BusInit`，节点进入 Halted）
//! 4. 启动 IO 线程

use crate::clock::{MillisClock, TimeSource};
use crate::config::NodeConfig;
use crate::dispatch::ReceiveDispatcher;
use crate::error::DriverError;
use crate::metrics::BusMetrics;
use crate::node::{Node, NodeInfo};
use crate::phase::AtomicBusPhase;
use crate::pipeline::BusService;
use crate::scheduler::TransmitScheduler;
use crate::state::SharedStateTable;
use baja_can::{CanAdapter, CanError};
use baja_protocol::{Schema, Subsystem};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

/// Node Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use baja_driver::NodeBuilder;
/// use baja_protocol::Subsystem;
/// use std::time::Duration;
///
/// let node = NodeBuilder::new()
///     .interface("can0")
///     .role(Subsystem::Cvt)
///     .transmit_interval(Duration::from_millis(100))
///     .build()
///     .unwrap();
///
/// node.set(baja_protocol::ids::ID_PRIMARY_RPM, 3150i64).unwrap();
/// ```
pub struct NodeBuilder {
    config: NodeConfig,
    schema: Option<Schema>,
    phase: Arc<AtomicBusPhase>,
}

impl NodeBuilder {
    /// 创建新的 Builder（默认配置见 [`NodeConfig::default`]）
    pub fn new() -> Self {
        Self {
            config: NodeConfig::default(),
            schema: None,
            phase: Arc::new(AtomicBusPhase::default()),
        }
    }

    /// 使用完整配置（覆盖之前的单项设置）
    pub fn config(mut self, config: NodeConfig) -> Self {
        self.config = config;
        self
    }

    /// 设置 CAN 接口（默认 "can0"）
    pub fn interface(mut self, interface: impl Into<String>) -> Self {
        self.config.interface = interface.into();
        self
    }

    /// 设置 CAN 波特率（默认 1M）
    pub fn bitrate(mut self, bitrate: u32) -> Self {
        self.config.bitrate = bitrate;
        self
    }

    /// 设置节点角色（默认基站）
    pub fn role(mut self, role: Subsystem) -> Self {
        self.config.role = role;
        self
    }

    /// 设置发送周期（默认 100ms，毫秒精度）
    pub fn transmit_interval(mut self, interval: Duration) -> Self {
        self.config.transmit_interval_ms = interval.as_millis() as u64;
        self
    }

    /// 使用自定义协议模式（默认整车表 [`Schema::fleet`]）
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// 阶段指示句柄
    ///
    /// 构造失败时节点对象不存在，可通过此句柄观察到 `Halted`。
    pub fn phase_handle(&self) -> Arc<AtomicBusPhase> {
        self.phase.clone()
    }

    /// 当前配置
    pub fn current_config(&self) -> &NodeConfig {
        &self.config
    }

    /// 打开 SocketCAN 接口并启动节点
    #[cfg(all(target_os = "linux", feature = "socketcan"))]
    pub fn build(self) -> Result<Node, DriverError> {
        use baja_can::SocketCanAdapter;

        self.build_with_opener(|interface, bitrate| {
            let mut adapter = SocketCanAdapter::new(interface)?;
            adapter.configure(bitrate)?;
            Ok(adapter)
        })
    }

    /// 使用已打开的适配器启动节点
    pub fn build_with_adapter<A>(self, adapter: A) -> Result<Node, DriverError>
    where
        A: CanAdapter + Send + 'static,
    {
        self.build_with_opener(move |_, _| Ok(adapter))
    }

    /// 使用自定义打开函数启动节点
    ///
    /// `open(interface, bitrate)` 的任何错误都映射为 `DriverError::BusInit`。
    pub fn build_with_opener<A, F>(self, open: F) -> Result<Node, DriverError>
    where
        A: CanAdapter + Send + 'static,
        F: FnOnce(&str, u32) -> Result<A, CanError>,
    {
        self.build_inner(open, MillisClock::new())
    }

    /// 使用自定义时间源启动节点（发送周期的单位与时间源一致）
    pub fn build_with_clock<A, C>(self, adapter: A, clock: C) -> Result<Node, DriverError>
    where
        A: CanAdapter + Send + 'static,
        C: TimeSource + 'static,
    {
        self.build_inner(move |_, _| Ok(adapter), clock)
    }

    fn build_inner<A, C, F>(self, open: F, clock: C) -> Result<Node, DriverError>
    where
        A: CanAdapter + Send + 'static,
        C: TimeSource + 'static,
        F: FnOnce(&str, u32) -> Result<A, CanError>,
    {
        let phase = self.phase.clone();
        let result = self.start(open, clock);
        if let Err(e) = &result {
            error!("Node failed to start, halting: {}", e);
            phase.halt();
        }
        result
    }

    fn start<A, C, F>(self, open: F, clock: C) -> Result<Node, DriverError>
    where
        A: CanAdapter + Send + 'static,
        C: TimeSource + 'static,
        F: FnOnce(&str, u32) -> Result<A, CanError>,
    {
        let NodeBuilder {
            config,
            schema,
            phase,
        } = self;

        // 1. 配置
        config.validate()?;
        let range = clock.range();
        if range != 0 && config.transmit_interval_ms >= range {
            return Err(DriverError::Config(format!(
                "transmit interval {} exceeds clock range {}",
                config.transmit_interval_ms, range
            )));
        }

        // 2. 协议模式
        let schema = Arc::new(match schema {
            Some(schema) => schema,
            None => Schema::fleet()?,
        });

        // 3. 总线
        let adapter =
            open(&config.interface, config.bitrate).map_err(|source| DriverError::BusInit {
                interface: config.interface.clone(),
                source,
            })?;

        // 4. 总线服务
        let state = Arc::new(SharedStateTable::from_registry(schema.registry()));
        let metrics = Arc::new(BusMetrics::new());
        let dispatcher = ReceiveDispatcher::new(schema.clone(), state.clone(), metrics.clone());
        let scheduler =
            TransmitScheduler::new(config.role, schema.clone(), state.clone(), metrics.clone());
        let service = BusService::new(
            adapter,
            dispatcher,
            scheduler,
            clock,
            config.transmit_interval_ms,
            metrics.clone(),
        )
        .with_phase(phase.clone());

        Node::spawn(
            service,
            NodeInfo {
                role: config.role,
                interface: config.interface,
                bitrate: config.bitrate,
                schema,
                state,
                metrics,
                phase,
            },
        )
    }
}

impl Default for NodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::phase::BusPhase;
    use baja_can::{CanDeviceError, CanDeviceErrorKind, MockCanAdapter};
    use baja_protocol::{CodecRegistry, IntCodec, OwnershipTable, Value, VariableDescriptor};
    use std::sync::atomic::Ordering;

    #[test]
    fn test_builder_chaining() {
        let builder = NodeBuilder::new()
            .interface("vcan0")
            .bitrate(500_000)
            .role(Subsystem::Pedals)
            .transmit_interval(Duration::from_millis(20));

        let config = builder.current_config();
        assert_eq!(config.interface, "vcan0");
        assert_eq!(config.bitrate, 500_000);
        assert_eq!(config.role, Subsystem::Pedals);
        assert_eq!(config.transmit_interval_ms, 20);
    }

    #[test]
    fn test_bus_init_failure_halts() {
        let builder = NodeBuilder::new().interface("can9");
        let phase = builder.phase_handle();

        let result = builder.build_with_opener(|interface, _| -> Result<MockCanAdapter, _> {
            Err(CanError::Device(CanDeviceError::new(
                CanDeviceErrorKind::NotFound,
                format!("{} missing", interface),
            )))
        });

        match result {
            Err(DriverError::BusInit { interface, .. }) => assert_eq!(interface, "can9"),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("expected BusInit failure"),
        }
        assert_eq!(phase.get(Ordering::Acquire), BusPhase::Halted);
    }

    #[test]
    fn test_config_error_surfaces_before_bus() {
        let mut opened = false;
        let result = NodeBuilder::new()
            .transmit_interval(Duration::ZERO)
            .build_with_opener(|_, _| {
                opened = true;
                Ok(MockCanAdapter::new())
            });

        assert!(matches!(result, Err(DriverError::Config(_))));
        assert!(!opened);
    }

    #[test]
    fn test_interval_beyond_counter_range_is_rejected() {
        let builder = NodeBuilder::new().transmit_interval(Duration::from_millis(1 << 32));
        let phase = builder.phase_handle();

        let result = builder.build_with_adapter(MockCanAdapter::new());

        assert!(matches!(result, Err(DriverError::Config(_))));
        assert!(phase.get(Ordering::Acquire).is_halted());
    }

    #[test]
    fn test_interval_beyond_custom_clock_range_is_rejected() {
        let result = NodeBuilder::new()
            .transmit_interval(Duration::from_millis(1000))
            .build_with_clock(MockCanAdapter::new(), ManualClock::new(0, 1000));

        assert!(matches!(result, Err(DriverError::Config(_))));
    }

    #[test]
    fn test_custom_schema() {
        let mut registry = CodecRegistry::new();
        registry
            .register(VariableDescriptor::new(
                0x7A0,
                "spare",
                "",
                IntCodec::i32(),
                Value::Integer(-1),
            ))
            .unwrap();
        let mut ownership = OwnershipTable::new();
        ownership.assign(Subsystem::Das, &[0x7A0]).unwrap();

        let node = NodeBuilder::new()
            .role(Subsystem::Das)
            .schema(Schema::new(registry, ownership).unwrap())
            .build_with_adapter(MockCanAdapter::new())
            .unwrap();

        assert_eq!(node.state().len(), 1);
        assert_eq!(node.get(0x7A0), Some(Value::Integer(-1)));
        assert_eq!(node.owned_ids(), &[0x7A0]);
    }

    #[cfg(all(target_os = "linux", feature = "socketcan"))]
    #[test]
    fn test_build_missing_interface_is_bus_init() {
        let builder = NodeBuilder::new().interface("bajamissing0");
        let phase = builder.phase_handle();

        let err = builder.build().err().unwrap();
        assert!(err.is_bus_init(), "unexpected error: {}", err);
        assert!(phase.get(Ordering::Acquire).is_halted());
    }
}
