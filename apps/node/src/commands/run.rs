//! 运行命令
//!
//! 启动节点 IO 线程，主线程按固定周期打印共享状态与总线统计，直到 Ctrl+C。

use super::NodeArgs;
use crate::status;
use anyhow::{Context, Result, bail};
use baja_driver::{Node, NodeConfig};
use clap::Args;
use spin_sleep::SpinSleeper;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// 主循环检查退出标志的间隔
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// 运行命令参数
#[derive(Args, Debug)]
pub struct RunCommand {
    #[command(flatten)]
    pub node: NodeArgs,

    /// 状态输出周期（毫秒，0 表示不输出）
    #[arg(long, default_value_t = 1000)]
    pub status_ms: u64,

    /// 只输出自上次输出以来有更新的变量
    #[arg(long)]
    pub changed_only: bool,
}

impl RunCommand {
    pub fn execute(&self) -> Result<()> {
        let config = self.node.resolve()?;
        info!(
            "Starting {} node on {} ({} bps, every {} ms)",
            config.role, config.interface, config.bitrate, config.transmit_interval_ms
        );

        let node = match open_node(config) {
            Ok(node) => node,
            Err(e) => {
                error!("Node halted during startup: {:#}", e);
                return Err(e);
            },
        };
        info!("Node running, owned ids: {:?}", node.owned_ids());

        let running = Arc::new(AtomicBool::new(true));
        let r = running.clone();
        ctrlc::set_handler(move || {
            r.store(false, Ordering::SeqCst);
        })
        .context("Failed to set signal handler")?;

        let result = self.supervise(&node, &running);

        let metrics = node.metrics();
        drop(node);
        info!(
            "Final bus counters: rx={} tx={} tx_failures={} device_errors={}",
            metrics.rx_frames_total,
            metrics.tx_frames_total,
            metrics.tx_failures,
            metrics.device_errors
        );
        result
    }

    fn supervise(&self, node: &Node, running: &AtomicBool) -> Result<()> {
        let sleeper = SpinSleeper::default();
        let period = Duration::from_millis(self.status_ms);
        let mut next_report = Instant::now() + period;

        while running.load(Ordering::SeqCst) {
            if !node.is_healthy() {
                error!("Bus I/O stopped unexpectedly (phase: {:?})", node.phase());
                bail!("bus I/O thread is no longer running");
            }

            if self.status_ms > 0 {
                let now = Instant::now();
                if now >= next_report {
                    self.report(node);
                    next_report = now + period;
                }
            }

            sleeper.sleep(POLL_INTERVAL);
        }

        info!("Received interrupt signal, shutting down");
        Ok(())
    }

    fn report(&self, node: &Node) {
        let lines = if self.changed_only {
            status::drain_fresh(node.schema(), node.state(), node.role())
        } else {
            status::render(node.schema(), node.state(), node.role())
        };
        for line in lines {
            info!("{}", line);
        }

        let metrics = node.metrics();
        info!("{}", status::render_metrics(&metrics));
        if metrics.device_errors > 0 {
            warn!("{} receive errors reported by the CAN device", metrics.device_errors);
        }
    }
}

#[cfg(all(target_os = "linux", feature = "socketcan"))]
fn open_node(config: NodeConfig) -> Result<Node> {
    let interface = config.interface.clone();
    baja_driver::NodeBuilder::new()
        .config(config)
        .build()
        .with_context(|| format!("Failed to start node on {}", interface))
}

#[cfg(not(all(target_os = "linux", feature = "socketcan")))]
fn open_node(config: NodeConfig) -> Result<Node> {
    bail!(
        "SocketCAN is not available in this build, cannot open {}",
        config.interface
    )
}
