//! 状态输出格式化
//!
//! 本角色拥有的变量以 `*` 标记，从未更新过的变量标记为 `(default)`。

use baja_driver::{MetricsSnapshot, SharedStateTable};
use baja_protocol::{Schema, Subsystem, Value, VariableDescriptor};

fn line(descriptor: &VariableDescriptor, value: Value, owned: bool, default: bool) -> String {
    let mut text = format!(
        "{} {:<28} = {}",
        if owned { '*' } else { ' ' },
        descriptor.name,
        value
    );
    if !descriptor.unit.is_empty() {
        text.push(' ');
        text.push_str(descriptor.unit);
    }
    if default {
        text.push_str(" (default)");
    }
    text
}

/// 全部变量的当前值
pub fn render(schema: &Schema, state: &SharedStateTable, role: Subsystem) -> Vec<String> {
    let owned = schema.ownership().owned_by(role);
    schema
        .registry()
        .descriptors()
        .filter_map(|d| {
            let sample = state.sample(d.id)?;
            Some(line(d, sample.value, owned.contains(&d.id), sample.is_default()))
        })
        .collect()
}

/// 自上次调用以来有更新的变量（读取即清除新鲜标志）
pub fn drain_fresh(schema: &Schema, state: &SharedStateTable, role: Subsystem) -> Vec<String> {
    let owned = schema.ownership().owned_by(role);
    schema
        .registry()
        .descriptors()
        .filter_map(|d| {
            let value = state.take_fresh(d.id)?;
            Some(line(d, value, owned.contains(&d.id), false))
        })
        .collect()
}

pub fn render_metrics(m: &MetricsSnapshot) -> String {
    format!(
        "bus: rx={} stored={} unknown={} decode_failures={} ({:.1}%) | tx={} failures={} cycles={} | device_errors={}",
        m.rx_frames_total,
        m.rx_stored,
        m.rx_unknown_ids,
        m.rx_decode_failures,
        m.decode_failure_rate(),
        m.tx_frames_total,
        m.tx_failures,
        m.tx_cycles,
        m.device_errors,
    )
}
