//! Memory usage collector.

use std::path::Path;

use super::{bytes_to_gb, read_trimmed};
use crate::{Device, Error, HardwareClass, Result, SensorKind};

/// Reads `/proc/meminfo` into a single memory device.
pub(super) fn sample(root: &Path) -> Result<Device> {
    let path = root.join("proc/meminfo");
    let content = read_trimmed(&path)?;

    let total_kb = field_kb(&content, "MemTotal:").ok_or_else(|| Error::Malformed {
        path: path.clone(),
        reason: "missing MemTotal".to_string(),
    })?;
    let available_kb = field_kb(&content, "MemAvailable:")
        .or_else(|| field_kb(&content, "MemFree:"))
        .ok_or_else(|| Error::Malformed {
            path,
            reason: "missing MemAvailable".to_string(),
        })?;

    let used_kb = total_kb.saturating_sub(available_kb);
    let load = if total_kb > 0 {
        Some((100.0 * used_kb as f64 / total_kb as f64) as f32)
    } else {
        None
    };

    Ok(Device::new("Generic Memory", HardwareClass::Memory)
        .with_sensor("Memory", SensorKind::Load, load)
        .with_sensor("Memory Used", SensorKind::Data, Some(bytes_to_gb(used_kb * 1024)))
        .with_sensor(
            "Memory Available",
            SensorKind::Data,
            Some(bytes_to_gb(available_kb * 1024)),
        ))
}

fn field_kb(content: &str, key: &str) -> Option<u64> {
    content
        .lines()
        .find(|line| line.starts_with(key))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|value| value.parse().ok())
}
