//! CPU load and clock collector.

use std::collections::HashMap;
use std::path::Path;

use super::{list_dir, read_trimmed, read_u64};
use crate::{Device, Error, HardwareClass, Result, SensorKind};

/// Idle and total jiffies for one `cpu` line of `/proc/stat`.
#[derive(Debug, Clone, Copy)]
struct CpuTimes {
    idle: u64,
    total: u64,
}

/// Tracks `/proc/stat` counters between passes to derive load.
pub(super) struct CpuCollector {
    last: HashMap<String, CpuTimes>,
}

impl CpuCollector {
    pub(super) fn new() -> Self {
        Self {
            last: HashMap::new(),
        }
    }

    pub(super) fn sample(&mut self, root: &Path) -> Result<Device> {
        let stat_path = root.join("proc/stat");
        let content = read_trimmed(&stat_path)?;
        let lines: Vec<(String, CpuTimes)> =
            content.lines().filter_map(parse_cpu_line).collect();
        if lines.is_empty() {
            return Err(Error::Malformed {
                path: stat_path,
                reason: "no cpu lines".to_string(),
            });
        }

        let mut device = Device::new(model_name(root), HardwareClass::Cpu);

        for (label, times) in &lines {
            let load = self.load(label, *times);
            let name = match label.strip_prefix("cpu").and_then(|n| n.parse::<usize>().ok()) {
                Some(index) => format!("CPU Core #{}", index + 1),
                None => "CPU Total".to_string(),
            };
            device.sensors.push(crate::Sensor::new(name, SensorKind::Load, load));
        }

        let cpu_dir = root.join("sys/devices/system/cpu");
        if let Ok(entries) = list_dir(&cpu_dir) {
            let mut cores: Vec<usize> = entries
                .iter()
                .filter_map(|e| e.strip_prefix("cpu").and_then(|n| n.parse().ok()))
                .collect();
            cores.sort_unstable();
            for index in cores {
                let freq_path = cpu_dir.join(format!("cpu{}/cpufreq/scaling_cur_freq", index));
                if let Ok(khz) = read_u64(&freq_path) {
                    device.sensors.push(crate::Sensor::new(
                        format!("CPU Core #{}", index + 1),
                        SensorKind::Clock,
                        Some(khz as f32 / 1000.0),
                    ));
                }
            }
        }

        Ok(device)
    }

    /// Returns load percent since the previous pass for this line.
    fn load(&mut self, label: &str, times: CpuTimes) -> Option<f32> {
        let previous = self.last.insert(label.to_string(), times)?;
        let idle_delta = times.idle.saturating_sub(previous.idle);
        let total_delta = times.total.saturating_sub(previous.total);
        if total_delta == 0 {
            return None;
        }
        Some((100.0 * (1.0 - idle_delta as f64 / total_delta as f64)) as f32)
    }
}

fn parse_cpu_line(line: &str) -> Option<(String, CpuTimes)> {
    let mut parts = line.split_whitespace();
    let label = parts.next()?;
    if !label.starts_with("cpu") {
        return None;
    }
    let values: Vec<u64> = parts.filter_map(|s| s.parse().ok()).collect();
    if values.len() < 4 {
        return None;
    }
    // idle + iowait
    let idle = values[3] + values.get(4).copied().unwrap_or(0);
    let total = values.iter().sum();
    Some((label.to_string(), CpuTimes { idle, total }))
}

fn model_name(root: &Path) -> String {
    read_trimmed(&root.join("proc/cpuinfo"))
        .ok()
        .and_then(|content| {
            content.lines().find_map(|line| {
                let (key, value) = line.split_once(':')?;
                (key.trim() == "model name").then(|| value.trim().to_string())
            })
        })
        .unwrap_or_else(|| "Generic CPU".to_string())
}
