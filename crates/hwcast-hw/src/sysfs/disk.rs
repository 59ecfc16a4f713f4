//! Block device throughput collector.

use std::collections::HashMap;
use std::path::Path;

use super::{bytes_to_gb, list_dir, read_trimmed, read_u64, RateCounter};
use crate::{Device, HardwareClass, Result, SensorKind};

/// Sectors in `/proc/diskstats` and `/sys/block/*/size` are always 512 bytes.
const SECTOR_SIZE: u64 = 512;

const IGNORED_PREFIXES: [&str; 4] = ["loop", "ram", "zram", "dm-"];

#[derive(Default)]
struct DiskRates {
    read: RateCounter,
    write: RateCounter,
}

/// One storage device per block device, with read/write rates.
pub(super) struct DiskCollector {
    rates: HashMap<String, DiskRates>,
}

impl DiskCollector {
    pub(super) fn new() -> Self {
        Self {
            rates: HashMap::new(),
        }
    }

    pub(super) fn sample(&mut self, root: &Path) -> Result<Vec<Device>> {
        let block_dir = root.join("sys/block");
        let names: Vec<String> = list_dir(&block_dir)?
            .into_iter()
            .filter(|name| !IGNORED_PREFIXES.iter().any(|p| name.starts_with(p)))
            .collect();

        // Fields: major minor name reads_completed reads_merged sectors_read
        //         time_reading writes_completed writes_merged sectors_written ...
        let stats: HashMap<String, (u64, u64)> = read_trimmed(&root.join("proc/diskstats"))
            .map(|content| {
                content
                    .lines()
                    .filter_map(|line| {
                        let parts: Vec<&str> = line.split_whitespace().collect();
                        if parts.len() < 10 {
                            return None;
                        }
                        let read = parts[5].parse().ok()?;
                        let written = parts[9].parse().ok()?;
                        Some((parts[2].to_string(), (read, written)))
                    })
                    .collect()
            })
            .unwrap_or_default();

        self.rates.retain(|name, _| names.contains(name));

        let mut devices = Vec::with_capacity(names.len());
        for name in names {
            let (read_rate, write_rate) = match stats.get(&name) {
                Some(&(read, written)) => {
                    let rates = self.rates.entry(name.clone()).or_default();
                    (
                        rates.read.update(read * SECTOR_SIZE),
                        rates.write.update(written * SECTOR_SIZE),
                    )
                }
                None => (None, None),
            };
            let capacity = read_u64(&block_dir.join(&name).join("size"))
                .ok()
                .map(|sectors| bytes_to_gb(sectors * SECTOR_SIZE));

            devices.push(
                Device::new(name, HardwareClass::Storage)
                    .with_sensor("Read Rate", SensorKind::Throughput, read_rate)
                    .with_sensor("Write Rate", SensorKind::Throughput, write_rate)
                    .with_sensor("Capacity", SensorKind::Data, capacity),
            );
        }
        Ok(devices)
    }
}
