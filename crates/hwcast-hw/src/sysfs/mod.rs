//! Linux sampler backend reading `/proc` and `/sys`.
//!
//! All paths are resolved against a configurable root so the backend can be
//! pointed at a copy of the kernel interface tree.

mod cpu;
mod disk;
mod hwmon;
mod memory;
mod network;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use crate::{Device, Error, HardwareClass, Result, SamplerBackend};
use cpu::CpuCollector;
use disk::DiskCollector;
use hwmon::ChipRole;
use network::NetworkCollector;

/// Sampler backend for Linux kernel interfaces.
pub struct SysfsBackend {
    root: PathBuf,
    cpu: CpuCollector,
    disks: DiskCollector,
    network: NetworkCollector,
    closed: bool,
}

impl SysfsBackend {
    /// Creates a backend reading `proc/` and `sys/` below `root`.
    pub fn with_root<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        info!("Sysfs sampler reading from {}", root.display());
        Self {
            root,
            cpu: CpuCollector::new(),
            disks: DiskCollector::new(),
            network: NetworkCollector::new(),
            closed: false,
        }
    }
}

impl SamplerBackend for SysfsBackend {
    fn sample(&mut self) -> Result<Vec<Device>> {
        if self.closed {
            return Err(Error::Closed);
        }

        let mut devices = Vec::new();
        let mut first_error: Option<Error> = None;
        let mut note = |what: &str, e: Error| {
            debug!("Skipping {} this pass: {}", what, e);
            if first_error.is_none() {
                first_error = Some(e);
            }
        };

        let chips = match hwmon::read_chips(&self.root) {
            Ok(chips) => chips,
            Err(e) => {
                note("hwmon", e);
                Vec::new()
            }
        };

        match self.cpu.sample(&self.root) {
            Ok(mut cpu) => {
                for chip in chips.iter().filter(|c| c.role == ChipRole::Cpu) {
                    cpu.sensors.extend(chip.sensors.iter().cloned());
                }
                devices.push(cpu);
            }
            Err(e) => note("cpu", e),
        }

        for chip in chips.iter() {
            if let ChipRole::Device(class) = chip.role {
                if class.is_gpu() {
                    devices.push(chip.to_device(class));
                }
            }
        }

        match memory::sample(&self.root) {
            Ok(device) => devices.push(device),
            Err(e) => note("memory", e),
        }

        match self.disks.sample(&self.root) {
            Ok(mut disks) => {
                for chip in chips.iter() {
                    if chip.role == ChipRole::Device(HardwareClass::Storage) {
                        disks.push(chip.to_device(HardwareClass::Storage));
                    }
                }
                devices.extend(disks);
            }
            Err(e) => note("storage", e),
        }

        match self.network.sample(&self.root) {
            Ok(nics) => devices.extend(nics),
            Err(e) => note("network", e),
        }

        for chip in chips.iter() {
            if let ChipRole::Device(class) = chip.role {
                if !class.is_gpu() && class != HardwareClass::Storage {
                    devices.push(chip.to_device(class));
                }
            }
        }

        if devices.is_empty() {
            if let Some(e) = first_error {
                return Err(e);
            }
        }
        Ok(devices)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            info!("Sysfs sampler closed");
        }
    }
}

/// Per-counter rate tracking across sampling passes.
#[derive(Debug, Default)]
pub(crate) struct RateCounter {
    last: Option<(u64, Instant)>,
}

impl RateCounter {
    /// Records a new counter value and returns the rate per second since the
    /// previous one, or `None` on the first observation.
    pub(crate) fn update(&mut self, value: u64) -> Option<f32> {
        let now = Instant::now();
        let rate = self.last.and_then(|(last_value, last_time)| {
            let elapsed = now.duration_since(last_time).as_secs_f64();
            if elapsed > 0.0 {
                Some((value.saturating_sub(last_value) as f64 / elapsed) as f32)
            } else {
                None
            }
        });
        self.last = Some((value, now));
        rate
    }
}

pub(crate) fn read_trimmed(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| Error::read(path, e))
}

pub(crate) fn read_u64(path: &Path) -> Result<u64> {
    let content = read_trimmed(path)?;
    content.parse().map_err(|_| Error::Malformed {
        path: path.to_path_buf(),
        reason: format!("expected an integer, got {:?}", content),
    })
}

pub(crate) fn read_i64(path: &Path) -> Result<i64> {
    let content = read_trimmed(path)?;
    content.parse().map_err(|_| Error::Malformed {
        path: path.to_path_buf(),
        reason: format!("expected an integer, got {:?}", content),
    })
}

/// Lists directory entry names, sorted.
pub(crate) fn list_dir(path: &Path) -> Result<Vec<String>> {
    let mut names: Vec<String> = fs::read_dir(path)
        .map_err(|e| Error::read(path, e))?
        .flatten()
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    Ok(names)
}

/// Bytes to gigabytes, as reported by Data sensors.
pub(crate) fn bytes_to_gb(bytes: u64) -> f32 {
    (bytes as f64 / (1024.0 * 1024.0 * 1024.0)) as f32
}
