//! hwmon chip enumeration.
//!
//! Every `/sys/class/hwmon/hwmonN` directory is one chip. Chips are mapped to
//! a hardware class by their `name` file; CPU thermal chips are folded into
//! the CPU device by the caller.

use std::path::Path;

use super::{list_dir, read_i64, read_trimmed};
use crate::{Device, HardwareClass, Result, Sensor, SensorKind};

/// What a chip contributes to the device list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ChipRole {
    /// Sensors belong to the CPU device.
    Cpu,
    /// Chip is a device of its own.
    Device(HardwareClass),
}

/// A chip and the readings taken from it this pass.
#[derive(Debug, Clone)]
pub(super) struct Chip {
    pub name: String,
    pub tag: String,
    pub role: ChipRole,
    pub sensors: Vec<Sensor>,
}

impl Chip {
    pub(super) fn to_device(&self, class: HardwareClass) -> Device {
        Device {
            name: format!("{} ({})", self.name, self.tag),
            class,
            sensors: self.sensors.clone(),
        }
    }
}

fn role_for(chip_name: &str) -> ChipRole {
    match chip_name {
        "coretemp" | "k10temp" | "zenpower" | "cpu_thermal" => ChipRole::Cpu,
        "amdgpu" | "radeon" => ChipRole::Device(HardwareClass::GpuAmd),
        "nouveau" | "nvidia" => ChipRole::Device(HardwareClass::GpuNvidia),
        "i915" | "xe" => ChipRole::Device(HardwareClass::GpuIntel),
        "nvme" | "drivetemp" => ChipRole::Device(HardwareClass::Storage),
        name if name.starts_with("BAT") => ChipRole::Device(HardwareClass::Battery),
        "dell_smm" | "thinkpad" | "asus_ec_sensors" => {
            ChipRole::Device(HardwareClass::EmbeddedController)
        }
        "corsairpsu" => ChipRole::Device(HardwareClass::Psu),
        "kraken2" | "kraken3" | "nzxt_smart2" => ChipRole::Device(HardwareClass::Cooler),
        name if name.starts_with("nct") || name.starts_with("it87") => {
            ChipRole::Device(HardwareClass::SuperIo)
        }
        _ => ChipRole::Device(HardwareClass::Motherboard),
    }
}

/// Reads every hwmon chip below `root`.
pub(super) fn read_chips(root: &Path) -> Result<Vec<Chip>> {
    let hwmon_dir = root.join("sys/class/hwmon");
    let mut chips = Vec::new();
    for tag in list_dir(&hwmon_dir)? {
        let dir = hwmon_dir.join(&tag);
        let name = read_trimmed(&dir.join("name")).unwrap_or_else(|_| "unknown".to_string());
        let sensors = read_sensors(&dir);
        chips.push(Chip {
            role: role_for(&name),
            name,
            tag,
            sensors,
        });
    }
    Ok(chips)
}

/// Input file prefix, sensor kind and the divisor from sysfs units.
const INPUTS: [(&str, &str, SensorKind, f32); 5] = [
    ("temp", "_input", SensorKind::Temperature, 1000.0),
    ("fan", "_input", SensorKind::Fan, 1.0),
    ("in", "_input", SensorKind::Voltage, 1000.0),
    ("power", "_average", SensorKind::Power, 1_000_000.0),
    ("power", "_input", SensorKind::Power, 1_000_000.0),
];

fn read_sensors(dir: &Path) -> Vec<Sensor> {
    let files = match list_dir(dir) {
        Ok(files) => files,
        Err(_) => return Vec::new(),
    };

    let mut sensors = Vec::new();
    for (prefix, suffix, kind, divisor) in INPUTS {
        let mut indices: Vec<usize> = files
            .iter()
            .filter_map(|f| extract_index(f, prefix, suffix))
            .collect();
        indices.sort_unstable();
        for index in indices {
            let label = read_trimmed(&dir.join(format!("{}{}_label", prefix, index)))
                .unwrap_or_else(|_| format!("{}{}", prefix, index));
            // Some chips expose both power average and input
            if kind == SensorKind::Power && sensors.iter().any(|s: &Sensor| s.name == label) {
                continue;
            }
            let value = read_i64(&dir.join(format!("{}{}{}", prefix, index, suffix)))
                .ok()
                .map(|raw| raw as f32 / divisor);
            sensors.push(Sensor::new(label, kind, value));
        }
    }

    let mut pwms: Vec<usize> = files
        .iter()
        .filter_map(|f| extract_index(f, "pwm", ""))
        .collect();
    pwms.sort_unstable();
    for index in pwms {
        let value = read_i64(&dir.join(format!("pwm{}", index)))
            .ok()
            .map(|raw| raw as f32 * 100.0 / 255.0);
        sensors.push(Sensor::new(format!("pwm{}", index), SensorKind::Control, value));
    }

    sensors
}

/// Extracts N from names like `temp3_input` (prefix `temp`, suffix `_input`).
fn extract_index(name: &str, prefix: &str, suffix: &str) -> Option<usize> {
    name.strip_prefix(prefix)?
        .strip_suffix(suffix)?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{populate, write};
    use super::*;

    #[test]
    fn test_extract_index() {
        assert_eq!(extract_index("temp3_input", "temp", "_input"), Some(3));
        assert_eq!(extract_index("pwm2", "pwm", ""), Some(2));
        assert_eq!(extract_index("pwm2_enable", "pwm", ""), None);
        assert_eq!(extract_index("temp3_label", "temp", "_input"), None);
    }

    #[test]
    fn test_roles() {
        assert_eq!(role_for("k10temp"), ChipRole::Cpu);
        assert_eq!(role_for("amdgpu"), ChipRole::Device(HardwareClass::GpuAmd));
        assert_eq!(role_for("i915"), ChipRole::Device(HardwareClass::GpuIntel));
        assert_eq!(role_for("nct6798"), ChipRole::Device(HardwareClass::SuperIo));
        assert_eq!(role_for("acpitz"), ChipRole::Device(HardwareClass::Motherboard));
    }

    #[test]
    fn test_read_gpu_chip() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path());
        let chips = read_chips(dir.path()).unwrap();
        let gpu = chips.iter().find(|c| c.name == "amdgpu").unwrap();
        assert_eq!(gpu.tag, "hwmon1");

        let edge = &gpu.sensors[0];
        assert_eq!(edge.name, "edge");
        assert_eq!(edge.value, Some(48.0));

        let fan = gpu.sensors.iter().find(|s| s.kind == SensorKind::Fan).unwrap();
        assert_eq!(fan.value, Some(1200.0));
        let power = gpu.sensors.iter().find(|s| s.kind == SensorKind::Power).unwrap();
        assert_eq!(power.value, Some(35.0));
        let pwm = gpu.sensors.iter().find(|s| s.kind == SensorKind::Control).unwrap();
        assert_eq!(pwm.value, Some(100.0));

        assert_eq!(gpu.to_device(HardwareClass::GpuAmd).name, "amdgpu (hwmon1)");
    }

    #[test]
    fn test_unreadable_input_has_no_value() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "sys/class/hwmon/hwmon0/name", "acpitz\n");
        write(dir.path(), "sys/class/hwmon/hwmon0/temp1_input", "garbage\n");
        let chips = read_chips(dir.path()).unwrap();
        assert_eq!(chips[0].sensors[0].name, "temp1");
        assert_eq!(chips[0].sensors[0].value, None);
    }
}
