//! Device and sensor model produced by sampler backends.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Hardware class reported by a backend for each device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HardwareClass {
    Cpu,
    GpuNvidia,
    GpuAmd,
    GpuIntel,
    Memory,
    Storage,
    Network,
    Motherboard,
    SuperIo,
    Cooler,
    EmbeddedController,
    Psu,
    Battery,
}

impl HardwareClass {
    /// All hardware classes, in declaration order.
    pub const ALL: [HardwareClass; 13] = [
        HardwareClass::Cpu,
        HardwareClass::GpuNvidia,
        HardwareClass::GpuAmd,
        HardwareClass::GpuIntel,
        HardwareClass::Memory,
        HardwareClass::Storage,
        HardwareClass::Network,
        HardwareClass::Motherboard,
        HardwareClass::SuperIo,
        HardwareClass::Cooler,
        HardwareClass::EmbeddedController,
        HardwareClass::Psu,
        HardwareClass::Battery,
    ];

    /// Returns true for any GPU vendor.
    pub fn is_gpu(&self) -> bool {
        matches!(
            self,
            HardwareClass::GpuNvidia | HardwareClass::GpuAmd | HardwareClass::GpuIntel
        )
    }

    fn as_str(&self) -> &'static str {
        match self {
            HardwareClass::Cpu => "cpu",
            HardwareClass::GpuNvidia => "gpu-nvidia",
            HardwareClass::GpuAmd => "gpu-amd",
            HardwareClass::GpuIntel => "gpu-intel",
            HardwareClass::Memory => "memory",
            HardwareClass::Storage => "storage",
            HardwareClass::Network => "network",
            HardwareClass::Motherboard => "motherboard",
            HardwareClass::SuperIo => "super-io",
            HardwareClass::Cooler => "cooler",
            HardwareClass::EmbeddedController => "embedded-controller",
            HardwareClass::Psu => "psu",
            HardwareClass::Battery => "battery",
        }
    }
}

impl FromStr for HardwareClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.to_lowercase().replace('_', "-");
        HardwareClass::ALL
            .into_iter()
            .find(|class| class.as_str() == wanted)
            .ok_or_else(|| Error::InvalidClass(s.to_string()))
    }
}

impl std::fmt::Display for HardwareClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sensor category. Serialized as the PascalCase variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    /// Volts.
    Voltage,
    /// Amperes.
    Current,
    /// Watts.
    Power,
    /// MHz.
    Clock,
    /// Degrees Celsius.
    Temperature,
    /// Percent.
    Load,
    /// Hz.
    Frequency,
    /// RPM.
    Fan,
    /// L/h.
    Flow,
    /// Percent duty.
    Control,
    /// Percent.
    Level,
    /// Dimensionless.
    Factor,
    /// GB.
    Data,
    /// MB.
    SmallData,
    /// Bytes per second.
    Throughput,
    /// mWh.
    Energy,
}

impl SensorKind {
    /// Unit of measurement for values of this kind.
    pub fn unit(&self) -> &'static str {
        match self {
            SensorKind::Voltage => "V",
            SensorKind::Current => "A",
            SensorKind::Power => "W",
            SensorKind::Clock => "MHz",
            SensorKind::Temperature => "°C",
            SensorKind::Load | SensorKind::Control | SensorKind::Level => "%",
            SensorKind::Frequency => "Hz",
            SensorKind::Fan => "RPM",
            SensorKind::Flow => "L/h",
            SensorKind::Factor => "",
            SensorKind::Data => "GB",
            SensorKind::SmallData => "MB",
            SensorKind::Throughput => "B/s",
            SensorKind::Energy => "mWh",
        }
    }
}

impl FromStr for SensorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "voltage" => Ok(SensorKind::Voltage),
            "current" => Ok(SensorKind::Current),
            "power" => Ok(SensorKind::Power),
            "clock" => Ok(SensorKind::Clock),
            "temperature" => Ok(SensorKind::Temperature),
            "load" => Ok(SensorKind::Load),
            "frequency" => Ok(SensorKind::Frequency),
            "fan" => Ok(SensorKind::Fan),
            "flow" => Ok(SensorKind::Flow),
            "control" => Ok(SensorKind::Control),
            "level" => Ok(SensorKind::Level),
            "factor" => Ok(SensorKind::Factor),
            "data" => Ok(SensorKind::Data),
            "smalldata" | "small-data" => Ok(SensorKind::SmallData),
            "throughput" => Ok(SensorKind::Throughput),
            "energy" => Ok(SensorKind::Energy),
            _ => Err(Error::InvalidKind(s.to_string())),
        }
    }
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A single named sensor on a device.
#[derive(Debug, Clone, PartialEq)]
pub struct Sensor {
    pub name: String,
    pub kind: SensorKind,
    /// Current value; `None` when the sensor has no reading yet.
    pub value: Option<f32>,
}

impl Sensor {
    pub fn new(name: impl Into<String>, kind: SensorKind, value: Option<f32>) -> Self {
        Self {
            name: name.into(),
            kind,
            value,
        }
    }
}

/// A hardware device and its sensors as of one sampling pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub name: String,
    pub class: HardwareClass,
    pub sensors: Vec<Sensor>,
}

impl Device {
    pub fn new(name: impl Into<String>, class: HardwareClass) -> Self {
        Self {
            name: name.into(),
            class,
            sensors: Vec::new(),
        }
    }

    /// Adds a sensor, builder style.
    pub fn with_sensor(
        mut self,
        name: impl Into<String>,
        kind: SensorKind,
        value: Option<f32>,
    ) -> Self {
        self.sensors.push(Sensor::new(name, kind, value));
        self
    }
}
