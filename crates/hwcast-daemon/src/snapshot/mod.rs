//! Categorized hardware snapshot and its JSON wire format.

mod builder;
mod store;

pub use builder::build;
pub use store::SnapshotStore;

use hwcast_hw::{HardwareClass, Sensor, SensorKind};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One of the five device groups in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Cpu,
    Gpu,
    Memory,
    Storage,
    Network,
}

impl Category {
    #[cfg(test)]
    pub(crate) const ALL: [Category; 5] = [
        Category::Cpu,
        Category::Gpu,
        Category::Memory,
        Category::Storage,
        Category::Network,
    ];

    /// Maps a hardware class to its group. All GPU vendors share `Gpu`;
    /// classes outside the five groups map to `None`.
    pub fn of(class: HardwareClass) -> Option<Category> {
        match class {
            HardwareClass::Cpu => Some(Category::Cpu),
            HardwareClass::GpuNvidia | HardwareClass::GpuAmd | HardwareClass::GpuIntel => {
                Some(Category::Gpu)
            }
            HardwareClass::Memory => Some(Category::Memory),
            HardwareClass::Storage => Some(Category::Storage),
            HardwareClass::Network => Some(Category::Network),
            _ => None,
        }
    }
}

/// Error returned when parsing an unknown category name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cpu" => Ok(Category::Cpu),
            "gpu" => Ok(Category::Gpu),
            "memory" => Ok(Category::Memory),
            "storage" => Ok(Category::Storage),
            "network" => Ok(Category::Network),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Cpu => write!(f, "cpu"),
            Category::Gpu => write!(f, "gpu"),
            Category::Memory => write!(f, "memory"),
            Category::Storage => write!(f, "storage"),
            Category::Network => write!(f, "network"),
        }
    }
}

/// A single sensor value in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SensorReading {
    pub name: String,
    #[serde(rename = "Type")]
    pub kind: SensorKind,
    #[serde(default, with = "named_float")]
    pub value: Option<f32>,
}

impl From<&Sensor> for SensorReading {
    fn from(sensor: &Sensor) -> Self {
        Self {
            name: sensor.name.clone(),
            kind: sensor.kind,
            value: sensor.value,
        }
    }
}

/// A device and its readings in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceEntry {
    pub name: String,
    #[serde(rename = "Sensors")]
    pub readings: Vec<SensorReading>,
}

/// Readings from one poll cycle, grouped by category.
///
/// Never mutated after construction; the store replaces it wholesale.
/// Field names on the wire are PascalCase (`Cpu`, `Name`, `Sensors`, `Type`,
/// `Value`) to stay compatible with existing dashboards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Snapshot {
    #[serde(default)]
    pub cpu: Vec<DeviceEntry>,
    #[serde(default)]
    pub gpu: Vec<DeviceEntry>,
    #[serde(default)]
    pub memory: Vec<DeviceEntry>,
    #[serde(default)]
    pub storage: Vec<DeviceEntry>,
    #[serde(default)]
    pub network: Vec<DeviceEntry>,
}

impl Snapshot {
    /// Returns the devices in one category.
    pub fn category(&self, category: Category) -> &[DeviceEntry] {
        match category {
            Category::Cpu => &self.cpu,
            Category::Gpu => &self.gpu,
            Category::Memory => &self.memory,
            Category::Storage => &self.storage,
            Category::Network => &self.network,
        }
    }

    fn group_mut(&mut self, category: Category) -> &mut Vec<DeviceEntry> {
        match category {
            Category::Cpu => &mut self.cpu,
            Category::Gpu => &mut self.gpu,
            Category::Memory => &mut self.memory,
            Category::Storage => &mut self.storage,
            Category::Network => &mut self.network,
        }
    }

    /// Total number of devices across all categories.
    #[cfg(test)]
    pub(crate) fn device_count(&self) -> usize {
        Category::ALL.iter().map(|c| self.category(*c).len()).sum()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.device_count() == 0
    }
}

/// Serializes `Option<f32>` with non-finite values as the literal strings
/// `"NaN"`, `"Infinity"` and `"-Infinity"`; absent values are `null`.
pub(crate) mod named_float {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    const NAN: &str = "NaN";
    const INFINITY: &str = "Infinity";
    const NEG_INFINITY: &str = "-Infinity";

    pub fn serialize<S>(value: &Option<f32>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            None => serializer.serialize_none(),
            Some(v) if v.is_nan() => serializer.serialize_str(NAN),
            Some(v) if *v == f32::INFINITY => serializer.serialize_str(INFINITY),
            Some(v) if *v == f32::NEG_INFINITY => serializer.serialize_str(NEG_INFINITY),
            Some(v) => serializer.serialize_f32(*v),
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f32),
        Named(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<f32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Repr>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Repr::Number(v)) => Ok(Some(v)),
            Some(Repr::Named(name)) => match name.as_str() {
                NAN => Ok(Some(f32::NAN)),
                INFINITY => Ok(Some(f32::INFINITY)),
                NEG_INFINITY => Ok(Some(f32::NEG_INFINITY)),
                other => Err(D::Error::custom(format!("invalid sensor value: {:?}", other))),
            },
        }
    }
}
