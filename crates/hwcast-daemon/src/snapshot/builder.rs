//! Turns one sampling pass into a categorized snapshot.

use hwcast_hw::Device;

use super::{Category, DeviceEntry, SensorReading, Snapshot};

/// Builds a snapshot from a backend's device list.
///
/// Devices keep their input order within each category. Devices whose class
/// belongs to no category are left out.
pub fn build(devices: &[Device]) -> Snapshot {
    let mut snapshot = Snapshot::default();
    for device in devices {
        let category = match Category::of(device.class) {
            Some(category) => category,
            None => continue,
        };
        snapshot.group_mut(category).push(DeviceEntry {
            name: device.name.clone(),
            readings: device.sensors.iter().map(SensorReading::from).collect(),
        });
    }
    snapshot
}
