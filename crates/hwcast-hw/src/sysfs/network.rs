//! Network interface throughput collector.

use std::collections::HashMap;
use std::path::Path;

use super::{bytes_to_gb, list_dir, read_u64, RateCounter};
use crate::{Device, HardwareClass, Result, SensorKind};

#[derive(Default)]
struct InterfaceRates {
    rx: RateCounter,
    tx: RateCounter,
}

/// One network device per interface with statistics.
pub(super) struct NetworkCollector {
    rates: HashMap<String, InterfaceRates>,
}

impl NetworkCollector {
    pub(super) fn new() -> Self {
        Self {
            rates: HashMap::new(),
        }
    }

    pub(super) fn sample(&mut self, root: &Path) -> Result<Vec<Device>> {
        let net_dir = root.join("sys/class/net");
        let names: Vec<String> = list_dir(&net_dir)?
            .into_iter()
            // Skip loopback and virtual interfaces
            .filter(|name| {
                name != "lo" && !name.starts_with("veth") && !name.starts_with("docker")
            })
            .collect();

        self.rates.retain(|name, _| names.contains(name));

        let mut devices = Vec::with_capacity(names.len());
        for name in names {
            let stats = net_dir.join(&name).join("statistics");
            let rx = read_u64(&stats.join("rx_bytes"));
            let tx = read_u64(&stats.join("tx_bytes"));
            let (rx, tx) = match (rx, tx) {
                (Ok(rx), Ok(tx)) => (rx, tx),
                // No statistics means not a real interface
                _ => continue,
            };

            let rates = self.rates.entry(name.clone()).or_default();
            let download = rates.rx.update(rx);
            let upload = rates.tx.update(tx);

            devices.push(
                Device::new(name, HardwareClass::Network)
                    .with_sensor("Download Speed", SensorKind::Throughput, download)
                    .with_sensor("Upload Speed", SensorKind::Throughput, upload)
                    .with_sensor("Data Downloaded", SensorKind::Data, Some(bytes_to_gb(rx)))
                    .with_sensor("Data Uploaded", SensorKind::Data, Some(bytes_to_gb(tx))),
            );
        }
        Ok(devices)
    }
}
