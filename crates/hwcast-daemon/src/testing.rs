//! Shared helpers for unit tests.

use hwcast_hw::{Device, HardwareClass, SamplerBackend, SensorKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Backend that returns the same devices on every sample.
pub struct FixedBackend {
    devices: Vec<Device>,
    samples: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl FixedBackend {
    pub fn new(devices: Vec<Device>) -> Self {
        Self {
            devices,
            samples: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counter incremented on every `sample`.
    pub fn samples(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.samples)
    }

    /// Counter incremented on every `close`.
    pub fn closes(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }
}

impl SamplerBackend for FixedBackend {
    fn sample(&mut self) -> hwcast_hw::Result<Vec<Device>> {
        self.samples.fetch_add(1, Ordering::SeqCst);
        Ok(self.devices.clone())
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// One CPU device with a single temperature reading.
pub fn cpu(temp: f32) -> Vec<Device> {
    vec![Device::new("cpu0", HardwareClass::Cpu).with_sensor(
        "Package",
        SensorKind::Temperature,
        Some(temp),
    )]
}

/// Polls `condition` until it holds, failing the test after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
