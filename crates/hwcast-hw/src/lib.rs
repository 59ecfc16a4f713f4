//! hwcast hardware library
//!
//! Provides the device/sensor model and the sampler backends that enumerate
//! hardware and read current sensor values.

pub mod device;
pub mod error;
pub mod sysfs;

pub use device::{Device, HardwareClass, Sensor, SensorKind};
pub use error::{Error, Result};
pub use sysfs::SysfsBackend;

/// A source of hardware devices and their current sensor readings.
///
/// `sample` refreshes every device and returns the full list for one pass.
/// It may block on device I/O and is not assumed to be cheap, so async
/// callers should run it on a blocking thread.
pub trait SamplerBackend: Send {
    /// Refreshes all devices and returns their current readings.
    fn sample(&mut self) -> Result<Vec<Device>>;

    /// Releases the backend. Further calls to `sample` fail.
    fn close(&mut self);
}

impl<B: SamplerBackend + ?Sized> SamplerBackend for Box<B> {
    fn sample(&mut self) -> Result<Vec<Device>> {
        (**self).sample()
    }

    fn close(&mut self) {
        (**self).close()
    }
}
