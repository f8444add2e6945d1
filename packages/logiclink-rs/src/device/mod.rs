//! Capture sources. The real hardware sits behind the `usb` feature, the
//! demo device synthesizes the same wire format in software.

mod demo;
#[cfg(feature = "usb")]
mod usb;

pub use demo::DemoDevice;
#[cfg(feature = "usb")]
pub use usb::UsbDevice;

use crate::error::{Error, Result};
use crate::params::{AcqParams, TransmissionParams};
use crate::session::Session;
use crate::wire::{Fault, Stats};

pub trait Device {
    /// Sends the acquisition settings and returns what the device actually
    /// accepted. The two can differ.
    fn configure(&mut self, params: &AcqParams) -> Result<AcqParams>;

    fn set_transmission(&mut self, params: &TransmissionParams) -> Result<()>;

    fn start(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    /// Blocking bulk read loop. Pushes transfers into the session until a
    /// stop is requested, then marks the session finished.
    fn acquire(&mut self, session: &Session) -> Result<()>;

    fn stats(&mut self) -> Result<Stats>;

    fn faults(&mut self) -> Result<Vec<Fault>>;

    fn clear_faults(&mut self) -> Result<()>;
}

/// Opens a capture source by name.
pub fn open(name: &str) -> Result<Box<dyn Device + Send>> {
    match name {
        "demo" => Ok(Box::new(DemoDevice::new())),
        #[cfg(feature = "usb")]
        "logicLink" => Ok(Box::new(UsbDevice::open()?)),
        _ => Err(Error::UnknownDevice(name.to_string())),
    }
}
