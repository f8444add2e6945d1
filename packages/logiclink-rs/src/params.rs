//! Acquisition and transmission parameters shared between the host and the device.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::SampleRate;

/// Digital sample layout produced by the device.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DigitalEncoding {
    /// 1-8 channels of interleaved data: 32 bits of D0, 32 bits of D1 and so on.
    #[default]
    Flexio,
    /// Bytes 1 and 2 of every 32 bit word. Bit 8 -> D0, bit 9 -> D1 and so on.
    Gpio12,
}

impl DigitalEncoding {
    pub fn to_wire(self) -> u8 {
        match self {
            DigitalEncoding::Flexio => 0,
            DigitalEncoding::Gpio12 => 1,
        }
    }

    pub fn from_wire(value: u8) -> Result<Self> {
        match value {
            0 => Ok(DigitalEncoding::Flexio),
            1 => Ok(DigitalEncoding::Gpio12),
            _ => Err(Error::UnknownWireValue {
                what: "digital encoding",
                value,
            }),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalogEncoding {
    /// 8 bit sample data.
    #[default]
    Analog8Bit,
}

impl AnalogEncoding {
    pub fn to_wire(self) -> u8 {
        match self {
            AnalogEncoding::Analog8Bit => 0,
        }
    }

    pub fn from_wire(value: u8) -> Result<Self> {
        match value {
            0 => Ok(AnalogEncoding::Analog8Bit),
            _ => Err(Error::UnknownWireValue {
                what: "analog encoding",
                value,
            }),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Continuous streaming until the host stops the capture.
    #[default]
    Acquisition,
    /// The device sends a pre-filled buffer over and over. Used for throughput tests.
    FixedBuffer,
}

impl Mode {
    pub fn to_wire(self) -> u8 {
        match self {
            Mode::Acquisition => 0,
            Mode::FixedBuffer => 1,
        }
    }

    pub fn from_wire(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Mode::Acquisition),
            1 => Ok(Mode::FixedBuffer),
            _ => Err(Error::UnknownWireValue { what: "mode", value }),
        }
    }
}

/// What the user asked for. The device may respond with adjusted values,
/// so a configure round trip returns a second instance of this struct.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcqParams {
    pub digital_sample_rate: SampleRate,
    pub digital_channels: usize,
    pub digital_encoding: DigitalEncoding,

    pub analog_sample_rate: SampleRate,
    pub analog_channels: usize,
    pub analog_encoding: AnalogEncoding,

    pub mode: Mode,
}

/// USB bulk transfer sizing. `usb_transfer` is what the host asks for in a
/// single bulk read, `usb_block` is the granularity the device fills buffers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransmissionParams {
    pub usb_transfer: usize,
    pub usb_block: usize,
}

pub const DEFAULT_USB_TRANSFER_SIZE: usize = 16384;
pub const DEFAULT_USB_BLOCK_SIZE: usize = 8192;

impl Default for TransmissionParams {
    fn default() -> Self {
        TransmissionParams {
            usb_transfer: DEFAULT_USB_TRANSFER_SIZE,
            usb_block: DEFAULT_USB_BLOCK_SIZE,
        }
    }
}

impl TransmissionParams {
    pub fn validate(&self) -> Result<()> {
        if self.usb_transfer == 0 || self.usb_block == 0 {
            return Err(Error::ZeroTransfer);
        }
        Ok(())
    }
}
