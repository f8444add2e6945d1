//! Control transfer payloads. Everything on the wire is little endian.

use crate::error::{Error, Result};
use crate::params::{AcqParams, AnalogEncoding, DigitalEncoding, Mode};
use crate::types::Bytes;

pub const VENDOR_CLASS_REQUEST: u8 = 0x65;
pub const TIMEOUT_MS: u64 = 1000;
pub const IN_EP: u8 = 0x81;
pub const VID: u16 = 0x20a0;
pub const PID: u16 = 0x41ff;

/// Maximum control transfer payload length in either direction.
pub const MAX_CONTROL_PAYLOAD: usize = 64;

pub const GREATFET_CLASS_CORE: u32 = 0x000;
pub const CORE_VERB_READ_VERSION: u32 = 0x1;
pub const CORE_VERB_READ_SERIAL: u32 = 0x3;

/// Requests compatible with the GreatFET protocol.
pub const GREATFET_CLASS_LA: u32 = 0x10d;
pub const LA_VERB_CONFIGURE: u32 = 0x0;
pub const LA_VERB_FIRST_PIN: u32 = 0x1;
pub const LA_VERB_ALT_PIN_MAP: u32 = 0x2;
pub const LA_VERB_START_CAPTURE: u32 = 0x3;
pub const LA_VERB_STOP_CAPTURE: u32 = 0x4;

/// LogicLink specific requests.
pub const LOGIC_LINK_CLASS_LA: u32 = 0x123;
pub const LL_VERB_DECIMATE: u32 = 0x0;
pub const LL_VERB_FIXED_BUFFER: u32 = 0x1;
pub const LL_VERB_STATS: u32 = 0x2;
pub const LL_VERB_ERRORS: u32 = 0x3;
pub const LL_VERB_CLEAR_ERRORS: u32 = 0x4;
pub const LL_VERB_SET_USB_TRANSFER_PARAMS: u32 = 0x5;
pub const LL_VERB_CONFIGURE: u32 = 0x6;

/// Fluent builder for vendor request payloads.
#[derive(Debug, Default, Clone)]
pub struct Request {
    data: Bytes,
}

impl Request {
    pub fn new() -> Self {
        Request::default()
    }

    pub fn class(self, c: u32) -> Self {
        self.u32(c)
    }

    pub fn verb(self, v: u32) -> Self {
        self.u32(v)
    }

    pub fn sample_rate(self, v: u32) -> Self {
        self.u32(v)
    }

    pub fn channels(self, v: u8) -> Self {
        self.u8(v)
    }

    pub fn u32(mut self, v: u32) -> Self {
        self.data.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u8(mut self, v: u8) -> Self {
        self.data.push(v);
        self
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Checked little endian decoder for control transfer responses.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.data.len() - self.pos < n {
            return Err(Error::Truncated {
                wanted: self.pos + n,
                got: self.data.len(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Configure request payload. The device answers with [`decode_acq_params`].
pub fn encode_configure(params: &AcqParams) -> Bytes {
    Request::new()
        .class(LOGIC_LINK_CLASS_LA)
        .verb(LL_VERB_CONFIGURE)
        .sample_rate(params.digital_sample_rate)
        .channels(params.digital_channels as u8)
        .sample_rate(params.analog_sample_rate)
        .channels(params.analog_channels as u8)
        .u8(params.mode.to_wire())
        .into_bytes()
}

/// Length of the configure response.
pub const ACQ_PARAMS_WIRE_LEN: usize = 13;

pub fn decode_acq_params(data: &[u8]) -> Result<AcqParams> {
    let mut r = Reader::new(data);
    Ok(AcqParams {
        digital_sample_rate: r.u32()?,
        digital_channels: r.u8()? as usize,
        digital_encoding: DigitalEncoding::from_wire(r.u8()?)?,
        analog_sample_rate: r.u32()?,
        analog_channels: r.u8()? as usize,
        analog_encoding: AnalogEncoding::from_wire(r.u8()?)?,
        mode: Mode::from_wire(r.u8()?)?,
    })
}

pub fn encode_acq_params(params: &AcqParams) -> Bytes {
    Request::new()
        .sample_rate(params.digital_sample_rate)
        .channels(params.digital_channels as u8)
        .u8(params.digital_encoding.to_wire())
        .sample_rate(params.analog_sample_rate)
        .channels(params.analog_channels as u8)
        .u8(params.analog_encoding.to_wire())
        .u8(params.mode.to_wire())
        .into_bytes()
}

/// Device side diagnostic counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub add_errors: u16,

    pub send1_fatal: u16,
    pub send1_busy: u16,
    pub send1_empty: u16,

    pub send2_fatal: u16,
    pub send2_busy: u16,
    pub send2_empty: u16,

    /// Queue usage at the moment of adding a new element.
    pub queue_max_size: u16,
}

pub const STATS_WIRE_LEN: usize = 16;

impl Stats {
    pub fn decode(data: &[u8]) -> Result<Stats> {
        let mut r = Reader::new(data);
        Ok(Stats {
            add_errors: r.u16()?,
            send1_fatal: r.u16()?,
            send1_busy: r.u16()?,
            send1_empty: r.u16()?,
            send2_fatal: r.u16()?,
            send2_busy: r.u16()?,
            send2_empty: r.u16()?,
            queue_max_size: r.u16()?,
        })
    }
}

/// Fault codes reported by the device firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Fault {
    None = 0,
    UnknownRequest,
    NoClassOrVerb,
    MalformedConfig,
    MalformedRequestUint32,
    MalformedRequestUint8,
    SetUint32,
    SetUint8,
    UsbQueueFull,
    MalformedConfigChan0,
    WrongBlockSize,
    SmallBlockSize,
    BigBlockSize,
    TooManyBlocks,
    SampleRateTooHigh,
    AdcCalibrationFailed,
    MalformedConfigChanAdc,
    NotEnoughResources,
    PeripheralSampleRateTooHigh,
    Clko1ClkError,
    Clko2ClkError,
    SampleRateTooLow,
}

impl Fault {
    pub fn from_wire(value: u8) -> Result<Fault> {
        use Fault::*;
        Ok(match value {
            0 => None,
            1 => UnknownRequest,
            2 => NoClassOrVerb,
            3 => MalformedConfig,
            4 => MalformedRequestUint32,
            5 => MalformedRequestUint8,
            6 => SetUint32,
            7 => SetUint8,
            8 => UsbQueueFull,
            9 => MalformedConfigChan0,
            10 => WrongBlockSize,
            11 => SmallBlockSize,
            12 => BigBlockSize,
            13 => TooManyBlocks,
            14 => SampleRateTooHigh,
            15 => AdcCalibrationFailed,
            16 => MalformedConfigChanAdc,
            17 => NotEnoughResources,
            18 => PeripheralSampleRateTooHigh,
            19 => Clko1ClkError,
            20 => Clko2ClkError,
            21 => SampleRateTooLow,
            _ => {
                return Err(Error::UnknownWireValue {
                    what: "fault code",
                    value,
                })
            }
        })
    }

    pub fn message(self) -> &'static str {
        use Fault::*;
        match self {
            None => "None",
            UnknownRequest => "Unrecognized request from the host.",
            NoClassOrVerb => "Malformed request from the host. No class or verb.",
            MalformedConfig => "Malformed configuration request from the host.",
            MalformedRequestUint32 => "Malformed request from the host. Can't decode an uint32 value.",
            MalformedRequestUint8 => "Malformed request from the host. Can't decode an uint8 value.",
            SetUint32 => "Can't set uint32 value.",
            SetUint8 => "Can't set uint8 value.",
            UsbQueueFull => "Main data queue overflow.",
            MalformedConfigChan0 => "Bank 1 channel number can be only 1, 2, 4 or 8.",
            WrongBlockSize => "Transfer size must be must be divisible by block size.",
            SmallBlockSize => "Block size must be greater than 512B.",
            BigBlockSize => "Block size cannot be greater than the DMA_BUFFER_SIZE_B.",
            TooManyBlocks => "Too many blocks.",
            SampleRateTooHigh => "Too high sample rate requested.",
            AdcCalibrationFailed => "ADC auto-calibration failed.",
            MalformedConfigChanAdc => "Analog channel number has to be between 1 and 8.",
            NotEnoughResources => "Wrong channel configuration. Not enough resources.",
            PeripheralSampleRateTooHigh => "Improper peripheral configuration. Max sample rate is too high.",
            Clko1ClkError => "Improper CLKO1_CLK configguration.",
            Clko2ClkError => "Improper CLKO2_CLK configguration.",
            SampleRateTooLow => "Too low sample rate requested.",
        }
    }
}

/// Fault response layout: codes first, then a trailing count byte.
pub fn decode_faults(data: &[u8]) -> Result<Vec<Fault>> {
    let Some(&count) = data.last() else {
        return Ok(Vec::new());
    };

    let count = count as usize;
    if count > data.len() - 1 {
        return Err(Error::Truncated {
            wanted: count + 1,
            got: data.len(),
        });
    }

    let mut faults: Vec<Fault> = data[..count]
        .iter()
        .map(|&b| Fault::from_wire(b))
        .collect::<Result<_>>()?;

    faults.sort_unstable();
    faults.dedup();
    Ok(faults)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_layout_is_little_endian() {
        let r = Request::new().u32(0x12345678);
        assert_eq!(r.data(), &[0x78, 0x56, 0x34, 0x12]);

        let r = Request::new()
            .class(GREATFET_CLASS_LA)
            .verb(LA_VERB_STOP_CAPTURE);
        assert_eq!(r.data(), &[0x0d, 0x01, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn legacy_verbs_precede_capture_control() {
        // The GreatFET era verb table: configure and the pin mapping verbs
        // sit below start/stop.
        assert_eq!(LA_VERB_CONFIGURE, 0x0);
        assert_eq!(LA_VERB_FIRST_PIN, 0x1);
        assert_eq!(LA_VERB_ALT_PIN_MAP, 0x2);

        let r = Request::new()
            .class(GREATFET_CLASS_LA)
            .verb(LA_VERB_FIRST_PIN)
            .u8(0);
        assert_eq!(r.data(), &[0x0d, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn configure_round_trip() {
        let params = AcqParams {
            digital_sample_rate: 1_000_000,
            digital_channels: 2,
            digital_encoding: DigitalEncoding::Flexio,
            analog_sample_rate: 0,
            analog_channels: 0,
            analog_encoding: AnalogEncoding::Analog8Bit,
            mode: Mode::Acquisition,
        };

        let payload = encode_configure(&params);
        assert_eq!(payload.len(), 19);

        let mut r = Reader::new(&payload);
        assert_eq!(r.u32().unwrap(), LOGIC_LINK_CLASS_LA);
        assert_eq!(r.u32().unwrap(), LL_VERB_CONFIGURE);
        assert_eq!(r.u32().unwrap(), 1_000_000);
        assert_eq!(r.u8().unwrap(), 2);

        let wire = encode_acq_params(&params);
        assert_eq!(wire.len(), ACQ_PARAMS_WIRE_LEN);
        assert_eq!(decode_acq_params(&wire).unwrap(), params);
    }

    #[test]
    fn reader_reports_truncation() {
        let mut r = Reader::new(&[1, 2]);
        let err = r.u32().unwrap_err();
        assert!(matches!(err, Error::Truncated { wanted: 4, got: 2 }));
    }

    #[test]
    fn stats_decode() {
        let mut wire = Vec::new();
        for v in [3u16, 0, 1, 2, 0, 0, 7, 42] {
            wire.extend_from_slice(&v.to_le_bytes());
        }

        let stats = Stats::decode(&wire).unwrap();
        assert_eq!(stats.add_errors, 3);
        assert_eq!(stats.send1_empty, 2);
        assert_eq!(stats.send2_empty, 7);
        assert_eq!(stats.queue_max_size, 42);

        assert!(Stats::decode(&wire[..10]).is_err());
    }

    #[test]
    fn faults_trailing_count() {
        let mut wire = vec![0u8; MAX_CONTROL_PAYLOAD];
        wire[0] = 8; // usbQueueFull
        wire[1] = 14; // sampleRateTooHigh
        *wire.last_mut().unwrap() = 2;

        let faults = decode_faults(&wire).unwrap();
        assert_eq!(faults, vec![Fault::UsbQueueFull, Fault::SampleRateTooHigh]);

        let none = decode_faults(&[0u8; 4]).unwrap();
        assert!(none.is_empty());
        assert!(decode_faults(&[]).unwrap().is_empty());
    }
}
