//! Software stand-in for the hardware. Produces the same encodings the
//! firmware does, so the whole decode path can run without a device.

use std::time::{Duration, Instant};

use log::{debug, info};

use crate::device::Device;
use crate::error::{Error, Result};
use crate::generate::{Random, Square};
use crate::params::{AcqParams, Mode, TransmissionParams};
use crate::session::Session;
use crate::types::{Bytes, RawBlock};
use crate::wire::{Fault, Stats};

/// Square wave width in samples for each level. Period of 8 keeps the
/// clock check happy at any length.
const SQUARE_BITS: usize = 4;

pub struct DemoDevice {
    params: AcqParams,
    transmission: TransmissionParams,
    started: bool,

    squares: Vec<Square>,
    rng: Random,
    ordinal: u32,
}

impl Default for DemoDevice {
    fn default() -> Self {
        DemoDevice::new()
    }
}

impl DemoDevice {
    pub fn new() -> Self {
        DemoDevice {
            params: AcqParams::default(),
            transmission: TransmissionParams::default(),
            started: false,
            squares: Vec::new(),
            rng: Random::default(),
            ordinal: 0,
        }
    }

    /// One bulk transfer worth of encoded acquisition data.
    fn acquisition_transfer(&mut self, len: usize) -> Bytes {
        let channels = self.params.digital_channels;
        let per_channel = len / channels;

        let plain: Vec<Bytes> = self
            .squares
            .iter_mut()
            .map(|sq| sq.generate(SQUARE_BITS, SQUARE_BITS, per_channel * 8))
            .collect();

        match channels {
            1 => encode_flexio_bits(&plain, 4),
            2 => encode_flexio_bits(&plain, 2),
            _ => encode_flexio_bytes(&plain),
        }
    }

    /// Fixed buffer transfers carry an ordinal counter at the start of
    /// every device block, the rest is noise.
    fn fixed_buffer_transfer(&mut self, len: usize) -> Bytes {
        let mut data = self.rng.generate(len * 8);

        for block in data.chunks_mut(self.transmission.usb_block) {
            if block.len() >= 4 {
                self.ordinal += 1;
                block[..4].copy_from_slice(&self.ordinal.to_le_bytes());
            }
        }

        data
    }

    fn pace(&self, transfer_len: usize) {
        let rate = self.params.digital_sample_rate;
        if rate == 0 {
            return;
        }

        let bits_per_channel = transfer_len * 8 / self.params.digital_channels;
        let secs = bits_per_channel as f64 / f64::from(rate);
        std::thread::sleep(Duration::from_secs_f64(secs));
    }
}

impl Device for DemoDevice {
    fn configure(&mut self, params: &AcqParams) -> Result<AcqParams> {
        if !matches!(params.digital_channels, 1 | 2 | 4 | 8) {
            return Err(Error::UnsupportedChannels(params.digital_channels));
        }

        self.params = *params;
        self.squares = (0..params.digital_channels)
            .map(|_| Square::default())
            .collect();

        info!(
            "demo device configured: {} ch @ {} Sps, mode {:?}",
            params.digital_channels, params.digital_sample_rate, params.mode
        );

        Ok(self.params)
    }

    fn set_transmission(&mut self, params: &TransmissionParams) -> Result<()> {
        params.validate()?;
        self.transmission = *params;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        // Without a prior configure there are no generators to run.
        if self.params.digital_channels == 0 {
            return Err(Error::UnsupportedChannels(0));
        }

        if self.started {
            return Err(Error::AlreadyRunning);
        }

        self.started = true;
        self.ordinal = 0;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.started = false;
        Ok(())
    }

    fn acquire(&mut self, session: &Session) -> Result<()> {
        let transfer_len = self.transmission.usb_transfer;

        while !session.stop_requested() {
            let start = Instant::now();

            let data = match self.params.mode {
                Mode::Acquisition => self.acquisition_transfer(transfer_len),
                Mode::FixedBuffer => self.fixed_buffer_transfer(transfer_len),
            };

            self.pace(data.len());

            let us = start.elapsed().as_micros().max(1);
            let mbps = data.len() as f64 * 8.0 / us as f64;

            session.push(RawBlock {
                mbps,
                overruns: 0,
                data,
            });
        }

        debug!("demo acquisition wound down");
        self.started = false;
        session.finish();
        Ok(())
    }

    fn stats(&mut self) -> Result<Stats> {
        Ok(Stats::default())
    }

    fn faults(&mut self) -> Result<Vec<Fault>> {
        Ok(Vec::new())
    }

    fn clear_faults(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Inverse of the per-bit flexio decode: scatters plain per-channel bytes
/// into the shift buffer layout the hardware emits.
fn encode_flexio_bits(plain: &[Bytes], shiftbufs: usize) -> Bytes {
    let bytes_per_batch = 4 * shiftbufs;

    let mut out = vec![0u8; plain.iter().map(Bytes::len).sum()];
    let mut raw_off = 0;
    let mut batch = 0;

    while raw_off < out.len() {
        for ch in plain {
            let enc = &ch[batch * bytes_per_batch..(batch + 1) * bytes_per_batch];
            let raw = &mut out[raw_off..raw_off + bytes_per_batch];

            for k in 0..4 {
                for j in 0..8 {
                    for l in 0..shiftbufs {
                        let in_idx = 4 * (shiftbufs - l - 1) + 3 - k;
                        let nibble = (j % (8 / shiftbufs)) * shiftbufs;
                        let out_idx = k * shiftbufs + j / (8 / shiftbufs);

                        let bit = enc[out_idx] >> (7 - (l + nibble)) & 1;
                        raw[in_idx] |= bit << (7 - j);
                    }
                }
            }

            raw_off += bytes_per_batch;
        }

        batch += 1;
    }

    out
}

/// Interleaves one 32 bit word per channel, round robin.
fn encode_flexio_bytes(plain: &[Bytes]) -> Bytes {
    let mut out = Bytes::with_capacity(plain.iter().map(Bytes::len).sum());
    let words = plain[0].len() / 4;

    for w in 0..words {
        for ch in plain {
            out.extend_from_slice(&ch[w * 4..w * 4 + 4]);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{analyze, Analyzer, ClockSignalCheck, OrdinalCheck};
    use crate::params::DigitalEncoding;
    use crate::rearrange::rearrange;

    fn params(channels: usize, mode: Mode) -> AcqParams {
        AcqParams {
            digital_sample_rate: 100_000_000,
            digital_channels: channels,
            digital_encoding: DigitalEncoding::Flexio,
            mode,
            ..AcqParams::default()
        }
    }

    #[test]
    fn bit_encode_is_inverse_of_rearrange() {
        for (channels, shiftbufs) in [(1usize, 4usize), (2, 2)] {
            let mut rng = Random::default();
            let plain: Vec<Bytes> = (0..channels).map(|_| rng.generate(512)).collect();

            let raw = encode_flexio_bits(&plain, shiftbufs);
            let decoded = rearrange(&raw, &params(channels, Mode::Acquisition)).unwrap();

            assert_eq!(decoded.digital, plain, "{channels} channels");
        }
    }

    #[test]
    fn byte_encode_is_inverse_of_rearrange() {
        for channels in [4usize, 8] {
            let mut rng = Random::default();
            let plain: Vec<Bytes> = (0..channels).map(|_| rng.generate(256)).collect();

            let raw = encode_flexio_bytes(&plain);
            let decoded = rearrange(&raw, &params(channels, Mode::Acquisition)).unwrap();

            assert_eq!(decoded.digital, plain, "{channels} channels");
        }
    }

    fn run_capture(mut device: DemoDevice, analyzer: &mut dyn Analyzer, transfers: usize) {
        let acq = device.params;
        let transfer = device.transmission.usb_transfer;
        let session = Session::new();

        std::thread::scope(|s| {
            s.spawn(|| {
                device.start().unwrap();
                device.acquire(&session).unwrap();
            });

            while session.transferred_bytes() < transfers * transfer {
                std::thread::sleep(Duration::from_millis(1));
            }
            session.request_stop();

            analyze(&acq, &session, None, analyzer).unwrap();
        });
    }

    #[test]
    fn demo_square_passes_clock_check() {
        let mut device = DemoDevice::new();
        device.configure(&params(1, Mode::Acquisition)).unwrap();
        device
            .set_transmission(&TransmissionParams {
                usb_transfer: 4096,
                usb_block: 2048,
            })
            .unwrap();

        let mut check = ClockSignalCheck::new(2048);
        run_capture(device, &mut check, 3);

        assert_eq!(check.errors(), 0);
    }

    #[test]
    fn demo_fixed_buffer_ordinals_are_gapless() {
        let mut device = DemoDevice::new();
        device.configure(&params(8, Mode::FixedBuffer)).unwrap();
        device
            .set_transmission(&TransmissionParams {
                usb_transfer: 4096,
                usb_block: 1024,
            })
            .unwrap();

        let mut check = OrdinalCheck::new(1024);
        run_capture(device, &mut check, 3);

        assert_eq!(check.overruns(), 0);
    }

    #[test]
    fn configure_rejects_odd_channel_counts() {
        let mut device = DemoDevice::new();
        assert!(matches!(
            device.configure(&params(3, Mode::Acquisition)),
            Err(Error::UnsupportedChannels(3))
        ));
    }

    #[test]
    fn start_requires_a_configuration() {
        let mut device = DemoDevice::new();
        assert!(matches!(
            device.start(),
            Err(Error::UnsupportedChannels(0))
        ));
    }

    #[test]
    fn double_start_is_rejected() {
        let mut device = DemoDevice::new();
        device.configure(&params(1, Mode::Acquisition)).unwrap();
        device.start().unwrap();
        assert!(matches!(device.start(), Err(Error::AlreadyRunning)));
        device.stop().unwrap();
        device.start().unwrap();
    }
}
