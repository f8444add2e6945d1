//! End to end capture run: acquisition thread, analysis thread and a
//! watcher that enforces the requested limits.

use std::time::{Duration, Instant};

use log::info;

use crate::analyzer::{analyze, Analyzer};
use crate::backend::Backend;
use crate::device::Device;
use crate::error::{Error, Result};
use crate::params::AcqParams;
use crate::session::Session;

/// When to wind a capture down. Zero means unlimited; an external stop
/// request (Ctrl-C) always works.
#[derive(Debug, Default, Clone, Copy)]
pub struct CaptureLimits {
    pub bytes: usize,
    pub seconds: u64,
}

impl CaptureLimits {
    fn reached(&self, session: &Session, started: Instant) -> bool {
        if self.bytes > 0 && session.transferred_bytes() >= self.bytes {
            return true;
        }

        self.seconds > 0 && started.elapsed() >= Duration::from_secs(self.seconds)
    }
}

/// Runs a full capture until a limit hits or `external_stop` turns true.
/// The accepted acquisition parameters must come from a prior
/// [`Device::configure`] call so the decode matches the device encoding.
pub fn run(
    device: &mut (dyn Device + Send),
    params: &AcqParams,
    limits: CaptureLimits,
    backend: Option<(&Backend, usize)>,
    analyzer: &mut (dyn Analyzer + Send),
    external_stop: impl Fn() -> bool,
) -> Result<()> {
    let session = Session::new();
    let started = Instant::now();

    device.start()?;

    std::thread::scope(|scope| -> Result<()> {
        let acquire = scope.spawn(|| device.acquire(&session));
        let analysis = scope.spawn(|| analyze(params, &session, backend, analyzer));

        while !session.is_finished() {
            if limits.reached(&session, started) || external_stop() {
                session.request_stop();
            }

            if acquire.is_finished() {
                break;
            }

            std::thread::sleep(Duration::from_millis(10));
        }

        join(acquire)?;
        join(analysis)?;
        Ok(())
    })?;

    info!(
        "capture done: {} B in {:.2} s",
        session.transferred_bytes(),
        started.elapsed().as_secs_f64()
    );

    Ok(())
}

/// Self contained demo capture for the language bindings: configure,
/// run to a byte limit, read channels back out.
pub struct DemoCapture {
    device: crate::device::DemoDevice,
    backend: Backend,
    group: usize,
    params: AcqParams,
}

impl DemoCapture {
    pub fn new(channels: usize, sample_rate: u32) -> Result<Self> {
        let mut device = crate::device::DemoDevice::new();

        let requested = AcqParams {
            digital_sample_rate: sample_rate,
            digital_channels: channels,
            ..AcqParams::default()
        };
        let params = device.configure(&requested)?;
        device.set_transmission(&crate::params::TransmissionParams {
            usb_transfer: 4096,
            usb_block: 2048,
        })?;

        let backend = Backend::new();
        let group = backend.add_group(crate::backend::GroupConfig {
            channels,
            ..crate::backend::GroupConfig::default()
        });

        Ok(DemoCapture {
            device,
            backend,
            group,
            params,
        })
    }

    /// Captures until at least `bytes` raw bytes arrived. Consecutive runs
    /// continue the waveform where the previous one stopped.
    pub fn run(&mut self, bytes: usize) -> Result<()> {
        let mut analyzer = crate::analyzer::NullAnalyzer;
        run(
            &mut self.device,
            &self.params,
            CaptureLimits { bytes, seconds: 0 },
            Some((&self.backend, self.group)),
            &mut analyzer,
            || false,
        )
    }

    pub fn channels(&self) -> usize {
        self.params.digital_channels
    }

    /// Length of every channel in samples.
    pub fn channel_len(&self) -> u64 {
        self.backend.channel_len(self.group)
    }

    /// Packed samples, MSB first, `length` samples from `begin`.
    pub fn read_channel(&self, channel: usize, begin: u64, length: u64) -> crate::types::Bytes {
        crate::backend::DigitalFrontend::new(&self.backend).channel(self.group, channel, begin, length)
    }
}

fn join<T>(handle: std::thread::ScopedJoinHandle<'_, Result<T>>) -> Result<T> {
    match handle.join() {
        Ok(result) => result,
        Err(panic) => {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(Error::Worker(msg))
        }
    }
}
