//! Command line capture client. Streams from a device (or the built-in
//! demo source), optionally runs one of the debug analyzers and prints
//! the device side statistics when the capture winds down.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;

use logiclink_rs::analyzer::{ClockSignalCheck, NullAnalyzer, OrdinalCheck, RawPrint};
use logiclink_rs::capture::{self, CaptureLimits};
use logiclink_rs::device;
use logiclink_rs::params::{
    AcqParams, Mode, TransmissionParams, DEFAULT_USB_BLOCK_SIZE, DEFAULT_USB_TRANSFER_SIZE,
};
use logiclink_rs::wire::Stats;

#[derive(Parser, Debug)]
#[command(name = "logiclink", version, about = "LogicLink capture client")]
struct Cli {
    /// Digital sample rate [Hz].
    #[arg(short = 's', long, default_value_t = 1_000_000)]
    sample_rate: u32,

    /// Number of digital channels.
    #[arg(short = 'c', long, default_value_t = 1)]
    channels: usize,

    /// Analog sample rate [Hz].
    #[arg(short = 'S', long, default_value_t = 0)]
    analog_sample_rate: u32,

    /// Number of analog channels.
    #[arg(short = 'C', long, default_value_t = 0)]
    analog_channels: usize,

    /// Limit the amount of bytes acquired.
    #[arg(short = 'b', long, default_value_t = 0)]
    bytes: usize,

    /// Limit the acquisition time [seconds].
    #[arg(short = 't', long = "time", default_value_t = 0)]
    seconds: u64,

    /// Bulk USB transfer size [bytes].
    #[arg(long, default_value_t = DEFAULT_USB_TRANSFER_SIZE)]
    usb_transfer: usize,

    /// USB and DMA block size [bytes].
    #[arg(long, default_value_t = DEFAULT_USB_BLOCK_SIZE)]
    usb_block: usize,

    /// Do not acquire anything, receive a fixed buffer of consecutive numbers.
    #[arg(long)]
    fixed_buffer: bool,

    /// Capture source to open ("demo" or "logicLink").
    #[arg(long, default_value = "demo")]
    device: String,

    /// Debug analyzer to run on the received data.
    #[arg(long, value_enum, default_value_t = Check::Print)]
    check: Check,

    /// Print the exit statistics as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Check {
    /// Expect a steady square wave on channel 0 and count period mismatches.
    Clock,
    /// Expect consecutive block ordinals and count the gaps.
    Ordinal,
    /// Log per-transfer sizes and throughput.
    Print,
    /// Discard everything.
    None,
}

static TERM_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(_sig: libc::c_int) {
    TERM_REQUESTED.store(true, Ordering::SeqCst);
}

fn install_signal_handler() {
    unsafe {
        libc::signal(libc::SIGINT, on_signal as libc::sighandler_t);
        libc::signal(libc::SIGTERM, on_signal as libc::sighandler_t);
    }
}

fn print_stats(stats: &Stats, json: bool) {
    if json {
        let value = serde_json::json!({
            "queueMax": stats.queue_max_size,
            "addErrors": stats.add_errors,
            "send1Fatal": stats.send1_fatal,
            "send1Busy": stats.send1_busy,
            "send1Empty": stats.send1_empty,
            "send2Fatal": stats.send2_fatal,
            "send2Busy": stats.send2_busy,
            "send2Empty": stats.send2_empty,
        });
        println!("{value}");
    } else {
        println!(
            "Queue max: {}, addErr: {}, s1F: {}, s1B: {}, s1E: {}, s2F: {}, s2B: {}, s2E: {}",
            stats.queue_max_size,
            stats.add_errors,
            stats.send1_fatal,
            stats.send1_busy,
            stats.send1_empty,
            stats.send2_fatal,
            stats.send2_busy,
            stats.send2_empty
        );
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    install_signal_handler();

    let mut device =
        device::open(&cli.device).with_context(|| format!("cannot open \"{}\"", cli.device))?;

    device.set_transmission(&TransmissionParams {
        usb_transfer: cli.usb_transfer,
        usb_block: cli.usb_block,
    })?;

    let requested = AcqParams {
        digital_sample_rate: cli.sample_rate,
        digital_channels: cli.channels,
        analog_sample_rate: cli.analog_sample_rate,
        analog_channels: cli.analog_channels,
        mode: if cli.fixed_buffer {
            Mode::FixedBuffer
        } else {
            Mode::Acquisition
        },
        ..AcqParams::default()
    };

    // The device may adjust the requested settings, decode with what it accepted.
    let params = device
        .configure(&requested)
        .context("device rejected the acquisition settings")?;
    info!(
        "accepted: {} channels at {} Hz",
        params.digital_channels, params.digital_sample_rate
    );

    let limits = CaptureLimits {
        bytes: cli.bytes,
        seconds: cli.seconds,
    };
    let stop = || TERM_REQUESTED.load(Ordering::Relaxed);

    let run_result = match cli.check {
        Check::Clock => {
            let mut check = ClockSignalCheck::new(cli.usb_block);
            let r = capture::run(device.as_mut(), &params, limits, None, &mut check, stop);
            println!("Clock signal errors: {}", check.errors());
            r
        }
        Check::Ordinal => {
            let mut check = OrdinalCheck::new(cli.usb_block);
            let r = capture::run(device.as_mut(), &params, limits, None, &mut check, stop);
            println!("Overruns: {}", check.overruns());
            r
        }
        Check::Print => {
            let mut check = RawPrint::default();
            capture::run(device.as_mut(), &params, limits, None, &mut check, stop)
        }
        Check::None => {
            let mut check = NullAnalyzer;
            capture::run(device.as_mut(), &params, limits, None, &mut check, stop)
        }
    };

    if stop() {
        println!("Interrupted");
    }

    // Report the capture failure only after pulling the fault log, the
    // device usually knows more about what went wrong than the host does.
    let stats = device.stats()?;
    print_stats(&stats, cli.json);

    let faults = device.faults()?;
    if !faults.is_empty() {
        println!("Errors reported by the device:");
        for fault in &faults {
            eprintln!("* {}", fault.message());
        }
        device.clear_faults()?;
    }

    run_result.context("capture failed")?;
    Ok(())
}
