//! libusb transport for the LogicLink hardware.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rusb::{Direction, GlobalContext, Recipient, RequestType};

use crate::device::Device;
use crate::error::{Error, Result};
use crate::params::{AcqParams, TransmissionParams};
use crate::session::Session;
use crate::types::{Bytes, RawBlock};
use crate::wire::{
    self, decode_acq_params, decode_faults, encode_configure, Fault, Request, Stats,
    ACQ_PARAMS_WIRE_LEN, GREATFET_CLASS_LA, LA_VERB_START_CAPTURE, LA_VERB_STOP_CAPTURE,
    LL_VERB_CLEAR_ERRORS, LL_VERB_ERRORS, LL_VERB_SET_USB_TRANSFER_PARAMS, LL_VERB_STATS,
    LOGIC_LINK_CLASS_LA, MAX_CONTROL_PAYLOAD, STATS_WIRE_LEN,
};

const TIMEOUT: Duration = Duration::from_millis(wire::TIMEOUT_MS);

pub struct UsbDevice {
    handle: rusb::DeviceHandle<GlobalContext>,
    transfer_len: usize,
}

impl UsbDevice {
    pub fn open() -> Result<Self> {
        let handle = rusb::open_device_with_vid_pid(wire::VID, wire::PID).ok_or(
            Error::DeviceNotFound {
                vid: wire::VID,
                pid: wire::PID,
            },
        )?;

        handle.claim_interface(0)?;
        handle.set_alternate_setting(0, 0)?;

        info!("opened device {:04x}:{:04x}", wire::VID, wire::PID);

        Ok(UsbDevice {
            handle,
            transfer_len: TransmissionParams::default().usb_transfer,
        })
    }

    fn control_out(&self, payload: &[u8]) -> Result<()> {
        debug_assert!(payload.len() <= MAX_CONTROL_PAYLOAD);

        self.handle.write_control(
            rusb::request_type(Direction::Out, RequestType::Vendor, Recipient::Endpoint),
            wire::VENDOR_CLASS_REQUEST,
            1,
            0,
            payload,
            TIMEOUT,
        )?;
        Ok(())
    }

    fn control_in(&self, len: usize) -> Result<Bytes> {
        let mut buf = vec![0u8; len];
        let got = self.handle.read_control(
            rusb::request_type(Direction::In, RequestType::Vendor, Recipient::Endpoint),
            wire::VENDOR_CLASS_REQUEST,
            1,
            0,
            &mut buf,
            TIMEOUT,
        )?;
        buf.truncate(got);
        Ok(buf)
    }
}

impl Device for UsbDevice {
    fn configure(&mut self, params: &AcqParams) -> Result<AcqParams> {
        self.control_out(&encode_configure(params))?;
        let response = self.control_in(ACQ_PARAMS_WIRE_LEN)?;
        let accepted = decode_acq_params(&response)?;

        if accepted != *params {
            info!("device adjusted acquisition params: {accepted:?}");
        }

        Ok(accepted)
    }

    fn set_transmission(&mut self, params: &TransmissionParams) -> Result<()> {
        params.validate()?;
        self.transfer_len = params.usb_transfer;

        self.control_out(
            Request::new()
                .class(LOGIC_LINK_CLASS_LA)
                .verb(LL_VERB_SET_USB_TRANSFER_PARAMS)
                .u32(params.usb_transfer as u32)
                .u32(params.usb_block as u32)
                .data(),
        )
    }

    fn start(&mut self) -> Result<()> {
        self.control_out(
            Request::new()
                .class(GREATFET_CLASS_LA)
                .verb(LA_VERB_START_CAPTURE)
                .data(),
        )
    }

    fn stop(&mut self) -> Result<()> {
        self.control_out(
            Request::new()
                .class(GREATFET_CLASS_LA)
                .verb(LA_VERB_STOP_CAPTURE)
                .data(),
        )
    }

    fn acquire(&mut self, session: &Session) -> Result<()> {
        let mut buf = vec![0u8; self.transfer_len];
        let mut stopped = false;

        loop {
            let start = Instant::now();

            let got = match self.handle.read_bulk(wire::IN_EP, &mut buf, TIMEOUT) {
                Ok(got) => got,
                // After a stop request the device goes quiet and the last
                // read runs into the timeout.
                Err(e) if session.stop_requested() => {
                    debug!("bulk read after stop: {e}");
                    0
                }
                Err(e) => {
                    session.finish();
                    return Err(e.into());
                }
            };

            if got > 0 {
                let us = start.elapsed().as_micros().max(1);
                session.push(RawBlock {
                    mbps: got as f64 * 8.0 / us as f64,
                    overruns: 0,
                    data: buf[..got].to_vec(),
                });
            }

            if session.stop_requested() {
                // Tell the hardware once, then drain until it goes silent.
                if !stopped {
                    if let Err(e) = self.stop() {
                        warn!("stop request failed: {e}");
                    }
                    stopped = true;
                }

                if got == 0 {
                    break;
                }
            }
        }

        session.finish();
        Ok(())
    }

    fn stats(&mut self) -> Result<Stats> {
        self.control_out(
            Request::new()
                .class(LOGIC_LINK_CLASS_LA)
                .verb(LL_VERB_STATS)
                .data(),
        )?;
        Stats::decode(&self.control_in(STATS_WIRE_LEN)?)
    }

    fn faults(&mut self) -> Result<Vec<Fault>> {
        self.control_out(
            Request::new()
                .class(LOGIC_LINK_CLASS_LA)
                .verb(LL_VERB_ERRORS)
                .data(),
        )?;
        decode_faults(&self.control_in(MAX_CONTROL_PAYLOAD)?)
    }

    fn clear_faults(&mut self) -> Result<()> {
        self.control_out(
            Request::new()
                .class(LOGIC_LINK_CLASS_LA)
                .verb(LL_VERB_CLEAR_ERRORS)
                .data(),
        )
    }
}
