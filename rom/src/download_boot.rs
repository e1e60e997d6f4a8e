// Licensed under the Apache-2.0 license

//! Joint download mode: wait for a host on UART0 or USB-Serial-JTAG, then
//! serve loader commands on whichever channel synced first.

use crate::download::command::{Request, Response, MAX_RESPONSE_LEN};
use crate::download::{slip, Loader, LoaderAction, SlipDecoder};
use crate::hil::{SerialError, SerialPort};
use crate::rom::{BootFlow, BootOutcome, RomEnv, RomParameters};
use core::fmt::Write;
use romtime::RomError;

/// Enough for a SYNC frame; longer frames are dropped while waiting.
const SYNC_BUFFER_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Uart,
    Usb,
}

pub struct DownloadBoot;

impl BootFlow for DownloadBoot {
    fn run(env: &mut RomEnv, _params: &RomParameters) -> BootOutcome {
        romtime::println!("waiting for download");
        let usb_allowed = !env.efuses.dis_usb_serial_jtag()
            && !env.efuses.dis_usb_serial_jtag_download_mode();
        let Some((channel, sync)) = wait_for_sync(env, usb_allowed) else {
            return BootOutcome::Halt(RomError::DOWNLOAD_CHANNELS_CLOSED);
        };

        let port: &mut dyn SerialPort = match channel {
            Channel::Uart => &mut *env.uart,
            Channel::Usb => &mut *env.usb,
        };
        send(port, &sync);

        let secure = env.efuses.enable_security_download();
        let mut loader = Loader::new(
            env.flash,
            &mut *env.bus,
            &mut *env.soc,
            &env.efuses,
            env.memory_map,
            &mut *env.buffers.dictionary,
            &mut *env.buffers.inflater,
            secure,
        );
        let mut decoder = SlipDecoder::new(&mut *env.buffers.frame);
        loop {
            let byte = match port.read_byte() {
                Ok(Some(byte)) => byte,
                Ok(None) => continue,
                Err(SerialError::Closed) => {
                    return BootOutcome::Halt(RomError::DOWNLOAD_CHANNELS_CLOSED)
                }
            };
            if decoder.push(byte).is_none() {
                continue;
            }
            let (response, action) = loader.handle(decoder.frame());
            if let Some(response) = response {
                send(port, &response);
            }
            match action {
                LoaderAction::Continue => {}
                // the response above still goes out at the old rate
                LoaderAction::ChangeBaud(baud) => port.set_baud_rate(baud),
                LoaderAction::Exit(outcome) => return outcome,
            }
        }
    }
}

/// Polls every allowed channel until one delivers a SYNC request. Returns
/// the channel with the response to send on it.
fn wait_for_sync(env: &mut RomEnv, usb_allowed: bool) -> Option<(Channel, Response)> {
    let mut uart_buf = [0u8; SYNC_BUFFER_LEN];
    let mut usb_buf = [0u8; SYNC_BUFFER_LEN];
    let mut channels = [
        (Channel::Uart, SlipDecoder::new(&mut uart_buf), true),
        (Channel::Usb, SlipDecoder::new(&mut usb_buf), usb_allowed),
    ];
    loop {
        if channels.iter().all(|(_, _, open)| !open) {
            return None;
        }
        for (channel, decoder, open) in channels.iter_mut().filter(|(_, _, open)| *open) {
            let port: &mut dyn SerialPort = match channel {
                Channel::Uart => &mut *env.uart,
                Channel::Usb => &mut *env.usb,
            };
            let byte = match port.read_byte() {
                Ok(Some(byte)) => byte,
                Ok(None) => continue,
                Err(SerialError::Closed) => {
                    *open = false;
                    continue;
                }
            };
            if decoder.push(byte).is_none() {
                continue;
            }
            if let Some(request) = Request::parse(decoder.frame()).filter(Request::is_sync) {
                return Some((*channel, Response::ok(request.op, 0)));
            }
        }
    }
}

fn send(port: &mut dyn SerialPort, response: &Response) {
    let mut buf = [0u8; MAX_RESPONSE_LEN];
    slip::encode(response.encode(&mut buf), |chunk| port.write_bytes(chunk));
}
