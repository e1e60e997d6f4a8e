// Licensed under the Apache-2.0 license

//! Serial download mode: SLIP framing, loader packets and the command
//! handler.

pub mod command;
pub mod loader;
pub mod slip;

pub use command::{LoaderError, Opcode, Request, Response};
pub use loader::{Loader, LoaderAction, LoaderBuffers};
pub use slip::SlipDecoder;
