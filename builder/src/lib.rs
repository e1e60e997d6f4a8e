// Licensed under the Apache-2.0 license

//! Host-side tooling for the ESP32-C3 boot ROM: application images the
//! flash boot path accepts, and the request streams a download-mode host
//! sends.

mod image;
mod loader_client;

pub use image::{ImageBuilder, Segment};
pub use loader_client::{md5_hex, parse_responses, LoaderClient, LoaderResponse};
