// Licensed under the Apache-2.0 license

pub mod memory;
pub use memory::SimpleFlash;
