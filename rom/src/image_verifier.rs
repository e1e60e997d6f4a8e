// Licensed under the Apache-2.0 license

use crate::efuse::Efuses;
use crate::hil::FlashStorage;
use c3_image::DIGEST_LEN;

/// Verifies the signature of a flash image when secure boot is enabled.
///
/// The signature format is up to the implementer; the ROM only provides the
/// image digest it computed while loading, the image length and read access
/// to the flash and the eFuses (for key digests and revocation bits).
///
/// Parameters:
///   digest:     SHA-256 of the image bytes through the checksum byte
///   image_len:  length of the image including checksum and appended digest
///   flash:      flash holding the image at offset 0
///   efuses:     block 0 snapshot
///
/// Returns:
///   true if the image may be executed.
pub trait ImageVerifier {
    fn verify(
        &self,
        digest: &[u8; DIGEST_LEN],
        image_len: usize,
        flash: &dyn FlashStorage,
        efuses: &Efuses,
    ) -> bool;
}
