//! CRC-32/MPEG-2 used by PSI/SI sections.

use crc::{Crc, CRC_32_MPEG_2};

const CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// Computes the CRC-32/MPEG-2 of `data`.
#[inline]
pub fn checksum(data: &[u8]) -> u32 {
    CRC.checksum(data)
}

/// Returns `true` if `section`, including its trailing CRC field, is intact.
///
/// Running the MPEG-2 CRC over a whole section yields zero when the stored CRC matches.
#[inline]
pub fn verify(section: &[u8]) -> bool {
    checksum(section) == 0
}
