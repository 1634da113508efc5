use std::fmt;

/// Byte-slice readers used by every section parser.
///
/// The fixed-width readers index directly and therefore expect the caller to
/// have checked the slice length beforehand, which every parser does through
/// slice patterns or `split_at_checked`.
pub trait BytesExt {
    /// Reads a big-endian `u16` from the first two bytes.
    fn read_be_16(&self) -> u16;

    /// Reads a big-endian 24-bit value from the first three bytes.
    fn read_be_24(&self) -> u32;

    /// Reads a big-endian `u32` from the first four bytes.
    fn read_be_32(&self) -> u32;

    /// Reads `digits` BCD digits, most significant nibble first.
    ///
    /// Nibbles above 9 are taken at face value; use
    /// [`read_bcd_checked`][BytesExt::read_bcd_checked] where that is a fault.
    fn read_bcd(&self, digits: usize) -> u32;

    /// Reads `digits` BCD digits, returning `None` on a nibble above 9.
    fn read_bcd_checked(&self, digits: usize) -> Option<u32>;
}

impl BytesExt for [u8] {
    #[inline]
    fn read_be_16(&self) -> u16 {
        u16::from_be_bytes([self[0], self[1]])
    }

    #[inline]
    fn read_be_24(&self) -> u32 {
        u32::from_be_bytes([0, self[0], self[1], self[2]])
    }

    #[inline]
    fn read_be_32(&self) -> u32 {
        u32::from_be_bytes([self[0], self[1], self[2], self[3]])
    }

    fn read_bcd(&self, digits: usize) -> u32 {
        (0..digits).fold(0, |acc, i| acc * 10 + nibble(self, i) as u32)
    }

    fn read_bcd_checked(&self, digits: usize) -> Option<u32> {
        (0..digits).try_fold(0, |acc, i| {
            let n = nibble(self, i);
            (n <= 9).then(|| acc * 10 + n as u32)
        })
    }
}

#[inline]
fn nibble(data: &[u8], i: usize) -> u8 {
    let byte = data[i / 2];
    if i % 2 == 0 {
        byte >> 4
    } else {
        byte & 0x0F
    }
}

/// Decodes one packed BCD byte, e.g. `0x59` into `59`.
#[inline]
pub fn read_bcd_digit(byte: u8) -> Option<u8> {
    let (h, l) = (byte >> 4, byte & 0x0F);
    (h <= 9 && l <= 9).then_some(h * 10 + l)
}

/// Prints the wrapped value as hex in `Debug` output.
pub struct UpperHex<T>(pub T);

impl<T: fmt::UpperHex> fmt::Debug for UpperHex<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// Implements `Display`, `LowerHex` and `UpperHex` for a newtype exposing `get()`.
macro_rules! delegate_fmt {
    ($ty:ty) => {
        impl std::fmt::Display for $ty {
            #[inline]
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.get(), f)
            }
        }

        impl std::fmt::LowerHex for $ty {
            #[inline]
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                std::fmt::LowerHex::fmt(&self.get(), f)
            }
        }

        impl std::fmt::UpperHex for $ty {
            #[inline]
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                std::fmt::UpperHex::fmt(&self.get(), f)
            }
        }
    };
}

pub(crate) use delegate_fmt;

/// Wraps byte payloads so `Debug` prints their length instead of the contents.
pub(crate) struct PrintBytes<'a>(pub &'a [u8]);

impl fmt::Debug for PrintBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} bytes", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_be_u16() {
        assert_eq!(b"\x12\x34\x56\x78".read_be_16(), 0x1234);
    }

    #[test]
    fn test_read_be_u24() {
        assert_eq!(b"\x12\x34\x56\x78".read_be_24(), 0x123456);
    }

    #[test]
    fn test_read_be_u32() {
        assert_eq!(b"\x12\x34\x56\x78\x9A\xBC\xDE".read_be_32(), 0x12345678);
    }

    #[test]
    fn test_read_bcd() {
        assert_eq!(b"\x01\x23\x45\x67".read_bcd(8), 1234567);
        assert_eq!(b"\x01\x23\x45\x67".read_bcd(7), 123456);
        assert_eq!(b"\x12\x3A".read_bcd_checked(3), Some(123));
        assert_eq!(b"\x12\x3A".read_bcd_checked(4), None);
    }

    #[test]
    fn test_read_bcd_digit() {
        assert_eq!(read_bcd_digit(0x59), Some(59));
        assert_eq!(read_bcd_digit(0x00), Some(0));
        assert_eq!(read_bcd_digit(0x5A), None);
        assert_eq!(read_bcd_digit(0xA0), None);
    }
}
