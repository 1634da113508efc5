//! DVB text strings (EN 300 468 Annex A).
//!
//! Strings keep their raw bytes; decoding happens on demand so that
//! provider-compressed text can be handed to an external decompressor.

use std::fmt;

/// Character table selected by the leading byte of a DVB string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharTable {
    /// ISO/IEC 6937 (no selector byte).
    Iso6937,
    /// ISO/IEC 8859 part `n`.
    Iso8859(u8),
    /// ISO/IEC 10646 two-byte big-endian.
    Ucs2,
    /// UTF-8.
    Utf8,
    /// FreeSat Huffman compression with dictionary 1 or 2.
    FreesatHuffman(u8),
    /// Unsupported selector.
    Unknown(u8),
}

/// An undecoded DVB text string.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct DvbString(Box<[u8]>);

impl DvbString {
    /// Wraps raw string bytes, including any character table selector.
    #[inline]
    pub fn from_bytes(data: &[u8]) -> DvbString {
        DvbString(data.into())
    }

    /// Returns the raw bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns `true` if the string holds no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Splits the character table selector from the text bytes.
    pub fn char_table(&self) -> (CharTable, &[u8]) {
        match *self.0 {
            [] => (CharTable::Iso6937, &[]),
            [b @ 0x01..=0x0B, ref rem @ ..] => (CharTable::Iso8859(b + 4), rem),
            [0x10, _, n, ref rem @ ..] => (CharTable::Iso8859(n), rem),
            [0x11, ref rem @ ..] => (CharTable::Ucs2, rem),
            [0x15, ref rem @ ..] => (CharTable::Utf8, rem),
            [0x1F, id @ (1 | 2), ref rem @ ..] => (CharTable::FreesatHuffman(id), rem),
            [b @ 0x00..=0x1F, ref rem @ ..] => (CharTable::Unknown(b), rem),
            _ => (CharTable::Iso6937, &self.0[..]),
        }
    }

    /// Returns the FreeSat dictionary number and the compressed bits, if compressed.
    pub fn freesat_compressed(&self) -> Option<(u8, &[u8])> {
        match self.char_table() {
            (CharTable::FreesatHuffman(id), data) => Some((id, data)),
            _ => None,
        }
    }

    /// Decodes the string.
    ///
    /// Compressed text cannot be decoded here and yields an empty string;
    /// see [`DvbString::freesat_compressed`].
    pub fn decode(&self) -> String {
        let (table, data) = self.char_table();
        match table {
            CharTable::Iso6937 => decode_iso6937(data),
            CharTable::Iso8859(5) => decode_single_byte(data, |b| match b {
                0xA0 => '\u{A0}',
                0xAD => '\u{AD}',
                0xF0 => '\u{2116}',
                0xFD => '\u{A7}',
                _ => char::from_u32(b as u32 + 0x360).unwrap_or(char::REPLACEMENT_CHARACTER),
            }),
            CharTable::Iso8859(15) => decode_single_byte(data, |b| match b {
                0xA4 => '\u{20AC}',
                0xA6 => '\u{160}',
                0xA8 => '\u{161}',
                0xB4 => '\u{17D}',
                0xB8 => '\u{17E}',
                0xBC => '\u{152}',
                0xBD => '\u{153}',
                0xBE => '\u{178}',
                _ => b as char,
            }),
            // other parts share Latin-1 for the ASCII-compatible range
            CharTable::Iso8859(_) => decode_single_byte(data, |b| b as char),
            CharTable::Ucs2 => {
                let units = data
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .filter(|&u| !matches!(u, 0xE080..=0xE09F) || u == 0xE08A)
                    .map(|u| if u == 0xE08A { 0x000A } else { u });
                char::decode_utf16(units)
                    .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                    .collect()
            }
            CharTable::Utf8 => String::from_utf8_lossy(data).into_owned(),
            CharTable::FreesatHuffman(_) => String::new(),
            CharTable::Unknown(b) => {
                log::debug!("unsupported character table 0x{:02X}", b);
                decode_single_byte(data, |b| b as char)
            }
        }
    }
}

impl fmt::Debug for DvbString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.freesat_compressed() {
            Some((id, data)) => write!(f, "DvbString(<huffman {}: {} bytes>)", id, data.len()),
            None => write!(f, "DvbString({:?})", self.decode()),
        }
    }
}

impl fmt::Display for DvbString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.decode())
    }
}

// 0x80-0x9F are control codes in single-byte tables; 0x8A is a line break.
fn decode_single_byte(data: &[u8], map_high: impl Fn(u8) -> char) -> String {
    let mut s = String::with_capacity(data.len());
    for &b in data {
        match b {
            0x8A => s.push('\n'),
            0x80..=0x9F => {}
            0x00..=0x7F => s.push(b as char),
            _ => s.push(map_high(b)),
        }
    }
    s
}

fn decode_iso6937(data: &[u8]) -> String {
    let mut s = String::with_capacity(data.len());
    let mut iter = data.iter().copied();
    while let Some(b) = iter.next() {
        match b {
            0x8A => s.push('\n'),
            0x80..=0x9F => {}
            0x00..=0x7F => s.push(b as char),
            // non-spacing diacritics precede their base letter
            0xC1..=0xCF => {
                let Some(base) = iter.next() else {
                    break;
                };
                s.push(base as char);
                if let Some(mark) = combining_mark(b) {
                    s.push(mark);
                }
            }
            0xA4 => s.push('$'),
            0xA6 => s.push('#'),
            0xE9 => s.push('\u{D8}'),
            0xF9 => s.push('\u{F8}'),
            0xFB => s.push('\u{DF}'),
            _ => s.push(b as char),
        }
    }
    s
}

fn combining_mark(b: u8) -> Option<char> {
    Some(match b {
        0xC1 => '\u{300}',
        0xC2 => '\u{301}',
        0xC3 => '\u{302}',
        0xC4 => '\u{303}',
        0xC5 => '\u{304}',
        0xC6 => '\u{306}',
        0xC7 => '\u{307}',
        0xC8 => '\u{308}',
        0xCA => '\u{30A}',
        0xCB => '\u{327}',
        0xCD => '\u{30B}',
        0xCE => '\u{328}',
        0xCF => '\u{30C}',
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_table() {
        assert_eq!(DvbString::from_bytes(b"News").char_table(), (CharTable::Iso6937, &b"News"[..]));
        assert_eq!(
            DvbString::from_bytes(b"\x05abc").char_table(),
            (CharTable::Iso8859(9), &b"abc"[..]),
        );
        assert_eq!(
            DvbString::from_bytes(b"\x10\x00\x0Fabc").char_table(),
            (CharTable::Iso8859(15), &b"abc"[..]),
        );
        assert_eq!(
            DvbString::from_bytes(b"\x1F\x02\xAB").freesat_compressed(),
            Some((2, &b"\xAB"[..])),
        );
        assert_eq!(DvbString::from_bytes(b"\x1F\x03\xAB").freesat_compressed(), None);
    }

    #[test]
    fn test_decode() {
        assert_eq!(DvbString::from_bytes(b"BBC One").decode(), "BBC One");
        assert_eq!(DvbString::from_bytes(b"\x86Bold\x87\x8Aline").decode(), "Bold\nline");
        assert_eq!(DvbString::from_bytes(b"Caf\xC2e").decode(), "Cafe\u{301}");
        assert_eq!(DvbString::from_bytes(b"\x15Caf\xC3\xA9").decode(), "Café");
        assert_eq!(DvbString::from_bytes(b"\x11\x04\x1F\x04\x30").decode(), "Па");
        assert_eq!(DvbString::from_bytes(b"\x01\xBF\xD0").decode(), "Па");
        assert_eq!(DvbString::from_bytes(b"\x10\x00\x0F\xA4").decode(), "€");
        assert_eq!(DvbString::from_bytes(b"\x1F\x01\xFF").decode(), "");
    }
}
