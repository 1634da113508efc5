//! PSI/SI sections.

pub mod collection;
pub mod desc;
pub mod table;

use thiserror::Error;

use crate::utils::BytesExt;

pub use collection::{Completeness, Insertion, SectionCollection};

/// Errors returned by [`Section::parse`].
///
/// Errors raised once the section length is known carry that length so the
/// caller can skip the section and stay in sync.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SectionError {
    /// The buffer is shorter than the header or the declared section length.
    #[error("truncated section")]
    Truncated,

    /// The buffer starts with stuffing (`0xFF`).
    #[error("reached to end of sections")]
    EndOfSections,

    /// The section is too short for its declared syntax.
    ///
    /// The contained `usize` is the full section length.
    #[error("corrupt section")]
    Corrupted(usize),

    /// The CRC32 does not match.
    ///
    /// The contained `usize` is the full section length.
    #[error("crc32 error")]
    Crc32(usize),
}

/// A PSI/SI section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section<'a> {
    /// table_id
    pub table_id: u8,
    /// Extended header, present when section_syntax_indicator is set.
    pub syntax: Option<SectionSyntax>,
    /// Declared 12-bit section_length.
    pub section_length: u16,
    /// Payload after the header, excluding the trailing CRC.
    pub data: &'a [u8],
    /// Trailing CRC32 or checksum.
    pub crc32: u32,
}

impl<'a> Section<'a> {
    /// Parses one section and returns it together with the total section length.
    ///
    /// The CRC32 of sections carrying the extended header is verified.
    pub fn parse(buf: &'a [u8]) -> Result<(Section<'a>, usize), SectionError> {
        Section::parse_inner(buf, true)
    }

    /// Parses one section without verifying its CRC32.
    ///
    /// DSM-CC sections may carry a checksum in place of the CRC, and synthetic
    /// sections built by tests carry neither.
    pub fn parse_unchecked(buf: &'a [u8]) -> Result<(Section<'a>, usize), SectionError> {
        Section::parse_inner(buf, false)
    }

    fn parse_inner(buf: &'a [u8], verify: bool) -> Result<(Section<'a>, usize), SectionError> {
        let [table_id, b1, b2, ..] = *buf else {
            return Err(SectionError::Truncated);
        };
        if table_id == 0xFF {
            return Err(SectionError::EndOfSections);
        }
        let section_syntax_indicator = b1 & 0b10000000 != 0;
        let section_length = u16::from_be_bytes([b1, b2]) & 0b0000_1111_1111_1111;

        let Some(section) = buf.get(..3 + section_length as usize) else {
            return Err(SectionError::Truncated);
        };

        let (syntax, data) = if section_syntax_indicator {
            if section.len() < 3 + 5 + 4 {
                return Err(SectionError::Corrupted(section.len()));
            }
            if verify && !crate::crc::verify(section) {
                return Err(SectionError::Crc32(section.len()));
            }

            let syntax = SectionSyntax {
                table_id_extension: section[3..=4].read_be_16(),
                version_number: (section[5] & 0b00111110) >> 1,
                current_next_indicator: section[5] & 0b00000001 != 0,
                section_number: section[6],
                last_section_number: section[7],
            };
            (Some(syntax), &section[8..section.len() - 4])
        } else {
            // short sections (TDT) carry no CRC
            (None, &section[3..])
        };

        let crc32 = if section_syntax_indicator {
            section[section.len() - 4..].read_be_32()
        } else {
            0
        };

        Ok((
            Section {
                table_id,
                syntax,
                section_length,
                data,
                crc32,
            },
            section.len(),
        ))
    }

    /// Returns the extended header or [`SectionError::Corrupted`] if absent.
    pub fn require_syntax(&self) -> Result<&SectionSyntax, SectionError> {
        self.syntax
            .as_ref()
            .ok_or(SectionError::Corrupted(3 + self.section_length as usize))
    }
}

/// The extended section header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectionSyntax {
    /// table_id_extension
    pub table_id_extension: u16,
    /// version_number (5 bits)
    pub version_number: u8,
    /// current_next_indicator
    pub current_next_indicator: bool,
    /// section_number
    pub section_number: u8,
    /// last_section_number
    pub last_section_number: u8,
}

/// A table decoded from a single section.
pub trait PsiTable: Sized {
    /// Decodes the table carried by `section`.
    fn read(section: &Section) -> Result<Self, table::TableError>;
}

/// Builds a section with a valid CRC, for tests.
#[cfg(test)]
pub(crate) fn build_section(
    table_id: u8,
    table_id_extension: u16,
    version: u8,
    section_number: u8,
    last_section_number: u8,
    payload: &[u8],
) -> Vec<u8> {
    let section_length = (5 + payload.len() + 4) as u16;
    let mut buf = vec![
        table_id,
        0xB0 | (section_length >> 8) as u8,
        section_length as u8,
    ];
    buf.extend_from_slice(&table_id_extension.to_be_bytes());
    buf.push(0xC1 | (version << 1));
    buf.push(section_number);
    buf.push(last_section_number);
    buf.extend_from_slice(payload);
    let crc = crate::crc::checksum(&buf);
    buf.extend_from_slice(&crc.to_be_bytes());
    buf
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_parse() {
        let buf = build_section(0x42, 0x0801, 3, 1, 2, &[0xAA, 0xBB]);
        let (section, len) = Section::parse(&buf).unwrap();
        assert_eq!(len, buf.len());
        assert_eq!(section.table_id, 0x42);
        assert_eq!(section.section_length, 11);
        assert_eq!(section.data, &[0xAA, 0xBB]);
        assert_eq!(
            section.syntax,
            Some(SectionSyntax {
                table_id_extension: 0x0801,
                version_number: 3,
                current_next_indicator: true,
                section_number: 1,
                last_section_number: 2,
            }),
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_matches!(Section::parse(&[0x42, 0xB0]), Err(SectionError::Truncated));
        assert_matches!(Section::parse(&[0xFF, 0xFF, 0xFF]), Err(SectionError::EndOfSections));

        let buf = build_section(0x42, 0x0801, 3, 0, 0, &[0xAA, 0xBB]);
        assert_matches!(
            Section::parse(&buf[..buf.len() - 1]),
            Err(SectionError::Truncated)
        );

        let mut corrupt = buf.clone();
        corrupt[9] ^= 0xFF;
        assert_matches!(Section::parse(&corrupt), Err(SectionError::Crc32(14)));
        assert_matches!(Section::parse_unchecked(&corrupt), Ok((_, 14)));

        assert_matches!(
            Section::parse(&[0x42, 0xB0, 0x03, 0x00, 0x01, 0xC1]),
            Err(SectionError::Corrupted(6))
        );
    }

    #[test]
    fn test_parse_short_section() {
        // TDT: 2024-03-10 20:30:00
        let (section, len) =
            Section::parse(&[0x70, 0x70, 0x05, 0xEB, 0xDB, 0x20, 0x30, 0x00, 0xFF]).unwrap();
        assert_eq!(len, 8);
        assert_eq!(section.syntax, None);
        assert_eq!(section.data, &[0xEB, 0xDB, 0x20, 0x30, 0x00]);
    }
}
