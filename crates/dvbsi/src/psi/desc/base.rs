//! Basic descriptor types.

use std::fmt;

use crate::utils::BytesExt;

use super::{Descriptor, DescriptorScope};

/// A descriptor decoder.
pub trait DecodeDescriptor: Sized {
    /// descriptor_tag of this descriptor.
    const TAG: u8;

    /// Decodes the descriptor from `data`.
    ///
    /// `data` excludes descriptor_tag and descriptor_length.
    fn read(data: &[u8]) -> Option<Self>;
}

/// A decoder for a descriptor carried under extension tag `0x7F`.
pub trait DecodeExtensionDescriptor: Sized {
    /// descriptor_tag_extension of this descriptor.
    const TAG_EXTENSION: u8;

    /// Decodes the descriptor from `data`.
    ///
    /// `data` excludes descriptor_tag, descriptor_length and descriptor_tag_extension.
    fn read(data: &[u8]) -> Option<Self>;
}

/// A descriptor kept as raw bytes.
///
/// Produced for tags unknown in the current scope and for payloads that
/// failed to decode.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct OpaqueDescriptor {
    /// descriptor_tag
    pub tag: u8,
    /// Payload without tag and length.
    pub data: Box<[u8]>,
}

impl OpaqueDescriptor {
    /// Total length including tag and length bytes.
    #[inline]
    pub fn total_len(&self) -> usize {
        2 + self.data.len()
    }
}

impl fmt::Debug for OpaqueDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("OpaqueDescriptor")
            .field("tag", &crate::utils::UpperHex(self.tag))
            .field("data", &crate::utils::PrintBytes(&self.data))
            .finish()
    }
}

/// An undecoded descriptor borrowed from a section.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RawDescriptor<'a> {
    /// descriptor_tag
    pub tag: u8,
    /// Payload without tag and length.
    pub data: &'a [u8],
}

impl fmt::Debug for RawDescriptor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RawDescriptor")
            .field("tag", &crate::utils::UpperHex(self.tag))
            .field("data", &crate::utils::PrintBytes(self.data))
            .finish()
    }
}

/// A descriptor loop borrowed from a section.
#[derive(Clone, PartialEq, Eq)]
pub struct DescriptorBlock<'a>(&'a [u8]);

impl<'a> DescriptorBlock<'a> {
    /// Wraps exactly `data` as a descriptor loop.
    #[inline]
    pub fn new(data: &'a [u8]) -> DescriptorBlock<'a> {
        DescriptorBlock(data)
    }

    /// Splits a `length`-byte loop off `data` and returns it with the remainder.
    ///
    /// Returns `None` if `data` is shorter than `length`.
    pub fn read_with_len(data: &'a [u8], length: u16) -> Option<(DescriptorBlock<'a>, &'a [u8])> {
        let (block, rem) = data.split_at_checked(length as usize)?;
        Some((DescriptorBlock(block), rem))
    }

    /// Reads a loop prefixed by a 12-bit length and returns it with the remainder.
    ///
    /// Returns `None` if `data` is shorter than the prefix or the declared length.
    #[inline]
    pub fn read(data: &'a [u8]) -> Option<(DescriptorBlock<'a>, &'a [u8])> {
        if data.len() < 2 {
            return None;
        }

        let length = data[0..=1].read_be_16() & 0b0000_1111_1111_1111;
        DescriptorBlock::read_with_len(&data[2..], length)
    }

    /// Returns the raw bytes of the loop.
    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.0
    }

    /// Iterates the raw descriptors.
    #[inline]
    pub fn iter(&self) -> DescriptorIter<'a> {
        DescriptorIter(self.0)
    }

    /// Decodes the first descriptor whose tag matches `T`.
    pub fn get<T: DecodeDescriptor>(&self) -> Option<T> {
        self.iter().find(|d| d.tag == T::TAG).and_then(|d| T::read(d.data))
    }

    /// Decodes every descriptor whose tag matches `T`.
    pub fn get_all<T: DecodeDescriptor>(&self) -> impl Iterator<Item = T> + 'a {
        self.iter()
            .filter(|d| d.tag == T::TAG)
            .filter_map(|d| T::read(d.data))
    }

    /// Decodes the whole loop through the registry for `scope`.
    pub fn decode(&self, scope: DescriptorScope) -> Vec<Descriptor> {
        super::read_loop(self.0, scope)
    }
}

impl fmt::Debug for DescriptorBlock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("DescriptorBlock(")?;
        f.debug_list().entries(self).finish()?;
        f.write_str(")")
    }
}

impl<'a> IntoIterator for &DescriptorBlock<'a> {
    type Item = RawDescriptor<'a>;
    type IntoIter = DescriptorIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a [`DescriptorBlock`].
///
/// Iteration ends at the first descriptor whose declared length overruns the loop.
#[derive(Clone)]
pub struct DescriptorIter<'a>(&'a [u8]);

impl<'a> Iterator for DescriptorIter<'a> {
    type Item = RawDescriptor<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let [tag, length, ref rem @ ..] = *self.0 else {
            return None;
        };
        let Some((data, tail)) = rem.split_at_checked(length as usize) else {
            self.0 = &[];
            return None;
        };

        self.0 = tail;
        Some(RawDescriptor { tag, data })
    }
}

impl std::iter::FusedIterator for DescriptorIter<'_> {}

impl fmt::Debug for DescriptorIter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DescriptorIter(")?;
        f.debug_list().entries(self.clone()).finish()?;
        f.write_str(")")
    }
}

/// Splits a field prefixed by an 8-bit length.
#[inline]
pub(crate) fn split_len8(data: &[u8]) -> Option<(&[u8], &[u8])> {
    let [length, ref rem @ ..] = *data else {
        return None;
    };
    rem.split_at_checked(length as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_iter() {
        let block = DescriptorBlock::new(&[0x40, 0x02, b'A', b'B', 0x5F, 0x00, 0x48, 0x05, 0x01]);
        let descs = block.iter().collect::<Vec<_>>();
        assert_eq!(
            descs,
            [
                RawDescriptor {
                    tag: 0x40,
                    data: b"AB",
                },
                RawDescriptor { tag: 0x5F, data: &[] },
            ],
        );
    }

    #[test]
    fn test_read_block() {
        let (block, rem) = DescriptorBlock::read(&[0xF0, 0x02, 0x52, 0x00, 0xAA]).unwrap();
        assert_eq!(block.as_bytes(), &[0x52, 0x00]);
        assert_eq!(rem, &[0xAA]);
        assert!(DescriptorBlock::read(&[0xF0, 0x03, 0x52, 0x00]).is_none());
    }

    #[test]
    fn test_split_len8() {
        assert_eq!(split_len8(&[2, 1, 2, 3]), Some((&[1, 2][..], &[3][..])));
        assert_eq!(split_len8(&[4, 1, 2, 3]), None);
        assert_eq!(split_len8(&[]), None);
    }
}
