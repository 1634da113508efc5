//! Block-wise download of carousel modules.

use std::borrow::Cow;
use std::io::Read;

use flate2::read::ZlibDecoder;

use super::message::{CompressedModule, DiiModule, DownloadDataBlock, DownloadInfoIndication};

/// Largest module size accepted from a DII, before and after inflation.
pub const MAX_MODULE_SIZE: usize = 16 * 1024 * 1024;

/// Number of blocks a 16-bit blockNumber can address.
const MAX_BLOCKS: usize = u16::MAX as usize + 1;

/// A module being downloaded from DDB messages announced by a DII.
///
/// A module is identified by its id and version. Blocks of another version,
/// out-of-range block numbers and duplicate blocks are ignored.
#[derive(Debug, Clone)]
pub struct Module {
    module_id: u16,
    version: u8,
    download_id: u32,
    block_size: u16,
    compressed: Option<CompressedModule>,
    data: Vec<u8>,
    received: Vec<bool>,
    received_bytes: usize,
}

impl Module {
    /// Creates a `Module` for `module` announced by `dii`.
    ///
    /// Returns `None` if the module is larger than [`MAX_MODULE_SIZE`] or needs
    /// more blocks than a DDB can number.
    pub fn new(dii: &DownloadInfoIndication, module: &DiiModule) -> Option<Module> {
        let size = module.module_size as usize;
        let block_size = dii.block_size.max(1);
        let n_blocks = (size + block_size as usize - 1) / block_size as usize;
        if size > MAX_MODULE_SIZE || n_blocks > MAX_BLOCKS {
            log::debug!(
                "Module {}: {} bytes in blocks of {} rejected",
                module.module_id,
                size,
                block_size
            );
            return None;
        }

        Some(Module {
            module_id: module.module_id,
            version: module.module_version,
            download_id: dii.download_id,
            block_size,
            compressed: module.info().and_then(|info| info.compressed()),
            data: vec![0; size],
            received: vec![false; n_blocks],
            received_bytes: 0,
        })
    }

    /// moduleId
    #[inline]
    pub fn module_id(&self) -> u16 {
        self.module_id
    }

    /// moduleVersion
    #[inline]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// moduleSize
    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Number of bytes received so far.
    #[inline]
    pub fn received_bytes(&self) -> usize {
        self.received_bytes
    }

    /// Returns whether the module carries compressed data.
    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.compressed.is_some()
    }

    /// Returns whether every byte of the module has been received.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.received_bytes == self.data.len()
    }

    /// Stores `block` and returns whether it was accepted.
    pub fn store(&mut self, block: &DownloadDataBlock) -> bool {
        if block.module_id != self.module_id
            || block.module_version != self.version
            || block.download_id() != self.download_id
        {
            return false;
        }

        let index = block.block_number as usize;
        let Some(received) = self.received.get_mut(index) else {
            log::debug!(
                "Module {}: block {} out of range",
                self.module_id,
                block.block_number
            );
            return false;
        };
        if *received {
            return false;
        }

        let offset = index * self.block_size as usize;
        let size = (self.data.len() - offset).min(self.block_size as usize);
        let Some(block_data) = block.block_data.get(..size) else {
            log::debug!("Module {}: block {} is too small", self.module_id, index);
            return false;
        };

        self.data[offset..offset + size].copy_from_slice(block_data);
        *received = true;
        self.received_bytes += size;
        true
    }

    /// Discards every received block.
    pub fn reset(&mut self) {
        self.received.fill(false);
        self.received_bytes = 0;
    }

    /// Returns the module payload, inflated if the module is compressed.
    ///
    /// Returns `None` until the module is complete.
    pub fn payload(&self) -> Option<std::io::Result<Cow<'_, [u8]>>> {
        if !self.is_complete() {
            return None;
        }

        let Some(compressed) = self.compressed else {
            return Some(Ok(Cow::Borrowed(&self.data)));
        };

        let capacity = (compressed.original_size as usize).min(MAX_MODULE_SIZE);
        let mut inflated = Vec::with_capacity(capacity);
        let mut decoder = ZlibDecoder::new(&*self.data).take(MAX_MODULE_SIZE as u64);
        if let Err(e) = decoder.read_to_end(&mut inflated) {
            return Some(Err(e));
        }
        if inflated.len() != compressed.original_size as usize {
            log::warn!(
                "Module {}: inflated to {} bytes, expected {}",
                self.module_id,
                inflated.len(),
                compressed.original_size
            );
        }
        Some(Ok(Cow::Owned(inflated)))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    use crate::dsmcc::message::DsmccMessage;
    use crate::dsmcc::testutil;
    use crate::psi::Section;

    use super::*;

    fn dii(buf: &[u8]) -> DownloadInfoIndication {
        let (section, _) = Section::parse(buf).unwrap();
        assert_matches!(DsmccMessage::read(&section), Some(DsmccMessage::Dii(dii)) => dii)
    }

    fn ddb(buf: &[u8]) -> DownloadDataBlock {
        let (section, _) = Section::parse(buf).unwrap();
        assert_matches!(DsmccMessage::read(&section), Some(DsmccMessage::Ddb(ddb)) => ddb)
    }

    #[test]
    fn test_store() {
        let dii = dii(&testutil::dii(0x10, 4, &[(1, 10, 2, testutil::module_info(None))]));
        let mut module = Module::new(&dii, &dii.modules[0]).unwrap();
        assert_eq!(module.size(), 10);
        assert!(!module.is_complete());
        assert!(module.payload().is_none());

        assert!(module.store(&ddb(&testutil::ddb(0x10, 1, 2, 2, b"ij"))));
        // duplicate block
        assert!(!module.store(&ddb(&testutil::ddb(0x10, 1, 2, 2, b"ij"))));
        // other version, other download, out of range
        assert!(!module.store(&ddb(&testutil::ddb(0x10, 1, 3, 0, b"abcd"))));
        assert!(!module.store(&ddb(&testutil::ddb(0x11, 1, 2, 0, b"abcd"))));
        assert!(!module.store(&ddb(&testutil::ddb(0x10, 1, 2, 3, b"abcd"))));
        // short block
        assert!(!module.store(&ddb(&testutil::ddb(0x10, 1, 2, 0, b"abc"))));
        assert_eq!(module.received_bytes(), 2);

        assert!(module.store(&ddb(&testutil::ddb(0x10, 1, 2, 1, b"efgh"))));
        assert!(module.store(&ddb(&testutil::ddb(0x10, 1, 2, 0, b"abcd"))));
        assert!(module.is_complete());
        assert_eq!(&*module.payload().unwrap().unwrap(), b"abcdefghij");

        module.reset();
        assert!(!module.is_complete());
    }

    #[test]
    fn test_compressed() {
        let original = b"compressed module content".repeat(8);
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&original).unwrap();
        let compressed = encoder.finish().unwrap();

        let dii = dii(&testutil::dii(
            0x10,
            4066,
            &[(
                3,
                compressed.len() as u32,
                1,
                testutil::module_info(Some(original.len() as u32)),
            )],
        ));
        let mut module = Module::new(&dii, &dii.modules[0]).unwrap();
        assert!(module.is_compressed());
        assert!(module.store(&ddb(&testutil::ddb(0x10, 3, 1, 0, &compressed))));
        assert_eq!(&*module.payload().unwrap().unwrap(), &original[..]);
    }

    #[test]
    fn test_oversized_module() {
        let announce = |block_size, module_size| {
            dii(&testutil::dii(
                0x10,
                block_size,
                &[(1, module_size, 0, testutil::module_info(None))],
            ))
        };

        // 1-byte blocks: more blocks than blockNumber can address
        let too_many_blocks = announce(1, 100_000);
        assert!(Module::new(&too_many_blocks, &too_many_blocks.modules[0]).is_none());
        let too_large = announce(4066, u32::MAX);
        assert!(Module::new(&too_large, &too_large.modules[0]).is_none());

        let largest = announce(1, 65_536);
        let module = Module::new(&largest, &largest.modules[0]).unwrap();
        assert_eq!(module.size(), 65_536);
    }
}
