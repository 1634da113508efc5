//! DSM-CC object carousels.
//!
//! Sections with table_id 0x3B carry DSI and DII messages, sections with
//! table_id 0x3C carry DDB messages. [`Carousel`] assembles them into modules
//! and resolves the BIOP objects stored in those modules by path.

pub mod biop;
pub mod carousel;
pub mod ior;
pub mod message;
pub mod module;

pub use biop::{BiopMessage, Binding, ObjectBody, ObjectKind};
pub use carousel::{Carousel, CarouselError, CarouselState};
pub use ior::{Ior, ObjectAddress, ObjectLocation, Tap};
pub use message::{
    DiiModule, DownloadDataBlock, DownloadInfoIndication, DownloadServerInitiate, DsmccMessage,
};
pub use module::Module;

/// Builders of synthetic carousel data, for tests.
#[cfg(test)]
pub(crate) mod testutil {
    use crate::psi::build_section;

    /// Builds an IOR with one BIOP profile pointing at `module_id`/`key`.
    pub fn ior(type_id: &[u8], module_id: u16, key: &[u8]) -> Vec<u8> {
        let mut location = Vec::new();
        location.extend_from_slice(&0x00000001u32.to_be_bytes());
        location.extend_from_slice(&module_id.to_be_bytes());
        location.extend_from_slice(&[0x01, 0x00, key.len() as u8]);
        location.extend_from_slice(key);

        let mut binder = vec![0x01];
        binder.extend_from_slice(&[0x00, 0x00, 0x00, 0x16, 0x00, 0x0B, 0x0A]);
        binder.extend_from_slice(&[0x00, 0x01, 0x80, 0x00, 0x00, 0x02, 0xFF, 0xFF, 0xFF, 0xFF]);

        let mut profile = vec![0x00, 0x02];
        profile.extend_from_slice(&0x49534F50u32.to_be_bytes());
        profile.push(location.len() as u8);
        profile.extend_from_slice(&location);
        profile.extend_from_slice(&0x49534F40u32.to_be_bytes());
        profile.push(binder.len() as u8);
        profile.extend_from_slice(&binder);

        let mut buf = Vec::new();
        buf.extend_from_slice(&(type_id.len() as u32).to_be_bytes());
        buf.extend_from_slice(type_id);
        buf.extend_from_slice(&1u32.to_be_bytes());
        buf.extend_from_slice(&0x49534F06u32.to_be_bytes());
        buf.extend_from_slice(&(profile.len() as u32).to_be_bytes());
        buf.extend_from_slice(&profile);
        buf
    }

    /// Builds one BIOP message.
    pub fn biop_message(key: &[u8], kind: &[u8; 4], object_info: &[u8], body: &[u8]) -> Vec<u8> {
        let mut rest = vec![key.len() as u8];
        rest.extend_from_slice(key);
        rest.extend_from_slice(&4u32.to_be_bytes());
        rest.extend_from_slice(kind);
        rest.extend_from_slice(&(object_info.len() as u16).to_be_bytes());
        rest.extend_from_slice(object_info);
        rest.push(0x00);
        rest.extend_from_slice(&(body.len() as u32).to_be_bytes());
        rest.extend_from_slice(body);

        let mut buf = b"BIOP\x01\x00\x00\x00".to_vec();
        buf.extend_from_slice(&(rest.len() as u32).to_be_bytes());
        buf.extend_from_slice(&rest);
        buf
    }

    /// Builds the body of a file message.
    pub fn file_body(content: &[u8]) -> Vec<u8> {
        let mut buf = (content.len() as u32).to_be_bytes().to_vec();
        buf.extend_from_slice(content);
        buf
    }

    /// Builds the body of a directory or service gateway message.
    pub fn dir_body(bindings: &[(&str, &[u8; 4], Vec<u8>)]) -> Vec<u8> {
        let mut buf = (bindings.len() as u16).to_be_bytes().to_vec();
        for (name, kind, ior) in bindings {
            buf.push(0x01);
            buf.push(name.len() as u8 + 1);
            buf.extend_from_slice(name.as_bytes());
            buf.push(0x00);
            buf.push(0x04);
            buf.extend_from_slice(&kind[..]);
            buf.push(0x01);
            buf.extend_from_slice(ior);
            buf.extend_from_slice(&[0x00, 0x00]);
        }
        buf
    }

    fn message(table_id: u8, message_id: u16, id: u32, extension: u16, payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![0x11, 0x03];
        buf.extend_from_slice(&message_id.to_be_bytes());
        buf.extend_from_slice(&id.to_be_bytes());
        buf.extend_from_slice(&[0xFF, 0x00]);
        buf.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        buf.extend_from_slice(payload);
        build_section(table_id, extension, 0, 0, 0, &buf)
    }

    /// Builds a DSI section announcing the service gateway `srg_ior`.
    pub fn dsi(transaction_id: u32, srg_ior: &[u8]) -> Vec<u8> {
        let mut private = srg_ior.to_vec();
        private.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

        let mut payload = vec![0xFF; 20];
        payload.extend_from_slice(&[0x00, 0x00]);
        payload.extend_from_slice(&(private.len() as u16).to_be_bytes());
        payload.extend_from_slice(&private);
        message(0x3B, 0x1006, transaction_id, transaction_id as u16, &payload)
    }

    /// Builds the ModuleInfo of a module, optionally marked as zlib-compressed.
    pub fn module_info(original_size: Option<u32>) -> Vec<u8> {
        let mut buf = vec![0xFF; 12];
        buf.extend_from_slice(&[0x01, 0x00, 0x00, 0x00, 0x17, 0x00, 0x0B, 0x00]);
        match original_size {
            Some(size) => {
                buf.extend_from_slice(&[0x07, 0x09, 0x05, 0x08]);
                buf.extend_from_slice(&size.to_be_bytes());
            }
            None => buf.push(0x00),
        }
        buf
    }

    /// Builds a DII section listing `(module_id, size, version, info)`.
    pub fn dii(download_id: u32, block_size: u16, modules: &[(u16, u32, u8, Vec<u8>)]) -> Vec<u8> {
        let mut payload = download_id.to_be_bytes().to_vec();
        payload.extend_from_slice(&block_size.to_be_bytes());
        payload.extend_from_slice(&[0x00; 10]);
        payload.extend_from_slice(&[0x00, 0x00]);
        payload.extend_from_slice(&(modules.len() as u16).to_be_bytes());
        for (id, size, version, info) in modules {
            payload.extend_from_slice(&id.to_be_bytes());
            payload.extend_from_slice(&size.to_be_bytes());
            payload.push(*version);
            payload.push(info.len() as u8);
            payload.extend_from_slice(info);
        }
        payload.extend_from_slice(&[0x00, 0x00]);
        message(0x3B, 0x1002, 0x8000_0002, 0x0002, &payload)
    }

    /// Builds a DDB section.
    pub fn ddb(download_id: u32, module_id: u16, version: u8, block: u16, data: &[u8]) -> Vec<u8> {
        let mut payload = module_id.to_be_bytes().to_vec();
        payload.extend_from_slice(&[version, 0xFF]);
        payload.extend_from_slice(&block.to_be_bytes());
        payload.extend_from_slice(data);
        message(0x3C, 0x1003, download_id, module_id, &payload)
    }
}
