//! DSI, DII and DDB messages.

use crate::psi::Section;
use crate::utils::BytesExt;

use super::ior::{Ior, Tap};

/// dsmccAdaptationHeader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DsmccAdaptationHeader {
    /// adaptationType
    pub adaptation_type: u8,
    /// adaptationDataByte
    pub adaptation_data: Box<[u8]>,
}

/// dsmccMessageHeader, or dsmccDownloadDataHeader for DDB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DsmccMessageHeader {
    /// protocolDiscriminator, 0x11 for MPEG-2 DSM-CC.
    pub protocol_discriminator: u8,
    /// dsmccType
    pub dsmcc_type: u8,
    /// messageId
    pub message_id: u16,
    /// transactionId, or downloadId for DDB.
    pub transaction_id: u32,
    /// Adaptation header.
    pub adaptation: Option<DsmccAdaptationHeader>,
}

impl DsmccMessageHeader {
    /// Reads the header and returns it with the message payload.
    ///
    /// The payload is cut to messageLength when the section holds more.
    pub fn read(data: &[u8]) -> Option<(DsmccMessageHeader, &[u8])> {
        if data.len() < 12 {
            log::debug!("invalid DsmccMessageHeader");
            return None;
        }

        let protocol_discriminator = data[0];
        let dsmcc_type = data[1];
        let message_id = data[2..=3].read_be_16();
        let transaction_id = data[4..=7].read_be_32();
        let adaptation_length = data[9] as usize;
        let message_length = data[10..=11].read_be_16() as usize;

        let Some((adaptation, payload)) = data[12..].split_at_checked(adaptation_length) else {
            log::debug!("invalid DsmccMessageHeader::adaptation");
            return None;
        };
        let adaptation = match *adaptation {
            [] => None,
            [adaptation_type, ref adaptation_data @ ..] => Some(DsmccAdaptationHeader {
                adaptation_type,
                adaptation_data: adaptation_data.into(),
            }),
        };

        let payload_length = message_length.saturating_sub(adaptation_length);
        let payload = payload.get(..payload_length).unwrap_or(payload);

        Some((
            DsmccMessageHeader {
                protocol_discriminator,
                dsmcc_type,
                message_id,
                transaction_id,
                adaptation,
            },
            payload,
        ))
    }
}

/// Splits a field prefixed by a 16-bit length off `data`.
fn split_len16<'a>(data: &'a [u8], what: &'static str) -> Option<(&'a [u8], &'a [u8])> {
    if data.len() < 2 {
        log::debug!("invalid {}", what);
        return None;
    }
    let length = data[0..=1].read_be_16() as usize;
    let Some(pair) = data[2..].split_at_checked(length) else {
        log::debug!("invalid {}", what);
        return None;
    };
    Some(pair)
}

/// DownloadServerInitiate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadServerInitiate {
    /// Message header.
    pub header: DsmccMessageHeader,
    /// serverId
    pub server_id: [u8; 20],
    /// privateDataByte
    pub private_data: Box<[u8]>,
    /// IOR of the service gateway, read from the ServiceGatewayInfo in
    /// privateDataByte.
    pub service_gateway: Option<Ior>,
}

impl DownloadServerInitiate {
    /// messageId of DSI.
    pub const MESSAGE_ID: u16 = 0x1006;

    fn read(header: DsmccMessageHeader, data: &[u8]) -> Option<DownloadServerInitiate> {
        let Some((server_id, data)) = data.split_first_chunk::<20>() else {
            log::debug!("invalid DownloadServerInitiate::server_id");
            return None;
        };
        let (_compatibility_descriptor, data) =
            split_len16(data, "DownloadServerInitiate::compatibility_descriptor")?;
        let (private_data, _) = split_len16(data, "DownloadServerInitiate::private_data")?;

        let service_gateway = Ior::read(private_data).map(|(ior, _)| ior);
        if service_gateway.is_none() {
            log::debug!("DownloadServerInitiate without ServiceGatewayInfo");
        }

        Some(DownloadServerInitiate {
            header,
            server_id: *server_id,
            private_data: private_data.into(),
            service_gateway,
        })
    }

    /// transactionId of the message.
    #[inline]
    pub fn transaction_id(&self) -> u32 {
        self.header.transaction_id
    }
}

/// compressed_module_descriptor in the userInfo of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedModule {
    /// compression_method, 0x08 for zlib.
    pub compression_method: u8,
    /// original_size
    pub original_size: u32,
}

impl CompressedModule {
    /// descriptor_tag of compressed_module_descriptor.
    pub const TAG: u8 = 0x09;
}

/// BIOP::ModuleInfo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    /// moduleTimeOut
    pub module_timeout: u32,
    /// blockTimeOut
    pub block_timeout: u32,
    /// minBlockTime
    pub min_block_time: u32,
    /// taps
    pub taps: Vec<Tap>,
    /// userInfo descriptors.
    pub user_info: Box<[u8]>,
}

impl ModuleInfo {
    /// Reads a ModuleInfo.
    pub fn read(data: &[u8]) -> Option<ModuleInfo> {
        if data.len() < 13 {
            log::debug!("invalid ModuleInfo");
            return None;
        }

        let module_timeout = data[0..=3].read_be_32();
        let block_timeout = data[4..=7].read_be_32();
        let min_block_time = data[8..=11].read_be_32();
        let taps_count = data[12];
        let mut data = &data[13..];

        let mut taps = Vec::with_capacity(taps_count as usize);
        for _ in 0..taps_count {
            let (tap, rem) = Tap::read(data)?;
            data = rem;
            taps.push(tap);
        }

        let Some((&user_info_length, data)) = data.split_first() else {
            log::debug!("invalid ModuleInfo::user_info_length");
            return None;
        };
        let Some(user_info) = data.get(..user_info_length as usize) else {
            log::debug!("invalid ModuleInfo::user_info");
            return None;
        };

        Some(ModuleInfo {
            module_timeout,
            block_timeout,
            min_block_time,
            taps,
            user_info: user_info.into(),
        })
    }

    /// Returns the compressed_module_descriptor, if any.
    pub fn compressed(&self) -> Option<CompressedModule> {
        let mut data = &*self.user_info;
        while let [tag, length, ref rem @ ..] = *data {
            let Some((body, rem)) = rem.split_at_checked(length as usize) else {
                log::debug!("invalid ModuleInfo::user_info");
                return None;
            };
            data = rem;

            if tag == CompressedModule::TAG && body.len() >= 5 {
                return Some(CompressedModule {
                    compression_method: body[0],
                    original_size: body[1..=4].read_be_32(),
                });
            }
        }
        None
    }
}

/// A module announced by [`DownloadInfoIndication`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiiModule {
    /// moduleId
    pub module_id: u16,
    /// moduleSize
    pub module_size: u32,
    /// moduleVersion
    pub module_version: u8,
    /// moduleInfoByte
    pub module_info: Box<[u8]>,
}

impl DiiModule {
    /// Reads the moduleInfoByte as BIOP::ModuleInfo.
    #[inline]
    pub fn info(&self) -> Option<ModuleInfo> {
        ModuleInfo::read(&self.module_info)
    }
}

/// DownloadInfoIndication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadInfoIndication {
    /// Message header.
    pub header: DsmccMessageHeader,
    /// downloadId
    pub download_id: u32,
    /// blockSize
    pub block_size: u16,
    /// windowSize
    pub window_size: u8,
    /// ackPeriod
    pub ack_period: u8,
    /// tCDownloadWindow
    pub t_c_download_window: u32,
    /// tCDownloadScenario
    pub t_c_download_scenario: u32,
    /// Announced modules.
    pub modules: Vec<DiiModule>,
    /// privateDataByte
    pub private_data: Box<[u8]>,
}

impl DownloadInfoIndication {
    /// messageId of DII.
    pub const MESSAGE_ID: u16 = 0x1002;

    fn read(header: DsmccMessageHeader, data: &[u8]) -> Option<DownloadInfoIndication> {
        if data.len() < 16 {
            log::debug!("invalid DownloadInfoIndication");
            return None;
        }

        let download_id = data[0..=3].read_be_32();
        let block_size = data[4..=5].read_be_16();
        let window_size = data[6];
        let ack_period = data[7];
        let t_c_download_window = data[8..=11].read_be_32();
        let t_c_download_scenario = data[12..=15].read_be_32();
        let (_compatibility_descriptor, data) = split_len16(
            &data[16..],
            "DownloadInfoIndication::compatibility_descriptor",
        )?;
        if data.len() < 2 {
            log::debug!("invalid DownloadInfoIndication::number_of_modules");
            return None;
        }
        let number_of_modules = data[0..=1].read_be_16();
        let mut data = &data[2..];

        let mut modules = Vec::with_capacity(number_of_modules as usize);
        for _ in 0..number_of_modules {
            if data.len() < 8 {
                log::debug!("invalid DownloadInfoIndication::modules");
                return None;
            }

            let module_id = data[0..=1].read_be_16();
            let module_size = data[2..=5].read_be_32();
            let module_version = data[6];
            let Some((module_info, rem)) = data[8..].split_at_checked(data[7] as usize) else {
                log::debug!("invalid DiiModule::module_info");
                return None;
            };
            data = rem;

            modules.push(DiiModule {
                module_id,
                module_size,
                module_version,
                module_info: module_info.into(),
            });
        }

        let private_data = split_len16(data, "DownloadInfoIndication::private_data")
            .map_or(&[][..], |(private_data, _)| private_data);

        if block_size == 0 {
            log::debug!("invalid DownloadInfoIndication::block_size");
            return None;
        }

        Some(DownloadInfoIndication {
            header,
            download_id,
            block_size,
            window_size,
            ack_period,
            t_c_download_window,
            t_c_download_scenario,
            modules,
            private_data: private_data.into(),
        })
    }
}

/// DownloadDataBlock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadDataBlock {
    /// Message header whose transaction_id holds the downloadId.
    pub header: DsmccMessageHeader,
    /// moduleId
    pub module_id: u16,
    /// moduleVersion
    pub module_version: u8,
    /// blockNumber
    pub block_number: u16,
    /// blockDataByte
    pub block_data: Box<[u8]>,
}

impl DownloadDataBlock {
    /// messageId of DDB.
    pub const MESSAGE_ID: u16 = 0x1003;

    fn read(header: DsmccMessageHeader, data: &[u8]) -> Option<DownloadDataBlock> {
        let [m0, m1, module_version, _, b0, b1, ref block_data @ ..] = *data else {
            log::debug!("invalid DownloadDataBlock");
            return None;
        };

        Some(DownloadDataBlock {
            header,
            module_id: u16::from_be_bytes([m0, m1]),
            module_version,
            block_number: u16::from_be_bytes([b0, b1]),
            block_data: block_data.into(),
        })
    }

    /// downloadId of the block.
    #[inline]
    pub fn download_id(&self) -> u32 {
        self.header.transaction_id
    }
}

/// A DSM-CC message carried by a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DsmccMessage {
    /// DSI
    Dsi(DownloadServerInitiate),
    /// DII
    Dii(DownloadInfoIndication),
    /// DDB
    Ddb(DownloadDataBlock),
}

impl DsmccMessage {
    /// table_id of sections carrying DSI and DII.
    pub const TABLE_ID_CONTROL: u8 = 0x3B;
    /// table_id of sections carrying DDB.
    pub const TABLE_ID_DATA: u8 = 0x3C;

    /// Reads the message carried by `section`.
    pub fn read(section: &Section) -> Option<DsmccMessage> {
        let (header, payload) = DsmccMessageHeader::read(section.data)?;
        if header.protocol_discriminator != 0x11 {
            log::debug!("invalid DsmccMessage::protocol_discriminator");
            return None;
        }

        match (section.table_id, header.message_id) {
            (Self::TABLE_ID_CONTROL, DownloadServerInitiate::MESSAGE_ID) => {
                DownloadServerInitiate::read(header, payload).map(DsmccMessage::Dsi)
            }
            (Self::TABLE_ID_CONTROL, DownloadInfoIndication::MESSAGE_ID) => {
                DownloadInfoIndication::read(header, payload).map(DsmccMessage::Dii)
            }
            (Self::TABLE_ID_DATA, DownloadDataBlock::MESSAGE_ID) => {
                DownloadDataBlock::read(header, payload).map(DsmccMessage::Ddb)
            }
            (table_id, message_id) => {
                log::debug!(
                    "unknown DsmccMessage: table_id=0x{:02X}, message_id=0x{:04X}",
                    table_id,
                    message_id
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use crate::dsmcc::testutil;

    use super::*;

    fn read(buf: &[u8]) -> Option<DsmccMessage> {
        let (section, _) = Section::parse(buf).unwrap();
        DsmccMessage::read(&section)
    }

    #[test]
    fn test_dsi() {
        let ior = testutil::ior(b"srg\0", 1, &[0, 0, 0, 1]);
        let dsi = assert_matches!(read(&testutil::dsi(0x8000_0000, &ior)), Some(DsmccMessage::Dsi(dsi)) => dsi);
        assert_eq!(dsi.transaction_id(), 0x8000_0000);
        let gateway = dsi.service_gateway.unwrap();
        assert_eq!(&*gateway.type_id, b"srg\0");
        assert_eq!(gateway.biop_profile().unwrap().object_location.module_id, 1);
    }

    #[test]
    fn test_dii() {
        let buf = testutil::dii(
            0x0000_0010,
            4066,
            &[
                (1, 100, 3, testutil::module_info(None)),
                (2, 20, 1, testutil::module_info(Some(4000))),
            ],
        );
        let dii = assert_matches!(read(&buf), Some(DsmccMessage::Dii(dii)) => dii);
        assert_eq!(dii.download_id, 0x10);
        assert_eq!(dii.block_size, 4066);
        assert_eq!(dii.modules.len(), 2);
        assert_eq!(dii.modules[0].module_version, 3);

        let info = dii.modules[0].info().unwrap();
        assert_eq!(info.taps.len(), 1);
        assert_eq!(info.taps[0].use_, Tap::OBJECT_USE);
        assert_eq!(info.compressed(), None);
        assert_eq!(
            dii.modules[1].info().and_then(|i| i.compressed()),
            Some(CompressedModule {
                compression_method: 0x08,
                original_size: 4000,
            }),
        );
    }

    #[test]
    fn test_ddb() {
        let buf = testutil::ddb(0x10, 7, 2, 5, b"abc");
        let ddb = assert_matches!(read(&buf), Some(DsmccMessage::Ddb(ddb)) => ddb);
        assert_eq!(ddb.download_id(), 0x10);
        assert_eq!(ddb.module_id, 7);
        assert_eq!(ddb.module_version, 2);
        assert_eq!(ddb.block_number, 5);
        assert_eq!(&*ddb.block_data, b"abc");
    }

    #[test]
    fn test_header_guards() {
        assert!(DsmccMessageHeader::read(&[0x11, 0x03, 0x10, 0x06]).is_none());
        // adaptation length past the end
        assert!(DsmccMessageHeader::read(&[
            0x11, 0x03, 0x10, 0x06, 0, 0, 0, 0, 0xFF, 0x08, 0x00, 0x08, 0x01
        ])
        .is_none());

        let (header, payload) = DsmccMessageHeader::read(&[
            0x11, 0x03, 0x10, 0x06, 0, 0, 0, 0, 0xFF, 0x02, 0x00, 0x03, 0x01, 0xAA, 0xBB, 0xCC,
        ])
        .unwrap();
        assert_eq!(
            header.adaptation,
            Some(DsmccAdaptationHeader {
                adaptation_type: 0x01,
                adaptation_data: vec![0xAA].into_boxed_slice(),
            }),
        );
        assert_eq!(payload, &[0xBB]);
    }
}
