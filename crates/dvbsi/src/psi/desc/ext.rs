//! Extension descriptors carried under descriptor_tag `0x7F`.

use crate::lang::{CountryCode, LangCode};
use crate::text::DvbString;
use crate::utils::BytesExt;

use super::base::{split_len8, DecodeExtensionDescriptor};

/// Placement of an icon, present when position_flag is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IconPosition {
    /// coordinate_system (3 bits)
    pub coordinate_system: u8,
    /// icon_horizontal_origin (12 bits)
    pub horizontal_origin: u16,
    /// icon_vertical_origin (12 bits)
    pub vertical_origin: u16,
}

/// Header carried only by the first image_icon_descriptor of an icon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconHeader {
    /// icon_transport_mode (2 bits; 0 = inline data, 1 = URL).
    pub transport_mode: u8,
    /// Placement, if signalled.
    pub position: Option<IconPosition>,
    /// MIME type, e.g. `"image/png"`.
    pub icon_type: String,
}

/// Payload of an image_icon_descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconData {
    /// Image bytes, possibly continued by later descriptor numbers.
    Bytes(Box<[u8]>),
    /// URL of the image.
    Url(String),
}

/// image_icon_descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageIconDescriptor {
    /// descriptor_number (4 bits)
    pub descriptor_number: u8,
    /// last_descriptor_number (4 bits)
    pub last_descriptor_number: u8,
    /// icon_id (3 bits)
    pub icon_id: u8,
    /// Present when `descriptor_number` is 0.
    pub header: Option<IconHeader>,
    /// Image payload.
    pub data: IconData,
}

impl DecodeExtensionDescriptor for ImageIconDescriptor {
    const TAG_EXTENSION: u8 = 0x00;

    fn read(data: &[u8]) -> Option<ImageIconDescriptor> {
        let [b0, b1, ref data @ ..] = *data else {
            log::debug!("invalid ImageIconDescriptor");
            return None;
        };
        let descriptor_number = (b0 & 0b11110000) >> 4;
        let last_descriptor_number = b0 & 0b00001111;
        let icon_id = b1 & 0b00000111;

        if descriptor_number != 0 {
            let Some((icon_data, _)) = split_len8(data) else {
                log::debug!("invalid ImageIconDescriptor::icon_data");
                return None;
            };
            return Some(ImageIconDescriptor {
                descriptor_number,
                last_descriptor_number,
                icon_id,
                header: None,
                data: IconData::Bytes(icon_data.into()),
            });
        }

        let [flags, ref data @ ..] = *data else {
            log::debug!("invalid ImageIconDescriptor::icon_transport_mode");
            return None;
        };
        let transport_mode = (flags & 0b11000000) >> 6;
        let (position, data) = if flags & 0b00100000 != 0 {
            let Some((pos, rem)) = data.split_at_checked(3) else {
                log::debug!("invalid ImageIconDescriptor::position");
                return None;
            };
            let origins = pos.read_be_24();
            let position = IconPosition {
                coordinate_system: (flags & 0b00011100) >> 2,
                horizontal_origin: (origins >> 12) as u16,
                vertical_origin: (origins & 0x0FFF) as u16,
            };
            (Some(position), rem)
        } else {
            (None, data)
        };
        let Some((icon_type, data)) = split_len8(data) else {
            log::debug!("invalid ImageIconDescriptor::icon_type");
            return None;
        };
        let Some((payload, _)) = split_len8(data) else {
            log::debug!("invalid ImageIconDescriptor::icon_data");
            return None;
        };
        let payload = match transport_mode {
            0 => IconData::Bytes(payload.into()),
            1 => IconData::Url(String::from_utf8_lossy(payload).into_owned()),
            _ => {
                log::debug!("invalid ImageIconDescriptor::icon_transport_mode");
                return None;
            }
        };

        Some(ImageIconDescriptor {
            descriptor_number,
            last_descriptor_number,
            icon_id,
            header: Some(IconHeader {
                transport_mode,
                position,
                icon_type: String::from_utf8_lossy(icon_type).into_owned(),
            }),
            data: payload,
        })
    }
}

/// A cell of [`T2DeliverySystemDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct T2Cell {
    /// cell_id
    pub cell_id: u16,
    /// Centre frequencies in 10 Hz units. More than one when TFS is used.
    pub centre_frequencies: Vec<u32>,
    /// `(cell_id_extension, transposer_frequency)` pairs.
    pub subcells: Vec<(u8, u32)>,
}

/// Optional part of [`T2DeliverySystemDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct T2Parameters {
    /// SISO/MISO (2 bits)
    pub siso_miso: u8,
    /// bandwidth (4 bits)
    pub bandwidth: u8,
    /// guard_interval (3 bits)
    pub guard_interval: u8,
    /// transmission_mode (3 bits)
    pub transmission_mode: u8,
    /// other_frequency_flag
    pub other_frequency_flag: bool,
    /// tfs_flag
    pub tfs_flag: bool,
    /// Cells.
    pub cells: Vec<T2Cell>,
}

/// T2_delivery_system_descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct T2DeliverySystemDescriptor {
    /// plp_id
    pub plp_id: u8,
    /// T2_system_id
    pub t2_system_id: u16,
    /// Present when the descriptor is longer than the mandatory fields.
    pub parameters: Option<T2Parameters>,
}

impl DecodeExtensionDescriptor for T2DeliverySystemDescriptor {
    const TAG_EXTENSION: u8 = 0x04;

    fn read(data: &[u8]) -> Option<T2DeliverySystemDescriptor> {
        if data.len() < 3 {
            log::debug!("invalid T2DeliverySystemDescriptor");
            return None;
        }

        let plp_id = data[0];
        let t2_system_id = data[1..=2].read_be_16();
        let mut data = &data[3..];
        if data.is_empty() {
            return Some(T2DeliverySystemDescriptor {
                plp_id,
                t2_system_id,
                parameters: None,
            });
        }

        let [b0, b1, ref rem @ ..] = *data else {
            log::debug!("invalid T2DeliverySystemDescriptor::parameters");
            return None;
        };
        data = rem;
        let tfs_flag = b1 & 0b00000001 != 0;

        let mut cells = Vec::new();
        while !data.is_empty() {
            let Some((cell_id, rem)) = data.split_at_checked(2) else {
                log::debug!("invalid T2Cell::cell_id");
                return None;
            };
            let (frequencies, rem) = if tfs_flag {
                let Some(res) = split_len8(rem) else {
                    log::debug!("invalid T2Cell::frequency_loop");
                    return None;
                };
                res
            } else {
                let Some(res) = rem.split_at_checked(4) else {
                    log::debug!("invalid T2Cell::centre_frequency");
                    return None;
                };
                res
            };
            if frequencies.len() % 4 != 0 {
                log::debug!("invalid T2Cell::centre_frequency");
                return None;
            }
            let Some((subcells, rem)) = split_len8(rem) else {
                log::debug!("invalid T2Cell::subcell_info_loop");
                return None;
            };
            if subcells.len() % 5 != 0 {
                log::debug!("invalid T2Cell::subcell_info_loop");
                return None;
            }
            data = rem;

            cells.push(T2Cell {
                cell_id: cell_id.read_be_16(),
                centre_frequencies: frequencies.chunks_exact(4).map(|c| c.read_be_32()).collect(),
                subcells: subcells
                    .chunks_exact(5)
                    .map(|c| (c[0], c[1..=4].read_be_32()))
                    .collect(),
            });
        }

        Some(T2DeliverySystemDescriptor {
            plp_id,
            t2_system_id,
            parameters: Some(T2Parameters {
                siso_miso: (b0 & 0b11000000) >> 6,
                bandwidth: (b0 & 0b00111100) >> 2,
                guard_interval: (b1 & 0b11100000) >> 5,
                transmission_mode: (b1 & 0b00011100) >> 2,
                other_frequency_flag: b1 & 0b00000010 != 0,
                tfs_flag,
                cells,
            }),
        })
    }
}

/// A region of [`TargetRegionDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRegion {
    /// Overrides the descriptor's country when present.
    pub country_code: Option<CountryCode>,
    /// primary_region_code
    pub primary_region_code: Option<u8>,
    /// secondary_region_code
    pub secondary_region_code: Option<u8>,
    /// tertiary_region_code
    pub tertiary_region_code: Option<u16>,
}

/// target_region_descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRegionDescriptor {
    /// Country the regions belong to.
    pub country_code: CountryCode,
    /// Regions. Empty means the whole country.
    pub regions: Vec<TargetRegion>,
}

impl DecodeExtensionDescriptor for TargetRegionDescriptor {
    const TAG_EXTENSION: u8 = 0x09;

    fn read(data: &[u8]) -> Option<TargetRegionDescriptor> {
        let Some((country_code, mut data)) = data.split_at_checked(3) else {
            log::debug!("invalid TargetRegionDescriptor");
            return None;
        };

        let mut regions = Vec::new();
        while let [flags, ref rem @ ..] = *data {
            data = rem;
            let country_code = if flags & 0b00000100 != 0 {
                let Some((code, rem)) = data.split_at_checked(3) else {
                    log::debug!("invalid TargetRegion::country_code");
                    return None;
                };
                data = rem;
                Some(CountryCode::read(code))
            } else {
                None
            };

            let depth = flags & 0b00000011;
            let needed = match depth {
                0 => 0,
                1 => 1,
                2 => 2,
                _ => 4,
            };
            let Some((codes, rem)) = data.split_at_checked(needed) else {
                log::debug!("invalid TargetRegion::region_code");
                return None;
            };
            data = rem;

            regions.push(TargetRegion {
                country_code,
                primary_region_code: (depth >= 1).then(|| codes[0]),
                secondary_region_code: (depth >= 2).then(|| codes[1]),
                tertiary_region_code: (depth >= 3).then(|| codes[2..=3].read_be_16()),
            });
        }

        Some(TargetRegionDescriptor {
            country_code: CountryCode::read(country_code),
            regions,
        })
    }
}

/// A region of [`TargetRegionNameDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionName {
    /// region_depth (1 to 3)
    pub region_depth: u8,
    /// Region name.
    pub name: DvbString,
    /// primary_region_code
    pub primary_region_code: u8,
    /// secondary_region_code, when depth is 2 or more.
    pub secondary_region_code: Option<u8>,
    /// tertiary_region_code, when depth is 3.
    pub tertiary_region_code: Option<u16>,
}

/// target_region_name_descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRegionNameDescriptor {
    /// Country the regions belong to.
    pub country_code: CountryCode,
    /// Language of the names.
    pub lang_code: LangCode,
    /// Named regions.
    pub regions: Vec<RegionName>,
}

impl DecodeExtensionDescriptor for TargetRegionNameDescriptor {
    const TAG_EXTENSION: u8 = 0x0A;

    fn read(data: &[u8]) -> Option<TargetRegionNameDescriptor> {
        if data.len() < 6 {
            log::debug!("invalid TargetRegionNameDescriptor");
            return None;
        }

        let country_code = CountryCode::read(&data[0..=2]);
        let lang_code = LangCode::read(&data[3..=5]);
        let mut data = &data[6..];

        let mut regions = Vec::new();
        while let [b0, ref rem @ ..] = *data {
            let region_depth = (b0 & 0b11000000) >> 6;
            let name_length = (b0 & 0b00111111) as usize;
            let Some((name, rem)) = rem.split_at_checked(name_length) else {
                log::debug!("invalid RegionName::name");
                return None;
            };
            let needed = match region_depth {
                0 | 1 => 1,
                2 => 2,
                _ => 4,
            };
            let Some((codes, rem)) = rem.split_at_checked(needed) else {
                log::debug!("invalid RegionName::region_code");
                return None;
            };
            data = rem;

            regions.push(RegionName {
                region_depth,
                name: DvbString::from_bytes(name),
                primary_region_code: codes[0],
                secondary_region_code: (region_depth >= 2).then(|| codes[1]),
                tertiary_region_code: (region_depth >= 3).then(|| codes[2..=3].read_be_16()),
            });
        }

        Some(TargetRegionNameDescriptor {
            country_code,
            lang_code,
            regions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_region() {
        let desc = TargetRegionDescriptor::read(b"GBR\x01\x03\x06FRA\x07\x08").unwrap();
        assert_eq!(desc.country_code, CountryCode::GBR);
        assert_eq!(desc.regions.len(), 2);
        assert_eq!(desc.regions[0].country_code, None);
        assert_eq!(desc.regions[0].primary_region_code, Some(3));
        assert_eq!(desc.regions[0].secondary_region_code, None);
        assert_eq!(desc.regions[1].country_code.map(|c| c.0), Some(*b"FRA"));
        assert_eq!(desc.regions[1].secondary_region_code, Some(8));

        assert!(TargetRegionDescriptor::read(b"GBR\x03\x01").is_none());
    }

    #[test]
    fn test_target_region_name() {
        let desc = TargetRegionNameDescriptor::read(b"GBReng\x45Wales\x01\x43Cym\x02").unwrap();
        assert_eq!(desc.regions.len(), 2);
        assert_eq!(desc.regions[0].region_depth, 1);
        assert_eq!(desc.regions[0].name.decode(), "Wales");
        assert_eq!(desc.regions[0].primary_region_code, 1);
        assert_eq!(desc.regions[1].region_depth, 1);
        assert_eq!(desc.regions[1].name.decode(), "Cym");
    }

    #[test]
    fn test_t2_delivery_system() {
        let desc = T2DeliverySystemDescriptor::read(&[0x00, 0x30, 0x01]).unwrap();
        assert_eq!(desc.t2_system_id, 0x3001);
        assert_eq!(desc.parameters, None);

        let desc = T2DeliverySystemDescriptor::read(&[
            0x00, 0x30, 0x01, 0x00, 0x4C, 0x00, 0x01, 0x02, 0xEB, 0xAE, 0x40, 0x00,
        ])
        .unwrap();
        let params = desc.parameters.unwrap();
        assert_eq!(params.guard_interval, 2);
        assert_eq!(params.transmission_mode, 3);
        assert_eq!(params.cells.len(), 1);
        assert_eq!(params.cells[0].centre_frequencies, [49_000_000]);
    }

    #[test]
    fn test_image_icon() {
        let desc = ImageIconDescriptor::read(b"\x00\x01\x40\x09image/png\x05a.png").unwrap();
        assert_eq!(desc.icon_id, 1);
        assert_eq!(desc.header.as_ref().unwrap().icon_type, "image/png");
        assert_eq!(desc.data, IconData::Url("a.png".to_string()));

        let desc = ImageIconDescriptor::read(b"\x11\x01\x02\xAB\xCD").unwrap();
        assert_eq!(desc.descriptor_number, 1);
        assert_eq!(desc.header, None);
        assert_eq!(desc.data, IconData::Bytes(vec![0xAB, 0xCD].into_boxed_slice()));
    }
}
