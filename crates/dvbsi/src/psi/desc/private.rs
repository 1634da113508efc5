//! User-private descriptors used by UK broadcasters.
//!
//! These tags are only meaningful under the matching private_data_specifier,
//! and are registered only in the scopes where those broadcasters carry them.

use crate::lang::LangCode;
use crate::psi::table::ServiceId;
use crate::text::DvbString;
use crate::utils::BytesExt;

use super::base::DecodeDescriptor;

/// An entry of [`LogicalChannelDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogicalChannel {
    /// service_id
    pub service_id: ServiceId,
    /// visible_service_flag
    pub visible: bool,
    /// logical_channel_number (10 bits)
    pub channel_number: u16,
}

/// logical_channel_descriptor (EACEM/DTG)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalChannelDescriptor {
    /// Channel assignments.
    pub channels: Vec<LogicalChannel>,
}

impl DecodeDescriptor for LogicalChannelDescriptor {
    const TAG: u8 = 0x83;

    fn read(data: &[u8]) -> Option<LogicalChannelDescriptor> {
        if data.len() % 4 != 0 {
            log::debug!("invalid LogicalChannelDescriptor");
            return None;
        }

        let channels = data
            .chunks_exact(4)
            .map(|c| LogicalChannel {
                service_id: ServiceId::new(c[0..=1].read_be_16()),
                visible: c[2] & 0b10000000 != 0,
                channel_number: c[2..=3].read_be_16() & 0b0000_0011_1111_1111,
            })
            .collect();
        Some(LogicalChannelDescriptor { channels })
    }
}

/// A channel number valid in one region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FreesatRegionalChannel {
    /// Channel number (12 bits).
    pub channel_number: u16,
    /// Region the number applies to. `0xFFFF` applies everywhere.
    pub region_id: u16,
}

/// A service of [`FreesatChannelDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreesatChannel {
    /// service_id
    pub service_id: ServiceId,
    /// Freesat channel id (15 bits).
    pub channel_id: u16,
    /// Numbers per region.
    pub regions: Vec<FreesatRegionalChannel>,
}

/// FreeSat channel list descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreesatChannelDescriptor {
    /// Services.
    pub channels: Vec<FreesatChannel>,
}

impl DecodeDescriptor for FreesatChannelDescriptor {
    const TAG: u8 = 0xD3;

    fn read(mut data: &[u8]) -> Option<FreesatChannelDescriptor> {
        let mut channels = Vec::new();
        while !data.is_empty() {
            if data.len() < 5 {
                log::debug!("invalid FreesatChannelDescriptor");
                return None;
            }

            let service_id = ServiceId::new(data[0..=1].read_be_16());
            let channel_id = data[2..=3].read_be_16() & 0x7FFF;
            let Some((entries, rem)) = data[5..].split_at_checked(data[4] as usize) else {
                log::debug!("invalid FreesatChannelDescriptor::regions");
                return None;
            };
            if entries.len() % 4 != 0 {
                log::debug!("invalid FreesatChannelDescriptor::regions");
                return None;
            }
            data = rem;

            let regions = entries
                .chunks_exact(4)
                .map(|c| FreesatRegionalChannel {
                    channel_number: c[0..=1].read_be_16() & 0x0FFF,
                    region_id: c[2..=3].read_be_16(),
                })
                .collect();
            channels.push(FreesatChannel {
                service_id,
                channel_id,
                regions,
            });
        }

        Some(FreesatChannelDescriptor { channels })
    }
}

/// A region of [`FreesatRegionDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreesatRegion {
    /// Region id.
    pub region_id: u16,
    /// Language of the name.
    pub lang_code: LangCode,
    /// Region name.
    pub name: DvbString,
}

/// FreeSat region name descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreesatRegionDescriptor {
    /// Regions.
    pub regions: Vec<FreesatRegion>,
}

impl DecodeDescriptor for FreesatRegionDescriptor {
    const TAG: u8 = 0xD4;

    fn read(mut data: &[u8]) -> Option<FreesatRegionDescriptor> {
        let mut regions = Vec::new();
        while !data.is_empty() {
            if data.len() < 6 {
                log::debug!("invalid FreesatRegionDescriptor");
                return None;
            }

            let region_id = data[0..=1].read_be_16();
            let lang_code = LangCode::read(&data[2..=4]);
            let Some((name, rem)) = data[6..].split_at_checked(data[5] as usize) else {
                log::debug!("invalid FreesatRegionDescriptor::name");
                return None;
            };
            data = rem;

            regions.push(FreesatRegion {
                region_id,
                lang_code,
                name: DvbString::from_bytes(name),
            });
        }

        Some(FreesatRegionDescriptor { regions })
    }
}
