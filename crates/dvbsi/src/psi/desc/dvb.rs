//! Descriptors defined by EN 300 468.

use std::fmt;

use crate::lang::{CountryCode, LangCode};
use crate::psi::table::{NetworkId, ServiceId, TransportStreamId};
use crate::text::DvbString;
use crate::utils::BytesExt;

use super::base::{split_len8, DecodeDescriptor};

/// service_type
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceType(pub u8);

impl ServiceType {
    /// Digital television service.
    pub const DIGITAL_TV: ServiceType = ServiceType(0x01);
    /// Digital radio sound service.
    pub const DIGITAL_RADIO: ServiceType = ServiceType(0x02);
    /// Teletext service.
    pub const TELETEXT: ServiceType = ServiceType(0x03);
    /// Data broadcast service.
    pub const DATA_BROADCAST: ServiceType = ServiceType(0x0C);
    /// Advanced codec digital radio sound service.
    pub const ADVANCED_CODEC_RADIO: ServiceType = ServiceType(0x0A);
    /// H.264/AVC SD digital television service.
    pub const AVC_SD_TV: ServiceType = ServiceType(0x16);
    /// H.264/AVC HD digital television service.
    pub const AVC_HD_TV: ServiceType = ServiceType(0x19);
    /// HEVC digital television service.
    pub const HEVC_TV: ServiceType = ServiceType(0x1F);

    /// Returns `true` for television service types.
    pub fn is_tv(&self) -> bool {
        matches!(self.0, 0x01 | 0x11 | 0x16..=0x1B | 0x1F)
    }

    /// Returns `true` for radio service types.
    pub fn is_radio(&self) -> bool {
        matches!(self.0, 0x02 | 0x07 | 0x0A)
    }
}

impl fmt::Debug for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceType(0x{:02X})", self.0)
    }
}

/// network_name_descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkNameDescriptor {
    /// Network name.
    pub network_name: DvbString,
}

impl DecodeDescriptor for NetworkNameDescriptor {
    const TAG: u8 = 0x40;

    fn read(data: &[u8]) -> Option<NetworkNameDescriptor> {
        Some(NetworkNameDescriptor {
            network_name: DvbString::from_bytes(data),
        })
    }
}

/// An entry of [`ServiceListDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceListEntry {
    /// service_id
    pub service_id: ServiceId,
    /// service_type
    pub service_type: ServiceType,
}

/// service_list_descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceListDescriptor {
    /// Listed services.
    pub services: Vec<ServiceListEntry>,
}

impl DecodeDescriptor for ServiceListDescriptor {
    const TAG: u8 = 0x41;

    fn read(data: &[u8]) -> Option<ServiceListDescriptor> {
        if data.len() % 3 != 0 {
            log::debug!("invalid ServiceListDescriptor");
            return None;
        }

        let services = data
            .chunks_exact(3)
            .map(|chunk| ServiceListEntry {
                service_id: ServiceId::new(chunk[0..=1].read_be_16()),
                service_type: ServiceType(chunk[2]),
            })
            .collect();
        Some(ServiceListDescriptor { services })
    }
}

/// satellite_delivery_system_descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SatelliteDeliverySystemDescriptor {
    /// Frequency in 10 kHz units.
    pub frequency: u32,
    /// Orbital position in 0.1 degree units.
    pub orbital_position: u16,
    /// `true` for east, `false` for west.
    pub east: bool,
    /// Polarization (2 bits).
    pub polarization: u8,
    /// Roll-off factor (2 bits, DVB-S2 only).
    pub roll_off: u8,
    /// `true` for DVB-S2.
    pub s2: bool,
    /// Modulation type (2 bits).
    pub modulation_type: u8,
    /// Symbol rate in 100 symbol/s units.
    pub symbol_rate: u32,
    /// FEC inner (4 bits).
    pub fec_inner: u8,
}

impl DecodeDescriptor for SatelliteDeliverySystemDescriptor {
    const TAG: u8 = 0x43;

    fn read(data: &[u8]) -> Option<SatelliteDeliverySystemDescriptor> {
        if data.len() != 11 {
            log::debug!("invalid SatelliteDeliverySystemDescriptor");
            return None;
        }

        Some(SatelliteDeliverySystemDescriptor {
            frequency: data[0..=3].read_bcd(8),
            orbital_position: data[4..=5].read_bcd(4) as u16,
            east: data[6] & 0b10000000 != 0,
            polarization: (data[6] & 0b01100000) >> 5,
            roll_off: (data[6] & 0b00011000) >> 3,
            s2: data[6] & 0b00000100 != 0,
            modulation_type: data[6] & 0b00000011,
            symbol_rate: data[7..=10].read_bcd(7),
            fec_inner: data[10] & 0b00001111,
        })
    }
}

/// cable_delivery_system_descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CableDeliverySystemDescriptor {
    /// Frequency in 100 Hz units.
    pub frequency: u32,
    /// FEC outer (4 bits).
    pub fec_outer: u8,
    /// Modulation.
    pub modulation: u8,
    /// Symbol rate in 100 symbol/s units.
    pub symbol_rate: u32,
    /// FEC inner (4 bits).
    pub fec_inner: u8,
}

impl DecodeDescriptor for CableDeliverySystemDescriptor {
    const TAG: u8 = 0x44;

    fn read(data: &[u8]) -> Option<CableDeliverySystemDescriptor> {
        if data.len() != 11 {
            log::debug!("invalid CableDeliverySystemDescriptor");
            return None;
        }

        Some(CableDeliverySystemDescriptor {
            frequency: data[0..=3].read_bcd(8),
            fec_outer: data[5] & 0b00001111,
            modulation: data[6],
            symbol_rate: data[7..=10].read_bcd(7),
            fec_inner: data[10] & 0b00001111,
        })
    }
}

/// bouquet_name_descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BouquetNameDescriptor {
    /// Bouquet name.
    pub bouquet_name: DvbString,
}

impl DecodeDescriptor for BouquetNameDescriptor {
    const TAG: u8 = 0x47;

    fn read(data: &[u8]) -> Option<BouquetNameDescriptor> {
        Some(BouquetNameDescriptor {
            bouquet_name: DvbString::from_bytes(data),
        })
    }
}

/// service_descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// service_type
    pub service_type: ServiceType,
    /// Provider name.
    pub service_provider_name: DvbString,
    /// Service name.
    pub service_name: DvbString,
}

impl DecodeDescriptor for ServiceDescriptor {
    const TAG: u8 = 0x48;

    fn read(data: &[u8]) -> Option<ServiceDescriptor> {
        let [service_type, ref data @ ..] = *data else {
            log::debug!("invalid ServiceDescriptor");
            return None;
        };
        let Some((service_provider_name, data)) = split_len8(data) else {
            log::debug!("invalid ServiceDescriptor::service_provider_name");
            return None;
        };
        let Some((service_name, _)) = split_len8(data) else {
            log::debug!("invalid ServiceDescriptor::service_name");
            return None;
        };

        Some(ServiceDescriptor {
            service_type: ServiceType(service_type),
            service_provider_name: DvbString::from_bytes(service_provider_name),
            service_name: DvbString::from_bytes(service_name),
        })
    }
}

/// country_availability_descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryAvailabilityDescriptor {
    /// `true` if the service is available in the listed countries,
    /// `false` if it is unavailable there.
    pub country_availability: bool,
    /// Listed countries.
    pub countries: Vec<CountryCode>,
}

impl DecodeDescriptor for CountryAvailabilityDescriptor {
    const TAG: u8 = 0x49;

    fn read(data: &[u8]) -> Option<CountryAvailabilityDescriptor> {
        let [flags, ref countries @ ..] = *data else {
            log::debug!("invalid CountryAvailabilityDescriptor");
            return None;
        };
        if countries.len() % 3 != 0 {
            log::debug!("invalid CountryAvailabilityDescriptor::countries");
            return None;
        }

        Some(CountryAvailabilityDescriptor {
            country_availability: flags & 0b10000000 != 0,
            countries: countries.chunks_exact(3).map(CountryCode::read).collect(),
        })
    }
}

/// linkage_descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkageDescriptor {
    /// transport_stream_id
    pub transport_stream_id: TransportStreamId,
    /// original_network_id
    pub original_network_id: NetworkId,
    /// service_id
    pub service_id: ServiceId,
    /// linkage_type
    pub linkage_type: u8,
    /// Bytes following linkage_type.
    pub private_data: Box<[u8]>,
}

impl LinkageDescriptor {
    /// Linkage to an EPG service.
    pub const LINKAGE_EPG: u8 = 0x02;
    /// Linkage to a system software update service.
    pub const LINKAGE_SOFTWARE_UPDATE: u8 = 0x09;
}

impl DecodeDescriptor for LinkageDescriptor {
    const TAG: u8 = 0x4A;

    fn read(data: &[u8]) -> Option<LinkageDescriptor> {
        if data.len() < 7 {
            log::debug!("invalid LinkageDescriptor");
            return None;
        }

        Some(LinkageDescriptor {
            transport_stream_id: TransportStreamId::new(data[0..=1].read_be_16()),
            original_network_id: NetworkId::new(data[2..=3].read_be_16()),
            service_id: ServiceId::new(data[4..=5].read_be_16()),
            linkage_type: data[6],
            private_data: data[7..].into(),
        })
    }
}

/// short_event_descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortEventDescriptor {
    /// Language of the texts.
    pub lang_code: LangCode,
    /// Event name.
    pub event_name: DvbString,
    /// Short description.
    pub text: DvbString,
}

impl DecodeDescriptor for ShortEventDescriptor {
    const TAG: u8 = 0x4D;

    fn read(data: &[u8]) -> Option<ShortEventDescriptor> {
        let Some((lang_code, data)) = data.split_at_checked(3) else {
            log::debug!("invalid ShortEventDescriptor");
            return None;
        };
        let Some((event_name, data)) = split_len8(data) else {
            log::debug!("invalid ShortEventDescriptor::event_name");
            return None;
        };
        let Some((text, _)) = split_len8(data) else {
            log::debug!("invalid ShortEventDescriptor::text");
            return None;
        };

        Some(ShortEventDescriptor {
            lang_code: LangCode::read(lang_code),
            event_name: DvbString::from_bytes(event_name),
            text: DvbString::from_bytes(text),
        })
    }
}

/// An item of [`ExtendedEventDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedEventItem {
    /// Item description, e.g. "Director".
    pub item_description: DvbString,
    /// Item text.
    pub item: DvbString,
}

/// extended_event_descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedEventDescriptor {
    /// descriptor_number (4 bits)
    pub descriptor_number: u8,
    /// last_descriptor_number (4 bits)
    pub last_descriptor_number: u8,
    /// Language of the texts.
    pub lang_code: LangCode,
    /// Items.
    pub items: Vec<ExtendedEventItem>,
    /// Free text continued across descriptor numbers.
    pub text: DvbString,
}

impl DecodeDescriptor for ExtendedEventDescriptor {
    const TAG: u8 = 0x4E;

    fn read(data: &[u8]) -> Option<ExtendedEventDescriptor> {
        if data.len() < 4 {
            log::debug!("invalid ExtendedEventDescriptor");
            return None;
        }

        let descriptor_number = (data[0] & 0b11110000) >> 4;
        let last_descriptor_number = data[0] & 0b00001111;
        let lang_code = LangCode::read(&data[1..=3]);
        let Some((mut item_data, data)) = split_len8(&data[4..]) else {
            log::debug!("invalid ExtendedEventDescriptor::items");
            return None;
        };

        let mut items = Vec::new();
        while !item_data.is_empty() {
            let Some((item_description, rem)) = split_len8(item_data) else {
                log::debug!("invalid ExtendedEventDescriptor::item_description");
                return None;
            };
            let Some((item, rem)) = split_len8(rem) else {
                log::debug!("invalid ExtendedEventDescriptor::item");
                return None;
            };
            item_data = rem;

            items.push(ExtendedEventItem {
                item_description: DvbString::from_bytes(item_description),
                item: DvbString::from_bytes(item),
            });
        }

        let Some((text, _)) = split_len8(data) else {
            log::debug!("invalid ExtendedEventDescriptor::text");
            return None;
        };

        Some(ExtendedEventDescriptor {
            descriptor_number,
            last_descriptor_number,
            lang_code,
            items,
            text: DvbString::from_bytes(text),
        })
    }
}

/// component_descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDescriptor {
    /// stream_content_ext (4 bits)
    pub stream_content_ext: u8,
    /// stream_content (4 bits)
    pub stream_content: u8,
    /// component_type
    pub component_type: u8,
    /// component_tag
    pub component_tag: u8,
    /// Language of the component.
    pub lang_code: LangCode,
    /// Component description.
    pub text: DvbString,
}

impl ComponentDescriptor {
    /// Returns `true` if the component is high-definition video.
    pub fn is_hd_video(&self) -> bool {
        match self.stream_content {
            0x01 => matches!(self.component_type, 0x09..=0x10),
            0x05 => matches!(self.component_type, 0x09..=0x10 | 0x80..=0x84),
            0x09 => self.stream_content_ext == 0x00,
            _ => false,
        }
    }

    /// Returns `true` if the component carries subtitles.
    pub fn is_subtitles(&self) -> bool {
        self.stream_content == 0x03 && matches!(self.component_type, 0x01..=0x05 | 0x10..=0x25)
    }
}

impl DecodeDescriptor for ComponentDescriptor {
    const TAG: u8 = 0x50;

    fn read(data: &[u8]) -> Option<ComponentDescriptor> {
        if data.len() < 6 {
            log::debug!("invalid ComponentDescriptor");
            return None;
        }

        Some(ComponentDescriptor {
            stream_content_ext: (data[0] & 0b11110000) >> 4,
            stream_content: data[0] & 0b00001111,
            component_type: data[1],
            component_tag: data[2],
            lang_code: LangCode::read(&data[3..=5]),
            text: DvbString::from_bytes(&data[6..]),
        })
    }
}

/// stream_identifier_descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamIdentifierDescriptor {
    /// component_tag
    pub component_tag: u8,
}

impl DecodeDescriptor for StreamIdentifierDescriptor {
    const TAG: u8 = 0x52;

    fn read(data: &[u8]) -> Option<StreamIdentifierDescriptor> {
        let [component_tag] = *data else {
            log::debug!("invalid StreamIdentifierDescriptor");
            return None;
        };

        Some(StreamIdentifierDescriptor { component_tag })
    }
}

/// CA_identifier_descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaIdentifierDescriptor {
    /// CA_system_id list.
    pub ca_system_ids: Vec<u16>,
}

impl DecodeDescriptor for CaIdentifierDescriptor {
    const TAG: u8 = 0x53;

    fn read(data: &[u8]) -> Option<CaIdentifierDescriptor> {
        if data.len() % 2 != 0 {
            log::debug!("invalid CaIdentifierDescriptor");
            return None;
        }

        Some(CaIdentifierDescriptor {
            ca_system_ids: data.chunks_exact(2).map(|c| c.read_be_16()).collect(),
        })
    }
}

/// A genre of [`ContentDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentGenre {
    /// content_nibble_level_1
    pub level1: u8,
    /// content_nibble_level_2
    pub level2: u8,
    /// user_byte
    pub user_byte: u8,
}

impl ContentGenre {
    /// Returns both nibbles as one byte, e.g. `0x23`.
    #[inline]
    pub fn code(&self) -> u8 {
        (self.level1 << 4) | self.level2
    }
}

/// content_descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDescriptor {
    /// Genres in broadcast order.
    pub genres: Vec<ContentGenre>,
}

impl DecodeDescriptor for ContentDescriptor {
    const TAG: u8 = 0x54;

    fn read(data: &[u8]) -> Option<ContentDescriptor> {
        if data.len() % 2 != 0 {
            log::debug!("invalid ContentDescriptor");
            return None;
        }

        let genres = data
            .chunks_exact(2)
            .map(|c| ContentGenre {
                level1: (c[0] & 0b11110000) >> 4,
                level2: c[0] & 0b00001111,
                user_byte: c[1],
            })
            .collect();
        Some(ContentDescriptor { genres })
    }
}

/// A rating of [`ParentalRatingDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParentalRating {
    /// Country the rating applies to.
    pub country_code: CountryCode,
    /// Raw rating byte.
    pub rating: u8,
}

impl ParentalRating {
    /// Returns the minimum age (`rating + 3`), or `None` if undefined or broadcaster-defined.
    #[inline]
    pub fn minimum_age(&self) -> Option<u8> {
        matches!(self.rating, 0x01..=0x0F).then_some(self.rating + 3)
    }
}

/// parental_rating_descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentalRatingDescriptor {
    /// Ratings per country.
    pub ratings: Vec<ParentalRating>,
}

impl DecodeDescriptor for ParentalRatingDescriptor {
    const TAG: u8 = 0x55;

    fn read(data: &[u8]) -> Option<ParentalRatingDescriptor> {
        if data.len() % 4 != 0 {
            log::debug!("invalid ParentalRatingDescriptor");
            return None;
        }

        let ratings = data
            .chunks_exact(4)
            .map(|c| ParentalRating {
                country_code: CountryCode::read(&c[0..=2]),
                rating: c[3],
            })
            .collect();
        Some(ParentalRatingDescriptor { ratings })
    }
}

/// terrestrial_delivery_system_descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerrestrialDeliverySystemDescriptor {
    /// Centre frequency in 10 Hz units.
    pub centre_frequency: u32,
    /// Bandwidth (3 bits; 0 = 8 MHz, 1 = 7 MHz, 2 = 6 MHz, 3 = 5 MHz).
    pub bandwidth: u8,
    /// `true` for high priority.
    pub priority: bool,
    /// `true` if time slicing is not used.
    pub time_slicing_indicator: bool,
    /// `true` if MPE-FEC is not used.
    pub mpe_fec_indicator: bool,
    /// Constellation (2 bits).
    pub constellation: u8,
    /// Hierarchy information (3 bits).
    pub hierarchy_information: u8,
    /// Code rate of the HP stream (3 bits).
    pub code_rate_hp_stream: u8,
    /// Code rate of the LP stream (3 bits).
    pub code_rate_lp_stream: u8,
    /// Guard interval (2 bits).
    pub guard_interval: u8,
    /// Transmission mode (2 bits).
    pub transmission_mode: u8,
    /// `true` if other frequencies are in use.
    pub other_frequency_flag: bool,
}

impl TerrestrialDeliverySystemDescriptor {
    /// Returns the centre frequency in Hz.
    #[inline]
    pub fn frequency_hz(&self) -> u64 {
        self.centre_frequency as u64 * 10
    }
}

impl DecodeDescriptor for TerrestrialDeliverySystemDescriptor {
    const TAG: u8 = 0x5A;

    fn read(data: &[u8]) -> Option<TerrestrialDeliverySystemDescriptor> {
        if data.len() != 11 {
            log::debug!("invalid TerrestrialDeliverySystemDescriptor");
            return None;
        }

        Some(TerrestrialDeliverySystemDescriptor {
            centre_frequency: data[0..=3].read_be_32(),
            bandwidth: (data[4] & 0b11100000) >> 5,
            priority: data[4] & 0b00010000 != 0,
            time_slicing_indicator: data[4] & 0b00001000 != 0,
            mpe_fec_indicator: data[4] & 0b00000100 != 0,
            constellation: (data[5] & 0b11000000) >> 6,
            hierarchy_information: (data[5] & 0b00111000) >> 3,
            code_rate_hp_stream: data[5] & 0b00000111,
            code_rate_lp_stream: (data[6] & 0b11100000) >> 5,
            guard_interval: (data[6] & 0b00011000) >> 3,
            transmission_mode: (data[6] & 0b00000110) >> 1,
            other_frequency_flag: data[6] & 0b00000001 != 0,
        })
    }
}

/// private_data_specifier_descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateDataSpecifierDescriptor {
    /// private_data_specifier
    pub private_data_specifier: u32,
}

impl PrivateDataSpecifierDescriptor {
    /// UK DTG (Freeview).
    pub const UK_DTG: u32 = 0x0000233A;
    /// BSkyB.
    pub const BSKYB: u32 = 0x00000002;
    /// EACEM/EICTA, used for logical channel numbers.
    pub const EACEM: u32 = 0x00000028;
}

impl DecodeDescriptor for PrivateDataSpecifierDescriptor {
    const TAG: u8 = 0x5F;

    fn read(data: &[u8]) -> Option<PrivateDataSpecifierDescriptor> {
        if data.len() != 4 {
            log::debug!("invalid PrivateDataSpecifierDescriptor");
            return None;
        }

        Some(PrivateDataSpecifierDescriptor {
            private_data_specifier: data.read_be_32(),
        })
    }
}

/// frequency_list_descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyListDescriptor {
    /// coding_type (2 bits; 1 = satellite, 2 = cable, 3 = terrestrial).
    pub coding_type: u8,
    /// Raw centre_frequency fields.
    pub centre_frequencies: Vec<u32>,
}

impl FrequencyListDescriptor {
    /// Returns the listed frequencies in Hz according to `coding_type`.
    pub fn frequencies_hz(&self) -> Vec<u64> {
        self.centre_frequencies
            .iter()
            .filter_map(|&f| {
                let bcd = f.to_be_bytes();
                match self.coding_type {
                    1 => Some(bcd.read_bcd(8) as u64 * 10_000),
                    2 => Some(bcd.read_bcd(8) as u64 * 100),
                    3 => Some(f as u64 * 10),
                    _ => None,
                }
            })
            .collect()
    }
}

impl DecodeDescriptor for FrequencyListDescriptor {
    const TAG: u8 = 0x62;

    fn read(data: &[u8]) -> Option<FrequencyListDescriptor> {
        let [coding_type, ref frequencies @ ..] = *data else {
            log::debug!("invalid FrequencyListDescriptor");
            return None;
        };
        if frequencies.len() % 4 != 0 {
            log::debug!("invalid FrequencyListDescriptor::centre_frequencies");
            return None;
        }

        Some(FrequencyListDescriptor {
            coding_type: coding_type & 0b00000011,
            centre_frequencies: frequencies.chunks_exact(4).map(|c| c.read_be_32()).collect(),
        })
    }
}

/// data_broadcast_descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBroadcastDescriptor {
    /// data_broadcast_id
    pub data_broadcast_id: u16,
    /// component_tag
    pub component_tag: u8,
    /// selector bytes.
    pub selector: Box<[u8]>,
    /// Language of the text.
    pub lang_code: LangCode,
    /// Description.
    pub text: DvbString,
}

impl DecodeDescriptor for DataBroadcastDescriptor {
    const TAG: u8 = 0x64;

    fn read(data: &[u8]) -> Option<DataBroadcastDescriptor> {
        if data.len() < 3 {
            log::debug!("invalid DataBroadcastDescriptor");
            return None;
        }

        let data_broadcast_id = data[0..=1].read_be_16();
        let component_tag = data[2];
        let Some((selector, data)) = split_len8(&data[3..]) else {
            log::debug!("invalid DataBroadcastDescriptor::selector");
            return None;
        };
        let Some((lang_code, data)) = data.split_at_checked(3) else {
            log::debug!("invalid DataBroadcastDescriptor::lang_code");
            return None;
        };
        let Some((text, _)) = split_len8(data) else {
            log::debug!("invalid DataBroadcastDescriptor::text");
            return None;
        };

        Some(DataBroadcastDescriptor {
            data_broadcast_id,
            component_tag,
            selector: selector.into(),
            lang_code: LangCode::read(lang_code),
            text: DvbString::from_bytes(text),
        })
    }
}

/// data_broadcast_id_descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBroadcastIdDescriptor {
    /// data_broadcast_id
    pub data_broadcast_id: u16,
    /// id_selector bytes.
    pub id_selector: Box<[u8]>,
}

impl DataBroadcastIdDescriptor {
    /// DVB object carousel.
    pub const OBJECT_CAROUSEL: u16 = 0x0007;
    /// MHEG-5 application (UK profile).
    pub const MHEG5: u16 = 0x0106;
}

impl DecodeDescriptor for DataBroadcastIdDescriptor {
    const TAG: u8 = 0x66;

    fn read(data: &[u8]) -> Option<DataBroadcastIdDescriptor> {
        if data.len() < 2 {
            log::debug!("invalid DataBroadcastIdDescriptor");
            return None;
        }

        Some(DataBroadcastIdDescriptor {
            data_broadcast_id: data[0..=1].read_be_16(),
            id_selector: data[2..].into(),
        })
    }
}

/// default_authority_descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultAuthorityDescriptor {
    /// Authority name, e.g. `"fp.bbc.co.uk"`.
    pub default_authority: String,
}

impl DecodeDescriptor for DefaultAuthorityDescriptor {
    const TAG: u8 = 0x73;

    fn read(data: &[u8]) -> Option<DefaultAuthorityDescriptor> {
        Some(DefaultAuthorityDescriptor {
            default_authority: String::from_utf8_lossy(data).into_owned(),
        })
    }
}

/// The value of a [`Crid`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CridValue {
    /// CRID carried in the descriptor (crid_location 0).
    Inline(String),
    /// Reference into a Content Identifier Table (crid_location 1).
    Reference(u16),
}

/// An entry of [`ContentIdentifierDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crid {
    /// crid_type (6 bits)
    pub crid_type: u8,
    /// CRID value.
    pub value: CridValue,
}

impl Crid {
    /// Returns `true` if this CRID identifies an episode.
    #[inline]
    pub fn is_episode(&self) -> bool {
        matches!(self.crid_type, 0x01 | 0x31)
    }

    /// Returns `true` if this CRID identifies a series.
    #[inline]
    pub fn is_series(&self) -> bool {
        matches!(self.crid_type, 0x02 | 0x32)
    }

    /// Returns the absolute CRID, prefixing relative ones with `default_authority`.
    ///
    /// References into a Content Identifier Table cannot be resolved and yield `None`.
    pub fn resolve(&self, default_authority: Option<&str>) -> Option<String> {
        let CridValue::Inline(value) = &self.value else {
            return None;
        };
        if value
            .get(..7)
            .map_or(false, |scheme| scheme.eq_ignore_ascii_case("crid://"))
        {
            return Some(value.clone());
        }
        if value.starts_with('/') {
            let authority = default_authority?;
            let authority = authority.strip_prefix("crid://").unwrap_or(authority);
            return Some(format!("crid://{}{}", authority, value));
        }
        Some(format!("crid://{}", value))
    }
}

/// content_identifier_descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentIdentifierDescriptor {
    /// CRIDs in broadcast order.
    pub crids: Vec<Crid>,
}

impl DecodeDescriptor for ContentIdentifierDescriptor {
    const TAG: u8 = 0x76;

    fn read(mut data: &[u8]) -> Option<ContentIdentifierDescriptor> {
        let mut crids = Vec::new();
        while let [b0, ref rem @ ..] = *data {
            let crid_type = (b0 & 0b11111100) >> 2;
            let (value, rem) = match b0 & 0b00000011 {
                0 => {
                    let Some((crid, rem)) = split_len8(rem) else {
                        log::debug!("invalid ContentIdentifierDescriptor::crid_byte");
                        return None;
                    };
                    (CridValue::Inline(String::from_utf8_lossy(crid).into_owned()), rem)
                }
                1 => {
                    let Some((crid_ref, rem)) = rem.split_at_checked(2) else {
                        log::debug!("invalid ContentIdentifierDescriptor::crid_ref");
                        return None;
                    };
                    (CridValue::Reference(crid_ref.read_be_16()), rem)
                }
                _ => {
                    log::debug!("invalid ContentIdentifierDescriptor::crid_location");
                    return None;
                }
            };
            data = rem;
            crids.push(Crid { crid_type, value });
        }

        Some(ContentIdentifierDescriptor { crids })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_descriptor() {
        let desc = ServiceDescriptor::read(b"\x19\x03BBC\x0ABBC One HD").unwrap();
        assert_eq!(desc.service_type, ServiceType::AVC_HD_TV);
        assert!(desc.service_type.is_tv());
        assert_eq!(desc.service_provider_name.decode(), "BBC");
        assert_eq!(desc.service_name.decode(), "BBC One HD");

        // provider name overruns
        assert!(ServiceDescriptor::read(b"\x01\x09BBC").is_none());
    }

    #[test]
    fn test_short_event_descriptor() {
        let desc = ShortEventDescriptor::read(b"eng\x04News\x0DDrama. S2 EP5").unwrap();
        assert_eq!(desc.lang_code, LangCode::ENG);
        assert_eq!(desc.event_name.decode(), "News");
        assert_eq!(desc.text.decode(), "Drama. S2 EP5");
        assert!(ShortEventDescriptor::read(b"eng\x04News\x0EDrama. S2 EP5").is_none());
    }

    #[test]
    fn test_extended_event_descriptor() {
        let desc =
            ExtendedEventDescriptor::read(b"\x01eng\x0C\x08Director\x02AB\x05Hello").unwrap();
        assert_eq!(desc.descriptor_number, 0);
        assert_eq!(desc.last_descriptor_number, 1);
        assert_eq!(desc.items.len(), 1);
        assert_eq!(desc.items[0].item_description.decode(), "Director");
        assert_eq!(desc.items[0].item.decode(), "AB");
        assert_eq!(desc.text.decode(), "Hello");
    }

    #[test]
    fn test_satellite_delivery_system_descriptor() {
        // 11.42675 GHz, 28.2E, horizontal, DVB-S2 8PSK, 27.5 Msym/s, FEC 2/3
        let desc = SatelliteDeliverySystemDescriptor::read(&[
            0x01, 0x14, 0x26, 0x75, 0x02, 0x82, 0x86, 0x02, 0x75, 0x00, 0x02,
        ])
        .unwrap();
        assert_eq!(desc.frequency, 1142675);
        assert_eq!(desc.orbital_position, 282);
        assert!(desc.east);
        assert_eq!(desc.polarization, 0);
        assert!(desc.s2);
        assert_eq!(desc.modulation_type, 2);
        assert_eq!(desc.symbol_rate, 275000);
        assert_eq!(desc.fec_inner, 2);
    }

    #[test]
    fn test_terrestrial_delivery_system_descriptor() {
        // 490 MHz
        let desc = TerrestrialDeliverySystemDescriptor::read(&[
            0x02, 0xEB, 0xAE, 0x40, 0x1F, 0x81, 0x0A, 0xFF, 0xFF, 0xFF, 0xFF,
        ])
        .unwrap();
        assert_eq!(desc.frequency_hz(), 490_000_000);
        assert_eq!(desc.bandwidth, 0);
        assert!(desc.priority);
        assert_eq!(desc.constellation, 2);
        assert_eq!(desc.transmission_mode, 1);
        assert!(!desc.other_frequency_flag);
    }

    #[test]
    fn test_parental_rating() {
        let desc = ParentalRatingDescriptor::read(b"GBR\x09FRA\x00").unwrap();
        assert_eq!(desc.ratings[0].minimum_age(), Some(12));
        assert_eq!(desc.ratings[1].minimum_age(), None);
        assert!(ParentalRatingDescriptor::read(b"GBR").is_none());
    }

    #[test]
    fn test_content_identifier_descriptor() {
        let desc = ContentIdentifierDescriptor::read(b"\x04\x05/ep01\x08\x12\x34").unwrap();
        assert_eq!(desc.crids.len(), 2);
        assert!(desc.crids[0].is_episode());
        assert_eq!(
            desc.crids[0].resolve(Some("fp.bbc.co.uk")).as_deref(),
            Some("crid://fp.bbc.co.uk/ep01"),
        );
        assert_eq!(desc.crids[0].resolve(None), None);
        assert!(desc.crids[1].is_series());
        assert_eq!(desc.crids[1].value, CridValue::Reference(0x1234));

        // crid_location 2 is reserved
        assert!(ContentIdentifierDescriptor::read(b"\x06\x00").is_none());
    }

    #[test]
    fn test_frequency_list_descriptor() {
        let desc = FrequencyListDescriptor::read(&[0xFF, 0x01, 0x14, 0x26, 0x75]).unwrap();
        assert_eq!(desc.coding_type, 3);
        assert_eq!(desc.frequencies_hz(), [0x01142675 * 10]);

        let desc = FrequencyListDescriptor::read(&[0xFD, 0x01, 0x14, 0x26, 0x75]).unwrap();
        assert_eq!(desc.frequencies_hz(), [11_426_750_000]);
    }
}
