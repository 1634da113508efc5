//! Tables defined by EN 300 468.

use chrono::Duration;

use crate::psi::desc::{Descriptor, DescriptorScope, ServiceDescriptor};
use crate::psi::{PsiTable, Section};
use crate::time::{DateTime, TimeError};
use crate::utils::BytesExt;

use super::{
    read_descriptors, split_loop, BouquetId, EventId, NetworkId, RunningStatus, ServiceId,
    TableError, TransportStreamId,
};

/// A transport stream entry of NIT and BAT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportStream {
    /// transport_stream_id
    pub transport_stream_id: TransportStreamId,
    /// original_network_id
    pub original_network_id: NetworkId,
    /// transport descriptors.
    pub descriptors: Vec<Descriptor>,
}

fn read_transport_streams(
    data: &[u8],
    scope: DescriptorScope,
) -> Result<Vec<TransportStream>, TableError> {
    let (mut data, _) = split_loop(data, "transport_stream_loop")?;

    let mut transport_streams = Vec::new();
    while !data.is_empty() {
        if data.len() < 6 {
            log::debug!("invalid TransportStream");
            return Err(TableError::Truncated("TransportStream"));
        }

        let transport_stream_id = TransportStreamId::new(data[0..=1].read_be_16());
        let original_network_id = NetworkId::new(data[2..=3].read_be_16());
        let (descriptors, rem) =
            read_descriptors(&data[4..], scope, "TransportStream::descriptors")?;
        data = rem;

        transport_streams.push(TransportStream {
            transport_stream_id,
            original_network_id,
            descriptors,
        });
    }
    Ok(transport_streams)
}

/// NIT (Network Information Table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInformation {
    /// `true` for the actual network, `false` for another network.
    pub actual: bool,
    /// network_id
    pub network_id: NetworkId,
    /// Network descriptors.
    pub descriptors: Vec<Descriptor>,
    /// Transport streams of the network.
    pub transport_streams: Vec<TransportStream>,
}

impl NetworkInformation {
    /// table_id of NIT for the actual network.
    pub const TABLE_ID_ACTUAL: u8 = 0x40;
    /// table_id of NIT for other networks.
    pub const TABLE_ID_OTHER: u8 = 0x41;

    /// Returns the network name, if signalled.
    pub fn network_name(&self) -> Option<String> {
        crate::find_descriptor!(self.descriptors, NetworkName).map(|d| d.network_name.decode())
    }
}

impl PsiTable for NetworkInformation {
    fn read(section: &Section) -> Result<NetworkInformation, TableError> {
        let actual = match section.table_id {
            Self::TABLE_ID_ACTUAL => true,
            Self::TABLE_ID_OTHER => false,
            table_id => return Err(TableError::UnexpectedTableId(table_id)),
        };
        let Some(syntax) = section.syntax.as_ref() else {
            log::debug!("invalid NetworkInformation::syntax");
            return Err(TableError::MissingSyntax);
        };

        let (descriptors, data) = read_descriptors(
            section.data,
            DescriptorScope::Network,
            "NetworkInformation::descriptors",
        )?;
        let transport_streams = read_transport_streams(data, DescriptorScope::Network)?;

        Ok(NetworkInformation {
            actual,
            network_id: NetworkId::new(syntax.table_id_extension),
            descriptors,
            transport_streams,
        })
    }
}

/// BAT (Bouquet Association Table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BouquetAssociation {
    /// bouquet_id
    pub bouquet_id: BouquetId,
    /// Bouquet descriptors.
    pub descriptors: Vec<Descriptor>,
    /// Transport streams of the bouquet.
    pub transport_streams: Vec<TransportStream>,
}

impl BouquetAssociation {
    /// table_id of BAT.
    pub const TABLE_ID: u8 = 0x4A;

    /// Returns the bouquet name, if signalled.
    pub fn bouquet_name(&self) -> Option<String> {
        crate::find_descriptor!(self.descriptors, BouquetName).map(|d| d.bouquet_name.decode())
    }
}

impl PsiTable for BouquetAssociation {
    fn read(section: &Section) -> Result<BouquetAssociation, TableError> {
        if section.table_id != Self::TABLE_ID {
            return Err(TableError::UnexpectedTableId(section.table_id));
        }
        let Some(syntax) = section.syntax.as_ref() else {
            log::debug!("invalid BouquetAssociation::syntax");
            return Err(TableError::MissingSyntax);
        };

        let (descriptors, data) = read_descriptors(
            section.data,
            DescriptorScope::Bouquet,
            "BouquetAssociation::descriptors",
        )?;
        let transport_streams = read_transport_streams(data, DescriptorScope::Bouquet)?;

        Ok(BouquetAssociation {
            bouquet_id: BouquetId::new(syntax.table_id_extension),
            descriptors,
            transport_streams,
        })
    }
}

/// A service of [`ServiceDescription`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEntry {
    /// service_id
    pub service_id: ServiceId,
    /// EIT_schedule_flag
    pub eit_schedule_flag: bool,
    /// EIT_present_following_flag
    pub eit_present_following_flag: bool,
    /// running_status
    pub running_status: RunningStatus,
    /// free_CA_mode; `true` if scrambled.
    pub free_ca_mode: bool,
    /// Service descriptors.
    pub descriptors: Vec<Descriptor>,
}

impl ServiceEntry {
    /// Returns the service_descriptor, if any.
    #[inline]
    pub fn service_descriptor(&self) -> Option<&ServiceDescriptor> {
        crate::find_descriptor!(self.descriptors, Service)
    }
}

/// SDT (Service Description Table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescription {
    /// `true` for the actual transport stream.
    pub actual: bool,
    /// transport_stream_id
    pub transport_stream_id: TransportStreamId,
    /// original_network_id
    pub original_network_id: NetworkId,
    /// Services.
    pub services: Vec<ServiceEntry>,
}

impl ServiceDescription {
    /// table_id of SDT for the actual transport stream.
    pub const TABLE_ID_ACTUAL: u8 = 0x42;
    /// table_id of SDT for other transport streams.
    pub const TABLE_ID_OTHER: u8 = 0x46;
}

impl PsiTable for ServiceDescription {
    fn read(section: &Section) -> Result<ServiceDescription, TableError> {
        let actual = match section.table_id {
            Self::TABLE_ID_ACTUAL => true,
            Self::TABLE_ID_OTHER => false,
            table_id => return Err(TableError::UnexpectedTableId(table_id)),
        };
        let Some(syntax) = section.syntax.as_ref() else {
            log::debug!("invalid ServiceDescription::syntax");
            return Err(TableError::MissingSyntax);
        };

        let data = section.data;
        if data.len() < 3 {
            log::debug!("invalid ServiceDescription");
            return Err(TableError::Truncated("ServiceDescription"));
        }

        let transport_stream_id = TransportStreamId::new(syntax.table_id_extension);
        let original_network_id = NetworkId::new(data[0..=1].read_be_16());

        let mut data = &data[3..];
        let mut services = Vec::new();
        while !data.is_empty() {
            if data.len() < 5 {
                log::debug!("invalid ServiceEntry");
                return Err(TableError::Truncated("ServiceEntry"));
            }

            let service_id = ServiceId::new(data[0..=1].read_be_16());
            let eit_schedule_flag = data[2] & 0b00000010 != 0;
            let eit_present_following_flag = data[2] & 0b00000001 != 0;
            let running_status = ((data[3] & 0b11100000) >> 5).into();
            let free_ca_mode = data[3] & 0b00010000 != 0;
            let (descriptors, rem) = read_descriptors(
                &data[3..],
                DescriptorScope::ServiceDescription,
                "ServiceEntry::descriptors",
            )?;
            data = rem;

            services.push(ServiceEntry {
                service_id,
                eit_schedule_flag,
                eit_present_following_flag,
                running_status,
                free_ca_mode,
                descriptors,
            });
        }

        Ok(ServiceDescription {
            actual,
            transport_stream_id,
            original_network_id,
            services,
        })
    }
}

/// Kind of an EIT section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EitKind {
    /// Present/following of the actual transport stream (0x4E).
    ActualPresentFollowing,
    /// Present/following of another transport stream (0x4F).
    OtherPresentFollowing,
    /// Schedule of the actual transport stream (0x50 to 0x5F).
    ActualSchedule,
    /// Schedule of another transport stream (0x60 to 0x6F).
    OtherSchedule,
}

/// An event of [`EventInformation`].
///
/// Start time and duration are kept raw and decoded on demand, so that a bad
/// BCD digit only costs the event that carries it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventEntry {
    /// event_id
    pub event_id: EventId,
    /// start_time as MJD and BCD.
    pub start_time: [u8; 5],
    /// duration as BCD.
    pub duration: [u8; 3],
    /// running_status
    pub running_status: RunningStatus,
    /// free_CA_mode; `true` if scrambled.
    pub free_ca_mode: bool,
    /// Event descriptors.
    pub descriptors: Vec<Descriptor>,
}

impl EventEntry {
    /// Decodes the start time in UTC. `Ok(None)` means undefined.
    #[inline]
    pub fn start(&self) -> Result<Option<DateTime>, TimeError> {
        DateTime::read(&self.start_time)
    }

    /// Decodes the duration. `Ok(None)` means undefined.
    #[inline]
    pub fn duration(&self) -> Result<Option<Duration>, TimeError> {
        crate::time::read_duration(&self.duration)
    }
}

/// EIT (Event Information Table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventInformation {
    /// Kind of the section.
    pub kind: EitKind,
    /// service_id
    pub service_id: ServiceId,
    /// transport_stream_id
    pub transport_stream_id: TransportStreamId,
    /// original_network_id
    pub original_network_id: NetworkId,
    /// segment_last_section_number
    pub segment_last_section_number: u8,
    /// last_table_id
    pub last_table_id: u8,
    /// Events.
    pub events: Vec<EventEntry>,
}

impl EventInformation {
    /// Returns `true` if `table_id` carries an EIT.
    #[inline]
    pub fn is_eit(table_id: u8) -> bool {
        matches!(table_id, 0x4E..=0x6F)
    }
}

impl PsiTable for EventInformation {
    fn read(section: &Section) -> Result<EventInformation, TableError> {
        let kind = match section.table_id {
            0x4E => EitKind::ActualPresentFollowing,
            0x4F => EitKind::OtherPresentFollowing,
            0x50..=0x5F => EitKind::ActualSchedule,
            0x60..=0x6F => EitKind::OtherSchedule,
            table_id => return Err(TableError::UnexpectedTableId(table_id)),
        };
        let Some(syntax) = section.syntax.as_ref() else {
            log::debug!("invalid EventInformation::syntax");
            return Err(TableError::MissingSyntax);
        };

        let data = section.data;
        if data.len() < 6 {
            log::debug!("invalid EventInformation");
            return Err(TableError::Truncated("EventInformation"));
        }

        let service_id = ServiceId::new(syntax.table_id_extension);
        let transport_stream_id = TransportStreamId::new(data[0..=1].read_be_16());
        let original_network_id = NetworkId::new(data[2..=3].read_be_16());
        let segment_last_section_number = data[4];
        let last_table_id = data[5];

        let mut data = &data[6..];
        let mut events = Vec::new();
        while !data.is_empty() {
            if data.len() < 12 {
                log::debug!("invalid EventEntry");
                return Err(TableError::Truncated("EventEntry"));
            }

            let event_id = EventId::new(data[0..=1].read_be_16());
            let start_time = [data[2], data[3], data[4], data[5], data[6]];
            let duration = [data[7], data[8], data[9]];
            let running_status = ((data[10] & 0b11100000) >> 5).into();
            let free_ca_mode = data[10] & 0b00010000 != 0;
            let (descriptors, rem) = read_descriptors(
                &data[10..],
                DescriptorScope::EventInformation,
                "EventEntry::descriptors",
            )?;
            data = rem;

            events.push(EventEntry {
                event_id,
                start_time,
                duration,
                running_status,
                free_ca_mode,
                descriptors,
            });
        }

        Ok(EventInformation {
            kind,
            service_id,
            transport_stream_id,
            original_network_id,
            segment_last_section_number,
            last_table_id,
            events,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use hex_literal::hex;

    use crate::psi::build_section;
    use crate::psi::desc::ServiceType;

    use super::*;

    fn parse<T: PsiTable>(buf: &[u8]) -> Result<T, TableError> {
        let (section, _) = Section::parse(buf).unwrap();
        T::read(&section)
    }

    #[test]
    fn test_nit() {
        let buf = build_section(
            0x40,
            0x233A,
            0,
            0,
            0,
            &hex!(
                "F005 40 03 424243"
                "F00E"
                "1044 233A F008 41 06 1044 01 1100 01"
            ),
        );
        let nit: NetworkInformation = parse(&buf).unwrap();
        assert!(nit.actual);
        assert_eq!(nit.network_id, NetworkId::new(0x233A));
        assert_eq!(nit.network_name().as_deref(), Some("BBC"));
        assert_eq!(nit.transport_streams.len(), 1);
        let ts = &nit.transport_streams[0];
        assert_eq!(ts.transport_stream_id, TransportStreamId::new(0x1044));
        assert_matches!(&ts.descriptors[..], [Descriptor::ServiceList(list)] if list.services.len() == 2);
    }

    #[test]
    fn test_bat_tolerates_opaque() {
        // an unknown descriptor between two known ones
        let buf = build_section(
            0x4A,
            0x0100,
            0,
            0,
            0,
            &hex!(
                "F00E 47 03 465354 E0 01 FF 5F 04 00000002"
                "F000"
            ),
        );
        let bat: BouquetAssociation = parse(&buf).unwrap();
        assert_eq!(bat.bouquet_id, BouquetId::new(0x0100));
        assert_eq!(bat.bouquet_name().as_deref(), Some("FST"));
        assert_eq!(bat.descriptors.len(), 3);
        assert!(bat.descriptors[1].is_opaque());
        assert_matches!(bat.descriptors[2], Descriptor::PrivateDataSpecifier(_));
        assert!(bat.transport_streams.is_empty());
    }

    #[test]
    fn test_sdt() {
        let buf = build_section(
            0x42,
            0x1044,
            0,
            0,
            0,
            &hex!(
                "233A FF"
                "1044 FD 800F 48 0D 19 03 424243 07 42424320 4F6E65"
            ),
        );
        let sdt: ServiceDescription = parse(&buf).unwrap();
        assert!(sdt.actual);
        assert_eq!(sdt.original_network_id, NetworkId::new(0x233A));
        let service = &sdt.services[0];
        assert_eq!(service.service_id, ServiceId::new(0x1044));
        assert!(service.eit_schedule_flag);
        assert!(service.eit_present_following_flag);
        assert_eq!(service.running_status, RunningStatus::Running);
        assert!(!service.free_ca_mode);
        let desc = service.service_descriptor().unwrap();
        assert_eq!(desc.service_type, ServiceType::AVC_HD_TV);
        assert_eq!(desc.service_name.decode(), "BBC One");
    }

    #[test]
    fn test_eit() {
        let buf = build_section(
            0x50,
            0x1044,
            2,
            0,
            0,
            &hex!(
                "1044 233A 00 50"
                "0001 EBDB 203000 004500 8012 4D 10 656E67 04 4E657773 07 4E657773203130"
            ),
        );
        let eit: EventInformation = parse(&buf).unwrap();
        assert_eq!(eit.kind, EitKind::ActualSchedule);
        assert_eq!(eit.service_id, ServiceId::new(0x1044));
        let event = &eit.events[0];
        assert_eq!(event.event_id, EventId::new(1));
        assert_eq!(
            event.start().unwrap().unwrap().to_string(),
            "2024-03-10 20:30:00",
        );
        assert_eq!(event.duration(), Ok(Some(Duration::minutes(45))));
        assert_eq!(event.running_status, RunningStatus::Running);
        assert_matches!(&event.descriptors[..], [Descriptor::ShortEvent(se)] if se.event_name.decode() == "News");
    }

    #[test]
    fn test_truncated_entry() {
        let buf = build_section(0x42, 0x1044, 0, 0, 0, &hex!("233A FF 1044 FD 800F 48"));
        assert_eq!(
            parse::<ServiceDescription>(&buf),
            Err(TableError::Truncated("ServiceEntry::descriptors")),
        );

        let buf = build_section(0x4E, 0x1044, 0, 0, 0, &hex!("1044 233A 00 4E 0001 EBDB"));
        assert_eq!(
            parse::<EventInformation>(&buf),
            Err(TableError::Truncated("EventEntry")),
        );
    }
}
