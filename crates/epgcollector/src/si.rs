//! Service information shared by every EPG source.

use dvbsi::psi::table::{
    BouquetAssociation, NetworkId, NetworkInformation, Pat, ProgramMap, ServiceDescription,
    ServiceId, TransportStreamId,
};
use dvbsi::psi::{PsiTable, Section, SectionCollection};
use dvbsi::{find_descriptor, Pid};
use indexmap::IndexMap;

use crate::bouquet::ChannelMap;
use crate::station::{StationKey, Stations};

/// Tables describing the services of a multiplex.
#[derive(Debug)]
pub struct ServiceInformation {
    pat: Option<Pat>,
    pmts: IndexMap<ServiceId, ProgramMap>,
    nit: SectionCollection<NetworkInformation>,
    sdt_actual: SectionCollection<ServiceDescription>,
    sdt_other: SectionCollection<ServiceDescription>,
    bat: SectionCollection<BouquetAssociation>,
    actual: Option<(NetworkId, TransportStreamId)>,
    channel_map: ChannelMap,
}

impl Default for ServiceInformation {
    fn default() -> ServiceInformation {
        ServiceInformation {
            pat: None,
            pmts: IndexMap::new(),
            nit: SectionCollection::new(NetworkInformation::TABLE_ID_ACTUAL),
            sdt_actual: SectionCollection::new(ServiceDescription::TABLE_ID_ACTUAL),
            sdt_other: SectionCollection::new(ServiceDescription::TABLE_ID_OTHER),
            bat: SectionCollection::new(BouquetAssociation::TABLE_ID),
            actual: None,
            channel_map: ChannelMap::new(),
        }
    }
}

fn read_table<T: PsiTable>(section: &Section) -> Option<T> {
    match T::read(section) {
        Ok(table) => Some(table),
        Err(e) => {
            log::debug!("table 0x{:02X}: {}", section.table_id, e);
            None
        }
    }
}

impl ServiceInformation {
    /// Creates an empty set of tables.
    #[inline]
    pub fn new() -> ServiceInformation {
        ServiceInformation::default()
    }

    /// Feeds a PAT, PMT, NIT, SDT or BAT section.
    ///
    /// Services described by an SDT are added to `stations`. Returns `false`
    /// if the section belongs to none of these tables.
    pub fn on_section(&mut self, section: &Section, stations: &mut Stations) -> bool {
        match section.table_id {
            Pat::TABLE_ID => {
                if let Some(pat) = read_table::<Pat>(section) {
                    if self.pat.as_ref() != Some(&pat) {
                        log::debug!("PAT: {} programs", pat.programs.len());
                        self.pmts.retain(|sid, _| pat.pmt_pid(*sid).is_some());
                        self.pat = Some(pat);
                    }
                }
            }
            ProgramMap::TABLE_ID => {
                if let Some(pmt) = read_table::<ProgramMap>(section) {
                    self.pmts.insert(pmt.program_number, pmt);
                }
            }
            NetworkInformation::TABLE_ID_ACTUAL => {
                let Some(syntax) = section.syntax.as_ref() else {
                    return true;
                };
                if let Some(nit) = read_table::<NetworkInformation>(section) {
                    self.channel_map.add_nit(&nit);
                    self.nit.insert(syntax, nit);
                }
            }
            ServiceDescription::TABLE_ID_ACTUAL | ServiceDescription::TABLE_ID_OTHER => {
                let Some(syntax) = section.syntax.as_ref() else {
                    return true;
                };
                if let Some(sdt) = read_table::<ServiceDescription>(section) {
                    add_services(&sdt, stations);
                    if sdt.actual {
                        self.actual = Some((sdt.original_network_id, sdt.transport_stream_id));
                        self.sdt_actual.insert(syntax, sdt);
                    } else {
                        self.sdt_other.insert(syntax, sdt);
                    }
                }
            }
            BouquetAssociation::TABLE_ID => {
                let Some(syntax) = section.syntax.as_ref() else {
                    return true;
                };
                if let Some(bat) = read_table::<BouquetAssociation>(section) {
                    self.channel_map.add_bat(&bat);
                    self.bat.insert(syntax, bat);
                }
            }
            _ => return false,
        }
        true
    }

    /// Returns `true` once every section of the actual SDT, and of any other
    /// SDT seen so far, has arrived.
    pub fn is_services_complete(&self) -> bool {
        self.sdt_actual.is_complete() && (self.sdt_other.is_empty() || self.sdt_other.is_complete())
    }

    /// Returns `true` once every section of the actual NIT has arrived.
    #[inline]
    pub fn is_network_complete(&self) -> bool {
        self.nit.is_complete()
    }

    /// Returns `true` once every section of the BAT has arrived.
    #[inline]
    pub fn is_bouquets_complete(&self) -> bool {
        self.bat.is_complete()
    }

    /// Returns the original_network_id and transport_stream_id of the actual multiplex.
    #[inline]
    pub fn actual(&self) -> Option<(NetworkId, TransportStreamId)> {
        self.actual
    }

    /// Returns the key of a service of the actual multiplex.
    pub fn actual_key(&self, service_id: ServiceId) -> Option<StationKey> {
        self.actual
            .map(|(onid, tsid)| StationKey::new(onid, tsid, service_id))
    }

    /// Returns the PMT PIDs announced by the PAT.
    pub fn pmt_pids(&self) -> Vec<Pid> {
        self.pat
            .as_ref()
            .map(|pat| pat.programs.iter().map(|p| p.program_map_pid).collect())
            .unwrap_or_default()
    }

    /// Returns the service and PID of the first object carousel found in a PMT.
    pub fn object_carousel(&self) -> Option<(ServiceId, Pid)> {
        self.pmts.values().find_map(|pmt| {
            pmt.object_carousel()
                .map(|es| (pmt.program_number, es.elementary_pid))
        })
    }

    /// Returns the channel numbers collected so far.
    #[inline]
    pub fn channel_map(&self) -> &ChannelMap {
        &self.channel_map
    }

    /// Copies channel numbers into the stations they belong to.
    pub fn apply_channel_numbers(&self, stations: &mut Stations) {
        for (key, assignments) in self.channel_map.iter() {
            let Some(station) = stations.get_mut(key) else {
                continue;
            };
            for assignment in assignments {
                if !station.channel_numbers.contains(&assignment.channel_number) {
                    station.channel_numbers.push(assignment.channel_number);
                }
            }
        }
    }

    /// Takes the channel map, leaving an empty one.
    #[inline]
    pub fn take_channel_map(&mut self) -> ChannelMap {
        std::mem::take(&mut self.channel_map)
    }
}

fn add_services(sdt: &ServiceDescription, stations: &mut Stations) {
    for service in &sdt.services {
        let key = StationKey::new(
            sdt.original_network_id,
            sdt.transport_stream_id,
            service.service_id,
        );
        let station = stations.get_or_insert(key);
        station.scrambled = service.free_ca_mode;
        if let Some(desc) = service.service_descriptor() {
            station.name = desc.service_name.decode();
            station.provider_name = desc.service_provider_name.decode();
            station.service_type = Some(desc.service_type);
        }
        if let Some(authority) = find_descriptor!(service.descriptors, DefaultAuthority) {
            station.default_authority = Some(authority.default_authority.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use crate::testutil::section;

    use super::*;

    #[test]
    fn test_sdt() {
        // one service, free, with a service descriptor and a default authority
        let buf = section(
            0x42,
            0x07E3,
            1,
            0,
            0,
            &hex!(
                "0002 FF
                 1A2B FC 8013
                 48 0A 19 03 424243 04 42424331
                 73 05 622E636F6D"
            ),
        );
        let (section, _) = Section::parse(&buf).unwrap();

        let mut si = ServiceInformation::new();
        let mut stations = Stations::default();
        assert!(si.on_section(&section, &mut stations));
        assert!(si.is_services_complete());

        let key = si.actual_key(ServiceId::new(0x1A2B)).unwrap();
        let station = stations.get(&key).unwrap();
        assert_eq!(station.name, "BBC1");
        assert_eq!(station.provider_name, "BBC");
        assert_eq!(station.default_authority.as_deref(), Some("b.com"));
        assert!(!station.scrambled);
    }

    #[test]
    fn test_unrelated_section() {
        let buf = section(0x3B, 0x0000, 0, 0, 0, &[]);
        let (section, _) = Section::parse(&buf).unwrap();
        let mut si = ServiceInformation::new();
        assert!(!si.on_section(&section, &mut Stations::default()));
        assert!(!si.is_services_complete());
    }
}
