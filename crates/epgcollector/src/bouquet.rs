//! Channel numbers from bouquets and networks.

use dvbsi::find_descriptor;
use dvbsi::psi::desc::Descriptor;
use dvbsi::psi::table::{BouquetAssociation, BouquetId, NetworkInformation, TransportStream};
use fxhash::FxHashMap;
use indexmap::IndexMap;

use crate::station::StationKey;

/// A channel number given to a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelAssignment {
    /// Bouquet assigning the number, or `None` for a network-wide number.
    pub bouquet_id: Option<BouquetId>,
    /// FreeSat region the number applies to.
    pub region_id: Option<u16>,
    /// Channel number.
    pub channel_number: u16,
}

/// Channel numbers per service, and region names per bouquet.
#[derive(Debug, Clone, Default)]
pub struct ChannelMap {
    channels: IndexMap<StationKey, Vec<ChannelAssignment>>,
    region_names: FxHashMap<(BouquetId, u16), String>,
}

impl ChannelMap {
    /// Creates an empty map.
    #[inline]
    pub fn new() -> ChannelMap {
        ChannelMap::default()
    }

    fn assign(&mut self, key: StationKey, assignment: ChannelAssignment) -> bool {
        let list = self.channels.entry(key).or_default();
        if list.contains(&assignment) {
            return false;
        }
        list.push(assignment);
        true
    }

    fn add_logical_channels(&mut self, bouquet_id: Option<BouquetId>, ts: &TransportStream) -> usize {
        let mut added = 0;
        for desc in &ts.descriptors {
            let Descriptor::LogicalChannel(lcn) = desc else {
                continue;
            };
            for channel in lcn.channels.iter().filter(|c| c.visible) {
                let key = StationKey::new(
                    ts.original_network_id,
                    ts.transport_stream_id,
                    channel.service_id,
                );
                let assignment = ChannelAssignment {
                    bouquet_id,
                    region_id: None,
                    channel_number: channel.channel_number,
                };
                added += self.assign(key, assignment) as usize;
            }
        }
        added
    }

    /// Adds the FreeSat channel and region descriptors and logical channel
    /// numbers of a BAT section.
    ///
    /// Returns the number of new assignments.
    pub fn add_bat(&mut self, bat: &BouquetAssociation) -> usize {
        let bouquet_id = bat.bouquet_id;
        if let Some(regions) = find_descriptor!(bat.descriptors, FreesatRegion) {
            for region in &regions.regions {
                self.region_names
                    .insert((bouquet_id, region.region_id), region.name.decode());
            }
        }

        let mut added = 0;
        for ts in &bat.transport_streams {
            for desc in &ts.descriptors {
                let Descriptor::FreesatChannel(fsat) = desc else {
                    continue;
                };
                for channel in &fsat.channels {
                    let key = StationKey::new(
                        ts.original_network_id,
                        ts.transport_stream_id,
                        channel.service_id,
                    );
                    for region in &channel.regions {
                        let assignment = ChannelAssignment {
                            bouquet_id: Some(bouquet_id),
                            region_id: Some(region.region_id),
                            channel_number: region.channel_number,
                        };
                        added += self.assign(key, assignment) as usize;
                    }
                }
            }
            added += self.add_logical_channels(Some(bouquet_id), ts);
        }
        added
    }

    /// Adds the logical channel numbers of a NIT section.
    ///
    /// Returns the number of new assignments.
    pub fn add_nit(&mut self, nit: &NetworkInformation) -> usize {
        nit.transport_streams
            .iter()
            .map(|ts| self.add_logical_channels(None, ts))
            .sum()
    }

    /// Returns the assignments of a service.
    pub fn get(&self, key: &StationKey) -> &[ChannelAssignment] {
        self.channels.get(key).map_or(&[], Vec::as_slice)
    }

    /// Returns the name of a region of a bouquet.
    pub fn region_name(&self, bouquet_id: BouquetId, region_id: u16) -> Option<&str> {
        self.region_names
            .get(&(bouquet_id, region_id))
            .map(String::as_str)
    }

    /// Iterates over services and their assignments in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = (&StationKey, &[ChannelAssignment])> + '_ {
        self.channels.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Returns the number of services with an assignment.
    #[inline]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns `true` if no service has an assignment.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Moves every assignment and region name of `other` into this map.
    pub fn merge(&mut self, other: ChannelMap) {
        for (key, assignments) in other.channels {
            for assignment in assignments {
                self.assign(key, assignment);
            }
        }
        self.region_names.extend(other.region_names);
    }
}

#[cfg(test)]
mod tests {
    use dvbsi::lang::LangCode;
    use dvbsi::psi::desc::{
        FreesatChannel, FreesatChannelDescriptor, FreesatRegion, FreesatRegionDescriptor,
        FreesatRegionalChannel, LogicalChannel, LogicalChannelDescriptor,
    };
    use dvbsi::psi::table::{NetworkId, ServiceId, TransportStreamId};
    use dvbsi::text::DvbString;

    use super::*;

    fn ts(descriptors: Vec<Descriptor>) -> TransportStream {
        TransportStream {
            transport_stream_id: TransportStreamId::new(0x07E3),
            original_network_id: NetworkId::new(0x0002),
            descriptors,
        }
    }

    fn key(sid: u16) -> StationKey {
        StationKey::new(NetworkId::new(0x0002), TransportStreamId::new(0x07E3), ServiceId::new(sid))
    }

    #[test]
    fn test_add_bat() {
        let bat = BouquetAssociation {
            bouquet_id: BouquetId::new(0x0100),
            descriptors: vec![Descriptor::FreesatRegion(FreesatRegionDescriptor {
                regions: vec![FreesatRegion {
                    region_id: 1,
                    lang_code: LangCode::ENG,
                    name: DvbString::from_bytes(b"London"),
                }],
            })],
            transport_streams: vec![ts(vec![
                Descriptor::FreesatChannel(FreesatChannelDescriptor {
                    channels: vec![FreesatChannel {
                        service_id: ServiceId::new(0x1A2B),
                        channel_id: 0x0001,
                        regions: vec![
                            FreesatRegionalChannel {
                                channel_number: 101,
                                region_id: 1,
                            },
                            FreesatRegionalChannel {
                                channel_number: 102,
                                region_id: 2,
                            },
                        ],
                    }],
                }),
                Descriptor::LogicalChannel(LogicalChannelDescriptor {
                    channels: vec![
                        LogicalChannel {
                            service_id: ServiceId::new(0x1A2C),
                            visible: true,
                            channel_number: 7,
                        },
                        LogicalChannel {
                            service_id: ServiceId::new(0x1A2D),
                            visible: false,
                            channel_number: 8,
                        },
                    ],
                }),
            ])],
        };

        let mut map = ChannelMap::new();
        assert_eq!(map.add_bat(&bat), 3);
        // repeated sections add nothing
        assert_eq!(map.add_bat(&bat), 0);

        assert_eq!(
            map.get(&key(0x1A2B)),
            [
                ChannelAssignment {
                    bouquet_id: Some(BouquetId::new(0x0100)),
                    region_id: Some(1),
                    channel_number: 101,
                },
                ChannelAssignment {
                    bouquet_id: Some(BouquetId::new(0x0100)),
                    region_id: Some(2),
                    channel_number: 102,
                },
            ],
        );
        assert_eq!(map.get(&key(0x1A2C))[0].channel_number, 7);
        assert!(map.get(&key(0x1A2D)).is_empty());
        assert_eq!(map.region_name(BouquetId::new(0x0100), 1), Some("London"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_add_nit_and_merge() {
        let nit = NetworkInformation {
            actual: true,
            network_id: NetworkId::new(0x3005),
            descriptors: Vec::new(),
            transport_streams: vec![ts(vec![Descriptor::LogicalChannel(
                LogicalChannelDescriptor {
                    channels: vec![LogicalChannel {
                        service_id: ServiceId::new(0x1A2B),
                        visible: true,
                        channel_number: 1,
                    }],
                },
            )])],
        };

        let mut nit_map = ChannelMap::new();
        assert_eq!(nit_map.add_nit(&nit), 1);

        let mut map = ChannelMap::new();
        map.merge(nit_map.clone());
        map.merge(nit_map);
        assert_eq!(
            map.get(&key(0x1A2B)),
            [ChannelAssignment {
                bouquet_id: None,
                region_id: None,
                channel_number: 1,
            }],
        );
    }
}
