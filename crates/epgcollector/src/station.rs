//! Stations and their schedules.

use chrono::{NaiveDateTime, Timelike};
use dvbsi::psi::desc::ServiceType;
use dvbsi::psi::table::{EventId, NetworkId, ServiceId, TransportStreamId};
use fxhash::FxHashSet;
use indexmap::IndexMap;

use crate::config::EpgSettings;
use crate::entry::EpgEntry;

/// Identifies a service network-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StationKey {
    /// original_network_id
    pub original_network_id: NetworkId,
    /// transport_stream_id
    pub transport_stream_id: TransportStreamId,
    /// service_id
    pub service_id: ServiceId,
}

impl StationKey {
    /// Creates a `StationKey`.
    #[inline]
    pub fn new(
        original_network_id: NetworkId,
        transport_stream_id: TransportStreamId,
        service_id: ServiceId,
    ) -> StationKey {
        StationKey {
            original_network_id,
            transport_stream_id,
            service_id,
        }
    }
}

/// The schedule of one station.
///
/// Entries keep their insertion order. An entry whose event_id and start
/// time are already present is dropped.
#[derive(Debug, Clone, Default)]
pub struct EpgCollection {
    entries: Vec<EpgEntry>,
    seen: FxHashSet<(EventId, NaiveDateTime)>,
}

impl EpgCollection {
    /// Adds `entry` unless it duplicates one already present.
    ///
    /// Returns `true` if the entry was added.
    pub fn insert(&mut self, entry: EpgEntry) -> bool {
        if !self.seen.insert((entry.event_id, entry.start)) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Returns the number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the collection holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the entries.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, EpgEntry> {
        self.entries.iter()
    }

    /// Drops entries outside the day window of `settings`.
    pub fn retain_window(&mut self, settings: &EpgSettings) {
        let before = self.entries.len();
        self.entries.retain(|e| settings.in_window(e.start, e.end()));
        if self.entries.len() != before {
            self.rebuild_seen();
        }
    }

    /// Sorts by start time and joins events split at midnight.
    ///
    /// Two entries are joined when they have the same title, the second one
    /// starts at 00:00:00 and the first one ends exactly then. The joined
    /// entry keeps the first entry's fields.
    pub fn merge_midnight_splits(&mut self) {
        self.entries.sort_by_key(|e| e.start);

        let mut merged: Vec<EpgEntry> = Vec::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            if let Some(last) = merged.last_mut() {
                if entry.start.num_seconds_from_midnight() == 0
                    && last.end() == entry.start
                    && last.event_name == entry.event_name
                {
                    log::trace!("merging {} at {}", entry.event_name, entry.start);
                    last.duration = last.duration + entry.duration;
                    continue;
                }
            }
            merged.push(entry);
        }
        self.entries = merged;
        self.rebuild_seen();
    }

    fn rebuild_seen(&mut self) {
        self.seen = self.entries.iter().map(|e| (e.event_id, e.start)).collect();
    }
}

impl<'a> IntoIterator for &'a EpgCollection {
    type Item = &'a EpgEntry;
    type IntoIter = std::slice::Iter<'a, EpgEntry>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A service and its schedule.
#[derive(Debug, Clone)]
pub struct Station {
    /// Key of the service.
    pub key: StationKey,
    /// Service name.
    pub name: String,
    /// Service provider name.
    pub provider_name: String,
    /// Service type from the service descriptor.
    pub service_type: Option<ServiceType>,
    /// `true` if the service is scrambled.
    pub scrambled: bool,
    /// Channel numbers assigned by bouquets or networks.
    pub channel_numbers: Vec<u16>,
    /// Default authority for relative CRIDs.
    pub default_authority: Option<String>,
    /// Schedule.
    pub epg: EpgCollection,
}

impl Station {
    /// Creates an unnamed station.
    pub fn new(key: StationKey) -> Station {
        Station {
            key,
            name: String::new(),
            provider_name: String::new(),
            service_type: None,
            scrambled: false,
            channel_numbers: Vec::new(),
            default_authority: None,
            epg: EpgCollection::default(),
        }
    }
}

/// All stations found so far, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct Stations(IndexMap<StationKey, Station>);

impl Stations {
    /// Returns the station for `key`, creating it if unknown.
    pub fn get_or_insert(&mut self, key: StationKey) -> &mut Station {
        self.0.entry(key).or_insert_with(|| Station::new(key))
    }

    /// Returns the station for `key`.
    #[inline]
    pub fn get(&self, key: &StationKey) -> Option<&Station> {
        self.0.get(key)
    }

    /// Returns the station for `key` mutably.
    #[inline]
    pub fn get_mut(&mut self, key: &StationKey) -> Option<&mut Station> {
        self.0.get_mut(key)
    }

    /// Returns the number of stations.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no station is known.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the stations.
    #[inline]
    pub fn iter(&self) -> indexmap::map::Values<'_, StationKey, Station> {
        self.0.values()
    }

    /// Returns the number of EPG entries over all stations.
    pub fn total_entries(&self) -> usize {
        self.0.values().map(|s| s.epg.len()).sum()
    }

    /// Applies the day window and merges midnight splits on every station.
    ///
    /// Call once after every source for the stations has been loaded.
    pub fn finish(&mut self, settings: &EpgSettings) {
        for station in self.0.values_mut() {
            station.epg.retain_window(settings);
            station.epg.merge_midnight_splits();
        }
    }
}
