//! FreeSat EIT schedules.
//!
//! FreeSat carries its service information on PID 0x0F01 and its EIT
//! schedules on PID 0x0F02. Event texts may be Huffman-compressed with one of
//! two dictionaries, which have to be loaded into the [`RunCache`] first.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use dvbsi::find_descriptor;
use dvbsi::psi::desc::Descriptor;
use dvbsi::psi::table::{EventEntry, EventInformation};
use dvbsi::psi::{PsiTable, Section, SectionSyntax};
use dvbsi::text::DvbString;
use dvbsi::Pid;

use crate::bouquet::ChannelMap;
use crate::collector::SectionSink;
use crate::config::{EpgSettings, RunCache};
use crate::entry::{EpgEntry, RecordError};
use crate::episode;
use crate::si::ServiceInformation;
use crate::station::{StationKey, Stations};

/// PIDs to request from the tuner for FreeSat collection.
pub const PIDS: [Pid; 2] = [Pid::FREESAT_SI, Pid::FREESAT_EIT];

#[derive(Debug)]
struct EitSubtable {
    version: u8,
    last_section_number: u8,
    last_table_id: u8,
    /// Last section number of each segment seen.
    segments: BTreeMap<u8, u8>,
    sections: BTreeSet<u8>,
}

impl EitSubtable {
    fn is_complete(&self) -> bool {
        (0..=self.last_section_number / 8).all(|segment| {
            self.segments.get(&segment).map_or(false, |&last| {
                (segment * 8..=last).all(|n| self.sections.contains(&n))
            })
        })
    }
}

/// Tracks EIT sections, which arrive in segments of up to eight sections
/// rather than as a contiguous run.
#[derive(Debug, Default)]
struct EitProgress {
    subtables: BTreeMap<(StationKey, u8), EitSubtable>,
}

/// First table_id of the EIT table group `table_id` belongs to.
fn first_table_id(table_id: u8) -> u8 {
    match table_id {
        0x50..=0x5F => 0x50,
        0x60..=0x6F => 0x60,
        _ => table_id,
    }
}

impl EitProgress {
    /// Records a section. Returns `false` if it was already recorded.
    fn insert(
        &mut self,
        key: StationKey,
        table_id: u8,
        syntax: &SectionSyntax,
        eit: &EventInformation,
    ) -> bool {
        if !syntax.current_next_indicator || syntax.section_number > syntax.last_section_number {
            return false;
        }

        let subtable = self
            .subtables
            .entry((key, table_id))
            .or_insert_with(|| EitSubtable {
                version: syntax.version_number,
                last_section_number: syntax.last_section_number,
                last_table_id: eit.last_table_id,
                segments: BTreeMap::new(),
                sections: BTreeSet::new(),
            });
        if subtable.version != syntax.version_number {
            log::debug!(
                "EIT 0x{:02X} of {:?}: version {} -> {}",
                table_id,
                key.service_id,
                subtable.version,
                syntax.version_number,
            );
            subtable.version = syntax.version_number;
            subtable.segments.clear();
            subtable.sections.clear();
        }
        subtable.last_section_number = syntax.last_section_number;
        subtable.last_table_id = eit.last_table_id;

        let segment = syntax.section_number / 8;
        let segment_last = eit
            .segment_last_section_number
            .clamp(syntax.section_number, segment * 8 + 7);
        subtable.segments.insert(segment, segment_last);
        subtable.sections.insert(syntax.section_number)
    }

    fn is_complete(&self) -> bool {
        !self.subtables.is_empty()
            && self.subtables.iter().all(|(&(key, table_id), subtable)| {
                subtable.is_complete()
                    && (first_table_id(table_id)..=subtable.last_table_id)
                        .all(|t| self.subtables.contains_key(&(key, t)))
            })
    }
}

/// Collects FreeSat EIT events into stations.
#[derive(Debug)]
pub struct FreesatEpg {
    settings: EpgSettings,
    cache: Arc<RunCache>,
    si: ServiceInformation,
    stations: Stations,
    progress: EitProgress,
}

impl FreesatEpg {
    /// Creates a collector using the tables in `cache`.
    pub fn new(settings: EpgSettings, cache: Arc<RunCache>) -> FreesatEpg {
        FreesatEpg {
            settings,
            cache,
            si: ServiceInformation::new(),
            stations: Stations::default(),
            progress: EitProgress::default(),
        }
    }

    /// Returns the stations collected so far.
    #[inline]
    pub fn stations(&self) -> &Stations {
        &self.stations
    }

    /// Returns the stations and the channel numbers found.
    pub fn into_parts(mut self) -> (Stations, ChannelMap) {
        let channel_map = self.si.take_channel_map();
        (self.stations, channel_map)
    }

    fn decode_text(&self, text: &DvbString) -> Result<String, RecordError> {
        match text.freesat_compressed() {
            Some((table, bits)) => self
                .cache
                .huffman(table)
                .ok_or(RecordError::MissingDictionary(table))?
                .decode(bits)
                .ok_or(RecordError::Huffman),
            None => Ok(text.decode()),
        }
    }

    /// Converts an event into an entry.
    ///
    /// Returns `Ok(None)` for events with an undefined start time or duration.
    fn decode_event(
        &self,
        key: StationKey,
        event: &EventEntry,
        default_authority: Option<&str>,
    ) -> Result<Option<EpgEntry>, RecordError> {
        let Some(start) = event.start()? else {
            return Ok(None);
        };
        let Some(duration) = event.duration()? else {
            return Ok(None);
        };
        let local = self.settings.get_time_zone().to_local(start.to_naive()?);
        let (start, duration) = self.settings.round_span(local, duration);

        let Some(short) = find_descriptor!(event.descriptors, ShortEvent) else {
            return Err(RecordError::FieldOutOfRange("short_event_descriptor"));
        };
        let event_name = self.decode_text(&short.event_name)?;
        if event_name.is_empty() {
            return Err(RecordError::FieldOutOfRange("event_name"));
        }

        let mut entry = EpgEntry::new(key, event.event_id, start, duration, event_name);
        entry.lang_code = Some(short.lang_code);
        entry.description = self.decode_text(&short.text)?;
        if entry.description.is_empty() {
            let mut extended: Vec<_> = event
                .descriptors
                .iter()
                .filter_map(|d| match d {
                    Descriptor::ExtendedEvent(ext) => Some(ext),
                    _ => None,
                })
                .collect();
            extended.sort_by_key(|ext| ext.descriptor_number);
            for ext in extended {
                entry.description.push_str(&self.decode_text(&ext.text)?);
            }
        }

        entry.scrambled = event.free_ca_mode;
        entry.running_status = event.running_status;
        entry.category = find_descriptor!(event.descriptors, Content)
            .and_then(|content| content.genres.first())
            .and_then(|genre| self.cache.category(genre.code()))
            .map(str::to_owned);
        entry.parental_rating = find_descriptor!(event.descriptors, ParentalRating)
            .and_then(|rating| rating.ratings.iter().find_map(|r| r.minimum_age()));
        if let Some(cid) = find_descriptor!(event.descriptors, ContentIdentifier) {
            for crid in &cid.crids {
                if crid.is_episode() {
                    entry.episode_crid = crid.resolve(default_authority);
                } else if crid.is_series() {
                    entry.series_crid = crid.resolve(default_authority);
                }
            }
        }
        entry.season_episode = episode::find(&entry.description).map(|(_, se)| se);

        Ok(Some(entry))
    }

    /// Adds the events of an EIT section to their station.
    ///
    /// Events that cannot be decoded are logged and skipped. Returns the
    /// number of entries added.
    pub fn collect_eit(&mut self, eit: &EventInformation) -> usize {
        let key = StationKey::new(
            eit.original_network_id,
            eit.transport_stream_id,
            eit.service_id,
        );
        let default_authority = self
            .stations
            .get(&key)
            .and_then(|s| s.default_authority.clone());

        let mut entries = Vec::with_capacity(eit.events.len());
        for event in &eit.events {
            match self.decode_event(key, event, default_authority.as_deref()) {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(e) => log::warn!("event {} of {:?}: {}", event.event_id, key, e),
            }
        }

        let station = self.stations.get_or_insert(key);
        entries
            .into_iter()
            .map(|entry| station.epg.insert(entry) as usize)
            .sum()
    }
}

impl SectionSink for FreesatEpg {
    fn on_section(&mut self, section: &Section) {
        if !EventInformation::is_eit(section.table_id) {
            self.si.on_section(section, &mut self.stations);
            return;
        }

        let Some(syntax) = section.syntax.as_ref() else {
            return;
        };
        let eit = match EventInformation::read(section) {
            Ok(eit) => eit,
            Err(e) => {
                log::debug!("EIT 0x{:02X}: {}", section.table_id, e);
                return;
            }
        };
        let key = StationKey::new(
            eit.original_network_id,
            eit.transport_stream_id,
            eit.service_id,
        );
        if self.progress.insert(key, section.table_id, syntax, &eit) {
            self.collect_eit(&eit);
        }
    }

    fn entry_count(&self) -> usize {
        self.stations.total_entries()
    }

    fn is_complete(&self) -> bool {
        self.si.is_services_complete() && self.progress.is_complete()
    }

    fn finish(&mut self) {
        self.si.apply_channel_numbers(&mut self.stations);
        self.stations.finish(&self.settings);
        log::info!(
            "FreeSat: {} entries on {} stations",
            self.stations.total_entries(),
            self.stations.len(),
        );
    }
}
