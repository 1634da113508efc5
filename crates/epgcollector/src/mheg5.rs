//! MHEG-5 EPG files from a DSM-CC object carousel.
//!
//! The carousel holds one file per service and day under
//! `epg/data/<YYYYMMDD>/<service_id>`. A file is a list of records separated
//! by `0x1D`, each a list of fields separated by `0x1C`. The first record
//! carries the date and the number of programme records that follow; the
//! layout of a programme record differs per country and is described by a
//! [`FieldMap`].

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use dvbsi::dsmcc::{Carousel, DsmccMessage};
use dvbsi::lang::CountryCode;
use dvbsi::psi::table::{EventId, ServiceId};
use dvbsi::psi::Section;
use dvbsi::Pid;

use crate::bouquet::ChannelMap;
use crate::collector::SectionSink;
use crate::config::{ConfigError, EpgSettings, RunCache};
use crate::entry::{EpgEntry, RecordError};
use crate::episode;
use crate::si::ServiceInformation;
use crate::station::{StationKey, Stations};

/// Separates records.
pub const RECORD_SEPARATOR: u8 = 0x1D;
/// Separates fields within a record.
pub const FIELD_SEPARATOR: u8 = 0x1C;

/// Directory holding one subdirectory per day.
const EPG_ROOT: &str = "epg/data";

/// A field of a programme record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Decimal event id.
    EventId,
    /// Local start time as `HHMM` or `HH:MM`.
    Start,
    /// Duration in minutes.
    Duration,
    /// Title.
    Title,
    /// Description.
    Description,
    /// Sub-title.
    SubTitle,
    /// Minimum age in years; zero for none.
    Rating,
    /// Category name.
    Category,
    /// A field that is skipped.
    Ignore,
}

impl Field {
    fn from_name(name: &str) -> Option<Field> {
        Some(match name {
            "event_id" => Field::EventId,
            "start" => Field::Start,
            "duration" => Field::Duration,
            "title" => Field::Title,
            "description" => Field::Description,
            "subtitle" => Field::SubTitle,
            "rating" => Field::Rating,
            "category" => Field::Category,
            "_" => Field::Ignore,
            _ => return None,
        })
    }
}

/// Ordered field names of a programme record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMap(Vec<Field>);

impl FieldMap {
    /// Parses comma-separated field names, such as
    /// `event_id,start,duration,title,description`.
    ///
    /// Names may span several lines; blank lines and lines starting with `#`
    /// are skipped. `start`, `duration` and `title` are required.
    pub fn parse(text: &str) -> Result<FieldMap, ConfigError> {
        let mut fields = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            for name in line.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let syntax = |reason| ConfigError::Syntax { line: i + 1, reason };
                let field = Field::from_name(name).ok_or(syntax("unknown field"))?;
                if field != Field::Ignore && fields.contains(&field) {
                    return Err(syntax("duplicate field"));
                }
                fields.push(field);
            }
        }

        for required in [Field::Start, Field::Duration, Field::Title] {
            if !fields.contains(&required) {
                return Err(ConfigError::Syntax {
                    line: 0,
                    reason: "start, duration and title are required",
                });
            }
        }
        Ok(FieldMap(fields))
    }

    /// Returns the built-in layout for `country`.
    pub fn builtin(country: CountryCode) -> Option<FieldMap> {
        let text = match country {
            CountryCode::GBR => "event_id,start,duration,title,description,_",
            CountryCode::AUS => "start,duration,title,description,rating,category",
            CountryCode::NZL => "start,duration,title,subtitle,description,rating",
            _ => return None,
        };
        FieldMap::parse(text).ok()
    }

    /// Returns the fields in record order.
    #[inline]
    pub fn fields(&self) -> &[Field] {
        &self.0
    }
}

/// Splits `data` at every `delimiter` using memchr.
fn split(data: &[u8], delimiter: u8) -> impl Iterator<Item = &[u8]> {
    let mut rest = Some(data);
    std::iter::from_fn(move || {
        let data = rest?;
        match memchr::memchr(delimiter, data) {
            Some(pos) => {
                rest = Some(&data[pos + 1..]);
                Some(&data[..pos])
            }
            None => {
                rest = None;
                Some(data)
            }
        }
    })
}

fn text(field: &[u8]) -> String {
    String::from_utf8_lossy(field).trim().to_string()
}

fn number<T: std::str::FromStr>(field: &[u8], name: &'static str) -> Result<T, RecordError> {
    let value = text(field);
    value
        .parse()
        .map_err(|_| RecordError::InvalidNumber { field: name, value })
}

fn parse_date(field: &[u8]) -> Result<NaiveDate, RecordError> {
    let s = text(field);
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RecordError::InvalidNumber {
            field: "date",
            value: s,
        });
    }
    let (year, rest) = s.split_at(4);
    let (month, day) = rest.split_at(2);
    let (Ok(year), Ok(month), Ok(day)) = (
        year.parse::<i32>(),
        month.parse::<u32>(),
        day.parse::<u32>(),
    ) else {
        return Err(RecordError::FieldOutOfRange("date"));
    };
    NaiveDate::from_ymd_opt(year, month, day).ok_or(RecordError::FieldOutOfRange("date"))
}

fn parse_time(field: &[u8]) -> Result<NaiveTime, RecordError> {
    let s = text(field);
    let digits: String = s.chars().filter(|&c| c != ':').collect();
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RecordError::InvalidNumber {
            field: "start",
            value: s,
        });
    }
    let (Ok(hour), Ok(minute)) = (digits[..2].parse::<u32>(), digits[2..].parse::<u32>()) else {
        return Err(RecordError::FieldOutOfRange("start"));
    };
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or(RecordError::FieldOutOfRange("start"))
}

/// A programme record before its date is known.
#[derive(Debug)]
struct Programme {
    event_id: EventId,
    start: NaiveTime,
    duration: Duration,
    title: String,
    description: String,
    sub_title: Option<String>,
    rating: Option<u8>,
    category: Option<String>,
}

fn parse_programme(record: &[u8], map: &FieldMap) -> Result<Programme, RecordError> {
    let fields: Vec<&[u8]> = split(record, FIELD_SEPARATOR).collect();
    if fields.len() < map.fields().len() {
        return Err(RecordError::FieldCount {
            expected: map.fields().len(),
            found: fields.len(),
        });
    }

    let mut event_id = EventId::new(0);
    let mut start = None;
    let mut duration = Duration::zero();
    let mut title = String::new();
    let mut description = String::new();
    let mut sub_title = None;
    let mut rating = None;
    let mut category = None;
    for (field, value) in map.fields().iter().zip(fields) {
        match field {
            Field::EventId => event_id = EventId::new(number(value, "event_id")?),
            Field::Start => start = Some(parse_time(value)?),
            Field::Duration => duration = Duration::minutes(number::<u16>(value, "duration")? as i64),
            Field::Title => title = text(value),
            Field::Description => description = text(value),
            Field::SubTitle => sub_title = Some(text(value)).filter(|s| !s.is_empty()),
            Field::Rating => rating = Some(number::<u8>(value, "rating")?).filter(|&age| age != 0),
            Field::Category => category = Some(text(value)).filter(|s| !s.is_empty()),
            Field::Ignore => {}
        }
    }

    let Some(start) = start else {
        return Err(RecordError::Truncated("start"));
    };
    if title.is_empty() {
        return Err(RecordError::FieldOutOfRange("title"));
    }
    Ok(Programme {
        event_id,
        start,
        duration,
        title,
        description,
        sub_title,
        rating,
        category,
    })
}

/// Parses one EPG file into entries of `station`.
///
/// A programme starting earlier in the day than the previous one belongs to
/// the next day. Bad programme records are logged and skipped; an error is
/// returned only if the header record is unusable.
pub fn parse_file(
    data: &[u8],
    station: StationKey,
    map: &FieldMap,
    settings: &EpgSettings,
) -> Result<Vec<EpgEntry>, RecordError> {
    let mut records = split(data, RECORD_SEPARATOR);
    let header = records.next().ok_or(RecordError::Truncated("header"))?;
    let mut header = split(header, FIELD_SEPARATOR);
    let date = parse_date(header.next().ok_or(RecordError::Truncated("header"))?)?;
    let count: usize = number(
        header.next().ok_or(RecordError::Truncated("header"))?,
        "program_count",
    )?;

    let mut day = date;
    let mut previous: Option<NaiveTime> = None;
    let mut entries = Vec::new();
    for i in 0..count {
        let Some(record) = records.next() else {
            log::warn!("{:?}: {} of {} programmes present", station, i, count);
            break;
        };
        let programme = match parse_programme(record, map) {
            Ok(programme) => programme,
            Err(e) => {
                log::warn!("{:?}: programme {}: {}", station, i, e);
                continue;
            }
        };

        if previous.map_or(false, |prev| programme.start < prev) {
            let Some(next) = day.succ_opt() else {
                log::warn!("{:?}: programme {}: date out of range", station, i);
                break;
            };
            day = next;
        }
        previous = Some(programme.start);

        let (start, duration) =
            settings.round_span(NaiveDateTime::new(day, programme.start), programme.duration);
        let mut entry = EpgEntry::new(station, programme.event_id, start, duration, programme.title);
        entry.season_episode = episode::find(&programme.description).map(|(_, se)| se);
        entry.description = programme.description;
        entry.sub_title = programme.sub_title;
        entry.parental_rating = programme.rating;
        entry.category = programme.category;
        entries.push(entry);
    }
    Ok(entries)
}

/// Collects MHEG-5 EPG files into stations.
///
/// The object carousel is located through the PAT and PMTs, whose PIDs are
/// requested from the tuner as they become known. Files are read once every
/// announced module has been downloaded.
#[derive(Debug)]
pub struct Mheg5Epg {
    settings: EpgSettings,
    field_map: FieldMap,
    si: ServiceInformation,
    stations: Stations,
    carousel: Carousel,
    carousel_pid: Option<Pid>,
    pids: Vec<Pid>,
    pids_changed: bool,
    loaded: bool,
}

impl Mheg5Epg {
    /// Creates a collector for the country of `settings`.
    pub fn new(settings: EpgSettings, cache: Arc<RunCache>) -> Result<Mheg5Epg, ConfigError> {
        let country = settings.get_country();
        let field_map = cache
            .field_map(country)
            .ok_or(ConfigError::UnknownCountry(country))?;
        Ok(Mheg5Epg {
            settings,
            field_map,
            si: ServiceInformation::new(),
            stations: Stations::default(),
            carousel: Carousel::new(),
            carousel_pid: None,
            pids: vec![Pid::PAT, Pid::SDT],
            pids_changed: true,
            loaded: false,
        })
    }

    /// Returns the stations collected so far.
    #[inline]
    pub fn stations(&self) -> &Stations {
        &self.stations
    }

    /// Returns the carousel being assembled.
    #[inline]
    pub fn carousel(&self) -> &Carousel {
        &self.carousel
    }

    /// Returns the stations and the channel numbers found.
    pub fn into_parts(mut self) -> (Stations, ChannelMap) {
        let channel_map = self.si.take_channel_map();
        (self.stations, channel_map)
    }

    fn want(&mut self, pid: Pid) {
        if !self.pids.contains(&pid) {
            self.pids.push(pid);
            self.pids_changed = true;
        }
    }

    /// Reads every EPG file of the carousel.
    ///
    /// Returns the number of entries added.
    pub fn load_files(&mut self) -> usize {
        let days = match self.carousel.list_directory(EPG_ROOT) {
            Ok(days) => days,
            Err(e) => {
                log::warn!("MHEG-5: {}", e);
                return 0;
            }
        };

        let mut added = 0;
        for day in days {
            let dir = format!("{}/{}", EPG_ROOT, day.name);
            let files = match self.carousel.list_directory(&dir) {
                Ok(files) => files,
                Err(e) => {
                    log::debug!("MHEG-5: {}", e);
                    continue;
                }
            };
            for file in files {
                let Ok(service_id) = file.name.parse::<u16>() else {
                    log::debug!("MHEG-5: unexpected file {}/{}", dir, file.name);
                    continue;
                };
                let Some(key) = self.si.actual_key(ServiceId::new(service_id)) else {
                    continue;
                };
                let path = format!("{}/{}", dir, file.name);
                let data = match self.carousel.read_file(&path) {
                    Ok(data) => data,
                    Err(e) => {
                        log::debug!("MHEG-5: {}", e);
                        continue;
                    }
                };
                match parse_file(data, key, &self.field_map, &self.settings) {
                    Ok(entries) => {
                        let station = self.stations.get_or_insert(key);
                        for entry in entries {
                            added += station.epg.insert(entry) as usize;
                        }
                    }
                    Err(e) => log::warn!("MHEG-5: {}: {}", path, e),
                }
            }
        }

        self.loaded = true;
        log::info!("MHEG-5: {} entries read from the carousel", added);
        added
    }
}

impl SectionSink for Mheg5Epg {
    fn on_section(&mut self, section: &Section) {
        match section.table_id {
            DsmccMessage::TABLE_ID_CONTROL | DsmccMessage::TABLE_ID_DATA => {
                match self.carousel.on_section(section) {
                    Ok(true) if self.carousel.all_data_processed() => {
                        self.load_files();
                    }
                    Ok(_) => {}
                    Err(e) => log::warn!("MHEG-5: {}", e),
                }
            }
            _ => {
                if !self.si.on_section(section, &mut self.stations) {
                    return;
                }
                for pid in self.si.pmt_pids() {
                    self.want(pid);
                }
                if self.carousel_pid.is_none() {
                    if let Some((service_id, pid)) = self.si.object_carousel() {
                        log::info!("MHEG-5: carousel of service {} on PID {}", service_id, pid);
                        self.carousel_pid = Some(pid);
                        self.want(pid);
                    }
                }
            }
        }
    }

    fn entry_count(&self) -> usize {
        self.stations.total_entries()
    }

    fn is_complete(&self) -> bool {
        self.loaded && self.si.is_services_complete()
    }

    fn requested_pids(&mut self) -> Option<Vec<Pid>> {
        if !self.pids_changed {
            return None;
        }
        self.pids_changed = false;
        Some(self.pids.clone())
    }

    fn finish(&mut self) {
        self.si.apply_channel_numbers(&mut self.stations);
        self.stations.finish(&self.settings);
    }
}
