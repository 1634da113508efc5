//! Settings and the per-run cache of loaded tables.

use std::io;
use std::time::Duration as StdDuration;

use chrono::{Duration, FixedOffset, NaiveDate, NaiveDateTime, Timelike};
use dvbsi::lang::CountryCode;
use dvbsi::Pid;
use fxhash::FxHashMap;
use thiserror::Error;

use crate::bouquet::ChannelMap;
use crate::category::CategoryTable;
use crate::huffman::HuffmanDictionary;
use crate::mheg5::FieldMap;

/// Errors from loading configuration tables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A line could not be parsed. Line 0 refers to the table as a whole.
    #[error("line {line}: {reason}")]
    Syntax {
        /// One-based line number.
        line: usize,
        /// What is wrong with the line.
        reason: &'static str,
    },

    /// No Huffman dictionary exists under this number.
    #[error("unknown huffman table {0}")]
    UnknownTable(u8),

    /// No MHEG-5 field layout is known for the country.
    #[error("no field layout for {0}")]
    UnknownCountry(CountryCode),

    /// The table could not be read.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Time zone used for local start times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeZone {
    /// Time zone of the host.
    #[default]
    Local,
    /// Fixed offset from UTC.
    Fixed(FixedOffset),
}

impl TimeZone {
    /// Converts a UTC time to local time.
    pub fn to_local(&self, utc: NaiveDateTime) -> NaiveDateTime {
        use chrono::TimeZone as _;

        match self {
            TimeZone::Local => chrono::Local.from_utc_datetime(&utc).naive_local(),
            TimeZone::Fixed(offset) => offset.from_utc_datetime(&utc).naive_local(),
        }
    }

    /// Returns today's date in this time zone.
    pub fn today(&self) -> NaiveDate {
        self.to_local(chrono::Utc::now().naive_utc()).date()
    }
}

/// How EPG entries are normalized and filtered.
#[derive(Debug, Clone)]
pub struct EpgSettings {
    days: u32,
    reference_date: Option<NaiveDate>,
    rounding: Duration,
    time_zone: TimeZone,
    country: CountryCode,
}

impl Default for EpgSettings {
    fn default() -> EpgSettings {
        EpgSettings {
            days: 0,
            reference_date: None,
            rounding: Duration::minutes(1),
            time_zone: TimeZone::Local,
            country: CountryCode::GBR,
        }
    }
}

impl EpgSettings {
    /// Creates the default settings.
    #[inline]
    pub fn new() -> EpgSettings {
        EpgSettings::default()
    }

    /// Sets the number of days to keep, starting at the reference date.
    ///
    /// Zero keeps everything.
    #[inline]
    pub fn days(&mut self, days: u32) {
        self.days = days;
    }

    /// Sets the first day of the window. Defaults to today.
    #[inline]
    pub fn reference_date(&mut self, date: NaiveDate) {
        self.reference_date = Some(date);
    }

    /// Sets the granularity start and end times are rounded to.
    ///
    /// Granularities under one second disable rounding.
    #[inline]
    pub fn rounding(&mut self, rounding: Duration) {
        self.rounding = rounding;
    }

    /// Sets the time zone of local times.
    #[inline]
    pub fn time_zone(&mut self, time_zone: TimeZone) {
        self.time_zone = time_zone;
    }

    /// Sets the country whose MHEG-5 field layout applies.
    #[inline]
    pub fn country(&mut self, country: CountryCode) {
        self.country = country;
    }

    /// Returns the time zone.
    #[inline]
    pub fn get_time_zone(&self) -> TimeZone {
        self.time_zone
    }

    /// Returns the MHEG-5 country.
    #[inline]
    pub fn get_country(&self) -> CountryCode {
        self.country
    }

    /// Rounds `t` to the nearest multiple of the granularity since midnight.
    ///
    /// Halfway values round up.
    pub fn round(&self, t: NaiveDateTime) -> NaiveDateTime {
        let step = self.rounding.num_seconds();
        let since_midnight = t.num_seconds_from_midnight() as i64;
        let midnight =
            t - Duration::seconds(since_midnight) - Duration::nanoseconds(t.nanosecond() as i64);
        if step <= 1 {
            return midnight + Duration::seconds(since_midnight);
        }
        midnight + Duration::seconds((since_midnight + step / 2) / step * step)
    }

    /// Rounds a span by rounding both ends, so that back-to-back spans stay
    /// back-to-back.
    pub fn round_span(&self, start: NaiveDateTime, duration: Duration) -> (NaiveDateTime, Duration) {
        let rounded_start = self.round(start);
        let rounded_end = self.round(start + duration);
        (rounded_start, rounded_end - rounded_start)
    }

    /// Returns the day window, or `None` if every entry is kept.
    pub fn window(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        if self.days == 0 {
            return None;
        }
        let date = self
            .reference_date
            .unwrap_or_else(|| self.time_zone.today());
        let start = NaiveDateTime::new(date, chrono::NaiveTime::from_hms_opt(0, 0, 0)?);
        Some((start, start + Duration::days(self.days as i64)))
    }

    /// Returns `true` if an entry spanning `start..end` overlaps the window.
    pub fn in_window(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        match self.window() {
            None => true,
            Some((from, to)) => end > from && start < to,
        }
    }
}

/// When a collection session counts as finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionMode {
    /// End as soon as the sink reports completion, or on stagnation.
    #[default]
    Predicate,
    /// Ignore the sink's completion and end on stagnation only.
    StagnationOnly,
}

/// Options of a [`Collector`](crate::Collector).
#[derive(Debug, Clone)]
pub struct CollectorOptions {
    pub(crate) poll_interval: StdDuration,
    pub(crate) stagnation_repeats: u32,
    pub(crate) completion: CompletionMode,
    pub(crate) pids: Vec<Pid>,
}

impl Default for CollectorOptions {
    fn default() -> CollectorOptions {
        CollectorOptions {
            poll_interval: StdDuration::from_secs(1),
            stagnation_repeats: 30,
            completion: CompletionMode::Predicate,
            pids: Vec::new(),
        }
    }
}

impl CollectorOptions {
    /// Sets the time slept between draining the queue.
    #[inline]
    pub fn poll_interval(&mut self, poll_interval: StdDuration) {
        self.poll_interval = poll_interval;
    }

    /// Sets how many consecutive polls without new entries end the session.
    #[inline]
    pub fn stagnation_repeats(&mut self, repeats: u32) {
        self.stagnation_repeats = repeats;
    }

    /// Sets the completion mode.
    #[inline]
    pub fn completion(&mut self, completion: CompletionMode) {
        self.completion = completion;
    }

    /// Sets the PIDs requested from the tuner when the session starts.
    #[inline]
    pub fn pids(&mut self, pids: Vec<Pid>) {
        self.pids = pids;
    }
}

/// Tables loaded once per run and shared by every session of the run.
#[derive(Debug, Default)]
pub struct RunCache {
    huffman: [Option<HuffmanDictionary>; 2],
    categories: Option<CategoryTable>,
    field_maps: FxHashMap<CountryCode, FieldMap>,
    /// Channel numbers collected from bouquets and networks.
    pub channel_map: ChannelMap,
}

impl RunCache {
    /// Creates an empty cache.
    #[inline]
    pub fn new() -> RunCache {
        RunCache::default()
    }

    /// Loads Huffman dictionary `table` (1 or 2) unless already loaded.
    pub fn load_huffman(&mut self, table: u8, text: &str) -> Result<(), ConfigError> {
        let slot = match table {
            1 | 2 => &mut self.huffman[table as usize - 1],
            _ => return Err(ConfigError::UnknownTable(table)),
        };
        if slot.is_none() {
            *slot = Some(HuffmanDictionary::parse(text)?);
            log::debug!("loaded huffman table {}", table);
        }
        Ok(())
    }

    /// Returns Huffman dictionary `table`, if loaded.
    #[inline]
    pub fn huffman(&self, table: u8) -> Option<&HuffmanDictionary> {
        match table {
            1 | 2 => self.huffman[table as usize - 1].as_ref(),
            _ => None,
        }
    }

    /// Loads the category table unless already loaded.
    pub fn load_categories(&mut self, text: &str) -> Result<(), ConfigError> {
        if self.categories.is_none() {
            self.categories = Some(CategoryTable::parse(text)?);
        }
        Ok(())
    }

    /// Returns the category name for a content code.
    ///
    /// Falls back to the standard genre names when no table is loaded or the
    /// table has no entry.
    pub fn category(&self, code: u8) -> Option<&str> {
        match &self.categories {
            Some(table) => table.lookup(code),
            None => crate::category::standard_name(code),
        }
    }

    /// Loads the MHEG-5 field layout for `country` unless already loaded.
    pub fn load_field_map(&mut self, country: CountryCode, text: &str) -> Result<(), ConfigError> {
        if !self.field_maps.contains_key(&country) {
            self.field_maps.insert(country, FieldMap::parse(text)?);
        }
        Ok(())
    }

    /// Returns the MHEG-5 field layout for `country`, falling back to the
    /// built-in layout.
    pub fn field_map(&self, country: CountryCode) -> Option<FieldMap> {
        self.field_maps
            .get(&country)
            .cloned()
            .or_else(|| FieldMap::builtin(country))
    }

    /// Forgets every loaded table.
    pub fn reset(&mut self) {
        *self = RunCache::default();
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::NaiveDate;

    use super::*;

    fn at(d: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, d)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_round() {
        let mut settings = EpgSettings::new();
        assert_eq!(settings.round(at(10, 20, 29, 30)), at(10, 20, 30, 0));
        assert_eq!(settings.round(at(10, 20, 29, 29)), at(10, 20, 29, 0));

        settings.rounding(Duration::minutes(5));
        assert_eq!(settings.round(at(10, 23, 58, 0)), at(11, 0, 0, 0));
        assert_eq!(
            settings.round_span(at(10, 20, 29, 0), Duration::minutes(44)),
            (at(10, 20, 30, 0), Duration::minutes(45)),
        );

        settings.rounding(Duration::zero());
        assert_eq!(settings.round(at(10, 20, 29, 31)), at(10, 20, 29, 31));
    }

    #[test]
    fn test_window() {
        let mut settings = EpgSettings::new();
        assert!(settings.in_window(at(1, 0, 0, 0), at(1, 1, 0, 0)));

        settings.days(2);
        settings.reference_date(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
        assert!(!settings.in_window(at(9, 22, 0, 0), at(10, 0, 0, 0)));
        assert!(settings.in_window(at(9, 23, 0, 0), at(10, 1, 0, 0)));
        assert!(settings.in_window(at(11, 23, 0, 0), at(12, 1, 0, 0)));
        assert!(!settings.in_window(at(12, 0, 0, 0), at(12, 1, 0, 0)));
    }

    #[test]
    fn test_time_zone() {
        let bst = TimeZone::Fixed(FixedOffset::east_opt(3600).unwrap());
        assert_eq!(bst.to_local(at(10, 23, 30, 0)), at(11, 0, 30, 0));
    }

    #[test]
    fn test_run_cache() {
        let mut cache = RunCache::new();
        assert_matches!(cache.load_huffman(3, ""), Err(ConfigError::UnknownTable(3)));
        assert_matches!(cache.load_huffman(1, "bad"), Err(ConfigError::Syntax { .. }));
        assert!(cache.huffman(1).is_none());

        cache.load_huffman(1, "START:0:a\nSTART:1:STOP\n").unwrap();
        // loaded once; a second load is a no-op
        cache.load_huffman(1, "bad").unwrap();
        assert!(cache.huffman(1).is_some());

        assert_eq!(cache.category(0x10), Some("Movie/Drama"));
        cache.load_categories("0x10=Film\n").unwrap();
        assert_eq!(cache.category(0x14), Some("Film"));

        assert!(cache.field_map(CountryCode::GBR).is_some());
        assert!(cache.field_map(CountryCode(*b"FRA")).is_none());

        cache.reset();
        assert!(cache.huffman(1).is_none());
    }
}
