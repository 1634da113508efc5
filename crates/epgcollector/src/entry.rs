//! Normalized EPG entries.

use chrono::{Duration, NaiveDateTime};
use dvbsi::lang::LangCode;
use dvbsi::psi::table::{EventId, RunningStatus};
use dvbsi::time::TimeError;
use thiserror::Error;

use crate::station::StationKey;

/// Errors that abandon a single record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// A declared length or field count runs past the available data.
    #[error("truncated {0}")]
    Truncated(&'static str),

    /// A decoded value lies outside its domain.
    #[error("field out of range: {0}")]
    FieldOutOfRange(&'static str),

    /// A record has fewer fields than its schema requires.
    #[error("expected {expected} fields, found {found}")]
    FieldCount {
        /// Fields required by the schema.
        expected: usize,
        /// Fields present in the record.
        found: usize,
    },

    /// A numeric field could not be parsed.
    #[error("invalid number in {field}: {value:?}")]
    InvalidNumber {
        /// Field name.
        field: &'static str,
        /// Offending text.
        value: String,
    },

    /// Compressed text needs a dictionary that has not been loaded.
    #[error("huffman dictionary {0} is not loaded")]
    MissingDictionary(u8),

    /// Compressed text could not be decoded.
    #[error("undecodable compressed text")]
    Huffman,

    /// A date or time field is invalid.
    #[error(transparent)]
    Time(#[from] TimeError),
}

/// Season and episode numbers recovered from free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeasonEpisode {
    /// Season number, when the text names one.
    pub season: Option<u16>,
    /// Episode number.
    pub episode: u16,
}

/// A schedule entry ready for the output stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpgEntry {
    /// Station the entry belongs to.
    pub station: StationKey,
    /// event_id; zero when the source carries none.
    pub event_id: EventId,
    /// Local start time, rounded.
    pub start: NaiveDateTime,
    /// Duration, rounded.
    pub duration: Duration,
    /// Event name.
    pub event_name: String,
    /// Short description.
    pub description: String,
    /// Sub-title, when the source separates it from the description.
    pub sub_title: Option<String>,
    /// Minimum age in years.
    pub parental_rating: Option<u8>,
    /// Season and episode numbers.
    pub season_episode: Option<SeasonEpisode>,
    /// Category name.
    pub category: Option<String>,
    /// Language of the texts.
    pub lang_code: Option<LangCode>,
    /// `true` if the event is scrambled.
    pub scrambled: bool,
    /// running_status
    pub running_status: RunningStatus,
    /// Series CRID.
    pub series_crid: Option<String>,
    /// Episode CRID.
    pub episode_crid: Option<String>,
}

impl EpgEntry {
    /// Creates an entry with the mandatory fields and everything else unset.
    pub fn new(
        station: StationKey,
        event_id: EventId,
        start: NaiveDateTime,
        duration: Duration,
        event_name: String,
    ) -> EpgEntry {
        EpgEntry {
            station,
            event_id,
            start,
            duration,
            event_name,
            description: String::new(),
            sub_title: None,
            parental_rating: None,
            season_episode: None,
            category: None,
            lang_code: None,
            scrambled: false,
            running_status: RunningStatus::Undefined,
            series_crid: None,
            episode_crid: None,
        }
    }

    /// Returns the end time.
    #[inline]
    pub fn end(&self) -> NaiveDateTime {
        self.start + self.duration
    }
}
