//! EPG collection on top of [`dvbsi`].
//!
//! Sections pushed into a [`SectionQueue`] are drained by a [`Collector`]
//! worker and handed to a [`SectionSink`]. The sinks in this crate decode
//! FreeSat EIT events and MHEG-5 EPG files from an object carousel into
//! [`EpgEntry`] values grouped per [`Station`].

#![deny(missing_docs)]

pub mod bouquet;
pub mod category;
pub mod collector;
pub mod config;
pub mod entry;
pub mod episode;
pub mod freesat;
pub mod huffman;
pub mod mheg5;
pub mod si;
pub mod station;

#[cfg(test)]
mod testutil;

pub use bouquet::{ChannelAssignment, ChannelMap};
pub use category::CategoryTable;
pub use collector::{
    CollectHandler, CollectionOutcome, Collector, CompletionReason, SectionQueue, SectionSink,
    TuningControl,
};
pub use config::{
    CollectorOptions, CompletionMode, ConfigError, EpgSettings, RunCache, TimeZone,
};
pub use entry::{EpgEntry, RecordError, SeasonEpisode};
pub use freesat::FreesatEpg;
pub use huffman::HuffmanDictionary;
pub use mheg5::{FieldMap, Mheg5Epg};
pub use station::{EpgCollection, Station, StationKey, Stations};
