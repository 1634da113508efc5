//! PSI/SI table assemblers.
//!
//! Every assembler reads one section into an owned aggregate. Descriptor
//! loops are decoded through the registry with the scope of the table, and
//! sub-entry loops advance by each entry's declared length.

#[macro_use]
mod macros;
mod dvb;
mod iso;

use thiserror::Error;

use crate::psi::desc::{Descriptor, DescriptorBlock, DescriptorScope};

pub use dvb::*;
pub use iso::*;

/// Errors returned by [`PsiTable::read`](crate::psi::PsiTable::read).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TableError {
    /// The section belongs to another table.
    #[error("unexpected table id 0x{0:02X}")]
    UnexpectedTableId(u8),

    /// The section lacks the extended header.
    #[error("missing section syntax")]
    MissingSyntax,

    /// A declared length runs past the end of the section.
    #[error("truncated {0}")]
    Truncated(&'static str),
}

/// service_id, also the program_number of PAT and PMT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceId(u16);

impl_id!(ServiceId);

/// transport_stream_id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransportStreamId(u16);

impl_id!(TransportStreamId);

/// network_id and original_network_id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NetworkId(u16);

impl_id!(NetworkId);

/// bouquet_id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BouquetId(u16);

impl_id!(BouquetId);

/// event_id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u16);

impl_id!(EventId);

/// running_status of SDT and EIT entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RunningStatus {
    /// Undefined.
    Undefined,
    /// Not running.
    NotRunning,
    /// Starts in a few seconds (e.g. for video recording).
    StartsSoon,
    /// Pausing.
    Pausing,
    /// Running.
    Running,
    /// Service off-air.
    OffAir,
    /// Reserved for future use.
    Reserved,
}

impl From<u8> for RunningStatus {
    #[inline]
    fn from(value: u8) -> RunningStatus {
        match value {
            0 => RunningStatus::Undefined,
            1 => RunningStatus::NotRunning,
            2 => RunningStatus::StartsSoon,
            3 => RunningStatus::Pausing,
            4 => RunningStatus::Running,
            5 => RunningStatus::OffAir,
            _ => RunningStatus::Reserved,
        }
    }
}

/// Reads a descriptor loop prefixed by a 12-bit length and decodes it in `scope`.
fn read_descriptors<'a>(
    data: &'a [u8],
    scope: DescriptorScope,
    what: &'static str,
) -> Result<(Vec<Descriptor>, &'a [u8]), TableError> {
    let Some((block, rem)) = DescriptorBlock::read(data) else {
        log::debug!("invalid {}", what);
        return Err(TableError::Truncated(what));
    };
    Ok((block.decode(scope), rem))
}

/// Splits a loop prefixed by a 12-bit length off `data`.
fn split_loop<'a>(data: &'a [u8], what: &'static str) -> Result<(&'a [u8], &'a [u8]), TableError> {
    use crate::utils::BytesExt;

    if data.len() < 2 {
        log::debug!("invalid {}", what);
        return Err(TableError::Truncated(what));
    }
    let length = (data[0..=1].read_be_16() & 0b0000_1111_1111_1111) as usize;
    let Some(pair) = data[2..].split_at_checked(length) else {
        log::debug!("invalid {}", what);
        return Err(TableError::Truncated(what));
    };
    Ok(pair)
}
