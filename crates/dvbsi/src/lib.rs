//! Crate for decoding MPEG-2/DVB sections: PSI/SI tables, their descriptors
//! and DSM-CC object carousels.

#![deny(missing_docs)]

pub mod crc;
pub mod dsmcc;
pub mod lang;
pub mod pid;
pub mod psi;
pub mod text;
pub mod time;
mod utils;

pub use pid::Pid;
