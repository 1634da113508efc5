//! PID definitions.

use std::fmt;

use crate::utils::BytesExt;

/// 13-bit MPEG2-TS packet identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(u16);

// Well-known PIDs from ISO/IEC 13818-1 and EN 300 468.
impl Pid {
    /// Largest valid PID.
    pub const MAX: u16 = 0x1FFF;

    /// Program Association Table.
    pub const PAT: Pid = Pid::new(0x0000);
    /// Conditional Access Table.
    pub const CAT: Pid = Pid::new(0x0001);
    /// Network Information Table.
    pub const NIT: Pid = Pid::new(0x0010);
    /// Service Description Table.
    pub const SDT: Pid = Pid::new(0x0011);
    /// Bouquet Association Table (shares the SDT PID).
    pub const BAT: Pid = Pid::new(0x0011);
    /// Event Information Table.
    pub const EIT: Pid = Pid::new(0x0012);
    /// Running Status Table.
    pub const RST: Pid = Pid::new(0x0013);
    /// Time and Date Table.
    pub const TDT: Pid = Pid::new(0x0014);
    /// Time Offset Table (shares the TDT PID).
    pub const TOT: Pid = Pid::new(0x0014);
    /// Null packet.
    pub const NULL: Pid = Pid::new(0x1FFF);

    /// FreeSat SDT, BAT and NIT.
    pub const FREESAT_SI: Pid = Pid::new(0x0F01);
    /// FreeSat present/following and schedule EIT.
    pub const FREESAT_EIT: Pid = Pid::new(0x0F02);

    /// Creates a `Pid`.
    ///
    /// # Panics
    ///
    /// Panics if `pid` is above [`Pid::MAX`].
    #[inline]
    pub const fn new(pid: u16) -> Pid {
        assert!(pid <= Pid::MAX);
        Pid(pid)
    }

    /// Creates a `Pid` if `pid` is in range.
    #[inline]
    pub const fn try_new(pid: u16) -> Option<Pid> {
        if pid > Pid::MAX {
            None
        } else {
            Some(Pid(pid))
        }
    }

    /// Reads the low 13 bits of the first two bytes of `data`.
    ///
    /// # Panics
    ///
    /// Panics if `data` is shorter than two bytes.
    #[inline]
    pub fn read(data: &[u8]) -> Pid {
        Pid(data[0..=1].read_be_16() & 0x1FFF)
    }

    /// Returns the PID as `u16`.
    #[inline]
    pub const fn get(&self) -> u16 {
        self.0
    }
}

impl Default for Pid {
    fn default() -> Self {
        Pid::NULL
    }
}

impl From<Pid> for u16 {
    fn from(value: Pid) -> Self {
        value.get()
    }
}

impl fmt::Debug for Pid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Pid(0x{:04X})", self.0)
    }
}

crate::utils::delegate_fmt!(Pid);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid() {
        assert_eq!(Pid::new(0x1FFF), Pid::NULL);
        std::panic::catch_unwind(|| Pid::new(0x2000)).unwrap_err();
        assert_eq!(Pid::try_new(0x1FFF), Some(Pid::NULL));
        assert_eq!(Pid::try_new(0x2000), None);

        std::panic::catch_unwind(|| Pid::read(&[])).unwrap_err();
        std::panic::catch_unwind(|| Pid::read(&[0x00])).unwrap_err();
        assert_eq!(Pid::read(&u16::to_be_bytes(0xE0BA)), Pid::new(0x00BA));
        assert_eq!(Pid::read(&u16::to_be_bytes(0x2000)), Pid::new(0x0000));

        assert_eq!(Pid::default(), Pid::NULL);
        assert_eq!(Pid::SDT, Pid::BAT);
        assert!(Pid::new(0x0000) < Pid::new(0x0001));

        assert_eq!(u16::from(Pid::FREESAT_EIT), 3842);
        assert_eq!(format!("{}", Pid::NULL), "8191");
        assert_eq!(format!("{:4}", Pid::PAT), "   0");
        assert_eq!(format!("{:x}", Pid::NULL), "1fff");
        assert_eq!(format!("{:X}", Pid::FREESAT_SI), "F01");
        assert_eq!(format!("{:?}", Pid::NIT), "Pid(0x0010)");
    }
}
