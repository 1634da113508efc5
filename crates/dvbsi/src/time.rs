//! MJD and BCD date/time fields used by DVB SI.

use std::fmt::{self, Write};

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

use crate::utils::{read_bcd_digit, BytesExt};

/// Errors raised while decoding MJD/BCD fields.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimeError {
    /// A decoded value lies outside its protocol-defined domain (e.g. a bad BCD digit).
    #[error("field out of range: {0}")]
    FieldOutOfRange(&'static str),
}

fn write_hundreds<W: Write>(w: &mut W, n: u8) -> fmt::Result {
    let h = b'0' + n / 10;
    let l = b'0' + n % 10;
    w.write_char(h as char)?;
    w.write_char(l as char)
}

/// Modified Julian Date.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct MjdDate {
    /// Year (e.g. 2024).
    pub year: i32,
    /// Month (January = 1).
    pub month: u8,
    /// Day of month (1-31).
    pub day: u8,
    /// Day of week (Monday = 1, Sunday = 7).
    pub day_of_week: u8,
}

impl MjdDate {
    /// Converts `mjd` with the EN 300 468 Annex C formula.
    pub fn from_mjd(mjd: u16) -> MjdDate {
        let mjd_f = mjd as f64;
        let yd = ((mjd_f - 15078.2) / 365.25) as i64;
        let yd_days = (yd as f64 * 365.25) as i64;
        let md = ((mjd_f - 14956.1 - yd_days as f64) / 30.6001) as i64;
        let md_days = (md as f64 * 30.6001) as i64;

        let day = mjd as i64 - 14956 - yd_days - md_days;
        let day_of_week = ((mjd as u32 + 2) % 7 + 1) as u8;
        let (year, month) = if md == 14 || md == 15 {
            (yd + 1, md - 1 - 12)
        } else {
            (yd, md - 1)
        };

        MjdDate {
            year: 1900 + year as i32,
            month: month as u8,
            day: day as u8,
            day_of_week,
        }
    }

    /// Reads a `MjdDate` from `data`.
    #[inline]
    pub fn read(data: &[u8; 2]) -> MjdDate {
        MjdDate::from_mjd(data.read_be_16())
    }

    /// Converts to a calendar date.
    pub fn to_naive_date(&self) -> Result<NaiveDate, TimeError> {
        NaiveDate::from_ymd_opt(self.year, self.month as u32, self.day as u32)
            .ok_or(TimeError::FieldOutOfRange("MjdDate"))
    }
}

impl fmt::Debug for MjdDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.year)?;

        f.write_char('-')?;
        write_hundreds(f, self.month)?;

        f.write_char('-')?;
        write_hundreds(f, self.day)
    }
}

impl fmt::Display for MjdDate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// UTC date and time coded as 16-bit MJD followed by six BCD digits.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DateTime {
    /// Modified Julian Date.
    pub date: MjdDate,
    /// Hour (0-23).
    pub hour: u8,
    /// Minute (0-59).
    pub minute: u8,
    /// Second (0-60).
    pub second: u8,
}

impl DateTime {
    /// Reads a `DateTime` from `data`.
    ///
    /// Returns `Ok(None)` if every bit is set, which marks an undefined time.
    pub fn read(data: &[u8; 5]) -> Result<Option<DateTime>, TimeError> {
        if data.iter().all(|&b| b == 0xFF) {
            return Ok(None);
        }

        let date = MjdDate::read(&[data[0], data[1]]);
        let hour = read_bcd_digit(data[2])
            .filter(|&h| h < 24)
            .ok_or(TimeError::FieldOutOfRange("DateTime::hour"))?;
        let minute = read_bcd_digit(data[3])
            .filter(|&m| m < 60)
            .ok_or(TimeError::FieldOutOfRange("DateTime::minute"))?;
        let second = read_bcd_digit(data[4])
            .filter(|&s| s <= 60)
            .ok_or(TimeError::FieldOutOfRange("DateTime::second"))?;

        Ok(Some(DateTime {
            date,
            hour,
            minute,
            second,
        }))
    }

    /// Converts to a naive (UTC) date and time.
    pub fn to_naive(&self) -> Result<NaiveDateTime, TimeError> {
        let date = self.date.to_naive_date()?;
        // leap seconds collapse onto :59
        let time = NaiveTime::from_hms_opt(
            self.hour as u32,
            self.minute as u32,
            self.second.min(59) as u32,
        )
        .ok_or(TimeError::FieldOutOfRange("DateTime::time"))?;
        Ok(NaiveDateTime::new(date, time))
    }
}

impl fmt::Debug for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&self.date, f)?;
        f.write_char(' ')?;

        write_hundreds(f, self.hour)?;
        f.write_char(':')?;
        write_hundreds(f, self.minute)?;
        f.write_char(':')?;
        write_hundreds(f, self.second)
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Reads a six-digit BCD `HHMMSS` duration.
///
/// Returns `Ok(None)` if every bit is set, which marks an undefined duration.
pub fn read_duration(data: &[u8; 3]) -> Result<Option<Duration>, TimeError> {
    if data.iter().all(|&b| b == 0xFF) {
        return Ok(None);
    }

    let hours = read_bcd_digit(data[0]).ok_or(TimeError::FieldOutOfRange("duration::hours"))?;
    let minutes = read_bcd_digit(data[1])
        .filter(|&m| m < 60)
        .ok_or(TimeError::FieldOutOfRange("duration::minutes"))?;
    let seconds = read_bcd_digit(data[2])
        .filter(|&s| s < 60)
        .ok_or(TimeError::FieldOutOfRange("duration::seconds"))?;

    Ok(Some(
        Duration::hours(hours as i64)
            + Duration::minutes(minutes as i64)
            + Duration::seconds(seconds as i64),
    ))
}
