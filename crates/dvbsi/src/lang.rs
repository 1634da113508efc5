//! Language and country codes.

use std::fmt;

/// ISO 639-2 three-letter language code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LangCode(pub [u8; 3]);

impl LangCode {
    /// English.
    pub const ENG: LangCode = LangCode(*b"eng");
    /// Welsh.
    pub const CYM: LangCode = LangCode(*b"cym");
    /// Gaelic.
    pub const GLA: LangCode = LangCode(*b"gla");
    /// German.
    pub const DEU: LangCode = LangCode(*b"deu");
    /// French.
    pub const FRA: LangCode = LangCode(*b"fra");

    /// Reads a language code from the first three bytes of `data`.
    ///
    /// # Panics
    ///
    /// Panics if `data` is shorter than three bytes.
    #[inline]
    pub fn read(data: &[u8]) -> LangCode {
        LangCode([data[0], data[1], data[2]])
    }
}

impl fmt::Display for LangCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0.escape_ascii(), f)
    }
}

/// ISO 3166 three-letter country code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CountryCode(pub [u8; 3]);

impl CountryCode {
    /// United Kingdom.
    pub const GBR: CountryCode = CountryCode(*b"GBR");
    /// Australia.
    pub const AUS: CountryCode = CountryCode(*b"AUS");
    /// New Zealand.
    pub const NZL: CountryCode = CountryCode(*b"NZL");

    /// Reads a country code from the first three bytes of `data`.
    ///
    /// # Panics
    ///
    /// Panics if `data` is shorter than three bytes.
    #[inline]
    pub fn read(data: &[u8]) -> CountryCode {
        CountryCode([data[0], data[1], data[2]])
    }

    /// Parses a code such as `"gbr"`, ignoring case.
    pub fn parse(s: &str) -> Option<CountryCode> {
        let [a, b, c] = *s.as_bytes() else {
            return None;
        };
        [a, b, c]
            .iter()
            .all(u8::is_ascii_alphabetic)
            .then(|| CountryCode([a, b, c].map(|c| c.to_ascii_uppercase())))
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0.escape_ascii(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lang_code() {
        assert_eq!(LangCode::read(b"engX"), LangCode::ENG);
        assert_eq!(LangCode::ENG.to_string(), "eng");
        assert_eq!(LangCode([0x65, 0x0A, 0x67]).to_string(), "e\\ng");
    }

    #[test]
    fn test_country_code() {
        assert_eq!(CountryCode::parse("gbr"), Some(CountryCode::GBR));
        assert_eq!(CountryCode::parse("NZL"), Some(CountryCode::NZL));
        assert_eq!(CountryCode::parse("GB"), None);
        assert_eq!(CountryCode::parse("G1R"), None);
        assert_eq!(CountryCode::GBR.to_string(), "GBR");
    }
}
