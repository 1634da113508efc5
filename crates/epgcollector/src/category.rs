//! Category names for content codes.

use fxhash::FxHashMap;

use crate::config::ConfigError;

/// Level-1 genre names of EN 300 468 content nibbles, indexed by the nibble.
const STANDARD_NAMES: [Option<&str>; 16] = [
    None,
    Some("Movie/Drama"),
    Some("News/Current affairs"),
    Some("Show/Game show"),
    Some("Sports"),
    Some("Children's/Youth"),
    Some("Music/Ballet/Dance"),
    Some("Arts/Culture"),
    Some("Social/Political/Economics"),
    Some("Education/Science/Factual"),
    Some("Leisure hobbies"),
    Some("Special characteristics"),
    None,
    None,
    None,
    None,
];

/// Returns the standard level-1 genre name for a content code such as `0x23`.
#[inline]
pub fn standard_name(code: u8) -> Option<&'static str> {
    STANDARD_NAMES[(code >> 4) as usize]
}

/// A table mapping content codes to category names.
///
/// The text form has one `code=name` line per entry, with the code in hex
/// and an optional `0x` prefix. Blank lines and lines starting with `#` are
/// skipped.
#[derive(Debug, Clone, Default)]
pub struct CategoryTable(FxHashMap<u8, String>);

impl CategoryTable {
    /// Parses a category table.
    pub fn parse(text: &str) -> Result<CategoryTable, ConfigError> {
        let mut map = FxHashMap::default();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let syntax = |reason| ConfigError::Syntax { line: i + 1, reason };
            let Some((code, name)) = line.split_once('=') else {
                return Err(syntax("expected code=name"));
            };
            let code = code.trim();
            let code = code
                .strip_prefix("0x")
                .or_else(|| code.strip_prefix("0X"))
                .unwrap_or(code);
            let code = u8::from_str_radix(code, 16).map_err(|_| syntax("invalid code"))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(syntax("empty name"));
            }
            map.insert(code, name.to_owned());
        }
        Ok(CategoryTable(map))
    }

    /// Looks up `code`, then its level-1 code, then the standard genre name.
    pub fn lookup(&self, code: u8) -> Option<&str> {
        self.0
            .get(&code)
            .or_else(|| self.0.get(&(code & 0xF0)))
            .map(String::as_str)
            .or_else(|| standard_name(code))
    }

    /// Returns the number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the table has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_lookup() {
        let table = CategoryTable::parse(
            "# categories\n\
             0x10=Film\n\
             14 = Comedy film\n\
             \n\
             40=Sport\n",
        )
        .unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.lookup(0x14), Some("Comedy film"));
        assert_eq!(table.lookup(0x13), Some("Film"));
        assert_eq!(table.lookup(0x43), Some("Sport"));
        assert_eq!(table.lookup(0x23), Some("News/Current affairs"));
        assert_eq!(table.lookup(0xF0), None);
    }

    #[test]
    fn test_parse_errors() {
        assert_matches!(
            CategoryTable::parse("10=Film\nxyz\n"),
            Err(ConfigError::Syntax { line: 2, .. })
        );
        assert_matches!(
            CategoryTable::parse("1G=Film\n"),
            Err(ConfigError::Syntax { line: 1, .. })
        );
        assert_matches!(
            CategoryTable::parse("10=\n"),
            Err(ConfigError::Syntax { line: 1, .. })
        );
    }
}
