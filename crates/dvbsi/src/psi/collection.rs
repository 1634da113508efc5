//! Multi-section table tracking.
//!
//! A [`SectionCollection`] gathers the sections of one table id, keyed by
//! table_id_extension, and reports when every declared section is present.

use std::collections::BTreeMap;

use super::SectionSyntax;

/// Completeness of a [`SectionCollection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Completeness {
    /// No section accepted yet.
    Empty,
    /// Some sections are missing.
    Accumulating,
    /// Every key holds sections `0..=last_section_number` without gaps.
    Complete,
}

/// Result of [`SectionCollection::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Insertion {
    /// The section was new and has been stored.
    Accepted,
    /// A section with the same key and number is already stored.
    Duplicate,
    /// The key changed version; its previous sections were discarded before storing.
    VersionChanged {
        /// The discarded version.
        old: u8,
        /// The version now stored.
        new: u8,
    },
    /// The header is inconsistent (section_number beyond last_section_number,
    /// last_section_number differing from sections already stored, or a
    /// not-yet-applicable section).
    Rejected,
}

#[derive(Debug, Clone)]
struct Subtable<T> {
    version: u8,
    last_section_number: u8,
    sections: BTreeMap<u8, T>,
}

impl<T> Subtable<T> {
    #[inline]
    fn is_complete(&self) -> bool {
        self.sections.len() == self.last_section_number as usize + 1
    }
}

/// Sections of one table id, ordered by key and then by section number.
#[derive(Debug, Clone)]
pub struct SectionCollection<T> {
    table_id: u8,
    subtables: BTreeMap<u16, Subtable<T>>,
    state: Completeness,
}

impl<T> SectionCollection<T> {
    /// Creates an empty collection for `table_id`.
    pub fn new(table_id: u8) -> SectionCollection<T> {
        SectionCollection {
            table_id,
            subtables: BTreeMap::new(),
            state: Completeness::Empty,
        }
    }

    /// Returns the table id this collection tracks.
    #[inline]
    pub fn table_id(&self) -> u8 {
        self.table_id
    }

    /// Stores `value`, decoded from a section with header `syntax`.
    ///
    /// Completeness is re-evaluated after every accepted section.
    pub fn insert(&mut self, syntax: &SectionSyntax, value: T) -> Insertion {
        if !syntax.current_next_indicator || syntax.section_number > syntax.last_section_number {
            return Insertion::Rejected;
        }

        let key = syntax.table_id_extension;
        let mut outcome = Insertion::Accepted;
        if let Some(subtable) = self.subtables.get(&key) {
            if subtable.version != syntax.version_number {
                log::warn!(
                    "table 0x{:02X}/0x{:04X}: version {} -> {}",
                    self.table_id,
                    key,
                    subtable.version,
                    syntax.version_number,
                );
                outcome = Insertion::VersionChanged {
                    old: subtable.version,
                    new: syntax.version_number,
                };
                self.subtables.remove(&key);
            } else if subtable.last_section_number != syntax.last_section_number {
                log::debug!(
                    "table 0x{:02X}/0x{:04X}: inconsistent last_section_number",
                    self.table_id,
                    key,
                );
                return Insertion::Rejected;
            } else if subtable.sections.contains_key(&syntax.section_number) {
                return Insertion::Duplicate;
            }
        }

        let subtable = self.subtables.entry(key).or_insert_with(|| Subtable {
            version: syntax.version_number,
            last_section_number: syntax.last_section_number,
            sections: BTreeMap::new(),
        });
        subtable.sections.insert(syntax.section_number, value);
        self.refresh();
        outcome
    }

    /// Removes and returns the section `section_number` of `key`.
    ///
    /// The key stays known with its last_section_number, so the collection is
    /// no longer complete afterwards.
    pub fn remove(&mut self, key: u16, section_number: u8) -> Option<T> {
        let subtable = self.subtables.get_mut(&key)?;
        let value = subtable.sections.remove(&section_number)?;
        self.refresh();
        Some(value)
    }

    /// Returns the current completeness.
    #[inline]
    pub fn state(&self) -> Completeness {
        self.state
    }

    /// Returns `true` if the collection is [`Completeness::Complete`].
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.state == Completeness::Complete
    }

    /// Returns the stored version of `key`.
    pub fn version(&self, key: u16) -> Option<u8> {
        self.subtables.get(&key).map(|s| s.version)
    }

    /// Returns the number of stored sections.
    pub fn len(&self) -> usize {
        self.subtables.values().map(|s| s.sections.len()).sum()
    }

    /// Returns `true` if no section is stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.subtables.values().all(|s| s.sections.is_empty())
    }

    /// Iterates `(key, section_number, value)` in key then section order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, u8, &T)> + '_ {
        self.subtables.iter().flat_map(|(&key, subtable)| {
            subtable
                .sections
                .iter()
                .map(move |(&number, value)| (key, number, value))
        })
    }

    /// Iterates the stored values only when the collection is complete.
    pub fn complete_values(&self) -> Option<impl Iterator<Item = &T> + '_> {
        self.is_complete()
            .then(|| self.subtables.values().flat_map(|s| s.sections.values()))
    }

    /// Removes everything.
    pub fn clear(&mut self) {
        self.subtables.clear();
        self.state = Completeness::Empty;
    }

    fn refresh(&mut self) {
        self.state = if self.subtables.is_empty() {
            Completeness::Empty
        } else if self.subtables.values().all(Subtable::is_complete) {
            Completeness::Complete
        } else {
            Completeness::Accumulating
        };
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn syntax(key: u16, version: u8, number: u8, last: u8) -> SectionSyntax {
        SectionSyntax {
            table_id_extension: key,
            version_number: version,
            current_next_indicator: true,
            section_number: number,
            last_section_number: last,
        }
    }

    #[test]
    fn test_completeness() {
        let mut c = SectionCollection::new(0x4A);
        assert_eq!(c.state(), Completeness::Empty);

        assert_eq!(c.insert(&syntax(0x1000, 0, 1, 1), "a1"), Insertion::Accepted);
        assert_eq!(c.state(), Completeness::Accumulating);
        assert_eq!(c.insert(&syntax(0x1001, 0, 0, 0), "b0"), Insertion::Accepted);
        assert_eq!(c.state(), Completeness::Accumulating);
        assert!(c.complete_values().is_none());

        assert_eq!(c.insert(&syntax(0x1000, 0, 0, 1), "a0"), Insertion::Accepted);
        assert_eq!(c.state(), Completeness::Complete);
        assert_eq!(
            c.complete_values().unwrap().copied().collect::<Vec<_>>(),
            ["a0", "a1", "b0"],
        );
        assert_eq!(
            c.iter().map(|(k, n, _)| (k, n)).collect::<Vec<_>>(),
            [(0x1000, 0), (0x1000, 1), (0x1001, 0)],
        );

        // removing any section reverts the predicate
        assert_eq!(c.remove(0x1000, 1), Some("a1"));
        assert_eq!(c.state(), Completeness::Accumulating);
        assert_eq!(c.insert(&syntax(0x1000, 0, 1, 1), "a1"), Insertion::Accepted);
        assert!(c.is_complete());
        assert_eq!(c.remove(0x1001, 0), Some("b0"));
        assert_eq!(c.state(), Completeness::Accumulating);
        assert_eq!(c.remove(0x1000, 0), Some("a0"));
        assert!(!c.is_complete());
        assert_eq!(c.remove(0x1000, 0), None);
    }

    #[test]
    fn test_remove_only_section_of_key() {
        let mut c = SectionCollection::new(0x42);
        assert_eq!(c.insert(&syntax(1, 0, 0, 0), 'a'), Insertion::Accepted);
        assert_eq!(c.insert(&syntax(2, 0, 0, 0), 'b'), Insertion::Accepted);
        assert!(c.is_complete());

        assert_eq!(c.remove(2, 0), Some('b'));
        assert_eq!(c.state(), Completeness::Accumulating);
        assert!(c.complete_values().is_none());
        assert_eq!(c.version(2), Some(0));
        assert!(!c.is_empty());

        assert_eq!(c.insert(&syntax(2, 0, 0, 0), 'b'), Insertion::Accepted);
        assert!(c.is_complete());
        c.clear();
        assert_eq!(c.state(), Completeness::Empty);
        assert!(c.is_empty());
    }

    #[test]
    fn test_duplicate_is_idempotent() {
        let mut c = SectionCollection::new(0x42);
        assert_eq!(c.insert(&syntax(1, 5, 0, 1), 10), Insertion::Accepted);
        let before = c.iter().map(|(k, n, v)| (k, n, *v)).collect::<Vec<_>>();

        assert_eq!(c.insert(&syntax(1, 5, 0, 1), 99), Insertion::Duplicate);
        assert_eq!(c.iter().map(|(k, n, v)| (k, n, *v)).collect::<Vec<_>>(), before);
        assert_eq!(c.state(), Completeness::Accumulating);
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_version_change() {
        let mut c = SectionCollection::new(0x40);
        c.insert(&syntax(7, 1, 0, 1), 'a');
        c.insert(&syntax(7, 1, 1, 1), 'b');
        assert!(c.is_complete());

        assert_matches!(
            c.insert(&syntax(7, 2, 0, 1), 'c'),
            Insertion::VersionChanged { old: 1, new: 2 }
        );
        assert_eq!(c.version(7), Some(2));
        assert_eq!(c.len(), 1);
        assert_eq!(c.state(), Completeness::Accumulating);
    }

    #[test]
    fn test_rejected() {
        let mut c = SectionCollection::new(0x40);
        assert_eq!(c.insert(&syntax(7, 1, 2, 1), ()), Insertion::Rejected);
        c.insert(&syntax(7, 1, 0, 1), ());
        assert_eq!(c.insert(&syntax(7, 1, 1, 2), ()), Insertion::Rejected);

        let mut next = syntax(8, 1, 0, 0);
        next.current_next_indicator = false;
        assert_eq!(c.insert(&next, ()), Insertion::Rejected);
        assert_eq!(c.state(), Completeness::Accumulating);
    }
}
