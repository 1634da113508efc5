//! Season and episode numbers from free text.
//!
//! Five matchers are tried in a fixed order and the first hit wins:
//!
//! 1. [`Matcher::Slash`]: `3/6`, yielding episode 3 of 6.
//! 2. [`Matcher::SeasonEpisode`]: `S2 EP5`.
//! 3. [`Matcher::SeasonCommaEpisode`]: `S2, Ep5`.
//! 4. [`Matcher::TrailingSeasonEpisode`]: `s2ep5` or `(S2 Ep5)` ending the text.
//! 5. [`Matcher::SeriesEpisode`]: `Series 2, Episode 5`.
//!
//! Every matcher is a pure function over the text; nothing is written to an
//! entry until one of them has matched completely.

use crate::entry::SeasonEpisode;

/// One of the season/episode matchers, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Matcher {
    /// `nn/nn`
    Slash,
    /// `Snn EPnn`
    SeasonEpisode,
    /// `Snn, Epnn`
    SeasonCommaEpisode,
    /// `Snn EPnn` at the end of the text, in any case and spacing.
    TrailingSeasonEpisode,
    /// `Series nn, Episode nn`
    SeriesEpisode,
}

type MatchFn = fn(&[u8]) -> Option<SeasonEpisode>;

const MATCHERS: [(Matcher, MatchFn); 5] = [
    (Matcher::Slash, match_slash),
    (Matcher::SeasonEpisode, match_season_episode),
    (Matcher::SeasonCommaEpisode, match_season_comma_episode),
    (Matcher::TrailingSeasonEpisode, match_trailing),
    (Matcher::SeriesEpisode, match_series_episode),
];

/// Longest accepted season number.
const SEASON_DIGITS: usize = 2;
/// Longest accepted episode number.
const EPISODE_DIGITS: usize = 3;

/// Tries every matcher in order and returns the first hit.
pub fn find(text: &str) -> Option<(Matcher, SeasonEpisode)> {
    let bytes = text.as_bytes();
    MATCHERS
        .iter()
        .find_map(|(matcher, f)| f(bytes).map(|se| (*matcher, se)))
}

/// Returns `true` if `b` does not continue a word.
#[inline]
fn is_boundary(b: Option<&u8>) -> bool {
    b.map_or(true, |b| !b.is_ascii_alphanumeric())
}

/// Reads a run of 1 to `max` digits at `pos`.
///
/// Returns the value and the index after the run. Longer runs are rejected.
fn digits_at(text: &[u8], pos: usize, max: usize) -> Option<(u16, usize)> {
    let len = text
        .get(pos..)?
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if len == 0 || len > max {
        return None;
    }
    let value = text[pos..pos + len]
        .iter()
        .fold(0u16, |acc, b| acc * 10 + (b - b'0') as u16);
    Some((value, pos + len))
}

/// Reads a run of 1 to `max` digits ending right before `end`.
///
/// Returns the value and the index of the first digit.
fn digits_before(text: &[u8], end: usize, max: usize) -> Option<(u16, usize)> {
    let len = text[..end]
        .iter()
        .rev()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if len == 0 || len > max {
        return None;
    }
    let (value, _) = digits_at(text, end - len, max)?;
    Some((value, end - len))
}

/// Returns whether `text[pos..]` starts with `word`, ignoring ASCII case.
#[inline]
fn starts_with_ignore_case(text: &[u8], pos: usize, word: &[u8]) -> bool {
    text.get(pos..pos + word.len())
        .map_or(false, |s| s.eq_ignore_ascii_case(word))
}

fn skip_spaces(text: &[u8], mut pos: usize) -> usize {
    while text.get(pos) == Some(&b' ') {
        pos += 1;
    }
    pos
}

/// `3/6`: episode 3 of 6, with no season.
///
/// Both runs are at most three digits and must stand alone: `12/10/2024` and
/// `a3/6` do not match. The part must not exceed the total.
fn match_slash(text: &[u8]) -> Option<SeasonEpisode> {
    text.iter()
        .enumerate()
        .filter(|(_, &b)| b == b'/')
        .find_map(|(slash, _)| {
            let (part, start) = digits_before(text, slash, EPISODE_DIGITS)?;
            let before = start.checked_sub(1).and_then(|i| text.get(i));
            if !is_boundary(before) || before == Some(&b'/') {
                return None;
            }

            let (total, end) = digits_at(text, slash + 1, EPISODE_DIGITS)?;
            let after = text.get(end);
            if !is_boundary(after) || after == Some(&b'/') {
                return None;
            }

            (part >= 1 && part <= total).then_some(SeasonEpisode {
                season: None,
                episode: part,
            })
        })
}

/// `S2 EP5`: upper-case markers and exactly one space.
fn match_season_episode(text: &[u8]) -> Option<SeasonEpisode> {
    (0..text.len()).find_map(|i| {
        if text[i] != b'S' || !is_boundary(i.checked_sub(1).and_then(|i| text.get(i))) {
            return None;
        }
        let (season, pos) = digits_at(text, i + 1, SEASON_DIGITS)?;
        if text.get(pos) != Some(&b' ') || text.get(pos + 1..pos + 3) != Some(&b"EP"[..]) {
            return None;
        }
        let (episode, end) = digits_at(text, pos + 3, EPISODE_DIGITS)?;
        is_boundary(text.get(end)).then_some(SeasonEpisode {
            season: Some(season),
            episode,
        })
    })
}

/// `S2, Ep5`: a comma after the season and any case for `Ep`.
fn match_season_comma_episode(text: &[u8]) -> Option<SeasonEpisode> {
    (0..text.len()).find_map(|i| {
        if text[i] != b'S' || !is_boundary(i.checked_sub(1).and_then(|i| text.get(i))) {
            return None;
        }
        let (season, pos) = digits_at(text, i + 1, SEASON_DIGITS)?;
        if text.get(pos) != Some(&b',') {
            return None;
        }
        let pos = skip_spaces(text, pos + 1);
        if !starts_with_ignore_case(text, pos, b"ep") {
            return None;
        }
        let (episode, end) = digits_at(text, pos + 2, EPISODE_DIGITS)?;
        is_boundary(text.get(end)).then_some(SeasonEpisode {
            season: Some(season),
            episode,
        })
    })
}

/// `s2ep5`, `S2 Ep5`, `(S02 EP05).` at the very end of the text.
fn match_trailing(text: &[u8]) -> Option<SeasonEpisode> {
    let end = text.len()
        - text
            .iter()
            .rev()
            .take_while(|b| matches!(b, b' ' | b'.' | b')' | b']'))
            .count();

    let (episode, ep_digits) = digits_before(text, end, EPISODE_DIGITS)?;
    let marker = ep_digits.checked_sub(2)?;
    if !starts_with_ignore_case(text, marker, b"ep") {
        return None;
    }

    let mut pos = marker;
    while pos > 0 && text[pos - 1] == b' ' {
        pos -= 1;
    }
    let (season, season_digits) = digits_before(text, pos, SEASON_DIGITS)?;
    let s = season_digits.checked_sub(1)?;
    let before = s.checked_sub(1).and_then(|i| text.get(i));
    if !text[s].eq_ignore_ascii_case(&b's') || !is_boundary(before) {
        return None;
    }

    Some(SeasonEpisode {
        season: Some(season),
        episode,
    })
}

/// `Series 2, Episode 5`, in any case. The comma is optional.
fn match_series_episode(text: &[u8]) -> Option<SeasonEpisode> {
    (0..text.len()).find_map(|i| {
        if !starts_with_ignore_case(text, i, b"series ")
            || !is_boundary(i.checked_sub(1).and_then(|i| text.get(i)))
        {
            return None;
        }
        let (season, pos) = digits_at(text, i + 7, SEASON_DIGITS)?;
        let pos = if text.get(pos) == Some(&b',') { pos + 1 } else { pos };
        let pos = skip_spaces(text, pos);
        if !starts_with_ignore_case(text, pos, b"episode ") {
            return None;
        }
        let (episode, end) = digits_at(text, pos + 8, EPISODE_DIGITS)?;
        is_boundary(text.get(end)).then_some(SeasonEpisode {
            season: Some(season),
            episode,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn se(season: Option<u16>, episode: u16) -> SeasonEpisode {
        SeasonEpisode { season, episode }
    }

    #[test]
    fn test_priority() {
        assert_eq!(
            find("Drama. S2 EP5"),
            Some((Matcher::SeasonEpisode, se(Some(2), 5))),
        );
        assert_eq!(
            find("The detective returns (3/6). New series."),
            Some((Matcher::Slash, se(None, 3))),
        );
        // the slash matcher wins over a season marker later in the text
        assert_eq!(
            find("Part 2/4 of the story. S1 EP2"),
            Some((Matcher::Slash, se(None, 2))),
        );
        assert_eq!(find("No numbers here."), None);
    }

    #[test]
    fn test_slash() {
        assert_eq!(match_slash(b"3/6"), Some(se(None, 3)));
        assert_eq!(match_slash(b"Episode 10/12."), Some(se(None, 10)));
        assert_eq!(match_slash(b"On 12/10/2024 at noon"), None);
        assert_eq!(match_slash(b"Model a3/6"), None);
        assert_eq!(match_slash(b"7/6"), None);
        assert_eq!(match_slash(b"1000/2000"), None);
        assert_eq!(match_slash(b"0/4 then 2/4"), Some(se(None, 2)));
    }

    #[test]
    fn test_season_episode() {
        assert_eq!(match_season_episode(b"S12 EP105 text"), Some(se(Some(12), 105)));
        assert_eq!(match_season_episode(b"s2 ep5"), None);
        assert_eq!(match_season_episode(b"S2  EP5"), None);
        assert_eq!(match_season_episode(b"BS2 EP5"), None);
        assert_eq!(match_season_episode(b"S123 EP5"), None);
        assert_eq!(match_season_episode(b"S2 EP5x"), None);
    }

    #[test]
    fn test_season_comma_episode() {
        assert_eq!(match_season_comma_episode(b"Drama S3, Ep7."), Some(se(Some(3), 7)));
        assert_eq!(match_season_comma_episode(b"S3,EP7"), Some(se(Some(3), 7)));
        assert_eq!(match_season_comma_episode(b"S3 Ep7"), None);
    }

    #[test]
    fn test_trailing() {
        assert_eq!(match_trailing(b"A story s2ep5"), Some(se(Some(2), 5)));
        assert_eq!(match_trailing(b"A story (S02 Ep05)."), Some(se(Some(2), 5)));
        assert_eq!(match_trailing(b"s2ep5 is not at the end"), None);
        assert_eq!(match_trailing(b"Bus2ep5"), None);
        assert_eq!(match_trailing(b"ep5"), None);
    }

    #[test]
    fn test_series_episode() {
        assert_eq!(
            match_series_episode(b"Series 4, Episode 11. The end."),
            Some(se(Some(4), 11)),
        );
        assert_eq!(match_series_episode(b"series 4 episode 1"), Some(se(Some(4), 1)));
        assert_eq!(match_series_episode(b"Miniseries 4, Episode 1"), None);
        assert_eq!(
            find("New. Series 4, Episode 11"),
            Some((Matcher::SeriesEpisode, se(Some(4), 11))),
        );
    }
}
