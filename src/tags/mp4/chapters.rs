//! Chapter extraction for MP4 containers
//!
//! Chapters come from one of two places. The `chpl` atom carries an explicit
//! list; when it is missing, title records whose text looks like a chapter
//! name are collected and spread evenly across the running time.
//!
//! `chpl` payload layout as read here:
//!
//! ```text
//! 0   version (1) + flags (3)
//! 4   reserved (8)
//! 12  entry count (u32 BE)
//! 16  entries: title length (u8), title (UTF-8),
//!     then for every entry but the last the end timestamp (u32 BE, 25.6 µs ticks)
//! ```
//!
//! Each timestamp ends its entry and starts the next one; the first entry
//! starts at zero and the last one ends at the movie duration.

use crate::tags::RawChapter;
use std::time::Duration;

const HEADER_LEN: usize = 16;

/// Nanoseconds per `chpl` timestamp tick (256 × 100 ns)
const TICK_NANOS: u64 = 25_600;

/// Words that mark a title record as a chapter name
const INDICATORS: &[&str] = &[
    "chapter",
    "track",
    "part",
    "section",
    "disc",
    "intro",
    "introduction",
    "preface",
    "prologue",
    "epilogue",
    "afterword",
    "credits",
    "opening",
    "closing",
];

/// A chapter read from `chpl` whose end is not yet known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChapter {
    pub title: String,
    pub start: Duration,
    /// `None` for the last entry until the movie duration is known
    pub end: Option<Duration>,
}

/// Parse a `chpl` payload. Errors describe why the list was rejected.
pub fn parse_chpl(payload: &[u8]) -> Result<Vec<PendingChapter>, String> {
    if payload.len() < HEADER_LEN {
        return Err(format!(
            "{} bytes is shorter than the {} byte header",
            payload.len(),
            HEADER_LEN
        ));
    }

    let count = u32::from_be_bytes([payload[12], payload[13], payload[14], payload[15]]) as usize;
    // Smallest entry is a length byte, plus a timestamp for all but the last
    let minimum = count.saturating_mul(5).saturating_sub(4);
    let body = &payload[HEADER_LEN..];
    if body.len() < minimum {
        return Err(format!(
            "{} entries declared but only {} bytes follow",
            count,
            body.len()
        ));
    }

    let mut chapters: Vec<PendingChapter> = Vec::with_capacity(count);
    let mut pos = 0usize;
    let mut start = Duration::ZERO;

    for index in 0..count {
        let len = *body
            .get(pos)
            .ok_or_else(|| format!("entry {} is missing its title length", index))?
            as usize;
        pos += 1;

        let title_bytes = body
            .get(pos..pos + len)
            .ok_or_else(|| format!("entry {} title runs past the payload", index))?;
        let title = String::from_utf8_lossy(title_bytes)
            .trim_matches(char::from(0))
            .trim()
            .to_string();
        pos += len;

        let end = if index + 1 < count {
            let ts = body
                .get(pos..pos + 4)
                .ok_or_else(|| format!("entry {} timestamp runs past the payload", index))?;
            pos += 4;
            let ticks = u32::from_be_bytes([ts[0], ts[1], ts[2], ts[3]]);
            let end = Duration::from_nanos(u64::from(ticks) * TICK_NANOS);
            if end < start {
                return Err(format!("entry {} ends before it starts", index));
            }
            Some(end)
        } else {
            None
        };

        chapters.push(PendingChapter { title, start, end });
        if let Some(end) = end {
            start = end;
        }
    }

    Ok(chapters)
}

/// Close the last chapter at the movie duration.
///
/// With an unknown (zero) duration the last chapter ends where it starts.
pub fn finish_explicit(
    pending: Vec<PendingChapter>,
    total: Duration,
) -> Result<Vec<RawChapter>, String> {
    let last_start = pending.last().map(|c| c.start).unwrap_or_default();
    if !total.is_zero() && last_start > total {
        return Err(format!(
            "last chapter starts at {:?}, after the {:?} running time",
            last_start, total
        ));
    }

    Ok(pending
        .into_iter()
        .map(|c| {
            let end = c.end.unwrap_or(if total.is_zero() { c.start } else { total });
            RawChapter {
                title: c.title,
                start: c.start,
                end,
            }
        })
        .collect())
}

/// Whether a title record reads like a chapter name.
///
/// Any case-insensitive occurrence of an indicator counts, so "Chapters",
/// "Track01of12" and "Introductions" all match. Unrelated titles that happen
/// to contain one ("Departure") match as well.
pub fn looks_like_chapter(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    !lower.is_empty() && INDICATORS.iter().any(|term| lower.contains(term))
}

/// Spread chapter titles evenly over `total`.
///
/// Chapter `i` of `n` spans `[total*i/n, total*(i+1)/n)`; boundaries are
/// computed once so neighbours always meet and the last ends exactly at `total`.
pub fn spread_evenly(titles: Vec<String>, total: Duration) -> Vec<RawChapter> {
    let n = titles.len() as u128;
    let total_nanos = total.as_nanos();
    let boundary = |i: u128| -> Duration {
        let nanos = total_nanos * i / n.max(1);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    };

    titles
        .into_iter()
        .enumerate()
        .map(|(i, title)| {
            let i = i as u128;
            RawChapter {
                title,
                start: boundary(i),
                end: if i + 1 == n { total } else { boundary(i + 1) },
            }
        })
        .collect()
}
