//! Completion percentage extraction
//!
//! Patterns are tried from most to least specific. A pattern that matches
//! but yields a value above 100 does not end the search; the next pattern
//! (and finally a loose scan for any percentage token) gets a chance.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use super::line::prepare_line;

const SIZE: &str = r"[0-9.]+\s*[KMGTP]?i?B";

static PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // "703.250 MiB / 6.429 GiB, 11%, 9.303 MiB/s, ETA 10m32s"
        format!(r"{SIZE}\s*/\s*{SIZE},\s*([0-9]{{1,3}})%"),
        // "Transferred: 10.5 MB / 100 MB, 10%, 1.2 MB/s, ETA 1m30s"
        format!(r"Transferred:\s*{SIZE}\s*/\s*{SIZE},\s*([0-9]{{1,3}})%"),
        // "10% 10.5 MB/s"
        format!(r"^\s*([0-9]{{1,3}})%\s*{SIZE}/s"),
        // "████████████ 100%"
        r"[█▓▒░]+\s*([0-9]{1,3})%".to_string(),
        // "50% (25.5 MB/s)"
        format!(r"\b([0-9]{{1,3}})%\s*\({SIZE}/s\)"),
        // "50%"
        r"\b([0-9]{1,3})%".to_string(),
        // "Copying 'file.txt' 50%"
        r"Copying\s+.*?\s+([0-9]{1,3})%".to_string(),
        // "Transfer: 50%"
        r"Transfer:\s*([0-9]{1,3})%".to_string(),
        // "(50%)"
        r"\(([0-9]{1,3})%\)".to_string(),
        // "50% / 100%"
        r"\b([0-9]{1,3})%\s*/\s*100%".to_string(),
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid progress regex"))
    .collect()
});

static ANY_PERCENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([0-9]{1,3})%").expect("valid percentage regex"));

/// Extract a completion percentage in `0..=100` from one output line
///
/// Returns `None` (not zero) when the line carries no usable percentage.
pub fn parse_progress(line: &str) -> Option<u8> {
    let clean = prepare_line(line)?;
    if clean.is_empty() {
        return None;
    }

    for (index, pattern) in PATTERNS.iter().enumerate() {
        if let Some(percent) = pattern
            .captures(&clean)
            .and_then(|caps| caps.get(1))
            .and_then(|m| to_percent(m.as_str()))
        {
            trace!("Pattern {} matched {}% in {:?}", index, percent, clean);
            return Some(percent);
        }
    }

    let fallback = ANY_PERCENT
        .captures_iter(&clean)
        .filter_map(|caps| caps.get(1))
        .find_map(|m| to_percent(m.as_str()));

    if let Some(percent) = fallback {
        trace!("Fallback scan found {}% in {:?}", percent, clean);
    }
    fallback
}

fn to_percent(digits: &str) -> Option<u8> {
    digits
        .parse::<u16>()
        .ok()
        .filter(|value| *value <= 100)
        .map(|value| value as u8)
}
