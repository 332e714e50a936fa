//! Shared line pre-processing for the output parsers

use once_cell::sync::Lazy;
use regex::Regex;

/// Timestamped diagnostic lines that never carry progress
static SYSTEM_LOG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9]{4}/[0-9]{2}/[0-9]{2} [0-9]{2}:[0-9]{2}:[0-9]{2} (?:NOTICE|DEBUG|ERROR)\s*:")
        .expect("valid system log regex")
});

/// Timestamped INFO prefix; the stats payload follows the colon
static INFO_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9]{4}/[0-9]{2}/[0-9]{2} [0-9]{2}:[0-9]{2}:[0-9]{2} INFO\s*:\s*(.*)")
        .expect("valid INFO prefix regex")
});

static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*[mK]").expect("valid ANSI escape regex"));

/// Reduce a raw output line to the text worth parsing
///
/// Returns `None` for NOTICE/DEBUG/ERROR log lines and for INFO lines with
/// an empty payload. INFO lines are unwrapped to the text after the level
/// marker. ANSI escapes and carriage returns are stripped and the result is
/// trimmed.
pub fn prepare_line(line: &str) -> Option<String> {
    if SYSTEM_LOG.is_match(line) {
        return None;
    }

    let payload = match INFO_PREFIX.captures(line) {
        Some(caps) => {
            let body = caps.get(1).map_or("", |m| m.as_str()).trim();
            if body.is_empty() {
                return None;
            }
            body
        }
        None => line,
    };

    let cleaned = ANSI_ESCAPE.replace_all(payload, "");
    Some(cleaned.replace('\r', "").trim().to_string())
}
