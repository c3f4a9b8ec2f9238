//! Shared normalization helpers for partially-trusted extraction output.
//!
//! The hosted model returns fields as loose JSON: durations arrive as
//! numbers or prose, dates in whatever format the prescription used, and
//! frequencies in clinical shorthand. Everything funnels through here once,
//! at the boundary, so the status and dedup engines only see typed values.

use chrono::NaiveDate;

use crate::models::{DurationSpec, Frequency};

/// Lowercase, trim, and collapse internal whitespace.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Date formats seen on real prescriptions, tried in order. ISO first so the
/// canonical form always wins over ambiguous day/month orderings.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Parse a calendar date from free text. Returns `None` rather than erroring;
/// an unparseable date must degrade, never abort.
pub fn parse_flexible_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Tolerate a trailing time component ("2024-01-05T00:00:00", "… 10:30").
    let date_part = trimmed
        .split(['T', ' '])
        .next()
        .unwrap_or(trimmed);

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(date_part, format) {
            return Some(date);
        }
        // Formats with spaces ("January 5, 2024") need the full string.
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }
    None
}

/// Phrases that signal an open-ended course rather than a day count.
const INDEFINITE_PHRASES: &[&str] = &[
    "until finished",
    "till finished",
    "until done",
    "ongoing",
    "continue",
    "continuous",
    "as needed",
    "as required",
    "sos",
    "prn",
    "lifelong",
    "long term",
];

/// Longest course length accepted as a day count. Anything past a century
/// is OCR noise, not a prescription, and must not reach date arithmetic.
pub const MAX_DURATION_DAYS: u32 = 36_500;

/// Interpret a raw `duration` field (number, numeric string, or prose).
///
/// Numbers and leading-digit strings ("7 days") become `Days`; recognized
/// open-ended phrases become `Indefinite`; everything else is `Unknown`.
/// Non-positive or absurdly large counts are never a valid course length.
pub fn parse_duration(value: &serde_json::Value) -> DurationSpec {
    match value {
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(days) if days > 0 && days <= i64::from(MAX_DURATION_DAYS) => {
                DurationSpec::Days(days as u32)
            }
            _ => DurationSpec::Unknown,
        },
        serde_json::Value::String(s) => parse_duration_text(s),
        _ => DurationSpec::Unknown,
    }
}

/// Text-only variant of [`parse_duration`].
pub fn parse_duration_text(text: &str) -> DurationSpec {
    let normalized = normalize_text(text);
    if normalized.is_empty() {
        return DurationSpec::Unknown;
    }

    if INDEFINITE_PHRASES
        .iter()
        .any(|phrase| normalized.contains(phrase))
    {
        return DurationSpec::Indefinite;
    }

    // Leading digits: "7", "7 days", "10days".
    let digits: String = normalized
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if let Ok(mut days) = digits.parse::<u32>() {
        if days > 0 {
            // "2 weeks" / "1 month" scale the leading number.
            if normalized.contains("week") {
                days = days.saturating_mul(7);
            } else if normalized.contains("month") {
                days = days.saturating_mul(30);
            }
            if days <= MAX_DURATION_DAYS {
                return DurationSpec::Days(days);
            }
        }
    }

    DurationSpec::Unknown
}

/// Map free-text frequency onto the controlled vocabulary.
///
/// Handles spelled-out forms, latin shorthand (od/bd/tds/qid), and the
/// "1-0-1" dose-schedule notation common on printed prescriptions.
pub fn parse_frequency(text: &str) -> Frequency {
    let normalized = normalize_text(text);
    if normalized.is_empty() {
        return Frequency::Other(String::new());
    }

    if let Some(count) = dose_pattern_count(&normalized) {
        return frequency_from_count(count, &normalized);
    }

    match normalized.as_str() {
        "od" | "qd" | "once daily" | "once a day" | "daily" | "every day" | "1 time a day" => {
            Frequency::OnceDaily
        }
        "bd" | "bid" | "twice daily" | "twice a day" | "2 times a day" | "every 12 hours" => {
            Frequency::TwiceDaily
        }
        "tds" | "tid" | "thrice daily" | "thrice a day" | "three times a day"
        | "3 times a day" | "every 8 hours" => Frequency::ThriceDaily,
        "qid" | "qds" | "four times daily" | "four times a day" | "4 times a day"
        | "every 6 hours" => Frequency::FourTimesDaily,
        _ => Frequency::Other(normalized),
    }
}

/// Count doses in "1-0-1" style notation. Returns `None` if the text is not
/// a dash-separated digit pattern.
fn dose_pattern_count(text: &str) -> Option<u32> {
    let parts: Vec<&str> = text.split('-').map(str::trim).collect();
    if parts.len() < 2 || parts.len() > 4 {
        return None;
    }
    let mut count = 0u32;
    for part in &parts {
        let dose: u32 = part.parse().ok()?;
        if dose > 0 {
            count += 1;
        }
    }
    Some(count)
}

fn frequency_from_count(count: u32, original: &str) -> Frequency {
    match count {
        1 => Frequency::OnceDaily,
        2 => Frequency::TwiceDaily,
        3 => Frequency::ThriceDaily,
        4 => Frequency::FourTimesDaily,
        _ => Frequency::Other(original.to_string()),
    }
}
