//! Parsing of free-form model replies.
//!
//! The model is asked for "only a JSON array" but routinely wraps it in
//! prose or markdown fences, so the array is located by scanning rather
//! than parsing the reply wholesale.

use regex::Regex;
use std::sync::OnceLock;

use super::{ExtractionError, RawMedicine};

/// Fenced ```json block, tried first: when the model fences the array the
/// surrounding prose may contain brackets of its own.
fn fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?\s*(\[.*?\])\s*```").expect("static regex is valid")
    })
}

/// First '[' through last ']' across lines. Only used to produce a parse
/// error once no well-formed array was found anywhere.
fn span_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\[.*\]").expect("static regex is valid"))
}

/// Locate the first well-formed JSON array embedded in a model reply.
///
/// A stray bracket in prose ahead of the data ("[Note] ...") must not hide
/// the array, so every '[' is tried in order until one parses as a complete
/// array. Text after the array is ignored.
pub fn find_json_array(text: &str) -> Option<&str> {
    if let Some(fenced) = fence_regex().captures(text).and_then(|caps| caps.get(1)) {
        if let Some(found) = scan_for_array(fenced.as_str()) {
            return Some(found);
        }
    }
    scan_for_array(text)
}

/// Try each '[' as the start of a complete JSON array, ignoring whatever
/// follows it.
fn scan_for_array(text: &str) -> Option<&str> {
    for (idx, _) in text.match_indices('[') {
        let tail = &text[idx..];
        let mut stream =
            serde_json::Deserializer::from_str(tail).into_iter::<serde_json::Value>();
        if let Some(Ok(value)) = stream.next() {
            if value.is_array() {
                return Some(&tail[..stream.byte_offset()]);
            }
        }
    }
    None
}

/// Parse a model reply into raw medicine entries.
///
/// Array elements that are not objects are skipped with a warning rather
/// than failing the whole reply.
pub fn parse_medicines(reply: &str) -> Result<Vec<RawMedicine>, ExtractionError> {
    let Some(array_text) = find_json_array(reply) else {
        // Distinguish an array-shaped span that will not parse from a reply
        // with no array at all.
        return match span_regex().find(reply) {
            Some(m) => match serde_json::from_str::<serde_json::Value>(m.as_str()) {
                Err(e) => Err(ExtractionError::ResponseParsing(e.to_string())),
                Ok(_) => Err(ExtractionError::NoJsonFound),
            },
            None => Err(ExtractionError::NoJsonFound),
        };
    };

    let values: Vec<serde_json::Value> = serde_json::from_str(array_text)
        .map_err(|e| ExtractionError::ResponseParsing(e.to_string()))?;

    let mut medicines = Vec::with_capacity(values.len());
    for value in values {
        match serde_json::from_value::<RawMedicine>(value.clone()) {
            Ok(medicine) => medicines.push(medicine),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed extracted entry");
            }
        }
    }
    Ok(medicines)
}
