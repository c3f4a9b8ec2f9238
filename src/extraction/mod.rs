//! Extraction collaborator boundary.
//!
//! The hosted model is a black box that looks at a prescription image and
//! returns best-effort JSON. Nothing it sends is trusted: field names vary,
//! durations arrive as numbers or prose, dates in arbitrary formats, and
//! entries may be empty or partial. [`RawMedicine`] absorbs that looseness
//! and [`normalize_entries`] converts it into typed [`MedicineEntry`] values
//! — the only path by which extraction output enters the rest of the crate.

pub mod gemini;
pub mod parse;

use serde::Deserialize;
use thiserror::Error;

use crate::models::MedicineEntry;
use crate::normalize::{normalize_text, parse_duration, parse_flexible_date, parse_frequency};

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Cannot reach extraction service at {0}")]
    Connection(String),

    #[error("Extraction request failed: {0}")]
    HttpClient(String),

    #[error("Extraction service returned HTTP {status}: {body}")]
    ServiceError { status: u16, body: String },

    #[error("Cannot parse extraction response: {0}")]
    ResponseParsing(String),

    #[error("No JSON array found in model reply")]
    NoJsonFound,
}

/// Extracts medicine entries from a document image.
pub trait MedicineExtractor {
    fn extract(&self, image: &[u8], mime_type: &str) -> Result<Vec<RawMedicine>, ExtractionError>;
}

/// One medicine as the model reported it, before normalization.
///
/// Aliases cover the key spellings observed across model replies
/// ("Drug Name" table headers, camelCase, lowercase). Unknown keys such as
/// "Sr." are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawMedicine {
    #[serde(alias = "medicineName", alias = "Drug Name", alias = "drug_name", alias = "Name")]
    pub name: Option<String>,
    #[serde(alias = "Dosage", alias = "dose", alias = "Dose")]
    pub dosage: Option<String>,
    #[serde(alias = "Frequency")]
    pub frequency: Option<String>,
    /// Number or string — decided at normalization time.
    #[serde(alias = "Duration")]
    pub duration: Option<serde_json::Value>,
    #[serde(alias = "prescribedDate", alias = "Date", alias = "date")]
    pub prescribed_date: Option<String>,
    #[serde(alias = "hospitalName", alias = "Hospital Name")]
    pub hospital_name: Option<String>,
}

/// Typed result of normalizing a raw extraction.
#[derive(Debug, Clone, Default)]
pub struct NormalizedExtraction {
    pub medicines: Vec<MedicineEntry>,
    pub hospital_name: Option<String>,
}

/// Convert raw model output into typed entries.
///
/// Entries without a usable name are dropped. Every other field degrades
/// individually: an unparseable date or duration loses that field, not the
/// whole entry.
pub fn normalize_entries(raw: Vec<RawMedicine>) -> NormalizedExtraction {
    let mut result = NormalizedExtraction::default();

    for item in raw {
        if result.hospital_name.is_none() {
            result.hospital_name = item
                .hospital_name
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from);
        }

        let Some(name) = item.name.as_deref().map(str::trim).filter(|s| !s.is_empty())
        else {
            tracing::debug!("Dropping extracted entry without a medicine name");
            continue;
        };

        result.medicines.push(MedicineEntry {
            name: name.to_string(),
            dosage: item
                .dosage
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
            frequency: item
                .frequency
                .as_deref()
                .filter(|s| !normalize_text(s).is_empty())
                .map(parse_frequency),
            duration: item
                .duration
                .as_ref()
                .map(parse_duration)
                .unwrap_or(crate::models::DurationSpec::Unknown),
            prescribed_date: item
                .prescribed_date
                .as_deref()
                .and_then(parse_flexible_date),
        });
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DurationSpec, Frequency};
    use chrono::NaiveDate;

    #[test]
    fn aliases_deserialize() {
        let raw: Vec<RawMedicine> = serde_json::from_str(
            r#"[{"Sr.": 1, "Drug Name": "Amoxicillin", "Frequency": "BD", "Duration": "7 days", "Date": "2024-01-14"}]"#,
        )
        .unwrap();
        assert_eq!(raw[0].name.as_deref(), Some("Amoxicillin"));
        assert_eq!(raw[0].frequency.as_deref(), Some("BD"));
    }

    #[test]
    fn camel_case_keys_deserialize() {
        let raw: Vec<RawMedicine> = serde_json::from_str(
            r#"[{"medicineName": "Metformin", "dosage": "500mg", "duration": 30, "prescribedDate": "2024-02-01"}]"#,
        )
        .unwrap();
        assert_eq!(raw[0].name.as_deref(), Some("Metformin"));
        assert_eq!(raw[0].duration, Some(serde_json::json!(30)));
    }

    #[test]
    fn normalization_produces_typed_entries() {
        let raw: Vec<RawMedicine> = serde_json::from_str(
            r#"[{"medicineName": " Amoxicillin ", "dosage": "500mg", "frequency": "1-0-1",
                 "duration": "7 days", "prescribedDate": "14/01/2024", "hospitalName": "City Hospital"}]"#,
        )
        .unwrap();

        let normalized = normalize_entries(raw);
        assert_eq!(normalized.hospital_name.as_deref(), Some("City Hospital"));
        let entry = &normalized.medicines[0];
        assert_eq!(entry.name, "Amoxicillin");
        assert_eq!(entry.frequency, Some(Frequency::TwiceDaily));
        assert_eq!(entry.duration, DurationSpec::Days(7));
        assert_eq!(
            entry.prescribed_date,
            NaiveDate::from_ymd_opt(2024, 1, 14)
        );
    }

    #[test]
    fn nameless_entries_dropped() {
        let raw: Vec<RawMedicine> = serde_json::from_str(
            r#"[{"dosage": "500mg"}, {"medicineName": "  "}, {"medicineName": "Metformin"}]"#,
        )
        .unwrap();
        let normalized = normalize_entries(raw);
        assert_eq!(normalized.medicines.len(), 1);
        assert_eq!(normalized.medicines[0].name, "Metformin");
    }

    #[test]
    fn bad_fields_degrade_individually() {
        let raw: Vec<RawMedicine> = serde_json::from_str(
            r#"[{"medicineName": "Metformin", "duration": "until finished", "prescribedDate": "soon"}]"#,
        )
        .unwrap();
        let normalized = normalize_entries(raw);
        let entry = &normalized.medicines[0];
        assert_eq!(entry.duration, DurationSpec::Indefinite);
        assert_eq!(entry.prescribed_date, None);
    }

    #[test]
    fn empty_input_is_empty_output() {
        let normalized = normalize_entries(Vec::new());
        assert!(normalized.medicines.is_empty());
        assert!(normalized.hospital_name.is_none());
    }
}
