//! Prescription Deduplication Engine — content hashing.
//!
//! Produces the identity key used to detect the same clinical prescription
//! being uploaded twice, by any user. Hashing is over normalized semantic
//! fields rather than raw image bytes, so two different scans of the same
//! prescription still collide (the intended policy — see DESIGN.md).
//!
//! Canonical form, in order:
//! 1. doctor name lowercased/trimmed/whitespace-collapsed;
//! 2. the form date serialized as ISO `YYYY-MM-DD` (never a raw string);
//! 3. medicines reduced to `{name, dosage, frequency, duration}`, all
//!    normalized, then sorted by name so list order never matters;
//! 4. deterministic JSON serialization of the whole structure;
//! 5. SHA-256 over the UTF-8 bytes, base64 (standard) encoded.
//!
//! Who uploaded the prescription, and when, never enters the hash.

use base64::Engine;
use chrono::NaiveDate;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::models::{DurationSpec, MedicineEntry};
use crate::normalize::normalize_text;

/// Normalized medicine fields as serialized into the hash input.
/// Field order is the serialization order — do not reorder.
#[derive(Debug, Serialize, PartialEq)]
struct HashableMedicine {
    name: String,
    dosage: Option<String>,
    frequency: Option<String>,
    duration: Option<String>,
}

/// Top-level hash input. Field order is the serialization order.
#[derive(Debug, Serialize)]
struct HashablePrescription {
    doctor_name: String,
    date: String,
    medicines: Vec<HashableMedicine>,
}

impl HashableMedicine {
    fn from_entry(entry: &MedicineEntry) -> Self {
        Self {
            name: normalize_text(&entry.name),
            dosage: entry
                .dosage
                .as_deref()
                .map(normalize_text)
                .filter(|s| !s.is_empty()),
            frequency: entry
                .frequency
                .as_ref()
                .map(|f| f.canonical())
                .filter(|s| !s.is_empty()),
            duration: match entry.duration {
                DurationSpec::Days(n) => Some(n.to_string()),
                DurationSpec::Indefinite => Some("indefinite".to_string()),
                DurationSpec::Unknown => None,
            },
        }
    }
}

/// Compute the content hash identifying a prescription's clinical content.
///
/// Pure function of `(doctor_name, date, medicines)`; two logically
/// identical prescriptions hash equal regardless of uploader, upload time,
/// letter case, spacing, or medicine order.
pub fn content_hash(doctor_name: &str, date: NaiveDate, medicines: &[MedicineEntry]) -> String {
    let mut hashable: Vec<HashableMedicine> =
        medicines.iter().map(HashableMedicine::from_entry).collect();
    hashable.sort_by(|a, b| a.name.cmp(&b.name));

    let input = HashablePrescription {
        doctor_name: normalize_text(doctor_name),
        date: date.format("%Y-%m-%d").to_string(),
        medicines: hashable,
    };

    // Struct serialization order is fixed, so the JSON is deterministic.
    let json = serde_json::to_string(&input).expect("hash input serialization cannot fail");
    let digest = Sha256::digest(json.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(digest)
}
