//! Typed domain model shared across the crate.
//!
//! Everything downstream of the extraction boundary works with these types;
//! raw, partially-trusted model output never leaves `extraction::normalize`.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authenticated user identity, passed explicitly to every operation that
/// needs one. There is no ambient "current user" anywhere in this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Dosing frequency, normalized to a small controlled vocabulary.
/// Unrecognized text is kept as-is in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    OnceDaily,
    TwiceDaily,
    ThriceDaily,
    FourTimesDaily,
    Other(String),
}

impl Frequency {
    /// Canonical lowercase form used for display and content hashing.
    pub fn canonical(&self) -> String {
        match self {
            Self::OnceDaily => "once daily".to_string(),
            Self::TwiceDaily => "twice daily".to_string(),
            Self::ThriceDaily => "thrice daily".to_string(),
            Self::FourTimesDaily => "four times daily".to_string(),
            Self::Other(text) => crate::normalize::normalize_text(text),
        }
    }
}

/// A medicine's course length as extracted from the document.
///
/// `Indefinite` covers phrases like "until finished" or "ongoing". The
/// status engine treats it fail-closed (completed, 0 days remaining) so an
/// unverified OCR phrase can never keep a medication active forever, but the
/// variant is preserved so views can label the entry as open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationSpec {
    Days(u32),
    Indefinite,
    Unknown,
}

impl DurationSpec {
    /// Positive day count, if this duration participates in lifecycle math.
    pub fn days(&self) -> Option<u32> {
        match self {
            Self::Days(n) if *n > 0 => Some(*n),
            _ => None,
        }
    }
}

/// One prescribed medicine line-item within a prescription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicineEntry {
    pub name: String,
    pub dosage: Option<String>,
    pub frequency: Option<Frequency>,
    pub duration: DurationSpec,
    /// Start date extracted from the source image — the most authoritative
    /// date for this specific medicine.
    pub prescribed_date: Option<NaiveDate>,
}

/// One uploaded prescription document and its extracted content.
/// Created once, atomically, after its hash is confirmed unique; never
/// mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub doctor_name: String,
    pub hospital_name: Option<String>,
    /// Date the user entered in the upload form. Fallback only.
    pub form_date: NaiveDate,
    /// Date extracted from the document itself, when present.
    pub extracted_date: Option<NaiveDate>,
    /// Order carries no meaning; hashing sorts by name.
    pub medicines: Vec<MedicineEntry>,
    pub notes: String,
    pub file_reference: String,
    pub content_hash: String,
    /// Display ordering only.
    pub created_at: NaiveDateTime,
}

/// An entry in the global deduplication ledger. At most one record exists
/// per distinct hash, system-wide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashRecord {
    pub hash: String,
    pub registered_at: NaiveDateTime,
    /// Informational only — never participates in uniqueness comparison.
    pub registered_by: Option<UserId>,
}

/// Category of an uploaded record document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Prescription,
    LabReport,
    Bill,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prescription => "prescription",
            Self::LabReport => "lab_report",
            Self::Bill => "bill",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "prescription" => Some(Self::Prescription),
            "lab_report" => Some(Self::LabReport),
            "bill" => Some(Self::Bill),
            _ => None,
        }
    }
}

/// A non-prescription uploaded document (lab report or bill), or the
/// document-level view of a prescription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordDocument {
    pub id: Uuid,
    pub kind: DocumentKind,
    pub title: String,
    pub document_date: Option<NaiveDate>,
    pub file_reference: String,
    pub uploaded_at: NaiveDateTime,
}

/// A scheduled appointment with a professional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_name: String,
    pub date: NaiveDate,
    pub time: Option<String>,
    pub location: Option<String>,
}
