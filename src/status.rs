//! Medication Status Engine.
//!
//! Classifies each extracted medicine as active or completed and computes
//! how many days of the course remain, as of a caller-supplied `today`.
//! Every function here is pure and total: no clock reads, no I/O, and any
//! invalid input degrades to the completed/zero result instead of erroring.
//! An unknown start date can never count as an active course (fail-closed).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{DurationSpec, Frequency, MedicineEntry, Prescription};

/// Lifecycle classification of a single medicine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicineStatus {
    pub is_active: bool,
    pub remaining_days: i64,
}

impl MedicineStatus {
    /// The fail-closed result: completed, nothing remaining.
    pub const COMPLETED: MedicineStatus = MedicineStatus {
        is_active: false,
        remaining_days: 0,
    };
}

/// Days left in a course starting at `start` and running `duration_days`.
///
/// Calendar-day arithmetic with no time-of-day component: `today` must
/// already be a plain date (the type enforces the midnight truncation the
/// calculation depends on), so the result is identical for any number of
/// calls within the same calendar day. A duration that would push the end
/// past the representable date range degrades to zero instead of panicking;
/// normalization caps durations long before that point, but stored rows are
/// not re-validated here.
pub fn remaining_days(start: NaiveDate, duration_days: u32, today: NaiveDate) -> i64 {
    match start.checked_add_days(chrono::Days::new(u64::from(duration_days))) {
        Some(end) => (end - today).num_days().max(0),
        None => 0,
    }
}

/// Classify one medicine given its resolved start date.
///
/// `None` start date, a duration without a positive day count (`Indefinite`
/// or `Unknown`), or a zero-day course all yield [`MedicineStatus::COMPLETED`].
pub fn evaluate(
    start_date: Option<NaiveDate>,
    duration: DurationSpec,
    today: NaiveDate,
) -> MedicineStatus {
    let (Some(start), Some(days)) = (start_date, duration.days()) else {
        return MedicineStatus::COMPLETED;
    };

    let remaining = remaining_days(start, days, today);
    MedicineStatus {
        is_active: remaining > 0,
        remaining_days: remaining,
    }
}

/// Resolve the authoritative start date for a medicine.
///
/// Priority: the medicine's own extracted date, then the prescription's
/// document-level extracted date, then the user-entered form date.
pub fn resolve_start_date(entry: &MedicineEntry, prescription: &Prescription) -> NaiveDate {
    entry
        .prescribed_date
        .or(prescription.extracted_date)
        .unwrap_or(prescription.form_date)
}

/// A medicine enriched with its parent prescription's context, for list and
/// dashboard views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicineView {
    pub prescription_id: Uuid,
    pub name: String,
    pub dosage: Option<String>,
    pub frequency: Option<Frequency>,
    pub duration: DurationSpec,
    pub doctor_name: String,
    pub hospital_name: Option<String>,
    pub start_date: NaiveDate,
    pub status: MedicineStatus,
}

/// A user's medicines partitioned by lifecycle status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MedicationGroups {
    /// Sorted by remaining days ascending — most urgent first.
    pub active: Vec<MedicineView>,
    /// Sorted by start date descending — most recent history first.
    pub completed: Vec<MedicineView>,
}

/// Partition all medicines across a user's prescriptions into
/// active/completed groups, most urgent actives first and most recent
/// completions first.
pub fn group_medicines(prescriptions: &[Prescription], today: NaiveDate) -> MedicationGroups {
    let mut groups = MedicationGroups::default();

    for prescription in prescriptions {
        for entry in &prescription.medicines {
            let start = resolve_start_date(entry, prescription);
            let status = evaluate(Some(start), entry.duration, today);
            let view = MedicineView {
                prescription_id: prescription.id,
                name: entry.name.clone(),
                dosage: entry.dosage.clone(),
                frequency: entry.frequency.clone(),
                duration: entry.duration,
                doctor_name: prescription.doctor_name.clone(),
                hospital_name: prescription.hospital_name.clone(),
                start_date: start,
                status,
            };
            if status.is_active {
                groups.active.push(view);
            } else {
                groups.completed.push(view);
            }
        }
    }

    groups
        .active
        .sort_by_key(|view| view.status.remaining_days);
    groups
        .completed
        .sort_by(|a, b| b.start_date.cmp(&a.start_date));

    groups
}

/// Header statistics for the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardCounts {
    pub prescriptions: u32,
    /// Active medicine entries across all prescriptions. Two entries for the
    /// same drug in different prescriptions both count.
    pub active_medications: u32,
}

pub fn dashboard_counts(prescriptions: &[Prescription], today: NaiveDate) -> DashboardCounts {
    let active = prescriptions
        .iter()
        .flat_map(|prescription| {
            prescription.medicines.iter().map(|entry| {
                let start = resolve_start_date(entry, prescription);
                evaluate(Some(start), entry.duration, today)
            })
        })
        .filter(|status| status.is_active)
        .count() as u32;

    DashboardCounts {
        prescriptions: prescriptions.len() as u32,
        active_medications: active,
    }
}
