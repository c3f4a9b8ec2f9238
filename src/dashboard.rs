//! Dashboard aggregation.
//!
//! One query pass per collaborator, then pure computation through the
//! status engine. `today` is caller-supplied so the whole view is
//! reproducible in tests.

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::repository::appointment::fetch_upcoming_appointments;
use crate::db::repository::document::fetch_documents_for_user;
use crate::db::repository::prescription::fetch_prescriptions_for_user;
use crate::db::DatabaseError;
use crate::models::{Appointment, DocumentKind, RecordDocument, UserId};
use crate::status::{dashboard_counts, group_medicines, DashboardCounts, MedicineView};

const URGENT_MEDICATIONS: usize = 3;
const UPCOMING_APPOINTMENTS: u32 = 3;
const RECENT_LAB_REPORTS: u32 = 3;

/// Everything the dashboard page shows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardData {
    pub counts: DashboardCounts,
    /// The active medications closest to running out, most urgent first.
    pub urgent_medications: Vec<MedicineView>,
    pub upcoming_appointments: Vec<Appointment>,
    pub recent_lab_reports: Vec<RecordDocument>,
}

pub fn get_dashboard_data(
    conn: &Connection,
    user: &UserId,
    today: NaiveDate,
) -> Result<DashboardData, DatabaseError> {
    let prescriptions = fetch_prescriptions_for_user(conn, user)?;

    let counts = dashboard_counts(&prescriptions, today);
    let mut urgent = group_medicines(&prescriptions, today).active;
    urgent.truncate(URGENT_MEDICATIONS);

    let upcoming_appointments =
        fetch_upcoming_appointments(conn, user, today, UPCOMING_APPOINTMENTS)?;
    let recent_lab_reports = fetch_documents_for_user(
        conn,
        user,
        Some(DocumentKind::LabReport),
        RECENT_LAB_REPORTS,
    )?;

    tracing::debug!(
        user = %user,
        prescriptions = counts.prescriptions,
        active_medications = counts.active_medications,
        "Dashboard computed"
    );

    Ok(DashboardData {
        counts,
        urgent_medications: urgent,
        upcoming_appointments,
        recent_lab_reports,
    })
}
