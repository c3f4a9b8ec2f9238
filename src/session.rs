//! Per-user session.
//!
//! A [`Session`] owns the authenticated identity and the database handle for
//! the duration of one signed-in use of the app. Every view goes through it,
//! and dropping it releases the database connection — there is no global
//! registry of live subscriptions to tear down.

use std::path::Path;

use chrono::NaiveDate;

use crate::dashboard::{get_dashboard_data, DashboardData};
use crate::db::repository::appointment::{fetch_upcoming_appointments, insert_appointment};
use crate::db::repository::document::{fetch_documents_for_user, insert_document};
use crate::db::repository::prescription::fetch_prescriptions_for_user;
use crate::db::sqlite::{open_database, open_memory_database};
use crate::db::DatabaseError;
use crate::extraction::MedicineExtractor;
use crate::ledger::HashLedger;
use crate::models::{
    Appointment, DocumentKind, Prescription, RecordDocument, UserId,
};
use crate::status::{group_medicines, MedicationGroups};
use crate::storage::ObjectStore;
use crate::upload::{run_upload, UploadError, UploadOutcome, UploadRequest};

pub struct Session {
    user: UserId,
    conn: rusqlite::Connection,
}

impl Session {
    /// Open a session against the on-disk database, creating it on first use.
    pub fn open(db_path: &Path, user: UserId) -> Result<Self, DatabaseError> {
        let conn = open_database(db_path)?;
        tracing::info!(user = %user, "Session opened");
        Ok(Self { user, conn })
    }

    /// In-memory session, for tests.
    pub fn in_memory(user: UserId) -> Result<Self, DatabaseError> {
        Ok(Self {
            user,
            conn: open_memory_database()?,
        })
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn prescriptions(&self) -> Result<Vec<Prescription>, DatabaseError> {
        fetch_prescriptions_for_user(&self.conn, &self.user)
    }

    /// All medicines across the user's prescriptions, partitioned into
    /// active and completed as of `today`.
    pub fn medications(&self, today: NaiveDate) -> Result<MedicationGroups, DatabaseError> {
        let prescriptions = self.prescriptions()?;
        Ok(group_medicines(&prescriptions, today))
    }

    pub fn dashboard(&self, today: NaiveDate) -> Result<DashboardData, DatabaseError> {
        get_dashboard_data(&self.conn, &self.user, today)
    }

    pub fn documents(
        &self,
        kind: Option<DocumentKind>,
        limit: u32,
    ) -> Result<Vec<RecordDocument>, DatabaseError> {
        fetch_documents_for_user(&self.conn, &self.user, kind, limit)
    }

    pub fn add_document(&self, document: &RecordDocument) -> Result<(), DatabaseError> {
        insert_document(&self.conn, &self.user, document)
    }

    pub fn upcoming_appointments(
        &self,
        today: NaiveDate,
        limit: u32,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        fetch_upcoming_appointments(&self.conn, &self.user, today, limit)
    }

    pub fn add_appointment(&self, appointment: &Appointment) -> Result<(), DatabaseError> {
        insert_appointment(&self.conn, &self.user, appointment)
    }

    /// Run the prescription upload workflow as this session's user.
    pub fn upload_prescription(
        &self,
        extractor: &dyn MedicineExtractor,
        store: &dyn ObjectStore,
        ledger: &dyn HashLedger,
        request: UploadRequest,
    ) -> Result<UploadOutcome, UploadError> {
        run_upload(&self.conn, extractor, store, ledger, &self.user, request)
    }
}
