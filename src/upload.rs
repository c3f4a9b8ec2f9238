//! Prescription upload workflow.
//!
//! Drives one upload through its stages:
//!
//! `Extracted → HashChecking → [Rejected] | Uploading → Persisting →
//! Registering → Done`, with `Failed` on I/O errors.
//!
//! The ledger's client-side `check_exists` is a fast path only; the
//! registration at the end is the commit point. Writes are ordered
//! store-file → insert-prescription → register-hash, so a failed or lost
//! registration can be compensated by deleting the row and the file —
//! a crash never leaves an orphaned hash blocking future uploads.

use chrono::{NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::db::repository::prescription::{delete_prescription, insert_prescription};
use crate::db::DatabaseError;
use crate::dedup::content_hash;
use crate::extraction::{normalize_entries, MedicineExtractor, NormalizedExtraction};
use crate::ledger::{HashLedger, LedgerError, RegisterOutcome};
use crate::models::{Prescription, UserId};
use crate::storage::{ObjectStore, StorageError};
use rusqlite::Connection;

/// Workflow stage, for logging and error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    Extracted,
    HashChecking,
    Uploading,
    Persisting,
    Registering,
    Done,
    Rejected,
}

impl UploadStage {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Extracted => "extracted",
            Self::HashChecking => "hash_checking",
            Self::Uploading => "uploading",
            Self::Persisting => "persisting",
            Self::Registering => "registering",
            Self::Done => "done",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Invalid upload request: {0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Everything the caller supplies for one upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub doctor_name: String,
    /// Date entered in the upload form.
    pub form_date: NaiveDate,
    pub notes: String,
    pub file_name: String,
    pub file_bytes: Vec<u8>,
    /// Guessed from `file_name` when absent.
    pub mime_type: Option<String>,
}

#[derive(Debug)]
pub enum UploadOutcome {
    Created(Prescription),
    /// The same clinical content is already registered, by any user.
    /// Nothing was persisted for this request.
    Duplicate { hash: String },
}

/// Run one upload end to end.
pub fn run_upload(
    conn: &Connection,
    extractor: &dyn MedicineExtractor,
    store: &dyn ObjectStore,
    ledger: &dyn HashLedger,
    user: &UserId,
    request: UploadRequest,
) -> Result<UploadOutcome, UploadError> {
    validate(&request)?;

    let mime_type = request.mime_type.clone().unwrap_or_else(|| {
        mime_guess::from_path(&request.file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    });

    // Extraction is best-effort: a prescription with no readable medicines
    // is still worth keeping for the original image.
    let extracted = match extractor.extract(&request.file_bytes, &mime_type) {
        Ok(raw) => normalize_entries(raw),
        Err(e) => {
            tracing::warn!(error = %e, "Extraction failed; continuing with empty medicine list");
            NormalizedExtraction::default()
        }
    };
    tracing::debug!(
        stage = UploadStage::Extracted.as_str(),
        medicines = extracted.medicines.len(),
        "Extraction complete"
    );

    let extracted_date = extracted
        .medicines
        .iter()
        .find_map(|m| m.prescribed_date);

    let hash = content_hash(&request.doctor_name, request.form_date, &extracted.medicines);

    tracing::debug!(stage = UploadStage::HashChecking.as_str(), hash, "Checking ledger");
    if ledger.check_exists(user, &hash)? {
        tracing::info!(
            stage = UploadStage::Rejected.as_str(),
            hash,
            "Duplicate prescription rejected before any write"
        );
        return Ok(UploadOutcome::Duplicate { hash });
    }

    tracing::debug!(stage = UploadStage::Uploading.as_str(), "Storing document file");
    let file_reference = store.put(&request.file_name, &request.file_bytes)?;

    let prescription = Prescription {
        id: Uuid::new_v4(),
        doctor_name: request.doctor_name.trim().to_string(),
        hospital_name: extracted.hospital_name,
        form_date: request.form_date,
        extracted_date,
        medicines: extracted.medicines,
        notes: request.notes,
        file_reference: file_reference.clone(),
        content_hash: hash.clone(),
        created_at: Utc::now().naive_utc(),
    };

    tracing::debug!(
        stage = UploadStage::Persisting.as_str(),
        prescription_id = %prescription.id,
        "Inserting prescription"
    );
    if let Err(e) = insert_prescription(conn, user, &prescription) {
        remove_stored_file(store, &file_reference);
        return Err(e.into());
    }

    tracing::debug!(stage = UploadStage::Registering.as_str(), hash, "Registering hash");
    match ledger.register(user, &hash) {
        Ok(RegisterOutcome::Registered) => {
            tracing::info!(
                stage = UploadStage::Done.as_str(),
                prescription_id = %prescription.id,
                "Upload complete"
            );
            Ok(UploadOutcome::Created(prescription))
        }
        Ok(RegisterOutcome::AlreadyRegistered) => {
            // Lost the race against a concurrent upload of the same content.
            tracing::info!(hash, "Registration lost race; rolling back upload");
            compensate(conn, store, &prescription.id, &file_reference);
            Ok(UploadOutcome::Duplicate { hash })
        }
        Err(e) => {
            tracing::error!(error = %e, "Hash registration failed; rolling back upload");
            compensate(conn, store, &prescription.id, &file_reference);
            Err(e.into())
        }
    }
}

fn validate(request: &UploadRequest) -> Result<(), UploadError> {
    if request.doctor_name.trim().is_empty() {
        return Err(UploadError::Validation("doctor name is required".into()));
    }
    if request.file_bytes.is_empty() {
        return Err(UploadError::Validation("document file is empty".into()));
    }
    Ok(())
}

/// Undo the prescription row and stored file after a failed registration.
/// Failures here are logged, not surfaced: the original error matters more.
fn compensate(conn: &Connection, store: &dyn ObjectStore, id: &Uuid, reference: &str) {
    if let Err(e) = delete_prescription(conn, id) {
        tracing::error!(error = %e, prescription_id = %id, "Compensation delete failed");
    }
    remove_stored_file(store, reference);
}

fn remove_stored_file(store: &dyn ObjectStore, reference: &str) {
    if let Err(e) = store.delete(reference) {
        tracing::error!(error = %e, reference, "Could not remove stored file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::prescription::fetch_prescriptions_for_user;
    use crate::db::sqlite::open_memory_database;
    use crate::extraction::{ExtractionError, RawMedicine};
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};

    struct FixedExtractor(Result<Vec<RawMedicine>, ()>);

    impl MedicineExtractor for FixedExtractor {
        fn extract(&self, _: &[u8], _: &str) -> Result<Vec<RawMedicine>, ExtractionError> {
            match &self.0 {
                Ok(raw) => Ok(raw.clone()),
                Err(()) => Err(ExtractionError::NoJsonFound),
            }
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        objects: RefCell<HashMap<String, Vec<u8>>>,
    }

    impl ObjectStore for MemoryStore {
        fn put(&self, file_name: &str, bytes: &[u8]) -> Result<String, StorageError> {
            let reference = format!("{}-{}", Uuid::new_v4(), file_name);
            self.objects
                .borrow_mut()
                .insert(reference.clone(), bytes.to_vec());
            Ok(reference)
        }

        fn get(&self, reference: &str) -> Result<Vec<u8>, StorageError> {
            self.objects
                .borrow()
                .get(reference)
                .cloned()
                .ok_or_else(|| StorageError::InvalidReference(reference.to_string()))
        }

        fn delete(&self, reference: &str) -> Result<(), StorageError> {
            self.objects.borrow_mut().remove(reference);
            Ok(())
        }
    }

    /// Scriptable ledger: what `register` returns is decided up front, and
    /// `check_exists` reflects locally registered hashes.
    struct ScriptedLedger {
        registered: RefCell<HashSet<String>>,
        register_result: RegisterScript,
    }

    enum RegisterScript {
        Normal,
        AlwaysTaken,
        Fail,
    }

    impl ScriptedLedger {
        fn new(script: RegisterScript) -> Self {
            Self {
                registered: RefCell::new(HashSet::new()),
                register_result: script,
            }
        }
    }

    impl HashLedger for ScriptedLedger {
        fn check_exists(&self, _: &UserId, hash: &str) -> Result<bool, LedgerError> {
            Ok(self.registered.borrow().contains(hash))
        }

        fn register(&self, _: &UserId, hash: &str) -> Result<RegisterOutcome, LedgerError> {
            match self.register_result {
                RegisterScript::Normal => {
                    if self.registered.borrow_mut().insert(hash.to_string()) {
                        Ok(RegisterOutcome::Registered)
                    } else {
                        Ok(RegisterOutcome::AlreadyRegistered)
                    }
                }
                RegisterScript::AlwaysTaken => Ok(RegisterOutcome::AlreadyRegistered),
                RegisterScript::Fail => Err(LedgerError::Backend("ledger unavailable".into())),
            }
        }
    }

    fn user() -> UserId {
        UserId("user-1".to_string())
    }

    fn raw_medicines() -> Vec<RawMedicine> {
        serde_json::from_str(
            r#"[{"medicineName": "Amoxicillin", "dosage": "500mg", "frequency": "BD",
                 "duration": "7 days", "prescribedDate": "2024-01-14",
                 "hospitalName": "City Hospital"}]"#,
        )
        .unwrap()
    }

    fn request() -> UploadRequest {
        UploadRequest {
            doctor_name: "Dr. Chen".to_string(),
            form_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            notes: "After meals".to_string(),
            file_name: "rx.jpg".to_string(),
            file_bytes: b"image bytes".to_vec(),
            mime_type: None,
        }
    }

    #[test]
    fn successful_upload_creates_everything() {
        let conn = open_memory_database().unwrap();
        let store = MemoryStore::default();
        let ledger = ScriptedLedger::new(RegisterScript::Normal);
        let extractor = FixedExtractor(Ok(raw_medicines()));

        let outcome =
            run_upload(&conn, &extractor, &store, &ledger, &user(), request()).unwrap();

        let UploadOutcome::Created(prescription) = outcome else {
            panic!("expected Created");
        };
        assert_eq!(prescription.doctor_name, "Dr. Chen");
        assert_eq!(prescription.hospital_name.as_deref(), Some("City Hospital"));
        assert_eq!(
            prescription.extracted_date,
            NaiveDate::from_ymd_opt(2024, 1, 14)
        );
        assert_eq!(prescription.medicines.len(), 1);

        let stored = fetch_prescriptions_for_user(&conn, &user()).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].content_hash, prescription.content_hash);
        assert!(store.get(&prescription.file_reference).is_ok());
        assert!(ledger
            .check_exists(&user(), &prescription.content_hash)
            .unwrap());
    }

    #[test]
    fn duplicate_rejected_before_any_write() {
        let conn = open_memory_database().unwrap();
        let store = MemoryStore::default();
        let ledger = ScriptedLedger::new(RegisterScript::Normal);
        let extractor = FixedExtractor(Ok(raw_medicines()));

        // First upload registers the hash.
        run_upload(&conn, &extractor, &store, &ledger, &user(), request()).unwrap();

        // Second identical upload from a different user is rejected with
        // zero new writes.
        let other = UserId("user-2".to_string());
        let outcome =
            run_upload(&conn, &extractor, &store, &ledger, &other, request()).unwrap();
        assert!(matches!(outcome, UploadOutcome::Duplicate { .. }));

        assert!(fetch_prescriptions_for_user(&conn, &other).unwrap().is_empty());
        assert_eq!(store.objects.borrow().len(), 1);
    }

    #[test]
    fn lost_registration_race_rolls_back() {
        let conn = open_memory_database().unwrap();
        let store = MemoryStore::default();
        let ledger = ScriptedLedger::new(RegisterScript::AlwaysTaken);
        let extractor = FixedExtractor(Ok(raw_medicines()));

        // check_exists says free, register says taken — the race window.
        let outcome =
            run_upload(&conn, &extractor, &store, &ledger, &user(), request()).unwrap();
        assert!(matches!(outcome, UploadOutcome::Duplicate { .. }));

        assert!(fetch_prescriptions_for_user(&conn, &user()).unwrap().is_empty());
        assert!(store.objects.borrow().is_empty());
    }

    #[test]
    fn register_failure_compensates_and_surfaces_error() {
        let conn = open_memory_database().unwrap();
        let store = MemoryStore::default();
        let ledger = ScriptedLedger::new(RegisterScript::Fail);
        let extractor = FixedExtractor(Ok(raw_medicines()));

        let result = run_upload(&conn, &extractor, &store, &ledger, &user(), request());
        assert!(matches!(result, Err(UploadError::Ledger(_))));

        // No partial state: no row, no file, no hash.
        assert!(fetch_prescriptions_for_user(&conn, &user()).unwrap().is_empty());
        assert!(store.objects.borrow().is_empty());
        assert!(ledger.registered.borrow().is_empty());
    }

    #[test]
    fn extraction_failure_degrades_to_empty_list() {
        let conn = open_memory_database().unwrap();
        let store = MemoryStore::default();
        let ledger = ScriptedLedger::new(RegisterScript::Normal);
        let extractor = FixedExtractor(Err(()));

        let outcome =
            run_upload(&conn, &extractor, &store, &ledger, &user(), request()).unwrap();
        let UploadOutcome::Created(prescription) = outcome else {
            panic!("expected Created");
        };
        assert!(prescription.medicines.is_empty());
        assert_eq!(prescription.extracted_date, None);
    }

    #[test]
    fn validation_happens_before_collaborators() {
        let conn = open_memory_database().unwrap();
        let store = MemoryStore::default();
        let ledger = ScriptedLedger::new(RegisterScript::Normal);
        let extractor = FixedExtractor(Ok(raw_medicines()));

        let mut bad = request();
        bad.doctor_name = "   ".to_string();
        assert!(matches!(
            run_upload(&conn, &extractor, &store, &ledger, &user(), bad),
            Err(UploadError::Validation(_))
        ));

        let mut empty_file = request();
        empty_file.file_bytes.clear();
        assert!(matches!(
            run_upload(&conn, &extractor, &store, &ledger, &user(), empty_file),
            Err(UploadError::Validation(_))
        ));

        assert!(store.objects.borrow().is_empty());
    }
}
