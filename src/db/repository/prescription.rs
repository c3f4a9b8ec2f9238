//! Prescription repository.
//!
//! Prescriptions are written once, atomically with their medicines, and
//! never mutated. Deletion exists only as compensation for a failed upload
//! (the hash registration is the commit point — see the upload workflow).

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{DurationSpec, MedicineEntry, Prescription, UserId};
use crate::normalize::parse_frequency;

const DATE_FMT: &str = "%Y-%m-%d";
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Insert a prescription and its medicines in one transaction.
pub fn insert_prescription(
    conn: &Connection,
    user: &UserId,
    prescription: &Prescription,
) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "INSERT INTO prescriptions (
            id, user_id, doctor_name, hospital_name, form_date,
            extracted_date, notes, file_reference, content_hash, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            prescription.id.to_string(),
            user.as_str(),
            prescription.doctor_name,
            prescription.hospital_name,
            prescription.form_date.format(DATE_FMT).to_string(),
            prescription
                .extracted_date
                .map(|d| d.format(DATE_FMT).to_string()),
            prescription.notes,
            prescription.file_reference,
            prescription.content_hash,
            prescription.created_at.format(DATETIME_FMT).to_string(),
        ],
    )?;

    for (position, medicine) in prescription.medicines.iter().enumerate() {
        let (duration_kind, duration_days) = match medicine.duration {
            DurationSpec::Days(n) => ("days", Some(n)),
            DurationSpec::Indefinite => ("indefinite", None),
            DurationSpec::Unknown => ("unknown", None),
        };
        tx.execute(
            "INSERT INTO medicines (
                id, prescription_id, position, name, dosage, frequency,
                duration_kind, duration_days, prescribed_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                Uuid::new_v4().to_string(),
                prescription.id.to_string(),
                position as i64,
                medicine.name,
                medicine.dosage,
                medicine.frequency.as_ref().map(|f| f.canonical()),
                duration_kind,
                duration_days,
                medicine
                    .prescribed_date
                    .map(|d| d.format(DATE_FMT).to_string()),
            ],
        )?;
    }

    tx.commit()?;
    Ok(())
}

/// Fetch all of a user's prescriptions, newest first, medicines included.
pub fn fetch_prescriptions_for_user(
    conn: &Connection,
    user: &UserId,
) -> Result<Vec<Prescription>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, doctor_name, hospital_name, form_date, extracted_date,
                notes, file_reference, content_hash, created_at
         FROM prescriptions
         WHERE user_id = ?1
         ORDER BY created_at DESC",
    )?;

    let mut prescriptions = stmt
        .query_map(params![user.as_str()], |row| {
            Ok(Prescription {
                id: row
                    .get::<_, String>(0)?
                    .parse()
                    .unwrap_or_else(|_| Uuid::nil()),
                doctor_name: row.get(1)?,
                hospital_name: row.get(2)?,
                form_date: parse_stored_date(&row.get::<_, String>(3)?),
                extracted_date: row
                    .get::<_, Option<String>>(4)?
                    .and_then(|s| NaiveDate::parse_from_str(&s, DATE_FMT).ok()),
                notes: row.get(5)?,
                file_reference: row.get(6)?,
                content_hash: row.get(7)?,
                created_at: NaiveDateTime::parse_from_str(
                    &row.get::<_, String>(8)?,
                    DATETIME_FMT,
                )
                .unwrap_or_default(),
                medicines: Vec::new(), // filled below
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    for prescription in prescriptions.iter_mut() {
        prescription.medicines = fetch_medicines(conn, &prescription.id)?;
    }

    Ok(prescriptions)
}

fn parse_stored_date(s: &str) -> NaiveDate {
    // form_date is validated before insert; a corrupt row degrades to the
    // epoch date, which the status engine then classifies as completed.
    NaiveDate::parse_from_str(s, DATE_FMT).unwrap_or_default()
}

fn fetch_medicines(
    conn: &Connection,
    prescription_id: &Uuid,
) -> Result<Vec<MedicineEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT name, dosage, frequency, duration_kind, duration_days, prescribed_date
         FROM medicines
         WHERE prescription_id = ?1
         ORDER BY position ASC",
    )?;

    let rows = stmt
        .query_map(params![prescription_id.to_string()], |row| {
            let duration_kind: String = row.get(3)?;
            let duration_days: Option<u32> = row.get(4)?;
            let duration = match (duration_kind.as_str(), duration_days) {
                ("days", Some(n)) => DurationSpec::Days(n),
                ("indefinite", _) => DurationSpec::Indefinite,
                _ => DurationSpec::Unknown,
            };
            Ok(MedicineEntry {
                name: row.get(0)?,
                dosage: row.get(1)?,
                frequency: row
                    .get::<_, Option<String>>(2)?
                    .map(|s| parse_frequency(&s)),
                duration,
                prescribed_date: row
                    .get::<_, Option<String>>(5)?
                    .and_then(|s| NaiveDate::parse_from_str(&s, DATE_FMT).ok()),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Remove a prescription and its medicines (compensation path only).
pub fn delete_prescription(conn: &Connection, prescription_id: &Uuid) -> Result<(), DatabaseError> {
    // medicines rows go with it via ON DELETE CASCADE
    conn.execute(
        "DELETE FROM prescriptions WHERE id = ?1",
        params![prescription_id.to_string()],
    )?;
    Ok(())
}

/// Count of a user's prescriptions, for dashboard stats.
pub fn count_prescriptions(conn: &Connection, user: &UserId) -> Result<u32, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM prescriptions WHERE user_id = ?1",
        params![user.as_str()],
        |row| row.get(0),
    )?;
    Ok(count)
}
