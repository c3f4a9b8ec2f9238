//! Record document repository — lab reports and bills.
//!
//! These documents carry no extracted structure; they are stored and listed
//! per user, newest upload first.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{DocumentKind, RecordDocument, UserId};

const DATE_FMT: &str = "%Y-%m-%d";
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

pub fn insert_document(
    conn: &Connection,
    user: &UserId,
    document: &RecordDocument,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO record_documents (
            id, user_id, kind, title, document_date, file_reference, uploaded_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            document.id.to_string(),
            user.as_str(),
            document.kind.as_str(),
            document.title,
            document
                .document_date
                .map(|d| d.format(DATE_FMT).to_string()),
            document.file_reference,
            document.uploaded_at.format(DATETIME_FMT).to_string(),
        ],
    )?;
    Ok(())
}

/// List a user's documents, optionally filtered by kind, newest first.
pub fn fetch_documents_for_user(
    conn: &Connection,
    user: &UserId,
    kind: Option<DocumentKind>,
    limit: u32,
) -> Result<Vec<RecordDocument>, DatabaseError> {
    let map_row = |row: &rusqlite::Row<'_>| {
        let kind_str: String = row.get(1)?;
        Ok(RecordDocument {
            id: row
                .get::<_, String>(0)?
                .parse()
                .unwrap_or_else(|_| Uuid::nil()),
            kind: DocumentKind::parse(&kind_str).unwrap_or(DocumentKind::Prescription),
            title: row.get(2)?,
            document_date: row
                .get::<_, Option<String>>(3)?
                .and_then(|s| NaiveDate::parse_from_str(&s, DATE_FMT).ok()),
            file_reference: row.get(4)?,
            uploaded_at: NaiveDateTime::parse_from_str(&row.get::<_, String>(5)?, DATETIME_FMT)
                .unwrap_or_default(),
        })
    };

    let rows = match kind {
        Some(k) => {
            let mut stmt = conn.prepare(
                "SELECT id, kind, title, document_date, file_reference, uploaded_at
                 FROM record_documents
                 WHERE user_id = ?1 AND kind = ?2
                 ORDER BY uploaded_at DESC LIMIT ?3",
            )?;
            let rows = stmt
                .query_map(params![user.as_str(), k.as_str(), limit], map_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT id, kind, title, document_date, file_reference, uploaded_at
                 FROM record_documents
                 WHERE user_id = ?1
                 ORDER BY uploaded_at DESC LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![user.as_str(), limit], map_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn user() -> UserId {
        UserId("user-1".to_string())
    }

    fn doc(kind: DocumentKind, title: &str, uploaded: &str) -> RecordDocument {
        RecordDocument {
            id: Uuid::new_v4(),
            kind,
            title: title.to_string(),
            document_date: NaiveDate::from_ymd_opt(2024, 1, 10),
            file_reference: format!("documents/{title}.pdf"),
            uploaded_at: NaiveDateTime::parse_from_str(uploaded, DATETIME_FMT).unwrap(),
        }
    }

    #[test]
    fn insert_and_list() {
        let conn = open_memory_database().unwrap();
        insert_document(
            &conn,
            &user(),
            &doc(DocumentKind::LabReport, "cbc", "2024-01-10 10:00:00"),
        )
        .unwrap();
        insert_document(
            &conn,
            &user(),
            &doc(DocumentKind::Bill, "invoice", "2024-01-12 10:00:00"),
        )
        .unwrap();

        let all = fetch_documents_for_user(&conn, &user(), None, 10).unwrap();
        assert_eq!(all.len(), 2);
        // Newest first
        assert_eq!(all[0].title, "invoice");
    }

    #[test]
    fn kind_filter_applies() {
        let conn = open_memory_database().unwrap();
        insert_document(
            &conn,
            &user(),
            &doc(DocumentKind::LabReport, "cbc", "2024-01-10 10:00:00"),
        )
        .unwrap();
        insert_document(
            &conn,
            &user(),
            &doc(DocumentKind::Bill, "invoice", "2024-01-12 10:00:00"),
        )
        .unwrap();

        let labs =
            fetch_documents_for_user(&conn, &user(), Some(DocumentKind::LabReport), 10).unwrap();
        assert_eq!(labs.len(), 1);
        assert_eq!(labs[0].kind, DocumentKind::LabReport);
    }

    #[test]
    fn listing_scoped_to_user() {
        let conn = open_memory_database().unwrap();
        insert_document(
            &conn,
            &user(),
            &doc(DocumentKind::Bill, "invoice", "2024-01-12 10:00:00"),
        )
        .unwrap();

        let other = fetch_documents_for_user(&conn, &UserId("user-2".into()), None, 10).unwrap();
        assert!(other.is_empty());
    }

    #[test]
    fn limit_respected() {
        let conn = open_memory_database().unwrap();
        for i in 0..5 {
            insert_document(
                &conn,
                &user(),
                &doc(
                    DocumentKind::Bill,
                    &format!("bill-{i}"),
                    &format!("2024-01-1{i} 10:00:00"),
                ),
            )
            .unwrap();
        }
        let limited = fetch_documents_for_user(&conn, &user(), None, 3).unwrap();
        assert_eq!(limited.len(), 3);
    }
}
