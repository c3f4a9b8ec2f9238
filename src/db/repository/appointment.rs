//! Appointment repository.

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{Appointment, UserId};

const DATE_FMT: &str = "%Y-%m-%d";

pub fn insert_appointment(
    conn: &Connection,
    user: &UserId,
    appointment: &Appointment,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (id, user_id, doctor_name, date, time, location, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))",
        params![
            appointment.id.to_string(),
            user.as_str(),
            appointment.doctor_name,
            appointment.date.format(DATE_FMT).to_string(),
            appointment.time,
            appointment.location,
        ],
    )?;
    Ok(())
}

/// Appointments on or after `today`, soonest first.
pub fn fetch_upcoming_appointments(
    conn: &Connection,
    user: &UserId,
    today: NaiveDate,
    limit: u32,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, doctor_name, date, time, location
         FROM appointments
         WHERE user_id = ?1 AND date >= ?2
         ORDER BY date ASC, time ASC
         LIMIT ?3",
    )?;
    let rows = stmt
        .query_map(
            params![user.as_str(), today.format(DATE_FMT).to_string(), limit],
            |row| {
                Ok(Appointment {
                    id: row
                        .get::<_, String>(0)?
                        .parse()
                        .unwrap_or_else(|_| Uuid::nil()),
                    doctor_name: row.get(1)?,
                    date: NaiveDate::parse_from_str(&row.get::<_, String>(2)?, DATE_FMT)
                        .unwrap_or_default(),
                    time: row.get(3)?,
                    location: row.get(4)?,
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn user() -> UserId {
        UserId("user-1".to_string())
    }

    fn appointment(doctor: &str, date: NaiveDate, time: Option<&str>) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            doctor_name: doctor.to_string(),
            date,
            time: time.map(String::from),
            location: None,
        }
    }

    #[test]
    fn upcoming_excludes_past_and_sorts() {
        let conn = open_memory_database().unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();

        insert_appointment(
            &conn,
            &user(),
            &appointment("Dr. Past", NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(), None),
        )
        .unwrap();
        insert_appointment(
            &conn,
            &user(),
            &appointment("Dr. Later", NaiveDate::from_ymd_opt(2024, 1, 20).unwrap(), None),
        )
        .unwrap();
        insert_appointment(
            &conn,
            &user(),
            &appointment("Dr. Soon", today, Some("09:00")),
        )
        .unwrap();

        let upcoming = fetch_upcoming_appointments(&conn, &user(), today, 10).unwrap();
        assert_eq!(upcoming.len(), 2);
        assert_eq!(upcoming[0].doctor_name, "Dr. Soon");
        assert_eq!(upcoming[1].doctor_name, "Dr. Later");
    }

    #[test]
    fn upcoming_scoped_to_user() {
        let conn = open_memory_database().unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        insert_appointment(
            &conn,
            &user(),
            &appointment("Dr. Mine", today, None),
        )
        .unwrap();

        let other =
            fetch_upcoming_appointments(&conn, &UserId("user-2".into()), today, 10).unwrap();
        assert!(other.is_empty());
    }
}
