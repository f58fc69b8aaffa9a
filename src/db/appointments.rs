use rusqlite::{params, OptionalExtension};

use super::*;
use crate::types::{Appointment, AppointmentStatus, MeetingType, RecurrenceRule};

const APPOINTMENT_COLUMNS: &str = "id, date, time, end_time, meeting_type, title, customer_id,
     customer_name, status, recurrence, notes, location, summary, keywords,
     action_items, created_at, updated_at";

fn row_to_appointment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Appointment> {
    let meeting_type: String = row.get(4)?;
    let status = enum_from_row::<AppointmentStatus>(row, 8)?.unwrap_or_default();
    let recurrence: Option<RecurrenceRule> = json_from_row(row, 9)?;
    Ok(Appointment {
        id: row.get(0)?,
        date: date_from_row(row, 1)?,
        time: time_from_row(row, 2)?,
        end_time: opt_time_from_row(row, 3)?,
        meeting_type: MeetingType::from(meeting_type),
        title: row.get(5)?,
        customer_id: row.get(6)?,
        customer_name: row.get(7)?,
        status,
        recurrence,
        notes: row.get::<_, Option<String>>(10)?.unwrap_or_default(),
        location: row.get(11)?,
        summary: row.get(12)?,
        keywords: json_from_row(row, 13)?,
        action_items: json_from_row(row, 14)?,
        created_at: timestamp_from_row(row, 15)?,
        updated_at: timestamp_from_row(row, 16)?,
    })
}

impl CrmDb {
    // =========================================================================
    // Appointments
    // =========================================================================

    /// Insert a new appointment row.
    pub fn insert_appointment(&self, appt: &Appointment) -> Result<(), DbError> {
        let recurrence = match &appt.recurrence {
            Some(rule) => Some(json_to_sql(rule)?),
            None => None,
        };
        self.conn.execute(
            "INSERT INTO appointments (
                id, date, time, end_time, meeting_type, title, customer_id,
                customer_name, status, recurrence, notes, location, summary,
                keywords, action_items, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                appt.id,
                date_to_sql(appt.date),
                time_to_sql(appt.time),
                appt.end_time.map(time_to_sql),
                appt.meeting_type.as_str(),
                appt.title,
                appt.customer_id,
                appt.customer_name,
                appt.status.as_str(),
                recurrence,
                appt.notes,
                appt.location,
                appt.summary,
                json_to_sql(&appt.keywords)?,
                json_to_sql(&appt.action_items)?,
                appt.created_at.to_rfc3339(),
                appt.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Replace every column of an existing appointment. Returns false when
    /// no row has that id.
    pub fn update_appointment(&self, appt: &Appointment) -> Result<bool, DbError> {
        let recurrence = match &appt.recurrence {
            Some(rule) => Some(json_to_sql(rule)?),
            None => None,
        };
        let changed = self.conn.execute(
            "UPDATE appointments SET
                date = ?2, time = ?3, end_time = ?4, meeting_type = ?5, title = ?6,
                customer_id = ?7, customer_name = ?8, status = ?9, recurrence = ?10,
                notes = ?11, location = ?12, summary = ?13, keywords = ?14,
                action_items = ?15, updated_at = ?16
             WHERE id = ?1",
            params![
                appt.id,
                date_to_sql(appt.date),
                time_to_sql(appt.time),
                appt.end_time.map(time_to_sql),
                appt.meeting_type.as_str(),
                appt.title,
                appt.customer_id,
                appt.customer_name,
                appt.status.as_str(),
                recurrence,
                appt.notes,
                appt.location,
                appt.summary,
                json_to_sql(&appt.keywords)?,
                json_to_sql(&appt.action_items)?,
                appt.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(changed > 0)
    }

    /// Flip only the status column. Returns false when no row has that id.
    pub fn update_appointment_status(
        &self,
        id: &str,
        status: AppointmentStatus,
        updated_at: &str,
    ) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "UPDATE appointments SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, status.as_str(), updated_at],
        )?;
        Ok(changed > 0)
    }

    /// Look up a single appointment by its ID.
    pub fn get_appointment(&self, id: &str) -> Result<Option<Appointment>, DbError> {
        let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1");
        let appt = self
            .conn
            .query_row(&sql, params![id], row_to_appointment)
            .optional()?;
        Ok(appt)
    }

    /// All appointments ordered by anchor date and time.
    pub fn get_all_appointments(&self) -> Result<Vec<Appointment>, DbError> {
        let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments ORDER BY date, time");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_appointment)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Appointments in a given status, ordered by date and time.
    pub fn get_appointments_by_status(
        &self,
        status: AppointmentStatus,
    ) -> Result<Vec<Appointment>, DbError> {
        let sql = format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE status = ?1 ORDER BY date, time"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![status.as_str()], row_to_appointment)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Appointments linked to one customer, newest first.
    pub fn get_appointments_for_customer(
        &self,
        customer_id: &str,
    ) -> Result<Vec<Appointment>, DbError> {
        let sql = format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE customer_id = ?1
             ORDER BY date DESC, time DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![customer_id], row_to_appointment)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Delete an appointment (the whole series when recurring).
    pub fn delete_appointment(&self, id: &str) -> Result<bool, DbError> {
        let changed = self
            .conn
            .execute("DELETE FROM appointments WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}
