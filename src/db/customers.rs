use rusqlite::{params, OptionalExtension};

use super::*;
use crate::types::{Customer, RecontactProbability, RejectionReason};

const CUSTOMER_COLUMNS: &str = "id, name, birthday, phone, customer_type, tags, archived,
     rejection_reason, rejection_notes, rejection_date, recontact_probability,
     next_follow_up_date, consultations, call_history, created_at, updated_at";

fn row_to_customer(row: &rusqlite::Row<'_>) -> rusqlite::Result<Customer> {
    Ok(Customer {
        id: row.get(0)?,
        name: row.get(1)?,
        birthday: opt_date_from_row(row, 2)?,
        phone: row.get(3)?,
        customer_type: row.get(4)?,
        tags: json_from_row(row, 5)?,
        archived: row.get::<_, i32>(6)? != 0,
        rejection_reason: enum_from_row::<RejectionReason>(row, 7)?,
        rejection_notes: row.get(8)?,
        rejection_date: opt_date_from_row(row, 9)?,
        recontact_probability: enum_from_row::<RecontactProbability>(row, 10)?,
        next_follow_up_date: opt_date_from_row(row, 11)?,
        consultations: json_from_row(row, 12)?,
        call_history: json_from_row(row, 13)?,
        created_at: timestamp_from_row(row, 14)?,
        updated_at: timestamp_from_row(row, 15)?,
    })
}

impl CrmDb {
    // =========================================================================
    // Customers
    // =========================================================================

    /// Insert or replace a customer, embedded history included.
    pub fn upsert_customer(&self, customer: &Customer) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO customers (
                id, name, birthday, phone, customer_type, tags, archived,
                rejection_reason, rejection_notes, rejection_date, recontact_probability,
                next_follow_up_date, consultations, call_history, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                birthday = excluded.birthday,
                phone = excluded.phone,
                customer_type = excluded.customer_type,
                tags = excluded.tags,
                archived = excluded.archived,
                rejection_reason = excluded.rejection_reason,
                rejection_notes = excluded.rejection_notes,
                rejection_date = excluded.rejection_date,
                recontact_probability = excluded.recontact_probability,
                next_follow_up_date = excluded.next_follow_up_date,
                consultations = excluded.consultations,
                call_history = excluded.call_history,
                updated_at = excluded.updated_at",
            params![
                customer.id,
                customer.name,
                opt_date_to_sql(customer.birthday),
                customer.phone,
                customer.customer_type,
                json_to_sql(&customer.tags)?,
                customer.archived as i32,
                customer.rejection_reason.map(|r| r.as_str()),
                customer.rejection_notes,
                opt_date_to_sql(customer.rejection_date),
                customer.recontact_probability.map(|p| p.as_str()),
                opt_date_to_sql(customer.next_follow_up_date),
                json_to_sql(&customer.consultations)?,
                json_to_sql(&customer.call_history)?,
                customer.created_at.to_rfc3339(),
                customer.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_customer(&self, id: &str) -> Result<Option<Customer>, DbError> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1");
        let customer = self
            .conn
            .query_row(&sql, params![id], row_to_customer)
            .optional()?;
        Ok(customer)
    }

    /// All customers, optionally including archived ones, ordered by name.
    pub fn get_customers(&self, include_archived: bool) -> Result<Vec<Customer>, DbError> {
        let sql = if include_archived {
            format!("SELECT {CUSTOMER_COLUMNS} FROM customers ORDER BY name, created_at")
        } else {
            format!(
                "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE archived = 0
                 ORDER BY name, created_at"
            )
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_customer)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Non-archived customers whose name matches exactly (after trimming).
    pub fn find_customers_by_name(&self, name: &str) -> Result<Vec<Customer>, DbError> {
        let sql = format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers
             WHERE archived = 0 AND TRIM(name) = TRIM(?1)
             ORDER BY created_at"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![name], row_to_customer)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Non-archived customers matching both name and birthday.
    pub fn find_customers_by_name_and_birthday(
        &self,
        name: &str,
        birthday: chrono::NaiveDate,
    ) -> Result<Vec<Customer>, DbError> {
        let sql = format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers
             WHERE archived = 0 AND TRIM(name) = TRIM(?1) AND birthday = ?2
             ORDER BY created_at"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![name, date_to_sql(birthday)], row_to_customer)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use crate::db::test_utils::test_db;
    use crate::types::{Consultation, MeetingType};

    use super::*;

    #[test]
    fn test_upsert_round_trips_embedded_history() {
        let db = test_db();
        let mut c = Customer::new("김민준", Utc::now());
        c.birthday = NaiveDate::from_ymd_opt(1990, 4, 12);
        c.tags = vec!["VIP".into()];
        c.rejection_reason = Some(RejectionReason::Price);
        c.consultations.push(Consultation {
            id: "k1".into(),
            date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            meeting_type: MeetingType::Ap,
            notes: "첫 상담".into(),
        });
        db.upsert_customer(&c).unwrap();

        let loaded = db.get_customer(&c.id).unwrap().unwrap();
        assert_eq!(loaded.birthday, c.birthday);
        assert_eq!(loaded.tags, c.tags);
        assert_eq!(loaded.rejection_reason, Some(RejectionReason::Price));
        assert_eq!(loaded.consultations.len(), 1);

        c.name = "김민준2".into();
        db.upsert_customer(&c).unwrap();
        assert_eq!(db.get_customer(&c.id).unwrap().unwrap().name, "김민준2");
    }

    #[test]
    fn test_name_lookup_excludes_archived() {
        let db = test_db();
        let active = Customer::new("이서연", Utc::now());
        let mut archived = Customer::new("이서연", Utc::now());
        archived.archived = true;
        db.upsert_customer(&active).unwrap();
        db.upsert_customer(&archived).unwrap();

        let found = db.find_customers_by_name("이서연").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, active.id);
        assert_eq!(db.get_customers(true).unwrap().len(), 2);
    }

    #[test]
    fn test_name_and_birthday_lookup() {
        let db = test_db();
        let mut a = Customer::new("김민준", Utc::now());
        a.birthday = NaiveDate::from_ymd_opt(1990, 1, 1);
        let mut b = Customer::new("김민준", Utc::now());
        b.birthday = NaiveDate::from_ymd_opt(1985, 6, 30);
        db.upsert_customer(&a).unwrap();
        db.upsert_customer(&b).unwrap();

        let found = db
            .find_customers_by_name_and_birthday("김민준", NaiveDate::from_ymd_opt(1985, 6, 30).unwrap())
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, b.id);
    }
}
