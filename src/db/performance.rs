use rusqlite::{params, OptionalExtension};

use super::*;
use crate::types::PerformanceRecord;

const PERFORMANCE_COLUMNS: &str = "id, contractor_name, dob, application_date, premium,
     insurance_company, product_name, recognized_performance, coverage_category,
     customer_id, created_at";

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<PerformanceRecord> {
    Ok(PerformanceRecord {
        id: row.get(0)?,
        contractor_name: row.get(1)?,
        dob: opt_date_from_row(row, 2)?,
        application_date: date_from_row(row, 3)?,
        premium: row.get(4)?,
        insurance_company: row.get(5)?,
        product_name: row.get(6)?,
        recognized_performance: row.get(7)?,
        coverage_category: row.get(8)?,
        customer_id: row.get(9)?,
        created_at: timestamp_from_row(row, 10)?,
    })
}

impl CrmDb {
    // =========================================================================
    // Performance records
    // =========================================================================

    pub fn insert_performance_record(&self, record: &PerformanceRecord) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO performance_records (
                id, contractor_name, dob, application_date, premium, insurance_company,
                product_name, recognized_performance, coverage_category, customer_id, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                record.id,
                record.contractor_name,
                opt_date_to_sql(record.dob),
                date_to_sql(record.application_date),
                record.premium,
                record.insurance_company,
                record.product_name,
                record.recognized_performance,
                record.coverage_category,
                record.customer_id,
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Link (or unlink) a record to a customer.
    pub fn set_performance_customer(
        &self,
        record_id: &str,
        customer_id: Option<&str>,
    ) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "UPDATE performance_records SET customer_id = ?2 WHERE id = ?1",
            params![record_id, customer_id],
        )?;
        Ok(changed > 0)
    }

    pub fn get_performance_record(&self, id: &str) -> Result<Option<PerformanceRecord>, DbError> {
        let sql = format!("SELECT {PERFORMANCE_COLUMNS} FROM performance_records WHERE id = ?1");
        let record = self
            .conn
            .query_row(&sql, params![id], row_to_record)
            .optional()?;
        Ok(record)
    }

    /// All records, newest application first.
    pub fn get_performance_records(&self) -> Result<Vec<PerformanceRecord>, DbError> {
        let sql = format!(
            "SELECT {PERFORMANCE_COLUMNS} FROM performance_records
             ORDER BY application_date DESC, created_at DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_record)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Records still waiting for a customer link.
    pub fn get_unassociated_performance_records(
        &self,
    ) -> Result<Vec<PerformanceRecord>, DbError> {
        let sql = format!(
            "SELECT {PERFORMANCE_COLUMNS} FROM performance_records
             WHERE customer_id IS NULL
             ORDER BY application_date DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_record)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}
