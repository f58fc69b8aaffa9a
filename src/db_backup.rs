//! Whole-store JSON export/import and SQLite hot backup.
//!
//! **Export**: a flat document with every collection plus `backupDate` and
//! `version`.
//!
//! **Import**: replaces the store's contents in one transaction. Documents
//! written by a newer build, or carrying an out-of-range repeat interval, are
//! refused.
//!
//! **Hot backup**: `rusqlite::backup::Backup` copy of the live database.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::CrmDb;
use crate::error::CrmError;
use crate::types::{Appointment, Customer, PerformanceRecord, MAX_RECURRENCE_INTERVAL};

/// Version of the export document this build writes.
pub const BACKUP_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub version: u32,
    pub backup_date: DateTime<Utc>,
    #[serde(default)]
    pub appointments: Vec<Appointment>,
    #[serde(default)]
    pub customers: Vec<Customer>,
    #[serde(default)]
    pub performance_records: Vec<PerformanceRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub appointments: usize,
    pub customers: usize,
    pub performance_records: usize,
}

pub fn export_backup(db: &CrmDb) -> Result<BackupDocument, CrmError> {
    Ok(BackupDocument {
        version: BACKUP_VERSION,
        backup_date: Utc::now(),
        appointments: db.get_all_appointments()?,
        customers: db.get_customers(true)?,
        performance_records: db.get_performance_records()?,
    })
}

pub fn export_backup_json(db: &CrmDb) -> Result<String, CrmError> {
    let doc = export_backup(db)?;
    serde_json::to_string_pretty(&doc)
        .map_err(|e| CrmError::Backup(format!("Failed to serialize backup: {}", e)))
}

/// Replace everything in the store with the document's contents.
pub fn import_backup(db: &CrmDb, doc: &BackupDocument) -> Result<ImportSummary, CrmError> {
    if doc.version > BACKUP_VERSION {
        return Err(CrmError::Backup(format!(
            "Backup version {} is newer than this build supports ({})",
            doc.version, BACKUP_VERSION
        )));
    }
    if let Some(appt) = doc.appointments.iter().find(|a| {
        a.recurrence
            .as_ref()
            .is_some_and(|rule| !rule.interval_in_range())
    }) {
        return Err(CrmError::Backup(format!(
            "Appointment {} repeats with an interval above {}",
            appt.id, MAX_RECURRENCE_INTERVAL
        )));
    }

    let summary = db.with_transaction(|tx| {
        tx.clear_all()?;
        for customer in &doc.customers {
            tx.upsert_customer(customer)?;
        }
        for appt in &doc.appointments {
            tx.insert_appointment(appt)?;
        }
        for record in &doc.performance_records {
            tx.insert_performance_record(record)?;
        }
        Ok::<_, CrmError>(ImportSummary {
            appointments: doc.appointments.len(),
            customers: doc.customers.len(),
            performance_records: doc.performance_records.len(),
        })
    })?;

    log::info!(
        "Imported backup from {}: {} appointments, {} customers, {} performance records",
        doc.backup_date,
        summary.appointments,
        summary.customers,
        summary.performance_records
    );
    Ok(summary)
}

pub fn import_backup_json(db: &CrmDb, json: &str) -> Result<ImportSummary, CrmError> {
    let doc: BackupDocument = serde_json::from_str(json)
        .map_err(|e| CrmError::Backup(format!("Invalid backup file: {}", e)))?;
    import_backup(db, &doc)
}

/// Hot copy of the live database to `path`.
pub fn backup_database_to(db: &CrmDb, path: &Path) -> Result<PathBuf, CrmError> {
    let mut backup_conn = rusqlite::Connection::open(path)
        .map_err(|e| CrmError::Backup(format!("Failed to open backup file: {}", e)))?;

    let backup = rusqlite::backup::Backup::new(db.conn_ref(), &mut backup_conn)
        .map_err(|e| CrmError::Backup(format!("Failed to initialize backup: {}", e)))?;

    // Single step: the store is small.
    backup
        .step(-1)
        .map_err(|e| CrmError::Backup(format!("Backup failed: {}", e)))?;

    log::info!("Database backed up to {}", path.display());
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::*;
    use crate::appointments::create_appointment;
    use crate::db::test_utils::test_db;
    use crate::types::{AppointmentDraft, Frequency, RecurrenceRule};

    fn seed(db: &CrmDb) -> Customer {
        let customer = Customer::new("김민준", Utc::now());
        db.upsert_customer(&customer).unwrap();
        let mut draft = AppointmentDraft::new(
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        );
        draft.customer_id = Some(customer.id.clone());
        draft.customer_name = Some(customer.name.clone());
        let mut rule = RecurrenceRule::new(Frequency::Weekly).on_days(&[1, 4]);
        rule.exceptions.insert(NaiveDate::from_ymd_opt(2026, 3, 5).unwrap());
        draft.recurrence = Some(rule);
        create_appointment(db, draft).unwrap();
        customer
    }

    #[test]
    fn test_export_import_moves_everything() {
        let source = test_db();
        let customer = seed(&source);
        let json = export_backup_json(&source).unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], 1);
        assert!(value["backupDate"].is_string());
        assert!(value["performanceRecords"].is_array());

        let target = test_db();
        target.upsert_customer(&Customer::new("지워질 고객", Utc::now())).unwrap();
        let summary = import_backup_json(&target, &json).unwrap();
        assert_eq!(summary.customers, 1);
        assert_eq!(summary.appointments, 1);

        let customers = target.get_customers(true).unwrap();
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].id, customer.id);
        let appts = target.get_all_appointments().unwrap();
        assert_eq!(appts, source.get_all_appointments().unwrap());
    }

    #[test]
    fn test_newer_version_is_refused_without_changes() {
        let db = test_db();
        seed(&db);
        let mut doc = export_backup(&db).unwrap();
        doc.version = BACKUP_VERSION + 1;
        doc.appointments.clear();

        assert!(matches!(import_backup(&db, &doc), Err(CrmError::Backup(_))));
        assert_eq!(db.get_all_appointments().unwrap().len(), 1);
    }

    #[test]
    fn test_oversized_interval_is_refused_without_changes() {
        let db = test_db();
        seed(&db);
        let mut doc = export_backup(&db).unwrap();
        if let Some(rule) = doc.appointments[0].recurrence.as_mut() {
            rule.interval = i32::MAX;
        }
        doc.customers.clear();

        assert!(matches!(import_backup(&db, &doc), Err(CrmError::Backup(_))));
        assert_eq!(db.get_customers(true).unwrap().len(), 1);
        let stored = db.get_all_appointments().unwrap();
        assert_eq!(stored[0].recurrence.as_ref().unwrap().interval, 1);
    }

    #[test]
    fn test_hot_backup_creates_file() {
        let db = test_db();
        seed(&db);
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("agent-crm.db.bak");
        backup_database_to(&db, &path).unwrap();
        assert!(path.exists());

        let copy = rusqlite::Connection::open(&path).unwrap();
        let count: i64 = copy
            .query_row("SELECT COUNT(*) FROM appointments", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
