//! Scheduling and follow-up core for insurance sales agents.
//!
//! Appointments (one-off and recurring), their status lifecycle, AP/PC
//! completion wizards, performance records and the free-text extractor, on
//! top of a local SQLite store.

pub mod appointments;
pub mod db;
pub mod db_backup;
pub mod error;
pub mod extract;
mod migrations;
pub mod performance;
pub mod reconcile;
pub mod recurrence;
pub mod series;
pub mod state;
pub mod status;
pub mod telephone;
pub mod toast;
pub mod types;
pub mod wizard;

pub use db::CrmDb;
pub use error::{CrmError, CrmErrorPayload};
pub use types::*;
