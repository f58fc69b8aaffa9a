//! Past-due reconciliation.
//!
//! Customer appointments still `scheduled` after their date are gathered
//! into one review list when the app loads. The review is shown at most
//! once per session.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::appointments::load_appointment;
use crate::db::CrmDb;
use crate::error::CrmError;
use crate::status::check_transition;
use crate::types::{Appointment, AppointmentStatus};

/// Scheduled, customer-linked, non-recurring appointments dated before `today`,
/// oldest first.
///
/// Personal memos are left out. So are series: their status describes the
/// whole series, not a past instance.
pub fn reconcile_past_scheduled(appointments: &[Appointment], today: NaiveDate) -> Vec<Appointment> {
    let mut due: Vec<Appointment> = appointments
        .iter()
        .filter(|a| a.status == AppointmentStatus::Scheduled)
        .filter(|a| a.customer_id.is_some())
        .filter(|a| !a.is_recurring())
        .filter(|a| a.date < today)
        .cloned()
        .collect();
    due.sort_by(|a, b| (a.date, a.time).cmp(&(b.date, b.time)));
    due
}

/// Shown-once latch for the review.
#[derive(Debug, Default)]
pub struct ReconciliationGate {
    shown: bool,
}

impl ReconciliationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_been_shown(&self) -> bool {
        self.shown
    }

    /// The list to show now, if any. Once a non-empty list has been returned
    /// this always yields `None`.
    pub fn check(&mut self, appointments: &[Appointment], today: NaiveDate) -> Option<Vec<Appointment>> {
        if self.shown {
            return None;
        }
        let due = reconcile_past_scheduled(appointments, today);
        if due.is_empty() {
            return None;
        }
        self.shown = true;
        log::info!("{} past appointments need a status", due.len());
        Some(due)
    }
}

/// The status picked for one reviewed appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationDecision {
    pub appointment_id: String,
    pub status: AppointmentStatus,
}

/// Write every decision in one transaction. Leaving an item `scheduled` is
/// allowed and skipped. Returns the number of appointments changed.
pub fn apply_reconciliation(db: &CrmDb, decisions: &[ReconciliationDecision]) -> Result<usize, CrmError> {
    let changed = db.with_transaction(|tx| {
        let updated_at = Utc::now().to_rfc3339();
        let mut changed = 0;
        for decision in decisions {
            if decision.status == AppointmentStatus::Scheduled {
                continue;
            }
            let appt = load_appointment(tx, &decision.appointment_id)?;
            check_transition(appt.status, decision.status)?;
            tx.update_appointment_status(&appt.id, decision.status, &updated_at)?;
            changed += 1;
        }
        Ok::<_, CrmError>(changed)
    })?;
    log::info!("Reconciled {} past appointments", changed);
    Ok(changed)
}
