//! Appointment status transitions.
//!
//! `scheduled` is the only source state. Completing an AP or PC meeting that
//! belongs to a customer is deferred to the completion wizard; every other
//! transition is applied at once and may come back with a follow-on offer
//! (a follow-up after completion, a reschedule after postponing).

use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::appointments::{insert_draft, load_appointment};
use crate::db::CrmDb;
use crate::error::CrmError;
use crate::series;
use crate::types::{Appointment, AppointmentDraft, AppointmentStatus, CrmConfig};
use crate::wizard::{WizardKind, WizardOrigin};

/// Which kind of follow-on appointment is being offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowOnKind {
    /// Offered after completing a non-wizard appointment.
    FollowUp,
    /// Offered after postponing.
    Reschedule,
}

impl FollowOnKind {
    fn note_label(&self) -> &'static str {
        match self {
            FollowOnKind::FollowUp => "[후속 일정]",
            FollowOnKind::Reschedule => "[연기된 일정]",
        }
    }
}

/// A pre-filled appointment the user may accept from the toast.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowOnOffer {
    pub kind: FollowOnKind,
    pub origin_id: String,
    pub draft: AppointmentDraft,
}

/// Build the offer for `origin`. Fields are carried forward; the notes point
/// back to the original date and time.
pub fn build_follow_on(kind: FollowOnKind, origin: &Appointment, config: &CrmConfig) -> FollowOnOffer {
    let offset = match kind {
        FollowOnKind::FollowUp => config.follow_up_offset_days,
        FollowOnKind::Reschedule => config.reschedule_offset_days,
    };
    let mut draft = AppointmentDraft::carried_from(origin, origin.date + Duration::days(offset));
    draft.notes = Some(format!(
        "{} 원본 일정: {} {}\n{}",
        kind.note_label(),
        origin.date,
        origin.time.format("%H:%M"),
        origin.notes
    ));
    FollowOnOffer {
        kind,
        origin_id: origin.id.clone(),
        draft,
    }
}

/// Result of a transition request.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// The status was written. `record` is the affected record (a freshly
    /// detached one when a single occurrence of a series was targeted).
    Immediate {
        record: Appointment,
        offer: Option<FollowOnOffer>,
    },
    /// Nothing was written; the wizard of `kind` must run for `origin`.
    WizardRequired {
        kind: WizardKind,
        origin: WizardOrigin,
    },
}

impl TransitionOutcome {
    pub fn is_immediate(&self) -> bool {
        matches!(self, TransitionOutcome::Immediate { .. })
    }

    pub fn wizard_required(&self) -> Option<WizardKind> {
        match self {
            TransitionOutcome::WizardRequired { kind, .. } => Some(*kind),
            TransitionOutcome::Immediate { .. } => None,
        }
    }
}

/// Reject anything that does not leave `scheduled` for a terminal state.
pub fn check_transition(from: AppointmentStatus, to: AppointmentStatus) -> Result<(), CrmError> {
    if from.is_terminal() || !to.is_terminal() {
        return Err(CrmError::InvalidTransition { from, to });
    }
    Ok(())
}

/// Request a status change on an appointment, or on one occurrence of a
/// series when `occurrence_date` is given.
pub fn request_status_transition(
    db: &CrmDb,
    appointment_id: &str,
    occurrence_date: Option<NaiveDate>,
    target: AppointmentStatus,
    config: &CrmConfig,
) -> Result<TransitionOutcome, CrmError> {
    let appt = load_appointment(db, appointment_id)?;
    check_transition(appt.status, target)?;

    let occurrence_date = occurrence_date.filter(|_| appt.is_recurring());

    if target == AppointmentStatus::Completed
        && appt.meeting_type.is_wizard_gated()
        && appt.customer_id.is_some()
    {
        let kind = if appt.meeting_type == crate::types::MeetingType::Pc {
            WizardKind::Pc
        } else {
            WizardKind::Ap
        };
        log::debug!("Completion of {} deferred to the {} wizard", appt.id, kind);
        return Ok(TransitionOutcome::WizardRequired {
            kind,
            origin: WizardOrigin::new(appt, occurrence_date),
        });
    }

    let record = db.with_transaction(|tx| apply_status_in(tx, &appt, occurrence_date, target))?;
    log::info!("Appointment {} is now {}", record.id, target);

    let offer = match target {
        AppointmentStatus::Completed => Some(build_follow_on(FollowOnKind::FollowUp, &record, config)),
        AppointmentStatus::Postponed => Some(build_follow_on(FollowOnKind::Reschedule, &record, config)),
        _ => None,
    };
    Ok(TransitionOutcome::Immediate { record, offer })
}

/// Write `target` onto `appt`, detaching the occurrence first when one date
/// of a series is targeted. Runs inside the caller's transaction.
pub(crate) fn apply_status_in(
    db: &CrmDb,
    appt: &Appointment,
    occurrence_date: Option<NaiveDate>,
    target: AppointmentStatus,
) -> Result<Appointment, CrmError> {
    if let Some(date) = occurrence_date {
        return series::detach_with_status_in(db, appt, date, target);
    }
    let now = Utc::now();
    if !db.update_appointment_status(&appt.id, target, &now.to_rfc3339())? {
        return Err(CrmError::not_found("Appointment", appt.id.clone()));
    }
    let mut record = appt.clone();
    record.status = target;
    record.updated_at = now;
    Ok(record)
}

/// Store an accepted follow-on offer as a new scheduled appointment.
pub fn accept_follow_on(db: &CrmDb, offer: FollowOnOffer) -> Result<Appointment, CrmError> {
    let created = db.with_transaction(|tx| insert_draft(tx, offer.draft))?;
    log::info!(
        "Accepted {:?} for {} as {}",
        offer.kind,
        offer.origin_id,
        created.id
    );
    Ok(created)
}
