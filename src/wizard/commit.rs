use chrono::{DateTime, Utc};

use super::{WizardEffects, WizardKind, WizardOrigin, WizardOutcome};
use crate::appointments::{insert_draft, load_appointment};
use crate::db::CrmDb;
use crate::error::CrmError;
use crate::performance::{associate_in, AssociationMode};
use crate::status::{apply_status_in, check_transition};
use crate::types::{
    AppointmentStatus, Consultation, MeetingType, PerformanceRecord, REJECTED_CUSTOMER_TAG,
};

/// Apply a confirmed wizard outcome.
///
/// All effects run in one transaction: the origin goes to `completed`, a
/// consultation is prepended to the customer's history, and the branch's
/// own writes follow. If any write fails nothing is kept and the origin
/// stays `scheduled`.
pub fn commit_wizard(
    db: &CrmDb,
    kind: WizardKind,
    outcome: &WizardOutcome,
    origin: &WizardOrigin,
    now: DateTime<Utc>,
) -> Result<WizardEffects, CrmError> {
    if !kind.allows(outcome.kind()) {
        return Err(CrmError::WizardOutcomeNotAllowed {
            kind: kind.to_string(),
            outcome: outcome.kind().as_str().to_string(),
        });
    }
    outcome.validate()?;

    let effects = db.with_transaction(|tx| apply_outcome(tx, kind, outcome, origin, now))?;

    log::info!(
        "{} wizard committed '{}' for appointment {} (customer {})",
        kind,
        outcome.kind().as_str(),
        origin.appointment_id(),
        effects.customer.id
    );
    Ok(effects)
}

fn apply_outcome(
    tx: &CrmDb,
    kind: WizardKind,
    outcome: &WizardOutcome,
    origin: &WizardOrigin,
    now: DateTime<Utc>,
) -> Result<WizardEffects, CrmError> {
    // Re-read inside the transaction so a stale origin cannot be completed twice.
    let stored = load_appointment(tx, origin.appointment_id())?;
    check_transition(stored.status, AppointmentStatus::Completed)?;

    let customer_id = stored.customer_id.clone().ok_or_else(|| {
        CrmError::Validation(format!("Appointment {} has no customer", stored.id))
    })?;
    let mut customer = tx
        .get_customer(&customer_id)?
        .ok_or_else(|| CrmError::not_found("Customer", customer_id.clone()))?;

    let occurrence = origin.occurrence_date.filter(|_| stored.is_recurring());
    let appointment = apply_status_in(tx, &stored, occurrence, AppointmentStatus::Completed)?;

    let notes = outcome.consultation_notes().trim();
    let consultation = if notes.is_empty() {
        None
    } else {
        let entry = Consultation {
            id: uuid::Uuid::new_v4().to_string(),
            date: appointment.date,
            meeting_type: appointment.meeting_type.clone(),
            notes: notes.to_string(),
        };
        customer.push_consultation(entry.clone());
        Some(entry)
    };

    let mut performance = None;
    let mut next_appointment = None;

    match outcome {
        WizardOutcome::Success {
            performance: input, ..
        } => {
            let mut record = PerformanceRecord {
                id: uuid::Uuid::new_v4().to_string(),
                contractor_name: customer.name.clone(),
                dob: customer.birthday,
                application_date: input.application_date,
                premium: input.premium,
                insurance_company: input.insurance_company.trim().to_string(),
                product_name: input.product_name.trim().to_string(),
                recognized_performance: input.recognized_performance,
                coverage_category: input.coverage_category.clone(),
                customer_id: None,
                created_at: now,
            };
            tx.insert_performance_record(&record)?;
            associate_in(
                tx,
                &record,
                Some(&customer.id),
                customer.customer_type.as_deref(),
                AssociationMode::Single,
            )?;
            record.customer_id = Some(customer.id.clone());
            performance = Some(record);
        }
        WizardOutcome::Positive { pc_appointment, .. } => {
            let mut draft = pc_appointment.clone();
            draft.meeting_type = Some(MeetingType::Pc);
            draft.customer_id = Some(customer.id.clone());
            draft.customer_name = Some(customer.name.clone());
            draft.recurrence = None;
            draft.status = None;
            next_appointment = Some(insert_draft(tx, draft)?);
        }
        WizardOutcome::Rejection { rejection, .. } => {
            customer.add_tag(REJECTED_CUSTOMER_TAG);
            customer.rejection_reason = Some(rejection.reason);
            customer.rejection_notes =
                Some(rejection.notes.trim().to_string()).filter(|n| !n.is_empty());
            customer.rejection_date = Some(appointment.date);
            customer.recontact_probability = Some(rejection.recontact_probability);
            if rejection.next_follow_up_date.is_some() {
                customer.next_follow_up_date = rejection.next_follow_up_date;
            }
        }
        WizardOutcome::FollowUp {
            appointment: draft, ..
        } => {
            let mut draft = draft.clone();
            if draft.meeting_type.is_none() {
                draft.meeting_type = Some(match kind {
                    WizardKind::Pc => MeetingType::Pc,
                    WizardKind::Ap => MeetingType::Ap,
                });
            }
            draft.customer_id = Some(customer.id.clone());
            draft.customer_name = Some(customer.name.clone());
            draft.recurrence = None;
            draft.status = None;
            next_appointment = Some(insert_draft(tx, draft)?);
        }
        WizardOutcome::Simple { .. } => {}
    }

    customer.updated_at = now;
    tx.upsert_customer(&customer)?;

    Ok(WizardEffects {
        appointment,
        customer,
        consultation,
        performance,
        next_appointment,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::*;
    use crate::appointments::create_appointment;
    use crate::db::test_utils::test_db;
    use crate::types::{
        Appointment, AppointmentDraft, Customer, Frequency, RecontactProbability, RecurrenceRule,
        RejectionReason,
    };
    use crate::wizard::{PerformanceInput, RejectionInput, WizardSession};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn seed(db: &CrmDb, meeting_type: MeetingType) -> (Customer, Appointment) {
        let mut customer = Customer::new("김민준", Utc::now());
        customer.birthday = Some(d(1988, 7, 1));
        db.upsert_customer(&customer).unwrap();
        let mut draft = AppointmentDraft::new(d(2026, 3, 2), NaiveTime::from_hms_opt(14, 0, 0).unwrap());
        draft.meeting_type = Some(meeting_type);
        draft.customer_id = Some(customer.id.clone());
        draft.customer_name = Some(customer.name.clone());
        let appt = create_appointment(db, draft).unwrap();
        (customer, appt)
    }

    fn rejection() -> WizardOutcome {
        WizardOutcome::Rejection {
            rejection: RejectionInput {
                reason: RejectionReason::Price,
                recontact_probability: RecontactProbability::Medium,
                notes: "보험료 부담".into(),
                next_follow_up_date: Some(d(2026, 9, 1)),
            },
            consultation_notes: "가족과 상의 후 거절".into(),
        }
    }

    #[test]
    fn test_rejection_updates_customer_and_completes() {
        let db = test_db();
        let (customer, appt) = seed(&db, MeetingType::Ap);
        let origin = WizardOrigin::new(appt.clone(), None);

        let effects = commit_wizard(&db, WizardKind::Ap, &rejection(), &origin, Utc::now()).unwrap();
        assert_eq!(effects.appointment.status, AppointmentStatus::Completed);

        let stored = db.get_customer(&customer.id).unwrap().unwrap();
        assert!(stored.has_tag(REJECTED_CUSTOMER_TAG));
        assert_eq!(stored.rejection_reason, Some(RejectionReason::Price));
        assert_eq!(stored.rejection_date, Some(d(2026, 3, 2)));
        assert_eq!(stored.next_follow_up_date, Some(d(2026, 9, 1)));
        assert_eq!(stored.consultations[0].notes, "가족과 상의 후 거절");
        assert_eq!(
            db.get_appointment(&appt.id).unwrap().unwrap().status,
            AppointmentStatus::Completed
        );
    }

    #[test]
    fn test_failed_customer_write_rolls_back_everything() {
        let db = test_db();
        let (customer, appt) = seed(&db, MeetingType::Pc);
        db.conn_ref()
            .execute_batch(
                "CREATE TRIGGER fail_customer_update BEFORE UPDATE ON customers
                 BEGIN SELECT RAISE(ABORT, 'injected failure'); END;",
            )
            .unwrap();

        let origin = WizardOrigin::new(appt.clone(), None);
        let result = commit_wizard(&db, WizardKind::Pc, &rejection(), &origin, Utc::now());
        assert!(matches!(result, Err(CrmError::Storage(_))));

        let stored_appt = db.get_appointment(&appt.id).unwrap().unwrap();
        assert_eq!(stored_appt.status, AppointmentStatus::Scheduled);
        let stored_customer = db.get_customer(&customer.id).unwrap().unwrap();
        assert_eq!(stored_customer, customer);
    }

    #[test]
    fn test_pc_success_creates_linked_performance_record() {
        let db = test_db();
        let (customer, appt) = seed(&db, MeetingType::Pc);
        let outcome = WizardOutcome::Success {
            performance: PerformanceInput {
                application_date: d(2026, 3, 2),
                insurance_company: "삼성생명".into(),
                product_name: "종신보험".into(),
                premium: 150_000,
                recognized_performance: 300_000,
                coverage_category: Some("종신".into()),
            },
            consultation_notes: "청약 완료".into(),
        };
        let effects = commit_wizard(
            &db,
            WizardKind::Pc,
            &outcome,
            &WizardOrigin::new(appt, None),
            Utc::now(),
        )
        .unwrap();

        let record = effects.performance.expect("performance record");
        let stored = db.get_performance_record(&record.id).unwrap().unwrap();
        assert_eq!(stored.customer_id.as_deref(), Some(customer.id.as_str()));
        assert_eq!(stored.contractor_name, "김민준");
        assert_eq!(stored.dob, Some(d(1988, 7, 1)));
    }

    #[test]
    fn test_ap_positive_books_pc_meeting() {
        let db = test_db();
        let (customer, appt) = seed(&db, MeetingType::Ap);
        let mut pc = AppointmentDraft::new(d(2026, 3, 9), NaiveTime::from_hms_opt(15, 0, 0).unwrap());
        pc.meeting_type = Some(MeetingType::Ta);
        let outcome = WizardOutcome::Positive {
            pc_appointment: pc,
            consultation_notes: String::new(),
        };
        let effects = commit_wizard(
            &db,
            WizardKind::Ap,
            &outcome,
            &WizardOrigin::new(appt, None),
            Utc::now(),
        )
        .unwrap();

        let next = effects.next_appointment.expect("pc booked");
        assert_eq!(next.meeting_type, MeetingType::Pc);
        assert_eq!(next.customer_id.as_deref(), Some(customer.id.as_str()));
        assert_eq!(next.status, AppointmentStatus::Scheduled);
        assert!(effects.consultation.is_none());
    }

    #[test]
    fn test_disallowed_outcome_writes_nothing() {
        let db = test_db();
        let (_, appt) = seed(&db, MeetingType::Pc);
        let outcome = WizardOutcome::Simple {
            consultation_notes: "x".into(),
        };
        let err = commit_wizard(
            &db,
            WizardKind::Pc,
            &outcome,
            &WizardOrigin::new(appt.clone(), None),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, CrmError::WizardOutcomeNotAllowed { .. }));
        assert_eq!(
            db.get_appointment(&appt.id).unwrap().unwrap().status,
            AppointmentStatus::Scheduled
        );
    }

    #[test]
    fn test_completed_origin_cannot_be_committed_twice() {
        let db = test_db();
        let (_, appt) = seed(&db, MeetingType::Ap);
        let origin = WizardOrigin::new(appt, None);
        let simple = WizardOutcome::Simple {
            consultation_notes: "1차".into(),
        };
        commit_wizard(&db, WizardKind::Ap, &simple, &origin, Utc::now()).unwrap();
        let err = commit_wizard(&db, WizardKind::Ap, &simple, &origin, Utc::now()).unwrap_err();
        assert!(matches!(err, CrmError::InvalidTransition { .. }));
    }

    #[test]
    fn test_session_commit_on_series_occurrence_detaches() {
        let db = test_db();
        let customer = Customer::new("이서연", Utc::now());
        db.upsert_customer(&customer).unwrap();
        let mut draft = AppointmentDraft::new(d(2026, 3, 2), NaiveTime::from_hms_opt(11, 0, 0).unwrap());
        draft.meeting_type = Some(MeetingType::Ap);
        draft.customer_id = Some(customer.id.clone());
        draft.customer_name = Some(customer.name.clone());
        draft.recurrence = Some(RecurrenceRule::new(Frequency::Monthly));
        let series = create_appointment(&db, draft).unwrap();

        let mut session =
            WizardSession::new(WizardKind::Ap, WizardOrigin::new(series.clone(), Some(d(2026, 4, 2))))
                .unwrap();
        session.select_outcome(crate::wizard::OutcomeKind::Simple).unwrap();
        session
            .enter_details(WizardOutcome::Simple {
                consultation_notes: "정기 점검".into(),
            })
            .unwrap();
        let effects = session.commit(&db).unwrap();

        assert_ne!(effects.appointment.id, series.id);
        assert_eq!(effects.appointment.date, d(2026, 4, 2));
        assert_eq!(effects.consultation.unwrap().date, d(2026, 4, 2));
        let base = db.get_appointment(&series.id).unwrap().unwrap();
        assert_eq!(base.status, AppointmentStatus::Scheduled);
        assert!(base.recurrence.unwrap().exceptions.contains(&d(2026, 4, 2)));
    }
}
