//! Telephone approach (TA) logging.
//!
//! A call is stored three ways at once: as an entry in the customer's call
//! history, as a completed TA appointment on the calendar, and, when the call
//! booked a meeting, as a new scheduled appointment.

use chrono::{NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::appointments::{insert_draft, validate_draft};
use crate::db::CrmDb;
use crate::error::CrmError;
use crate::types::{
    Appointment, AppointmentDraft, AppointmentStatus, CallOutcome, CallRecord, Customer,
    MeetingType,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallInput {
    pub date: NaiveDate,
    #[serde(with = "crate::types::hhmm")]
    pub time: NaiveTime,
    pub outcome: CallOutcome,
    #[serde(default)]
    pub notes: String,
    /// Meeting agreed on the phone. Only read when the outcome is `AppointmentSet`.
    #[serde(default)]
    pub booked_meeting: Option<AppointmentDraft>,
}

#[derive(Debug, Clone)]
pub struct CallLogged {
    pub customer: Customer,
    pub call: CallRecord,
    pub logged: Appointment,
    pub booked: Option<Appointment>,
}

pub fn record_call(db: &CrmDb, customer_id: &str, input: CallInput) -> Result<CallLogged, CrmError> {
    let booked_draft = match (input.outcome, input.booked_meeting) {
        (CallOutcome::AppointmentSet, Some(draft)) => Some(draft),
        (CallOutcome::AppointmentSet, None) => {
            return Err(CrmError::Validation(
                "A call that set an appointment needs the meeting date and time".into(),
            ))
        }
        (_, _) => None,
    };

    let result = db.with_transaction(|tx| {
        let mut customer = tx
            .get_customer(customer_id)?
            .ok_or_else(|| CrmError::not_found("Customer", customer_id))?;

        let call = CallRecord {
            id: uuid::Uuid::new_v4().to_string(),
            date: input.date,
            time: input.time,
            outcome: input.outcome,
            notes: input.notes.trim().to_string(),
        };
        customer.call_history.insert(0, call.clone());

        let mut ta = AppointmentDraft::new(input.date, input.time);
        ta.meeting_type = Some(MeetingType::Ta);
        ta.customer_id = Some(customer.id.clone());
        ta.customer_name = Some(customer.name.clone());
        ta.status = Some(AppointmentStatus::Completed);
        ta.notes = Some(format!("[전화] {}\n{}", input.outcome.label(), call.notes));
        let logged = insert_draft(tx, ta)?;

        let booked = match booked_draft {
            Some(mut draft) => {
                draft.meeting_type.get_or_insert(MeetingType::Ap);
                draft.customer_id = Some(customer.id.clone());
                draft.customer_name = Some(customer.name.clone());
                draft.status = None;
                validate_draft(&draft)?;
                Some(insert_draft(tx, draft)?)
            }
            None => None,
        };

        customer.updated_at = Utc::now();
        tx.upsert_customer(&customer)?;

        Ok::<_, CrmError>(CallLogged {
            customer,
            call,
            logged,
            booked,
        })
    })?;

    log::info!(
        "Logged call to {} ({})",
        result.customer.id,
        result.call.outcome.label()
    );
    Ok(result)
}
