//! Appointment creation, validation and deletion.
//!
//! Drafts from forms and from the text extractor both land here. A draft
//! that names a customer not on the roster gets an unregistered placeholder
//! customer, created in the same transaction as the appointment.

use chrono::{NaiveDate, NaiveTime, Utc};

use crate::db::CrmDb;
use crate::error::CrmError;
use crate::recurrence::{self, LunarCalendar};
use crate::types::{
    Appointment, AppointmentDraft, AppointmentOccurrence, Customer, Frequency, RecurrenceRule,
    MAX_RECURRENCE_INTERVAL,
};

/// Parse a form date (`YYYY-MM-DD`). Empty input is a validation error.
pub fn parse_form_date(raw: &str) -> Result<NaiveDate, CrmError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CrmError::Validation("날짜를 입력하세요 (date is required)".into()));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|_| CrmError::Validation(format!("Invalid date: {trimmed}")))
}

/// Parse a form time (`HH:MM`). Empty input is a validation error.
pub fn parse_form_time(raw: &str) -> Result<NaiveTime, CrmError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CrmError::Validation("시간을 입력하세요 (time is required)".into()));
    }
    crate::types::parse_hhmm(trimmed)
        .map_err(|_| CrmError::Validation(format!("Invalid time: {trimmed}")))
}

fn validate_fields(
    date: NaiveDate,
    time: NaiveTime,
    end_time: Option<NaiveTime>,
    has_subject: bool,
    recurrence: Option<&RecurrenceRule>,
) -> Result<(), CrmError> {
    if let Some(end) = end_time {
        if end < time {
            return Err(CrmError::Validation(format!(
                "End time {} is earlier than start time {}",
                end.format("%H:%M"),
                time.format("%H:%M")
            )));
        }
    }
    if !has_subject {
        return Err(CrmError::Validation(
            "An appointment needs a customer or a title".into(),
        ));
    }
    if let Some(rule) = recurrence {
        if !rule.interval_in_range() {
            return Err(CrmError::Validation(format!(
                "Repeat interval {} is larger than {MAX_RECURRENCE_INTERVAL}",
                rule.interval
            )));
        }
        if let Some(end_date) = rule.end_date {
            if end_date < date {
                return Err(CrmError::Validation(format!(
                    "Recurrence ends ({end_date}) before the first date ({date})"
                )));
            }
        }
        if rule.is_lunar && rule.frequency != Frequency::Yearly {
            log::debug!("Lunar flag ignored on a non-yearly rule");
        }
    }
    Ok(())
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false)
}

/// Validate a draft before any write.
pub fn validate_draft(draft: &AppointmentDraft) -> Result<(), CrmError> {
    let has_subject =
        has_text(&draft.customer_id) || has_text(&draft.customer_name) || has_text(&draft.title);
    validate_fields(
        draft.date,
        draft.time,
        draft.end_time,
        has_subject,
        draft.recurrence.as_ref(),
    )
}

/// Validate a full record (used by series edits).
pub fn validate_appointment(appt: &Appointment) -> Result<(), CrmError> {
    let has_subject =
        has_text(&appt.customer_id) || has_text(&appt.customer_name) || has_text(&appt.title);
    validate_fields(
        appt.date,
        appt.time,
        appt.end_time,
        has_subject,
        appt.recurrence.as_ref(),
    )
}

/// Insert a validated draft without opening a transaction.
pub(crate) fn insert_draft(db: &CrmDb, draft: AppointmentDraft) -> Result<Appointment, CrmError> {
    validate_draft(&draft)?;
    let appt = Appointment::from_draft(draft, Utc::now());
    db.insert_appointment(&appt)?;
    log::info!(
        "Created {} appointment {} on {} {}",
        appt.meeting_type,
        appt.id,
        appt.date,
        appt.time.format("%H:%M")
    );
    Ok(appt)
}

/// Create an appointment from a draft that already carries its customer
/// reference (or none, for personal memos).
pub fn create_appointment(db: &CrmDb, draft: AppointmentDraft) -> Result<Appointment, CrmError> {
    db.with_transaction(|tx| insert_draft(tx, draft))
}

/// Result of saving a draft.
#[derive(Debug, Clone)]
pub struct SavedAppointment {
    pub appointment: Appointment,
    /// Placeholder customer synthesized for an unknown name.
    pub created_customer: Option<Customer>,
}

/// Save a reviewed draft (form or extractor output).
///
/// A free-text customer name is resolved against the roster here, at save
/// time: a single exact match is linked, no match creates an unregistered
/// placeholder, and several matches are rejected so the user picks one.
pub fn save_draft(db: &CrmDb, mut draft: AppointmentDraft) -> Result<SavedAppointment, CrmError> {
    validate_draft(&draft)?;
    db.with_transaction(|tx| {
        let mut created_customer = None;

        if draft.customer_id.is_none() {
            if let Some(name) = draft.customer_name.clone().filter(|n| !n.trim().is_empty()) {
                let name = name.trim().to_string();
                let matches = tx.find_customers_by_name(&name)?;
                match matches.len() {
                    0 => {
                        let placeholder = Customer::unregistered(name.clone(), Utc::now());
                        tx.upsert_customer(&placeholder)?;
                        log::info!("Created unregistered customer '{}' ({})", name, placeholder.id);
                        draft.customer_id = Some(placeholder.id.clone());
                        created_customer = Some(placeholder);
                    }
                    1 => draft.customer_id = Some(matches[0].id.clone()),
                    n => {
                        return Err(CrmError::Validation(format!(
                            "{n} customers are named '{name}'; pick one before saving"
                        )))
                    }
                }
                draft.customer_name = Some(name);
            }
        } else if let Some(id) = draft.customer_id.as_deref() {
            let customer = tx
                .get_customer(id)?
                .ok_or_else(|| CrmError::not_found("Customer", id))?;
            draft.customer_name = Some(customer.name);
        }

        let appointment = insert_draft(tx, draft)?;
        Ok(SavedAppointment {
            appointment,
            created_customer,
        })
    })
}

/// Delete an appointment. For a recurring record this removes the whole series.
pub fn delete_appointment(db: &CrmDb, id: &str) -> Result<(), CrmError> {
    if !db.delete_appointment(id)? {
        return Err(CrmError::not_found("Appointment", id));
    }
    log::info!("Deleted appointment {}", id);
    Ok(())
}

/// Load an appointment or fail with `NotFound`.
pub(crate) fn load_appointment(db: &CrmDb, id: &str) -> Result<Appointment, CrmError> {
    db.get_appointment(id)?
        .ok_or_else(|| CrmError::not_found("Appointment", id))
}

/// Calendar window over every stored appointment.
pub fn agenda(
    db: &CrmDb,
    from: NaiveDate,
    to: NaiveDate,
    lunar: Option<&dyn LunarCalendar>,
) -> Result<Vec<AppointmentOccurrence>, CrmError> {
    let all = db.get_all_appointments()?;
    Ok(recurrence::expand_all(&all, from, to, lunar))
}
