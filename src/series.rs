//! Edits on recurring series.
//!
//! Occurrence-level edits never touch the base record's `date` or `time`:
//! "delete this one" adds an exception, "this and following" moves the end
//! date, and "edit this one" detaches the occurrence into its own record.
//! Each edit is one write (or one transaction) against the base record.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::appointments::{insert_draft, load_appointment, validate_appointment};
use crate::db::CrmDb;
use crate::error::CrmError;
use crate::recurrence;
use crate::types::{Appointment, AppointmentDraft, AppointmentStatus, Frequency};

/// Check that `date` is a live occurrence of `appt`'s series.
///
/// Lunar yearly dates need a calendar to project, so for those only the
/// bounds and the exception list are checked.
fn ensure_in_series(appt: &Appointment, date: NaiveDate) -> Result<(), CrmError> {
    let rule = appt
        .recurrence
        .as_ref()
        .ok_or_else(|| CrmError::Validation(format!("Appointment {} is not recurring", appt.id)))?;
    let after_end = rule.end_date.map(|end| date > end).unwrap_or(false);
    if date < appt.date || after_end {
        return Err(CrmError::Validation(format!(
            "{date} is outside the series of appointment {}",
            appt.id
        )));
    }
    let live = if rule.is_lunar && rule.frequency == Frequency::Yearly {
        !rule.exceptions.contains(&date)
    } else {
        recurrence::is_occurrence(appt, date, None)
    };
    if !live {
        return Err(CrmError::Validation(format!(
            "{date} is not an occurrence of appointment {}",
            appt.id
        )));
    }
    Ok(())
}

pub(crate) fn exclude_occurrence_in(
    db: &CrmDb,
    id: &str,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Appointment, CrmError> {
    let mut appt = load_appointment(db, id)?;
    ensure_in_series(&appt, date)?;
    if let Some(rule) = appt.recurrence.as_mut() {
        rule.exceptions.insert(date);
    }
    appt.updated_at = now;
    db.update_appointment(&appt)?;
    Ok(appt)
}

/// "Delete this occurrence only": add `date` to the series' exceptions.
pub fn exclude_occurrence(db: &CrmDb, id: &str, date: NaiveDate) -> Result<Appointment, CrmError> {
    let appt = db.with_transaction(|tx| exclude_occurrence_in(tx, id, date, Utc::now()))?;
    log::info!("Excluded {} from series {}", date, id);
    Ok(appt)
}

/// Outcome of a "this and following" edit.
#[derive(Debug, Clone)]
pub enum TruncateOutcome {
    /// The series now ends the day before the cut.
    Truncated(Appointment),
    /// The cut was at or before the anchor, so the whole series was removed.
    Deleted,
}

/// "Delete this and following": end the series the day before `from`.
pub fn truncate_series(db: &CrmDb, id: &str, from: NaiveDate) -> Result<TruncateOutcome, CrmError> {
    db.with_transaction(|tx| {
        let mut appt = load_appointment(tx, id)?;
        ensure_in_series(&appt, from)?;

        if from <= appt.date {
            tx.delete_appointment(id)?;
            log::info!("Series {} cut at its first date; deleted", id);
            return Ok(TruncateOutcome::Deleted);
        }

        let new_end = from - Duration::days(1);
        if let Some(rule) = appt.recurrence.as_mut() {
            rule.end_date = Some(rule.end_date.map_or(new_end, |end| end.min(new_end)));
            rule.exceptions.retain(|d| *d <= new_end);
        }
        appt.updated_at = Utc::now();
        tx.update_appointment(&appt)?;
        log::info!("Series {} now ends {}", id, new_end);
        Ok(TruncateOutcome::Truncated(appt))
    })
}

/// Full-series edit: replace the stored record. `created_at` is preserved.
pub fn update_series(db: &CrmDb, mut appt: Appointment) -> Result<Appointment, CrmError> {
    validate_appointment(&appt)?;
    db.with_transaction(|tx| {
        let existing = load_appointment(tx, &appt.id)?;
        appt.created_at = existing.created_at;
        appt.updated_at = Utc::now();
        tx.update_appointment(&appt)?;
        Ok(appt)
    })
}

/// Base series after the detach plus the new standalone record.
#[derive(Debug, Clone)]
pub struct DetachedOccurrence {
    pub series: Appointment,
    pub detached: Appointment,
}

/// Note prepended to a record detached from a series.
pub(crate) fn detach_note(series: &Appointment, date: NaiveDate, notes: &str) -> String {
    format!(
        "[분리된 일정] 원본 일정: {} {}\n{}",
        date,
        series.time.format("%H:%M"),
        notes
    )
}

pub(crate) fn detach_occurrence_in(
    db: &CrmDb,
    id: &str,
    date: NaiveDate,
    mut draft: AppointmentDraft,
) -> Result<DetachedOccurrence, CrmError> {
    let now = Utc::now();
    let series = exclude_occurrence_in(db, id, date, now)?;

    draft.recurrence = None;
    let notes = draft.notes.take().unwrap_or_default();
    draft.notes = Some(detach_note(&series, date, &notes));
    let detached = insert_draft(db, draft)?;
    Ok(DetachedOccurrence { series, detached })
}

/// Draft for detaching one occurrence unchanged (same fields, that date).
pub fn occurrence_draft(series: &Appointment, date: NaiveDate) -> AppointmentDraft {
    let mut draft = AppointmentDraft::carried_from(series, date);
    draft.notes = Some(series.notes.clone());
    draft
}

/// "Edit this occurrence only": except `date` on the series and store
/// `draft` as a new standalone appointment pointing back to it.
pub fn detach_occurrence(
    db: &CrmDb,
    id: &str,
    date: NaiveDate,
    draft: AppointmentDraft,
) -> Result<DetachedOccurrence, CrmError> {
    let result = db.with_transaction(|tx| detach_occurrence_in(tx, id, date, draft))?;
    log::info!(
        "Detached {} from series {} as {}",
        date,
        id,
        result.detached.id
    );
    Ok(result)
}

/// Detach one occurrence directly into a given status (used by status
/// transitions on a series).
pub(crate) fn detach_with_status_in(
    db: &CrmDb,
    series: &Appointment,
    date: NaiveDate,
    status: AppointmentStatus,
) -> Result<Appointment, CrmError> {
    let mut draft = occurrence_draft(series, date);
    draft.status = Some(status);
    Ok(detach_occurrence_in(db, &series.id, date, draft)?.detached)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;
    use crate::appointments::create_appointment;
    use crate::db::test_utils::test_db;
    use crate::recurrence::occurrence_dates;
    use crate::types::{MeetingType, RecurrenceRule};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn weekly_series(db: &CrmDb) -> Appointment {
        let mut draft = AppointmentDraft::new(d(2026, 3, 2), NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        draft.title = Some("주간 회의".into());
        draft.meeting_type = Some(MeetingType::Custom("회의".into()));
        draft.notes = Some("지점 회의".into());
        draft.recurrence = Some(RecurrenceRule::new(Frequency::Weekly));
        create_appointment(db, draft).unwrap()
    }

    #[test]
    fn test_exclude_keeps_base_date_and_time() {
        let db = test_db();
        let series = weekly_series(&db);
        let updated = exclude_occurrence(&db, &series.id, d(2026, 3, 9)).unwrap();

        assert_eq!(updated.date, series.date);
        assert_eq!(updated.time, series.time);
        let dates = occurrence_dates(&updated, d(2026, 3, 1), d(2026, 3, 31), None);
        assert_eq!(dates, vec![d(2026, 3, 2), d(2026, 3, 16), d(2026, 3, 23), d(2026, 3, 30)]);
    }

    #[test]
    fn test_exclude_rejects_non_recurring_and_out_of_range() {
        let db = test_db();
        let mut draft = AppointmentDraft::new(d(2026, 3, 2), NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        draft.title = Some("단건".into());
        let single = create_appointment(&db, draft).unwrap();
        assert!(exclude_occurrence(&db, &single.id, d(2026, 3, 2)).is_err());

        let series = weekly_series(&db);
        assert!(exclude_occurrence(&db, &series.id, d(2026, 2, 23)).is_err());
    }

    #[test]
    fn test_series_edits_reject_dates_the_rule_never_produces() {
        let db = test_db();
        let series = weekly_series(&db);

        // Wednesday on a Monday series.
        let wednesday = d(2026, 3, 4);
        assert!(matches!(
            exclude_occurrence(&db, &series.id, wednesday),
            Err(CrmError::Validation(_))
        ));
        let draft = occurrence_draft(&series, wednesday);
        assert!(detach_occurrence(&db, &series.id, wednesday, draft).is_err());
        assert!(truncate_series(&db, &series.id, wednesday).is_err());

        let stored = db.get_appointment(&series.id).unwrap().unwrap();
        assert!(stored.recurrence.unwrap().exceptions.is_empty());
        assert_eq!(db.get_all_appointments().unwrap().len(), 1);
    }

    #[test]
    fn test_second_detach_of_same_date_is_rejected() {
        let db = test_db();
        let series = weekly_series(&db);
        let date = d(2026, 3, 9);

        detach_occurrence(&db, &series.id, date, occurrence_draft(&series, date)).unwrap();
        let again = detach_occurrence(&db, &series.id, date, occurrence_draft(&series, date));
        assert!(matches!(again, Err(CrmError::Validation(_))));
        assert!(exclude_occurrence(&db, &series.id, date).is_err());
        assert_eq!(db.get_all_appointments().unwrap().len(), 2);
    }

    #[test]
    fn test_lunar_series_checks_bounds_and_exceptions_only() {
        let db = test_db();
        let mut draft = AppointmentDraft::new(d(2026, 2, 17), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        draft.title = Some("설날 안부".into());
        draft.recurrence = Some(RecurrenceRule::new(Frequency::Yearly).lunar());
        let series = create_appointment(&db, draft).unwrap();

        // Next lunar new year falls on a different solar date.
        exclude_occurrence(&db, &series.id, d(2027, 2, 7)).unwrap();
        assert!(exclude_occurrence(&db, &series.id, d(2027, 2, 7)).is_err());
        assert!(exclude_occurrence(&db, &series.id, d(2026, 1, 1)).is_err());
    }

    #[test]
    fn test_truncate_sets_end_to_previous_day() {
        let db = test_db();
        let series = weekly_series(&db);
        exclude_occurrence(&db, &series.id, d(2026, 3, 30)).unwrap();

        let outcome = truncate_series(&db, &series.id, d(2026, 3, 16)).unwrap();
        let TruncateOutcome::Truncated(updated) = outcome else {
            panic!("expected truncation");
        };
        let rule = updated.recurrence.as_ref().unwrap();
        assert_eq!(rule.end_date, Some(d(2026, 3, 15)));
        assert!(rule.exceptions.is_empty(), "exceptions past the new end are dropped");
        let dates = occurrence_dates(&updated, d(2026, 3, 1), d(2026, 4, 30), None);
        assert_eq!(dates, vec![d(2026, 3, 2), d(2026, 3, 9)]);
    }

    #[test]
    fn test_truncate_at_anchor_deletes_series() {
        let db = test_db();
        let series = weekly_series(&db);
        let outcome = truncate_series(&db, &series.id, series.date).unwrap();
        assert!(matches!(outcome, TruncateOutcome::Deleted));
        assert!(db.get_appointment(&series.id).unwrap().is_none());
    }

    #[test]
    fn test_detach_creates_standalone_record_with_back_reference() {
        let db = test_db();
        let series = weekly_series(&db);
        let mut draft = occurrence_draft(&series, d(2026, 3, 9));
        draft.time = NaiveTime::from_hms_opt(15, 0, 0).unwrap();

        let result = detach_occurrence(&db, &series.id, d(2026, 3, 9), draft).unwrap();
        assert_ne!(result.detached.id, series.id);
        assert!(result.detached.recurrence.is_none());
        assert_eq!(result.detached.date, d(2026, 3, 9));
        assert!(result
            .detached
            .notes
            .starts_with("[분리된 일정] 원본 일정: 2026-03-09 10:00"));
        assert!(result.detached.notes.ends_with("지점 회의"));

        let stored = db.get_appointment(&series.id).unwrap().unwrap();
        assert_eq!(stored.date, series.date);
        assert!(stored.recurrence.unwrap().exceptions.contains(&d(2026, 3, 9)));
    }

    #[test]
    fn test_update_series_preserves_created_at() {
        let db = test_db();
        let series = weekly_series(&db);
        let mut edited = series.clone();
        edited.location = Some("본사".into());
        edited.created_at = Utc::now() + Duration::days(3);
        let saved = update_series(&db, edited).unwrap();
        assert_eq!(saved.created_at, series.created_at);
        assert_eq!(
            db.get_appointment(&series.id).unwrap().unwrap().location.as_deref(),
            Some("본사")
        );
    }
}
