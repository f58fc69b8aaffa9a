//! Completion wizards for AP and PC meetings.
//!
//! Completing an AP or PC appointment is a three-step flow:
//! pick an outcome, enter its details, confirm. Nothing is written until
//! the confirm step, and then every effect (status, consultation, customer
//! fields, performance record, next appointment) lands in one transaction.
//!
//! Allowed outcomes per wizard:
//! - PC: success, rejection, follow-up
//! - AP: positive, rejection, follow-up, simple

mod commit;
pub mod performance_text;

use std::fmt;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::CrmDb;
use crate::error::CrmError;
use crate::types::{
    Appointment, AppointmentDraft, Consultation, Customer, PerformanceRecord,
    RecontactProbability, RejectionReason,
};

pub use commit::commit_wizard;
pub use performance_text::{parse_performance_text, PerformanceDraft};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WizardKind {
    Pc,
    Ap,
}

impl WizardKind {
    pub fn allowed_outcomes(&self) -> &'static [OutcomeKind] {
        match self {
            WizardKind::Pc => &[OutcomeKind::Success, OutcomeKind::Rejection, OutcomeKind::FollowUp],
            WizardKind::Ap => &[
                OutcomeKind::Positive,
                OutcomeKind::Rejection,
                OutcomeKind::FollowUp,
                OutcomeKind::Simple,
            ],
        }
    }

    pub fn allows(&self, outcome: OutcomeKind) -> bool {
        self.allowed_outcomes().contains(&outcome)
    }
}

impl fmt::Display for WizardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WizardKind::Pc => "PC",
            WizardKind::Ap => "AP",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// PC only: contract signed.
    Success,
    /// AP only: customer agreed to a proposal meeting.
    Positive,
    Rejection,
    FollowUp,
    /// AP only: just record the meeting.
    Simple,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::Positive => "positive",
            OutcomeKind::Rejection => "rejection",
            OutcomeKind::FollowUp => "follow_up",
            OutcomeKind::Simple => "simple",
        }
    }
}

/// Contract details entered on a PC success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceInput {
    pub application_date: NaiveDate,
    pub insurance_company: String,
    pub product_name: String,
    pub premium: i64,
    pub recognized_performance: i64,
    #[serde(default)]
    pub coverage_category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionInput {
    pub reason: RejectionReason,
    pub recontact_probability: RecontactProbability,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub next_follow_up_date: Option<NaiveDate>,
}

/// Outcome with the data its branch needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WizardOutcome {
    Success {
        performance: PerformanceInput,
        #[serde(default)]
        consultation_notes: String,
    },
    Positive {
        /// The PC meeting to book. Customer and type are filled in on commit.
        pc_appointment: AppointmentDraft,
        #[serde(default)]
        consultation_notes: String,
    },
    Rejection {
        rejection: RejectionInput,
        #[serde(default)]
        consultation_notes: String,
    },
    FollowUp {
        appointment: AppointmentDraft,
        #[serde(default)]
        consultation_notes: String,
    },
    Simple {
        #[serde(default)]
        consultation_notes: String,
    },
}

impl WizardOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            WizardOutcome::Success { .. } => OutcomeKind::Success,
            WizardOutcome::Positive { .. } => OutcomeKind::Positive,
            WizardOutcome::Rejection { .. } => OutcomeKind::Rejection,
            WizardOutcome::FollowUp { .. } => OutcomeKind::FollowUp,
            WizardOutcome::Simple { .. } => OutcomeKind::Simple,
        }
    }

    pub fn consultation_notes(&self) -> &str {
        match self {
            WizardOutcome::Success {
                consultation_notes, ..
            }
            | WizardOutcome::Positive {
                consultation_notes, ..
            }
            | WizardOutcome::Rejection {
                consultation_notes, ..
            }
            | WizardOutcome::FollowUp {
                consultation_notes, ..
            }
            | WizardOutcome::Simple { consultation_notes } => consultation_notes,
        }
    }

    /// Field checks that do not need storage.
    pub fn validate(&self) -> Result<(), CrmError> {
        match self {
            WizardOutcome::Success { performance, .. } => {
                if performance.insurance_company.trim().is_empty() {
                    return Err(CrmError::WizardIncomplete("insurance company".into()));
                }
                if performance.product_name.trim().is_empty() {
                    return Err(CrmError::WizardIncomplete("product name".into()));
                }
                if performance.premium < 0 || performance.recognized_performance < 0 {
                    return Err(CrmError::Validation("amounts cannot be negative".into()));
                }
                Ok(())
            }
            WizardOutcome::Positive { pc_appointment, .. } => {
                check_end_time(pc_appointment)
            }
            WizardOutcome::FollowUp { appointment, .. } => check_end_time(appointment),
            WizardOutcome::Rejection { .. } | WizardOutcome::Simple { .. } => Ok(()),
        }
    }
}

fn check_end_time(draft: &AppointmentDraft) -> Result<(), CrmError> {
    match draft.end_time {
        Some(end) if end < draft.time => Err(CrmError::Validation(
            "End time is earlier than start time".into(),
        )),
        _ => Ok(()),
    }
}

/// The appointment a wizard completes. For a series, `occurrence_date`
/// names the instance being completed.
#[derive(Debug, Clone, PartialEq)]
pub struct WizardOrigin {
    pub appointment: Appointment,
    pub occurrence_date: Option<NaiveDate>,
}

impl WizardOrigin {
    pub fn new(appointment: Appointment, occurrence_date: Option<NaiveDate>) -> Self {
        Self {
            appointment,
            occurrence_date,
        }
    }

    /// Date the meeting actually took place.
    pub fn date(&self) -> NaiveDate {
        self.occurrence_date.unwrap_or(self.appointment.date)
    }

    pub fn appointment_id(&self) -> &str {
        &self.appointment.id
    }
}

/// Everything a committed wizard wrote.
#[derive(Debug, Clone)]
pub struct WizardEffects {
    /// The completed record (detached from its series if needed).
    pub appointment: Appointment,
    pub customer: Customer,
    pub consultation: Option<Consultation>,
    pub performance: Option<PerformanceRecord>,
    /// PC booked on a positive AP, or the follow-up meeting.
    pub next_appointment: Option<Appointment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    SelectOutcome,
    EnterDetails,
    Confirm,
}

/// In-memory state of one open wizard. Holds no storage handle; discarding
/// it leaves nothing behind.
#[derive(Debug, Clone)]
pub struct WizardSession {
    kind: WizardKind,
    origin: WizardOrigin,
    customer_name: String,
    step: WizardStep,
    selected: Option<OutcomeKind>,
    outcome: Option<WizardOutcome>,
}

impl WizardSession {
    pub fn new(kind: WizardKind, origin: WizardOrigin) -> Result<Self, CrmError> {
        let customer_name = origin
            .appointment
            .customer_name
            .clone()
            .filter(|_| origin.appointment.customer_id.is_some())
            .ok_or_else(|| {
                CrmError::Validation(format!(
                    "Appointment {} has no customer to complete against",
                    origin.appointment.id
                ))
            })?;
        Ok(Self {
            kind,
            origin,
            customer_name,
            step: WizardStep::SelectOutcome,
            selected: None,
            outcome: None,
        })
    }

    pub fn kind(&self) -> WizardKind {
        self.kind
    }

    pub fn origin(&self) -> &WizardOrigin {
        &self.origin
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn selected(&self) -> Option<OutcomeKind> {
        self.selected
    }

    pub fn select_outcome(&mut self, outcome: OutcomeKind) -> Result<(), CrmError> {
        if !self.kind.allows(outcome) {
            return Err(CrmError::WizardOutcomeNotAllowed {
                kind: self.kind.to_string(),
                outcome: outcome.as_str().to_string(),
            });
        }
        if self.selected != Some(outcome) {
            self.outcome = None;
        }
        self.selected = Some(outcome);
        self.step = WizardStep::EnterDetails;
        Ok(())
    }

    pub fn enter_details(&mut self, outcome: WizardOutcome) -> Result<(), CrmError> {
        let selected = self
            .selected
            .ok_or_else(|| CrmError::WizardIncomplete("no outcome selected".into()))?;
        if outcome.kind() != selected {
            return Err(CrmError::WizardIncomplete(format!(
                "details are for '{}' but '{}' is selected",
                outcome.kind().as_str(),
                selected.as_str()
            )));
        }
        outcome.validate()?;
        self.outcome = Some(outcome);
        self.step = WizardStep::Confirm;
        Ok(())
    }

    /// Step back one screen. Entered data is kept.
    pub fn back(&mut self) {
        self.step = match self.step {
            WizardStep::Confirm => WizardStep::EnterDetails,
            WizardStep::EnterDetails | WizardStep::SelectOutcome => WizardStep::SelectOutcome,
        };
    }

    /// Pre-fill a success outcome from a one-line performance note.
    pub fn prefill_performance(
        &self,
        text: &str,
        today: NaiveDate,
        categories: &[String],
    ) -> PerformanceInput {
        parse_performance_text(text, today, categories).into_input()
    }

    /// Summary lines shown on the confirm screen.
    pub fn summary(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "{} 완료: {} ({})",
            self.kind,
            self.customer_name,
            self.origin.date()
        )];
        let Some(outcome) = &self.outcome else {
            return lines;
        };
        match outcome {
            WizardOutcome::Success { performance, .. } => {
                lines.push(format!(
                    "계약: {} {}",
                    performance.insurance_company, performance.product_name
                ));
                lines.push(format!(
                    "보험료 {}원 / 인정실적 {}원",
                    performance.premium, performance.recognized_performance
                ));
            }
            WizardOutcome::Positive { pc_appointment, .. } => lines.push(format!(
                "PC 예약: {} {}",
                pc_appointment.date,
                pc_appointment.time.format("%H:%M")
            )),
            WizardOutcome::Rejection { rejection, .. } => {
                lines.push(format!("거절 사유: {}", rejection.reason.label()))
            }
            WizardOutcome::FollowUp { appointment, .. } => lines.push(format!(
                "후속 일정: {} {}",
                appointment.date,
                appointment.time.format("%H:%M")
            )),
            WizardOutcome::Simple { .. } => lines.push("상담 기록만 저장".to_string()),
        }
        if !outcome.consultation_notes().trim().is_empty() {
            lines.push(format!("메모: {}", outcome.consultation_notes().trim()));
        }
        lines
    }

    /// Commit from the confirm step.
    pub fn commit(&self, db: &CrmDb) -> Result<WizardEffects, CrmError> {
        if self.step != WizardStep::Confirm {
            return Err(CrmError::WizardIncomplete("confirm step not reached".into()));
        }
        let outcome = self
            .outcome
            .as_ref()
            .ok_or_else(|| CrmError::WizardIncomplete("no outcome details".into()))?;
        commit_wizard(db, self.kind, outcome, &self.origin, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;
    use crate::types::MeetingType;

    fn origin(meeting_type: MeetingType) -> WizardOrigin {
        let mut draft = AppointmentDraft::new(
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        );
        draft.meeting_type = Some(meeting_type);
        draft.customer_id = Some("c1".into());
        draft.customer_name = Some("김민준".into());
        WizardOrigin::new(Appointment::from_draft(draft, Utc::now()), None)
    }

    #[test]
    fn test_allowed_outcomes_per_kind() {
        assert!(WizardKind::Pc.allows(OutcomeKind::Success));
        assert!(!WizardKind::Pc.allows(OutcomeKind::Simple));
        assert!(!WizardKind::Pc.allows(OutcomeKind::Positive));
        assert!(WizardKind::Ap.allows(OutcomeKind::Simple));
        assert!(!WizardKind::Ap.allows(OutcomeKind::Success));
    }

    #[test]
    fn test_select_rejects_outcome_of_other_wizard() {
        let mut session = WizardSession::new(WizardKind::Pc, origin(MeetingType::Pc)).unwrap();
        let err = session.select_outcome(OutcomeKind::Simple).unwrap_err();
        assert!(matches!(err, CrmError::WizardOutcomeNotAllowed { .. }));
        assert_eq!(session.step(), WizardStep::SelectOutcome);
    }

    #[test]
    fn test_steps_advance_and_back() {
        let mut session = WizardSession::new(WizardKind::Ap, origin(MeetingType::Ap)).unwrap();
        session.select_outcome(OutcomeKind::Simple).unwrap();
        assert_eq!(session.step(), WizardStep::EnterDetails);
        session
            .enter_details(WizardOutcome::Simple {
                consultation_notes: "니즈 파악".into(),
            })
            .unwrap();
        assert_eq!(session.step(), WizardStep::Confirm);
        assert!(session.summary().iter().any(|l| l.contains("니즈 파악")));

        session.back();
        assert_eq!(session.step(), WizardStep::EnterDetails);
    }

    #[test]
    fn test_details_must_match_selection() {
        let mut session = WizardSession::new(WizardKind::Ap, origin(MeetingType::Ap)).unwrap();
        session.select_outcome(OutcomeKind::Rejection).unwrap();
        let err = session
            .enter_details(WizardOutcome::Simple {
                consultation_notes: String::new(),
            })
            .unwrap_err();
        assert!(matches!(err, CrmError::WizardIncomplete(_)));
    }

    #[test]
    fn test_success_requires_product() {
        let outcome = WizardOutcome::Success {
            performance: PerformanceInput {
                application_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
                insurance_company: "삼성생명".into(),
                product_name: " ".into(),
                premium: 100_000,
                recognized_performance: 200_000,
                coverage_category: None,
            },
            consultation_notes: String::new(),
        };
        assert!(outcome.validate().is_err());
    }

    #[test]
    fn test_session_requires_customer() {
        let mut origin = origin(MeetingType::Pc);
        origin.appointment.customer_id = None;
        assert!(WizardSession::new(WizardKind::Pc, origin).is_err());
    }

    #[test]
    fn test_outcome_serializes_with_kind_tag() {
        let outcome = WizardOutcome::Simple {
            consultation_notes: "메모".into(),
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["kind"], "simple");
    }
}
