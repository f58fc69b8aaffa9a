//! Domain types shared across the scheduling core.
//!
//! Appointments come in three shapes: `AppointmentDraft` (form or extractor
//! output), `Appointment` (the persisted record) and `AppointmentOccurrence`
//! (a read-only projection of one calendar instance).

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix that marks an ad-hoc placeholder customer created at save time.
pub const UNREGISTERED_CUSTOMER_PREFIX: &str = "unregistered-";

/// Tag applied to a customer who declined during a completion wizard.
pub const REJECTED_CUSTOMER_TAG: &str = "거절고객";

// =============================================================================
// Serde helpers
// =============================================================================

/// `NaiveTime` as `"HH:MM"`. Also accepts `"HH:MM:SS"` on input.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_hhmm(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::NaiveTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
            match time {
                Some(t) => s.serialize_str(&t.format("%H:%M").to_string()),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
            let raw = Option::<String>::deserialize(d)?;
            match raw.as_deref().map(str::trim) {
                None | Some("") => Ok(None),
                Some(s) => super::super::parse_hhmm(s)
                    .map(Some)
                    .map_err(serde::de::Error::custom),
            }
        }
    }
}

/// Parse `"HH:MM"` or `"HH:MM:SS"`.
pub fn parse_hhmm(raw: &str) -> Result<NaiveTime, chrono::ParseError> {
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
}

// =============================================================================
// Appointment enums
// =============================================================================

/// Meeting type. Open vocabulary: the known codes plus any personal type the
/// user typed in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MeetingType {
    /// Initial approach meeting.
    Ap,
    /// Proposal / closing meeting.
    Pc,
    /// Telephone approach.
    Ta,
    /// 기타
    Etc,
    Custom(String),
}

impl MeetingType {
    pub fn as_str(&self) -> &str {
        match self {
            MeetingType::Ap => "AP",
            MeetingType::Pc => "PC",
            MeetingType::Ta => "TA",
            MeetingType::Etc => "기타",
            MeetingType::Custom(s) => s.as_str(),
        }
    }

    /// Whether completing this meeting type has to go through a wizard.
    pub fn is_wizard_gated(&self) -> bool {
        matches!(self, MeetingType::Ap | MeetingType::Pc)
    }
}

impl From<&str> for MeetingType {
    fn from(raw: &str) -> Self {
        match raw.trim() {
            "AP" | "ap" => MeetingType::Ap,
            "PC" | "pc" => MeetingType::Pc,
            "TA" | "ta" => MeetingType::Ta,
            "기타" | "" => MeetingType::Etc,
            other => MeetingType::Custom(other.to_string()),
        }
    }
}

impl From<String> for MeetingType {
    fn from(raw: String) -> Self {
        MeetingType::from(raw.as_str())
    }
}

impl From<MeetingType> for String {
    fn from(t: MeetingType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for MeetingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Appointment lifecycle status. `Scheduled` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Completed,
    Postponed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Postponed => "postponed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AppointmentStatus::Scheduled)
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "completed" => Ok(AppointmentStatus::Completed),
            "postponed" => Ok(AppointmentStatus::Postponed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            other => Err(format!("unknown appointment status: {other}")),
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recurrence frequency. `none` is modelled as the absence of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

fn default_interval() -> i32 {
    1
}

/// Recurrence rule of a series. Exceptions and the end date live here so a
/// non-recurring appointment cannot carry them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRule {
    #[serde(rename = "recurrenceType")]
    pub frequency: Frequency,
    /// Raw interval as entered; values below 1 are read as 1.
    #[serde(rename = "recurrenceInterval", default = "default_interval")]
    pub interval: i32,
    /// Weekday indices, 0 = Sunday. Only read for weekly rules.
    #[serde(rename = "recurrenceDays", default)]
    pub days: Vec<i32>,
    /// Inclusive last date of the series.
    #[serde(rename = "recurrenceEndDate", default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    /// Yearly only: the anchor's month/day are lunar.
    #[serde(default)]
    pub is_lunar: bool,
    /// Dates of the series that must not be materialized.
    #[serde(default)]
    pub exceptions: BTreeSet<NaiveDate>,
}

/// Largest interval a rule may carry. Anything beyond this is refused on save
/// and on import, and clamped when expanding.
pub const MAX_RECURRENCE_INTERVAL: i32 = 999;

impl RecurrenceRule {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            days: Vec::new(),
            end_date: None,
            is_lunar: false,
            exceptions: BTreeSet::new(),
        }
    }

    pub fn every(mut self, interval: i32) -> Self {
        self.interval = interval;
        self
    }

    pub fn on_days(mut self, days: &[i32]) -> Self {
        self.days = days.to_vec();
        self
    }

    pub fn until(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn lunar(mut self) -> Self {
        self.is_lunar = true;
        self
    }

    /// Interval with the `< 1 → 1` normalization applied, capped at
    /// [`MAX_RECURRENCE_INTERVAL`].
    pub fn effective_interval(&self) -> u32 {
        self.interval.clamp(1, MAX_RECURRENCE_INTERVAL) as u32
    }

    /// Whether the stored interval may be saved as-is.
    pub fn interval_in_range(&self) -> bool {
        self.interval <= MAX_RECURRENCE_INTERVAL
    }

    /// Weekday indices with out-of-range values dropped, sorted and deduplicated.
    pub fn effective_days(&self) -> Vec<u32> {
        let set: BTreeSet<u32> = self
            .days
            .iter()
            .filter(|d| (0..=6).contains(*d))
            .map(|d| *d as u32)
            .collect();
        set.into_iter().collect()
    }
}

// =============================================================================
// Appointment shapes
// =============================================================================

/// The persisted appointment record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    #[serde(default, with = "hhmm::option", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<NaiveTime>,
    pub meeting_type: MeetingType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub status: AppointmentStatus,
    /// Rule fields sit at the top level of the record (`recurrenceType`,
    /// `recurrenceInterval`, ...). No `recurrenceType` means one-off.
    #[serde(flatten)]
    pub recurrence: Option<RecurrenceRule>,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_items: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Materialize a draft into a new record with a fresh id.
    pub fn from_draft(draft: AppointmentDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            date: draft.date,
            time: draft.time,
            end_time: draft.end_time,
            meeting_type: draft.meeting_type.unwrap_or(MeetingType::Etc),
            title: draft.title,
            customer_id: draft.customer_id,
            customer_name: draft.customer_name,
            status: draft.status.unwrap_or_default(),
            recurrence: draft.recurrence,
            notes: draft.notes.unwrap_or_default(),
            location: draft.location,
            summary: None,
            keywords: Vec::new(),
            action_items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    /// Personal memo entries have no customer reference.
    pub fn is_personal(&self) -> bool {
        self.customer_id.is_none()
    }

    /// Name shown in lists: the customer if any, otherwise the title.
    pub fn display_name(&self) -> &str {
        self.customer_name
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or("")
    }
}

/// Form or extractor output. Everything except date and time is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentDraft {
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    #[serde(default, with = "hhmm::option", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_type: Option<MeetingType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub recurrence: Option<RecurrenceRule>,
    /// Only set for records created directly in a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
}

impl AppointmentDraft {
    pub fn new(date: NaiveDate, time: NaiveTime) -> Self {
        Self {
            date,
            time,
            end_time: None,
            meeting_type: None,
            title: None,
            customer_id: None,
            customer_name: None,
            location: None,
            notes: None,
            recurrence: None,
            status: None,
        }
    }

    /// Clone the carry-forward fields of an existing appointment onto a new
    /// date. Recurrence and status are never carried.
    pub fn carried_from(origin: &Appointment, date: NaiveDate) -> Self {
        Self {
            date,
            time: origin.time,
            end_time: origin.end_time,
            meeting_type: Some(origin.meeting_type.clone()),
            title: origin.title.clone(),
            customer_id: origin.customer_id.clone(),
            customer_name: origin.customer_name.clone(),
            location: origin.location.clone(),
            notes: None,
            recurrence: None,
            status: None,
        }
    }
}

/// One concrete calendar instance of an appointment. Read-only: it is never
/// stored, and `date()` is the occurrence date rather than the anchor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentOccurrence {
    #[serde(flatten)]
    base: Appointment,
    occurrence_date: NaiveDate,
}

impl AppointmentOccurrence {
    pub(crate) fn new(base: Appointment, occurrence_date: NaiveDate) -> Self {
        Self {
            base,
            occurrence_date,
        }
    }

    pub fn base(&self) -> &Appointment {
        &self.base
    }

    pub fn id(&self) -> &str {
        &self.base.id
    }

    pub fn occurrence_date(&self) -> NaiveDate {
        self.occurrence_date
    }

    /// The date to display: the occurrence, not the series anchor.
    pub fn date(&self) -> NaiveDate {
        self.occurrence_date
    }

    pub fn time(&self) -> NaiveTime {
        self.base.time
    }

    pub fn end_time(&self) -> Option<NaiveTime> {
        self.base.end_time
    }

    pub fn is_recurring(&self) -> bool {
        self.base.is_recurring()
    }
}

// =============================================================================
// Customer (consumed)
// =============================================================================

/// Closed classification of why a customer declined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    Price,
    NoNeed,
    AlreadyInsured,
    FamilyObjection,
    Health,
    Timing,
    Other,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::Price => "price",
            RejectionReason::NoNeed => "no_need",
            RejectionReason::AlreadyInsured => "already_insured",
            RejectionReason::FamilyObjection => "family_objection",
            RejectionReason::Health => "health",
            RejectionReason::Timing => "timing",
            RejectionReason::Other => "other",
        }
    }

    /// Label shown on the customer card.
    pub fn label(&self) -> &'static str {
        match self {
            RejectionReason::Price => "보험료 부담",
            RejectionReason::NoNeed => "필요성 못 느낌",
            RejectionReason::AlreadyInsured => "기가입",
            RejectionReason::FamilyObjection => "가족 반대",
            RejectionReason::Health => "건강 문제",
            RejectionReason::Timing => "시기상조",
            RejectionReason::Other => "기타",
        }
    }
}

impl FromStr for RejectionReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price" => Ok(RejectionReason::Price),
            "no_need" => Ok(RejectionReason::NoNeed),
            "already_insured" => Ok(RejectionReason::AlreadyInsured),
            "family_objection" => Ok(RejectionReason::FamilyObjection),
            "health" => Ok(RejectionReason::Health),
            "timing" => Ok(RejectionReason::Timing),
            "other" => Ok(RejectionReason::Other),
            other => Err(format!("unknown rejection reason: {other}")),
        }
    }
}

/// How likely a declined customer is worth contacting again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecontactProbability {
    High,
    Medium,
    Low,
    Never,
}

impl RecontactProbability {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecontactProbability::High => "high",
            RecontactProbability::Medium => "medium",
            RecontactProbability::Low => "low",
            RecontactProbability::Never => "never",
        }
    }
}

impl FromStr for RecontactProbability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(RecontactProbability::High),
            "medium" => Ok(RecontactProbability::Medium),
            "low" => Ok(RecontactProbability::Low),
            "never" => Ok(RecontactProbability::Never),
            other => Err(format!("unknown recontact probability: {other}")),
        }
    }
}

/// A consultation entry embedded in a customer's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consultation {
    pub id: String,
    pub date: NaiveDate,
    pub meeting_type: MeetingType,
    pub notes: String,
}

/// Result of a telephone approach call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    NoAnswer,
    Rejected,
    CallBack,
    AppointmentSet,
    Other,
}

impl CallOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CallOutcome::NoAnswer => "부재중",
            CallOutcome::Rejected => "거절",
            CallOutcome::CallBack => "재통화",
            CallOutcome::AppointmentSet => "약속 확정",
            CallOutcome::Other => "기타",
        }
    }
}

/// One entry in a customer's call history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    pub id: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub outcome: CallOutcome,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthday: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<RejectionReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recontact_probability: Option<RecontactProbability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_follow_up_date: Option<NaiveDate>,
    #[serde(default)]
    pub consultations: Vec<Consultation>,
    #[serde(default)]
    pub call_history: Vec<CallRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            birthday: None,
            phone: None,
            customer_type: None,
            tags: Vec::new(),
            archived: false,
            rejection_reason: None,
            rejection_notes: None,
            rejection_date: None,
            recontact_probability: None,
            next_follow_up_date: None,
            consultations: Vec::new(),
            call_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Placeholder customer synthesized when a draft names someone not on
    /// the roster.
    pub fn unregistered(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        let mut customer = Self::new(name, now);
        customer.id = format!("{}{}", UNREGISTERED_CUSTOMER_PREFIX, uuid::Uuid::new_v4());
        customer
    }

    pub fn is_unregistered(&self) -> bool {
        self.id.starts_with(UNREGISTERED_CUSTOMER_PREFIX)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn add_tag(&mut self, tag: &str) {
        if !self.has_tag(tag) {
            self.tags.push(tag.to_string());
        }
    }

    pub fn remove_tag(&mut self, tag: &str) {
        self.tags.retain(|t| t != tag);
    }

    /// Prepend a consultation and keep the list newest-first.
    pub fn push_consultation(&mut self, consultation: Consultation) {
        self.consultations.insert(0, consultation);
        // Stable sort keeps the fresh entry ahead of same-day history.
        self.consultations.sort_by(|a, b| b.date.cmp(&a.date));
    }
}

// =============================================================================
// Performance
// =============================================================================

/// A completed contract / application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceRecord {
    pub id: String,
    pub contractor_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<NaiveDate>,
    pub application_date: NaiveDate,
    /// Monthly premium in won.
    pub premium: i64,
    pub insurance_company: String,
    pub product_name: String,
    /// Recognized performance in won.
    pub recognized_performance: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Configuration
// =============================================================================

/// User configuration, read from `~/.agent-crm/config.json`.
///
/// Every field has a default so a partial (or missing) file is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmConfig {
    /// Directory holding the database and backups. Defaults to `~/.agent-crm`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    #[serde(default = "default_follow_up_offset_days")]
    pub follow_up_offset_days: i64,
    #[serde(default = "default_reschedule_offset_days")]
    pub reschedule_offset_days: i64,
    #[serde(default = "default_toast_auto_dismiss_secs")]
    pub toast_auto_dismiss_secs: u64,
    #[serde(default = "default_appointment_time")]
    pub default_appointment_time: String,
    #[serde(default = "default_customer_meeting_types")]
    pub customer_meeting_types: Vec<String>,
    #[serde(default)]
    pub personal_meeting_types: Vec<String>,
    #[serde(default = "default_coverage_categories")]
    pub coverage_categories: Vec<String>,
}

fn default_follow_up_offset_days() -> i64 {
    7
}
fn default_reschedule_offset_days() -> i64 {
    1
}
fn default_toast_auto_dismiss_secs() -> u64 {
    7
}
fn default_appointment_time() -> String {
    "09:00".to_string()
}
fn default_customer_meeting_types() -> Vec<String> {
    ["AP", "PC", "TA", "기타"].iter().map(|s| s.to_string()).collect()
}

/// Coverage categories recognised by the performance shortcut parser.
pub fn default_coverage_categories() -> Vec<String> {
    [
        "종신", "정기", "건강", "암", "실손", "연금", "저축", "변액", "어린이", "운전자", "치아",
        "간병", "상해",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            follow_up_offset_days: default_follow_up_offset_days(),
            reschedule_offset_days: default_reschedule_offset_days(),
            toast_auto_dismiss_secs: default_toast_auto_dismiss_secs(),
            default_appointment_time: default_appointment_time(),
            customer_meeting_types: default_customer_meeting_types(),
            personal_meeting_types: Vec::new(),
            coverage_categories: default_coverage_categories(),
        }
    }
}

impl CrmConfig {
    /// Default time for drafts that name no time. Falls back to 09:00 when
    /// the configured value does not parse.
    pub fn default_time(&self) -> NaiveTime {
        parse_hhmm(&self.default_appointment_time)
            .unwrap_or_else(|_| NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default())
    }
}
