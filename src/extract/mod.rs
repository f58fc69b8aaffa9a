//! Free-text appointment extraction.
//!
//! Turns pasted notes ("내일 오후 3시 김민준님 강남역 카페에서 AP") into an
//! [`AppointmentDraft`] for the user to review. Extraction never writes and
//! never fails: weak matches fall back to the reference date and the
//! configured default time.
//!
//! [`RuleBasedExtractor`] runs an ordered list of [`FieldStrategy`]s over
//! the text. The first strategy to fill a field wins; later strategies only
//! see what is still empty.

mod strategies;

use chrono::{NaiveDate, NaiveTime};

use crate::types::{AppointmentDraft, Customer, Frequency, MeetingType, RecurrenceRule};

pub use strategies::{
    CustomerStrategy, DateStrategy, LocationStrategy, MeetingTypeStrategy, RecurrenceStrategy,
    TimeStrategy, TitleStrategy,
};

/// Input to an extractor.
#[derive(Debug, Clone)]
pub struct ExtractionRequest<'a> {
    pub text: &'a str,
    /// Current roster. Archived customers are ignored.
    pub customers: &'a [Customer],
    pub customer_types: &'a [String],
    pub personal_types: &'a [String],
    /// Name pre-selected by the caller (e.g. extraction started from a customer card).
    pub seed_customer_name: Option<&'a str>,
    pub reference_date: NaiveDate,
    pub default_time: NaiveTime,
}

/// Swappable extraction backend.
pub trait AppointmentExtractor {
    fn extract(&self, request: &ExtractionRequest<'_>) -> AppointmentDraft;
}

/// Fields collected so far. Every field starts empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialDraft {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub title: Option<String>,
    pub location: Option<String>,
    pub meeting_type: Option<MeetingType>,
    pub frequency: Option<Frequency>,
    pub recurrence_days: Vec<i32>,
    pub recurrence_interval: Option<i32>,
}

/// Fill `slot` if it is still empty.
pub(crate) fn fill<T>(slot: &mut Option<T>, value: T) {
    if slot.is_none() {
        *slot = Some(value);
    }
}

/// One field-level rule.
pub trait FieldStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, request: &ExtractionRequest<'_>, draft: &mut PartialDraft);
}

pub struct RuleBasedExtractor {
    strategies: Vec<Box<dyn FieldStrategy>>,
}

impl RuleBasedExtractor {
    pub fn with_strategies(strategies: Vec<Box<dyn FieldStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }
}

impl Default for RuleBasedExtractor {
    fn default() -> Self {
        Self::with_strategies(vec![
            Box::new(DateStrategy),
            Box::new(TimeStrategy),
            Box::new(CustomerStrategy),
            Box::new(MeetingTypeStrategy),
            Box::new(LocationStrategy),
            Box::new(RecurrenceStrategy),
            Box::new(TitleStrategy),
        ])
    }
}

impl AppointmentExtractor for RuleBasedExtractor {
    fn extract(&self, request: &ExtractionRequest<'_>) -> AppointmentDraft {
        let mut partial = PartialDraft::default();
        for strategy in &self.strategies {
            strategy.apply(request, &mut partial);
        }

        let mut draft = AppointmentDraft::new(
            partial.date.unwrap_or(request.reference_date),
            partial.time.unwrap_or(request.default_time),
        );
        draft.end_time = partial.end_time.filter(|end| *end >= draft.time);
        draft.customer_id = partial.customer_id;
        draft.customer_name = partial.customer_name;
        draft.title = partial.title;
        draft.location = partial.location;
        draft.meeting_type = Some(partial.meeting_type.unwrap_or(MeetingType::Etc));
        draft.notes = Some(request.text.trim().to_string());
        draft.recurrence = partial.frequency.map(|frequency| {
            let mut rule = RecurrenceRule::new(frequency)
                .every(partial.recurrence_interval.unwrap_or(1))
                .on_days(&partial.recurrence_days);
            if frequency != Frequency::Weekly {
                rule.days.clear();
            }
            rule
        });

        log::debug!(
            "Extracted draft: {} {} type={:?} customer={:?}",
            draft.date,
            draft.time.format("%H:%M"),
            draft.meeting_type,
            draft.customer_name
        );
        draft
    }
}
