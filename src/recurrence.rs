//! Recurrence expansion.
//!
//! Turns an appointment's recurrence rule into the concrete occurrence dates
//! that fall inside a display window. Pure: no storage access, no state kept
//! between calls.
//!
//! Every occurrence is computed from the anchor (the base record's `date`),
//! never from the previous occurrence, so month-end clamping cannot drift.
//!
//! Policies:
//! - monthly / yearly on a day the target month lacks clamp to that month's
//!   last day (Jan 31 → Feb 28, Feb 29 → Feb 28);
//! - lunar yearly rules map the anchor's lunar month/day into each target
//!   year through a [`LunarCalendar`]. Leap months never add a second
//!   occurrence. A missing lunar day 30 falls back to day 29, and a year that
//!   still cannot be converted is skipped.

use chrono::{Datelike, Duration, NaiveDate};

use crate::types::{Appointment, AppointmentOccurrence, Frequency, RecurrenceRule};

/// A date on the lunar calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LunarDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub is_leap_month: bool,
}

/// Lunar ↔ solar conversion capability. Supplied by the caller; the core
/// never ships its own tables.
pub trait LunarCalendar {
    fn solar_to_lunar(&self, date: NaiveDate) -> Option<LunarDate>;

    fn lunar_to_solar(&self, year: i32, month: u32, day: u32, leap_month: bool)
        -> Option<NaiveDate>;
}

/// Expand one appointment into projections for `[from, to]` (both inclusive).
///
/// Non-recurring appointments yield their own date when it lies in the
/// window. Output is ascending and duplicate-free.
pub fn expand_occurrences(
    appointment: &Appointment,
    from: NaiveDate,
    to: NaiveDate,
    lunar: Option<&dyn LunarCalendar>,
) -> Vec<AppointmentOccurrence> {
    occurrence_dates(appointment, from, to, lunar)
        .into_iter()
        .map(|date| AppointmentOccurrence::new(appointment.clone(), date))
        .collect()
}

/// Dates-only form of [`expand_occurrences`].
pub fn occurrence_dates(
    appointment: &Appointment,
    from: NaiveDate,
    to: NaiveDate,
    lunar: Option<&dyn LunarCalendar>,
) -> Vec<NaiveDate> {
    if to < from {
        return Vec::new();
    }

    let rule = match &appointment.recurrence {
        Some(rule) => rule,
        None => {
            return if appointment.date >= from && appointment.date <= to {
                vec![appointment.date]
            } else {
                Vec::new()
            };
        }
    };

    let anchor = appointment.date;
    let last = match rule.end_date {
        Some(end) => end.min(to),
        None => to,
    };
    let start = from.max(anchor);
    if last < start {
        return Vec::new();
    }

    let interval = rule.effective_interval();
    let mut dates = match rule.frequency {
        Frequency::Daily => daily(anchor, interval, start, last),
        Frequency::Weekly => weekly(anchor, interval, rule, start, last),
        Frequency::Monthly => monthly(anchor, interval, start, last),
        Frequency::Yearly if rule.is_lunar => match lunar {
            Some(calendar) => lunar_yearly(anchor, interval, calendar, start, last),
            None => {
                log::warn!(
                    "Lunar yearly rule on appointment {} expanded without a lunar calendar; using solar dates",
                    appointment.id
                );
                yearly(anchor, interval, start, last)
            }
        },
        Frequency::Yearly => yearly(anchor, interval, start, last),
    };

    dates.retain(|d| !rule.exceptions.contains(d));
    dates.dedup();
    dates
}

/// Expand a set of appointments and sort the projections by date, then time.
pub fn expand_all(
    appointments: &[Appointment],
    from: NaiveDate,
    to: NaiveDate,
    lunar: Option<&dyn LunarCalendar>,
) -> Vec<AppointmentOccurrence> {
    let mut out: Vec<AppointmentOccurrence> = appointments
        .iter()
        .flat_map(|a| expand_occurrences(a, from, to, lunar))
        .collect();
    out.sort_by(|a, b| (a.date(), a.time()).cmp(&(b.date(), b.time())));
    out
}

/// Projections for a single calendar day.
pub fn occurrences_on(
    appointments: &[Appointment],
    day: NaiveDate,
    lunar: Option<&dyn LunarCalendar>,
) -> Vec<AppointmentOccurrence> {
    expand_all(appointments, day, day, lunar)
}

/// Whether `date` is a live (non-excepted) occurrence of the appointment.
pub fn is_occurrence(
    appointment: &Appointment,
    date: NaiveDate,
    lunar: Option<&dyn LunarCalendar>,
) -> bool {
    occurrence_dates(appointment, date, date, lunar).contains(&date)
}

fn daily(anchor: NaiveDate, interval: u32, start: NaiveDate, last: NaiveDate) -> Vec<NaiveDate> {
    let step = interval as i64;
    let offset = (start - anchor).num_days();
    let first_index = (offset + step - 1) / step;
    let mut out = Vec::new();
    let mut current = anchor.checked_add_signed(Duration::days(first_index * step));
    while let Some(date) = current.filter(|d| *d <= last) {
        out.push(date);
        current = date.checked_add_signed(Duration::days(step));
    }
    out
}

fn weekly(
    anchor: NaiveDate,
    interval: u32,
    rule: &RecurrenceRule,
    start: NaiveDate,
    last: NaiveDate,
) -> Vec<NaiveDate> {
    let mut days = rule.effective_days();
    if days.is_empty() {
        days.push(anchor.weekday().num_days_from_sunday());
    }

    // Blocks are Sunday-started weeks; the anchor's week is block 0.
    let week_start = anchor - Duration::days(anchor.weekday().num_days_from_sunday() as i64);
    let block_len = 7 * interval as i64;
    let mut block = (start - week_start).num_days() / block_len;

    let mut out = Vec::new();
    loop {
        let Some(block_start) = block
            .checked_mul(block_len)
            .and_then(|offset| week_start.checked_add_signed(Duration::days(offset)))
            .filter(|d| *d <= last)
        else {
            break;
        };
        for day in &days {
            let Some(date) = block_start.checked_add_signed(Duration::days(*day as i64)) else {
                continue;
            };
            if date >= start && date <= last {
                out.push(date);
            }
        }
        block += 1;
    }
    out
}

fn monthly(anchor: NaiveDate, interval: u32, start: NaiveDate, last: NaiveDate) -> Vec<NaiveDate> {
    let step = interval as i64;
    let anchor_index = month_index(anchor);
    let skipped = (month_index(start) - anchor_index).max(0) / step;

    let mut out = Vec::new();
    let mut n = skipped;
    loop {
        let Some(date) = n
            .checked_mul(step)
            .and_then(|offset| offset.checked_add(anchor_index))
            .and_then(from_month_index)
            .and_then(|(year, month)| clamped_date(year, month, anchor.day()))
            .filter(|d| *d <= last)
        else {
            break;
        };
        if date >= start {
            out.push(date);
        }
        n += 1;
    }
    out
}

fn yearly(anchor: NaiveDate, interval: u32, start: NaiveDate, last: NaiveDate) -> Vec<NaiveDate> {
    let step = i32::try_from(interval).unwrap_or(i32::MAX);
    let skipped = (start.year() - anchor.year()).max(0) / step;

    let mut out = Vec::new();
    let mut n = skipped;
    loop {
        let Some(date) = n
            .checked_mul(step)
            .and_then(|offset| anchor.year().checked_add(offset))
            .and_then(|year| clamped_date(year, anchor.month(), anchor.day()))
            .filter(|d| *d <= last)
        else {
            break;
        };
        if date >= start {
            out.push(date);
        }
        n += 1;
    }
    out
}

fn lunar_yearly(
    anchor: NaiveDate,
    interval: u32,
    calendar: &dyn LunarCalendar,
    start: NaiveDate,
    last: NaiveDate,
) -> Vec<NaiveDate> {
    let Some(lunar_anchor) = calendar.solar_to_lunar(anchor) else {
        log::warn!("No lunar date for anchor {anchor}; using solar yearly dates");
        return yearly(anchor, interval, start, last);
    };

    let step = i32::try_from(interval).unwrap_or(i32::MAX);
    // A lunar year straddles two solar years, so begin one solar year early.
    let skipped = (start.year() - 1 - lunar_anchor.year).max(0) / step;

    let mut out = Vec::new();
    let mut n = skipped;
    loop {
        let Some(year) = n
            .checked_mul(step)
            .and_then(|offset| lunar_anchor.year.checked_add(offset))
            .filter(|year| *year <= last.year())
        else {
            break;
        };
        n += 1;

        let solar = if year == lunar_anchor.year {
            Some(anchor)
        } else {
            calendar
                .lunar_to_solar(year, lunar_anchor.month, lunar_anchor.day, false)
                .or_else(|| {
                    if lunar_anchor.day == 30 {
                        calendar.lunar_to_solar(year, lunar_anchor.month, 29, false)
                    } else {
                        None
                    }
                })
        };

        match solar {
            Some(date) if date >= start && date <= last => out.push(date),
            Some(_) => {}
            None => log::debug!(
                "Lunar {}-{} has no solar date in {}; skipping",
                lunar_anchor.month,
                lunar_anchor.day,
                year
            ),
        }
    }
    out.sort();
    out
}

fn month_index(date: NaiveDate) -> i64 {
    date.year() as i64 * 12 + date.month0() as i64
}

fn from_month_index(index: i64) -> Option<(i32, u32)> {
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    Some((year, index.rem_euclid(12) as u32 + 1))
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let next = if month == 12 {
        year.checked_add(1).map(|y| (y, 1))
    } else {
        Some((year, month + 1))
    };
    next.and_then(|(next_year, next_month)| NaiveDate::from_ymd_opt(next_year, next_month, 1))
        .and_then(|first| first.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

/// `year-month-day`, with the day clamped to the month's length.
/// `None` once the year leaves chrono's range.
fn clamped_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let day = day.min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{NaiveTime, Utc, Weekday};

    use super::*;
    use crate::types::{AppointmentDraft, MeetingType};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn series(anchor: NaiveDate, rule: RecurrenceRule) -> Appointment {
        let mut draft = AppointmentDraft::new(anchor, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        draft.meeting_type = Some(MeetingType::Ta);
        draft.recurrence = Some(rule);
        Appointment::from_draft(draft, Utc::now())
    }

    fn assert_strictly_ascending(dates: &[NaiveDate]) {
        for pair in dates.windows(2) {
            assert!(pair[0] < pair[1], "not strictly ascending: {:?}", dates);
        }
    }

    #[test]
    fn test_single_appointment_in_and_out_of_window() {
        let mut appt = series(d(2026, 3, 10), RecurrenceRule::new(Frequency::Daily));
        appt.recurrence = None;
        assert_eq!(
            occurrence_dates(&appt, d(2026, 3, 1), d(2026, 3, 31), None),
            vec![d(2026, 3, 10)]
        );
        assert!(occurrence_dates(&appt, d(2026, 4, 1), d(2026, 4, 30), None).is_empty());
    }

    #[test]
    fn test_outputs_are_strictly_ascending_for_every_frequency() {
        let anchor = d(2026, 1, 31);
        let rules = [
            RecurrenceRule::new(Frequency::Daily).every(3),
            RecurrenceRule::new(Frequency::Weekly).on_days(&[5, 1, 1, 3]),
            RecurrenceRule::new(Frequency::Monthly),
            RecurrenceRule::new(Frequency::Yearly),
        ];
        for rule in rules {
            let appt = series(anchor, rule);
            let dates = occurrence_dates(&appt, d(2025, 12, 1), d(2029, 3, 1), None);
            assert!(!dates.is_empty());
            assert_strictly_ascending(&dates);
            assert!(dates.iter().all(|x| *x >= anchor));
        }
    }

    #[test]
    fn test_exception_is_never_emitted() {
        let mut rule = RecurrenceRule::new(Frequency::Daily);
        rule.exceptions.insert(d(2026, 3, 4));
        let appt = series(d(2026, 3, 1), rule);

        let dates = occurrence_dates(&appt, d(2026, 3, 1), d(2026, 3, 7), None);
        assert_eq!(dates.len(), 6);
        assert!(!dates.contains(&d(2026, 3, 4)));
        assert!(occurrence_dates(&appt, d(2026, 3, 4), d(2026, 3, 4), None).is_empty());
        assert!(!is_occurrence(&appt, d(2026, 3, 4), None));
    }

    #[test]
    fn test_huge_interval_expands_without_overflow() {
        let anchor = d(2026, 3, 2);
        for frequency in [
            Frequency::Daily,
            Frequency::Weekly,
            Frequency::Monthly,
            Frequency::Yearly,
        ] {
            let appt = series(anchor, RecurrenceRule::new(frequency).every(i32::MAX));
            let dates = occurrence_dates(&appt, anchor, d(2030, 12, 31), None);
            assert_eq!(dates[0], anchor, "{frequency:?}");
            assert_strictly_ascending(&dates);
        }
    }

    #[test]
    fn test_step_helpers_stop_at_calendar_edge() {
        let anchor = d(2026, 3, 2);
        let rule = RecurrenceRule::new(Frequency::Weekly);
        let last = NaiveDate::MAX;

        assert_eq!(daily(anchor, u32::MAX, anchor, last), vec![anchor]);
        assert_eq!(weekly(anchor, u32::MAX, &rule, anchor, last), vec![anchor]);
        assert_eq!(monthly(anchor, u32::MAX, anchor, last), vec![anchor]);
        assert_eq!(yearly(anchor, u32::MAX, anchor, last), vec![anchor]);

        let near_end = NaiveDate::MAX - Duration::days(3);
        assert_eq!(daily(near_end, 1, near_end, last).len(), 4);
        assert_eq!(yearly(near_end, 1, near_end, last), vec![near_end]);
    }

    #[test]
    fn test_end_date_is_inclusive() {
        let rule = RecurrenceRule::new(Frequency::Daily).until(d(2026, 3, 5));
        let appt = series(d(2026, 3, 1), rule);
        let dates = occurrence_dates(&appt, d(2026, 3, 1), d(2026, 3, 31), None);
        assert_eq!(dates.last(), Some(&d(2026, 3, 5)));
        assert!(!dates.contains(&d(2026, 3, 6)));
        assert_eq!(dates.len(), 5);
    }

    #[test]
    fn test_weekly_monday_wednesday_two_weeks() {
        // 2026-03-02 is a Monday.
        let anchor = d(2026, 3, 2);
        assert_eq!(anchor.weekday(), Weekday::Mon);
        let rule = RecurrenceRule::new(Frequency::Weekly).on_days(&[1, 3]);
        let appt = series(anchor, rule);

        let dates = occurrence_dates(&appt, anchor, anchor + Duration::days(13), None);
        assert_eq!(dates.len(), 4);
        assert!(dates
            .iter()
            .all(|x| matches!(x.weekday(), Weekday::Mon | Weekday::Wed)));
        assert_eq!(
            dates,
            vec![d(2026, 3, 2), d(2026, 3, 4), d(2026, 3, 9), d(2026, 3, 11)]
        );
    }

    #[test]
    fn test_weekly_empty_days_uses_anchor_weekday() {
        let anchor = d(2026, 3, 5); // Thursday
        let appt = series(anchor, RecurrenceRule::new(Frequency::Weekly).every(2));
        let dates = occurrence_dates(&appt, d(2026, 3, 1), d(2026, 4, 30), None);
        assert_eq!(
            dates,
            vec![d(2026, 3, 5), d(2026, 3, 19), d(2026, 4, 2), d(2026, 4, 16), d(2026, 4, 30)]
        );
    }

    #[test]
    fn test_weekly_skips_days_before_anchor_in_first_week() {
        // Anchor on Wednesday with Mon/Wed/Fri: Monday of the anchor week is not emitted.
        let appt = series(
            d(2026, 3, 4),
            RecurrenceRule::new(Frequency::Weekly).on_days(&[1, 3, 5]),
        );
        let dates = occurrence_dates(&appt, d(2026, 3, 1), d(2026, 3, 9), None);
        assert_eq!(dates, vec![d(2026, 3, 4), d(2026, 3, 6), d(2026, 3, 9)]);
    }

    #[test]
    fn test_invalid_interval_and_days_are_normalized() {
        let appt = series(
            d(2026, 3, 2),
            RecurrenceRule::new(Frequency::Weekly).every(-3).on_days(&[1, 8, -2]),
        );
        let dates = occurrence_dates(&appt, d(2026, 3, 1), d(2026, 3, 22), None);
        assert_eq!(dates, vec![d(2026, 3, 2), d(2026, 3, 9), d(2026, 3, 16)]);
    }

    #[test]
    fn test_daily_window_far_after_anchor() {
        let appt = series(d(2020, 1, 1), RecurrenceRule::new(Frequency::Daily).every(10));
        let dates = occurrence_dates(&appt, d(2026, 3, 1), d(2026, 3, 31), None);
        assert!(!dates.is_empty());
        for date in &dates {
            assert_eq!((*date - d(2020, 1, 1)).num_days() % 10, 0);
        }
        assert_strictly_ascending(&dates);
    }

    #[test]
    fn test_monthly_clamps_to_month_end_without_drift() {
        let appt = series(d(2026, 1, 31), RecurrenceRule::new(Frequency::Monthly));
        let dates = occurrence_dates(&appt, d(2026, 1, 1), d(2026, 5, 31), None);
        assert_eq!(
            dates,
            vec![d(2026, 1, 31), d(2026, 2, 28), d(2026, 3, 31), d(2026, 4, 30), d(2026, 5, 31)]
        );
    }

    #[test]
    fn test_monthly_interval_crosses_year() {
        let appt = series(d(2026, 11, 15), RecurrenceRule::new(Frequency::Monthly).every(2));
        let dates = occurrence_dates(&appt, d(2027, 1, 1), d(2027, 5, 31), None);
        assert_eq!(dates, vec![d(2027, 1, 15), d(2027, 3, 15), d(2027, 5, 15)]);
    }

    #[test]
    fn test_yearly_leap_day_clamps() {
        let appt = series(d(2024, 2, 29), RecurrenceRule::new(Frequency::Yearly));
        let dates = occurrence_dates(&appt, d(2024, 1, 1), d(2028, 12, 31), None);
        assert_eq!(
            dates,
            vec![d(2024, 2, 29), d(2025, 2, 28), d(2026, 2, 28), d(2027, 2, 28), d(2028, 2, 29)]
        );
    }

    #[test]
    fn test_window_before_anchor_or_after_end_is_empty() {
        let appt = series(
            d(2026, 6, 1),
            RecurrenceRule::new(Frequency::Daily).until(d(2026, 6, 10)),
        );
        assert!(occurrence_dates(&appt, d(2026, 5, 1), d(2026, 5, 31), None).is_empty());
        assert!(occurrence_dates(&appt, d(2026, 6, 11), d(2026, 6, 30), None).is_empty());
        assert!(occurrence_dates(&appt, d(2026, 6, 30), d(2026, 6, 1), None).is_empty());
    }

    #[test]
    fn test_expansion_is_repeatable() {
        let appt = series(d(2026, 3, 2), RecurrenceRule::new(Frequency::Weekly).on_days(&[2]));
        let first = expand_occurrences(&appt, d(2026, 3, 1), d(2026, 4, 30), None);
        let second = expand_occurrences(&appt, d(2026, 3, 1), d(2026, 4, 30), None);
        assert_eq!(first, second);
        let narrowed = expand_occurrences(&appt, d(2026, 3, 15), d(2026, 3, 21), None);
        assert_eq!(narrowed.len(), 1);
        assert_eq!(narrowed[0].date(), d(2026, 3, 17));
        assert_eq!(narrowed[0].base().date, d(2026, 3, 2));
    }

    struct TableCalendar {
        to_lunar: HashMap<NaiveDate, LunarDate>,
        to_solar: HashMap<(i32, u32, u32), NaiveDate>,
    }

    impl LunarCalendar for TableCalendar {
        fn solar_to_lunar(&self, date: NaiveDate) -> Option<LunarDate> {
            self.to_lunar.get(&date).copied()
        }

        fn lunar_to_solar(&self, year: i32, month: u32, day: u32, leap: bool) -> Option<NaiveDate> {
            if leap {
                return None;
            }
            self.to_solar.get(&(year, month, day)).copied()
        }
    }

    #[test]
    fn test_lunar_yearly_recomputes_each_year() {
        let anchor = d(2026, 2, 17);
        let calendar = TableCalendar {
            to_lunar: HashMap::from([(
                anchor,
                LunarDate {
                    year: 2026,
                    month: 1,
                    day: 1,
                    is_leap_month: false,
                },
            )]),
            to_solar: HashMap::from([
                ((2027, 1, 1), d(2027, 2, 7)),
                ((2028, 1, 1), d(2028, 1, 27)),
            ]),
        };
        let appt = series(anchor, RecurrenceRule::new(Frequency::Yearly).lunar());
        let dates = occurrence_dates(&appt, d(2026, 1, 1), d(2028, 12, 31), Some(&calendar));
        assert_eq!(dates, vec![d(2026, 2, 17), d(2027, 2, 7), d(2028, 1, 27)]);

        // Without a calendar the rule degrades to solar dates.
        let solar = occurrence_dates(&appt, d(2026, 1, 1), d(2027, 12, 31), None);
        assert_eq!(solar, vec![d(2026, 2, 17), d(2027, 2, 17)]);
    }

    #[test]
    fn test_lunar_day_thirty_falls_back_to_twenty_nine() {
        let anchor = d(2026, 3, 18);
        let calendar = TableCalendar {
            to_lunar: HashMap::from([(
                anchor,
                LunarDate {
                    year: 2026,
                    month: 1,
                    day: 30,
                    is_leap_month: false,
                },
            )]),
            to_solar: HashMap::from([((2027, 1, 29), d(2027, 3, 7))]),
        };
        let appt = series(anchor, RecurrenceRule::new(Frequency::Yearly).lunar());
        let dates = occurrence_dates(&appt, d(2027, 1, 1), d(2027, 12, 31), Some(&calendar));
        assert_eq!(dates, vec![d(2027, 3, 7)]);
    }

    #[test]
    fn test_expand_all_sorts_by_date_then_time() {
        let mut morning = series(d(2026, 3, 3), RecurrenceRule::new(Frequency::Daily));
        morning.time = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        let mut single = series(d(2026, 3, 3), RecurrenceRule::new(Frequency::Daily));
        single.recurrence = None;
        single.time = NaiveTime::from_hms_opt(7, 0, 0).unwrap();

        let all = expand_all(&[morning.clone(), single.clone()], d(2026, 3, 3), d(2026, 3, 4), None);
        let ids: Vec<&str> = all.iter().map(|o| o.id()).collect();
        assert_eq!(ids, vec![single.id.as_str(), morning.id.as_str(), morning.id.as_str()]);
        assert_eq!(occurrences_on(&[morning, single], d(2026, 3, 4), None).len(), 1);
    }
}
