//! Field strategies used by the rule-based extractor.

use std::sync::OnceLock;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use regex::{Captures, Regex};

use super::{fill, ExtractionRequest, FieldStrategy, PartialDraft};
use crate::types::{Frequency, MeetingType, MAX_RECURRENCE_INTERVAL};

const TITLE_MAX_CHARS: usize = 30;

/// Words that look like a name before an honorific but are not one.
const NAME_STOPWORDS: [&str; 5] = ["고객", "손님", "사장", "선생", "담당"];

const LOCATION_SUFFIXES: &str = "역|카페|사무실|본사|지점|센터|병원|호텔|식당|회사|댁|집";

// Compile-once regex patterns via OnceLock.
fn re_iso_date() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{4})[-./](\d{1,2})[-./](\d{1,2})").unwrap())
}

fn re_korean_date() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:(\d{4})\s*년\s*)?(\d{1,2})\s*월\s*(\d{1,2})\s*일").unwrap())
}

fn re_slash_date() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})\b").unwrap())
}

fn re_weekday() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(다음\s*주|이번\s*주)?\s*([월화수목금토일])요일").unwrap())
}

fn re_time() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?P<ampm>오전|오후|아침|낮|저녁|밤)?\s*(?P<h>\d{1,2})(?::(?P<m>\d{2})|\s*시(?:\s*(?P<m2>\d{1,2})\s*분|\s*(?P<half>반))?)",
        )
        .unwrap()
    })
}

fn re_honorific_name() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([가-힣]{2,4})\s*(?:님|고객|씨)").unwrap())
}

fn re_meeting_code() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:^|[^A-Za-z0-9])(AP|PC|TA)(?:[^A-Za-z0-9]|$)").unwrap())
}

fn re_labelled_location() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:장소|위치)\s*[:：]\s*([^\n,]+)").unwrap())
}

fn re_place_location() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"([가-힣A-Za-z0-9]*(?:{LOCATION_SUFFIXES})(?:\s+[가-힣A-Za-z0-9]*(?:{LOCATION_SUFFIXES}))?)\s*에서"
        ))
        .unwrap()
    })
}

fn re_at_location() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@\s*([^\s,]+)").unwrap())
}

fn re_weekly_days() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:매주|격주)\s*((?:[월화수목금토일](?:요일)?\s*[,/·]?\s*)+)").unwrap()
    })
}

fn re_every_n_weeks() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s*주\s*(?:마다|간격)").unwrap())
}

fn re_every_n_months() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s*(?:개월|달)\s*(?:마다|간격)").unwrap())
}

/// Weekday index with 0 = Sunday.
fn weekday_index(c: char) -> Option<i32> {
    match c {
        '일' => Some(0),
        '월' => Some(1),
        '화' => Some(2),
        '수' => Some(3),
        '목' => Some(4),
        '금' => Some(5),
        '토' => Some(6),
        _ => None,
    }
}

fn cap_u32(caps: &Captures<'_>, i: usize) -> Option<u32> {
    caps.get(i).and_then(|m| m.as_str().parse().ok())
}

// =============================================================================
// Date
// =============================================================================

/// Absolute dates first (`2026-03-20`, `3월 20일`, `3/20`), then relative
/// words (`오늘`, `내일`, `모레`, `글피`), then weekdays (`다음주 화요일`).
pub struct DateStrategy;

impl DateStrategy {
    fn absolute(text: &str, reference: NaiveDate) -> Option<NaiveDate> {
        if let Some(caps) = re_iso_date().captures(text) {
            let year = caps.get(1).and_then(|m| m.as_str().parse().ok())?;
            return NaiveDate::from_ymd_opt(year, cap_u32(&caps, 2)?, cap_u32(&caps, 3)?);
        }
        if let Some(caps) = re_korean_date().captures(text) {
            let year = caps
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(reference.year());
            return NaiveDate::from_ymd_opt(year, cap_u32(&caps, 2)?, cap_u32(&caps, 3)?);
        }
        if let Some(caps) = re_slash_date().captures(text) {
            return NaiveDate::from_ymd_opt(reference.year(), cap_u32(&caps, 1)?, cap_u32(&caps, 2)?);
        }
        None
    }

    fn relative(text: &str, reference: NaiveDate) -> Option<NaiveDate> {
        const WORDS: [(&str, i64); 5] = [("오늘", 0), ("내일", 1), ("모레", 2), ("글피", 3), ("어제", -1)];
        WORDS
            .iter()
            .find(|(word, _)| text.contains(word))
            .map(|(_, offset)| reference + Duration::days(*offset))
    }

    fn weekday(text: &str, reference: NaiveDate) -> Option<NaiveDate> {
        let caps = re_weekday().captures(text)?;
        let target = caps.get(2)?.as_str().chars().next().and_then(weekday_index)? as i64;
        let current = reference.weekday().num_days_from_sunday() as i64;
        let week_start = reference - Duration::days(current);
        match caps.get(1).map(|m| m.as_str().starts_with('다')) {
            Some(true) => Some(week_start + Duration::days(7 + target)),
            Some(false) => Some(week_start + Duration::days(target)),
            None => Some(reference + Duration::days((target - current).rem_euclid(7))),
        }
    }
}

impl FieldStrategy for DateStrategy {
    fn name(&self) -> &'static str {
        "date"
    }

    fn apply(&self, request: &ExtractionRequest<'_>, draft: &mut PartialDraft) {
        if draft.date.is_some() {
            return;
        }
        let text = request.text;
        let reference = request.reference_date;
        let found = Self::absolute(text, reference)
            .or_else(|| Self::relative(text, reference))
            .or_else(|| Self::weekday(text, reference));
        if let Some(date) = found {
            fill(&mut draft.date, date);
        }
    }
}

// =============================================================================
// Time
// =============================================================================

/// `14:00`, `오후 3시`, `3시 반`, and ranges such as `3시~4시` or
/// `2시부터 4시`. A bare hour from 1 to 6 is read as afternoon.
pub struct TimeStrategy;

const RANGE_JOINERS: [&str; 5] = ["~", "-", "–", "부터", "에서"];

struct ParsedTime {
    hour: u32,
    minute: u32,
    has_meridiem: bool,
}

impl TimeStrategy {
    fn parse(caps: &Captures<'_>) -> Option<ParsedTime> {
        let raw_hour: u32 = caps.name("h")?.as_str().parse().ok()?;
        let minute = match (caps.name("m"), caps.name("m2"), caps.name("half")) {
            (Some(m), _, _) | (None, Some(m), _) => m.as_str().parse().ok()?,
            (None, None, Some(_)) => 30,
            _ => 0,
        };
        let meridiem = caps.name("ampm").map(|m| m.as_str());
        let hour = match meridiem {
            Some("오후") | Some("저녁") | Some("밤") if raw_hour < 12 => raw_hour + 12,
            Some("낮") if raw_hour < 6 => raw_hour + 12,
            Some("오전") | Some("아침") if raw_hour == 12 => 0,
            None if (1..=6).contains(&raw_hour) => raw_hour + 12,
            _ => raw_hour,
        };
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(ParsedTime {
            hour,
            minute,
            has_meridiem: meridiem.is_some(),
        })
    }
}

impl FieldStrategy for TimeStrategy {
    fn name(&self) -> &'static str {
        "time"
    }

    fn apply(&self, request: &ExtractionRequest<'_>, draft: &mut PartialDraft) {
        if draft.time.is_some() {
            return;
        }
        let text = request.text;
        let mut matches = re_time().captures_iter(text);
        let Some(first) = matches.next() else {
            return;
        };
        let Some(start) = Self::parse(&first) else {
            return;
        };
        let Some(start_time) = NaiveTime::from_hms_opt(start.hour, start.minute, 0) else {
            return;
        };
        fill(&mut draft.time, start_time);

        let Some(second) = matches.next() else {
            return;
        };
        let (Some(first_m), Some(second_m)) = (first.get(0), second.get(0)) else {
            return;
        };
        if first_m.end() > second_m.start() {
            return;
        }
        let between = text[first_m.end()..second_m.start()].trim();
        if !RANGE_JOINERS.contains(&between) {
            return;
        }
        if let Some(mut end) = Self::parse(&second) {
            if !end.has_meridiem && end.hour < start.hour && end.hour + 12 <= 23 {
                end.hour += 12;
            }
            if let Some(end_time) = NaiveTime::from_hms_opt(end.hour, end.minute, 0) {
                if end_time >= start_time {
                    fill(&mut draft.end_time, end_time);
                }
            }
        }
    }
}

// =============================================================================
// Customer
// =============================================================================

/// Seed name, then the longest roster name found in the text, then a
/// `<name>님 / 고객 / 씨` pattern. Only a unique roster match carries an id.
pub struct CustomerStrategy;

impl FieldStrategy for CustomerStrategy {
    fn name(&self) -> &'static str {
        "customer"
    }

    fn apply(&self, request: &ExtractionRequest<'_>, draft: &mut PartialDraft) {
        if draft.customer_name.is_some() {
            return;
        }
        let roster: Vec<_> = request
            .customers
            .iter()
            .filter(|c| !c.archived && !c.name.trim().is_empty())
            .collect();

        let name = request
            .seed_customer_name
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| {
                roster
                    .iter()
                    .map(|c| c.name.trim())
                    .filter(|n| request.text.contains(n))
                    .max_by_key(|n| n.chars().count())
                    .map(str::to_string)
            })
            .or_else(|| {
                re_honorific_name()
                    .captures_iter(request.text)
                    .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
                    .find(|n| !NAME_STOPWORDS.contains(&n.as_str()))
            });

        let Some(name) = name else {
            return;
        };
        let exact: Vec<_> = roster.iter().filter(|c| c.name.trim() == name).collect();
        if let [only] = exact.as_slice() {
            fill(&mut draft.customer_id, only.id.clone());
        }
        fill(&mut draft.customer_name, name);
    }
}

// =============================================================================
// Meeting type
// =============================================================================

/// Meeting codes and keywords for customer meetings, the user's personal
/// type vocabulary for memos. A matched personal type also becomes the title.
pub struct MeetingTypeStrategy;

const TYPE_KEYWORDS: [(&str, MeetingType); 7] = [
    ("청약", MeetingType::Pc),
    ("클로징", MeetingType::Pc),
    ("제안", MeetingType::Pc),
    ("초회", MeetingType::Ap),
    ("첫만남", MeetingType::Ap),
    ("첫 만남", MeetingType::Ap),
    ("통화", MeetingType::Ta),
];

impl MeetingTypeStrategy {
    fn customer_type(request: &ExtractionRequest<'_>) -> Option<MeetingType> {
        if let Some(caps) = re_meeting_code().captures(request.text) {
            return Some(MeetingType::from(caps[1].to_uppercase()));
        }
        if let Some((_, t)) = TYPE_KEYWORDS.iter().find(|(k, _)| request.text.contains(k)) {
            return Some(t.clone());
        }
        request
            .customer_types
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .find(|t| request.text.contains(t))
            .map(MeetingType::from)
    }

    fn personal_type(request: &ExtractionRequest<'_>) -> Option<String> {
        request
            .personal_types
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .find(|t| request.text.contains(t))
            .map(str::to_string)
    }
}

impl FieldStrategy for MeetingTypeStrategy {
    fn name(&self) -> &'static str {
        "meeting_type"
    }

    fn apply(&self, request: &ExtractionRequest<'_>, draft: &mut PartialDraft) {
        if draft.meeting_type.is_some() {
            return;
        }
        if draft.customer_name.is_some() {
            if let Some(t) = Self::customer_type(request) {
                fill(&mut draft.meeting_type, t);
            }
            return;
        }
        if let Some(personal) = Self::personal_type(request) {
            fill(&mut draft.title, personal.clone());
            fill(&mut draft.meeting_type, MeetingType::Custom(personal));
        } else if let Some(t) = Self::customer_type(request) {
            fill(&mut draft.meeting_type, t);
        }
    }
}

// =============================================================================
// Location
// =============================================================================

/// `장소: …`, then `<place>에서`, then `@place`.
pub struct LocationStrategy;

impl FieldStrategy for LocationStrategy {
    fn name(&self) -> &'static str {
        "location"
    }

    fn apply(&self, request: &ExtractionRequest<'_>, draft: &mut PartialDraft) {
        if draft.location.is_some() {
            return;
        }
        let found = [re_labelled_location(), re_place_location(), re_at_location()]
            .iter()
            .find_map(|re| {
                re.captures(request.text)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|s| !s.is_empty())
            });
        if let Some(location) = found {
            fill(&mut draft.location, location);
        }
    }
}

// =============================================================================
// Recurrence
// =============================================================================

/// `매일`, `매주 월, 수`, `격주`, `N주마다`, `매달`, `N개월마다`, `매년`.
pub struct RecurrenceStrategy;

impl RecurrenceStrategy {
    fn weekly_days(text: &str) -> Vec<i32> {
        let Some(caps) = re_weekly_days().captures(text) else {
            return Vec::new();
        };
        let listed = caps.get(1).map(|m| m.as_str().replace("요일", "")).unwrap_or_default();
        let mut days = Vec::new();
        for day in listed.chars().filter_map(weekday_index) {
            if !days.contains(&day) {
                days.push(day);
            }
        }
        days
    }
}

impl FieldStrategy for RecurrenceStrategy {
    fn name(&self) -> &'static str {
        "recurrence"
    }

    fn apply(&self, request: &ExtractionRequest<'_>, draft: &mut PartialDraft) {
        if draft.frequency.is_some() {
            return;
        }
        let text = request.text;
        let every_n = |re: &Regex| {
            re.captures(text)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<i32>().ok())
                .filter(|n| (1..=MAX_RECURRENCE_INTERVAL).contains(n))
        };

        let (frequency, interval) = if text.contains("매일") {
            (Frequency::Daily, 1)
        } else if text.contains("격주") {
            (Frequency::Weekly, 2)
        } else if let Some(n) = every_n(re_every_n_weeks()) {
            (Frequency::Weekly, n)
        } else if text.contains("매주") {
            (Frequency::Weekly, 1)
        } else if let Some(n) = every_n(re_every_n_months()) {
            (Frequency::Monthly, n)
        } else if text.contains("매달") || text.contains("매월") {
            (Frequency::Monthly, 1)
        } else if text.contains("매년") || text.contains("해마다") {
            (Frequency::Yearly, 1)
        } else {
            return;
        };

        if frequency == Frequency::Weekly {
            draft.recurrence_days = Self::weekly_days(text);
        }
        fill(&mut draft.recurrence_interval, interval);
        fill(&mut draft.frequency, frequency);
    }
}

// =============================================================================
// Title
// =============================================================================

/// Memos without a customer get their first line as the title.
pub struct TitleStrategy;

impl FieldStrategy for TitleStrategy {
    fn name(&self) -> &'static str {
        "title"
    }

    fn apply(&self, request: &ExtractionRequest<'_>, draft: &mut PartialDraft) {
        if draft.title.is_some() || draft.customer_name.is_some() {
            return;
        }
        let first_line = request
            .text
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or_default();
        let title: String = first_line.chars().take(TITLE_MAX_CHARS).collect();
        if !title.is_empty() {
            fill(&mut draft.title, title);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::types::Customer;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn run(strategy: &dyn FieldStrategy, text: &str, customers: &[Customer]) -> PartialDraft {
        let request = ExtractionRequest {
            text,
            customers,
            customer_types: &[],
            personal_types: &[],
            seed_customer_name: None,
            // Tuesday
            reference_date: d(2026, 3, 10),
            default_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        };
        let mut draft = PartialDraft::default();
        strategy.apply(&request, &mut draft);
        draft
    }

    #[test]
    fn test_dates() {
        assert_eq!(run(&DateStrategy, "2026-04-01 미팅", &[]).date, Some(d(2026, 4, 1)));
        assert_eq!(run(&DateStrategy, "4월 3일 상담", &[]).date, Some(d(2026, 4, 3)));
        assert_eq!(run(&DateStrategy, "모레 방문", &[]).date, Some(d(2026, 3, 12)));
        assert_eq!(run(&DateStrategy, "금요일 점심", &[]).date, Some(d(2026, 3, 13)));
        assert_eq!(run(&DateStrategy, "화요일 점심", &[]).date, Some(d(2026, 3, 10)));
        assert_eq!(run(&DateStrategy, "다음주 월요일", &[]).date, Some(d(2026, 3, 16)));
        assert_eq!(run(&DateStrategy, "이번주 목요일", &[]).date, Some(d(2026, 3, 12)));
        assert_eq!(run(&DateStrategy, "2월 30일", &[]).date, None);
    }

    #[test]
    fn test_times() {
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert_eq!(run(&TimeStrategy, "10:30 미팅", &[]).time, Some(t(10, 30)));
        assert_eq!(run(&TimeStrategy, "오후 2시 반", &[]).time, Some(t(14, 30)));
        assert_eq!(run(&TimeStrategy, "3시 15분", &[]).time, Some(t(15, 15)));
        assert_eq!(run(&TimeStrategy, "오전 11시", &[]).time, Some(t(11, 0)));

        let range = run(&TimeStrategy, "오전 11시부터 1시", &[]);
        assert_eq!(range.time, Some(t(11, 0)));
        assert_eq!(range.end_time, Some(t(13, 0)));

        let unrelated = run(&TimeStrategy, "10시 미팅 후 12시 점심", &[]);
        assert_eq!(unrelated.end_time, None);
    }

    #[test]
    fn test_customer_prefers_longest_roster_name() {
        let short = Customer::new("김민", Utc::now());
        let long = Customer::new("김민준", Utc::now());
        let draft = run(&CustomerStrategy, "김민준 고객 미팅", &[short, long.clone()]);
        assert_eq!(draft.customer_name.as_deref(), Some("김민준"));
        assert_eq!(draft.customer_id, Some(long.id));
    }

    #[test]
    fn test_homonyms_keep_name_without_id() {
        let a = Customer::new("이서연", Utc::now());
        let b = Customer::new("이서연", Utc::now());
        let draft = run(&CustomerStrategy, "이서연님 상담", &[a, b]);
        assert_eq!(draft.customer_name.as_deref(), Some("이서연"));
        assert!(draft.customer_id.is_none());
    }

    #[test]
    fn test_locations() {
        assert_eq!(
            run(&LocationStrategy, "장소: 삼성동 본사 3층", &[]).location.as_deref(),
            Some("삼성동 본사 3층")
        );
        assert_eq!(
            run(&LocationStrategy, "내일 판교역에서 만남", &[]).location.as_deref(),
            Some("판교역")
        );
    }

    #[test]
    fn test_recurrence_patterns() {
        let biweekly = run(&RecurrenceStrategy, "격주 금요일 보고", &[]);
        assert_eq!(biweekly.frequency, Some(Frequency::Weekly));
        assert_eq!(biweekly.recurrence_interval, Some(2));
        assert_eq!(biweekly.recurrence_days, vec![5]);

        let monthly = run(&RecurrenceStrategy, "3개월마다 점검", &[]);
        assert_eq!(monthly.frequency, Some(Frequency::Monthly));
        assert_eq!(monthly.recurrence_interval, Some(3));

        assert_eq!(run(&RecurrenceStrategy, "매년 생일", &[]).frequency, Some(Frequency::Yearly));
        assert_eq!(run(&RecurrenceStrategy, "한 번만", &[]).frequency, None);
    }

    #[test]
    fn test_out_of_range_repeat_count_is_not_taken() {
        let huge = run(&RecurrenceStrategy, "20000000주마다 회의", &[]);
        assert_eq!(huge.frequency, None);
        assert_eq!(huge.recurrence_interval, None);

        let zero = run(&RecurrenceStrategy, "0개월마다 매월 점검", &[]);
        assert_eq!(zero.frequency, Some(Frequency::Monthly));
        assert_eq!(zero.recurrence_interval, Some(1));

        let ok = run(&RecurrenceStrategy, "999주마다 회의", &[]);
        assert_eq!(ok.recurrence_interval, Some(999));
    }
}
