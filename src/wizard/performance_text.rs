//! One-line performance shortcut parser.
//!
//! Turns notes like `어제 삼성생명 종신보험 월 15만원 인정실적 30만원` into a
//! pre-filled PC success form. Every field is best effort; the user reviews
//! the result before confirming.

use std::sync::OnceLock;

use chrono::{Duration, NaiveDate};
use regex::Regex;

use super::PerformanceInput;

/// Words that mark an amount as recognized performance rather than premium.
const RECOGNIZED_MARKERS: [&str; 2] = ["실적", "인정"];

/// How many characters before an amount are searched for a marker.
const MARKER_LOOKBACK_CHARS: usize = 10;

const INSURER_KEYWORDS: [&str; 5] = ["생명", "손보", "라이프", "화재", "해상"];

/// Filler words dropped when the product name is taken from leftovers.
const FILLER_WORDS: [&str; 6] = ["어제", "오늘", "월", "월납", "보험료", "계약"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceDraft {
    pub application_date: Option<NaiveDate>,
    pub premium: Option<i64>,
    pub recognized_performance: Option<i64>,
    pub insurance_company: Option<String>,
    pub coverage_category: Option<String>,
    pub product_name: Option<String>,
}

impl PerformanceDraft {
    /// Fill the wizard form; unknown amounts become 0 and unknown text empty.
    pub fn into_input(self) -> PerformanceInput {
        PerformanceInput {
            application_date: self
                .application_date
                .unwrap_or_else(|| chrono::Local::now().date_naive()),
            insurance_company: self.insurance_company.unwrap_or_default(),
            product_name: self.product_name.unwrap_or_default(),
            premium: self.premium.unwrap_or(0),
            recognized_performance: self.recognized_performance.unwrap_or(0),
            coverage_category: self.coverage_category,
        }
    }
}

fn re_amount() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d[\d,]*(?:\.\d+)?)\s*(만\s*원|원)").unwrap())
}

fn re_product_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[@#](\S+)").unwrap())
}

fn amount_in_won(number: &str, unit: &str) -> Option<i64> {
    let value: f64 = number.replace(',', "").parse().ok()?;
    let multiplier = if unit.starts_with('만') { 10_000.0 } else { 1.0 };
    Some((value * multiplier).round() as i64)
}

/// Last `MARKER_LOOKBACK_CHARS` characters of `prefix`.
fn lookback(prefix: &str) -> String {
    let tail: Vec<char> = prefix.chars().rev().take(MARKER_LOOKBACK_CHARS).collect();
    tail.into_iter().rev().collect()
}

fn trim_token(token: &str) -> &str {
    token.trim_matches(|c: char| c.is_ascii_punctuation() || c == '·')
}

/// Parse a free-text performance note. `today` anchors relative dates;
/// `categories` is the coverage vocabulary, matched in order.
pub fn parse_performance_text(text: &str, today: NaiveDate, categories: &[String]) -> PerformanceDraft {
    let mut draft = PerformanceDraft {
        application_date: Some(if text.contains("어제") {
            today - Duration::days(1)
        } else {
            today
        }),
        ..PerformanceDraft::default()
    };

    // Amounts: a marker shortly before the number routes it to recognized
    // performance, everything else is premium. First of each kind wins.
    for caps in re_amount().captures_iter(text) {
        let (Some(whole), Some(number), Some(unit)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let Some(won) = amount_in_won(number.as_str(), unit.as_str()) else {
            continue;
        };
        let window = lookback(&text[..whole.start()]);
        let is_recognized = RECOGNIZED_MARKERS.iter().any(|m| window.contains(m));
        if is_recognized {
            draft.recognized_performance.get_or_insert(won);
        } else {
            draft.premium.get_or_insert(won);
        }
    }

    let without_amounts = re_amount().replace_all(text, " ").into_owned();

    let insurer = without_amounts
        .split_whitespace()
        .map(trim_token)
        .find(|token| INSURER_KEYWORDS.iter().any(|k| token.contains(k)))
        .map(str::to_string);

    let category_source = match &insurer {
        Some(name) => without_amounts.replace(name.as_str(), " "),
        None => without_amounts.clone(),
    };
    draft.coverage_category = categories
        .iter()
        .find(|c| !c.is_empty() && category_source.contains(c.as_str()))
        .cloned();

    draft.product_name = match re_product_token().captures(text) {
        Some(caps) => Some(trim_token(&caps[1]).to_string()).filter(|s| !s.is_empty()),
        None => {
            let leftover: Vec<&str> = category_source
                .split_whitespace()
                .map(trim_token)
                .filter(|w| !w.is_empty())
                .filter(|w| !FILLER_WORDS.contains(w))
                .filter(|w| {
                    let stripped = RECOGNIZED_MARKERS
                        .iter()
                        .fold(w.to_string(), |acc, m| acc.replace(m, ""));
                    !stripped.trim().is_empty()
                })
                .collect();
            Some(leftover.join(" ")).filter(|s| !s.is_empty())
        }
    };
    draft.insurance_company = insurer;

    draft
}
