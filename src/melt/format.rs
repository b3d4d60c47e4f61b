//! Value formatting for typed leaf values
//!
//! Dates are the only typed values today. A date is first parsed strictly; when
//! that fails and fallback delimiters are configured, the value is split on them
//! and the parsable fragments are averaged ("Abt. 1780 - 1790" -> 1784-12-31).

use crate::melt::config::MeltConfig;
use anyhow::Result;
use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

const LOG_TARGET: &str = "gedmelt::format";

static YEAR_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,4}$").unwrap());

static MONTH_YEAR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z]{3}\s+\d{1,4}$").unwrap()
});

/// Formats leaf values according to their tag
#[derive(Debug, Clone)]
pub struct ValueFormatter {
    date_tags: Vec<String>,
    fallback: Option<Regex>,
}

impl ValueFormatter {
    pub fn new(config: &MeltConfig) -> Result<Self> {
        let fallback = match &config.force_date_delimiters {
            Some(delimiters) => Some(delimiter_regex(delimiters)?),
            None => None,
        };

        Ok(ValueFormatter {
            date_tags: config.date_tags.iter().cloned().collect(),
            fallback,
        })
    }

    /// Format `raw` for a column named after `tag`.
    ///
    /// `None` means the value could not be recovered and the column is omitted.
    pub fn format(&self, tag: &str, raw: &str) -> Option<String> {
        if !self.date_tags.iter().any(|t| t == tag) {
            return Some(raw.to_string());
        }

        if let Some(date) = parse_date(raw) {
            return Some(render(date));
        }

        let Some(fallback) = &self.fallback else {
            return Some(raw.to_string());
        };

        let millis: Vec<i64> = fallback
            .split(raw)
            .filter_map(parse_date)
            .filter_map(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().timestamp_millis())
            .collect();

        if millis.is_empty() {
            log::debug!(target: LOG_TARGET, "Dropping unparseable {} value {:?}", tag, raw);
            return None;
        }

        let count = i128::try_from(millis.len()).ok()?;
        let total: i128 = millis.iter().map(|&m| i128::from(m)).sum();
        let mean = i64::try_from(total.div_euclid(count)).ok()?;
        DateTime::from_timestamp_millis(mean).map(|dt| render(dt.date_naive()))
    }
}

/// Build a case-insensitive regex matching any delimiter plus surrounding whitespace
fn delimiter_regex(delimiters: &[String]) -> Result<Regex> {
    let alternatives: Vec<String> = delimiters
        .iter()
        .map(|d| format!(r"\s*{}\s*", regex::escape(d)))
        .collect();

    let regex = RegexBuilder::new(&alternatives.join("|"))
        .case_insensitive(true)
        .build()?;
    Ok(regex)
}

/// Strict calendar-date parse: `D MMM YYYY`, `MMM YYYY`, `YYYY` or `YYYY-MM-DD`
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if YEAR_REGEX.is_match(raw) {
        let year = raw.parse::<i32>().ok()?;
        return NaiveDate::from_ymd_opt(year, 1, 1);
    }

    if MONTH_YEAR_REGEX.is_match(raw) {
        return NaiveDate::parse_from_str(&format!("1 {}", raw), "%d %b %Y").ok();
    }

    NaiveDate::parse_from_str(raw, "%d %b %Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

fn render(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
