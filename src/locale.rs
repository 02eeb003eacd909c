//! Locale table for the backup's human-readable dates.
//!
//! Backups written on an Italian phone carry `readable_date` values such as
//! `05/gen/2023 14:03:22`. The table maps month abbreviations to numbers and
//! supplies the weekday/month names used in the report's day headers. It is a
//! plain value handed to the aggregator, so other locales are a matter of
//! building another table.

use crate::error::{ReportError, Result};
use crate::models::DateParts;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

const ITALIAN_MONTHS: [(&str, &str); 12] = [
    ("gen", "gennaio"),
    ("feb", "febbraio"),
    ("mar", "marzo"),
    ("apr", "aprile"),
    ("mag", "maggio"),
    ("giu", "giugno"),
    ("lug", "luglio"),
    ("ago", "agosto"),
    ("set", "settembre"),
    ("ott", "ottobre"),
    ("nov", "novembre"),
    ("dic", "dicembre"),
];

/// Monday first, matching `chrono::Weekday::num_days_from_monday`.
const ITALIAN_WEEKDAYS: [&str; 7] = [
    "lunedì",
    "martedì",
    "mercoledì",
    "giovedì",
    "venerdì",
    "sabato",
    "domenica",
];

fn build_timestamp_regex() -> Regex {
    Regex::new(r"^\s*(\d{1,2})/([^/\s]+)/(\d{4})\s+(\d{1,2}):(\d{2}):(\d{2})\s*$").unwrap()
}

#[derive(Debug, Clone)]
pub struct LocaleTable {
    /// (abbreviation, full name), January first
    months: Vec<(String, String)>,
    /// Monday first
    weekdays: Vec<String>,
    pattern: Regex,
}

impl Default for LocaleTable {
    fn default() -> Self {
        Self::italian()
    }
}

impl LocaleTable {
    pub fn new(months: [(&str, &str); 12], weekdays: [&str; 7]) -> Self {
        Self {
            months: months
                .iter()
                .map(|(abbrev, full)| (abbrev.to_lowercase(), full.to_string()))
                .collect(),
            weekdays: weekdays.iter().map(|d| d.to_string()).collect(),
            pattern: build_timestamp_regex(),
        }
    }

    pub fn italian() -> Self {
        Self::new(ITALIAN_MONTHS, ITALIAN_WEEKDAYS)
    }

    /// Month number (1-12) for an abbreviation or full name.
    /// Case-insensitive; a trailing `.` (`gen.`) is ignored.
    pub fn month_number(&self, name: &str) -> Option<u32> {
        let needle = name.trim().trim_end_matches('.').to_lowercase();
        self.months
            .iter()
            .position(|(abbrev, full)| *abbrev == needle || full.to_lowercase() == needle)
            .map(|i| i as u32 + 1)
    }

    fn month_name(&self, month: u32) -> &str {
        self.months
            .get(month as usize - 1)
            .map(|(_, full)| full.as_str())
            .unwrap_or_default()
    }

    /// Parse `DD/<mon>/YYYY HH:mm:ss` into a wall-clock date time.
    pub fn parse_datetime(&self, text: &str) -> Result<NaiveDateTime> {
        let invalid = || ReportError::Timestamp { text: text.to_string() };

        let caps = self.pattern.captures(text).ok_or_else(invalid)?;
        let field = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or_default();

        let day: u32 = field(1).parse().map_err(|_| invalid())?;
        let month = self.month_number(field(2)).ok_or_else(invalid)?;
        let year: i32 = field(3).parse().map_err(|_| invalid())?;
        let hour: u32 = field(4).parse().map_err(|_| invalid())?;
        let minute: u32 = field(5).parse().map_err(|_| invalid())?;
        let second: u32 = field(6).parse().map_err(|_| invalid())?;

        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)?;
        let time = NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(invalid)?;
        Ok(NaiveDateTime::new(date, time))
    }

    /// Seconds since the Unix epoch. The backup carries no zone, so the
    /// wall-clock value is read as UTC; only the ordering matters downstream.
    pub fn parse_timestamp(&self, text: &str) -> Result<i64> {
        Ok(self.parse_datetime(text)?.and_utc().timestamp())
    }

    pub fn date_parts(&self, dt: &NaiveDateTime) -> DateParts {
        let weekday = self
            .weekdays
            .get(dt.weekday().num_days_from_monday() as usize)
            .cloned()
            .unwrap_or_default();
        let month = self.month_name(dt.month()).to_string();

        DateParts {
            day_key: dt.format("%Y-%m-%d").to_string(),
            day_label: format!("{} {} {} {}", weekday, dt.day(), month, dt.year()),
            weekday,
            month,
            year: dt.year(),
            time: dt.format("%H:%M").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_lookup() {
        let table = LocaleTable::italian();
        assert_eq!(table.month_number("gen"), Some(1));
        assert_eq!(table.month_number("Dic."), Some(12));
        assert_eq!(table.month_number("settembre"), Some(9));
        assert_eq!(table.month_number("jan"), None);
    }

    #[test]
    fn test_parse_timestamp() {
        let table = LocaleTable::italian();
        assert_eq!(table.parse_timestamp("05/gen/2023 14:03:22").unwrap(), 1_672_927_402);
        assert_eq!(table.parse_timestamp("1/gen/1970 00:00:00").unwrap(), 0);
    }

    #[test]
    fn test_parse_timestamp_rejects_mismatches() {
        let table = LocaleTable::italian();
        for text in ["", "05/jan/2023 14:03:22", "2023-01-05 14:03:22", "31/feb/2023 10:00:00", "05/gen/2023 25:00:00"] {
            assert!(
                matches!(table.parse_timestamp(text), Err(ReportError::Timestamp { .. })),
                "{text:?} should not parse"
            );
        }
    }

    #[test]
    fn test_date_parts() {
        let table = LocaleTable::italian();
        let dt = table.parse_datetime("05/gen/2023 14:03:22").unwrap();
        let parts = table.date_parts(&dt);
        assert_eq!(parts.day_key, "2023-01-05");
        assert_eq!(parts.weekday, "giovedì");
        assert_eq!(parts.day_label, "giovedì 5 gennaio 2023");
        assert_eq!(parts.month, "gennaio");
        assert_eq!(parts.year, 2023);
        assert_eq!(parts.time, "14:03");
    }

    #[test]
    fn test_custom_table() {
        let english = LocaleTable::new(
            [
                ("jan", "January"), ("feb", "February"), ("mar", "March"), ("apr", "April"),
                ("may", "May"), ("jun", "June"), ("jul", "July"), ("aug", "August"),
                ("sep", "September"), ("oct", "October"), ("nov", "November"), ("dec", "December"),
            ],
            ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"],
        );
        let dt = english.parse_datetime("05/Jan/2023 14:03:22").unwrap();
        assert_eq!(english.date_parts(&dt).day_label, "Thursday 5 January 2023");
    }
}
