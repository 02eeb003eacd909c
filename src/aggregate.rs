//! Thread aggregation.
//!
//! One pass over the records: normalize the address, drop (number, body)
//! duplicates, bucket per number, derive date fields. Threads and messages
//! are sorted before being handed back.

use crate::error::Result;
use crate::locale::LocaleTable;
use crate::models::{AggregateReport, Message, Record, Thread};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

pub const DEFAULT_COUNTRY_PREFIX: &str = "+39";

/// ASCII unit separator; cannot appear in a phone number.
const DEDUPE_SEPARATOR: char = '\u{1f}';

#[derive(Debug, Clone)]
pub struct AggregateOptions {
    pub country_prefix: String,
    pub locale: LocaleTable,
    /// Abort on the first unparsable `readable_date` instead of warning.
    pub strict_dates: bool,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            country_prefix: DEFAULT_COUNTRY_PREFIX.to_string(),
            locale: LocaleTable::italian(),
            strict_dates: false,
        }
    }
}

/// Strip the country-code prefix when the address starts with it.
/// Nothing else is touched: spaces, dashes and `00` prefixes survive.
pub fn normalize_phone_number(raw: &str, prefix: &str) -> String {
    if prefix.is_empty() {
        return raw.to_string();
    }
    raw.strip_prefix(prefix).unwrap_or(raw).to_string()
}

pub fn dedupe_key(number: &str, body: &str) -> String {
    format!("{number}{DEDUPE_SEPARATOR}{body}")
}

/// Group records into sorted threads.
///
/// The first contact name seen for a number names the thread. Only the first
/// record of each (number, body) pair is kept.
pub fn build_threads(records: &[Record], options: &AggregateOptions) -> Result<AggregateReport> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut by_number: HashMap<String, Thread> = HashMap::new();
    let mut report = AggregateReport {
        records_seen: records.len(),
        ..Default::default()
    };

    for record in records {
        let number = normalize_phone_number(&record.address, &options.country_prefix);
        let thread = by_number
            .entry(number.clone())
            .or_insert_with(|| Thread::new(number.clone(), record.contact_name.clone()));

        if !seen.insert(dedupe_key(&number, &record.body)) {
            debug!(number = %number, date = %record.readable_date, "skipping duplicate message");
            report.duplicates_skipped += 1;
            continue;
        }

        let message = build_message(record, &number, options, &mut report.warnings)?;
        thread.messages.push(message);
        report.messages_kept += 1;
    }

    let mut threads: Vec<Thread> = by_number.into_values().collect();
    for thread in &mut threads {
        sort_messages(thread);
    }
    sort_threads(&mut threads);

    info!(
        records = report.records_seen,
        threads = threads.len(),
        kept = report.messages_kept,
        duplicates = report.duplicates_skipped,
        "aggregated messages"
    );

    report.threads = threads;
    Ok(report)
}

fn build_message(
    record: &Record,
    number: &str,
    options: &AggregateOptions,
    warnings: &mut Vec<String>,
) -> Result<Message> {
    let (epoch, date) = match options.locale.parse_datetime(&record.readable_date) {
        Ok(dt) => (Some(dt.and_utc().timestamp()), Some(options.locale.date_parts(&dt))),
        Err(e) if options.strict_dates => return Err(e),
        Err(e) => {
            warn!(number = %number, date = %record.readable_date, "unparsable date, message placed last in its thread");
            warnings.push(format!("{number}: {e}"));
            (None, None)
        }
    };

    Ok(Message {
        direction: record.direction,
        readable_date: record.readable_date.clone(),
        epoch,
        date,
        body: record.body.clone(),
    })
}

/// Ascending by epoch; equal timestamps keep encounter order and undated
/// messages go last.
pub fn sort_messages(thread: &mut Thread) {
    thread.messages.sort_by_key(|m| (m.epoch.is_none(), m.epoch));
}

/// Ascending by display label (plain `str` ordering, case-sensitive), then by number.
pub fn sort_threads(threads: &mut [Thread]) {
    threads.sort_by(|a, b| {
        a.display_label()
            .cmp(b.display_label())
            .then_with(|| a.number.cmp(&b.number))
    });
}
