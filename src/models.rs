use serde::{Deserialize, Serialize};

/// Contact name the backup app writes when the number is not in the address book.
pub const UNKNOWN_CONTACT: &str = "(Unknown)";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Received,
    Sent,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Received => "received",
            Direction::Sent => "sent",
        }
    }

    /// Backup files mark incoming messages with `1` (`type` for SMS, `msg_box` for MMS).
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "1" => Direction::Received,
            _ => Direction::Sent,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Sms,
    Mms,
}

/// One `<sms>` or `<mms>` element as found in the backup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub kind: RecordKind,
    pub address: String,
    pub contact_name: String,
    pub body: String,
    pub direction: Direction,
    pub readable_date: String,
}

/// Display fragments derived from a readable date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DateParts {
    /// `YYYY-MM-DD`, used to group messages by calendar day
    pub day_key: String,
    pub weekday: String,
    /// e.g. `giovedì 5 gennaio 2023`
    pub day_label: String,
    pub month: String,
    pub year: i32,
    /// `HH:mm`
    pub time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub direction: Direction,
    pub readable_date: String,
    /// Seconds since the Unix epoch; `None` when the readable date did not parse.
    pub epoch: Option<i64>,
    pub date: Option<DateParts>,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub number: String,
    pub contact_name: String,
    pub messages: Vec<Message>,
}

impl Thread {
    pub fn new(number: String, contact_name: String) -> Self {
        Self { number, contact_name, messages: Vec::new() }
    }

    pub fn has_known_contact(&self) -> bool {
        let name = self.contact_name.trim();
        !name.is_empty() && name != UNKNOWN_CONTACT
    }

    /// Contact name, or the phone number when the contact is unknown.
    pub fn display_label(&self) -> &str {
        if self.has_known_contact() {
            &self.contact_name
        } else {
            &self.number
        }
    }
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AggregateReport {
    pub records_seen: usize,
    pub messages_kept: usize,
    pub duplicates_skipped: usize,
    pub warnings: Vec<String>,
    pub threads: Vec<Thread>,
}
