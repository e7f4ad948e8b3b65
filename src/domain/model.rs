use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 來源檔案中未經驗證的一列資料
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub name: String,
    pub email: String,
    pub date_of_birth: String,
}

impl RawRecord {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        date_of_birth: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            date_of_birth: date_of_birth.into(),
        }
    }
}

/// A validated row. Only the cleaner can build one, so every instance has a
/// title-cased name, a lower-cased valid email and a real calendar date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanRecord {
    name: String,
    email: String,
    date_of_birth: NaiveDate,
}

impl CleanRecord {
    pub(crate) fn new(name: String, email: String, date_of_birth: NaiveDate) -> Self {
        Self {
            name,
            email,
            date_of_birth,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn first_name(&self) -> &str {
        self.name.split(' ').next().unwrap_or(&self.name)
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn date_of_birth(&self) -> NaiveDate {
        self.date_of_birth
    }

    pub fn birth_year(&self) -> i32 {
        self.date_of_birth.year()
    }

    pub fn birth_month(&self) -> u32 {
        self.date_of_birth.month()
    }

    pub fn birth_day(&self) -> u32 {
        self.date_of_birth.day()
    }
}

impl From<&CleanRecord> for RawRecord {
    fn from(record: &CleanRecord) -> Self {
        RawRecord {
            name: record.name.clone(),
            email: record.email.clone(),
            date_of_birth: record.date_of_birth.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Flat row shape used by the CSV and JSON writers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanRow {
    pub name: String,
    pub email: String,
    pub dob: String,
    pub birth_year: i32,
    pub birth_month: u32,
    pub birth_day: u32,
}

impl From<&CleanRecord> for CleanRow {
    fn from(record: &CleanRecord) -> Self {
        CleanRow {
            name: record.name.clone(),
            email: record.email.clone(),
            dob: record.date_of_birth.format("%Y-%m-%d").to_string(),
            birth_year: record.birth_year(),
            birth_month: record.birth_month(),
            birth_day: record.birth_day(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    MissingName,
    InvalidEmail,
    UnparseableDate,
    InvalidCalendarDate,
    AmbiguousDate,
    DuplicateEmail,
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::MissingName => "MISSING_NAME",
            RejectReason::InvalidEmail => "INVALID_EMAIL",
            RejectReason::UnparseableDate => "UNPARSEABLE_DATE",
            RejectReason::InvalidCalendarDate => "INVALID_CALENDAR_DATE",
            RejectReason::AmbiguousDate => "AMBIGUOUS_DATE",
            RejectReason::DuplicateEmail => "DUPLICATE_EMAIL",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// 1-based position of the row in the source, header excluded.
    pub row: usize,
    pub record: RawRecord,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanResult {
    pub records: Vec<CleanRecord>,
    pub rejections: Vec<Rejection>,
}

/// The (month, day) a run matches against; the year never takes part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceDate {
    pub month: u32,
    pub day: u32,
}

impl ReferenceDate {
    pub fn new(month: u32, day: u32) -> Self {
        Self { month, day }
    }
}

impl From<NaiveDate> for ReferenceDate {
    fn from(date: NaiveDate) -> Self {
        Self {
            month: date.month(),
            day: date.day(),
        }
    }
}

impl fmt::Display for ReferenceDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub record: CleanRecord,
    pub reference: ReferenceDate,
}

/// What a notifier delivers: destination, display name and rendered content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub to: String,
    pub name: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationOutcome {
    pub name: String,
    pub email: String,
    /// `None` when delivered, otherwise the failure reason.
    pub error: Option<String>,
}

impl NotificationOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifySummary {
    pub outcomes: Vec<NotificationOutcome>,
}

impl NotifySummary {
    pub fn sent(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.sent()
    }

    pub fn failures(&self) -> impl Iterator<Item = &NotificationOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFilenames {
    pub cleaned_csv: String,
    pub rejected_csv: String,
    pub cleaned_json: String,
    pub cleaned_xlsx: String,
    pub report_json: String,
}

impl Default for OutputFilenames {
    fn default() -> Self {
        Self {
            cleaned_csv: "cleaned_birthdays.csv".to_string(),
            rejected_csv: "rejected_birthdays.csv".to_string(),
            cleaned_json: "cleaned_birthdays.json".to_string(),
            cleaned_xlsx: "cleaned_birthdays.xlsx".to_string(),
            report_json: "run_report.json".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub extracted: usize,
    pub cleaned: CleanResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_date: NaiveDate,
    pub reference: ReferenceDate,
    pub extracted: usize,
    pub cleaned: usize,
    pub rejected: Vec<Rejection>,
    pub matched: Vec<Recipient>,
    pub notifications_sent: usize,
    pub notifications_failed: Vec<NotificationOutcome>,
    pub artifacts: Vec<String>,
}
