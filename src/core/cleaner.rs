use crate::core::dates::{parse_date, parse_date_strict, DateParseError};
use crate::domain::model::{CleanRecord, CleanResult, RawRecord, RejectReason, Rejection};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}$").expect("valid email regex")
});

/// Normalizes, validates and deduplicates raw rows in a single pass.
///
/// Malformed rows never abort cleaning; they come back as [`Rejection`]s with
/// the row number and reason code.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataCleaner {
    reject_ambiguous_dates: bool,
}

impl DataCleaner {
    pub fn new(reject_ambiguous_dates: bool) -> Self {
        Self {
            reject_ambiguous_dates,
        }
    }

    pub fn clean(&self, raw_records: Vec<RawRecord>) -> CleanResult {
        tracing::info!("🧹 Cleaning {} raw records", raw_records.len());

        let mut result = CleanResult::default();
        let mut seen_emails = HashSet::new();

        for (index, raw) in raw_records.into_iter().enumerate() {
            let row = index + 1;
            let outcome = self.clean_record(&raw).and_then(|record| {
                // 先到先得：保留第一筆出現的 email
                if seen_emails.insert(record.email().to_string()) {
                    Ok(record)
                } else {
                    Err(RejectReason::DuplicateEmail)
                }
            });

            match outcome {
                Ok(record) => result.records.push(record),
                Err(reason) => {
                    tracing::debug!("Row {} rejected: {} ({:?})", row, reason, raw);
                    result.rejections.push(Rejection {
                        row,
                        record: raw,
                        reason,
                    });
                }
            }
        }

        if !result.rejections.is_empty() {
            tracing::warn!(
                "⚠️ Dropped {} of {} rows during cleaning",
                result.rejections.len(),
                result.records.len() + result.rejections.len()
            );
        }
        tracing::info!("✅ Cleaning complete: {} records kept", result.records.len());
        result
    }

    /// Validates one row on its own; deduplication happens in [`clean`](Self::clean).
    pub fn clean_record(&self, raw: &RawRecord) -> Result<CleanRecord, RejectReason> {
        let name = title_case(&normalize_whitespace(&raw.name));
        if name.is_empty() {
            return Err(RejectReason::MissingName);
        }

        let email = normalize_email(&raw.email).ok_or(RejectReason::InvalidEmail)?;

        let parsed = if self.reject_ambiguous_dates {
            parse_date_strict(&raw.date_of_birth)
        } else {
            parse_date(&raw.date_of_birth)
        };
        let (date_of_birth, _) = parsed.map_err(|e| match e {
            DateParseError::Unparseable => RejectReason::UnparseableDate,
            DateParseError::InvalidCalendarDate => RejectReason::InvalidCalendarDate,
            DateParseError::Ambiguous => RejectReason::AmbiguousDate,
        })?;

        Ok(CleanRecord::new(name, email, date_of_birth))
    }
}

/// Cleans with the default ordered date parsing.
pub fn clean(raw_records: Vec<RawRecord>) -> CleanResult {
    DataCleaner::default().clean(raw_records)
}

/// Trims and collapses internal whitespace runs to single spaces.
pub fn normalize_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn title_case(value: &str) -> String {
    value
        .split(' ')
        .map(|token| {
            let mut chars = token.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lower-cased address if it passes the syntax check, `None` otherwise.
pub fn normalize_email(value: &str) -> Option<String> {
    let email = value.trim().to_lowercase();
    EMAIL_RE.is_match(&email).then_some(email)
}
