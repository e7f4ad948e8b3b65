use crate::domain::model::{CleanRecord, MatchResult, ReferenceDate};

/// Selects records whose birth (month, day) equals `reference`, in input order.
///
/// February 29 birthdays only match a February 29 reference; there is no
/// remapping on non-leap years.
pub fn match_birthdays(records: &[CleanRecord], reference: ReferenceDate) -> Vec<MatchResult> {
    records
        .iter()
        .filter(|record| {
            record.birth_month() == reference.month && record.birth_day() == reference.day
        })
        .map(|record| MatchResult {
            record: record.clone(),
            reference,
        })
        .collect()
}
