use crate::domain::model::{
    MatchResult, NotifySummary, Recipient, ReferenceDate, RunReport, TransformResult,
};
use chrono::NaiveDate;
use std::fmt;

pub fn build_report(
    run_date: NaiveDate,
    reference: ReferenceDate,
    transformed: &TransformResult,
    matches: &[MatchResult],
    notified: &NotifySummary,
    artifacts: Vec<String>,
) -> RunReport {
    RunReport {
        run_date,
        reference,
        extracted: transformed.extracted,
        cleaned: transformed.cleaned.records.len(),
        rejected: transformed.cleaned.rejections.clone(),
        matched: matches
            .iter()
            .map(|m| Recipient {
                name: m.record.name().to_string(),
                email: m.record.email().to_string(),
            })
            .collect(),
        notifications_sent: notified.sent(),
        notifications_failed: notified.failures().cloned().collect(),
        artifacts,
    }
}

/// Human-readable daily report, one section per pipeline step.
pub fn render(report: &RunReport) -> String {
    report.to_string()
}

const RULE: &str = "========================================";

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{RULE}")?;
        writeln!(f, "BIRTHDAY NOTIFIER - DAILY REPORT")?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "Run date: {} (matching {})", self.run_date, self.reference)?;
        writeln!(f)?;
        writeln!(f, "EXTRACTION:")?;
        writeln!(f, "- Records extracted: {}", self.extracted)?;
        writeln!(f)?;
        writeln!(f, "TRANSFORMATION:")?;
        writeln!(f, "- Records after cleaning: {}", self.cleaned)?;
        writeln!(f, "- Records removed: {}", self.rejected.len())?;
        for rejection in &self.rejected {
            writeln!(f, "  row {}: {}", rejection.row, rejection.reason)?;
        }
        writeln!(f)?;
        writeln!(f, "BIRTHDAY CHECK:")?;
        writeln!(f, "- Birthdays today: {}", self.matched.len())?;
        if self.matched.is_empty() {
            writeln!(f, "  No birthdays today.")?;
        }
        for (i, person) in self.matched.iter().enumerate() {
            writeln!(f, "  {}. {} ({})", i + 1, person.name, person.email)?;
        }
        writeln!(f)?;
        writeln!(f, "NOTIFICATIONS:")?;
        writeln!(f, "- Sent successfully: {}", self.notifications_sent)?;
        writeln!(f, "- Failed: {}", self.notifications_failed.len())?;
        for failure in &self.notifications_failed {
            writeln!(
                f,
                "  {} ({}): {}",
                failure.name,
                failure.email,
                failure.error.as_deref().unwrap_or("unknown error")
            )?;
        }
        if !self.artifacts.is_empty() {
            writeln!(f)?;
            writeln!(f, "OUTPUT:")?;
            for artifact in &self.artifacts {
                writeln!(f, "- {}", artifact)?;
            }
        }
        write!(f, "{RULE}")
    }
}
