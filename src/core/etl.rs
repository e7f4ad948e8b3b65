use crate::core::report;
use crate::core::Pipeline;
use crate::domain::model::{NotifySummary, ReferenceDate, RunReport};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use chrono::NaiveDate;

/// Runs one scheduling tick: extract → transform → load → check → notify → summarize.
///
/// Only source and output failures are returned as errors. Rejected rows and
/// failed deliveries end up in the [`RunReport`].
pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self, run_date: NaiveDate) -> Result<RunReport> {
        let reference = ReferenceDate::from(run_date);
        tracing::info!("🚀 Starting birthday run for {} (matching {})", run_date, reference);

        // Extract
        let raw_data = self.pipeline.extract().await?;
        tracing::info!("📥 Extracted {} records", raw_data.len());
        self.monitor.log_stats("Extract");

        // Transform
        let transformed = self.pipeline.transform(raw_data).await?;
        tracing::info!(
            "🔧 {} records after cleaning, {} rejected",
            transformed.cleaned.records.len(),
            transformed.cleaned.rejections.len()
        );
        self.monitor.log_stats("Transform");

        // Load
        let artifacts = self.pipeline.load(&transformed).await?;
        self.monitor.log_stats("Load");

        // Check
        let matches = self.pipeline.check(&transformed, reference);
        tracing::info!("🎂 Found {} birthday(s) today", matches.len());

        // Notify
        let notified = if matches.is_empty() {
            tracing::info!("No birthdays today. No notifications to send.");
            NotifySummary::default()
        } else {
            self.pipeline.notify(&matches).await?
        };
        self.monitor.log_stats("Notify");

        let mut report = report::build_report(
            run_date,
            reference,
            &transformed,
            &matches,
            &notified,
            artifacts,
        );
        if let Some(path) = self.pipeline.summarize(&report).await? {
            report.artifacts.push(path);
        }
        tracing::info!("\n{}", report::render(&report));
        self.monitor.log_final_stats();

        Ok(report)
    }
}
