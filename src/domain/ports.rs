use crate::domain::model::{
    MatchResult, Notification, NotifySummary, OutputFilenames, RawRecord, ReferenceDate,
    RunReport, TransformResult,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn input_path(&self) -> &str;
    fn output_path(&self) -> &str;
    fn output_formats(&self) -> &[String];
    fn field_mapping(&self) -> Option<&HashMap<String, String>>;
    fn reject_ambiguous_dates(&self) -> bool;
    fn notify_concurrency(&self) -> usize;

    fn subject_template(&self) -> &str {
        DEFAULT_SUBJECT_TEMPLATE
    }

    fn body_template(&self) -> &str {
        DEFAULT_BODY_TEMPLATE
    }

    fn output_filenames(&self) -> OutputFilenames {
        OutputFilenames::default()
    }

    /// ZIP file name when outputs are bundled, `None` for loose files.
    fn archive_name(&self) -> Option<&str> {
        None
    }
}

pub const DEFAULT_SUBJECT_TEMPLATE: &str = "🎉 Happy Birthday {name}!";
pub const DEFAULT_BODY_TEMPLATE: &str = "Happy Birthday {first_name}! 🎂\n\n\
Wishing you a fantastic day filled with joy, laughter, and all the things you love!\n\n\
May this year bring you success, happiness, and countless memorable moments.\n";

/// Delivers one notification. Errors are per-delivery and never abort a run.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<()>;

    fn transport(&self) -> &'static str;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<RawRecord>>;
    async fn transform(&self, data: Vec<RawRecord>) -> Result<TransformResult>;
    async fn load(&self, result: &TransformResult) -> Result<Vec<String>>;
    fn check(&self, result: &TransformResult, reference: ReferenceDate) -> Vec<MatchResult>;
    async fn notify(&self, matches: &[MatchResult]) -> Result<NotifySummary>;
    async fn summarize(&self, report: &RunReport) -> Result<Option<String>>;
}
