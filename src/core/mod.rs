pub mod cleaner;
pub mod dates;
pub mod etl;
pub mod matcher;
pub mod report;

pub use crate::domain::model::{
    CleanRecord, CleanResult, MatchResult, RawRecord, ReferenceDate, RunReport, TransformResult,
};
pub use crate::domain::ports::{ConfigProvider, Notifier, Pipeline, Storage};
pub use crate::utils::error::Result;
