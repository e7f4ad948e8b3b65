pub mod birthday_pipeline;

pub use birthday_pipeline::BirthdayPipeline;
