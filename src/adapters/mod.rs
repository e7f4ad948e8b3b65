// Adapters layer: concrete implementations for external systems.

pub mod notifier;
pub mod spreadsheet;

pub use notifier::{
    build_notifier, LogNotifier, SmtpNotifier, UnconfiguredNotifier, WebhookNotifier,
};
