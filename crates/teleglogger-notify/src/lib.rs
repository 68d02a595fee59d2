//! Notification delivery for teleglogger
//!
//! This crate provides the notification sink interface and its Telegram and
//! log-only implementations.

mod notifier;
mod telegram;

pub use notifier::{LogNotifier, Notifier, NotifyError};
pub use telegram::{BotUser, TelegramNotifier};

// Re-export types used in our public API
pub use teleglogger_types::Notification;
