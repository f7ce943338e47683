//! Adsterra Statistics Bot Library
//!
//! This library provides:
//! - A Telegram bot that reports Adsterra publisher statistics
//! - Guided API key onboarding with a live probe against Adsterra
//! - A JSON credential store keyed by Telegram user id
//! - Per-message conversation sessions (date range → group by → report)
//! - Prometheus metrics for handler latency and outcomes

pub mod bot;
pub mod callback;
pub mod config;
pub mod credentials;
pub mod daterange;
pub mod engine;
pub mod error;
pub mod integrations;
pub mod menu;
pub mod metrics;
pub mod onboarding;
pub mod report;
pub mod session;

// Re-export common types
pub use callback::CallbackToken;
pub use config::Config;
pub use credentials::{CredentialStore, UserProfile};
pub use daterange::{date_range, DateRange, GroupBy, RangeOption};
pub use engine::{ChatTransport, Command, Engine};
pub use error::{Error, Result};
pub use integrations::AdsterraClient;
pub use menu::Menu;
pub use session::{ConversationKey, SessionStore};
