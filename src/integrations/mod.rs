//! External integrations module.
//!
//! Provides clients for:
//! - Adsterra publisher API (domains, direct links, statistics, key probe)

pub mod adsterra;

pub use adsterra::{AdsterraClient, DirectLink, Domain, StatRow};
