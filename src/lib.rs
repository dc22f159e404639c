pub mod alerts;
pub mod analyzer;
pub mod breaker;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod limiter;
pub mod monitor;
pub mod notify;
pub mod retry;
pub mod roster;
pub mod types;

/// Upstream match-data API base URL (public, no auth required).
pub const UPSTREAM_API_BASE: &str = "https://api.sofascore.com";

/// Environment variable consulted for the chat webhook URL when the config
/// file does not set one.
pub const WEBHOOK_URL_ENV: &str = "WEBHOOK_URL";
