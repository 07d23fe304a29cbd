//! Outbound request rate limiting.
//!
//! Each channel owns one [`RateLimiter`], which in turn exclusively owns that
//! channel's request history ledger. Ledgers are never shared across channels.

mod ledger;
mod limiter;

pub use ledger::{RequestHistoryEntry, RequestLedger, LEDGER_WINDOW};
pub use limiter::{RateLimitStats, RateLimiter, RECHECK_INTERVAL};
