//! Ethical request discipline for scraped and queried channels.
//!
//! The guard checks robots.txt before a channel is fetched, rotates the
//! request identity between requests and inserts a randomized pause before
//! dispatch. All of this is courtesy toward the sites being fetched. It does
//! not make fetches undetectable and is not meant to.

mod guard;
mod identity;
mod robots;

pub use guard::EthicalGuard;
pub use identity::{Identity, IdentityPool};
pub use robots::RobotsRules;
