//! Price extraction shared by all channel adapters.
//!
//! Adapters reduce their raw responses to a [`PriceBreakdown`]; page text goes
//! through one ordered [`RuleSet`], structured payloads through
//! [`extract_path`]. [`PriceBreakdown::resolve`] then produces consistent
//! components for validation.

mod breakdown;
mod html;
mod json;
mod rules;
mod text;

pub use breakdown::{PriceBreakdown, ResolvedPrice, BACKFILL_RATIOS};
pub use html::html_regions;
pub use json::{amount_at, as_amount, extract_path};
pub use rules::{builtin_specs, parse_amount, PriceField, Rule, RuleSet, RuleSpec};
pub use text::{extract_from_regions, extract_region};
