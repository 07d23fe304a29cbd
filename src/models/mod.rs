//! Data models for rate comparison.

mod channel;
mod comparison;
mod quote;

pub use channel::Channel;
pub use comparison::{RateComparisonResult, Savings};
pub use quote::{
    round_cents, CandidateFees, Fees, PartyComposition, QuoteCandidate, RateQuote, StayRequest,
    PRICE_EPSILON,
};
