//! Niti Match — decides which schemes a user currently qualifies for.
//!
//! Scoring is delegated to a [`Scorer`]: the external recommendation
//! process over HTTP ([`HttpScorer`]) or the built-in catalog rules
//! ([`RuleScorer`]). [`EligibilityMatcher`] records the result as the
//! user's eligibility set and hydrates it into full scheme records.

pub mod matcher;
pub mod rules;
pub mod scorer;

pub use matcher::{EligibilityMatcher, MatchOutcome};
pub use rules::RuleScorer;
pub use scorer::{HttpScorer, Scorer};
