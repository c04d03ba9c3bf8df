//! Recommendation pipeline.
//!
//! [`filter`] applies the hard constraints, [`query`] phrases the intent and the items
//! in a shared vocabulary, [`engine::Recommender`] embeds and ranks, and
//! [`personalize`] applies what the user profile knows.

pub mod engine;
pub mod filter;
pub mod personalize;
pub mod query;

pub use engine::{Candidate, Recommender};
