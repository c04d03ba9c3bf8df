//! Two-tier user memory.
//!
//! - [`short_term`]: per-session slots, history and cooldown, expiring after a TTL
//! - [`long_term`]: durable per-user profiles
//! - [`feedback`]: learning from feedback into long-term profiles
//! - [`repository`]: the storage abstraction both tiers are written against

pub mod feedback;
pub mod long_term;
pub mod repository;
pub mod short_term;
pub mod types;

pub use feedback::FeedbackLearner;
pub use long_term::LongTermMemory;
pub use short_term::ShortTermMemory;
