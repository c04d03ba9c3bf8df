//! Memory record types.
//!
//! [`SessionMemory`] is short-term, per-conversation state. [`UserProfile`] is the
//! long-term record learned from feedback. [`FeedbackRecord`] is an immutable log entry.

use std::collections::{BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::intent::{HungerLevel, Intent, TimePeriod};

/// Conversation phase driven by the chat layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    WaitingLocation,
    WaitingHunger,
    WaitingBudget,
    RecommendationGiven,
    Cooldown,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::WaitingLocation => "waiting_location",
            Self::WaitingHunger => "waiting_hunger",
            Self::WaitingBudget => "waiting_budget",
            Self::RecommendationGiven => "recommendation_given",
            Self::Cooldown => "cooldown",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "waiting_location" => Ok(Self::WaitingLocation),
            "waiting_hunger" => Ok(Self::WaitingHunger),
            "waiting_budget" => Ok(Self::WaitingBudget),
            "recommendation_given" => Ok(Self::RecommendationGiven),
            "cooldown" => Ok(Self::Cooldown),
            _ => Err(format!("unknown phase: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Slots accumulated across a conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Slots {
    pub faculty: Option<String>,
    pub hunger_level: Option<HungerLevel>,
    pub budget: Option<u32>,
}

impl Slots {
    pub fn is_empty(&self) -> bool {
        self.faculty.is_none() && self.hunger_level.is_none() && self.budget.is_none()
    }

    /// Overwrite only the fields present in `partial`.
    pub fn merge(&mut self, partial: Slots) {
        if partial.faculty.is_some() {
            self.faculty = partial.faculty;
        }
        if partial.hunger_level.is_some() {
            self.hunger_level = partial.hunger_level;
        }
        if partial.budget.is_some() {
            self.budget = partial.budget;
        }
    }
}

/// Short-term state for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMemory {
    pub session_id: String,
    pub user_id: Option<String>,
    pub phase: Phase,
    pub slots: Slots,
    pub history: VecDeque<Message>,
    /// Recommendation cycles in the current window.
    pub interaction_count: u32,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub recommended_foods: Vec<String>,
    /// The exact intent behind `recommended_foods`, used as the feedback snapshot.
    #[serde(default)]
    pub last_intent: Option<Intent>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Default for SessionMemory {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            session_id: String::new(),
            user_id: None,
            phase: Phase::Idle,
            slots: Slots::default(),
            history: VecDeque::new(),
            interaction_count: 0,
            cooldown_until: None,
            recommended_foods: Vec::new(),
            last_intent: None,
            created_at: now,
            expires_at: now,
        }
    }
}

impl SessionMemory {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BudgetRange {
    pub min: u32,
    pub max: u32,
}

/// One observed (hunger, time, budget) triple from positive feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HungerPattern {
    pub hunger_level: Option<HungerLevel>,
    pub time_period: TimePeriod,
    pub budget: Option<u32>,
    pub recorded_at: DateTime<Utc>,
}

/// Long-term preferences for one user.
///
/// `favorite_foods` and `disliked_foods` are disjoint. Entries are stored as given;
/// membership checks are case-insensitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub user_id: String,
    pub faculty: Option<String>,
    pub favorite_foods: BTreeSet<String>,
    pub disliked_foods: BTreeSet<String>,
    pub allergies: BTreeSet<String>,
    pub budget_range: Option<BudgetRange>,
    pub hunger_patterns: VecDeque<HungerPattern>,
    pub interaction_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for UserProfile {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            user_id: String::new(),
            faculty: None,
            favorite_foods: BTreeSet::new(),
            disliked_foods: BTreeSet::new(),
            allergies: BTreeSet::new(),
            budget_range: None,
            hunger_patterns: VecDeque::new(),
            interaction_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Case-insensitive set membership.
pub fn contains_ci(set: &BTreeSet<String>, value: &str) -> bool {
    set.iter().any(|v| v.eq_ignore_ascii_case(value.trim()))
}

/// Case-insensitive removal. Returns whether anything was removed.
pub fn remove_ci(set: &mut BTreeSet<String>, value: &str) -> bool {
    let before = set.len();
    set.retain(|v| !v.eq_ignore_ascii_case(value.trim()));
    set.len() != before
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    pub fn is_favorite(&self, food: &str) -> bool {
        contains_ci(&self.favorite_foods, food)
    }

    pub fn is_disliked(&self, food: &str) -> bool {
        contains_ci(&self.disliked_foods, food)
    }

    /// Add a favorite, evicting it from dislikes. No-op if already a favorite.
    pub fn add_favorite(&mut self, food: &str) -> bool {
        let food = food.trim();
        if food.is_empty() {
            return false;
        }
        remove_ci(&mut self.disliked_foods, food);
        if self.is_favorite(food) {
            return false;
        }
        self.favorite_foods.insert(food.to_string())
    }

    /// Add a dislike, evicting it from favorites. No-op if already disliked.
    pub fn add_dislike(&mut self, food: &str) -> bool {
        let food = food.trim();
        if food.is_empty() {
            return false;
        }
        remove_ci(&mut self.favorite_foods, food);
        if self.is_disliked(food) {
            return false;
        }
        self.disliked_foods.insert(food.to_string())
    }

    /// Append a pattern, evicting the oldest entries beyond `limit`.
    pub fn push_hunger_pattern(&mut self, pattern: HungerPattern, limit: usize) {
        self.hunger_patterns.push_back(pattern);
        while self.hunger_patterns.len() > limit {
            self.hunger_patterns.pop_front();
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" | "like" | "suka" | "up" => Ok(Self::Positive),
            "negative" | "dislike" | "gak_suka" | "down" => Ok(Self::Negative),
            other => Err(format!("unknown sentiment: {other}")),
        }
    }
}

/// Immutable record of one feedback event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: String,
    pub user_id: String,
    pub sentiment: Sentiment,
    pub foods: Vec<String>,
    pub intent: Option<Intent>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Default for FeedbackRecord {
    fn default() -> Self {
        Self {
            id: String::new(),
            user_id: String::new(),
            sentiment: Sentiment::Positive,
            foods: Vec::new(),
            intent: None,
            comment: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn favorites_and_dislikes_stay_disjoint() {
        let mut p = UserProfile::new("u1");
        assert!(p.add_favorite("Nasi Goreng"));
        assert!(!p.add_favorite("nasi goreng"));
        assert_eq!(p.favorite_foods.len(), 1);

        assert!(p.add_dislike("NASI GORENG"));
        assert!(!p.is_favorite("Nasi Goreng"));
        assert!(p.is_disliked("nasi goreng"));

        p.add_favorite("Nasi Goreng");
        assert!(p.is_favorite("Nasi Goreng"));
        assert!(p.disliked_foods.is_empty());
    }

    #[test]
    fn blank_food_is_ignored() {
        let mut p = UserProfile::new("u1");
        assert!(!p.add_favorite("   "));
        assert!(!p.add_dislike(""));
    }

    #[test]
    fn hunger_patterns_are_bounded() {
        let mut p = UserProfile::new("u1");
        for budget in 0..25 {
            p.push_hunger_pattern(
                HungerPattern {
                    hunger_level: Some(HungerLevel::Standard),
                    time_period: TimePeriod::Midday,
                    budget: Some(budget),
                    recorded_at: Utc::now(),
                },
                20,
            );
        }
        assert_eq!(p.hunger_patterns.len(), 20);
        assert_eq!(p.hunger_patterns.front().and_then(|h| h.budget), Some(5));
    }

    #[test]
    fn slots_merge_keeps_existing() {
        let mut s = Slots {
            faculty: Some("Teknik".into()),
            ..Default::default()
        };
        s.merge(Slots {
            budget: Some(15000),
            ..Default::default()
        });
        assert_eq!(s.faculty.as_deref(), Some("Teknik"));
        assert_eq!(s.budget, Some(15000));
    }

    #[test]
    fn phase_round_trips_through_str() {
        for p in [Phase::Idle, Phase::WaitingBudget, Phase::Cooldown] {
            assert_eq!(p.as_str().parse::<Phase>().unwrap(), p);
        }
    }
}
