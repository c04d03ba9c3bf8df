//! Long-term memory: durable user profiles.
//!
//! Every mutation is a single repository upsert, so a call either lands entirely or
//! not at all. Profiles are created on first write and never deleted automatically.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::repository::Repository;
use super::types::{remove_ci, BudgetRange, HungerPattern, UserProfile};
use crate::error::EngineError;

pub struct LongTermMemory {
    profiles: Arc<dyn Repository<UserProfile>>,
}

impl LongTermMemory {
    pub fn new(profiles: Arc<dyn Repository<UserProfile>>) -> Self {
        Self { profiles }
    }

    /// `None` means no profile yet: no boosts, no exclusions.
    pub fn get(&self, user_id: &str) -> Result<Option<UserProfile>, EngineError> {
        self.profiles.get(user_id)
    }

    /// Apply `apply` to the user's profile in one atomic upsert.
    pub fn update(
        &self,
        user_id: &str,
        mut apply: impl FnMut(&mut UserProfile),
    ) -> Result<UserProfile, EngineError> {
        self.profiles.upsert(user_id, &mut |p: &mut UserProfile| {
            if p.user_id.is_empty() {
                *p = UserProfile::new(user_id);
                tracing::debug!(user_id, "profile created");
            }
            apply(p);
            p.touch();
        })
    }

    /// Idempotent. Also removes the food from dislikes.
    pub fn add_favorite(&self, user_id: &str, food: &str) -> Result<UserProfile, EngineError> {
        self.update(user_id, |p| {
            p.add_favorite(food);
        })
    }

    pub fn remove_favorite(&self, user_id: &str, food: &str) -> Result<UserProfile, EngineError> {
        self.update(user_id, |p| {
            remove_ci(&mut p.favorite_foods, food);
        })
    }

    /// Also removes the food from favorites.
    pub fn add_dislike(&self, user_id: &str, food: &str) -> Result<UserProfile, EngineError> {
        self.update(user_id, |p| {
            p.add_dislike(food);
        })
    }

    pub fn remove_dislike(&self, user_id: &str, food: &str) -> Result<UserProfile, EngineError> {
        self.update(user_id, |p| {
            remove_ci(&mut p.disliked_foods, food);
        })
    }

    /// Replace the allergy set. Blank entries are dropped, the rest lowercased.
    pub fn set_allergies(&self, user_id: &str, allergies: &[String]) -> Result<UserProfile, EngineError> {
        let cleaned: BTreeSet<String> = allergies
            .iter()
            .map(|a| a.trim().to_lowercase())
            .filter(|a| !a.is_empty())
            .collect();
        self.update(user_id, |p| p.allergies = cleaned.clone())
    }

    pub fn update_faculty(&self, user_id: &str, faculty: &str) -> Result<UserProfile, EngineError> {
        let faculty = faculty.trim();
        self.update(user_id, |p| {
            if !faculty.is_empty() {
                p.faculty = Some(faculty.to_string());
            }
        })
    }

    /// Set the range to `[budget, budget * ceiling_ratio]`.
    pub fn update_budget_range(
        &self,
        user_id: &str,
        budget: u32,
        ceiling_ratio: f64,
    ) -> Result<UserProfile, EngineError> {
        self.update(user_id, |p| p.budget_range = Some(budget_range(budget, ceiling_ratio)))
    }

    pub fn record_hunger_pattern(
        &self,
        user_id: &str,
        pattern: HungerPattern,
        limit: usize,
    ) -> Result<UserProfile, EngineError> {
        self.update(user_id, |p| p.push_hunger_pattern(pattern.clone(), limit))
    }

    pub fn increment_interaction(&self, user_id: &str) -> Result<u64, EngineError> {
        Ok(self.update(user_id, |p| p.interaction_count += 1)?.interaction_count)
    }

    /// A user counts as returning once they have completed at least one interaction.
    pub fn is_returning_user(&self, user_id: &str) -> Result<bool, EngineError> {
        Ok(self.get(user_id)?.is_some_and(|p| p.interaction_count > 0))
    }

    pub fn all(&self) -> Result<Vec<UserProfile>, EngineError> {
        self.profiles.all()
    }
}

pub(crate) fn budget_range(budget: u32, ceiling_ratio: f64) -> BudgetRange {
    let max = (f64::from(budget) * ceiling_ratio).round();
    BudgetRange {
        min: budget,
        max: if max >= f64::from(u32::MAX) { u32::MAX } else { max as u32 },
    }
}
