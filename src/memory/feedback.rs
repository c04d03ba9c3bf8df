//! Feedback learner: turns thumbs-up / thumbs-down into profile updates.
//!
//! Each feedback event becomes one profile upsert (all of favorites, dislikes,
//! budget range and hunger pattern together) followed by an immutable
//! [`FeedbackRecord`] used for statistics.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use super::long_term::budget_range;
use super::repository::Repository;
use super::types::{BudgetRange, FeedbackRecord, HungerPattern, Sentiment, UserProfile};
use crate::config::LearningConfig;
use crate::error::EngineError;
use crate::intent::{HungerLevel, Intent, TimePeriod};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FeedbackStats {
    pub total: usize,
    pub positive: usize,
    pub negative: usize,
    /// `positive / total`, or 0 with no feedback.
    pub satisfaction_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreferenceInsights {
    pub user_id: String,
    pub favorite_foods: Vec<String>,
    pub disliked_foods: Vec<String>,
    pub allergies: Vec<String>,
    pub budget_range: Option<BudgetRange>,
    pub usual_hunger_level: Option<HungerLevel>,
    pub usual_time_period: Option<TimePeriod>,
    pub hints: Vec<String>,
}

pub struct FeedbackLearner {
    profiles: Arc<dyn Repository<UserProfile>>,
    records: Arc<dyn Repository<FeedbackRecord>>,
    settings: LearningConfig,
}

impl FeedbackLearner {
    pub fn new(
        profiles: Arc<dyn Repository<UserProfile>>,
        records: Arc<dyn Repository<FeedbackRecord>>,
        settings: LearningConfig,
    ) -> Self {
        Self {
            profiles,
            records,
            settings,
        }
    }

    /// Learn from one feedback event.
    ///
    /// Positive: foods become favorites (leaving dislikes), the budget range becomes
    /// `[budget, budget * ratio]`, and the hunger pattern is appended.
    /// Negative: foods become dislikes (leaving favorites).
    pub fn apply_feedback(
        &self,
        user_id: &str,
        sentiment: Sentiment,
        intent: Option<&Intent>,
        foods: &[String],
        comment: Option<&str>,
    ) -> Result<FeedbackRecord, EngineError> {
        if user_id.trim().is_empty() {
            return Err(EngineError::InvalidIntent("feedback requires a user id".into()));
        }

        let ratio = self.settings.budget_ceiling_ratio;
        let limit = self.settings.hunger_pattern_limit;
        let now = Utc::now();

        self.profiles.upsert(user_id, &mut |p: &mut UserProfile| {
            if p.user_id.is_empty() {
                *p = UserProfile::new(user_id);
            }
            match sentiment {
                Sentiment::Positive => {
                    for food in foods {
                        p.add_favorite(food);
                    }
                    if let Some(intent) = intent {
                        if let Some(budget) = intent.budget {
                            p.budget_range = Some(budget_range(budget, ratio));
                        }
                        p.push_hunger_pattern(
                            HungerPattern {
                                hunger_level: intent.hunger_level,
                                time_period: intent.time_period,
                                budget: intent.budget,
                                recorded_at: now,
                            },
                            limit,
                        );
                    }
                }
                Sentiment::Negative => {
                    for food in foods {
                        p.add_dislike(food);
                    }
                }
            }
            p.touch();
        })?;

        let record = FeedbackRecord {
            id: uuid::Uuid::now_v7().to_string(),
            user_id: user_id.to_string(),
            sentiment,
            foods: foods.to_vec(),
            intent: intent.cloned(),
            comment: comment.map(str::to_string).filter(|c| !c.trim().is_empty()),
            created_at: now,
        };
        self.records.insert(&record.id, record.clone())?;

        tracing::info!(
            user_id,
            sentiment = %sentiment,
            foods = foods.len(),
            "feedback applied"
        );
        Ok(record)
    }

    /// Aggregate counts for one user, or across everyone with `None`.
    pub fn stats(&self, user_id: Option<&str>) -> Result<FeedbackStats, EngineError> {
        let records = match user_id {
            Some(user) => self.records.query(&|r: &FeedbackRecord| r.user_id == user)?,
            None => self.records.all()?,
        };
        let total = records.len();
        let positive = records
            .iter()
            .filter(|r| r.sentiment == Sentiment::Positive)
            .count();
        Ok(FeedbackStats {
            total,
            positive,
            negative: total - positive,
            satisfaction_rate: if total == 0 {
                0.0
            } else {
                positive as f64 / total as f64
            },
        })
    }

    /// Feedback records for a user, newest first.
    pub fn history(&self, user_id: &str, limit: usize) -> Result<Vec<FeedbackRecord>, EngineError> {
        let mut records = self.records.query(&|r: &FeedbackRecord| r.user_id == user_id)?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        Ok(records)
    }

    /// Summarize what the profile has learned. `None` if the user is unknown.
    pub fn insights(&self, user_id: &str) -> Result<Option<PreferenceInsights>, EngineError> {
        let Some(profile) = self.profiles.get(user_id)? else {
            return Ok(None);
        };

        let usual_hunger_level = most_common(profile.hunger_patterns.iter().filter_map(|h| h.hunger_level));
        let usual_time_period = most_common(profile.hunger_patterns.iter().map(|h| h.time_period));

        let mut hints = Vec::new();
        if let Some(fav) = profile.favorite_foods.iter().next() {
            hints.push(format!("likes {fav}"));
        }
        if let Some(range) = profile.budget_range {
            hints.push(format!("usually spends {}-{}", range.min, range.max));
        }
        if let Some(level) = usual_hunger_level {
            hints.push(format!("usually {level} hunger"));
        }
        if !profile.allergies.is_empty() {
            hints.push(format!(
                "avoid {}",
                profile.allergies.iter().cloned().collect::<Vec<_>>().join(", ")
            ));
        }

        Ok(Some(PreferenceInsights {
            user_id: profile.user_id,
            favorite_foods: profile.favorite_foods.into_iter().collect(),
            disliked_foods: profile.disliked_foods.into_iter().collect(),
            allergies: profile.allergies.into_iter().collect(),
            budget_range: profile.budget_range,
            usual_hunger_level,
            usual_time_period,
            hints,
        }))
    }
}

/// Most frequent value; ties go to the value seen first.
fn most_common<T: Copy + Eq + std::hash::Hash>(values: impl Iterator<Item = T>) -> Option<T> {
    let mut counts: HashMap<T, (usize, usize)> = HashMap::new();
    for (i, v) in values.enumerate() {
        counts.entry(v).or_insert((0, i)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1 .0.cmp(&b.1 .0).then(b.1 .1.cmp(&a.1 .1)))
        .map(|(v, _)| v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::repository::InMemoryRepository;

    fn learner() -> FeedbackLearner {
        FeedbackLearner::new(
            Arc::new(InMemoryRepository::<UserProfile>::new()),
            Arc::new(InMemoryRepository::<FeedbackRecord>::new()),
            LearningConfig::default(),
        )
    }

    fn intent(budget: u32) -> Intent {
        Intent::new(None, Some(HungerLevel::Heavy), Some(budget), TimePeriod::Midday)
    }

    #[test]
    fn positive_feedback_learns_everything_at_once() {
        let l = learner();
        l.apply_feedback("u1", Sentiment::Positive, Some(&intent(15000)), &["Nasi Goreng".into()], None)
            .unwrap();
        let p = l.profiles.get("u1").unwrap().unwrap();
        assert!(p.is_favorite("Nasi Goreng"));
        assert_eq!(p.budget_range, Some(BudgetRange { min: 15000, max: 18000 }));
        assert_eq!(p.hunger_patterns.len(), 1);
    }

    #[test]
    fn repeated_positive_feedback_keeps_one_favorite() {
        let l = learner();
        for _ in 0..2 {
            l.apply_feedback("u1", Sentiment::Positive, None, &["Nasi Goreng".into()], None)
                .unwrap();
        }
        let p = l.profiles.get("u1").unwrap().unwrap();
        assert_eq!(p.favorite_foods.len(), 1);
        assert_eq!(l.stats(Some("u1")).unwrap().total, 2);
    }

    #[test]
    fn negative_overrides_favorite() {
        let l = learner();
        l.apply_feedback("u1", Sentiment::Positive, None, &["Bakso".into()], None).unwrap();
        l.apply_feedback("u1", Sentiment::Negative, None, &["Bakso".into()], Some("keasinan"))
            .unwrap();
        let p = l.profiles.get("u1").unwrap().unwrap();
        assert!(!p.is_favorite("Bakso"));
        assert!(p.is_disliked("Bakso"));
    }

    #[test]
    fn stats_per_user_and_global() {
        let l = learner();
        l.apply_feedback("u1", Sentiment::Positive, None, &["A".into()], None).unwrap();
        l.apply_feedback("u1", Sentiment::Negative, None, &["B".into()], None).unwrap();
        l.apply_feedback("u2", Sentiment::Positive, None, &["C".into()], None).unwrap();

        let u1 = l.stats(Some("u1")).unwrap();
        assert_eq!((u1.total, u1.positive, u1.negative), (2, 1, 1));
        assert!((u1.satisfaction_rate - 0.5).abs() < 1e-9);

        let all = l.stats(None).unwrap();
        assert_eq!(all.total, 3);
        assert_eq!(l.stats(Some("nobody")).unwrap().satisfaction_rate, 0.0);
    }

    #[test]
    fn blank_user_is_rejected() {
        let err = learner()
            .apply_feedback(" ", Sentiment::Positive, None, &[], None)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidIntent(_)));
    }

    #[test]
    fn insights_summarize_patterns() {
        let l = learner();
        l.apply_feedback("u1", Sentiment::Positive, Some(&intent(12000)), &["Soto".into()], None)
            .unwrap();
        l.apply_feedback("u1", Sentiment::Positive, Some(&intent(20000)), &["Rawon".into()], None)
            .unwrap();
        let i = l.insights("u1").unwrap().unwrap();
        assert_eq!(i.usual_hunger_level, Some(HungerLevel::Heavy));
        assert_eq!(i.usual_time_period, Some(TimePeriod::Midday));
        assert_eq!(i.budget_range, Some(BudgetRange { min: 20000, max: 24000 }));
        assert_eq!(i.favorite_foods, ["Rawon", "Soto"]);
        assert!(l.insights("nobody").unwrap().is_none());
    }

    #[test]
    fn most_common_breaks_ties_by_first_seen() {
        assert_eq!(most_common([2, 1, 1, 2].into_iter()), Some(2));
        assert_eq!(most_common([3, 1, 1].into_iter()), Some(1));
        assert_eq!(most_common(std::iter::empty::<u8>()), None);
    }
}
