//! Short-term memory: per-session conversation state with TTL expiry.
//!
//! Sessions are keyed by id and only ever touched through their own key. Every
//! write slides the expiry window forward; a read past expiry deletes the session
//! and reports it as absent. The cooldown gate caps recommendation cycles per session.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::repository::{InMemoryRepository, Repository};
use super::types::{Message, Phase, Role, SessionMemory, Slots};
use crate::config::SessionConfig;
use crate::error::EngineError;
use crate::intent::Intent;

/// Outcome of asking to start a recommendation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Admission {
    Allowed,
    Cooldown {
        until: DateTime<Utc>,
        remaining_minutes: i64,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub phase: Phase,
    pub slots: Slots,
    pub messages: usize,
    pub interaction_count: u32,
    pub recommended_foods: Vec<String>,
    pub in_cooldown: bool,
}

pub struct ShortTermMemory {
    sessions: Arc<dyn Repository<SessionMemory>>,
    settings: SessionConfig,
}

impl ShortTermMemory {
    pub fn new(settings: SessionConfig) -> Self {
        Self::with_repository(Arc::new(InMemoryRepository::<SessionMemory>::new()), settings)
    }

    pub fn with_repository(sessions: Arc<dyn Repository<SessionMemory>>, settings: SessionConfig) -> Self {
        Self { sessions, settings }
    }

    fn ttl(&self) -> Duration {
        Duration::minutes(self.settings.ttl_minutes)
    }

    /// Live session, or `None` if absent or expired.
    pub fn get(&self, session_id: &str) -> Result<Option<SessionMemory>, EngineError> {
        match self.sessions.get(session_id)? {
            Some(s) if s.is_expired(Utc::now()) => {
                tracing::debug!(session_id, "session expired");
                self.sessions.delete(session_id)?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Mutate a session, starting a fresh one if it is absent or expired.
    fn update(
        &self,
        session_id: &str,
        mut apply: impl FnMut(&mut SessionMemory),
    ) -> Result<SessionMemory, EngineError> {
        let now = Utc::now();
        let ttl = self.ttl();
        self.sessions.upsert(session_id, &mut |s: &mut SessionMemory| {
            if s.session_id.is_empty() || s.is_expired(now) {
                *s = SessionMemory {
                    session_id: session_id.to_string(),
                    created_at: now,
                    ..Default::default()
                };
            }
            apply(s);
            s.expires_at = now + ttl;
        })
    }

    /// Fetch or start a session, binding it to `user_id` when given.
    pub fn open(&self, session_id: &str, user_id: Option<&str>) -> Result<SessionMemory, EngineError> {
        self.update(session_id, |s| {
            if let Some(user) = user_id {
                s.user_id = Some(user.to_string());
            }
        })
    }

    pub fn set_phase(&self, session_id: &str, phase: Phase) -> Result<(), EngineError> {
        self.update(session_id, |s| s.phase = phase)?;
        Ok(())
    }

    /// Merge the present fields of `partial` into the session's slots.
    pub fn update_context(&self, session_id: &str, partial: Slots) -> Result<Slots, EngineError> {
        let s = self.update(session_id, |s| s.slots.merge(partial.clone()))?;
        Ok(s.slots)
    }

    /// Append to history, keeping only the most recent `max_history` messages.
    pub fn append_message(&self, session_id: &str, role: Role, text: &str) -> Result<(), EngineError> {
        let limit = self.settings.max_history;
        self.update(session_id, |s| {
            s.history.push_back(Message {
                role,
                text: text.to_string(),
                timestamp: Utc::now(),
            });
            while s.history.len() > limit {
                s.history.pop_front();
            }
        })?;
        Ok(())
    }

    pub fn increment_interaction(&self, session_id: &str) -> Result<u32, EngineError> {
        Ok(self.update(session_id, |s| s.interaction_count += 1)?.interaction_count)
    }

    /// Reset phase to idle and drop slots, history and recommended foods.
    ///
    /// The interaction counter and cooldown timestamp survive, so a reset cannot skip the cooldown.
    pub fn clear(&self, session_id: &str) -> Result<(), EngineError> {
        self.update(session_id, |s| {
            s.phase = Phase::Idle;
            s.slots = Slots::default();
            s.history.clear();
            s.recommended_foods.clear();
            s.last_intent = None;
        })?;
        tracing::debug!(session_id, "session cleared");
        Ok(())
    }

    /// Lift an elapsed cooldown. Called on every inbound message.
    pub fn register_inbound(&self, session_id: &str, now: DateTime<Utc>) -> Result<(), EngineError> {
        self.update(session_id, |s| lift_elapsed_cooldown(s, now))?;
        Ok(())
    }

    /// Gate a recommendation cycle against the per-session cap.
    pub fn try_begin_recommendation(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Admission, EngineError> {
        let max = self.settings.max_recommendations;
        let cooldown = Duration::minutes(self.settings.cooldown_minutes);
        let mut admission = Admission::Allowed;

        self.update(session_id, |s| {
            lift_elapsed_cooldown(s, now);
            if s.cooldown_until.is_none() && s.interaction_count >= max {
                s.cooldown_until = Some(now + cooldown);
                s.phase = Phase::Cooldown;
                tracing::info!(session_id = %s.session_id, count = s.interaction_count, "session entered cooldown");
            }
            admission = match s.cooldown_until {
                Some(until) => Admission::Cooldown {
                    until,
                    // round up so "0 minutes" is never reported while still blocked
                    remaining_minutes: ((until - now).num_seconds() + 59) / 60,
                },
                None => Admission::Allowed,
            };
        })?;
        Ok(admission)
    }

    /// Record a completed recommendation cycle and the intent that produced it.
    pub fn record_recommendation(
        &self,
        session_id: &str,
        intent: &Intent,
        foods: &[String],
    ) -> Result<u32, EngineError> {
        let s = self.update(session_id, |s| {
            s.interaction_count += 1;
            s.recommended_foods = foods.to_vec();
            s.last_intent = Some(intent.clone());
            s.phase = Phase::RecommendationGiven;
        })?;
        Ok(s.interaction_count)
    }

    pub fn last_message(&self, session_id: &str, role: Role) -> Result<Option<String>, EngineError> {
        Ok(self.get(session_id)?.and_then(|s| {
            s.history
                .iter()
                .rev()
                .find(|m| m.role == role)
                .map(|m| m.text.clone())
        }))
    }

    pub fn summary(&self, session_id: &str) -> Result<Option<SessionSummary>, EngineError> {
        Ok(self.get(session_id)?.map(|s| SessionSummary {
            in_cooldown: s.cooldown_until.is_some(),
            session_id: s.session_id,
            phase: s.phase,
            slots: s.slots,
            messages: s.history.len(),
            interaction_count: s.interaction_count,
            recommended_foods: s.recommended_foods,
        }))
    }

    /// Delete every expired session. Returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, EngineError> {
        let expired = self.sessions.query(&|s: &SessionMemory| s.is_expired(now))?;
        for s in &expired {
            self.sessions.delete(&s.session_id)?;
        }
        if !expired.is_empty() {
            tracing::debug!(removed = expired.len(), "expired sessions purged");
        }
        Ok(expired.len())
    }
}

fn lift_elapsed_cooldown(s: &mut SessionMemory, now: DateTime<Utc>) {
    if s.cooldown_until.is_some_and(|until| now >= until) {
        s.cooldown_until = None;
        s.interaction_count = 0;
        if s.phase == Phase::Cooldown {
            s.phase = Phase::Idle;
        }
    }
}
