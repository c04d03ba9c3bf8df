//! Service façade over the recommender and both memory tiers.
//!
//! [`RecommendationService::recommend`] always answers with a well-formed
//! [`RecommendResponse`]; recoverable failures become a status, not an `Err`.
//! Only [`RecommendationService::build`] can fail hard, at startup.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::catalog::{nutrition, Catalog, Nutrition};
use crate::config::KencotConfig;
use crate::embedding::{self, EmbeddingPath, EmbeddingProvider, ResilientEmbedder};
use crate::error::EngineError;
use crate::intent::{Intent, TimePeriod};
use crate::memory::feedback::{FeedbackStats, PreferenceInsights};
use crate::memory::repository::{InMemoryRepository, Repository, SqliteRepository};
use crate::memory::short_term::{Admission, SessionSummary};
use crate::memory::types::{remove_ci, FeedbackRecord, Role, Sentiment, Slots, UserProfile};
use crate::memory::{FeedbackLearner, LongTermMemory, ShortTermMemory};
use crate::recommend::{Candidate, Recommender};

/// Expired sessions are swept once every this many recommend calls.
pub const SESSION_SWEEP_INTERVAL: u64 = 32;

/// Raw recommendation request as it arrives from the chat layer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecommendRequest {
    pub session_id: String,
    pub user_id: Option<String>,
    pub faculty: Option<String>,
    pub hunger_level: Option<String>,
    pub budget: Option<i64>,
    pub time_period: Option<String>,
    /// Raw user utterance, appended to the session history when present.
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Ok,
    NoCandidates,
    Cooldown,
    InvalidIntent,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendResponse {
    pub status: ResponseStatus,
    pub candidates: Vec<Candidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_nutrition: Option<Nutrition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_minutes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RecommendResponse {
    fn status(status: ResponseStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            candidates: vec![],
            total_nutrition: None,
            intent: None,
            retry_after_minutes: None,
            message: Some(message.into()),
        }
    }
}

/// Explicit preference edits. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreferenceUpdate {
    #[serde(default)]
    pub add_favorites: Vec<String>,
    #[serde(default)]
    pub remove_favorites: Vec<String>,
    #[serde(default)]
    pub add_dislikes: Vec<String>,
    #[serde(default)]
    pub remove_dislikes: Vec<String>,
    pub allergies: Option<Vec<String>>,
    pub faculty: Option<String>,
}

pub struct RecommendationService {
    recommender: Recommender,
    stm: ShortTermMemory,
    ltm: LongTermMemory,
    learner: FeedbackLearner,
    embedding_path: EmbeddingPath,
    top_k: usize,
    requests: AtomicU64,
}

impl RecommendationService {
    pub fn new(
        recommender: Recommender,
        stm: ShortTermMemory,
        ltm: LongTermMemory,
        learner: FeedbackLearner,
        embedding_path: EmbeddingPath,
        top_k: usize,
    ) -> Self {
        Self {
            recommender,
            stm,
            ltm,
            learner,
            embedding_path,
            top_k,
            requests: AtomicU64::new(0),
        }
    }

    /// Assemble the service from configuration. Fails on configuration or catalog errors.
    pub fn build(config: &KencotConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let catalog = Catalog::load(config.resolved_catalog_path())?;
        let embedder = embedding::create_provider(&config.embedding)?;
        let path = embedder.active_path();

        let (profiles, feedback) = open_stores(config)?;
        tracing::info!(
            backend = %config.storage.backend,
            items = catalog.len(),
            embedding = %path,
            "recommendation service ready"
        );
        Ok(Self::assemble(catalog, Arc::new(embedder), path, profiles, feedback, config))
    }

    /// Service over memory-only stores around an embedding chain.
    pub fn in_memory(catalog: Catalog, embedder: ResilientEmbedder, config: &KencotConfig) -> Self {
        let path = embedder.active_path();
        Self::assemble(
            catalog,
            Arc::new(embedder),
            path,
            Arc::new(InMemoryRepository::<UserProfile>::new()),
            Arc::new(InMemoryRepository::<FeedbackRecord>::new()),
            config,
        )
    }

    /// Wire the service from already-built parts.
    pub fn assemble(
        catalog: Catalog,
        embedder: Arc<dyn EmbeddingProvider>,
        embedding_path: EmbeddingPath,
        profiles: Arc<dyn Repository<UserProfile>>,
        feedback: Arc<dyn Repository<FeedbackRecord>>,
        config: &KencotConfig,
    ) -> Self {
        Self::new(
            Recommender::new(catalog, embedder, config.retrieval.clone()),
            ShortTermMemory::new(config.session.clone()),
            LongTermMemory::new(profiles.clone()),
            FeedbackLearner::new(profiles, feedback, config.learning.clone()),
            embedding_path,
            config.retrieval.top_k,
        )
    }

    pub fn embedding_path(&self) -> EmbeddingPath {
        self.embedding_path
    }

    pub fn catalog(&self) -> Arc<Catalog> {
        self.recommender.catalog()
    }

    /// Replace the catalog wholesale.
    pub fn reload_catalog(&self, catalog: Catalog) {
        self.recommender.replace_catalog(catalog);
    }

    pub fn recommend(&self, request: &RecommendRequest) -> RecommendResponse {
        match self.try_recommend(request) {
            Ok(response) => response,
            Err(EngineError::InvalidIntent(msg)) => {
                tracing::debug!(session_id = %request.session_id, reason = %msg, "intent rejected");
                RecommendResponse::status(ResponseStatus::InvalidIntent, msg)
            }
            Err(e) => {
                tracing::error!(session_id = %request.session_id, error = %e, "recommendation failed");
                RecommendResponse::status(
                    ResponseStatus::Error,
                    "something went wrong while looking for food, please try again",
                )
            }
        }
    }

    fn try_recommend(&self, request: &RecommendRequest) -> Result<RecommendResponse, EngineError> {
        if request.session_id.trim().is_empty() {
            return Err(EngineError::InvalidIntent("session_id is required".into()));
        }
        let time_period = request
            .time_period
            .as_deref()
            .map(str::parse::<TimePeriod>)
            .transpose()?;
        let incoming = Intent::from_raw(
            request.faculty.as_deref(),
            request.hunger_level.as_deref(),
            request.budget,
            time_period,
        )?;

        let session_id = request.session_id.as_str();
        let user_id = request.user_id.as_deref();
        let now = Utc::now();
        self.sweep_sessions(now);

        self.stm.register_inbound(session_id, now)?;
        self.stm.open(session_id, user_id)?;
        if let Some(text) = request.message.as_deref() {
            self.stm.append_message(session_id, Role::User, text)?;
        }

        if let Admission::Cooldown { remaining_minutes, .. } =
            self.stm.try_begin_recommendation(session_id, now)?
        {
            let mut response = RecommendResponse::status(
                ResponseStatus::Cooldown,
                format!("try again in {remaining_minutes} minutes"),
            );
            response.retry_after_minutes = Some(remaining_minutes);
            return Ok(response);
        }

        let slots = self.stm.update_context(
            session_id,
            Slots {
                faculty: incoming.faculty.clone(),
                hunger_level: incoming.hunger_level,
                budget: incoming.budget,
            },
        )?;
        let intent = Intent::new(slots.faculty, slots.hunger_level, slots.budget, incoming.time_period);

        let profile = match user_id {
            Some(user) => self.ltm.get(user).unwrap_or_else(|e| {
                tracing::warn!(user_id = user, error = %e, "profile unavailable, continuing without personalization");
                None
            }),
            None => None,
        };

        let candidates = self.recommender.recommend(profile.as_ref(), &intent, self.top_k)?;
        if candidates.is_empty() {
            let mut response = RecommendResponse::status(
                ResponseStatus::NoCandidates,
                "nothing matches, try a bigger budget or a different hunger level",
            );
            response.intent = Some(intent);
            return Ok(response);
        }

        let foods: Vec<String> = candidates.iter().map(|c| c.name.clone()).collect();
        self.stm.record_recommendation(session_id, &intent, &foods)?;
        if let Some(user) = user_id {
            let faculty = intent.faculty.clone();
            self.ltm.update(user, |p| {
                if let Some(ref f) = faculty {
                    p.faculty = Some(f.clone());
                }
                p.interaction_count += 1;
            })?;
        }

        let facts: Vec<Nutrition> = candidates
            .iter()
            .map(|c| Nutrition {
                calories: c.calories,
                protein: c.protein,
                fat: c.fat,
                carbs: c.carbs,
            })
            .collect();

        tracing::info!(session_id, returned = candidates.len(), "recommendation served");
        Ok(RecommendResponse {
            status: ResponseStatus::Ok,
            total_nutrition: Some(nutrition::total(&facts)),
            candidates,
            intent: Some(intent),
            retry_after_minutes: None,
            message: None,
        })
    }

    /// Drop expired sessions on every [`SESSION_SWEEP_INTERVAL`]th request.
    fn sweep_sessions(&self, now: chrono::DateTime<Utc>) {
        let n = self.requests.fetch_add(1, Ordering::Relaxed) + 1;
        if n % SESSION_SWEEP_INTERVAL != 0 {
            return;
        }
        if let Err(e) = self.stm.purge_expired(now) {
            tracing::warn!(error = %e, "session sweep failed");
        }
    }

    /// Record feedback. Foods default to what the session was last recommended,
    /// and the intent snapshot is the one those foods were recommended for.
    pub fn give_feedback(
        &self,
        user_id: &str,
        sentiment: Sentiment,
        foods: &[String],
        comment: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<FeedbackRecord, EngineError> {
        let session = match session_id {
            Some(id) => self.stm.get(id)?,
            None => None,
        };
        let foods: Vec<String> = if foods.is_empty() {
            session
                .as_ref()
                .map(|s| s.recommended_foods.clone())
                .unwrap_or_default()
        } else {
            foods.to_vec()
        };
        let snapshot = session.and_then(|s| s.last_intent);

        self.learner
            .apply_feedback(user_id, sentiment, snapshot.as_ref(), &foods, comment)
    }

    /// Apply explicit preference edits in a single profile write.
    pub fn update_preferences(&self, user_id: &str, update: &PreferenceUpdate) -> Result<UserProfile, EngineError> {
        if user_id.trim().is_empty() {
            return Err(EngineError::InvalidIntent("user_id is required".into()));
        }
        let allergies: Option<BTreeSet<String>> = update.allergies.as_ref().map(|list| {
            list.iter()
                .map(|a| a.trim().to_lowercase())
                .filter(|a| !a.is_empty())
                .collect()
        });
        self.ltm.update(user_id, |p| {
            for food in &update.add_favorites {
                p.add_favorite(food);
            }
            for food in &update.remove_favorites {
                remove_ci(&mut p.favorite_foods, food);
            }
            for food in &update.add_dislikes {
                p.add_dislike(food);
            }
            for food in &update.remove_dislikes {
                remove_ci(&mut p.disliked_foods, food);
            }
            if let Some(ref a) = allergies {
                p.allergies = a.clone();
            }
            if let Some(faculty) = update.faculty.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
                p.faculty = Some(faculty.to_string());
            }
        })
    }

    /// Clear the session's short-term state. Long-term memory is untouched.
    pub fn reset_session(&self, session_id: &str) -> Result<(), EngineError> {
        self.stm.clear(session_id)
    }

    pub fn session_summary(&self, session_id: &str) -> Result<Option<SessionSummary>, EngineError> {
        self.stm.summary(session_id)
    }

    pub fn profile(&self, user_id: &str) -> Result<Option<UserProfile>, EngineError> {
        self.ltm.get(user_id)
    }

    pub fn profiles(&self) -> Result<Vec<UserProfile>, EngineError> {
        self.ltm.all()
    }

    pub fn insights(&self, user_id: &str) -> Result<Option<PreferenceInsights>, EngineError> {
        self.learner.insights(user_id)
    }

    pub fn feedback_stats(&self, user_id: Option<&str>) -> Result<FeedbackStats, EngineError> {
        self.learner.stats(user_id)
    }

    pub fn feedback_history(&self, user_id: &str, limit: usize) -> Result<Vec<FeedbackRecord>, EngineError> {
        self.learner.history(user_id, limit)
    }

    pub fn purge_expired_sessions(&self) -> Result<usize, EngineError> {
        self.stm.purge_expired(Utc::now())
    }
}

type Stores = (Arc<dyn Repository<UserProfile>>, Arc<dyn Repository<FeedbackRecord>>);

/// Open the profile and feedback repositories for the configured backend.
fn open_stores(config: &KencotConfig) -> Result<Stores, EngineError> {
    match config.storage.backend.as_str() {
        "sqlite" => {
            let path = config.resolved_db_path();
            let conn = crate::db::open_database(&path)
                .map_err(|e| EngineError::Storage(format!("{e:#}")))?;
            crate::db::check_embedding_info(&conn, &config.embedding.model, config.embedding.dimension)
                .map_err(|e| EngineError::Storage(format!("{e:#}")))?;
            let conn = Arc::new(Mutex::new(conn));
            Ok((
                Arc::new(SqliteRepository::<UserProfile>::new(conn.clone(), "profiles")),
                Arc::new(SqliteRepository::<FeedbackRecord>::new(conn, "feedback")),
            ))
        }
        "json" => {
            let profiles_path = config.resolved_json_path();
            let feedback_path = feedback_path_for(&profiles_path);
            Ok((
                Arc::new(InMemoryRepository::<UserProfile>::open(&profiles_path)?),
                Arc::new(InMemoryRepository::<FeedbackRecord>::open(feedback_path)?),
            ))
        }
        "memory" => Ok((
            Arc::new(InMemoryRepository::<UserProfile>::new()),
            Arc::new(InMemoryRepository::<FeedbackRecord>::new()),
        )),
        other => Err(EngineError::Configuration(format!("unknown storage backend: {other}"))),
    }
}

/// `profiles.json` → `profiles.feedback.json`, next to it.
fn feedback_path_for(profiles: &Path) -> std::path::PathBuf {
    let stem = profiles
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "profiles".into());
    profiles.with_file_name(format!("{stem}.feedback.json"))
}
