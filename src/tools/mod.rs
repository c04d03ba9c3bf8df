pub mod feedback_stats;
pub mod give_feedback;
pub mod inspect_profile;
pub mod recommend;
pub mod reset_session;
pub mod update_preferences;

use feedback_stats::FeedbackStatsParams;
use give_feedback::GiveFeedbackParams;
use inspect_profile::InspectProfileParams;
use recommend::RecommendParams;
use reset_session::ResetSessionParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use std::sync::Arc;
use update_preferences::UpdatePreferencesParams;

use crate::error::EngineError;
use crate::memory::types::Sentiment;
use crate::service::{RecommendRequest, RecommendationService};

/// Number of feedback records returned by `inspect_profile` when asked for history.
const FEEDBACK_HISTORY_LIMIT: usize = 10;

/// The Kencot MCP tool handler. Holds the shared recommendation service and exposes
/// every service operation via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct KencotTools {
    tool_router: ToolRouter<Self>,
    service: Arc<RecommendationService>,
}

impl KencotTools {
    /// Run a synchronous service call off the async runtime.
    async fn blocking<T, F>(&self, op: &'static str, f: F) -> Result<T, String>
    where
        T: Send + 'static,
        F: FnOnce(&RecommendationService) -> Result<T, EngineError> + Send + 'static,
    {
        let service = Arc::clone(&self.service);
        tokio::task::spawn_blocking(move || f(&service))
            .await
            .map_err(|e| format!("{op} task failed: {e}"))?
            .map_err(|e| format!("{op} failed: {e}"))
    }
}

#[tool_router]
impl KencotTools {
    pub fn new(service: Arc<RecommendationService>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            service,
        }
    }

    /// Recommend campus food for the current session.
    #[tool(description = "Recommend canteen food. Filters by budget, hunger level, faculty and time of day, ranks by semantic similarity, then personalizes with the user's profile. Missing fields are filled from earlier turns of the same session.")]
    async fn recommend(
        &self,
        Parameters(params): Parameters<RecommendParams>,
    ) -> Result<String, String> {
        tracing::info!(
            session_id = %params.session_id,
            user_id = ?params.user_id,
            "recommend called"
        );

        let request = RecommendRequest::from(params);
        let service = Arc::clone(&self.service);
        let response = tokio::task::spawn_blocking(move || service.recommend(&request))
            .await
            .map_err(|e| format!("recommend task failed: {e}"))?;

        serde_json::to_string(&response).map_err(|e| format!("serialization failed: {e}"))
    }

    /// Learn from the user's reaction to a recommendation.
    #[tool(description = "Record feedback on recommended foods. Positive feedback adds them to favorites and learns the budget range and hunger pattern; negative feedback adds them to dislikes so they are never recommended again.")]
    async fn give_feedback(
        &self,
        Parameters(params): Parameters<GiveFeedbackParams>,
    ) -> Result<String, String> {
        let sentiment: Sentiment = params.sentiment.parse().map_err(|e: String| e)?;

        tracing::info!(
            user_id = %params.user_id,
            sentiment = %sentiment,
            foods = params.foods.len(),
            "give_feedback called"
        );

        let record = self
            .blocking("feedback", move |s| {
                s.give_feedback(
                    &params.user_id,
                    sentiment,
                    &params.foods,
                    params.comment.as_deref(),
                    params.session_id.as_deref(),
                )
            })
            .await?;

        serde_json::to_string(&record).map_err(|e| format!("serialization failed: {e}"))
    }

    /// Edit favorites, dislikes, allergies or faculty directly.
    #[tool(description = "Edit a user's long-term preferences: favorites, dislikes, allergies (replaces the list) and home faculty. All edits are applied together.")]
    async fn update_preferences(
        &self,
        Parameters(params): Parameters<UpdatePreferencesParams>,
    ) -> Result<String, String> {
        let (user_id, update) = params.into_update();
        tracing::info!(user_id = %user_id, "update_preferences called");

        let profile = self
            .blocking("update", move |s| s.update_preferences(&user_id, &update))
            .await?;

        serde_json::to_string(&profile).map_err(|e| format!("serialization failed: {e}"))
    }

    /// Start the conversation over.
    #[tool(description = "Reset a session: clears its slots, history and last recommendations. The recommendation cooldown and the long-term profile are kept.")]
    async fn reset_session(
        &self,
        Parameters(params): Parameters<ResetSessionParams>,
    ) -> Result<String, String> {
        tracing::info!(session_id = %params.session_id, "reset_session called");

        let session_id = params.session_id.clone();
        self.blocking("reset", move |s| s.reset_session(&session_id))
            .await?;

        Ok(serde_json::json!({
            "status": "reset",
            "session_id": params.session_id,
        })
        .to_string())
    }

    /// Show what Kencot knows about a user.
    #[tool(description = "Inspect a user's profile and learned insights (usual hunger level, budget range, hints). Optionally includes recent feedback and a session summary.")]
    async fn inspect_profile(
        &self,
        Parameters(params): Parameters<InspectProfileParams>,
    ) -> Result<String, String> {
        tracing::info!(user_id = %params.user_id, "inspect_profile called");

        let include_feedback = params.include_feedback.unwrap_or(false);
        let value = self
            .blocking("inspect", move |s| {
                let profile = s.profile(&params.user_id)?;
                let insights = s.insights(&params.user_id)?;
                let feedback = if include_feedback {
                    Some(s.feedback_history(&params.user_id, FEEDBACK_HISTORY_LIMIT)?)
                } else {
                    None
                };
                let session = match params.session_id.as_deref() {
                    Some(id) => s.session_summary(id)?,
                    None => None,
                };
                Ok(serde_json::json!({
                    "user_id": params.user_id,
                    "found": profile.is_some(),
                    "profile": profile,
                    "insights": insights,
                    "feedback": feedback,
                    "session": session,
                }))
            })
            .await?;

        Ok(value.to_string())
    }

    /// Aggregate feedback counts.
    #[tool(description = "Feedback statistics: total, positive, negative and satisfaction rate, for one user or across all users.")]
    async fn feedback_stats(
        &self,
        Parameters(params): Parameters<FeedbackStatsParams>,
    ) -> Result<String, String> {
        tracing::info!(user_id = ?params.user_id, "feedback_stats called");

        let user_id = params.user_id.clone();
        let stats = self
            .blocking("stats", move |s| s.feedback_stats(user_id.as_deref()))
            .await?;

        Ok(serde_json::json!({
            "user_id": params.user_id,
            "stats": stats,
        })
        .to_string())
    }
}

#[tool_handler]
impl ServerHandler for KencotTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "Kencot recommends campus canteen food. Use recommend with whatever the user \
                 told you (faculty, hunger level, budget), give_feedback when they react to a \
                 suggestion, and update_preferences for explicit likes, dislikes and allergies."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::config::KencotConfig;
    use crate::embedding::ResilientEmbedder;

    const CATALOG: &str = r#"{"canteens": [
        {"name": "Kantin Teknik", "aliases": ["kantek"], "faculty_proximity": ["teknik"], "menus": [
            {"name": "Nasi Goreng", "price": 15000, "category": "heavy_meal", "suitability": ["midday", "evening"]},
            {"name": "Es Teh", "price": 4000, "category": "drink"}
        ]}
    ]}"#;

    fn tools() -> KencotTools {
        let catalog = Catalog::from_json_str(CATALOG).unwrap();
        let embedder = ResilientEmbedder::hash_only(384).unwrap();
        let service = RecommendationService::in_memory(catalog, embedder, &KencotConfig::default());
        KencotTools::new(Arc::new(service))
    }

    fn params(session: &str) -> RecommendParams {
        RecommendParams {
            session_id: session.into(),
            user_id: Some("u1".into()),
            faculty: None,
            hunger_level: Some("heavy".into()),
            budget: Some(20000),
            time_period: Some("midday".into()),
            message: None,
        }
    }

    #[tokio::test]
    async fn recommend_returns_json_response() {
        let out = tools().recommend(Parameters(params("s1"))).await.unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["status"], "ok");
        assert_eq!(v["candidates"][0]["name"], "Nasi Goreng");
    }

    #[tokio::test]
    async fn feedback_defaults_to_last_recommendation() {
        let t = tools();
        t.recommend(Parameters(params("s1"))).await.unwrap();
        let out = t
            .give_feedback(Parameters(GiveFeedbackParams {
                user_id: "u1".into(),
                sentiment: "suka".into(),
                foods: vec![],
                session_id: Some("s1".into()),
                comment: None,
            }))
            .await
            .unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["foods"][0], "Nasi Goreng");

        let profile = t
            .inspect_profile(Parameters(InspectProfileParams {
                user_id: "u1".into(),
                include_feedback: Some(true),
                session_id: None,
            }))
            .await
            .unwrap();
        let v: serde_json::Value = serde_json::from_str(&profile).unwrap();
        assert_eq!(v["found"], true);
        assert_eq!(v["profile"]["favorite_foods"][0], "Nasi Goreng");
        assert_eq!(v["feedback"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bad_sentiment_is_an_error() {
        let err = tools()
            .give_feedback(Parameters(GiveFeedbackParams {
                user_id: "u1".into(),
                sentiment: "meh".into(),
                foods: vec!["Es Teh".into()],
                session_id: None,
                comment: None,
            }))
            .await
            .unwrap_err();
        assert!(err.contains("meh"), "{err}");
    }

    #[tokio::test]
    async fn stats_after_feedback() {
        let t = tools();
        t.give_feedback(Parameters(GiveFeedbackParams {
            user_id: "u1".into(),
            sentiment: "negative".into(),
            foods: vec!["Es Teh".into()],
            session_id: None,
            comment: Some("kemanisan".into()),
        }))
        .await
        .unwrap();

        let out = t
            .feedback_stats(Parameters(FeedbackStatsParams { user_id: None }))
            .await
            .unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["stats"]["total"], 1);
        assert_eq!(v["stats"]["negative"], 1);
    }
}
