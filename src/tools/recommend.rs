use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::service::RecommendRequest;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RecommendParams {
    #[schemars(description = "Conversation session id. Slots and cooldown are tracked per session.")]
    pub session_id: String,

    #[schemars(description = "Optional user id. Enables personalization from the long-term profile.")]
    pub user_id: Option<String>,

    #[schemars(description = "Faculty the user is at or near, e.g. 'Teknik', 'FEB'. Only canteens near it are preferred.")]
    pub faculty: Option<String>,

    #[schemars(description = "Hunger level: 'light', 'standard' or 'heavy'")]
    pub hunger_level: Option<String>,

    #[schemars(description = "Maximum price in rupiah, e.g. 15000")]
    pub budget: Option<i64>,

    #[schemars(
        description = "Time of day: 'morning', 'midday', 'afternoon' or 'evening'. Defaults to the current time in WIB."
    )]
    pub time_period: Option<String>,

    #[schemars(description = "The user's raw message, kept in the session history")]
    pub message: Option<String>,
}

impl From<RecommendParams> for RecommendRequest {
    fn from(p: RecommendParams) -> Self {
        Self {
            session_id: p.session_id,
            user_id: p.user_id,
            faculty: p.faculty,
            hunger_level: p.hunger_level,
            budget: p.budget,
            time_period: p.time_period,
            message: p.message,
        }
    }
}
