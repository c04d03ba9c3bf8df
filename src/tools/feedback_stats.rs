use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct FeedbackStatsParams {
    #[schemars(description = "Restrict to one user. Omit for global statistics.")]
    pub user_id: Option<String>,
}
