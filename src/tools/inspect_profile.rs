use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct InspectProfileParams {
    #[schemars(description = "User to inspect")]
    pub user_id: String,

    #[schemars(description = "Include the most recent feedback records. Defaults to false.")]
    pub include_feedback: Option<bool>,

    #[schemars(description = "Session to summarize alongside the profile")]
    pub session_id: Option<String>,
}
