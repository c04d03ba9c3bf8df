use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ResetSessionParams {
    #[schemars(description = "Session to reset. The long-term profile is not touched.")]
    pub session_id: String,
}
