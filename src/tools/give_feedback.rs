use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GiveFeedbackParams {
    #[schemars(description = "User giving the feedback")]
    pub user_id: String,

    #[schemars(description = "Sentiment: 'positive' (liked it) or 'negative' (did not)")]
    pub sentiment: String,

    #[schemars(
        description = "Foods the feedback is about. Defaults to the foods last recommended in session_id."
    )]
    #[serde(default)]
    pub foods: Vec<String>,

    #[schemars(description = "Session the recommendation came from. Its slots are recorded with the feedback.")]
    pub session_id: Option<String>,

    #[schemars(description = "Optional free-text comment")]
    pub comment: Option<String>,
}
