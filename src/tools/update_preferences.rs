use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::service::PreferenceUpdate;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdatePreferencesParams {
    #[schemars(description = "User whose profile is edited")]
    pub user_id: String,

    #[schemars(description = "Foods to mark as favorites (removed from dislikes)")]
    #[serde(default)]
    pub add_favorites: Vec<String>,

    #[schemars(description = "Foods to remove from favorites")]
    #[serde(default)]
    pub remove_favorites: Vec<String>,

    #[schemars(description = "Foods to never recommend again (removed from favorites)")]
    #[serde(default)]
    pub add_dislikes: Vec<String>,

    #[schemars(description = "Foods to remove from dislikes")]
    #[serde(default)]
    pub remove_dislikes: Vec<String>,

    #[schemars(
        description = "Replaces the allergy list. Items tagged with any of these are never recommended. Omit to leave unchanged."
    )]
    pub allergies: Option<Vec<String>>,

    #[schemars(description = "Home faculty")]
    pub faculty: Option<String>,
}

impl UpdatePreferencesParams {
    pub fn into_update(self) -> (String, PreferenceUpdate) {
        (
            self.user_id,
            PreferenceUpdate {
                add_favorites: self.add_favorites,
                remove_favorites: self.remove_favorites,
                add_dislikes: self.add_dislikes,
                remove_dislikes: self.remove_dislikes,
                allergies: self.allergies,
                faculty: self.faculty,
            },
        )
    }
}
