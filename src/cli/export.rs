use anyhow::Result;
use serde::Serialize;

use crate::config::KencotConfig;
use crate::memory::types::{FeedbackRecord, UserProfile};

/// Export format: every profile with its feedback history.
#[derive(Debug, Serialize)]
struct ExportData {
    profiles: Vec<UserProfile>,
    feedback: Vec<FeedbackRecord>,
}

/// Export all profiles and feedback as JSON to stdout.
pub fn export(config: &KencotConfig) -> Result<()> {
    let service = super::open_service(config)?;

    let mut profiles = service.profiles()?;
    profiles.sort_by(|a, b| a.user_id.cmp(&b.user_id));

    let mut feedback = Vec::new();
    for p in &profiles {
        feedback.extend(service.feedback_history(&p.user_id, usize::MAX)?);
    }
    feedback.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    let data = ExportData { profiles, feedback };

    let json = serde_json::to_string_pretty(&data)?;
    println!("{json}");

    eprintln!(
        "Exported {} profiles and {} feedback records.",
        data.profiles.len(),
        data.feedback.len()
    );

    Ok(())
}
