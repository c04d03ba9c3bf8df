//! CLI `profile` command: display what has been learned about a user.

use anyhow::Result;

use crate::config::KencotConfig;

/// Show a user's profile, insights and most recent feedback.
pub fn profile(config: &KencotConfig, user_id: &str, history: usize) -> Result<()> {
    let service = super::open_service(config)?;

    let Some(p) = service.profile(user_id)? else {
        println!("No profile for {user_id}");
        return Ok(());
    };

    let join = |set: &std::collections::BTreeSet<String>| {
        if set.is_empty() {
            "-".to_string()
        } else {
            set.iter().cloned().collect::<Vec<_>>().join(", ")
        }
    };

    println!("Profile: {}", p.user_id);
    println!("{}", "=".repeat(50));
    println!("  Faculty:        {}", p.faculty.as_deref().unwrap_or("-"));
    println!("  Favorites:      {}", join(&p.favorite_foods));
    println!("  Dislikes:       {}", join(&p.disliked_foods));
    println!("  Allergies:      {}", join(&p.allergies));
    match p.budget_range {
        Some(r) => println!("  Budget range:   Rp{} - Rp{}", r.min, r.max),
        None => println!("  Budget range:   -"),
    }
    println!("  Interactions:   {}", p.interaction_count);
    println!("  Hunger records: {}", p.hunger_patterns.len());
    println!("  Created:        {}", p.created_at);
    println!("  Updated:        {}", p.updated_at);

    if let Some(insights) = service.insights(user_id)? {
        if !insights.hints.is_empty() {
            println!();
            println!("Insights:");
            for hint in &insights.hints {
                println!("  - {hint}");
            }
        }
    }

    let records = service.feedback_history(user_id, history)?;
    if !records.is_empty() {
        println!();
        println!("Recent feedback:");
        for r in records {
            println!(
                "  {} [{}] {}{}",
                r.created_at.format("%Y-%m-%d %H:%M"),
                r.sentiment,
                r.foods.join(", "),
                r.comment.map(|c| format!(" ({c})")).unwrap_or_default()
            );
        }
    }

    Ok(())
}
