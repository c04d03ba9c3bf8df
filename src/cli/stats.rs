use anyhow::Result;

use crate::config::KencotConfig;

/// Display feedback statistics in the terminal.
pub fn stats(config: &KencotConfig, user_id: Option<&str>) -> Result<()> {
    let service = super::open_service(config)?;
    let stats = service.feedback_stats(user_id)?;
    let catalog = service.catalog();

    println!("Kencot Statistics");
    println!("{}", "=".repeat(40));
    println!("  Canteens:            {}", catalog.canteens().len());
    println!("  Menu items:          {}", catalog.len());
    println!("  Embedding path:      {}", service.embedding_path());
    println!("  Storage backend:     {}", config.storage.backend);
    if user_id.is_none() {
        println!("  Profiles:            {}", service.profiles()?.len());
    }
    println!();

    match user_id {
        Some(user) => println!("Feedback ({user}):"),
        None => println!("Feedback (all users):"),
    }
    println!("  Total:               {}", stats.total);
    println!("  Positive:            {}", stats.positive);
    println!("  Negative:            {}", stats.negative);
    println!("  Satisfaction:        {:.1}%", stats.satisfaction_rate * 100.0);

    Ok(())
}
