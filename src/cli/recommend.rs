//! CLI `recommend` command: run one recommendation cycle from the terminal.

use anyhow::{bail, Result};

use crate::config::KencotConfig;
use crate::intent::parse_budget;
use crate::service::{RecommendRequest, ResponseStatus};

pub struct RecommendArgs {
    pub user: Option<String>,
    pub faculty: Option<String>,
    pub hunger: Option<String>,
    /// Budget as typed, e.g. "15000", "15k", "15rb".
    pub budget: Option<String>,
    pub time: Option<String>,
    pub json: bool,
}

pub fn recommend(config: &KencotConfig, args: RecommendArgs) -> Result<()> {
    let budget = match args.budget.as_deref() {
        Some(text) => match parse_budget(text) {
            Some(b) => Some(i64::from(b)),
            None => bail!("could not read budget: {text}"),
        },
        None => None,
    };

    let service = super::open_service(config)?;
    let request = RecommendRequest {
        session_id: format!("cli-{}", uuid::Uuid::now_v7()),
        user_id: args.user,
        faculty: args.faculty,
        hunger_level: args.hunger,
        budget,
        time_period: args.time,
        message: None,
    };
    let response = service.recommend(&request);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if response.status != ResponseStatus::Ok {
        println!(
            "{}",
            response.message.as_deref().unwrap_or("no recommendation")
        );
        return Ok(());
    }

    println!("Recommendations ({} embeddings)", service.embedding_path());
    println!("{}", "=".repeat(60));
    for (i, c) in response.candidates.iter().enumerate() {
        println!(
            "{}. {:<28} Rp{:<8} {}",
            i + 1,
            c.name,
            c.price,
            c.canteen_name
        );
        println!(
            "   {:<12} {:>5.0} kcal  score {:.3}",
            c.category.as_str(), c.calories, c.similarity_score
        );
        if let Some(ref link) = c.map_link {
            println!("   {link}");
        }
    }

    if let Some(total) = response.total_nutrition {
        println!();
        println!(
            "Total: {:.0} kcal, protein {:.1}g, fat {:.1}g, carbs {:.1}g",
            total.calories, total.protein, total.fat, total.carbs
        );
    }

    Ok(())
}
