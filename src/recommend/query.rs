//! Query synthesis and item descriptive text.
//!
//! Both sides are phrased in the same food vocabulary so that the degraded
//! vocabulary embedder still finds overlap between a query and matching items.

use crate::catalog::{Category, MenuItem};
use crate::intent::{HungerLevel, Intent, TimePeriod};

/// Used in place of a hunger phrase when the intent has none.
pub const GENERIC_QUERY: &str = "makanan enak";

fn hunger_phrase(level: HungerLevel) -> &'static str {
    match level {
        HungerLevel::Heavy => "lapar berat porsi besar kenyang nasi",
        HungerLevel::Standard => "makan kenyang porsi biasa",
        HungerLevel::Light => "cemilan ringan minuman segar",
    }
}

fn time_phrase(period: TimePeriod) -> &'static str {
    match period {
        TimePeriod::Morning => "sarapan pagi",
        TimePeriod::Midday => "makan siang",
        TimePeriod::Afternoon => "cemilan sore",
        TimePeriod::Evening => "makan malam",
    }
}

fn category_phrase(category: Category) -> &'static str {
    match category {
        Category::HeavyMeal => "makanan berat porsi besar kenyang",
        Category::LightMeal => "makanan ringan",
        Category::Snack => "cemilan ringan",
        Category::Drink => "minuman segar",
    }
}

pub fn synthesize_query(intent: &Intent) -> String {
    let head = intent.hunger_level.map_or(GENERIC_QUERY, hunger_phrase);
    format!("{head} {}", time_phrase(intent.time_period))
}

/// Text embedded for a menu item: name, category, time slots, then tags.
pub fn item_text(item: &MenuItem) -> String {
    let mut parts = vec![item.name.as_str(), category_phrase(item.category)];
    parts.extend(item.suitability.iter().map(|p| time_phrase(*p)));
    parts.extend(item.tags.iter().map(String::as_str));
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hunger_and_time_are_concatenated() {
        let intent = Intent::new(None, Some(HungerLevel::Heavy), None, TimePeriod::Midday);
        assert_eq!(
            synthesize_query(&intent),
            "lapar berat porsi besar kenyang nasi makan siang"
        );
    }

    #[test]
    fn missing_hunger_uses_generic_phrase() {
        let intent = Intent::new(None, None, Some(20000), TimePeriod::Morning);
        assert_eq!(synthesize_query(&intent), "makanan enak sarapan pagi");
    }

    #[test]
    fn item_text_includes_tags_and_slots() {
        let item = MenuItem {
            name: "Soto Ayam".into(),
            price: 12000,
            category: Category::HeavyMeal,
            suitability: vec![TimePeriod::Morning, TimePeriod::Midday],
            canteen: "Bonbin".into(),
            map_link: None,
            proximity: vec![],
            tags: vec!["kuah".into(), "hangat".into()],
            nutrition: None,
            embedding: None,
        };
        assert_eq!(
            item_text(&item),
            "Soto Ayam makanan berat porsi besar kenyang sarapan pagi makan siang kuah hangat"
        );
    }
}
