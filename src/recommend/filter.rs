//! Hard-constraint filter.
//!
//! Budget is never relaxed. Category applies whenever a hunger level is known. Faculty
//! proximity and time-of-day suitability apply in strict mode only; when strict mode
//! leaves nothing, the filter retries once without them.

use crate::catalog::MenuItem;
use crate::intent::Intent;

/// Items satisfying the intent's constraints, in catalog order.
pub fn filter<'a>(items: &[&'a MenuItem], intent: &Intent, strict: bool) -> Vec<&'a MenuItem> {
    let categories = intent.hunger_level.map(|h| h.allowed_categories());

    items
        .iter()
        .copied()
        .filter(|item| intent.budget.is_none_or(|b| item.price <= b))
        .filter(|item| {
            categories
                .as_ref()
                .is_none_or(|allowed| allowed.contains(&item.category))
        })
        .filter(|item| {
            !strict
                || intent
                    .faculty
                    .as_deref()
                    .is_none_or(|faculty| item.is_near(faculty))
        })
        .filter(|item| !strict || item.suits(intent.time_period))
        .collect()
}

/// Strict pass, then one relaxed pass if the strict pass is empty.
///
/// Returns the matching items and whether relaxation was needed.
pub fn filter_with_relaxation<'a>(
    items: &[&'a MenuItem],
    intent: &Intent,
) -> (Vec<&'a MenuItem>, bool) {
    let strict = filter(items, intent, true);
    if !strict.is_empty() {
        return (strict, false);
    }

    let relaxed = filter(items, intent, false);
    tracing::warn!(
        faculty = ?intent.faculty,
        time = %intent.time_period.as_str(),
        relaxed_matches = relaxed.len(),
        "no items satisfy proximity and time constraints, relaxing"
    );
    (relaxed, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Category;
    use crate::intent::{HungerLevel, TimePeriod};

    fn item(name: &str, price: u32, category: Category) -> MenuItem {
        MenuItem {
            name: name.into(),
            price,
            category,
            suitability: vec![TimePeriod::Midday],
            canteen: "Kantin Teknik".into(),
            map_link: None,
            proximity: vec!["Teknik".into()],
            tags: vec![],
            nutrition: None,
            embedding: None,
        }
    }

    fn refs(items: &[MenuItem]) -> Vec<&MenuItem> {
        items.iter().collect()
    }

    fn intent(faculty: Option<&str>, hunger: Option<HungerLevel>, budget: Option<u32>) -> Intent {
        Intent::new(faculty.map(String::from), hunger, budget, TimePeriod::Midday)
    }

    #[test]
    fn budget_is_inclusive() {
        let items = vec![item("A", 15000, Category::HeavyMeal), item("B", 15001, Category::HeavyMeal)];
        let out = filter(&refs(&items), &intent(None, None, Some(15000)), true);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "A");
    }

    #[test]
    fn heavy_hunger_allows_only_heavy_meals() {
        let items = vec![
            item("Nasi", 10000, Category::HeavyMeal),
            item("Roti", 5000, Category::LightMeal),
            item("Es Teh", 3000, Category::Drink),
        ];
        let out = filter(&refs(&items), &intent(None, Some(HungerLevel::Heavy), None), true);
        assert_eq!(out.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(), ["Nasi"]);
    }

    #[test]
    fn empty_intent_passes_everything_near_and_timely() {
        let items = vec![item("A", 1, Category::Snack), item("B", 2, Category::Drink)];
        assert_eq!(filter(&refs(&items), &intent(None, None, None), true).len(), 2);
    }

    #[test]
    fn relaxation_drops_proximity_but_keeps_budget() {
        let items = vec![item("A", 12000, Category::HeavyMeal), item("B", 30000, Category::HeavyMeal)];
        let i = intent(Some("Kedokteran"), Some(HungerLevel::Heavy), Some(15000));
        assert!(filter(&refs(&items), &i, true).is_empty());

        let (out, relaxed) = filter_with_relaxation(&refs(&items), &i);
        assert!(relaxed);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "A");
    }

    #[test]
    fn relaxation_drops_time_suitability() {
        let items = vec![item("A", 12000, Category::HeavyMeal)];
        let i = Intent::new(None, None, None, TimePeriod::Evening);
        let (out, relaxed) = filter_with_relaxation(&refs(&items), &i);
        assert!(relaxed);
        assert_eq!(out.len(), 1);
    }
}
