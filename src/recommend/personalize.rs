//! Personalization layer: allergy and dislike exclusion, favorite boost, re-sort.

use crate::catalog::MenuItem;
use crate::memory::types::{contains_ci, UserProfile};

/// A filtered item with its current score and position in filter order.
#[derive(Debug, Clone)]
pub struct Scored<'a> {
    pub item: &'a MenuItem,
    pub score: f32,
    pub order: usize,
}

fn has_allergen(item: &MenuItem, profile: &UserProfile) -> bool {
    item.tags.iter().any(|tag| contains_ci(&profile.allergies, tag))
}

fn matches_favorite(item: &MenuItem, profile: &UserProfile) -> bool {
    let name = item.name.to_lowercase();
    profile
        .favorite_foods
        .iter()
        .any(|fav| name.contains(&fav.trim().to_lowercase()))
}

/// Drop items carrying one of the user's allergens or on their dislike list.
///
/// These are hard exclusions, so callers run this over the whole ranked pool before
/// cutting it down to a window.
pub fn exclude<'a>(profile: Option<&UserProfile>, candidates: Vec<Scored<'a>>) -> Vec<Scored<'a>> {
    let Some(profile) = profile else {
        return candidates;
    };
    candidates
        .into_iter()
        .filter(|c| {
            let excluded = has_allergen(c.item, profile);
            if excluded {
                tracing::debug!(item = %c.item.name, "excluded by allergy");
            }
            !excluded
        })
        .filter(|c| !profile.is_disliked(&c.item.name))
        .collect()
}

/// Apply a profile to ranked candidates.
///
/// Without a profile the candidates are only re-sorted. Exclusion runs before the
/// boost, so a favorite carrying an allergen tag is still removed.
pub fn personalize<'a>(
    profile: Option<&UserProfile>,
    candidates: Vec<Scored<'a>>,
    favorite_boost: f32,
) -> Vec<Scored<'a>> {
    let mut out = exclude(profile, candidates);
    if let Some(profile) = profile {
        for c in out.iter_mut() {
            if matches_favorite(c.item, profile) {
                c.score = (c.score + favorite_boost).min(1.0);
            }
        }
    }

    out.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.order.cmp(&b.order)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Category;

    fn item(name: &str, tags: &[&str]) -> MenuItem {
        MenuItem {
            name: name.into(),
            price: 10000,
            category: Category::HeavyMeal,
            suitability: vec![],
            canteen: "Kantin".into(),
            map_link: None,
            proximity: vec![],
            tags: tags.iter().map(|t| t.to_string()).collect(),
            nutrition: None,
            embedding: None,
        }
    }

    fn scored<'a>(items: &'a [MenuItem], scores: &[f32]) -> Vec<Scored<'a>> {
        items
            .iter()
            .zip(scores)
            .enumerate()
            .map(|(order, (item, &score))| Scored { item, score, order })
            .collect()
    }

    fn names(out: &[Scored<'_>]) -> Vec<String> {
        out.iter().map(|c| c.item.name.clone()).collect()
    }

    #[test]
    fn allergy_beats_favorite() {
        let items = vec![item("Gado-Gado", &["Peanut", "sayur"]), item("Soto", &[])];
        let mut profile = UserProfile::new("u1");
        profile.allergies.insert("peanut".into());
        profile.add_favorite("gado-gado");

        let out = personalize(Some(&profile), scored(&items, &[0.9, 0.4]), 0.15);
        assert_eq!(names(&out), ["Soto"]);
    }

    #[test]
    fn favorite_boost_is_capped_and_reorders() {
        let items = vec![item("Bakso", &[]), item("Nasi Goreng Spesial", &[])];
        let mut profile = UserProfile::new("u1");
        profile.add_favorite("nasi goreng");

        let out = personalize(Some(&profile), scored(&items, &[0.8, 0.95]), 0.15);
        assert_eq!(names(&out), ["Nasi Goreng Spesial", "Bakso"]);
        assert_eq!(out[0].score, 1.0);
    }

    #[test]
    fn ties_keep_filter_order() {
        let items = vec![item("A", &[]), item("B", &[]), item("C", &[])];
        let out = personalize(None, scored(&items, &[0.5, 0.7, 0.5]), 0.15);
        assert_eq!(names(&out), ["B", "A", "C"]);
    }

    #[test]
    fn exclude_keeps_rank_order() {
        let items = vec![item("Pecel", &["peanut"]), item("Soto", &[]), item("Rawon", &[])];
        let mut profile = UserProfile::new("u1");
        profile.allergies.insert("peanut".into());
        let out = exclude(Some(&profile), scored(&items, &[0.9, 0.2, 0.6]));
        assert_eq!(names(&out), ["Soto", "Rawon"]);
        assert_eq!(exclude(None, scored(&items, &[0.9, 0.2, 0.6])).len(), 3);
    }

    #[test]
    fn disliked_items_are_dropped() {
        let items = vec![item("Mie Ayam", &[]), item("Rawon", &[])];
        let mut profile = UserProfile::new("u1");
        profile.add_dislike("mie ayam");
        let out = personalize(Some(&profile), scored(&items, &[0.9, 0.3]), 0.15);
        assert_eq!(names(&out), ["Rawon"]);
    }
}
