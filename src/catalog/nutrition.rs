//! Nutrition estimates for menu items that ship without nutrition facts.
//!
//! Lookup order: the first table keyword contained in the item name, otherwise the
//! category default.

use serde::{Deserialize, Serialize};

use super::Category;

/// Per-serving nutrition facts.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Nutrition {
    pub calories: f32,
    pub protein: f32,
    pub fat: f32,
    pub carbs: f32,
}

impl Nutrition {
    const fn new(calories: f32, protein: f32, fat: f32, carbs: f32) -> Self {
        Self {
            calories,
            protein,
            fat,
            carbs,
        }
    }
}

impl std::ops::Add for Nutrition {
    type Output = Nutrition;

    fn add(self, rhs: Self) -> Self::Output {
        Nutrition {
            calories: self.calories + rhs.calories,
            protein: self.protein + rhs.protein,
            fat: self.fat + rhs.fat,
            carbs: self.carbs + rhs.carbs,
        }
    }
}

/// Keyword table. Longer, more specific names come before their generic prefixes
/// so that "nasi goreng" wins over "nasi" and "telur penyet" over "telur".
const KNOWN_DISHES: &[(&str, Nutrition)] = &[
    ("nasi goreng", Nutrition::new(250.0, 8.0, 10.0, 35.0)),
    ("nasi rames", Nutrition::new(450.0, 18.0, 15.0, 60.0)),
    ("nasi campur", Nutrition::new(450.0, 18.0, 15.0, 60.0)),
    ("nasi sayur", Nutrition::new(200.0, 5.0, 3.0, 38.0)),
    ("nasi pecel", Nutrition::new(350.0, 12.0, 8.0, 55.0)),
    ("nasi putih", Nutrition::new(180.0, 4.0, 0.5, 40.0)),
    ("ayam geprek", Nutrition::new(400.0, 25.0, 18.0, 35.0)),
    ("ayam goreng", Nutrition::new(380.0, 28.0, 20.0, 25.0)),
    ("ayam bakar", Nutrition::new(320.0, 30.0, 12.0, 25.0)),
    ("ayam penyet", Nutrition::new(400.0, 25.0, 18.0, 35.0)),
    ("chicken katsu", Nutrition::new(420.0, 26.0, 20.0, 35.0)),
    ("chicken steak", Nutrition::new(380.0, 28.0, 18.0, 30.0)),
    ("mie ayam", Nutrition::new(350.0, 15.0, 12.0, 45.0)),
    ("mie goreng", Nutrition::new(400.0, 12.0, 15.0, 55.0)),
    ("mie dok-dok", Nutrition::new(420.0, 14.0, 18.0, 50.0)),
    ("indomie", Nutrition::new(380.0, 10.0, 16.0, 52.0)),
    ("soto ayam", Nutrition::new(250.0, 18.0, 8.0, 25.0)),
    ("soto", Nutrition::new(250.0, 18.0, 8.0, 25.0)),
    ("bakso", Nutrition::new(280.0, 15.0, 10.0, 30.0)),
    ("rawon", Nutrition::new(320.0, 22.0, 12.0, 28.0)),
    ("gado-gado", Nutrition::new(280.0, 10.0, 12.0, 35.0)),
    ("pecel", Nutrition::new(250.0, 9.0, 10.0, 32.0)),
    ("lotek", Nutrition::new(240.0, 8.0, 10.0, 30.0)),
    ("sayur lodeh", Nutrition::new(180.0, 5.0, 8.0, 22.0)),
    ("steak", Nutrition::new(450.0, 30.0, 25.0, 30.0)),
    ("batagor", Nutrition::new(320.0, 12.0, 18.0, 28.0)),
    ("dimsum", Nutrition::new(200.0, 8.0, 10.0, 18.0)),
    ("magelangan", Nutrition::new(380.0, 14.0, 16.0, 45.0)),
    ("gorengan", Nutrition::new(150.0, 3.0, 8.0, 18.0)),
    ("waffle", Nutrition::new(280.0, 5.0, 12.0, 38.0)),
    ("telur penyet", Nutrition::new(200.0, 14.0, 14.0, 8.0)),
    ("telur", Nutrition::new(155.0, 13.0, 11.0, 1.0)),
    ("jus", Nutrition::new(80.0, 1.0, 0.0, 18.0)),
    ("kopi", Nutrition::new(20.0, 1.0, 0.0, 3.0)),
];

pub fn category_default(category: Category) -> Nutrition {
    match category {
        Category::HeavyMeal => Nutrition::new(400.0, 18.0, 15.0, 50.0),
        Category::LightMeal => Nutrition::new(250.0, 8.0, 10.0, 30.0),
        Category::Snack => Nutrition::new(150.0, 3.0, 8.0, 18.0),
        Category::Drink => Nutrition::new(80.0, 1.0, 0.0, 18.0),
    }
}

/// Estimate nutrition from the dish name, falling back to the category default.
pub fn estimate(name: &str, category: Category) -> Nutrition {
    let name = name.to_lowercase();
    match KNOWN_DISHES.iter().find(|(key, _)| name.contains(key)) {
        Some((key, nutrition)) => {
            tracing::debug!(name = %name, matched = key, "nutrition matched by name");
            *nutrition
        }
        None => {
            tracing::debug!(name = %name, category = %category, "nutrition from category default");
            category_default(category)
        }
    }
}

/// Sum nutrition across a batch.
pub fn total<'a>(items: impl IntoIterator<Item = &'a Nutrition>) -> Nutrition {
    items
        .into_iter()
        .fold(Nutrition::default(), |acc, n| acc + *n)
}
