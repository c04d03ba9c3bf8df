//! Catalog store: canteens and their menus.
//!
//! The catalog file is parsed into loose `Raw*` records and then validated into typed
//! [`Canteen`] / [`MenuItem`] values. Malformed records (negative price, unknown category,
//! duplicate item in a canteen) reject the whole load with [`EngineError::Catalog`];
//! nothing downstream ever sees a half-valid item.

pub mod nutrition;

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::intent::TimePeriod;
pub use nutrition::Nutrition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    HeavyMeal,
    LightMeal,
    Snack,
    Drink,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HeavyMeal => "heavy_meal",
            Self::LightMeal => "light_meal",
            Self::Snack => "snack",
            Self::Drink => "drink",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "heavy_meal" | "makanan_berat" | "nasi" | "paket_komplit" | "makanan_hangat" => {
                Ok(Self::HeavyMeal)
            }
            "light_meal" | "makanan_ringan" | "sarapan" => Ok(Self::LightMeal),
            "snack" | "cemilan" | "jajanan" => Ok(Self::Snack),
            "drink" | "minuman" => Ok(Self::Drink),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

/// A single menu entry. Identity is the `(canteen, name)` pair.
#[derive(Debug, Clone, Serialize)]
pub struct MenuItem {
    pub name: String,
    pub price: u32,
    pub category: Category,
    /// Empty means suitable at any time.
    pub suitability: Vec<TimePeriod>,
    pub canteen: String,
    pub map_link: Option<String>,
    /// Faculties this item is close to. Empty means no proximity constraint.
    pub proximity: Vec<String>,
    /// Descriptive and ingredient tags, matched against allergies.
    pub tags: Vec<String>,
    pub nutrition: Option<Nutrition>,
    /// Precomputed vector shipped with the catalog, if any.
    #[serde(skip_serializing)]
    pub embedding: Option<Vec<f32>>,
}

impl MenuItem {
    /// Composite key `canteen::name`, lowercased.
    pub fn key(&self) -> String {
        format!("{}::{}", self.canteen.to_lowercase(), self.name.to_lowercase())
    }

    pub fn is_near(&self, faculty: &str) -> bool {
        self.proximity.is_empty()
            || self
                .proximity
                .iter()
                .any(|f| f.eq_ignore_ascii_case(faculty.trim()))
    }

    pub fn suits(&self, period: TimePeriod) -> bool {
        self.suitability.is_empty() || self.suitability.contains(&period)
    }

    /// Nutrition facts from the catalog, or an estimate when absent.
    pub fn nutrition_or_estimate(&self) -> Nutrition {
        self.nutrition
            .unwrap_or_else(|| nutrition::estimate(&self.name, self.category))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Canteen {
    pub name: String,
    pub aliases: Vec<String>,
    pub faculty_proximity: Vec<String>,
    pub map_link: Option<String>,
    pub menus: Vec<MenuItem>,
}

impl Canteen {
    fn answers_to(&self, name: &str) -> bool {
        let name = name.trim();
        self.name.eq_ignore_ascii_case(name) || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}

/// Read-only view of all canteens. Replaced wholesale on reload.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Catalog {
    canteens: Vec<Canteen>,
}

// ── Raw file records ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawCatalog {
    #[serde(alias = "ugm_canteens")]
    canteens: Vec<RawCanteen>,
}

#[derive(Debug, Deserialize)]
struct RawCanteen {
    #[serde(alias = "canteen_name")]
    name: String,
    #[serde(default, alias = "canteen_alias")]
    aliases: Vec<String>,
    #[serde(default)]
    faculty_proximity: Vec<String>,
    #[serde(default, alias = "gmaps_link")]
    map_link: Option<String>,
    #[serde(default)]
    menus: Vec<RawMenu>,
}

#[derive(Debug, Deserialize)]
struct RawMenu {
    name: String,
    price: i64,
    category: String,
    #[serde(default)]
    suitability: Vec<String>,
    #[serde(default)]
    proximity: Option<Vec<String>>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    calories: Option<f32>,
    #[serde(default)]
    protein: Option<f32>,
    #[serde(default)]
    fat: Option<f32>,
    #[serde(default)]
    carbs: Option<f32>,
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

impl Catalog {
    /// Build a catalog from already-typed canteens, checking identity invariants.
    pub fn new(canteens: Vec<Canteen>) -> Result<Self, EngineError> {
        let mut seen_canteens = HashSet::new();
        for canteen in &canteens {
            if !seen_canteens.insert(canteen.name.to_lowercase()) {
                return Err(EngineError::Catalog(format!(
                    "duplicate canteen: {}",
                    canteen.name
                )));
            }
            let mut seen_items = HashSet::new();
            for item in &canteen.menus {
                if !seen_items.insert(item.name.to_lowercase()) {
                    return Err(EngineError::Catalog(format!(
                        "duplicate menu item '{}' in canteen '{}'",
                        item.name, canteen.name
                    )));
                }
            }
        }
        Ok(Self { canteens })
    }

    /// Load and validate a catalog file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Catalog(format!("failed to read catalog {}: {e}", path.display()))
        })?;
        let catalog = Self::from_json_str(&contents)?;
        tracing::info!(
            path = %path.display(),
            canteens = catalog.canteens.len(),
            items = catalog.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let raw: RawCatalog = serde_json::from_str(json)
            .map_err(|e| EngineError::Catalog(format!("malformed catalog JSON: {e}")))?;

        let canteens = raw
            .canteens
            .into_iter()
            .map(validate_canteen)
            .collect::<Result<Vec<_>, _>>()?;

        if canteens.is_empty() {
            tracing::warn!("catalog contains no canteens");
        }
        Self::new(canteens)
    }

    pub fn canteens(&self) -> &[Canteen] {
        &self.canteens
    }

    /// All menu items, in file order.
    pub fn items(&self) -> impl Iterator<Item = &MenuItem> {
        self.canteens.iter().flat_map(|c| c.menus.iter())
    }

    pub fn len(&self) -> usize {
        self.canteens.iter().map(|c| c.menus.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Case-insensitive lookup by canteen name or alias.
    pub fn canteen(&self, name_or_alias: &str) -> Option<&Canteen> {
        self.canteens.iter().find(|c| c.answers_to(name_or_alias))
    }

    /// Look up an item by canteen and item name (both case-insensitive).
    pub fn item(&self, canteen: &str, name: &str) -> Option<&MenuItem> {
        self.canteen(canteen)?
            .menus
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Canteens that list `faculty` in their proximity tags.
    pub fn canteens_near(&self, faculty: &str) -> Vec<&Canteen> {
        self.canteens
            .iter()
            .filter(|c| {
                c.faculty_proximity
                    .iter()
                    .any(|f| f.eq_ignore_ascii_case(faculty.trim()))
            })
            .collect()
    }
}

fn validate_canteen(raw: RawCanteen) -> Result<Canteen, EngineError> {
    let name = raw.name.trim().to_string();
    if name.is_empty() {
        return Err(EngineError::Catalog("canteen with empty name".into()));
    }

    let menus = raw
        .menus
        .into_iter()
        .map(|m| validate_menu(m, &name, &raw.faculty_proximity, raw.map_link.as_deref()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Canteen {
        name,
        aliases: raw.aliases,
        faculty_proximity: raw.faculty_proximity,
        map_link: raw.map_link,
        menus,
    })
}

fn validate_menu(
    raw: RawMenu,
    canteen: &str,
    canteen_proximity: &[String],
    map_link: Option<&str>,
) -> Result<MenuItem, EngineError> {
    let context = |msg: String| EngineError::Catalog(format!("{canteen} / {}: {msg}", raw.name));

    if raw.name.trim().is_empty() {
        return Err(EngineError::Catalog(format!("{canteen}: menu item with empty name")));
    }
    if raw.price < 0 {
        return Err(context(format!("negative price {}", raw.price)));
    }
    let price = u32::try_from(raw.price).map_err(|_| context("price out of range".into()))?;
    let category: Category = raw.category.parse().map_err(context)?;
    let suitability = raw
        .suitability
        .iter()
        .map(|s| s.parse::<TimePeriod>().map_err(|e| context(e.to_string())))
        .collect::<Result<Vec<_>, _>>()?;

    // Fields the record leaves out come from the estimate table.
    let nutrition = raw.calories.map(|calories| {
        let estimated = nutrition::estimate(&raw.name, category);
        Nutrition {
            calories,
            protein: raw.protein.unwrap_or(estimated.protein),
            fat: raw.fat.unwrap_or(estimated.fat),
            carbs: raw.carbs.unwrap_or(estimated.carbs),
        }
    });

    Ok(MenuItem {
        name: raw.name.trim().to_string(),
        price,
        category,
        suitability,
        canteen: canteen.to_string(),
        map_link: map_link.map(str::to_string),
        proximity: raw.proximity.unwrap_or_else(|| canteen_proximity.to_vec()),
        tags: raw.tags,
        nutrition,
        embedding: raw.embedding.filter(|e| !e.is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "ugm_canteens": [
            {
                "canteen_name": "Kantin Teknik",
                "canteen_alias": ["Kantek"],
                "faculty_proximity": ["Teknik", "FKKMK"],
                "gmaps_link": "https://maps.example/kantek",
                "menus": [
                    {"name": "Nasi Goreng", "price": 12000, "category": "makanan_berat", "suitability": ["siang", "malam"], "tags": ["nasi", "goreng"]},
                    {"name": "Es Teh", "price": 3000, "category": "minuman", "proximity": []}
                ]
            },
            {
                "name": "Kantin Filsafat",
                "menus": [
                    {"name": "Gado-gado", "price": 10000, "category": "light_meal", "tags": ["peanut"], "calories": 280, "protein": 10}
                ]
            }
        ]
    }"#;

    #[test]
    fn loads_original_field_names() {
        let catalog = Catalog::from_json_str(SAMPLE).unwrap();
        assert_eq!(catalog.canteens().len(), 2);
        assert_eq!(catalog.len(), 3);

        let nasi = catalog.item("kantin teknik", "nasi goreng").unwrap();
        assert_eq!(nasi.category, Category::HeavyMeal);
        assert_eq!(nasi.suitability, vec![TimePeriod::Midday, TimePeriod::Evening]);
        assert_eq!(nasi.proximity, vec!["Teknik".to_string(), "FKKMK".to_string()]);
        assert_eq!(nasi.map_link.as_deref(), Some("https://maps.example/kantek"));
    }

    #[test]
    fn item_level_proximity_overrides_canteen() {
        let catalog = Catalog::from_json_str(SAMPLE).unwrap();
        let teh = catalog.item("Kantin Teknik", "Es Teh").unwrap();
        assert!(teh.proximity.is_empty());
        assert!(teh.is_near("Hukum"));
    }

    #[test]
    fn alias_lookup_is_case_insensitive() {
        let catalog = Catalog::from_json_str(SAMPLE).unwrap();
        assert_eq!(catalog.canteen("KANTEK").unwrap().name, "Kantin Teknik");
        assert!(catalog.canteen("Kantin MIPA").is_none());
        assert_eq!(catalog.canteens_near("fkkmk").len(), 1);
    }

    #[test]
    fn partial_nutrition_is_kept() {
        let catalog = Catalog::from_json_str(SAMPLE).unwrap();
        let gado = catalog.item("Kantin Filsafat", "Gado-gado").unwrap();
        let n = gado.nutrition.unwrap();
        assert_eq!(n.calories, 280.0);
        assert_eq!(n.protein, 10.0);
        assert_eq!(n.fat, 12.0);
        assert_eq!(n.carbs, 35.0);
    }

    #[test]
    fn calories_only_fills_macros_from_estimate() {
        let json = r#"{"canteens": [{"name": "K", "menus": [
            {"name": "Nasi Uduk", "price": 9000, "category": "heavy_meal", "calories": 500}
        ]}]}"#;
        let catalog = Catalog::from_json_str(json).unwrap();
        let item = catalog.item("K", "Nasi Uduk").unwrap();
        let n = item.nutrition.unwrap();
        let estimated = nutrition::estimate("Nasi Uduk", Category::HeavyMeal);
        assert_eq!(n.calories, 500.0);
        assert!(n.protein > 0.0 && n.fat > 0.0 && n.carbs > 0.0);
        assert_eq!(n.protein, estimated.protein);
        assert_eq!(n.carbs, estimated.carbs);
    }

    #[test]
    fn negative_price_rejected() {
        let json = r#"{"canteens": [{"name": "K", "menus": [{"name": "X", "price": -1, "category": "snack"}]}]}"#;
        let err = Catalog::from_json_str(json).unwrap_err();
        assert!(matches!(err, EngineError::Catalog(_)));
        assert!(err.to_string().contains("negative price"));
    }

    #[test]
    fn unknown_category_rejected() {
        let json = r#"{"canteens": [{"name": "K", "menus": [{"name": "X", "price": 1, "category": "dessert"}]}]}"#;
        assert!(Catalog::from_json_str(json).is_err());
    }

    #[test]
    fn duplicate_items_rejected() {
        let json = r#"{"canteens": [{"name": "K", "menus": [
            {"name": "Bakso", "price": 1, "category": "snack"},
            {"name": "bakso", "price": 2, "category": "snack"}
        ]}]}"#;
        assert!(Catalog::from_json_str(json).is_err());
    }

    #[test]
    fn missing_file_is_catalog_error() {
        let err = Catalog::load("/nonexistent/catalog.json").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn empty_suitability_means_always() {
        let catalog = Catalog::from_json_str(SAMPLE).unwrap();
        let teh = catalog.item("Kantin Teknik", "Es Teh").unwrap();
        assert!(teh.suits(TimePeriod::Morning));
        assert!(teh.suits(TimePeriod::Evening));
    }
}
