#![allow(dead_code)]

use std::path::Path;

use kencot::catalog::Catalog;
use kencot::config::KencotConfig;
use kencot::embedding::{EmbeddingProvider, ResilientEmbedder};
use kencot::service::{RecommendRequest, RecommendationService};

/// Two canteens: one near Teknik, one near FEB, covering every category.
pub const CAMPUS_CATALOG: &str = r#"{
  "canteens": [
    {
      "name": "Kantin Teknik",
      "aliases": ["kantek"],
      "faculty_proximity": ["Teknik"],
      "map_link": "https://maps.example/kantek",
      "menus": [
        {"name": "Nasi Ayam Geprek", "price": 12000, "category": "heavy_meal",
         "suitability": ["midday", "evening"], "tags": ["ayam", "pedas", "nasi"]},
        {"name": "Gado-Gado", "price": 10000, "category": "light_meal",
         "suitability": ["midday"], "tags": ["sayur", "peanut"]},
        {"name": "Es Teh", "price": 4000, "category": "drink", "tags": ["teh", "segar"]}
      ]
    },
    {
      "name": "Kantin FEB",
      "faculty_proximity": ["FEB"],
      "menus": [
        {"name": "Nasi Goreng", "price": 15000, "category": "heavy_meal",
         "suitability": ["evening"], "tags": ["nasi", "telur"],
         "calories": 650, "protein": 18, "fat": 22, "carbs": 90},
        {"name": "Bakso", "price": 13000, "category": "heavy_meal",
         "suitability": ["midday", "evening"], "tags": ["daging", "kuah"]},
        {"name": "Pisang Goreng", "price": 3000, "category": "snack",
         "suitability": ["afternoon"], "tags": ["pisang", "gorengan"]},
        {"name": "Roti Bakar Kacang", "price": 8000, "category": "snack",
         "suitability": ["morning", "afternoon"], "tags": ["roti", "peanut"]}
      ]
    }
  ]
}"#;

pub fn catalog(json: &str) -> Catalog {
    Catalog::from_json_str(json).unwrap()
}

/// Defaults with memory-only storage and the offline vocabulary embedder.
pub fn test_config() -> KencotConfig {
    let mut config = KencotConfig::default();
    config.storage.backend = "memory".into();
    config.embedding.provider = "vocabulary".into();
    config
}

/// Config whose stores and catalog live under `dir`.
pub fn disk_config(dir: &Path, backend: &str) -> KencotConfig {
    let mut config = test_config();
    config.storage.backend = backend.into();
    config.storage.db_path = dir.join("kencot.db").to_string_lossy().into_owned();
    config.storage.json_path = dir.join("profiles.json").to_string_lossy().into_owned();
    config.storage.catalog_path = dir.join("catalog.json").to_string_lossy().into_owned();
    config
}

pub fn test_service(json: &str) -> RecommendationService {
    RecommendationService::in_memory(
        catalog(json),
        ResilientEmbedder::degraded(384).unwrap(),
        &test_config(),
    )
}

pub fn request(session: &str, hunger: &str, budget: Option<i64>) -> RecommendRequest {
    RecommendRequest {
        session_id: session.into(),
        hunger_level: Some(hunger.into()),
        budget,
        time_period: Some("midday".into()),
        ..Default::default()
    }
}

/// A model that is always down.
pub struct BrokenModel;

impl EmbeddingProvider for BrokenModel {
    fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        anyhow::bail!("model offline")
    }

    fn dimensions(&self) -> usize {
        384
    }
}
