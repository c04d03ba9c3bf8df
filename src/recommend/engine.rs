//! Retrieval engine: filter → query → embed → rank → personalize.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;

use super::filter::filter_with_relaxation;
use super::personalize::{exclude, personalize, Scored};
use super::query::{item_text, synthesize_query};
use crate::catalog::{Catalog, Category, MenuItem};
use crate::config::RetrievalConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::EngineError;
use crate::intent::Intent;
use crate::memory::types::UserProfile;
use crate::similarity::{batch_similarity, rank_above_threshold};

/// A ranked recommendation as handed to the presentation layer.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Candidate {
    pub name: String,
    pub price: u32,
    pub canteen_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_link: Option<String>,
    pub category: Category,
    pub calories: f32,
    pub protein: f32,
    pub fat: f32,
    pub carbs: f32,
    pub similarity_score: f32,
}

impl Candidate {
    fn from_scored(scored: &Scored<'_>) -> Self {
        let item = scored.item;
        let nutrition = item.nutrition_or_estimate();
        Self {
            name: item.name.clone(),
            price: item.price,
            canteen_name: item.canteen.clone(),
            map_link: item.map_link.clone(),
            category: item.category,
            calories: nutrition.calories,
            protein: nutrition.protein,
            fat: nutrition.fat,
            carbs: nutrition.carbs,
            similarity_score: scored.score,
        }
    }
}

pub struct Recommender {
    catalog: RwLock<Arc<Catalog>>,
    embedder: Arc<dyn EmbeddingProvider>,
    /// Item key → embedding, filled lazily.
    item_vectors: Mutex<HashMap<String, Vec<f32>>>,
    settings: RetrievalConfig,
}

impl Recommender {
    pub fn new(catalog: Catalog, embedder: Arc<dyn EmbeddingProvider>, settings: RetrievalConfig) -> Self {
        Self {
            catalog: RwLock::new(Arc::new(catalog)),
            embedder,
            item_vectors: Mutex::new(HashMap::new()),
            settings,
        }
    }

    /// Current catalog snapshot.
    pub fn catalog(&self) -> Arc<Catalog> {
        match self.catalog.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Swap in a new catalog and drop every cached item vector.
    pub fn replace_catalog(&self, catalog: Catalog) {
        let items = catalog.len();
        match self.catalog.write() {
            Ok(mut guard) => *guard = Arc::new(catalog),
            Err(poisoned) => *poisoned.into_inner() = Arc::new(catalog),
        }
        self.cache().clear();
        tracing::info!(items, "catalog replaced, embedding cache cleared");
    }

    pub fn settings(&self) -> &RetrievalConfig {
        &self.settings
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<f32>>> {
        self.item_vectors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of item vectors currently cached.
    pub fn cached_vectors(&self) -> usize {
        self.cache().len()
    }

    /// Cached vector, else a catalog-supplied vector of the right dimension, else a fresh embedding.
    ///
    /// Vectors from a transient fallback are used for this request but not cached.
    fn item_embedding(&self, item: &MenuItem) -> anyhow::Result<Vec<f32>> {
        let key = item.key();
        if let Some(v) = self.cache().get(&key) {
            return Ok(v.clone());
        }

        let dim = self.embedder.dimensions();
        let (vector, cacheable) = match item.embedding.as_ref() {
            Some(v) if v.len() == dim => (v.clone(), true),
            stale => {
                if let Some(v) = stale {
                    tracing::debug!(item = %item.name, got = v.len(), expected = dim, "regenerating stale item embedding");
                }
                let (v, cacheable) = self.embedder.embed_cacheable(&item_text(item))?;
                anyhow::ensure!(v.len() == dim, "embedder returned {} dims, expected {dim}", v.len());
                (v, cacheable)
            }
        };

        if cacheable {
            self.cache().insert(key, vector.clone());
        } else {
            tracing::debug!(item = %item.name, "fallback item vector not cached");
        }
        Ok(vector)
    }

    /// Rank catalog items for an intent.
    ///
    /// Returns at most `top_k` candidates. An empty result means nothing survived the
    /// filters; it is not an error. Only a failure to embed the query itself is.
    pub fn recommend(
        &self,
        profile: Option<&UserProfile>,
        intent: &Intent,
        top_k: usize,
    ) -> Result<Vec<Candidate>, EngineError> {
        if top_k == 0 {
            return Ok(vec![]);
        }

        let catalog = self.catalog();
        let all: Vec<&MenuItem> = catalog.items().collect();
        let (filtered, relaxed) = filter_with_relaxation(&all, intent);
        tracing::debug!(total = all.len(), filtered = filtered.len(), relaxed, "hard constraints applied");
        if filtered.is_empty() {
            return Ok(vec![]);
        }

        let query = synthesize_query(intent);
        let query_vector = self
            .embedder
            .embed(&query)
            .map_err(|e| EngineError::Embedding(format!("query '{query}': {e}")))?;

        let mut pool: Vec<&MenuItem> = Vec::with_capacity(filtered.len());
        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(filtered.len());
        for item in filtered {
            match self.item_embedding(item) {
                Ok(v) => {
                    pool.push(item);
                    vectors.push(v);
                }
                Err(e) => tracing::warn!(item = %item.name, error = %e, "skipping item, embedding failed"),
            }
        }

        let scores = batch_similarity(&query_vector, &vectors);
        let window = top_k.saturating_mul(self.settings.oversample_factor.max(1));

        let mut ranked = rank_above_threshold(&scores, self.settings.similarity_threshold);
        if ranked.is_empty() && !pool.is_empty() {
            tracing::debug!(
                threshold = self.settings.similarity_threshold,
                "nothing cleared the similarity threshold, ranking the whole pool"
            );
            ranked = rank_above_threshold(&scores, f32::NEG_INFINITY);
        }

        let scored: Vec<Scored<'_>> = ranked
            .into_iter()
            .map(|(order, score)| Scored {
                item: pool[order],
                score,
                order,
            })
            .collect();

        // Allergens and dislikes are removed before the window so safe items further
        // down still get a chance.
        let mut allowed = exclude(profile, scored);
        allowed.truncate(window);

        let personalized = personalize(profile, allowed, self.settings.favorite_boost);
        let candidates: Vec<Candidate> = personalized
            .iter()
            .take(top_k)
            .map(Candidate::from_scored)
            .collect();

        tracing::debug!(query = %query, returned = candidates.len(), "recommendation ranked");
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Canteen;
    use crate::embedding::ResilientEmbedder;
    use crate::intent::{HungerLevel, TimePeriod};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        inner: ResilientEmbedder,
        calls: AtomicUsize,
    }

    impl EmbeddingProvider for CountingEmbedder {
        fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text)
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }
    }

    struct FailsOn(&'static str);

    impl EmbeddingProvider for FailsOn {
        fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            anyhow::ensure!(!text.starts_with(self.0), "boom");
            Ok(vec![1.0, 0.0, 0.0, 0.0])
        }

        fn dimensions(&self) -> usize {
            4
        }
    }

    /// Fixed 2-d vectors: the query points one way, every item almost the opposite way.
    struct Opposed;

    impl EmbeddingProvider for Opposed {
        fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            if text.starts_with("lapar") {
                Ok(vec![1.0, 0.0])
            } else {
                Ok(vec![-1.0, 0.1])
            }
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    /// Items named "Pecel ..." sit right on the query; everything else lower.
    struct PecelFirst;

    impl EmbeddingProvider for PecelFirst {
        fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            if text.starts_with("lapar") || text.starts_with("Pecel") {
                Ok(vec![1.0, 0.0])
            } else {
                Ok(vec![0.6, 0.8])
            }
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    /// Fails its first `failures` calls, then returns the same unit vector.
    struct RecoveringModel {
        failures: AtomicUsize,
    }

    impl EmbeddingProvider for RecoveringModel {
        fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                anyhow::bail!("model warming up");
            }
            let mut v = vec![0.0; 64];
            v[0] = 1.0;
            Ok(v)
        }

        fn dimensions(&self) -> usize {
            64
        }
    }

    fn menu(name: &str, price: u32, category: Category) -> MenuItem {
        MenuItem {
            name: name.into(),
            price,
            category,
            suitability: vec![TimePeriod::Midday],
            canteen: "Kantin Teknik".into(),
            map_link: Some("https://maps.example/teknik".into()),
            proximity: vec!["Teknik".into()],
            tags: vec![],
            nutrition: None,
            embedding: None,
        }
    }

    fn catalog(items: Vec<MenuItem>) -> Catalog {
        Catalog::new(vec![Canteen {
            name: "Kantin Teknik".into(),
            aliases: vec![],
            faculty_proximity: vec!["Teknik".into()],
            map_link: None,
            menus: items,
        }])
        .unwrap()
    }

    fn heavy_midday(budget: u32) -> Intent {
        Intent::new(Some("Teknik".into()), Some(HungerLevel::Heavy), Some(budget), TimePeriod::Midday)
    }

    #[test]
    fn respects_top_k_and_fills_nutrition() {
        let items = (0..6)
            .map(|i| menu(&format!("Nasi Goreng {i}"), 10000 + i, Category::HeavyMeal))
            .collect();
        let r = Recommender::new(
            catalog(items),
            Arc::new(ResilientEmbedder::degraded(64).unwrap()),
            RetrievalConfig::default(),
        );
        let out = r.recommend(None, &heavy_midday(20000), 3).unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|c| c.calories > 0.0));
        assert!(out.windows(2).all(|w| w[0].similarity_score >= w[1].similarity_score));
    }

    #[test]
    fn item_vectors_are_cached_until_reload() {
        let embedder = Arc::new(CountingEmbedder {
            inner: ResilientEmbedder::degraded(64).unwrap(),
            calls: AtomicUsize::new(0),
        });
        let r = Recommender::new(
            catalog(vec![menu("Ayam Geprek", 12000, Category::HeavyMeal)]),
            embedder.clone(),
            RetrievalConfig::default(),
        );
        r.recommend(None, &heavy_midday(15000), 3).unwrap();
        r.recommend(None, &heavy_midday(15000), 3).unwrap();
        // one item embedding + two query embeddings
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
        assert_eq!(r.cached_vectors(), 1);

        r.replace_catalog(catalog(vec![menu("Bakso", 9000, Category::HeavyMeal)]));
        assert_eq!(r.cached_vectors(), 0);
    }

    #[test]
    fn wrong_dimension_catalog_vector_is_regenerated() {
        let mut item = menu("Rawon", 14000, Category::HeavyMeal);
        item.embedding = Some(vec![1.0, 2.0]);
        let r = Recommender::new(
            catalog(vec![item]),
            Arc::new(ResilientEmbedder::degraded(64).unwrap()),
            RetrievalConfig::default(),
        );
        let out = r.recommend(None, &heavy_midday(15000), 3).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn failing_item_is_skipped() {
        let r = Recommender::new(
            catalog(vec![
                menu("Broken", 10000, Category::HeavyMeal),
                menu("Fine", 10000, Category::HeavyMeal),
            ]),
            Arc::new(FailsOn("Broken")),
            RetrievalConfig::default(),
        );
        let out = r.recommend(None, &heavy_midday(15000), 3).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "Fine");
    }

    #[test]
    fn zero_top_k_is_empty() {
        let r = Recommender::new(
            catalog(vec![menu("Soto", 10000, Category::HeavyMeal)]),
            Arc::new(ResilientEmbedder::hash_only(16).unwrap()),
            RetrievalConfig::default(),
        );
        assert!(r.recommend(None, &heavy_midday(15000), 0).unwrap().is_empty());
    }

    #[test]
    fn negative_similarity_still_returns_filtered_items() {
        let r = Recommender::new(
            catalog(vec![menu("Rawon", 14000, Category::HeavyMeal)]),
            Arc::new(Opposed),
            RetrievalConfig::default(),
        );
        let out = r.recommend(None, &heavy_midday(15000), 3).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].similarity_score < 0.0);
    }

    #[test]
    fn allergens_above_the_window_do_not_hide_safe_items() {
        let mut items: Vec<MenuItem> = (0..6)
            .map(|i| {
                let mut m = menu(&format!("Pecel {i}"), 10000 + i, Category::HeavyMeal);
                m.tags = vec!["peanut".into()];
                m
            })
            .collect();
        items.push(menu("Soto", 11000, Category::HeavyMeal));
        let r = Recommender::new(catalog(items), Arc::new(PecelFirst), RetrievalConfig::default());

        let mut profile = UserProfile::new("u1");
        profile.allergies.insert("peanut".into());
        let out = r.recommend(Some(&profile), &heavy_midday(20000), 3).unwrap();
        let names: Vec<&str> = out.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Soto"]);
    }

    #[test]
    fn item_vectors_from_a_failing_model_are_not_kept() {
        let model = Arc::new(RecoveringModel {
            failures: AtomicUsize::new(2),
        });
        let embedder = ResilientEmbedder::new(Some(model), 64, None).unwrap();
        let r = Recommender::new(
            catalog(vec![menu("Nasi Goreng", 12000, Category::HeavyMeal)]),
            Arc::new(embedder),
            RetrievalConfig::default(),
        );

        // Query and item both land on the fallback path.
        let first = r.recommend(None, &heavy_midday(15000), 3).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(r.cached_vectors(), 0);

        // Model healthy again: the item is re-embedded in model space.
        let second = r.recommend(None, &heavy_midday(15000), 3).unwrap();
        assert!((second[0].similarity_score - 1.0).abs() < 1e-6);
        assert_eq!(r.cached_vectors(), 1);
    }
}
