//! Text-to-vector embedding pipeline.
//!
//! Three providers produce vectors of the same configured dimension:
//!
//! | Path | Provider | Used when |
//! |------|----------|-----------|
//! | **Model** | [`local::OnnxEmbedder`] (all-MiniLM-L6-v2) | model files load at startup |
//! | **Vocabulary** | [`vocabulary::VocabularyEmbedder`] | model missing, failing, or too slow |
//! | **Hash** | [`hash::HashEmbedder`] | text shares no term with the food vocabulary |
//!
//! [`ResilientEmbedder`] chains them so the pipeline never halts for lack of a model.
//! [`create_provider`] builds the chain from configuration and logs which path is active.

pub mod hash;
pub mod local;
pub mod vocabulary;

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use serde::Serialize;

use crate::error::EngineError;

/// Number of dimensions produced by all-MiniLM-L6-v2.
pub const EMBEDDING_DIM: usize = 384;

/// Trait for embedding text into vectors.
///
/// All methods are synchronous. Callers in async contexts should use
/// `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of text strings. Implementations may override for batched inference.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Embed, also reporting whether the vector may be cached.
    ///
    /// The flag is false when a transient fallback produced the vector, so a later
    /// call could land in a different vector space.
    fn embed_cacheable(&self, text: &str) -> Result<(Vec<f32>, bool)> {
        Ok((self.embed(text)?, true))
    }

    /// Number of dimensions this provider produces.
    fn dimensions(&self) -> usize;
}

/// Which provider produced a vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingPath {
    Model,
    Vocabulary,
    Hash,
}

impl EmbeddingPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Vocabulary => "vocabulary",
            Self::Hash => "hash",
        }
    }
}

impl std::fmt::Display for EmbeddingPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// L2-normalize a vector. Returns a zero vector if the input norm is zero.
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

/// How long the model is skipped after a call times out.
const MODEL_BACKOFF: Duration = Duration::from_secs(30);

/// Model → vocabulary → hash fallback chain.
pub struct ResilientEmbedder {
    primary: Option<Arc<dyn EmbeddingProvider>>,
    vocabulary: Option<vocabulary::VocabularyEmbedder>,
    hash: hash::HashEmbedder,
    dimension: usize,
    timeout: Option<Duration>,
    /// Set when a model call times out; the model is bypassed until then.
    paused_until: Mutex<Option<Instant>>,
    backoff: Duration,
}

impl ResilientEmbedder {
    /// Build a chain around an optional primary model.
    ///
    /// Fails if the primary produces a different dimension than configured.
    pub fn new(
        primary: Option<Arc<dyn EmbeddingProvider>>,
        dimension: usize,
        timeout: Option<Duration>,
    ) -> Result<Self, EngineError> {
        if dimension == 0 {
            return Err(EngineError::Configuration(
                "embedding dimension must be greater than zero".into(),
            ));
        }
        if let Some(ref p) = primary {
            if p.dimensions() != dimension {
                return Err(EngineError::Configuration(format!(
                    "model produces {} dimensions, configured {dimension}",
                    p.dimensions()
                )));
            }
        }
        Ok(Self {
            primary,
            vocabulary: Some(vocabulary::VocabularyEmbedder::new(dimension)),
            hash: hash::HashEmbedder::new(dimension),
            dimension,
            timeout,
            paused_until: Mutex::new(None),
            backoff: MODEL_BACKOFF,
        })
    }

    /// Chain without a model: vocabulary first, hash as last resort.
    pub fn degraded(dimension: usize) -> Result<Self, EngineError> {
        Self::new(None, dimension, None)
    }

    /// Hash-only chain.
    pub fn hash_only(dimension: usize) -> Result<Self, EngineError> {
        let mut chain = Self::new(None, dimension, None)?;
        chain.vocabulary = None;
        Ok(chain)
    }

    /// The path a typical input takes with the providers currently loaded.
    pub fn active_path(&self) -> EmbeddingPath {
        if self.primary.is_some() {
            EmbeddingPath::Model
        } else if self.vocabulary.is_some() {
            EmbeddingPath::Vocabulary
        } else {
            EmbeddingPath::Hash
        }
    }

    /// Whether the model is being skipped after a recent timeout.
    pub fn model_paused(&self) -> bool {
        let guard = self
            .paused_until
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        matches!(*guard, Some(until) if Instant::now() < until)
    }

    fn pause_model(&self) {
        let mut guard = self
            .paused_until
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(Instant::now() + self.backoff);
    }

    /// Embed and report which provider produced the vector. Never fails.
    pub fn embed_traced(&self, text: &str) -> (Vec<f32>, EmbeddingPath) {
        if let Some(ref primary) = self.primary {
            if self.model_paused() {
                tracing::debug!("model paused after timeout, using fallback");
            } else {
                match self.embed_primary(primary, text) {
                    Ok(v) if v.len() == self.dimension => return (v, EmbeddingPath::Model),
                    Ok(v) => tracing::warn!(
                        got = v.len(),
                        expected = self.dimension,
                        "model returned wrong dimension, degrading"
                    ),
                    Err(e) => tracing::warn!(error = %e, "model embedding failed, degrading"),
                }
            }
        }

        if let Some(ref vocab) = self.vocabulary {
            match vocab.embed(text) {
                Ok(v) => return (v, EmbeddingPath::Vocabulary),
                Err(e) => tracing::debug!(error = %e, "vocabulary embedding unavailable, hashing"),
            }
        }

        (self.hash.embed_vector(text), EmbeddingPath::Hash)
    }

    /// Run the primary model, bounded by the configured timeout.
    fn embed_primary(&self, primary: &Arc<dyn EmbeddingProvider>, text: &str) -> Result<Vec<f32>> {
        let Some(timeout) = self.timeout else {
            return primary.embed(text);
        };

        let (tx, rx) = mpsc::channel();
        let provider = Arc::clone(primary);
        let owned = text.to_string();
        std::thread::spawn(move || {
            // Receiver may have given up already.
            let _ = tx.send(provider.embed(&owned));
        });

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                self.pause_model();
                tracing::warn!(backoff_secs = self.backoff.as_secs(), "model timed out, pausing it");
                anyhow::bail!("model call exceeded {} ms", timeout.as_millis())
            }
            Err(RecvTimeoutError::Disconnected) => anyhow::bail!("model worker exited"),
        }
    }
}

impl EmbeddingProvider for ResilientEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_traced(text).0)
    }

    fn embed_cacheable(&self, text: &str) -> Result<(Vec<f32>, bool)> {
        let (v, path) = self.embed_traced(text);
        let cacheable = self.primary.is_none() || path == EmbeddingPath::Model;
        Ok((v, cacheable))
    }

    fn dimensions(&self) -> usize {
        self.dimension
    }
}

/// Create the embedding chain from config.
///
/// A `local` provider whose model files are missing degrades to the vocabulary path
/// with a warning rather than failing; only configuration errors are returned.
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> Result<ResilientEmbedder, EngineError> {
    let timeout = (config.timeout_ms > 0).then(|| Duration::from_millis(config.timeout_ms));

    let chain = match config.provider.as_str() {
        "local" => match local::OnnxEmbedder::new(config) {
            Ok(model) => {
                let model: Arc<dyn EmbeddingProvider> = Arc::new(model);
                ResilientEmbedder::new(Some(model), config.dimension, timeout)?
            }
            Err(e) => {
                tracing::warn!(error = %e, "embedding model unavailable, using degraded vocabulary path");
                ResilientEmbedder::new(None, config.dimension, timeout)?
            }
        },
        "vocabulary" => ResilientEmbedder::degraded(config.dimension)?,
        "hash" => ResilientEmbedder::hash_only(config.dimension)?,
        other => {
            return Err(EngineError::Configuration(format!(
                "unknown embedding provider: {other}. Supported: local, vocabulary, hash"
            )))
        }
    };

    tracing::info!(
        path = %chain.active_path(),
        dimension = chain.dimension,
        "embedding provider ready"
    );
    Ok(chain)
}
