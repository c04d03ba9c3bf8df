//! Campus canteen food recommendations with two-tier user memory.
//!
//! Kencot answers "what should I eat?" for a student at a given faculty, hunger
//! level, budget and time of day. A request flows through three stages:
//!
//! | Stage | What it does | Failure mode |
//! |-------|--------------|--------------|
//! | **Filter** | Budget, hunger category, faculty proximity, time suitability | Relaxes faculty and time, then gives up with no candidates |
//! | **Retrieve** | Cosine similarity between a synthesized query and each item | Falls back from the ONNX model to a vocabulary, then a hash embedding |
//! | **Personalize** | Drops allergens and dislikes, boosts favorites | Runs without a profile |
//!
//! Short-term memory keeps per-session slots, history and a recommendation
//! cooldown. Long-term memory keeps per-user favorites, dislikes, allergies, a
//! budget range and hunger patterns, learned from explicit feedback.
//!
//! # Architecture
//!
//! - **Catalog**: canteens and menu items loaded from JSON, replaced wholesale on reload
//! - **Embeddings**: local ONNX Runtime with all-MiniLM-L6-v2 (384 dimensions), with offline fallbacks
//! - **Storage**: SQLite documents table, a JSON file, or memory only
//! - **Transport**: MCP over stdio (primary) or Streamable HTTP/SSE
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`catalog`]: Canteens, menu items and nutrition estimates
//! - [`intent`]: Validated recommendation requests
//! - [`embedding`]: Text-to-vector embedding with a resilient fallback chain
//! - [`similarity`]: Cosine similarity and threshold ranking
//! - [`recommend`]: Filter, retrieval and personalization pipeline
//! - [`memory`]: Short-term sessions, long-term profiles and the feedback learner
//! - [`db`]: SQLite initialization, schema and migrations
//! - [`service`]: The façade the MCP tools and CLI talk to

pub mod catalog;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod intent;
pub mod memory;
pub mod recommend;
pub mod service;
pub mod similarity;
