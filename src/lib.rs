//! Personalization engine for the news feed: learns topical and source
//! affinities from recorded user interactions and turns preference profiles
//! into ranked vector retrievals. Storage engines, the embedding model, and
//! the HTTP surface are collaborators behind the traits in [`stores`].

pub mod cache;
pub mod config;
pub mod models;
pub mod services;
pub mod stores;
pub mod utils;

pub use config::EngineConfig;
pub use services::learning::InteractionLearner;
pub use services::profiles::PreferenceService;
pub use services::query::PreferenceQueryBuilder;
pub use services::search::SemanticSearchEngine;
