//! termlens annotation service
//!
//! Loads TSV dictionaries as vocabularies and serves the query surface on
//! top of `termlens-core`: text annotation under a caller-side timeout,
//! bulk id lookup, reverse label lookup, compile and stats.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use termlens_annotate::{load_dictionaries, AnnotateRequest, AnnotateService, AnnotatorConfig};
//! use termlens_core::BasicNormalizer;
//!
//! # async fn run() -> termlens_annotate::Result<()> {
//! let config = AnnotatorConfig::from_env()?;
//! let normalizer = Arc::new(BasicNormalizer::new());
//! let registry = load_dictionaries(&config, normalizer.as_ref())?;
//! let service = AnnotateService::new(registry, normalizer, config);
//! service.compile_stale();
//!
//! let response = service
//!     .annotate(AnnotateRequest {
//!         text: "Take aspirin daily".into(),
//!         vocabularies: vec!["drugs".into()],
//!         min_tokens: None,
//!         max_tokens: None,
//!         threshold: None,
//!         tags: Default::default(),
//!         ranking: None,
//!         spans: Default::default(),
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod loader;
pub mod logging;
pub mod service;

pub use api::{
    AnnotateRequest, AnnotateResponse, CompileStatus, Denotation, FindLabelsRequest,
    FindLabelsResponse, HealthStatus, IdLookupRequest, IdLookupResponse, ServiceStats,
    VocabularyStats,
};
pub use config::AnnotatorConfig;
pub use error::{Result, ServiceError};
pub use loader::{load_dictionaries, load_dictionary};
pub use service::AnnotateService;
