//! Fathom - Federated Retrieval Backend
//!
//! An HTTP backend that answers knowledge queries by fanning each request out
//! across retrieval lanes (web, vector, keyword, knowledge graph, news,
//! markets), walking every lane's provider chain under a strict time budget,
//! and fusing the per-lane rankings with reciprocal rank fusion into one
//! deduplicated, cited response.

pub mod budget;
pub mod cache;
pub mod cli;
pub mod config;
pub mod constraints;
pub mod error;
pub mod fusion;
pub mod lane;
pub mod orchestrator;
pub mod provider;
pub mod server;

pub use error::{FathomError, Result};
