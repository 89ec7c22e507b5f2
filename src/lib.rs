//! Secure media delivery and playback progress synchronization for course
//! content: signed media URLs, HTTP byte-range serving against a blob store,
//! and multi-device last-write-wins progress merging.

pub mod auth;
pub mod batcher;
pub mod blobstore;
pub mod config;
pub mod database;
pub mod delivery;
pub mod error;
pub mod models;
pub mod progress;
pub mod range;
pub mod routes;
pub mod signing;
