//! Infohub: a hierarchical content graph (folders, documents, embedded text
//! and content objects) whose subsets are saved, loaded and unloaded as
//! persistence boundaries over an object store.

pub mod config;
pub mod db;
pub mod error;
pub mod loader;
pub mod models;
pub mod persist;
pub mod render;

pub use error::{ContentError, Result};
