//! Music catalog service library.
//!
//! Imports a song catalog into a key-value store with secondary indexes,
//! mirrors cover images into blob storage and serves lookups, registration
//! and subscriptions on top of it.

pub mod blob_store;
pub mod catalog;
pub mod composite_key;
pub mod config;
pub mod fetcher;
pub mod kv_store;
pub mod service;
pub mod sqlite_persistence;
pub mod user;

pub use service::{CatalogService, Clients};
