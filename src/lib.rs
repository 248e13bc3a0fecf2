//! A product catalog whose category schema lives in a graph store.
//!
//! Categories form a tree and declare typed attributes that every product in
//! the category, or in any descendant, exposes. Attribute types are persisted
//! entities created on demand and shared across categories.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod shell;

pub use catalog::Store;
pub use error::{CatalogError, Result};
