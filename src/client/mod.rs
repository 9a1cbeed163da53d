//! High-level client API

mod database;

pub use database::Database;
