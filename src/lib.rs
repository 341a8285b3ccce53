//! Contact identity reconciliation.
//!
//! Incoming `(email, phoneNumber)` observations are matched against stored
//! contacts and merged into a single identity anchored by one primary record.
//! See [`resolve`] for the algorithm and [`db::Database`] for the SQLite store.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod resolve;

pub use error::{Error, Result};
