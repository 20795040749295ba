//! Core domain model for encore.
//!
//! This crate defines the catalog model (songs and their enrichment
//! sub-records, popularity snapshots), users with their explicit and
//! inferred preferences, favorites, and the SQLite store that persists
//! them.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod model;
pub mod schema;

pub use error::{Error, Result};
