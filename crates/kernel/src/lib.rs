//! Canvas CMS kernel library.
//!
//! Admin entry management: listing, validation, saving with bounded
//! revision history, and deletion. The `canvas` binary serves it over HTTP.

pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod form;
pub mod models;
pub mod permissions;
pub mod routes;
pub mod session;
pub mod state;
