//! Sitenav: Content-Managed Site Navigation
//!
//! Keeps a CMS page store in step with the site's route table, assembles the navigation
//! bar from stored nav items, falls back to a hardcoded navigation when the store cannot
//! be trusted, and keeps content blocks in a gap-free order.

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod navigation;
pub mod ordering;
pub mod routes;
pub mod store;
pub mod sync;
pub mod types;
