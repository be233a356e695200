//! Multi-user listing watch monitor.
//!
//! Periodically re-visits each user's listing pages, extracts candidate
//! listings, filters them by keyword and price, and notifies each user once per
//! new matching listing.

pub mod commands;
pub mod config;
pub mod database;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod filter;
pub mod models;
pub mod monitor;
pub mod notifier;
pub mod text;
pub mod traits;
