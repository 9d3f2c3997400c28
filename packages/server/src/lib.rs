// Saigon Wheels - Rental Price Search API
//
// This crate provides the backend for searching motorbike rental prices
// across known shop websites. One search fans out to a browser-automation
// agent per site and streams results back over SSE as they land, merged
// with a short-lived cache of earlier scrapes.

pub mod common;
pub mod config;
pub mod kernel;
pub mod server;

pub use config::*;
