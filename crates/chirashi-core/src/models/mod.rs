//! Data models for flyer price extraction.

pub mod config;
pub mod entry;
pub mod record;
pub mod token;
