//! SyncFlo: email sync dashboard backend.

pub mod analytics;
pub mod api;
pub mod assistant;
pub mod config;
pub mod draft;
pub mod error;
pub mod feed;
pub mod llm;
pub mod view;
