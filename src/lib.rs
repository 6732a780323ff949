//! Skincare analysis backend: a vision model diagnoses an uploaded face image,
//! web search finds matching products and a morning/evening routine is built
//! from them. Identity, tables and image bytes live with a managed provider.

pub mod analysis;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod state;
pub mod utils;
