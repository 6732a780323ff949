//! Clients for the external services the backend orchestrates.

/// Sign up, sign in and bearer token verification against the identity provider.
pub mod auth;
/// Profile, skin profile and image persistence.
pub mod database;
/// Product lookups through the custom search API.
pub mod google_search;
/// Image diagnosis through a hosted vision model.
pub mod openai;
