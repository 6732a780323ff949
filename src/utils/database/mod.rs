//! Persistence for profiles, skin profiles and uploaded images.
//!
//! [`ProfileStore`] is the seam between the HTTP layer and whichever backend
//! is configured: the managed Postgres/Storage provider in production, or a
//! local SQLite file for development and tests.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    NewImage, Profile, ProfileUpdate, SkinProfile, SkinProfileUpdate, UserImage,
};

#[cfg(feature = "sqlite_store")]
pub mod sqlite;
pub mod supabase;

pub const PROFILES_TABLE: &str = "profiles";
pub const SKIN_PROFILES_TABLE: &str = "user_skin_profiles";
pub const USER_IMAGES_TABLE: &str = "user_images";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid credentials header: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    #[error("Unable to decode database row: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "sqlite_store")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Database returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} already exists")]
    Conflict(&'static str),

    #[error("Store backend '{0}' is not compiled in")]
    Unavailable(&'static str),

    #[error("Database connection lock poisoned")]
    Poisoned,
}

/// Storage operations used by the API. Lookups of missing rows return `Ok(None)`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Insert a profile row. Fails with [`StoreError::Conflict`] when the id is taken.
    async fn create_profile(&self, profile: &Profile) -> Result<Profile, StoreError>;

    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError>;

    async fn update_profile(
        &self,
        user_id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<Option<Profile>, StoreError>;

    /// Insert the user's skin profile. A user has at most one.
    async fn create_skin_profile(&self, profile: &SkinProfile) -> Result<SkinProfile, StoreError>;

    async fn get_skin_profile(&self, user_id: Uuid) -> Result<Option<SkinProfile>, StoreError>;

    async fn update_skin_profile(
        &self,
        user_id: Uuid,
        update: &SkinProfileUpdate,
    ) -> Result<Option<SkinProfile>, StoreError>;

    /// Upload the bytes and record the metadata row.
    async fn save_image(&self, image: NewImage) -> Result<UserImage, StoreError>;

    /// The user's images, newest first.
    async fn list_images(&self, user_id: Uuid) -> Result<Vec<UserImage>, StoreError>;

    /// Delete one of the user's images. Returns `false` when the user owns no such image.
    async fn delete_image(&self, user_id: Uuid, image_id: Uuid) -> Result<bool, StoreError>;

    async fn download_image(&self, image: &UserImage) -> Result<Vec<u8>, StoreError>;
}
