//! [`ProfileStore`] on a local SQLite file. Image bytes are stored inline as BLOBs.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

use super::{PROFILES_TABLE, ProfileStore, SKIN_PROFILES_TABLE, StoreError, USER_IMAGES_TABLE};
use crate::models::{
    NewImage, Profile, ProfileUpdate, SkinProfile, SkinProfileData, SkinProfileUpdate, UserImage,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS profiles (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL,
    username TEXT,
    profile_picture TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS user_skin_profiles (
    user_id TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS user_images (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    storage_path TEXT NOT NULL,
    bucket TEXT NOT NULL,
    content_type TEXT,
    created_at TEXT NOT NULL,
    image BLOB NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_user_images_user ON user_images (user_id, created_at);
";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file and make sure the tables exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        info!("Opened SQLite store at {}", path.as_ref().display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

/// Fixed-width timestamps so that text ordering matches time ordering.
fn timestamp(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(idx: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn get_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn get_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text).map_err(|e| conversion_error(idx, e))
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: get_uuid(row, 0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        profile_picture: row.get(3)?,
        created_at: get_time(row, 4)?,
        updated_at: get_time(row, 5)?,
    })
}

fn skin_profile_from_row(row: &Row<'_>) -> rusqlite::Result<SkinProfile> {
    let data: String = row.get(1)?;
    let data: SkinProfileData = serde_json::from_str(&data).map_err(|e| conversion_error(1, e))?;
    Ok(SkinProfile {
        user_id: get_uuid(row, 0)?,
        data,
        created_at: get_time(row, 2)?,
        updated_at: get_time(row, 3)?,
    })
}

fn image_from_row(row: &Row<'_>) -> rusqlite::Result<UserImage> {
    Ok(UserImage {
        id: get_uuid(row, 0)?,
        user_id: get_uuid(row, 1)?,
        storage_path: row.get(2)?,
        bucket: row.get(3)?,
        content_type: row.get(4)?,
        created_at: get_time(row, 5)?,
    })
}

/// Map primary key clashes to [`StoreError::Conflict`].
fn insert_error(e: rusqlite::Error, what: &'static str) -> StoreError {
    if e.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
        StoreError::Conflict(what)
    } else {
        StoreError::Sqlite(e)
    }
}

fn select_profile(conn: &Connection, user_id: Uuid) -> Result<Option<Profile>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT id, email, username, profile_picture, created_at, updated_at
             FROM profiles WHERE id = ?1",
            [user_id.to_string()],
            profile_from_row,
        )
        .optional()?)
}

fn select_skin_profile(conn: &Connection, user_id: Uuid) -> Result<Option<SkinProfile>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT user_id, data, created_at, updated_at
             FROM user_skin_profiles WHERE user_id = ?1",
            [user_id.to_string()],
            skin_profile_from_row,
        )
        .optional()?)
}

#[async_trait]
impl ProfileStore for SqliteStore {
    async fn create_profile(&self, profile: &Profile) -> Result<Profile, StoreError> {
        self.conn()?
            .execute(
                "INSERT INTO profiles (id, email, username, profile_picture, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    profile.id.to_string(),
                    profile.email,
                    profile.username,
                    profile.profile_picture,
                    timestamp(&profile.created_at),
                    timestamp(&profile.updated_at),
                ],
            )
            .map_err(|e| insert_error(e, PROFILES_TABLE))?;
        Ok(profile.clone())
    }

    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError> {
        select_profile(&*self.conn()?, user_id)
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<Option<Profile>, StoreError> {
        let conn = self.conn()?;
        let Some(mut profile) = select_profile(&conn, user_id)? else {
            return Ok(None);
        };

        profile.apply(update);
        conn.execute(
            "UPDATE profiles SET username = ?2, profile_picture = ?3, updated_at = ?4 WHERE id = ?1",
            params![
                user_id.to_string(),
                profile.username,
                profile.profile_picture,
                timestamp(&profile.updated_at),
            ],
        )?;
        Ok(Some(profile))
    }

    async fn create_skin_profile(&self, profile: &SkinProfile) -> Result<SkinProfile, StoreError> {
        let data = serde_json::to_string(&profile.data)?;
        self.conn()?
            .execute(
                "INSERT INTO user_skin_profiles (user_id, data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    profile.user_id.to_string(),
                    data,
                    timestamp(&profile.created_at),
                    timestamp(&profile.updated_at),
                ],
            )
            .map_err(|e| insert_error(e, SKIN_PROFILES_TABLE))?;
        Ok(profile.clone())
    }

    async fn get_skin_profile(&self, user_id: Uuid) -> Result<Option<SkinProfile>, StoreError> {
        select_skin_profile(&*self.conn()?, user_id)
    }

    async fn update_skin_profile(
        &self,
        user_id: Uuid,
        update: &SkinProfileUpdate,
    ) -> Result<Option<SkinProfile>, StoreError> {
        let conn = self.conn()?;
        let Some(mut profile) = select_skin_profile(&conn, user_id)? else {
            return Ok(None);
        };

        profile.apply(update);
        conn.execute(
            "UPDATE user_skin_profiles SET data = ?2, updated_at = ?3 WHERE user_id = ?1",
            params![
                user_id.to_string(),
                serde_json::to_string(&profile.data)?,
                timestamp(&profile.updated_at),
            ],
        )?;
        Ok(Some(profile))
    }

    async fn save_image(&self, image: NewImage) -> Result<UserImage, StoreError> {
        let row = UserImage {
            id: Uuid::new_v4(),
            user_id: image.user_id,
            storage_path: image.storage_path(),
            bucket: image.bucket,
            content_type: Some(image.content_type),
            created_at: Utc::now(),
        };

        self.conn()?
            .execute(
                "INSERT INTO user_images (id, user_id, storage_path, bucket, content_type, created_at, image)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    row.id.to_string(),
                    row.user_id.to_string(),
                    row.storage_path,
                    row.bucket,
                    row.content_type,
                    timestamp(&row.created_at),
                    image.bytes,
                ],
            )
            .map_err(|e| insert_error(e, USER_IMAGES_TABLE))?;

        debug!("Stored image {} for user {}", row.id, row.user_id);
        Ok(row)
    }

    async fn list_images(&self, user_id: Uuid) -> Result<Vec<UserImage>, StoreError> {
        let conn = self.conn()?;
        let mut statement = conn.prepare(
            "SELECT id, user_id, storage_path, bucket, content_type, created_at
             FROM user_images WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let images = statement
            .query_map([user_id.to_string()], image_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(images)
    }

    async fn delete_image(&self, user_id: Uuid, image_id: Uuid) -> Result<bool, StoreError> {
        let deleted = self.conn()?.execute(
            "DELETE FROM user_images WHERE id = ?1 AND user_id = ?2",
            params![image_id.to_string(), user_id.to_string()],
        )?;
        Ok(deleted > 0)
    }

    async fn download_image(&self, image: &UserImage) -> Result<Vec<u8>, StoreError> {
        self.conn()?
            .query_row(
                "SELECT image FROM user_images WHERE id = ?1",
                [image.id.to_string()],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?
            .ok_or(StoreError::NotFound("image"))
    }
}
