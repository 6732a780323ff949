//! [`ProfileStore`] backed by the managed provider's REST table API and object storage.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{PROFILES_TABLE, ProfileStore, SKIN_PROFILES_TABLE, StoreError, USER_IMAGES_TABLE};
use crate::models::{
    NewImage, Profile, ProfileUpdate, SkinProfile, SkinProfileUpdate, UserImage,
};

pub struct SupabaseStore {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseStore {
    pub fn new(client: Client, base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path)
    }

    /// Service-key credentials, sent both as `apikey` and as a bearer token.
    fn auth_headers(&self) -> Result<HeaderMap, StoreError> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(&self.service_key)?);
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&["Bearer ", &self.service_key].concat())?,
        );
        Ok(headers)
    }

    fn request(&self, builder: RequestBuilder) -> Result<RequestBuilder, StoreError> {
        Ok(builder.headers(self.auth_headers()?))
    }

    /// Turn non-2xx responses into errors; 409 means a unique key clash.
    async fn check(response: Response, what: &'static str) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::CONFLICT {
            return Err(StoreError::Conflict(what));
        }

        let message = response.text().await.unwrap_or_default();
        error!("Database request for {} failed with {}: {}", what, status, message);
        Err(StoreError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &'static str,
        filters: &[(&str, String)],
        newest_first: bool,
    ) -> Result<Vec<T>, StoreError> {
        let mut query: Vec<(&str, String)> = vec![("select", "*".to_string())];
        query.extend(filters.iter().cloned());
        if newest_first {
            query.push(("order", "created_at.desc".to_string()));
        }

        let response = self
            .request(self.client.get(self.table_url(table)).query(&query))?
            .send()
            .await?;
        let body = Self::check(response, table).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn insert<T: Serialize + Sync, R: DeserializeOwned>(
        &self,
        table: &'static str,
        row: &T,
    ) -> Result<R, StoreError> {
        let response = self
            .request(self.client.post(self.table_url(table)))?
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await?;
        let body = Self::check(response, table).await?.text().await?;
        let mut rows: Vec<R> = serde_json::from_str(&body)?;
        if rows.is_empty() {
            return Err(StoreError::Status {
                status: 200,
                message: format!("insert into {} returned no rows", table),
            });
        }
        Ok(rows.swap_remove(0))
    }

    /// PATCH the rows matching `filter`, stamping `updated_at`.
    async fn update<R: DeserializeOwned>(
        &self,
        table: &'static str,
        filter: (&str, String),
        mut changes: Value,
    ) -> Result<Option<R>, StoreError> {
        if let Value::Object(map) = &mut changes {
            map.insert(
                "updated_at".to_string(),
                serde_json::to_value(Utc::now())?,
            );
        }

        let response = self
            .request(self.client.patch(self.table_url(table)).query(&[filter]))?
            .header("Prefer", "return=representation")
            .json(&changes)
            .send()
            .await?;
        let body = Self::check(response, table).await?.text().await?;
        let rows: Vec<R> = serde_json::from_str(&body)?;
        Ok(rows.into_iter().next())
    }

    async fn remove_object(&self, bucket: &str, path: &str) -> Result<(), StoreError> {
        let response = self
            .request(self.client.delete(self.object_url(bucket, path)))?
            .send()
            .await?;
        Self::check(response, "storage object").await?;
        Ok(())
    }
}

fn eq(value: impl ToString) -> String {
    format!("eq.{}", value.to_string())
}

#[async_trait]
impl ProfileStore for SupabaseStore {
    async fn create_profile(&self, profile: &Profile) -> Result<Profile, StoreError> {
        info!("Creating profile for {}", profile.id);
        self.insert(PROFILES_TABLE, profile).await
    }

    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError> {
        let rows: Vec<Profile> = self
            .select(PROFILES_TABLE, &[("id", eq(user_id))], false)
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<Option<Profile>, StoreError> {
        self.update(PROFILES_TABLE, ("id", eq(user_id)), serde_json::to_value(update)?)
            .await
    }

    async fn create_skin_profile(&self, profile: &SkinProfile) -> Result<SkinProfile, StoreError> {
        info!("Creating skin profile for {}", profile.user_id);
        self.insert(SKIN_PROFILES_TABLE, profile).await
    }

    async fn get_skin_profile(&self, user_id: Uuid) -> Result<Option<SkinProfile>, StoreError> {
        let rows: Vec<SkinProfile> = self
            .select(SKIN_PROFILES_TABLE, &[("user_id", eq(user_id))], false)
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn update_skin_profile(
        &self,
        user_id: Uuid,
        update: &SkinProfileUpdate,
    ) -> Result<Option<SkinProfile>, StoreError> {
        self.update(
            SKIN_PROFILES_TABLE,
            ("user_id", eq(user_id)),
            serde_json::to_value(update)?,
        )
        .await
    }

    async fn save_image(&self, image: NewImage) -> Result<UserImage, StoreError> {
        let storage_path = image.storage_path();
        debug!(
            "Uploading {} bytes to {}/{}",
            image.bytes.len(),
            image.bucket,
            storage_path
        );

        let response = self
            .request(self.client.post(self.object_url(&image.bucket, &storage_path)))?
            .header(header::CONTENT_TYPE, image.content_type.as_str())
            .body(image.bytes)
            .send()
            .await?;
        Self::check(response, "storage object").await?;

        let row = UserImage {
            id: Uuid::new_v4(),
            user_id: image.user_id,
            storage_path,
            bucket: image.bucket,
            content_type: Some(image.content_type),
            created_at: Utc::now(),
        };

        match self.insert::<_, UserImage>(USER_IMAGES_TABLE, &row).await {
            Ok(saved) => Ok(saved),
            Err(e) => {
                // Don't leave an orphaned object behind.
                if let Err(cleanup) = self.remove_object(&row.bucket, &row.storage_path).await {
                    warn!("Failed to remove orphaned object {}: {}", row.storage_path, cleanup);
                }
                Err(e)
            }
        }
    }

    async fn list_images(&self, user_id: Uuid) -> Result<Vec<UserImage>, StoreError> {
        self.select(USER_IMAGES_TABLE, &[("user_id", eq(user_id))], true)
            .await
    }

    async fn delete_image(&self, user_id: Uuid, image_id: Uuid) -> Result<bool, StoreError> {
        let filters = [("id", eq(image_id)), ("user_id", eq(user_id))];
        let rows: Vec<UserImage> = self.select(USER_IMAGES_TABLE, &filters, false).await?;
        let Some(image) = rows.into_iter().next() else {
            return Ok(false);
        };

        if let Err(e) = self.remove_object(&image.bucket, &image.storage_path).await {
            warn!("Failed to remove object {}: {}", image.storage_path, e);
        }

        let response = self
            .request(self.client.delete(self.table_url(USER_IMAGES_TABLE)).query(&filters))?
            .send()
            .await?;
        Self::check(response, USER_IMAGES_TABLE).await?;

        info!("Deleted image {} of user {}", image_id, user_id);
        Ok(true)
    }

    async fn download_image(&self, image: &UserImage) -> Result<Vec<u8>, StoreError> {
        let response = self
            .request(self.client.get(self.object_url(&image.bucket, &image.storage_path)))?
            .send()
            .await?;
        let bytes = Self::check(response, "storage object").await?.bytes().await?;
        debug!("Downloaded {} bytes from {}", bytes.len(), image.storage_path);
        Ok(bytes.to_vec())
    }
}
