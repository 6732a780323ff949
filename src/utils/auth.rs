//! Client for the managed identity service (GoTrue) and bearer-token verification.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum SupabaseError {
    #[error("Auth API communication failure: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Unable to parse auth response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid auth header: {0}")]
    Header(#[from] header::InvalidHeaderValue),

    /// The provider answered with an error status.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

/// A user as the identity service reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
    #[serde(default)]
    pub email_confirmed_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl AuthUser {
    pub fn username(&self) -> Option<String> {
        self.user_metadata
            .get("username")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: String,
    pub user: AuthUser,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Result of a sign-up. There is no session while the email is awaiting confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct SignUp {
    pub user: AuthUser,
    pub session: Option<Session>,
}

pub struct SupabaseAuth {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseAuth {
    pub fn new(client: Client, base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    /// `apikey` always; the user's token when acting on their behalf.
    fn headers(&self, access_token: Option<&str>) -> Result<HeaderMap, SupabaseError> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(&self.anon_key)?);
        if let Some(token) = access_token {
            headers.insert(
                header::AUTHORIZATION,
                HeaderValue::from_str(&["Bearer ", token].concat())?,
            );
        }
        Ok(headers)
    }

    /// Pass through 2xx responses; otherwise pull the provider's message out of the body.
    async fn check(response: Response) -> Result<Response, SupabaseError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message = ["msg", "error_description", "message", "error"]
            .iter()
            .find_map(|key| body.get(*key).and_then(Value::as_str))
            .unwrap_or("Authentication request failed")
            .to_string();

        warn!("Auth request rejected with {}: {}", status, message);
        Err(SupabaseError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, SupabaseError> {
        let text = Self::check(response).await?.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: Option<&str>,
    ) -> Result<SignUp, SupabaseError> {
        let mut body = json!({ "email": email, "password": password });
        if let Some(username) = username {
            body["data"] = json!({ "username": username });
        }

        let response = self
            .client
            .post(self.endpoint("signup"))
            .headers(self.headers(None)?)
            .json(&body)
            .send()
            .await?;
        let value: Value = Self::parse(response).await?;

        // With auto-confirm on we get a session, otherwise just the user.
        if value.get("access_token").is_some() {
            let session: Session = serde_json::from_value(value)?;
            info!("Signed up {} with an active session", session.user.id);
            Ok(SignUp {
                user: session.user.clone(),
                session: Some(session),
            })
        } else {
            let user: AuthUser = serde_json::from_value(value)?;
            info!("Signed up {}, awaiting email confirmation", user.id);
            Ok(SignUp {
                user,
                session: None,
            })
        }
    }

    /// Password grant.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, SupabaseError> {
        let response = self
            .client
            .post(self.endpoint("token"))
            .query(&[("grant_type", "password")])
            .headers(self.headers(None)?)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let session: Session = Self::parse(response).await?;
        debug!("Signed in {}", session.user.id);
        Ok(session)
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<(), SupabaseError> {
        let response = self
            .client
            .post(self.endpoint("logout"))
            .headers(self.headers(Some(access_token))?)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    pub async fn get_user(&self, access_token: &str) -> Result<AuthUser, SupabaseError> {
        let response = self
            .client
            .get(self.endpoint("user"))
            .headers(self.headers(Some(access_token))?)
            .send()
            .await?;
        Self::parse(response).await
    }

    pub async fn reset_password(&self, email: &str) -> Result<(), SupabaseError> {
        let response = self
            .client
            .post(self.endpoint("recover"))
            .headers(self.headers(None)?)
            .json(&json!({ "email": email }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
}

/// Who a verified bearer token belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedUser {
    pub id: Uuid,
    pub email: Option<String>,
}

/// Checks bearer tokens, locally against the project's JWT secret when it is
/// configured and by asking the identity service otherwise.
pub struct TokenVerifier {
    local: Option<(DecodingKey, Validation)>,
    auth: Arc<SupabaseAuth>,
}

impl TokenVerifier {
    pub fn new(auth: Arc<SupabaseAuth>, jwt_secret: Option<&str>) -> Self {
        let local = jwt_secret.filter(|s| !s.is_empty()).map(|secret| {
            let mut validation = Validation::new(Algorithm::HS256);
            // Provider tokens carry `aud: authenticated`, which we don't pin.
            validation.validate_aud = false;
            (DecodingKey::from_secret(secret.as_bytes()), validation)
        });
        Self { local, auth }
    }

    pub async fn verify(&self, token: &str) -> Result<VerifiedUser, SupabaseError> {
        match &self.local {
            Some((key, validation)) => {
                let data = decode::<Claims>(token, key, validation)
                    .map_err(|e| SupabaseError::InvalidToken(e.to_string()))?;
                let id = Uuid::parse_str(&data.claims.sub)
                    .map_err(|e| SupabaseError::InvalidToken(e.to_string()))?;
                Ok(VerifiedUser {
                    id,
                    email: data.claims.email,
                })
            }
            None => {
                let user = self.auth.get_user(token).await?;
                Ok(VerifiedUser {
                    id: user.id,
                    email: user.email,
                })
            }
        }
    }
}
