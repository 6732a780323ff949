//! Domain records shared by the stores, the analysis pipeline and the HTTP layer.
//!
//! Enumerated skin-profile fields are closed vocabularies: anything outside them
//! fails deserialization, which the HTTP layer reports as a bad request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user's basic profile row, keyed by the identity provider's user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(id: Uuid, email: impl Into<String>, username: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            email: email.into(),
            username,
            profile_picture: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, update: &ProfileUpdate) {
        if let Some(username) = &update.username {
            self.username = Some(username.clone());
        }
        if let Some(picture) = &update.profile_picture {
            self.profile_picture = Some(picture.clone());
        }
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkinType {
    Normal,
    Dry,
    Oily,
    Combination,
    Sensitive,
}

impl SkinType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkinType::Normal => "normal",
            SkinType::Dry => "dry",
            SkinType::Oily => "oily",
            SkinType::Combination => "combination",
            SkinType::Sensitive => "sensitive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkinTone {
    Fair,
    Light,
    Medium,
    Tan,
    Dark,
    Deep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcneSeverity {
    None,
    Mild,
    Moderate,
    Severe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoreSize {
    Small,
    Medium,
    Large,
}

/// Shared low/moderate/high scale (sensitivity, water intake).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Low,
    Moderate,
    High,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Low => "low",
            Level::Moderate => "moderate",
            Level::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DietType {
    Omnivore,
    Vegetarian,
    Vegan,
    Pescatarian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SleepHours {
    #[serde(rename = "<6")]
    UnderSix,
    #[serde(rename = "6-8")]
    SixToEight,
    #[serde(rename = "8-10")]
    EightToTen,
    #[serde(rename = ">10")]
    OverTen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SunExposure {
    Minimal,
    Moderate,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutineFrequency {
    Daily,
    AlternatingDays,
    Weekly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutineType {
    Minimal,
    Standard,
    Extensive,
}

/// The questionnaire part of a skin profile, as submitted by the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkinProfileData {
    #[serde(default)]
    pub skin_type: Option<SkinType>,
    #[serde(default)]
    pub skin_tone: Option<SkinTone>,
    #[serde(default)]
    pub acne_severity: Option<AcneSeverity>,
    #[serde(default)]
    pub pore_size: Option<PoreSize>,
    #[serde(default)]
    pub sensitivity_level: Option<Level>,
    #[serde(default)]
    pub primary_concerns: Vec<String>,
    #[serde(default)]
    pub pre_existing_conditions: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub diet_type: Option<DietType>,
    #[serde(default)]
    pub water_intake: Option<Level>,
    #[serde(default)]
    pub sleep_hours: Option<SleepHours>,
    #[serde(default)]
    pub sun_exposure: Option<SunExposure>,
    #[serde(default)]
    pub routine_frequency: Option<RoutineFrequency>,
    #[serde(default)]
    pub routine_type: Option<RoutineType>,
    #[serde(default)]
    pub skin_goals: Vec<String>,
}

/// A stored skin profile: questionnaire data plus ownership and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkinProfile {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub data: SkinProfileData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SkinProfile {
    pub fn new(user_id: Uuid, data: SkinProfileData) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            data,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_high_sensitivity(&self) -> bool {
        self.data.sensitivity_level == Some(Level::High)
    }

    /// Merge the fields present in `update`, leaving the rest untouched.
    pub fn apply(&mut self, update: &SkinProfileUpdate) {
        let data = &mut self.data;
        macro_rules! merge {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = &update.$field {
                    data.$field = Some(value.clone());
                })*
            };
        }
        macro_rules! merge_list {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = &update.$field {
                    data.$field = value.clone();
                })*
            };
        }

        merge!(
            skin_type,
            skin_tone,
            acne_severity,
            pore_size,
            sensitivity_level,
            diet_type,
            water_intake,
            sleep_hours,
            sun_exposure,
            routine_frequency,
            routine_type,
        );
        merge_list!(
            primary_concerns,
            pre_existing_conditions,
            allergies,
            skin_goals
        );
        self.updated_at = Utc::now();
    }
}

/// Partial update of a skin profile. Absent fields are not serialized, so the
/// same value doubles as a PATCH body for the managed database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkinProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skin_type: Option<SkinType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skin_tone: Option<SkinTone>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acne_severity: Option<AcneSeverity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pore_size: Option<PoreSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitivity_level: Option<Level>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_concerns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_existing_conditions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allergies: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diet_type: Option<DietType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_intake: Option<Level>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_hours: Option<SleepHours>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sun_exposure: Option<SunExposure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routine_frequency: Option<RoutineFrequency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routine_type: Option<RoutineType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skin_goals: Option<Vec<String>>,
}

/// Metadata row for an uploaded face image. The bytes live in object storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserImage {
    pub id: Uuid,
    pub user_id: Uuid,
    pub storage_path: String,
    pub bucket: String,
    #[serde(default)]
    pub content_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An image about to be stored.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub user_id: Uuid,
    pub bucket: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl NewImage {
    /// Object key under the bucket: `<user>/<timestamp>_<sanitized file name>`.
    pub fn storage_path(&self) -> String {
        let safe_name: String = self
            .file_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!(
            "{}/{}_{}",
            self.user_id,
            Utc::now().timestamp_millis(),
            safe_name
        )
    }
}
