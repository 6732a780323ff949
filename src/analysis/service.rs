//! End-to-end analysis: stored user data and image in, diagnosis, products
//! and routine out.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::analysis::diagnosis::{self, Severity, SkinAnalysis};
use crate::analysis::products::{self, ProductResults};
use crate::analysis::routine::{self, Routine};
use crate::models::{SkinProfile, UserImage};
use crate::utils::database::ProfileStore;
use crate::utils::google_search::ProductSearch;
use crate::utils::openai::{self, VisionModel};

/// Pipeline stage that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStep {
    FetchProfile,
    FetchImages,
    SelectImage,
    DownloadImage,
    AiAnalysis,
}

impl AnalysisStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStep::FetchProfile => "fetch_profile",
            AnalysisStep::FetchImages => "fetch_images",
            AnalysisStep::SelectImage => "select_image",
            AnalysisStep::DownloadImage => "download_image",
            AnalysisStep::AiAnalysis => "ai_analysis",
        }
    }
}

impl fmt::Display for AnalysisStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct AnalysisError {
    pub step: AnalysisStep,
    pub message: String,
}

impl AnalysisError {
    fn new(step: AnalysisStep, message: impl Into<String>) -> Self {
        let message = message.into();
        error!("Analysis failed at {}: {}", step, message);
        Self { step, message }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub username: Option<String>,
    pub email: String,
}

/// The diagnosis as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AiAnalysis {
    pub conditions_detected: Vec<String>,
    pub skin_type: String,
    pub recommended_ingredients: Vec<String>,
    pub recommended_products: Vec<String>,
    pub severity_assessment: BTreeMap<String, Severity>,
    pub precautions: Vec<String>,
    pub improvement_timeline: String,
    pub full_diagnosis: String,
    pub model_used: String,
}

impl AiAnalysis {
    fn new(analysis: SkinAnalysis, model_used: String) -> Self {
        Self {
            conditions_detected: analysis.conditions_detected,
            skin_type: analysis.skin_type,
            recommended_ingredients: analysis.recommended_ingredients,
            recommended_products: analysis.recommended_product_types,
            severity_assessment: analysis.severity_assessment,
            precautions: analysis.precautions,
            improvement_timeline: analysis.improvement_timeline,
            full_diagnosis: analysis.full_analysis,
            model_used,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzedImage {
    pub id: Uuid,
    pub path: String,
    pub analyzed_at: DateTime<Utc>,
}

/// Diagnosis, products and routine for one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageAnalysis {
    pub ai_analysis: AiAnalysis,
    pub product_recommendations: ProductResults,
    pub personalized_routine: Routine,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserAnalysis {
    pub user_profile: UserSummary,
    pub skin_profile: Option<SkinProfile>,
    #[serde(flatten)]
    pub result: ImageAnalysis,
    pub image_analyzed: AnalyzedImage,
}

pub struct AnalysisService {
    store: Arc<dyn ProfileStore>,
    vision: Option<Arc<dyn VisionModel>>,
    search: Option<Arc<dyn ProductSearch>>,
    max_results: u32,
}

impl AnalysisService {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        vision: Option<Arc<dyn VisionModel>>,
        search: Option<Arc<dyn ProductSearch>>,
        max_results: u32,
    ) -> Self {
        Self {
            store,
            vision,
            search,
            max_results,
        }
    }

    pub fn search(&self) -> Option<&dyn ProductSearch> {
        self.search.as_deref()
    }

    pub fn max_results(&self) -> u32 {
        self.max_results
    }

    /// Analyse one of the user's stored images: `image_id`, or the newest when absent.
    pub async fn analyze_user(
        &self,
        user_id: Uuid,
        image_id: Option<Uuid>,
    ) -> Result<UserAnalysis, AnalysisError> {
        info!("Starting analysis for user {}", user_id);

        let profile = match self.store.get_profile(user_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                return Err(AnalysisError::new(
                    AnalysisStep::FetchProfile,
                    "User profile not found",
                ));
            }
            Err(e) => return Err(AnalysisError::new(AnalysisStep::FetchProfile, e.to_string())),
        };

        // The questionnaire only refines the prompt and the searches.
        let skin_profile = match self.store.get_skin_profile(user_id).await {
            Ok(skin_profile) => skin_profile,
            Err(e) => {
                warn!("Continuing without skin profile for {}: {}", user_id, e);
                None
            }
        };

        let images = self
            .store
            .list_images(user_id)
            .await
            .map_err(|e| AnalysisError::new(AnalysisStep::FetchImages, e.to_string()))?;
        if images.is_empty() {
            return Err(AnalysisError::new(
                AnalysisStep::FetchImages,
                "No images found for this user. Please upload a face image first.",
            ));
        }

        let image = select_image(images, image_id)?;
        info!("Selected image {}", image.storage_path);

        let bytes = self.store.download_image(&image).await.map_err(|e| {
            warn!("Download of {} failed: {}", image.storage_path, e);
            AnalysisError::new(
                AnalysisStep::DownloadImage,
                "Failed to download image from storage",
            )
        })?;

        let result = self.analyze_image(&bytes, skin_profile.as_ref()).await?;

        Ok(UserAnalysis {
            user_profile: UserSummary {
                username: profile.username,
                email: profile.email,
            },
            skin_profile,
            result,
            image_analyzed: AnalyzedImage {
                id: image.id,
                path: image.storage_path,
                analyzed_at: image.created_at,
            },
        })
    }

    /// Diagnose `image`, then find products and build a routine. Nothing is persisted.
    pub async fn analyze_image(
        &self,
        image: &[u8],
        skin_profile: Option<&SkinProfile>,
    ) -> Result<ImageAnalysis, AnalysisError> {
        let Some(vision) = &self.vision else {
            return Err(AnalysisError::new(
                AnalysisStep::AiAnalysis,
                "AI analysis is not configured",
            ));
        };

        let prompt = openai::build_analysis_prompt(skin_profile);
        let text = vision
            .describe(image, &prompt)
            .await
            .map_err(|e| AnalysisError::new(AnalysisStep::AiAnalysis, format!("AI analysis failed: {}", e)))?;

        let analysis = diagnosis::parse_analysis(&text);
        info!(
            "AI detected {} skin conditions",
            analysis.conditions_detected.len()
        );

        let recommendations = diagnosis::recommend(&analysis);
        let product_recommendations = products::products_for_recommendations(
            self.search(),
            &recommendations,
            skin_profile,
            self.max_results,
        )
        .await;

        let personalized_routine = routine::generate_routine(
            &product_recommendations.products,
            &analysis.recommended_ingredients,
            Some(&analysis.improvement_timeline),
        );

        Ok(ImageAnalysis {
            ai_analysis: AiAnalysis::new(analysis, vision.model_name()),
            product_recommendations,
            personalized_routine,
        })
    }
}

fn select_image(images: Vec<UserImage>, image_id: Option<Uuid>) -> Result<UserImage, AnalysisError> {
    let mut images = images.into_iter();
    match image_id {
        Some(id) => images.find(|image| image.id == id).ok_or_else(|| {
            AnalysisError::new(
                AnalysisStep::SelectImage,
                format!("Image with ID {} not found", id),
            )
        }),
        // Stores list newest first.
        None => images.next().ok_or_else(|| {
            AnalysisError::new(AnalysisStep::FetchImages, "No images found for this user")
        }),
    }
}
