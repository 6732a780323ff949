//! Shared application state, built once from [`Config`] at startup.

use reqwest::Client;
use std::sync::Arc;
use tracing::{info, warn};

use crate::analysis::service::AnalysisService;
use crate::config::{Config, StoreBackend};
use crate::utils::auth::{SupabaseAuth, TokenVerifier};
use crate::utils::database::supabase::SupabaseStore;
use crate::utils::database::{ProfileStore, StoreError};
use crate::utils::google_search::{GoogleSearch, ProductSearch, SearchSettings};
use crate::utils::openai::{OpenAiVision, VisionModel};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ProfileStore>,
    pub auth: Arc<SupabaseAuth>,
    pub verifier: TokenVerifier,
    pub analysis: AnalysisService,
}

impl AppState {
    /// Wire up every collaborator the configuration asks for.
    pub fn from_config(config: Config, client: Client) -> Result<Self, StoreError> {
        let store = build_store(&config, &client)?;

        let vision: Option<Arc<dyn VisionModel>> = if config.vision_enabled() {
            Some(Arc::new(OpenAiVision::new(
                client.clone(),
                config.openai_base_url.clone(),
                config.openai_api_key.clone(),
                config.openai_model.clone(),
            )))
        } else {
            warn!("Vision model disabled: set OPENAI_API_KEY to enable analysis");
            None
        };

        let search: Option<Arc<dyn ProductSearch>> = if config.search_enabled() {
            Some(Arc::new(GoogleSearch::new(
                client.clone(),
                config.google_search_base_url.clone(),
                config.google_api_key.clone(),
                config.google_search_engine_id.clone(),
                SearchSettings {
                    safe: config.google_search_safe_search.clone(),
                    country: config.google_search_country.clone(),
                    language: config.google_search_language.clone(),
                },
            )))
        } else {
            warn!("Product search disabled, the curated catalog will be used");
            None
        };

        let auth = Arc::new(SupabaseAuth::new(
            client,
            config.supabase_url.clone(),
            config.supabase_anon_key.clone(),
        ));
        let verifier = TokenVerifier::new(auth.clone(), config.supabase_jwt_secret.as_deref());

        Ok(Self::new(config, store, auth, verifier, vision, search))
    }

    pub fn new(
        config: Config,
        store: Arc<dyn ProfileStore>,
        auth: Arc<SupabaseAuth>,
        verifier: TokenVerifier,
        vision: Option<Arc<dyn VisionModel>>,
        search: Option<Arc<dyn ProductSearch>>,
    ) -> Self {
        let analysis = AnalysisService::new(
            store.clone(),
            vision,
            search,
            config.google_search_max_results,
        );
        Self {
            config,
            store,
            auth,
            verifier,
            analysis,
        }
    }
}

fn build_store(config: &Config, client: &Client) -> Result<Arc<dyn ProfileStore>, StoreError> {
    match config.store_backend {
        StoreBackend::Supabase => {
            info!("Using managed database at {}", config.supabase_url);
            Ok(Arc::new(SupabaseStore::new(
                client.clone(),
                config.supabase_url.clone(),
                config.supabase_service_key.clone(),
            )))
        }
        #[cfg(feature = "sqlite_store")]
        StoreBackend::Sqlite => Ok(Arc::new(
            crate::utils::database::sqlite::SqliteStore::open(&config.sqlite_path)?,
        )),
        #[cfg(not(feature = "sqlite_store"))]
        StoreBackend::Sqlite => Err(StoreError::Unavailable("sqlite")),
    }
}
