//! Service configuration, loaded from the process environment (and `.env`).

use serde::Deserialize;
use std::time::Duration;

/// Which backend holds profiles, skin profiles and images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Managed Postgres (PostgREST) plus object storage.
    Supabase,
    /// Local SQLite file, images kept inline.
    Sqlite,
}

/// Main configuration struct, loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_api_host")]
    pub api_host: String,

    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Comma separated list of origins allowed by CORS.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Timeout applied to every outbound request.
    #[serde(default = "default_http_timeout", with = "humantime_serde")]
    pub http_timeout: Duration,

    /// Upload size cap in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,

    #[serde(default = "default_store_backend")]
    pub store_backend: StoreBackend,

    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,

    // ============================================
    // Managed auth / database provider
    // ============================================
    pub supabase_url: String,

    pub supabase_anon_key: String,

    pub supabase_service_key: String,

    /// When present, bearer tokens are verified locally instead of round-tripping to the provider.
    #[serde(default)]
    pub supabase_jwt_secret: Option<String>,

    #[serde(default = "default_image_bucket")]
    pub image_bucket: String,

    // ============================================
    // Vision model
    // ============================================
    #[serde(default)]
    pub openai_api_key: String,

    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    #[serde(default = "default_true")]
    pub openai_enabled: bool,

    // ============================================
    // Custom search
    // ============================================
    #[serde(default)]
    pub google_api_key: String,

    #[serde(default)]
    pub google_search_engine_id: String,

    #[serde(default = "default_true")]
    pub google_search_enabled: bool,

    #[serde(default = "default_search_max_results")]
    pub google_search_max_results: u32,

    #[serde(default = "default_safe_search")]
    pub google_search_safe_search: String,

    #[serde(default = "default_search_country")]
    pub google_search_country: String,

    #[serde(default = "default_search_language")]
    pub google_search_language: String,

    #[serde(default = "default_google_base_url")]
    pub google_search_base_url: String,
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8000
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:3000".to_string(),
    ]
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_file_size() -> usize {
    10 * 1024 * 1024
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::Supabase
}

fn default_sqlite_path() -> String {
    "dermalens.db".to_string()
}

fn default_image_bucket() -> String {
    "user-images".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_true() -> bool {
    true
}

fn default_search_max_results() -> u32 {
    10
}

fn default_safe_search() -> String {
    "active".to_string()
}

fn default_search_country() -> String {
    "us".to_string()
}

fn default_search_language() -> String {
    "en".to_string()
}

fn default_google_base_url() -> String {
    "https://www.googleapis.com".to_string()
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env::<Config>()
    }

    /// Build a config from an explicit list of key/value pairs (same keys as the environment).
    pub fn from_pairs<I>(pairs: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter::<_, Config>(pairs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    /// The vision model is usable only when switched on and a key is present.
    pub fn vision_enabled(&self) -> bool {
        self.openai_enabled && !self.openai_api_key.trim().is_empty()
    }

    pub fn search_enabled(&self) -> bool {
        self.google_search_enabled
            && !self.google_api_key.trim().is_empty()
            && !self.google_search_engine_id.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pairs(extra: &[(&str, &str)]) -> Vec<(String, String)> {
        let mut base = vec![
            ("SUPABASE_URL", "https://project.supabase.co"),
            ("SUPABASE_ANON_KEY", "anon"),
            ("SUPABASE_SERVICE_KEY", "service"),
        ];
        base.extend_from_slice(extra);
        base.into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_pairs(pairs(&[])).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8000");
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.store_backend, StoreBackend::Supabase);
        assert_eq!(config.image_bucket, "user-images");
        assert_eq!(config.openai_model, "gpt-4o");
        assert_eq!(config.google_search_max_results, 10);
        assert_eq!(config.allowed_origins.len(), 2);
    }

    #[test]
    fn test_missing_required_key_fails() {
        let result = Config::from_pairs(vec![("SUPABASE_URL".to_string(), "x".to_string())]);
        assert!(result.is_err());
    }

    #[test]
    fn test_overrides_and_lists() {
        let config = Config::from_pairs(pairs(&[
            ("API_PORT", "9000"),
            ("HTTP_TIMEOUT", "5s"),
            ("STORE_BACKEND", "sqlite"),
            ("ALLOWED_ORIGINS", "https://a.example,https://b.example,https://c.example"),
        ]))
        .unwrap();

        assert_eq!(config.api_port, 9000);
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        assert_eq!(config.store_backend, StoreBackend::Sqlite);
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example", "https://b.example", "https://c.example"]
        );
    }

    #[test]
    fn test_collaborators_disabled_without_credentials() {
        let config = Config::from_pairs(pairs(&[])).unwrap();
        assert!(!config.vision_enabled());
        assert!(!config.search_enabled());

        let config = Config::from_pairs(pairs(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("GOOGLE_API_KEY", "g-key"),
            ("GOOGLE_SEARCH_ENGINE_ID", "cx"),
        ]))
        .unwrap();
        assert!(config.vision_enabled());
        assert!(config.search_enabled());

        let config = Config::from_pairs(pairs(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_ENABLED", "false"),
        ]))
        .unwrap();
        assert!(!config.vision_enabled());
    }
}
