use std::env;

/// Runtime configuration for the Reclaim backend.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// JWT signing secret (required in production).
    pub jwt_secret: String,

    /// Google OAuth client id; Google sign-in is disabled when absent.
    pub google_client_id: Option<String>,

    /// Gemini API key; AI search degrades to plain text search when absent.
    pub gemini_api_key: Option<String>,

    /// Gemini model name (default: "gemini-flash-latest")
    pub gemini_model: String,

    /// Radius for the on-demand "similar items" view in km (default: 10)
    pub match_radius_km: f64,

    /// Radius for creation-triggered match notifications in km (default: 5)
    pub notify_radius_km: f64,

    /// Maximum number of matches returned per lookup (default: 5)
    pub match_limit: u64,

    /// Maximum accepted image upload size in bytes (default: 5 MB)
    pub max_upload_size: usize,

    /// Allowed CORS origins (comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "secret".to_string(),
            google_client_id: None,
            gemini_api_key: None,
            gemini_model: "gemini-flash-latest".to_string(),
            match_radius_km: 10.0,
            notify_radius_km: 5.0,
            match_limit: 5,
            max_upload_size: 5 * 1024 * 1024, // 5 MB
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| "secret".to_string()), // Fallback for dev convenience, strictly enforced in production method

            google_client_id: env::var("GOOGLE_CLIENT_ID").ok(),

            gemini_api_key: env::var("GEMINI_API_KEY").ok(),

            gemini_model: env::var("GEMINI_MODEL").unwrap_or(default.gemini_model),

            match_radius_km: env::var("MATCH_RADIUS_KM")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.match_radius_km),

            notify_radius_km: env::var("NOTIFY_RADIUS_KM")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.notify_radius_km),

            match_limit: env::var("MATCH_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.match_limit),

            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_upload_size),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Create config for production (strict secrets)
    pub fn production() -> Self {
        Self {
            jwt_secret: env::var("JWT_SECRET").expect("CRITICAL: JWT_SECRET must be set"),
            ..Self::from_env()
        }
    }
}
