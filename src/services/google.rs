use crate::api::error::AppError;
use serde::Deserialize;
use std::time::Duration;

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Identity asserted by a verified Google ID token.
#[derive(Debug, Clone)]
pub struct GoogleProfile {
    pub google_id: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
}

#[derive(Deserialize)]
struct TokenInfo {
    aud: String,
    sub: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

/// Verifies Google ID tokens against Google's tokeninfo endpoint. The
/// endpoint validates signature and expiry; the audience is checked here
/// against the configured client id.
pub struct GoogleVerifier {
    http: reqwest::Client,
    client_id: Option<String>,
}

impl GoogleVerifier {
    pub fn new(client_id: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id,
        }
    }

    pub async fn verify(&self, id_token: &str) -> Result<GoogleProfile, AppError> {
        let client_id = self.client_id.as_deref().ok_or_else(|| {
            AppError::BadRequest("Google sign-in is not configured".to_string())
        })?;

        let info: TokenInfo = self
            .http
            .get(TOKENINFO_URL)
            .query(&[("id_token", id_token)])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("tokeninfo request failed: {e}")))?
            .error_for_status()
            .map_err(|_| AppError::Unauthorized("Invalid Google token".to_string()))?
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("tokeninfo response malformed: {e}")))?;

        if info.aud != client_id {
            return Err(AppError::Unauthorized(
                "Google token issued for a different application".to_string(),
            ));
        }

        let email = info
            .email
            .ok_or_else(|| AppError::Unauthorized("Google token carries no email".to_string()))?;

        Ok(GoogleProfile {
            google_id: info.sub,
            name: info.name.unwrap_or_else(|| email.clone()),
            email,
            picture: info.picture,
        })
    }
}
