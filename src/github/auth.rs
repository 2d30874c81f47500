use crate::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// GitHub App identity used to mint installation tokens.
#[derive(Clone)]
pub struct AppCredentials {
    pub app_id: String,
    pub private_key_pem: String,
}

impl fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppCredentials")
            .field("app_id", &self.app_id)
            .field("private_key_pem", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AppJwtClaims {
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// Signs the short-lived RS256 assertion GitHub expects from an app.
///
/// `iat` is backdated 60 seconds for clock drift; the assertion expires after
/// ten minutes, the maximum GitHub accepts.
pub fn create_app_jwt(credentials: &AppCredentials, now: DateTime<Utc>) -> AppResult<String> {
    if credentials.app_id.trim().is_empty() {
        return Err(AppError::Auth("GitHub App id is empty".to_string()));
    }
    let key = EncodingKey::from_rsa_pem(credentials.private_key_pem.as_bytes())
        .map_err(|error| AppError::Auth(format!("Invalid GitHub App private key: {}", error)))?;
    let issued = now.timestamp();
    let claims = AppJwtClaims {
        iat: issued - 60,
        exp: issued + 600,
        iss: credentials.app_id.clone(),
    };
    Ok(jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)?)
}

/// Installation tokens for the duration of one run, keyed by repository.
#[derive(Debug, Default)]
pub struct TokenCache {
    tokens: Mutex<HashMap<String, String>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached token for `repo`, or the result of `issue` which is then cached.
    /// Failures are not cached.
    pub fn get_or_issue<F>(&self, repo: &str, issue: F) -> AppResult<String>
    where
        F: FnOnce() -> AppResult<String>,
    {
        if let Some(token) = self.lock()?.get(repo) {
            tracing::debug!(repo, "installation token cache hit");
            return Ok(token.clone());
        }

        let token = issue()?;
        self.lock()?.insert(repo.to_string(), token.clone());
        tracing::info!(repo, "cached installation token");
        Ok(token)
    }

    pub fn len(&self) -> usize {
        self.lock().map(|tokens| tokens.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.tokens
            .lock()
            .map_err(|_| AppError::Internal("token cache mutex poisoned".to_string()))
    }
}
