use crate::errors::{AppError, AppResult};
use crate::github::auth::{create_app_jwt, AppCredentials, TokenCache};
use crate::models::{
    AccessTokenResponse, InstallationResponse, MetricRecord, ReferrerEntry, StarEvent,
    StargazerEntry, TrafficClones, TrafficViews,
};
use crate::redaction::Redactor;
use chrono::Utc;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
// Adds `starred_at` to each stargazer.
const STAR_MEDIA_TYPE: &str = "application/vnd.github.star+json";
const STARGAZERS_PER_PAGE: u32 = 100;
const ERROR_BODY_LIMIT: usize = 300;

/// Upstream source of repository analytics.
pub trait SourceApi {
    /// Every stargazer, oldest first.
    fn stargazers(&self, repo: &str) -> AppResult<Vec<StarEvent>>;
    /// Daily views over the rolling window.
    fn views(&self, repo: &str) -> AppResult<Vec<MetricRecord>>;
    /// Daily clones over the rolling window.
    fn clones(&self, repo: &str) -> AppResult<Vec<MetricRecord>>;
    /// Top referrers for the current period.
    fn referrers(&self, repo: &str) -> AppResult<Vec<ReferrerEntry>>;
}

/// Blocking GitHub REST client authenticated as a GitHub App installation.
pub struct GitHubClient {
    http: Client,
    base_url: String,
    credentials: AppCredentials,
    tokens: TokenCache,
    redactor: Redactor,
}

impl GitHubClient {
    pub fn new(base_url: &str, credentials: AppCredentials, tokens: TokenCache) -> AppResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("traffic-ledger/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            tokens,
            redactor: Redactor::new(true),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn installation_token(&self, repo: &str) -> AppResult<String> {
        self.tokens.get_or_issue(repo, || self.issue_installation_token(repo))
    }

    fn issue_installation_token(&self, repo: &str) -> AppResult<String> {
        let jwt = create_app_jwt(&self.credentials, Utc::now())?;

        let installation: InstallationResponse = self
            .execute(
                self.http.get(self.url(&format!("/repos/{}/installation", repo))),
                "installation lookup",
                &jwt,
                JSON_MEDIA_TYPE,
            )
            .map_err(|error| AppError::Auth(error.to_string()))?;
        tracing::info!(repo, installation_id = installation.id, "resolved app installation");

        let token: AccessTokenResponse = self
            .execute(
                self.http.post(self.url(&format!(
                    "/app/installations/{}/access_tokens",
                    installation.id
                ))),
                "access token exchange",
                &jwt,
                JSON_MEDIA_TYPE,
            )
            .map_err(|error| AppError::Auth(error.to_string()))?;
        if let Some(expires_at) = token.expires_at {
            tracing::debug!(repo, expires_at = %expires_at, "installation token issued");
        }
        Ok(token.token)
    }

    fn get_json<T: DeserializeOwned>(&self, repo: &str, path: &str, accept: &str) -> AppResult<T> {
        let token = self.installation_token(repo)?;
        tracing::info!(path, "GET");
        self.execute(self.http.get(self.url(path)), path, &token, accept)
    }

    fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        label: &str,
        bearer: &str,
        accept: &str,
    ) -> AppResult<T> {
        let response = request
            .header(ACCEPT, accept)
            .header(AUTHORIZATION, format!("Bearer {}", bearer))
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let redacted = self.redactor.redact(&body).content;
            let excerpt = redacted.chars().take(ERROR_BODY_LIMIT).collect::<String>();
            return Err(AppError::SourceApi(format!("{} returned {}: {}", label, status, excerpt)));
        }

        Ok(response.json::<T>()?)
    }
}

impl SourceApi for GitHubClient {
    fn stargazers(&self, repo: &str) -> AppResult<Vec<StarEvent>> {
        let mut events = Vec::new();
        let mut page = 1u32;
        loop {
            let path = format!(
                "/repos/{}/stargazers?per_page={}&page={}",
                repo, STARGAZERS_PER_PAGE, page
            );
            let entries: Vec<StargazerEntry> = self.get_json(repo, &path, STAR_MEDIA_TYPE)?;
            if entries.is_empty() {
                break;
            }
            events.extend(entries.into_iter().map(StarEvent::from));
            page += 1;
        }
        tracing::info!(repo, pages = page - 1, stargazers = events.len(), "fetched stargazers");
        Ok(events)
    }

    fn views(&self, repo: &str) -> AppResult<Vec<MetricRecord>> {
        let payload: TrafficViews =
            self.get_json(repo, &format!("/repos/{}/traffic/views", repo), JSON_MEDIA_TYPE)?;
        Ok(payload.views.into_iter().map(MetricRecord::from).collect())
    }

    fn clones(&self, repo: &str) -> AppResult<Vec<MetricRecord>> {
        let payload: TrafficClones =
            self.get_json(repo, &format!("/repos/{}/traffic/clones", repo), JSON_MEDIA_TYPE)?;
        Ok(payload.clones.into_iter().map(MetricRecord::from).collect())
    }

    fn referrers(&self, repo: &str) -> AppResult<Vec<ReferrerEntry>> {
        self.get_json(repo, &format!("/repos/{}/traffic/popular/referrers", repo), JSON_MEDIA_TYPE)
    }
}
