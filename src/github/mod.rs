pub mod auth;
pub mod client;

pub use auth::{create_app_jwt, AppCredentials, TokenCache};
pub use client::{GitHubClient, SourceApi, DEFAULT_API_BASE_URL};
