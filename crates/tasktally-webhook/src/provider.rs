// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authorization-code exchange with the external task tracker.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use tasktally_config::model::OAuthConfig;
use tasktally_core::{LinkedAccount, TasktallyError};

/// Turns an authorization code into the account it was granted for.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<LinkedAccount, TasktallyError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SyncResponse {
    user: SyncUser,
}

#[derive(Debug, Deserialize)]
struct SyncUser {
    id: serde_json::Value,
    #[serde(default)]
    full_name: Option<String>,
}

impl SyncUser {
    /// The tracker has sent ids both as strings and as numbers.
    fn id_string(&self) -> Option<String> {
        match &self.id {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

fn provider_err(message: String, source: Option<reqwest::Error>) -> TasktallyError {
    TasktallyError::Provider {
        message,
        source: source.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
    }
}

/// [`AuthProvider`] speaking the tracker's OAuth token and sync endpoints.
#[derive(Debug, Clone)]
pub struct ReqwestAuthProvider {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    token_url: String,
    sync_url: String,
}

impl ReqwestAuthProvider {
    pub fn new(config: &OAuthConfig) -> Result<Self, TasktallyError> {
        let (Some(client_id), Some(client_secret)) =
            (config.client_id.clone(), config.client_secret.clone())
        else {
            return Err(TasktallyError::Config(
                "oauth.client_id and oauth.client_secret are required for authorization".into(),
            ));
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| provider_err(format!("failed to build HTTP client: {e}"), Some(e)))?;

        Ok(Self {
            client,
            client_id,
            client_secret,
            token_url: config.token_url.clone(),
            sync_url: config.sync_url.clone(),
        })
    }

    async fn fetch_token(&self, code: &str) -> Result<String, TasktallyError> {
        let url = reqwest::Url::parse_with_params(
            &self.token_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
            ],
        )
        .map_err(|e| TasktallyError::Config(format!("invalid oauth.token_url: {e}")))?;

        let response = self
            .client
            .post(url)
            .send()
            .await
            .map_err(|e| provider_err(format!("token request failed: {e}"), Some(e)))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(provider_err(
                format!("token endpoint returned {status}: {body}"),
                None,
            ));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| provider_err(format!("unexpected token response: {e}"), Some(e)))?;
        Ok(token.access_token)
    }

    async fn fetch_user(&self, access_token: &str) -> Result<LinkedAccount, TasktallyError> {
        let url = reqwest::Url::parse_with_params(
            &self.sync_url,
            &[("sync_token", "*"), ("resource_types", r#"["user"]"#)],
        )
        .map_err(|e| TasktallyError::Config(format!("invalid oauth.sync_url: {e}")))?;

        let response = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| provider_err(format!("sync request failed: {e}"), Some(e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(provider_err(
                format!("sync endpoint returned {status}"),
                None,
            ));
        }
        let sync: SyncResponse = response
            .json()
            .await
            .map_err(|e| provider_err(format!("unexpected sync response: {e}"), Some(e)))?;
        let external_user_id = sync
            .user
            .id_string()
            .ok_or_else(|| provider_err("sync response carries no user id".into(), None))?;
        Ok(LinkedAccount {
            external_user_id,
            display_name: sync.user.full_name,
        })
    }
}

#[async_trait]
impl AuthProvider for ReqwestAuthProvider {
    async fn exchange_code(&self, code: &str) -> Result<LinkedAccount, TasktallyError> {
        let token = self.fetch_token(code).await?;
        let account = self.fetch_user(&token).await?;
        debug!(user_id = %account.external_user_id, "authorization code exchanged");
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> ReqwestAuthProvider {
        let config = OAuthConfig {
            client_id: Some("cid".into()),
            client_secret: Some("secret".into()),
            token_url: format!("{}/oauth/access_token", server.uri()),
            sync_url: format!("{}/sync", server.uri()),
            ..OAuthConfig::default()
        };
        ReqwestAuthProvider::new(&config).unwrap()
    }

    #[test]
    fn missing_credentials_is_a_config_error() {
        let err = ReqwestAuthProvider::new(&OAuthConfig::default()).unwrap_err();
        assert!(matches!(err, TasktallyError::Config(_)));
    }

    #[tokio::test]
    async fn exchanges_code_for_account() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/access_token"))
            .and(query_param("client_id", "cid"))
            .and(query_param("client_secret", "secret"))
            .and(query_param("code", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-1",
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/sync"))
            .and(header("authorization", "Bearer tok-1"))
            .and(query_param("sync_token", "*"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sync_token": "s",
                "user": {"id": "2671355", "full_name": "Ada Lovelace"}
            })))
            .mount(&server)
            .await;

        let account = provider(&server).exchange_code("abc").await.unwrap();
        assert_eq!(account.external_user_id, "2671355");
        assert_eq!(account.display_name.as_deref(), Some("Ada Lovelace"));
    }

    #[tokio::test]
    async fn numeric_user_id_is_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/access_token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "t"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/sync"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"user": {"id": 42}})),
            )
            .mount(&server)
            .await;

        let account = provider(&server).exchange_code("c").await.unwrap();
        assert_eq!(account.external_user_id, "42");
        assert!(account.display_name.is_none());
    }

    #[tokio::test]
    async fn rejected_code_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/access_token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad_verification_code"))
            .mount(&server)
            .await;

        let err = provider(&server).exchange_code("nope").await.unwrap_err();
        match err {
            TasktallyError::Provider { message, .. } => {
                assert!(message.contains("400"), "{message}");
                assert!(message.contains("bad_verification_code"));
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn sync_failure_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/access_token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "t"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/sync"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = provider(&server).exchange_code("c").await.unwrap_err();
        assert!(matches!(err, TasktallyError::Provider { .. }));
    }
}
