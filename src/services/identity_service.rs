use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::config_service::Config;
use super::http::{build_client, check_status, decode_json};
use super::local_store::{LocalStore, ACCOUNT_KEY, FORM_DATA_KEY};
use crate::error::{AppError, AppResult};
use crate::models::{AccountProfile, DirectoryMembership, MemberOfResponse};

/// Seconds before expiry at which a token is already treated as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: i64,
}

/// Tokens handed over by the identity provider after an interactive sign-in.
#[derive(Debug, Clone)]
pub struct SignInGrant {
    pub unique_id: String,
    pub name: String,
    pub username: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

/// Identity provider client: silent token refresh and directory lookups.
pub struct IdentityClient {
    client: Client,
    authority: String,
    client_id: Option<String>,
    scopes: String,
    graph_url: String,
}

impl IdentityClient {
    pub fn new(config: &Config) -> AppResult<Self> {
        Ok(Self {
            client: build_client(Duration::from_secs(config.request_timeout_secs))?,
            authority: config.authority.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            scopes: config.scopes.clone(),
            graph_url: config.graph_url.trim_end_matches('/').to_string(),
        })
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> AppResult<TokenResponse> {
        let client_id = self
            .client_id
            .as_deref()
            .ok_or_else(|| AppError::Config("client id is not configured".to_string()))?;

        let response = self
            .client
            .post(format!("{}/oauth2/v2.0/token", self.authority))
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", client_id),
                ("refresh_token", refresh_token),
                ("scope", self.scopes.as_str()),
            ])
            .send()
            .await?;

        let response = check_status(response, "token refresh").await?;
        decode_json(response, "token refresh").await
    }

    /// Directory groups the user belongs to.
    pub async fn fetch_member_of(
        &self,
        unique_id: &str,
        access_token: &str,
    ) -> AppResult<Vec<DirectoryMembership>> {
        let response = self
            .client
            .get(format!(
                "{}/users/{}/memberOf",
                self.graph_url,
                urlencoding::encode(unique_id)
            ))
            .bearer_auth(access_token)
            .send()
            .await?;
        let response = check_status(response, "directory membership").await?;
        let listing: MemberOfResponse = decode_json(response, "directory membership").await?;
        Ok(listing.value)
    }

    /// A valid access token, refreshing the stored one when it is expired.
    pub async fn get_valid_access_token(&self, store: &LocalStore) -> AppResult<String> {
        let mut account = store.account();

        let access_token = account
            .access_token
            .clone()
            .ok_or_else(|| AppError::NotAuthenticated("no stored access token".to_string()))?;

        let now = chrono::Utc::now().timestamp();
        let is_expired = account
            .expires_at
            .map(|exp| now >= exp - EXPIRY_SKEW_SECS)
            .unwrap_or(false);

        if !is_expired {
            return Ok(access_token);
        }

        let Some(refresh_token) = account.refresh_token.clone() else {
            return Err(AppError::NotAuthenticated(
                "token expired and no refresh token available".to_string(),
            ));
        };

        debug!("access token expired, refreshing");
        let token = self
            .refresh_access_token(&refresh_token)
            .await
            .map_err(|e| {
                warn!(error = %e, "token refresh failed");
                AppError::NotAuthenticated(format!("token refresh failed: {}", e))
            })?;

        account.access_token = Some(token.access_token.clone());
        if token.refresh_token.is_some() {
            account.refresh_token = token.refresh_token;
        }
        account.expires_at = Some(now + token.expires_in);
        store.save_account(&account)?;

        Ok(token.access_token)
    }
}

/// Stores the account handed back by an interactive sign-in.
pub fn sign_in(store: &LocalStore, grant: SignInGrant) -> AppResult<AccountProfile> {
    let account = AccountProfile {
        unique_id: grant.unique_id,
        name: grant.name,
        username: grant.username,
        access_token: Some(grant.access_token),
        refresh_token: grant.refresh_token,
        expires_at: grant
            .expires_in
            .map(|secs| chrono::Utc::now().timestamp() + secs),
    };
    store.save_account(&account)?;
    info!(unique_id = %account.unique_id, "signed in");
    Ok(account)
}

/// Clears the form mirror and the account blob.
pub fn sign_out(store: &LocalStore) -> AppResult<()> {
    store.remove(FORM_DATA_KEY)?;
    store.remove(ACCOUNT_KEY)?;
    info!("signed out");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FormState;
    use httpmock::prelude::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn config(server: &MockServer) -> Config {
        Config {
            authority: server.url("/tenant"),
            graph_url: server.url("/graph"),
            client_id: Some("client".into()),
            request_timeout_secs: 5,
            ..Default::default()
        }
    }

    fn grant(expires_in: i64) -> SignInGrant {
        SignInGrant {
            unique_id: "oid-1".into(),
            name: "Ana".into(),
            username: None,
            access_token: "old".into(),
            refresh_token: Some("refresh-1".into()),
            expires_in: Some(expires_in),
        }
    }

    #[tokio::test]
    async fn fresh_token_is_returned_without_refresh() {
        let server = MockServer::start();
        let refresh = server.mock(|when, then| {
            when.method(POST).path("/tenant/oauth2/v2.0/token");
            then.status(200);
        });
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path()).unwrap();
        sign_in(&store, grant(3600)).unwrap();

        let identity = IdentityClient::new(&config(&server)).unwrap();
        assert_eq!(identity.get_valid_access_token(&store).await.unwrap(), "old");
        refresh.assert_calls(0);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_stored() {
        let server = MockServer::start();
        let refresh = server.mock(|when, then| {
            when.method(POST)
                .path("/tenant/oauth2/v2.0/token")
                .body_includes("grant_type=refresh_token")
                .body_includes("refresh_token=refresh-1");
            then.status(200).json_body(json!({
                "access_token": "new",
                "refresh_token": "refresh-2",
                "expires_in": 3600
            }));
        });
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path()).unwrap();
        sign_in(&store, grant(10)).unwrap();

        let identity = IdentityClient::new(&config(&server)).unwrap();
        assert_eq!(identity.get_valid_access_token(&store).await.unwrap(), "new");
        refresh.assert_calls(1);
        let account = store.account();
        assert_eq!(account.access_token.as_deref(), Some("new"));
        assert_eq!(account.refresh_token.as_deref(), Some("refresh-2"));
    }

    #[tokio::test]
    async fn failed_refresh_means_signed_out() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/tenant/oauth2/v2.0/token");
            then.status(400).body("invalid_grant");
        });
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path()).unwrap();
        sign_in(&store, grant(0)).unwrap();

        let identity = IdentityClient::new(&config(&server)).unwrap();
        let err = identity.get_valid_access_token(&store).await.unwrap_err();
        assert!(matches!(err, AppError::NotAuthenticated(_)));
    }

    #[tokio::test]
    async fn member_of_lists_groups() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/graph/users/oid-1/memberOf")
                .header("authorization", "Bearer tok");
            then.status(200).json_body(json!({
                "value": [{"displayName": "All Staff"}, {"displayName": "HR"}]
            }));
        });
        let identity = IdentityClient::new(&config(&server)).unwrap();
        let groups = identity.fetch_member_of("oid-1", "tok").await.unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].display_name.as_deref(), Some("HR"));
    }

    #[test]
    fn sign_out_clears_form_and_account() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path()).unwrap();
        sign_in(&store, grant(100)).unwrap();
        store
            .save_form_state(&FormState {
                user_id: 3,
                ..Default::default()
            })
            .unwrap();
        sign_out(&store).unwrap();
        assert!(!store.account().is_signed_in());
        assert_eq!(store.form_state(), FormState::default());
    }
}
