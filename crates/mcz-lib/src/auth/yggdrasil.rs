use super::Account;
use crate::error::AuthError;
use crate::game::installer::config::request_timeout;
use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticateRequest<'a> {
    agent: Agent,
    username: &'a str,
    password: &'a str,
    client_token: &'a str,
    request_user: bool,
}

#[derive(Debug, Serialize)]
struct Agent {
    name: &'static str,
    version: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequest<'a> {
    access_token: &'a str,
    client_token: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    access_token: &'a str,
    client_token: &'a str,
    selected_profile: Profile,
    request_user: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct Profile {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticateResponse {
    access_token: String,
    selected_profile: Option<Profile>,
    user: Option<User>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    #[serde(default)]
    error_message: String,
}

/// Client for a Yggdrasil-compatible authentication server
pub struct YggdrasilClient {
    client: Client,
    base_url: String,
    client_token: String,
}

impl YggdrasilClient {
    pub fn new(base_url: impl Into<String>, client_token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            client_token: client_token.into(),
        })
    }

    async fn post<T: Serialize>(&self, endpoint: &str, payload: &T) -> Result<reqwest::Response> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint);
        log::debug!("[auth] POST {}", url);

        let res = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;
        log::debug!("[auth] {} returned {}", endpoint, res.status());

        match res.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(res),
            StatusCode::BAD_REQUEST => {
                let err: ErrorResponse = res.json().await.unwrap_or_default();
                Err(AuthError::BadRequest(err.error_message).into())
            }
            StatusCode::FORBIDDEN => {
                let err: ErrorResponse = res.json().await.unwrap_or_default();
                Err(AuthError::Forbidden(err.error_message).into())
            }
            other => Err(AuthError::Status(other.as_u16()).into()),
        }
    }

    fn account_from(res: AuthenticateResponse) -> Result<Account> {
        let user = res
            .user
            .ok_or_else(|| crate::LauncherError::missing("authentication response", "user"))?;
        let profile = res.selected_profile.ok_or_else(|| {
            crate::LauncherError::missing("authentication response", "selectedProfile")
        })?;
        Ok(Account {
            id: user.id,
            uuid: profile.id,
            email: user.username,
            username: profile.name,
            access_token: res.access_token,
        })
    }

    /// Log in with username (or e-mail) and password
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Account> {
        log::info!("[auth] Authenticating {}", username);
        let res = self
            .post(
                "authenticate",
                &AuthenticateRequest {
                    agent: Agent {
                        name: "Minecraft",
                        version: 1,
                    },
                    username,
                    password,
                    client_token: &self.client_token,
                    request_user: true,
                },
            )
            .await?;
        let body: AuthenticateResponse = res.json().await.context("Invalid authenticate response")?;
        Self::account_from(body)
    }

    /// Whether the access token is still accepted
    pub async fn validate(&self, account: &Account) -> Result<bool> {
        let req = TokenRequest {
            access_token: &account.access_token,
            client_token: &self.client_token,
        };
        match self.post("validate", &req).await {
            Ok(_) => Ok(true),
            Err(e) if matches!(e.downcast_ref::<AuthError>(), Some(AuthError::Forbidden(_))) => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Exchange the access token for a fresh one
    pub async fn refresh(&self, account: &Account) -> Result<Account> {
        log::info!("[auth] Refreshing session for {}", account.username);
        let res = self
            .post(
                "refresh",
                &RefreshRequest {
                    access_token: &account.access_token,
                    client_token: &self.client_token,
                    selected_profile: Profile {
                        id: account.uuid.clone(),
                        name: account.username.clone(),
                    },
                    request_user: true,
                },
            )
            .await?;
        let body: AuthenticateResponse = res.json().await.context("Invalid refresh response")?;
        Self::account_from(body)
    }

    /// Revoke the access token. Failures are logged and otherwise ignored.
    pub async fn invalidate(&self, account: &Account) {
        let req = TokenRequest {
            access_token: &account.access_token,
            client_token: &self.client_token,
        };
        if let Err(e) = self.post("invalidate", &req).await {
            log::warn!("[auth] Failed to invalidate session: {:#}", e);
        }
    }

    /// Return a usable account, refreshing the token when it has expired
    pub async fn ensure_valid(&self, account: &Account) -> Result<Account> {
        if self.validate(account).await? {
            return Ok(account.clone());
        }
        self.refresh(account).await
    }
}
