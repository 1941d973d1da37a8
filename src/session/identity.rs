//! Identity provider
//!
//! Password sign-in, sign-up and the two out-of-band mails (address
//! verification, password reset) against the Identity Toolkit REST surface.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::PortalConfig;
use crate::utils::truncate::snippet;

/// A signed-in user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    #[serde(skip)]
    pub id_token: String,
    pub local_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub email_verified: bool,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity>;

    async fn sign_up(&self, email: &str, password: &str, display_name: Option<&str>) -> Result<Identity>;

    async fn send_email_verification(&self, id_token: &str) -> Result<()>;

    async fn send_password_reset(&self, email: &str) -> Result<()>;

    /// Provider-side sign-out. Tokens are stateless, so the default does nothing.
    async fn sign_out(&self, _identity: &Identity) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    id_token: String,
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    display_name: Option<String>,
}

pub struct FirebaseIdentity {
    client: Client,
    base_url: String,
    api_key: String,
}

impl FirebaseIdentity {
    pub fn new(config: &PortalConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.upstream_timeout)
            .build()
            .context("Failed to build identity client")?;

        Ok(Self {
            client,
            base_url: config.identity_base_url.clone(),
            api_key: config.identity_api_key.clone(),
        })
    }

    async fn call(&self, method: &str, body: Value) -> Result<Value> {
        debug!("Identity call: {}", method);
        let response = self
            .client
            .post(format!("{}accounts:{}", self.base_url, method))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to reach identity provider ({})", method))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("Identity provider {} returned {}: {}", method, status, snippet(&text, 256));
        }
        serde_json::from_str(&text).with_context(|| format!("Invalid {} response", method))
    }

    async fn lookup(&self, id_token: &str) -> Result<LookupUser> {
        let body = self.call("lookup", json!({ "idToken": id_token })).await?;
        let lookup: LookupResponse = serde_json::from_value(body).context("Invalid lookup response")?;
        lookup.users.into_iter().next().context("Lookup returned no user")
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity> {
        let body = self
            .call(
                "signInWithPassword",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        let auth: AuthResponse = serde_json::from_value(body).context("Invalid sign-in response")?;

        // signInWithPassword does not report verification, lookup does
        let user = self.lookup(&auth.id_token).await?;

        Ok(Identity {
            email: auth.email.unwrap_or_else(|| email.to_string()),
            display_name: user.display_name.or(auth.display_name),
            email_verified: user.email_verified,
            local_id: auth.local_id,
            id_token: auth.id_token,
        })
    }

    async fn sign_up(&self, email: &str, password: &str, display_name: Option<&str>) -> Result<Identity> {
        let mut request = json!({ "email": email, "password": password, "returnSecureToken": true });
        if let Some(name) = display_name {
            request["displayName"] = Value::String(name.to_string());
        }
        let body = self.call("signUp", request).await?;
        let auth: AuthResponse = serde_json::from_value(body).context("Invalid sign-up response")?;

        Ok(Identity {
            email: auth.email.unwrap_or_else(|| email.to_string()),
            display_name: auth.display_name.or_else(|| display_name.map(str::to_string)),
            email_verified: false,
            local_id: auth.local_id,
            id_token: auth.id_token,
        })
    }

    async fn send_email_verification(&self, id_token: &str) -> Result<()> {
        self.call(
            "sendOobCode",
            json!({ "requestType": "VERIFY_EMAIL", "idToken": id_token }),
        )
        .await?;
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<()> {
        self.call(
            "sendOobCode",
            json!({ "requestType": "PASSWORD_RESET", "email": email }),
        )
        .await?;
        Ok(())
    }
}
