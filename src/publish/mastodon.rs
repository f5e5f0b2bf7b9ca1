use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Deserialize;

use super::Poster;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// App + account credentials for the password-grant login.
#[derive(Debug, Clone)]
pub struct MastodonCredentials {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Logged-in Mastodon account that posts public statuses.
#[derive(Clone)]
pub struct MastodonPoster {
    base_url: String,
    access_token: String,
    client: Client,
    timeout: Duration,
}

impl MastodonPoster {
    /// Exchange app credentials and username/password for an access token.
    pub async fn login(creds: &MastodonCredentials) -> Result<Self> {
        let client = Client::new();
        let base_url = creds.base_url.trim_end_matches('/').to_string();
        let form = [
            ("grant_type", "password"),
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str()),
            ("username", creds.username.as_str()),
            ("password", creds.password.as_str()),
            ("scope", "read write"),
        ];

        let token: TokenResponse = client
            .post(format!("{base_url}/oauth/token"))
            .timeout(REQUEST_TIMEOUT)
            .form(&form)
            .send()
            .await
            .context("mastodon login request")?
            .error_for_status()
            .context("mastodon login rejected")?
            .json()
            .await
            .context("mastodon token body")?;

        tracing::info!(target: "publish", user = %creds.username, "logged in to mastodon");
        Ok(Self {
            base_url,
            access_token: token.access_token,
            client,
            timeout: REQUEST_TIMEOUT,
        })
    }
}

#[async_trait::async_trait]
impl Poster for MastodonPoster {
    async fn post(&self, text: &str) -> Result<()> {
        let rsp = self
            .client
            .post(format!("{}/api/v1/statuses", self.base_url))
            .bearer_auth(&self.access_token)
            .timeout(self.timeout)
            .form(&[("status", text)])
            .send()
            .await
            .context("mastodon status request")?;

        if let Err(e) = rsp.error_for_status_ref() {
            return Err(anyhow!("mastodon status HTTP error: {e}"));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mastodon"
    }
}
