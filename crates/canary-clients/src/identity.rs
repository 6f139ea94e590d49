//! OpenID-Connect identity client (resource owner password grant)

use async_trait::async_trait;
use canary_types::Session;
use serde::Deserialize;
use tracing::debug;

use crate::api::IdentityClient;
use crate::config::AuthConfig;
use crate::error::ClientResult;
use crate::http::{check_status, handle_response, HttpClient};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
}

/// Logs the canary user in and out of the identity provider
pub struct OidcIdentity {
    http: HttpClient,
    config: AuthConfig,
}

impl OidcIdentity {
    pub fn new(config: AuthConfig, timeout: std::time::Duration) -> ClientResult<Self> {
        Ok(Self {
            http: HttpClient::new(&config.endpoint, timeout)?,
            config,
        })
    }

    fn openid_endpoint(&self, action: &str) -> ClientResult<url::Url> {
        self.http.endpoint(&[
            "auth",
            "realms",
            &self.config.realm,
            "protocol",
            "openid-connect",
            action,
        ])
    }
}

#[async_trait]
impl IdentityClient for OidcIdentity {
    async fn login(&self) -> ClientResult<Session> {
        let form = [
            ("grant_type", "password"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];
        let response = self
            .http
            .client()
            .post(self.openid_endpoint("token")?)
            .form(&form)
            .send()
            .await?;
        let token: TokenResponse = handle_response(response).await?;
        debug!(user = %self.config.username, "Logged in");
        Ok(Session::new(token.access_token, token.refresh_token))
    }

    async fn logout(&self, session: &Session) -> ClientResult<()> {
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", session.refresh_token.as_str()),
        ];
        let response = self
            .http
            .client()
            .post(self.openid_endpoint("logout")?)
            .form(&form)
            .send()
            .await?;
        check_status(response).await?;
        debug!(user = %self.config.username, "Logged out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(endpoint: String) -> AuthConfig {
        AuthConfig {
            endpoint,
            username: "canary".to_string(),
            password: "secret".to_string(),
            ..AuthConfig::default()
        }
    }

    #[tokio::test]
    async fn test_login_and_logout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/realms/master/protocol/openid-connect/token"))
            .and(body_string_contains("grant_type=password"))
            .and(body_string_contains("username=canary"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "access",
                "refresh_token": "refresh",
                "expires_in": 300
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/realms/master/protocol/openid-connect/logout"))
            .and(body_string_contains("refresh_token=refresh"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let identity = OidcIdentity::new(config(server.uri()), Duration::from_secs(5)).unwrap();
        let session = identity.login().await.unwrap();
        assert_eq!(session, Session::new("access", "refresh"));

        identity.logout(&session).await.unwrap();
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let identity = OidcIdentity::new(config(server.uri()), Duration::from_secs(5)).unwrap();
        let err = identity.login().await.unwrap_err();
        assert!(matches!(err, crate::ClientError::Api { status: 401, .. }));
    }
}
