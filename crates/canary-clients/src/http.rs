//! Shared HTTP plumbing for the platform clients

use std::time::Duration;

use canary_types::Session;
use reqwest::{header::AUTHORIZATION, Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use url::Url;

use crate::error::{ClientError, ClientResult};

/// Bearer-authenticated JSON client bound to one service base URL
#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    pub(crate) fn new(base_url: &str, timeout: Duration) -> ClientResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL extended by percent-encoded path segments
    pub(crate) fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| ClientError::Config(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, session: &Session, url: Url) -> ClientResult<T> {
        let request = self.client.get(url);
        self.send(session, request).await
    }

    pub(crate) async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        session: &Session,
        url: Url,
        body: &B,
    ) -> ClientResult<T> {
        let request = self.client.post(url).json(body);
        self.send(session, request).await
    }

    pub(crate) async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        session: &Session,
        url: Url,
        body: &B,
    ) -> ClientResult<T> {
        let request = self.client.put(url).json(body);
        self.send(session, request).await
    }

    /// Send a request whose response body is ignored
    pub(crate) async fn execute(&self, session: &Session, request: RequestBuilder) -> ClientResult<()> {
        let response = request
            .header(AUTHORIZATION, session.bearer())
            .send()
            .await?;
        check_status(response).await.map(|_| ())
    }

    async fn send<T: DeserializeOwned>(
        &self,
        session: &Session,
        request: RequestBuilder,
    ) -> ClientResult<T> {
        let response = request
            .header(AUTHORIZATION, session.bearer())
            .send()
            .await?;
        handle_response(response).await
    }
}

/// Map non-success statuses to errors
pub(crate) async fn check_status(response: reqwest::Response) -> ClientResult<reqwest::Response> {
    let status = response.status();

    if status.is_success() {
        Ok(response)
    } else if status == StatusCode::NOT_FOUND {
        let message = response.text().await.unwrap_or_default();
        Err(ClientError::NotFound(message))
    } else {
        let message = response.text().await.unwrap_or_default();
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

pub(crate) async fn handle_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> ClientResult<T> {
    let response = check_status(response).await?;
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}
