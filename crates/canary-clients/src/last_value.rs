//! Last-value query client

use std::time::Duration;

use async_trait::async_trait;
use canary_types::{LastValue, LastValueRequest, Session};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::api::LastValueQuery;
use crate::error::ClientResult;
use crate::http::HttpClient;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LastValueRequestWire<'a> {
    device_id: &'a str,
    service_id: &'a str,
    column_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct LastValueWire {
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    value: serde_json::Value,
}

/// Posts value requests to a fixed last-value endpoint
pub struct HttpLastValueQuery {
    http: HttpClient,
    url: Url,
}

impl HttpLastValueQuery {
    pub fn new(url: &str, timeout: Duration) -> ClientResult<Self> {
        Ok(Self {
            http: HttpClient::new(url, timeout)?,
            url: Url::parse(url)?,
        })
    }
}

#[async_trait]
impl LastValueQuery for HttpLastValueQuery {
    async fn last_values(
        &self,
        session: &Session,
        requests: &[LastValueRequest],
    ) -> ClientResult<Vec<LastValue>> {
        let body: Vec<LastValueRequestWire<'_>> = requests
            .iter()
            .map(|r| LastValueRequestWire {
                device_id: &r.device_id,
                service_id: &r.service_id,
                column_name: &r.column_name,
            })
            .collect();
        let values: Vec<LastValueWire> = self.http.post(session, self.url.clone(), &body).await?;
        Ok(values
            .into_iter()
            .map(|v| LastValue {
                time: v.time,
                value: v.value,
            })
            .collect())
    }
}
