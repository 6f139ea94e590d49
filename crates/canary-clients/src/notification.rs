//! Notification service client

use std::time::Duration;

use async_trait::async_trait;
use canary_types::{Notification, Session};
use serde::{Deserialize, Serialize};

use crate::api::NotificationClient;
use crate::error::ClientResult;
use crate::http::HttpClient;

#[derive(Debug, Serialize)]
struct MessageWire<'a> {
    title: &'a str,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct NotificationWire {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct NotificationList {
    #[serde(default)]
    notifications: Vec<NotificationWire>,
}

/// Notification client; every call carries the configured deadline
pub struct HttpNotificationClient {
    http: HttpClient,
}

impl HttpNotificationClient {
    pub fn new(base_url: &str, deadline: Duration) -> ClientResult<Self> {
        Ok(Self {
            http: HttpClient::new(base_url, deadline)?,
        })
    }
}

#[async_trait]
impl NotificationClient for HttpNotificationClient {
    async fn send(&self, session: &Session, title: &str, message: &str) -> ClientResult<()> {
        let url = self.http.endpoint(&["notifications"])?;
        let request = self
            .http
            .client()
            .post(url)
            .json(&MessageWire { title, message });
        self.http.execute(session, request).await
    }

    async fn list(&self, session: &Session) -> ClientResult<Vec<Notification>> {
        let url = self.http.endpoint(&["notifications"])?;
        let list: NotificationList = self.http.get(session, url).await?;
        Ok(list
            .notifications
            .into_iter()
            .map(|n| Notification {
                id: n.id,
                title: n.title,
                message: n.message,
            })
            .collect())
    }

    async fn delete(&self, session: &Session, ids: &[String]) -> ClientResult<()> {
        let url = self.http.endpoint(&["notifications"])?;
        let request = self.http.client().delete(url).json(ids);
        self.http.execute(session, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_send_list_delete() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notifications"))
            .and(header("authorization", "Bearer t"))
            .and(body_json(json!({"title": "Canary-Test-Message", "message": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"_id": "n-1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/notifications"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total": 1,
                "limit": 0,
                "offset": 0,
                "notifications": [{
                    "_id": "n-1",
                    "userId": "u",
                    "title": "Canary-Test-Message",
                    "message": "hello",
                    "isRead": false,
                    "created_at": "2024-01-01T00:00:00Z"
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/notifications"))
            .and(body_json(json!(["n-1"])))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpNotificationClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let session = Session::new("t", "r");

        client.send(&session, "Canary-Test-Message", "hello").await.unwrap();
        let listed = client.list(&session).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].message, "hello");
        client.delete(&session, &["n-1".to_string()]).await.unwrap();
    }

    #[tokio::test]
    async fn test_deadline_applies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"notifications": []}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client =
            HttpNotificationClient::new(&server.uri(), Duration::from_millis(50)).unwrap();
        let err = client.list(&Session::new("t", "r")).await.unwrap_err();
        assert!(matches!(err, crate::ClientError::Http(ref e) if e.is_timeout()));
    }
}
