//! Permission search index client

use std::time::Duration;

use async_trait::async_trait;
use canary_types::{Attribute, Device, DeviceType, Session};
use serde::{Deserialize, Serialize};

use crate::api::PermissionSearch;
use crate::error::ClientResult;
use crate::http::HttpClient;

/// Rights every canary query is filtered by
const READ_RIGHTS: &str = "r";

/// Feature path of attribute keys in the index
const ATTRIBUTE_KEY_FEATURE: &str = "features.attributes.key";

#[derive(Debug, Serialize)]
struct QueryMessage<'a> {
    resource: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    find: Option<QueryFind<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    list_ids: Option<QueryListIds<'a>>,
}

#[derive(Debug, Serialize)]
struct QueryFind<'a> {
    limit: usize,
    offset: usize,
    rights: &'a str,
    sort_by: &'a str,
    filter: Selection<'a>,
}

#[derive(Debug, Serialize)]
struct QueryListIds<'a> {
    limit: usize,
    offset: usize,
    rights: &'a str,
    ids: &'a [String],
}

#[derive(Debug, Serialize)]
struct Selection<'a> {
    condition: Condition<'a>,
}

#[derive(Debug, Serialize)]
struct Condition<'a> {
    feature: &'a str,
    operation: &'a str,
    value: &'a str,
}

impl<'a> QueryMessage<'a> {
    fn find_by_attribute(resource: &'a str, attribute_key: &'a str, limit: usize) -> Self {
        Self {
            resource,
            find: Some(QueryFind {
                limit,
                offset: 0,
                rights: READ_RIGHTS,
                sort_by: "name",
                filter: Selection {
                    condition: Condition {
                        feature: ATTRIBUTE_KEY_FEATURE,
                        operation: "==",
                        value: attribute_key,
                    },
                },
            }),
            list_ids: None,
        }
    }

    fn list_ids(resource: &'a str, ids: &'a [String]) -> Self {
        Self {
            resource,
            find: None,
            list_ids: Some(QueryListIds {
                limit: ids.len(),
                offset: 0,
                rights: READ_RIGHTS,
                ids,
            }),
        }
    }
}

/// Device entry of the index
#[derive(Debug, Deserialize)]
struct PermDevice {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    local_id: String,
    #[serde(default)]
    device_type_id: String,
    #[serde(default)]
    owner_id: Option<String>,
    #[serde(default)]
    creator: Option<String>,
    #[serde(default)]
    attributes: Vec<Attribute>,
}

impl From<PermDevice> for Device {
    fn from(entry: PermDevice) -> Self {
        Device {
            id: entry.id,
            local_id: entry.local_id,
            owner_id: entry.owner_id.or(entry.creator).unwrap_or_default(),
            name: entry.name,
            device_type_id: entry.device_type_id,
            attributes: entry.attributes,
        }
    }
}

/// Device-type entry of the index; services are listed by id only
#[derive(Debug, Deserialize)]
struct PermDeviceType {
    id: String,
}

/// Client of the permission search `v3/query` endpoint
pub struct HttpPermissionSearch {
    http: HttpClient,
}

impl HttpPermissionSearch {
    pub fn new(base_url: &str, timeout: Duration) -> ClientResult<Self> {
        Ok(Self {
            http: HttpClient::new(base_url, timeout)?,
        })
    }
}

#[async_trait]
impl PermissionSearch for HttpPermissionSearch {
    async fn find_devices(
        &self,
        session: &Session,
        attribute_key: &str,
        limit: usize,
    ) -> ClientResult<Vec<Device>> {
        let url = self.http.endpoint(&["v3", "query"])?;
        let query = QueryMessage::find_by_attribute("devices", attribute_key, limit);
        let entries: Vec<PermDevice> = self.http.post(session, url, &query).await?;
        Ok(entries.into_iter().map(Device::from).collect())
    }

    async fn find_device_types(
        &self,
        session: &Session,
        attribute_key: &str,
        limit: usize,
    ) -> ClientResult<Vec<DeviceType>> {
        let url = self.http.endpoint(&["v3", "query"])?;
        let query = QueryMessage::find_by_attribute("device-types", attribute_key, limit);
        let entries: Vec<PermDeviceType> = self.http.post(session, url, &query).await?;
        Ok(entries
            .into_iter()
            .map(|e| DeviceType {
                id: e.id,
                services: Vec::new(),
            })
            .collect())
    }

    async fn list_devices(&self, session: &Session, ids: &[String]) -> ClientResult<Vec<Device>> {
        let url = self.http.endpoint(&["v3", "query"])?;
        let query = QueryMessage::list_ids("devices", ids);
        let entries: Vec<PermDevice> = self.http.post(session, url, &query).await?;
        Ok(entries.into_iter().map(Device::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_find_devices_by_marker() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/query"))
            .and(body_json(json!({
                "resource": "devices",
                "find": {
                    "limit": 1,
                    "offset": 0,
                    "rights": "r",
                    "sort_by": "name",
                    "filter": {"condition": {
                        "feature": "features.attributes.key",
                        "operation": "==",
                        "value": "senergy/canary-device"
                    }}
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": "device-1",
                "name": "canary-1",
                "local_id": "canary_1",
                "device_type_id": "dt-1",
                "creator": "owner-1",
                "shared": false
            }])))
            .expect(1)
            .mount(&server)
            .await;

        let search = HttpPermissionSearch::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let devices = search
            .find_devices(&Session::new("t", "r"), "senergy/canary-device", 1)
            .await
            .unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].owner_id, "owner-1");
        assert_eq!(devices[0].local_id, "canary_1");
    }

    #[tokio::test]
    async fn test_list_devices_by_ids() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/query"))
            .and(body_json(json!({
                "resource": "devices",
                "list_ids": {"limit": 1, "offset": 0, "rights": "r", "ids": ["device-1"]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "device-1", "name": "canary-renamed"}
            ])))
            .mount(&server)
            .await;

        let search = HttpPermissionSearch::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let devices = search
            .list_devices(&Session::new("t", "r"), &["device-1".to_string()])
            .await
            .unwrap();
        assert_eq!(devices[0].name, "canary-renamed");
    }

    #[tokio::test]
    async fn test_find_device_types_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let search = HttpPermissionSearch::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let types = search
            .find_device_types(&Session::new("t", "r"), "senergy/canary-device-type", 1)
            .await
            .unwrap();
        assert!(types.is_empty());
    }
}
