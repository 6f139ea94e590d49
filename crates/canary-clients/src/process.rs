//! Process deployment service and engine wrapper client

use std::time::Duration;

use async_trait::async_trait;
use canary_types::{
    PreparedDeployment, PreparedElement, PreparedSelectionOption, ProcessInstance, Session,
    CANARY_TASK_BPMN_ID,
};
use serde::{Deserialize, Serialize};

use crate::api::ProcessEngine;
use crate::config::ProcessEndpoints;
use crate::error::ClientResult;
use crate::http::HttpClient;

/// Process model: start event, one device task, end event.
const CANARY_PROCESS_BPMN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<bpmn:definitions xmlns:bpmn="http://www.omg.org/spec/BPMN/20100524/MODEL" xmlns:camunda="http://camunda.org/schema/1.0/bpmn" id="Definitions_canary" targetNamespace="http://bpmn.io/schema/bpmn">
  <bpmn:process id="{{PROCESS_NAME}}" name="{{PROCESS_NAME}}" isExecutable="true">
    <bpmn:startEvent id="StartEvent_1">
      <bpmn:outgoing>Flow_start</bpmn:outgoing>
    </bpmn:startEvent>
    <bpmn:serviceTask id="{{TASK_ID}}" name="canary-task" camunda:type="external" camunda:topic="pessimistic">
      <bpmn:extensionElements>
        <camunda:inputOutput>
          <camunda:inputParameter name="payload">{"function":{"id":"","name":""},"characteristic_id":"","aspect":null}</camunda:inputParameter>
        </camunda:inputOutput>
      </bpmn:extensionElements>
      <bpmn:incoming>Flow_start</bpmn:incoming>
      <bpmn:outgoing>Flow_end</bpmn:outgoing>
    </bpmn:serviceTask>
    <bpmn:endEvent id="EndEvent_1">
      <bpmn:incoming>Flow_end</bpmn:incoming>
    </bpmn:endEvent>
    <bpmn:sequenceFlow id="Flow_start" sourceRef="StartEvent_1" targetRef="{{TASK_ID}}" />
    <bpmn:sequenceFlow id="Flow_end" sourceRef="{{TASK_ID}}" targetRef="EndEvent_1" />
  </bpmn:process>
</bpmn:definitions>
"#;

fn process_xml(process_name: &str) -> String {
    CANARY_PROCESS_BPMN
        .replace("{{PROCESS_NAME}}", process_name)
        .replace("{{TASK_ID}}", CANARY_TASK_BPMN_ID)
}

#[derive(Debug, Deserialize)]
struct DeploymentEntry {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Serialize)]
struct PrepareRequest<'a> {
    xml: &'a str,
    svg: &'a str,
}

#[derive(Debug, Deserialize)]
struct PreparedDeploymentWire {
    #[serde(default)]
    elements: Vec<PreparedElementWire>,
}

#[derive(Debug, Deserialize)]
struct PreparedElementWire {
    #[serde(default)]
    bpmn_id: String,
    #[serde(default)]
    task: Option<PreparedTaskWire>,
}

#[derive(Debug, Deserialize)]
struct PreparedTaskWire {
    #[serde(default)]
    selection: SelectionWire,
}

#[derive(Debug, Default, Deserialize)]
struct SelectionWire {
    #[serde(default)]
    selection_options: Vec<SelectionOptionWire>,
}

#[derive(Debug, Deserialize)]
struct SelectionOptionWire {
    #[serde(default)]
    device: Option<IdWire>,
    #[serde(default)]
    services: Vec<IdWire>,
}

#[derive(Debug, Deserialize)]
struct IdWire {
    id: String,
}

impl From<PreparedDeploymentWire> for PreparedDeployment {
    fn from(wire: PreparedDeploymentWire) -> Self {
        PreparedDeployment {
            elements: wire
                .elements
                .into_iter()
                .map(|e| PreparedElement {
                    bpmn_id: e.bpmn_id,
                    selection_options: e.task.map(|t| {
                        t.selection
                            .selection_options
                            .into_iter()
                            .map(|o| PreparedSelectionOption {
                                device_id: o.device.map(|d| d.id),
                                service_ids: o.services.into_iter().map(|s| s.id).collect(),
                            })
                            .collect()
                    }),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DeploymentRequest<'a> {
    version: u32,
    name: &'a str,
    description: &'a str,
    diagram: DiagramWire,
    elements: Vec<DeploymentElement<'a>>,
    executable: bool,
}

#[derive(Debug, Serialize)]
struct DiagramWire {
    xml_raw: String,
    svg: String,
}

#[derive(Debug, Serialize)]
struct DeploymentElement<'a> {
    bpmn_id: &'a str,
    name: &'a str,
    order: u32,
    task: DeploymentTask<'a>,
}

#[derive(Debug, Serialize)]
struct DeploymentTask<'a> {
    retries: u32,
    selection: DeploymentSelection<'a>,
}

#[derive(Debug, Serialize)]
struct DeploymentSelection<'a> {
    selected_device_id: &'a str,
    selected_service_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct InstanceWire {
    id: String,
    #[serde(default, rename = "processDefinitionName")]
    process_definition_name: String,
    #[serde(default)]
    state: String,
    #[serde(default, rename = "durationInMillis")]
    duration_in_millis: Option<i64>,
}

/// Deploys, runs and cleans up the canary process
pub struct HttpProcessEngine {
    deployment: HttpClient,
    engine: HttpClient,
    process_name: String,
}

impl HttpProcessEngine {
    pub fn new(endpoints: &ProcessEndpoints, timeout: Duration) -> ClientResult<Self> {
        Ok(Self {
            deployment: HttpClient::new(&endpoints.deployment_url, timeout)?,
            engine: HttpClient::new(&endpoints.engine_url, timeout)?,
            process_name: endpoints.process_name.clone(),
        })
    }
}

#[async_trait]
impl ProcessEngine for HttpProcessEngine {
    async fn list_deployments(&self, session: &Session) -> ClientResult<Vec<String>> {
        let mut url = self.engine.endpoint(&["v2", "deployments"])?;
        url.query_pairs_mut().append_pair("search", &self.process_name);
        let deployments: Vec<DeploymentEntry> = self.engine.get(session, url).await?;
        Ok(deployments
            .into_iter()
            .filter(|d| d.name == self.process_name)
            .map(|d| d.id)
            .collect())
    }

    async fn delete_deployment(&self, session: &Session, id: &str) -> ClientResult<()> {
        let url = self.deployment.endpoint(&["v3", "deployments", id])?;
        let request = self.deployment.client().delete(url);
        self.deployment.execute(session, request).await
    }

    async fn prepared_deployment(&self, session: &Session) -> ClientResult<PreparedDeployment> {
        let url = self.deployment.endpoint(&["v3", "prepared-deployments"])?;
        let xml = process_xml(&self.process_name);
        let prepared: PreparedDeploymentWire = self
            .deployment
            .post(session, url, &PrepareRequest { xml: &xml, svg: "" })
            .await?;
        Ok(prepared.into())
    }

    async fn deploy(
        &self,
        session: &Session,
        device_id: &str,
        service_id: &str,
    ) -> ClientResult<String> {
        let mut url = self.deployment.endpoint(&["v3", "deployments"])?;
        url.query_pairs_mut().append_pair("source", "canary");
        let request = DeploymentRequest {
            version: 3,
            name: &self.process_name,
            description: "deployed by the canary",
            diagram: DiagramWire {
                xml_raw: process_xml(&self.process_name),
                svg: String::new(),
            },
            elements: vec![DeploymentElement {
                bpmn_id: CANARY_TASK_BPMN_ID,
                name: "canary-task",
                order: 0,
                task: DeploymentTask {
                    retries: 0,
                    selection: DeploymentSelection {
                        selected_device_id: device_id,
                        selected_service_id: service_id,
                    },
                },
            }],
            executable: true,
        };
        let deployed: DeploymentEntry = self.deployment.post(session, url, &request).await?;
        Ok(deployed.id)
    }

    async fn start_instance(&self, session: &Session, deployment_id: &str) -> ClientResult<()> {
        let url = self
            .engine
            .endpoint(&["v2", "deployments", deployment_id, "start"])?;
        let request = self.engine.client().get(url);
        self.engine.execute(session, request).await
    }

    async fn list_instances(&self, session: &Session) -> ClientResult<Vec<ProcessInstance>> {
        let mut url = self.engine.endpoint(&["v2", "history", "process-instances"])?;
        url.query_pairs_mut().append_pair("search", &self.process_name);
        let instances: Vec<InstanceWire> = self.engine.get(session, url).await?;
        Ok(instances
            .into_iter()
            .filter(|i| i.process_definition_name == self.process_name)
            .map(|i| ProcessInstance {
                id: i.id,
                state: i.state,
                duration_in_millis: i.duration_in_millis.unwrap_or_default(),
            })
            .collect())
    }
}
