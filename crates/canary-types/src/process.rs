//! Process-engine projections used by the process probe.

use serde::{Deserialize, Serialize};

/// BPMN id of the device task in the canary process model.
pub const CANARY_TASK_BPMN_ID: &str = "Task_0fa1ff0";

/// State reported for a finished process instance.
pub const PROCESS_INSTANCE_COMPLETED: &str = "COMPLETED";

/// A process instance as listed by the process engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInstance {
    pub id: String,
    pub state: String,
    #[serde(default)]
    pub duration_in_millis: i64,
}

impl ProcessInstance {
    pub fn is_completed(&self) -> bool {
        self.state == PROCESS_INSTANCE_COMPLETED
    }
}

/// One selectable (device and its services) offered for a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedSelectionOption {
    pub device_id: Option<String>,
    #[serde(default)]
    pub service_ids: Vec<String>,
}

/// A BPMN element of a prepared deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedElement {
    pub bpmn_id: String,
    /// Selection options, `None` when the element is not a task.
    pub selection_options: Option<Vec<PreparedSelectionOption>>,
}

/// The "prepared deployment" projection: what the platform would let a user
/// select for each task of a process model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedDeployment {
    #[serde(default)]
    pub elements: Vec<PreparedElement>,
}

impl PreparedDeployment {
    fn options_for<'a>(
        &'a self,
        bpmn_id: &'a str,
    ) -> impl Iterator<Item = &'a PreparedSelectionOption> + 'a {
        self.elements
            .iter()
            .filter(move |e| e.bpmn_id == bpmn_id)
            .filter_map(|e| e.selection_options.as_ref())
            .flatten()
    }

    /// Whether the device is selectable for the given task.
    pub fn offers_device(&self, bpmn_id: &str, device_id: &str) -> bool {
        self.options_for(bpmn_id)
            .any(|o| o.device_id.as_deref() == Some(device_id))
    }

    /// Whether the service is selectable for the given task.
    pub fn offers_service(&self, bpmn_id: &str, service_id: &str) -> bool {
        self.options_for(bpmn_id)
            .any(|o| o.service_ids.iter().any(|s| s == service_id))
    }
}
