//! # Canary Types - Core data model
//!
//! Narrow data-transfer types owned by the probe engine. Platform clients map
//! their wire formats into these types at the collaborator boundary, so the
//! engine's invariants never depend on a remote API's full surface.
//!
//! ## Key Types
//!
//! - [`Session`]: token pair acquired for one test cycle
//! - [`Device`], [`DeviceType`], [`Hub`]: canary entities on the platform
//! - [`TestSubject`]: the device/hub pair every probe of a cycle runs against
//! - [`Notification`], [`LastValue`]: read-back shapes used for assertions
//! - [`process`]: process-engine projections (deployments, instances)
//! - [`duration`]: serde adapter for `"30s"`-style durations

pub mod duration;
pub mod model;
pub mod process;
pub mod session;

pub use model::{
    Attribute, ConnectionState, ContentBlueprint, Device, DeviceType, DeviceTypeBlueprint, Hub,
    Interaction, LastValue, LastValueRequest, Notification, Service, ServiceBlueprint, TestSubject,
    COMMAND_SERVICE_LOCAL_ID, SENSOR_SERVICE_LOCAL_ID,
};
pub use process::{
    PreparedDeployment, PreparedElement, PreparedSelectionOption, ProcessInstance,
    CANARY_TASK_BPMN_ID, PROCESS_INSTANCE_COMPLETED,
};
pub use session::Session;
