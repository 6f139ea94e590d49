//! Find-or-create resolution of the canary device type, device and hub.

use canary_metrics::Operation;
use canary_types::{
    Attribute, ContentBlueprint, Device, DeviceType, DeviceTypeBlueprint, Hub, Interaction,
    ServiceBlueprint, Session, TestSubject, COMMAND_SERVICE_LOCAL_ID, SENSOR_SERVICE_LOCAL_ID,
};
use chrono::Utc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::DeviceTypeConfig;
use crate::context::ProbeContext;
use crate::error::{EngineError, EngineResult};

const DEVICE_TYPE_NAME: &str = "canary-device-type";
const DEVICE_TYPE_DESCRIPTION: &str = "used for canary service github.com/SENERGY-Platform/canary";

/// Resolves the entities a cycle works against, creating them when missing.
///
/// Every operation is idempotent: once an entity exists, repeated calls
/// return it unchanged.
#[derive(Debug, Clone)]
pub struct SetupResolver {
    ctx: ProbeContext,
}

impl SetupResolver {
    pub fn new(ctx: ProbeContext) -> Self {
        Self { ctx }
    }

    /// Resolve device and hub of this cycle
    pub async fn resolve(&self, session: &Session) -> EngineResult<TestSubject> {
        let device = self.ensure_device(session).await?;
        let hub = self.ensure_hub(session, &device).await?;
        Ok(TestSubject { device, hub })
    }

    /// Find the device type carrying the marker, or create it
    #[instrument(skip_all)]
    pub async fn ensure_device_type(&self, session: &Session) -> EngineResult<DeviceType> {
        let marker = &self.ctx.config.device_type_marker;
        let found = self
            .ctx
            .metrics
            .observe(
                Operation::PermissionsRequest,
                self.ctx.clients.permissions.find_device_types(session, marker, 1),
            )
            .await
            .map_err(EngineError::setup("find device type"))?;

        if let Some(device_type) = found.into_iter().next() {
            debug!(device_type_id = %device_type.id, "Reusing canary device type");
            return Ok(device_type);
        }

        let blueprint = device_type_blueprint(&self.ctx.config.device_type, marker);
        let created = self
            .ctx
            .metrics
            .observe(
                Operation::DeviceMetaUpdate,
                self.ctx.clients.registry.create_device_type(session, &blueprint),
            )
            .await
            .map_err(EngineError::setup("create device type"))?;
        info!(device_type_id = %created.id, "Created canary device type");

        self.ctx.change_guarantee().await;
        Ok(created)
    }

    /// Find the device carrying the marker, or create it
    #[instrument(skip_all)]
    pub async fn ensure_device(&self, session: &Session) -> EngineResult<Device> {
        let marker = &self.ctx.config.device_marker;
        let found = self
            .ctx
            .metrics
            .observe(
                Operation::PermissionsRequest,
                self.ctx.clients.permissions.find_devices(session, marker, 1),
            )
            .await
            .map_err(EngineError::setup("find device"))?;

        if let Some(device) = found.into_iter().next() {
            debug!(device_id = %device.id, "Reusing canary device");
            return Ok(device);
        }

        let device_type = self.ensure_device_type(session).await?;
        let device = Device {
            id: String::new(),
            local_id: format!("canary_{}", Uuid::new_v4()),
            owner_id: String::new(),
            name: timestamp_name("canary"),
            device_type_id: device_type.id,
            attributes: vec![Attribute::marker(marker.as_str())],
        };
        let created = self
            .ctx
            .metrics
            .observe(
                Operation::DeviceMetaUpdate,
                self.ctx.clients.registry.create_device(session, &device),
            )
            .await
            .map_err(EngineError::setup("create device"))?;
        if created.id.is_empty() {
            return Err(EngineError::InvalidSetup {
                step: "create device",
                reason: "device manager returned no id".to_string(),
            });
        }
        info!(device_id = %created.id, local_id = %created.local_id, "Created canary device");

        self.ctx.change_guarantee().await;
        Ok(created)
    }

    /// Find the canary hub and make sure it lists `device`.
    ///
    /// Only the first hub matching the configured name is considered. A
    /// stale hub is updated in place, never duplicated.
    #[instrument(skip_all, fields(device_id = %device.id))]
    pub async fn ensure_hub(&self, session: &Session, device: &Device) -> EngineResult<Hub> {
        let hub_name = &self.ctx.config.hub_name;
        let found = self
            .ctx
            .metrics
            .observe(
                Operation::DeviceRepoRequest,
                self.ctx.clients.registry.list_hubs(session, hub_name, 1),
            )
            .await
            .map_err(EngineError::setup("list hubs"))?;

        let wanted = Hub {
            id: String::new(),
            name: hub_name.clone(),
            device_ids: vec![device.id.clone()],
            device_local_ids: vec![device.local_id.clone()],
        };

        let hub = match found.into_iter().next() {
            Some(hub) if hub.lists_device(device) => {
                debug!(hub_id = %hub.id, "Reusing canary hub");
                return Ok(hub);
            }
            Some(stale) => {
                let hub = Hub {
                    id: stale.id,
                    ..wanted
                };
                let updated = self
                    .ctx
                    .metrics
                    .observe(
                        Operation::DeviceMetaUpdate,
                        self.ctx.clients.registry.update_hub(session, &hub),
                    )
                    .await
                    .map_err(EngineError::setup("update hub"))?;
                info!(hub_id = %updated.id, "Repaired canary hub membership");
                updated
            }
            None => {
                let created = self
                    .ctx
                    .metrics
                    .observe(
                        Operation::DeviceMetaUpdate,
                        self.ctx.clients.registry.create_hub(session, &wanted),
                    )
                    .await
                    .map_err(EngineError::setup("create hub"))?;
                info!(hub_id = %created.id, "Created canary hub");
                created
            }
        };

        if hub.id.is_empty() {
            return Err(EngineError::InvalidSetup {
                step: "ensure hub",
                reason: "device manager returned no hub id".to_string(),
            });
        }

        self.ctx.change_guarantee().await;
        Ok(hub)
    }
}

/// Display name carrying the current time, e.g. `canary-2024-05-01T10:00:00.123456Z`
pub(crate) fn timestamp_name(prefix: &str) -> String {
    format!(
        "{}-{}",
        prefix,
        Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
    )
}

/// Device type with a `cmd` request service and a `sensor` event service,
/// both bound to the configured protocol segment.
pub fn device_type_blueprint(config: &DeviceTypeConfig, marker: &str) -> DeviceTypeBlueprint {
    let content = |value_type: &str, characteristic: &str, function: &str, aspect: &str| {
        ContentBlueprint {
            name: "value".to_string(),
            value_type: value_type.to_string(),
            characteristic_id: characteristic.to_string(),
            function_id: function.to_string(),
            aspect_id: (!aspect.is_empty()).then(|| aspect.to_string()),
            protocol_segment_id: config.protocol_segment_id.clone(),
        }
    };

    DeviceTypeBlueprint {
        name: DEVICE_TYPE_NAME.to_string(),
        description: DEVICE_TYPE_DESCRIPTION.to_string(),
        device_class_id: config.device_class_id.clone(),
        attributes: vec![Attribute::marker(marker)],
        services: vec![
            ServiceBlueprint {
                local_id: COMMAND_SERVICE_LOCAL_ID.to_string(),
                name: COMMAND_SERVICE_LOCAL_ID.to_string(),
                description: "canary command".to_string(),
                interaction: Interaction::Request,
                protocol_id: config.protocol_id.clone(),
                inputs: vec![content(
                    &config.cmd_value_type,
                    &config.cmd_characteristic_id,
                    &config.cmd_function_id,
                    "",
                )],
                outputs: vec![],
            },
            ServiceBlueprint {
                local_id: SENSOR_SERVICE_LOCAL_ID.to_string(),
                name: SENSOR_SERVICE_LOCAL_ID.to_string(),
                description: "canary sensor value".to_string(),
                interaction: Interaction::Event,
                protocol_id: config.protocol_id.clone(),
                inputs: vec![],
                outputs: vec![content(
                    &config.sensor_value_type,
                    &config.sensor_characteristic_id,
                    &config.sensor_function_id,
                    &config.sensor_aspect_id,
                )],
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use canary_metrics::Operation;

    use super::*;
    use crate::testing::{test_config, FakePlatform};

    #[test]
    fn test_blueprint_has_cmd_and_sensor_services() {
        let config = DeviceTypeConfig {
            protocol_id: "proto".to_string(),
            protocol_segment_id: "segment".to_string(),
            sensor_aspect_id: "aspect".to_string(),
            ..Default::default()
        };
        let blueprint = device_type_blueprint(&config, "marker");

        assert_eq!(blueprint.name, DEVICE_TYPE_NAME);
        assert_eq!(blueprint.attributes, vec![Attribute::marker("marker")]);
        assert_eq!(blueprint.services.len(), 2);

        let cmd = &blueprint.services[0];
        assert_eq!(cmd.local_id, COMMAND_SERVICE_LOCAL_ID);
        assert_eq!(cmd.interaction, Interaction::Request);
        assert_eq!(cmd.inputs[0].protocol_segment_id, "segment");
        assert_eq!(cmd.inputs[0].aspect_id, None);

        let sensor = &blueprint.services[1];
        assert_eq!(sensor.local_id, SENSOR_SERVICE_LOCAL_ID);
        assert_eq!(sensor.interaction, Interaction::Event);
        assert_eq!(sensor.protocol_id, "proto");
        assert_eq!(sensor.outputs[0].aspect_id.as_deref(), Some("aspect"));
    }

    #[test]
    fn test_timestamp_name() {
        let name = timestamp_name("canary");
        assert!(name.starts_with("canary-20"));
        assert!(name.ends_with('Z'));
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let platform = Arc::new(FakePlatform::default());
        let ctx = platform.context(test_config());
        let resolver = SetupResolver::new(ctx.clone());
        let session = Session::new("token", "refresh");

        let first = resolver.resolve(&session).await.unwrap();
        let second = resolver.resolve(&session).await.unwrap();

        assert_eq!(first, second);
        assert!(first.hub.lists_device(&first.device));
        assert!(first.device.local_id.starts_with("canary_"));

        let state = platform.snapshot();
        assert_eq!(state.devices.len(), 1);
        assert_eq!(state.device_types.len(), 1);
        assert_eq!(state.hubs.len(), 1);

        // One device type, one device, one hub created; nothing rewritten
        assert_eq!(ctx.metrics.count(Operation::DeviceMetaUpdate), 3);
        assert_eq!(ctx.metrics.errors(Operation::PermissionsRequest), 0);
    }

    #[tokio::test]
    async fn test_ensure_device_type_is_idempotent() {
        let platform = Arc::new(FakePlatform::default());
        let ctx = platform.context(test_config());
        let resolver = SetupResolver::new(ctx.clone());
        let session = Session::new("token", "refresh");

        let first = resolver.ensure_device_type(&session).await.unwrap();
        let second = resolver.ensure_device_type(&session).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(platform.snapshot().device_types.len(), 1);
        assert_eq!(ctx.metrics.count(Operation::DeviceMetaUpdate), 1);
        assert_eq!(ctx.metrics.count(Operation::PermissionsRequest), 2);
    }

    #[tokio::test]
    async fn test_stale_hub_is_repaired_not_duplicated() {
        let platform = Arc::new(FakePlatform::default());
        platform.seed_hub("canary-hub", &[]);
        let ctx = platform.context(test_config());
        let resolver = SetupResolver::new(ctx.clone());
        let session = Session::new("token", "refresh");

        let subject = resolver.resolve(&session).await.unwrap();

        let state = platform.snapshot();
        assert_eq!(state.hubs.len(), 1);
        assert_eq!(state.hubs[0].id, subject.hub.id);
        assert!(state.hubs[0].lists_device(&subject.device));
    }

    #[tokio::test]
    async fn test_index_failure_aborts_setup() {
        let platform = Arc::new(FakePlatform::default());
        platform.behave(|b| b.fail_permissions = true);
        let ctx = platform.context(test_config());
        let session = Session::new("token", "refresh");

        let err = SetupResolver::new(ctx.clone())
            .resolve(&session)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Setup { step: "find device", .. }));
        assert_eq!(ctx.metrics.errors(Operation::PermissionsRequest), 1);
        assert!(platform.snapshot().devices.is_empty());
    }
}
