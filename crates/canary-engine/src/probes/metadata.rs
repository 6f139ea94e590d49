//! Metadata probe: rename the device and check that the registry and the
//! permission index both pick up the new name.

use async_trait::async_trait;
use canary_metrics::{Operation, Unexpected};
use canary_types::{Device, Session, TestSubject};
use tracing::{debug, error, instrument, warn};

use super::{Probe, ProbeKind};
use crate::context::ProbeContext;
use crate::setup::timestamp_name;

pub struct MetadataProbe {
    ctx: ProbeContext,
}

impl MetadataProbe {
    pub fn new(ctx: ProbeContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Probe for MetadataProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Metadata
    }

    #[instrument(skip_all, fields(probe = "metadata", device_id = %subject.device.id))]
    async fn run(&self, session: &Session, subject: &TestSubject) {
        let ctx = &self.ctx;
        let registry = &ctx.clients.registry;
        let id = &subject.device.id;

        let Some(current) = ctx
            .call(
                Operation::DeviceRepoRequest,
                "Reading device",
                registry.read_device(session, id),
            )
            .await
        else {
            return;
        };

        let renamed = Device {
            name: timestamp_name("canary"),
            ..current
        };
        if ctx
            .call(
                Operation::DeviceMetaUpdate,
                "Updating device",
                registry.update_device(session, &renamed),
            )
            .await
            .is_none()
        {
            return;
        }
        debug!(name = %renamed.name, "Renamed device");

        ctx.change_guarantee().await;

        let Some(stored) = ctx
            .call(
                Operation::DeviceRepoRequest,
                "Reading device",
                registry.read_device(session, id),
            )
            .await
        else {
            return;
        };
        if stored.name != renamed.name {
            warn!(expected = %renamed.name, actual = %stored.name, "Device repository returned a stale name");
            ctx.metrics.unexpected(Unexpected::DeviceRepoMetadata);
        }

        let Some(indexed) = ctx
            .call(
                Operation::PermissionsRequest,
                "Listing devices in the permission index",
                ctx.clients
                    .permissions
                    .list_devices(session, std::slice::from_ref(id)),
            )
            .await
        else {
            return;
        };
        let Some(indexed) = indexed.into_iter().next() else {
            error!("Permission index returned no device");
            ctx.metrics.uncategorized();
            return;
        };
        if indexed.name != renamed.name {
            warn!(expected = %renamed.name, actual = %indexed.name, "Permission index returned a stale name");
            ctx.metrics.unexpected(Unexpected::PermissionsMetadata);
        }
    }
}
