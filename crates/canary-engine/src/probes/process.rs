//! Process probe: deploy the canary process against the device, run one
//! instance and check that it completed and reached the device.

use std::sync::Arc;

use async_trait::async_trait;
use canary_metrics::{Operation, Unexpected};
use canary_types::{Session, TestSubject, CANARY_TASK_BPMN_ID};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use super::{Probe, ProbeKind, ProcessRunState};
use crate::context::ProbeContext;

/// Open while the process probe runs. Closes when dropped.
#[derive(Debug)]
pub struct ProcessWindow {
    tx: watch::Sender<bool>,
}

impl ProcessWindow {
    pub fn close(&self) {
        self.tx.send_replace(true);
    }
}

impl Drop for ProcessWindow {
    fn drop(&mut self) {
        self.close();
    }
}

/// Waits for the matching [`ProcessWindow`] to close
#[derive(Debug, Clone)]
pub struct ProcessWindowClosed {
    rx: watch::Receiver<bool>,
}

impl ProcessWindowClosed {
    /// A window that is already closed
    pub fn closed() -> Self {
        let (_tx, rx) = watch::channel(true);
        Self { rx }
    }

    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        // A dropped window counts as closed as well.
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

/// Open a process window
pub fn process_window() -> (ProcessWindow, ProcessWindowClosed) {
    let (tx, rx) = watch::channel(false);
    (ProcessWindow { tx }, ProcessWindowClosed { rx })
}

struct CloseOnDrop<'a>(&'a ProcessWindow);

impl Drop for CloseOnDrop<'_> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Deploys and runs the canary process.
///
/// The command counter is shared with the connection probe, which reports
/// every command the device receives.
pub struct ProcessProbe {
    ctx: ProbeContext,
    commands: Arc<ProcessRunState>,
    window: ProcessWindow,
}

impl ProcessProbe {
    pub fn new(ctx: ProbeContext, commands: Arc<ProcessRunState>, window: ProcessWindow) -> Self {
        Self {
            ctx,
            commands,
            window,
        }
    }

    /// Remove leftovers, deploy and start one instance.
    /// Returns `None` when no instance was started.
    async fn startup(&self, session: &Session, subject: &TestSubject) -> Option<()> {
        let ctx = &self.ctx;
        let process = &ctx.clients.process;
        self.commands.reset();

        let leftovers = ctx
            .call(
                Operation::ProcessRequest,
                "Listing process deployments",
                process.list_deployments(session),
            )
            .await?;
        for id in &leftovers {
            debug!(deployment_id = %id, "Removing leftover deployment");
            ctx.call(
                Operation::ProcessRequest,
                "Deleting process deployment",
                process.delete_deployment(session, id),
            )
            .await?;
        }

        let device_type = ctx
            .call(
                Operation::DeviceRepoRequest,
                "Reading device type",
                ctx.clients
                    .registry
                    .read_device_type(session, &subject.device.device_type_id),
            )
            .await?;
        let Some(service_id) = device_type.sensor_service_id() else {
            error!(device_type_id = %device_type.id, "Device type has no sensor service");
            ctx.metrics.uncategorized();
            return None;
        };

        if let Some(prepared) = ctx
            .call(
                Operation::ProcessPreparedDeployment,
                "Reading prepared deployment",
                process.prepared_deployment(session),
            )
            .await
        {
            if !prepared.offers_device(CANARY_TASK_BPMN_ID, &subject.device.id) {
                warn!(device_id = %subject.device.id, "Device not selectable for canary task");
                ctx.metrics
                    .unexpected(Unexpected::ProcessPreparedDeploymentSelectables);
            }
            if !prepared.offers_service(CANARY_TASK_BPMN_ID, service_id) {
                warn!(service_id = %service_id, "Service not selectable for canary task");
                ctx.metrics
                    .unexpected(Unexpected::ProcessPreparedDeploymentSelectables);
            }
        }

        let deployment_id = ctx
            .call(
                Operation::ProcessDeployment,
                "Deploying canary process",
                process.deploy(session, &subject.device.id, service_id),
            )
            .await?;
        debug!(deployment_id = %deployment_id, "Deployed canary process");

        ctx.change_guarantee().await;

        ctx.call(
            Operation::ProcessStart,
            "Starting process instance",
            process.start_instance(session, &deployment_id),
        )
        .await?;
        info!(deployment_id = %deployment_id, "Started process instance");
        Some(())
    }

    /// Check the run, remove the deployment and check the command counter
    async fn teardown(&self, session: &Session) {
        let ctx = &self.ctx;
        let process = &ctx.clients.process;

        let Some(deployments) = ctx
            .call(
                Operation::ProcessRequest,
                "Listing process deployments",
                process.list_deployments(session),
            )
            .await
        else {
            return;
        };
        if deployments.len() != 1 {
            error!(count = deployments.len(), "Expected exactly one canary deployment");
            ctx.metrics.uncategorized();
        }

        if let Some(instances) = ctx
            .call(
                Operation::ProcessRequest,
                "Listing process instances",
                process.list_instances(session),
            )
            .await
        {
            match instances.as_slice() {
                [instance] if instance.is_completed() => {
                    ctx.metrics
                        .set_process_instance_duration_ms(instance.duration_in_millis as f64);
                }
                [instance] => {
                    warn!(instance_id = %instance.id, state = %instance.state, "Process instance not completed");
                    ctx.metrics.unexpected(Unexpected::ProcessInstanceState);
                }
                _ => {
                    error!(count = instances.len(), "Expected exactly one process instance");
                    ctx.metrics.uncategorized();
                }
            }
        }

        for id in &deployments {
            if ctx
                .call(
                    Operation::ProcessRequest,
                    "Deleting process deployment",
                    process.delete_deployment(session, id),
                )
                .await
                .is_none()
            {
                return;
            }
        }

        if self.commands.received() == 0 {
            warn!("No command reached the canary device");
            ctx.metrics.unexpected(Unexpected::ProcessCommandCount);
        }
    }
}

#[async_trait]
impl Probe for ProcessProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Process
    }

    #[instrument(skip_all, fields(probe = "process", device_id = %subject.device.id))]
    async fn run(&self, session: &Session, subject: &TestSubject) {
        let _window = CloseOnDrop(&self.window);
        if self.startup(session, subject).await.is_some() {
            self.ctx.change_guarantee().await;
            self.teardown(session).await;
        }
        debug!("Process probe finished");
    }
}
