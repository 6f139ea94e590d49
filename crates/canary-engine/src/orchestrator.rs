//! Cycle orchestration: single-flight triggering, setup, concurrent probes.

use std::sync::Arc;

use canary_metrics::{MetricSink, Operation};
use canary_types::{Session, TestSubject};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::context::ProbeContext;
use crate::error::{EngineError, EngineResult};
use crate::probes::{
    process_window, ConnectionProbe, MetadataProbe, NotificationProbe, Probe, ProcessProbe,
    ProcessRunState,
};
use crate::run_guard::RunGuard;
use crate::setup::SetupResolver;

/// Runs test cycles, at most one at a time
#[derive(Debug, Clone)]
pub struct Canary {
    ctx: ProbeContext,
    guard: Arc<RunGuard>,
}

impl Canary {
    pub fn new(ctx: ProbeContext) -> Self {
        Self {
            ctx,
            guard: Arc::new(RunGuard::new()),
        }
    }

    pub fn metrics(&self) -> &Arc<MetricSink> {
        &self.ctx.metrics
    }

    /// Whether a cycle is in progress
    pub fn is_running(&self) -> bool {
        self.guard.is_running()
    }

    /// Start a cycle in the background unless one is already running.
    ///
    /// Never blocks. Returns the cycle's handle when a cycle was started.
    pub fn start_cycle(&self) -> Option<JoinHandle<()>> {
        let Some(permit) = self.guard.acquire() else {
            info!("Canary cycle already running, trigger ignored");
            return None;
        };

        let ctx = self.ctx.clone();
        Some(tokio::spawn(async move {
            let _permit = permit;
            if let Err(err) = run_cycle(&ctx).await {
                error!(error = %err, "Canary cycle aborted");
            }
        }))
    }
}

/// Login, setup, probes, logout
async fn run_cycle(ctx: &ProbeContext) -> EngineResult<()> {
    info!("Starting canary cycle");
    let session = ctx
        .metrics
        .observe(Operation::Auth, ctx.clients.identity.login())
        .await
        .map_err(EngineError::Login)?;
    let session = Arc::new(session);

    let result = match SetupResolver::new(ctx.clone()).resolve(&session).await {
        Ok(subject) => {
            run_probes(ctx, &session, Arc::new(subject)).await;
            Ok(())
        }
        Err(err) => Err(err),
    };

    if let Err(err) = ctx.clients.identity.logout(&session).await {
        warn!(error = %err, "Logout failed");
    }
    info!("Canary cycle finished");
    result
}

/// Run the probe suite concurrently and wait for every probe
async fn run_probes(ctx: &ProbeContext, session: &Arc<Session>, subject: Arc<TestSubject>) {
    let commands = Arc::new(ProcessRunState::new());
    let (window, window_closed) = process_window();

    let probes: Vec<Arc<dyn Probe>> = vec![
        Arc::new(ConnectionProbe::new(
            ctx.clone(),
            commands.clone(),
            window_closed,
        )),
        Arc::new(MetadataProbe::new(ctx.clone())),
        Arc::new(NotificationProbe::new(ctx.clone())),
        Arc::new(ProcessProbe::new(ctx.clone(), commands, window)),
    ];

    let mut tasks = JoinSet::new();
    for probe in probes {
        let session = session.clone();
        let subject = subject.clone();
        tasks.spawn(async move {
            debug!(probe = %probe.name(), "Probe started");
            probe.run(&session, &subject).await;
            probe.kind()
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(kind) => debug!(probe = %kind, "Probe finished"),
            Err(err) if err.is_panic() => {
                error!(error = %err, "Probe panicked");
                ctx.metrics.uncategorized();
            }
            Err(err) => warn!(error = %err, "Probe task cancelled"),
        }
    }
}
