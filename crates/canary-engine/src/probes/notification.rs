//! Notification probe: send a notification, find it again and clean up.

use async_trait::async_trait;
use canary_metrics::{Operation, Unexpected};
use canary_types::{Session, TestSubject};
use tracing::{debug, instrument, warn};

use super::{Probe, ProbeKind};
use crate::context::ProbeContext;
use crate::setup::timestamp_name;

const TITLE: &str = "Canary-Test-Message";

pub struct NotificationProbe {
    ctx: ProbeContext,
}

impl NotificationProbe {
    pub fn new(ctx: ProbeContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Probe for NotificationProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Notification
    }

    #[instrument(skip_all, fields(probe = "notification"))]
    async fn run(&self, session: &Session, _subject: &TestSubject) {
        let ctx = &self.ctx;
        let notifications = &ctx.clients.notifications;
        let message = timestamp_name("canary-notification");

        if ctx
            .call(
                Operation::NotificationPublish,
                "Sending notification",
                notifications.send(session, TITLE, &message),
            )
            .await
            .is_none()
        {
            return;
        }

        ctx.change_guarantee().await;

        let Some(listed) = ctx
            .call(
                Operation::NotificationRead,
                "Listing notifications",
                notifications.list(session),
            )
            .await
        else {
            return;
        };

        if !listed.iter().any(|n| n.message == message) {
            warn!(message = %message, "Sent notification missing from listing");
            ctx.metrics.unexpected(Unexpected::NotificationState);
        }

        // Remove everything listed, including leftovers of earlier cycles.
        let ids: Vec<String> = listed.into_iter().map(|n| n.id).collect();
        if ids.is_empty() {
            return;
        }
        if ctx
            .call(
                Operation::NotificationDelete,
                "Deleting notifications",
                notifications.delete(session, &ids),
            )
            .await
            .is_some()
        {
            debug!(count = ids.len(), "Deleted notifications");
        }
    }
}
