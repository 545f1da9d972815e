//! Supervisor event logging.

/// Log a supervisor event.
pub fn log(label: &str, event: supervisor::SupervisorEvent) {
    match event {
        supervisor::SupervisorEvent::Connecting { attempt } => {
            tracing::debug!(mailbox = %label, attempt, "connecting");
        }
        supervisor::SupervisorEvent::Connected { started_at } => {
            tracing::info!(mailbox = %label, %started_at, "connected");
        }
        supervisor::SupervisorEvent::Drained { report } => {
            if report == Default::default() {
                tracing::debug!(mailbox = %label, "no unseen messages");
            } else {
                tracing::info!(
                    mailbox = %label,
                    delivered = report.delivered,
                    sink_failed = report.sink_failed,
                    unparsable = report.unparsable,
                    refused = report.refused,
                    stalled = report.stalled,
                    vanished = report.vanished,
                    "drained unseen messages"
                );
            }
        }
        supervisor::SupervisorEvent::Renewing { live_for } => {
            tracing::info!(mailbox = %label, ?live_for, "renewing session");
        }
        supervisor::SupervisorEvent::Recovering {
            failure,
            next_retry_in,
        } => {
            tracing::warn!(
                mailbox = %label,
                failure_kind = %failure.kind(),
                error = %failure.cause(),
                ?next_retry_in,
                "session failed, reconnecting after cooldown"
            );
        }
        supervisor::SupervisorEvent::Terminated { kind } => {
            tracing::error!(mailbox = %label, failure_kind = %kind, "giving up");
        }
        supervisor::SupervisorEvent::Stopped => {
            tracing::info!(mailbox = %label, "stopped");
        }
    }
}
