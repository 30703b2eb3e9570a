//! Best-effort login/logout activity recording

use tracing::warn;

use federa_core::{AuditRepository, AuthActivity};

/// Persist `activity`, logging and swallowing any failure.
pub async fn record_best_effort(audit: &dyn AuditRepository, activity: AuthActivity) {
    if let Err(e) = audit.record(&activity).await {
        warn!(
            action = activity.action.as_str(),
            outcome = %activity.outcome,
            "Failed to record auth activity: {}",
            e
        );
    }
}
