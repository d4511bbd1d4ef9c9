/// Fire-and-forget recompute requests
///
/// Handlers call these after a successful write. The insert runs on its own
/// task so the response never waits on it, and a failure is only logged.

use repute_shared::models::reputation_job::{JobReason, ReputationJob};
use sqlx::PgPool;
use uuid::Uuid;

pub fn enqueue(db: &PgPool, tenant_id: Uuid, user_id: Uuid, reason: JobReason) {
    let db = db.clone();
    tokio::spawn(async move {
        match ReputationJob::enqueue(&db, tenant_id, user_id, reason).await {
            Ok(created) => tracing::debug!(
                tenant_id = %tenant_id,
                user_id = %user_id,
                reason = reason.as_str(),
                created,
                "Reputation recompute requested"
            ),
            Err(e) => tracing::error!(
                tenant_id = %tenant_id,
                user_id = %user_id,
                reason = reason.as_str(),
                error = %e,
                "Failed to enqueue reputation recompute"
            ),
        }
    });
}

/// Requests a recompute for every member of the tenant
pub fn enqueue_tenant(db: &PgPool, tenant_id: Uuid, reason: JobReason) {
    let db = db.clone();
    tokio::spawn(async move {
        match ReputationJob::enqueue_tenant(&db, tenant_id, reason).await {
            Ok(created) => tracing::info!(
                tenant_id = %tenant_id,
                reason = reason.as_str(),
                created,
                "Tenant-wide reputation recompute requested"
            ),
            Err(e) => tracing::error!(
                tenant_id = %tenant_id,
                reason = reason.as_str(),
                error = %e,
                "Failed to enqueue tenant reputation recompute"
            ),
        }
    });
}
