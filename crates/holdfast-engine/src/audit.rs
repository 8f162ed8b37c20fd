//! Audit trail — best-effort, append-only recorder of every mutation.
//!
//! Audit is observational, not transactional, with respect to business
//! state: a failed append is logged and reported to the notification sink,
//! and the state transition that triggered it stands. Losing an audit row
//! is recoverable (it can be backfilled from the event stream); losing
//! business-state consistency is not.

use std::sync::Arc;

use uuid::Uuid;

use holdfast_store::{AuditFilter, AuditStore, DomainEvent, NotificationSink};
use holdfast_types::{AuditAction, AuditEntry, Principal, ResourceKind, Result, UserId};

use crate::guard;

/// Shared handle for appending and querying audit rows.
#[derive(Clone)]
pub struct AuditTrail {
    store: Arc<dyn AuditStore>,
    sink: Arc<dyn NotificationSink>,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn AuditStore>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { store, sink }
    }

    /// Append one row. Never fails the caller's operation: on a store
    /// error the failure is logged and pushed to the sink for backfill.
    pub fn record(
        &self,
        actor_id: UserId,
        action: AuditAction,
        resource_kind: ResourceKind,
        resource_id: Uuid,
        metadata: serde_json::Value,
    ) {
        let entry = AuditEntry::new(actor_id, action, resource_kind, resource_id, metadata);
        let hash = entry.hash_hex();
        match self.store.append(entry) {
            Ok(()) => tracing::debug!(
                actor = %actor_id,
                action = %action,
                resource = %resource_id,
                hash = %hash,
                "Audit entry recorded"
            ),
            Err(err) => {
                tracing::warn!(
                    actor = %actor_id,
                    action = %action,
                    resource = %resource_id,
                    error = %err,
                    "Audit append failed; business transition stands"
                );
                self.sink.notify(DomainEvent::AuditWriteFailed {
                    action: action.to_string(),
                    error: err.to_string(),
                });
            }
        }
    }

    /// Admin-only query over the trail, newest first.
    pub fn query(&self, principal: &Principal, filter: &AuditFilter) -> Result<Vec<AuditEntry>> {
        guard::require_admin(principal)?;
        self.store.query(filter)
    }
}
