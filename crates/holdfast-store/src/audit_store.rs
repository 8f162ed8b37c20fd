//! The audit-trail storage seam.
//!
//! Audit rows are append-only. The trait exists so the engine can treat a
//! failing audit backend as a reportable-but-non-fatal condition, and so
//! tests can substitute a backend that fails on demand.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use holdfast_types::{AuditAction, AuditEntry, Result, UserId};

/// Filters for an audit-log query. All fields are conjunctive; `None`
/// matches everything.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub actor_id: Option<UserId>,
    pub action: Option<AuditAction>,
    pub resource_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Row cap; the store clamps this to its hard limit.
    pub limit: Option<usize>,
}

impl AuditFilter {
    /// Whether an entry passes every set filter.
    #[must_use]
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(actor) = self.actor_id {
            if entry.actor_id != actor {
                return false;
            }
        }
        if let Some(action) = self.action {
            if entry.action != action {
                return false;
            }
        }
        if let Some(resource) = self.resource_id {
            if entry.resource_id != resource {
                return false;
            }
        }
        if let Some(from) = self.from {
            if entry.recorded_at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if entry.recorded_at > to {
                return false;
            }
        }
        true
    }
}

/// Append-only audit storage. No update or delete is offered.
pub trait AuditStore: Send + Sync {
    /// Append one entry. A failure here must never roll back the business
    /// transition that triggered it — the engine reports it and moves on.
    fn append(&self, entry: AuditEntry) -> Result<()>;

    /// Query entries newest-first, capped at the filter limit.
    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>>;
}
