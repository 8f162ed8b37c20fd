//! Append-only audit log types.
//!
//! Every mutation in the engine appends one [`AuditEntry`] before the
//! operation reports success. Entries are write-once: no update or delete
//! operation exists anywhere in the crate. Each entry carries a SHA-256
//! hash over its canonical byte encoding so the trail is tamper-evident.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{AuditEntryId, UserId};

/// What kind of mutation an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditAction {
    EscrowCreated,
    EscrowHeld,
    EscrowReleased,
    EscrowDisputed,
    EscrowRefunded,
    OrderStatusChanged,
    OrderCancelled,
    DeliveryConfirmed,
    DisputeOpened,
    DisputeReviewStarted,
    DisputeResolved,
    DisputeClosed,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EscrowCreated => write!(f, "ESCROW_CREATED"),
            Self::EscrowHeld => write!(f, "ESCROW_HELD"),
            Self::EscrowReleased => write!(f, "ESCROW_RELEASED"),
            Self::EscrowDisputed => write!(f, "ESCROW_DISPUTED"),
            Self::EscrowRefunded => write!(f, "ESCROW_REFUNDED"),
            Self::OrderStatusChanged => write!(f, "ORDER_STATUS_CHANGED"),
            Self::OrderCancelled => write!(f, "ORDER_CANCELLED"),
            Self::DeliveryConfirmed => write!(f, "DELIVERY_CONFIRMED"),
            Self::DisputeOpened => write!(f, "DISPUTE_OPENED"),
            Self::DisputeReviewStarted => write!(f, "DISPUTE_REVIEW_STARTED"),
            Self::DisputeResolved => write!(f, "DISPUTE_RESOLVED"),
            Self::DisputeClosed => write!(f, "DISPUTE_CLOSED"),
        }
    }
}

/// Which entity kind an entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Order,
    Escrow,
    Dispute,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Order => write!(f, "ORDER"),
            Self::Escrow => write!(f, "ESCROW"),
            Self::Dispute => write!(f, "DISPUTE"),
        }
    }
}

/// One immutable audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub actor_id: UserId,
    pub action: AuditAction,
    pub resource_kind: ResourceKind,
    /// The raw UUID of the affected entity.
    pub resource_id: Uuid,
    /// Small structured payload (amounts, prior/next status, notes).
    pub metadata: serde_json::Value,
    /// SHA-256 over the canonical encoding of the fields above.
    pub payload_hash: [u8; 32],
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Build an entry, computing the payload hash over the canonical
    /// encoding.
    #[must_use]
    pub fn new(
        actor_id: UserId,
        action: AuditAction,
        resource_kind: ResourceKind,
        resource_id: Uuid,
        metadata: serde_json::Value,
    ) -> Self {
        let id = AuditEntryId::new();
        let recorded_at = Utc::now();
        let payload_hash = Self::compute_hash(id, actor_id, action, resource_kind, resource_id, &metadata);
        Self {
            id,
            actor_id,
            action,
            resource_kind,
            resource_id,
            metadata,
            payload_hash,
            recorded_at,
        }
    }

    /// Canonical hash input:
    /// `"holdfast:audit:v1:" || id || actor || action || kind || resource || metadata-json`.
    fn compute_hash(
        id: AuditEntryId,
        actor_id: UserId,
        action: AuditAction,
        resource_kind: ResourceKind,
        resource_id: Uuid,
        metadata: &serde_json::Value,
    ) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"holdfast:audit:v1:");
        hasher.update(id.0.as_bytes());
        hasher.update(actor_id.0.as_bytes());
        hasher.update(action.to_string().as_bytes());
        hasher.update(resource_kind.to_string().as_bytes());
        hasher.update(resource_id.as_bytes());
        hasher.update(metadata.to_string().as_bytes());
        hasher.finalize().into()
    }

    /// Hex form of the payload hash, for logs and external exports.
    #[must_use]
    pub fn hash_hex(&self) -> String {
        hex::encode(self.payload_hash)
    }

    /// Recompute the hash and compare. False means the entry was altered
    /// after it was written.
    #[must_use]
    pub fn verify_hash(&self) -> bool {
        Self::compute_hash(
            self.id,
            self.actor_id,
            self.action,
            self.resource_kind,
            self.resource_id,
            &self.metadata,
        ) == self.payload_hash
    }
}
