//! Fire-and-forget notification sink.
//!
//! The engine emits a [`DomainEvent`] after each externally visible
//! transition (for emailing parties, CSV-exportable audit rows, dashboards).
//! The sink is observational: the engine never blocks on it and a sink
//! failure never rolls back the state transition that produced the event.

use std::sync::Mutex;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use holdfast_types::{
    DisputeId, DisputeReason, EscrowId, OrderId, OrderStatus, Resolution, UserId,
};

/// An externally visible state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainEvent {
    EscrowCreated {
        escrow_id: EscrowId,
        order_id: OrderId,
        amount: Decimal,
    },
    EscrowHeld {
        escrow_id: EscrowId,
        order_id: OrderId,
    },
    EscrowReleased {
        escrow_id: EscrowId,
        order_id: OrderId,
        amount: Decimal,
        approved_by: UserId,
    },
    EscrowRefunded {
        escrow_id: EscrowId,
        order_id: OrderId,
        amount: Decimal,
    },
    OrderStatusChanged {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },
    DisputeOpened {
        dispute_id: DisputeId,
        order_id: OrderId,
        reason: DisputeReason,
    },
    DisputeResolved {
        dispute_id: DisputeId,
        order_id: OrderId,
        resolution: Resolution,
    },
    /// An audit append failed. The business transition stands; this event
    /// is the recovery hook for backfilling the trail.
    AuditWriteFailed {
        action: String,
        error: String,
    },
}

/// Consumer of domain events. Implementations must not block.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: DomainEvent);
}

/// Default sink: structured log lines via `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, event: DomainEvent) {
        match &event {
            DomainEvent::AuditWriteFailed { action, error } => {
                tracing::warn!(action = %action, error = %error, "Audit write failed");
            }
            other => {
                tracing::info!(event = ?other, "Domain event");
            }
        }
    }
}

/// Sink that records every event, for assertions in tests and for simple
/// in-process consumers.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything notified so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().expect("sink mutex poisoned").clone()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, event: DomainEvent) {
        self.events.lock().expect("sink mutex poisoned").push(event);
    }
}
