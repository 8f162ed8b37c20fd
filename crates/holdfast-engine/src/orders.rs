//! Order lifecycle — drives an order along the fixed fulfillment graph.
//!
//! `advance` only walks the forward edges; cancellation, delivery
//! confirmation, and the dispute detour each have a dedicated entry
//! point with its own authorization and preconditions. The edge set
//! itself lives on `OrderStatus::can_advance_to`; this module decides
//! who may pull which edge and what side effects ride along.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use holdfast_store::{DomainEvent, MemoryStore, NotificationSink};
use holdfast_types::{
    AuditAction, DisputeId, HoldfastError, Order, OrderId, OrderStatus, Principal, ResourceKind,
    Result, UserId,
};

use crate::audit::AuditTrail;
use crate::escrow::EscrowLedger;
use crate::guard;

/// Optional payload for `advance`. Tracking details are only accepted
/// while the order is being fulfilled; they are ignored otherwise.
#[derive(Debug, Clone, Default)]
pub struct AdvanceOpts {
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct OrderLifecycle {
    store: Arc<MemoryStore>,
    escrow: EscrowLedger,
    audit: AuditTrail,
    sink: Arc<dyn NotificationSink>,
}

impl OrderLifecycle {
    pub fn new(
        store: Arc<MemoryStore>,
        escrow: EscrowLedger,
        audit: AuditTrail,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            store,
            escrow,
            audit,
            sink,
        }
    }

    /// Move the order one step forward along the fulfillment graph.
    ///
    /// Payment and completion edges belong to the system (payment hooks,
    /// auto-release timer); the fulfillment edges belong to the seller.
    /// Any edge not in the graph, skipped or backward, fails with
    /// `InvalidTransition` and leaves the order untouched.
    pub fn advance(
        &self,
        actor: &Principal,
        order_id: OrderId,
        target: OrderStatus,
        opts: AdvanceOpts,
    ) -> Result<OrderStatus> {
        let order = self.store.get_order(order_id)?;
        match target {
            OrderStatus::PaymentReceived | OrderStatus::Completed => {
                guard::require_system(actor)?;
            }
            OrderStatus::Processing | OrderStatus::Shipped | OrderStatus::Delivered => {
                guard::require_seller_or_system(actor, order.seller_id)?;
            }
            // Cancelled and Disputed have their own entry points;
            // PendingPayment is the start state.
            _ => {
                return Err(HoldfastError::InvalidTransition {
                    from: order.status,
                    to: target,
                });
            }
        }

        let from = self.store.update_order(order_id, |o| {
            if !o.status.can_advance_to(target) {
                return Err(HoldfastError::InvalidTransition {
                    from: o.status,
                    to: target,
                });
            }
            let from = o.status;
            if o.status.tracking_settable() {
                if let Some(tracking) = opts.tracking_number.clone() {
                    o.tracking_number = Some(tracking);
                }
                if let Some(eta) = opts.estimated_delivery {
                    o.estimated_delivery = Some(eta);
                }
            }
            o.status = target;
            Ok(from)
        })?;

        tracing::info!(order = %order_id, %from, to = %target, "Order advanced");
        self.audit.record(
            actor.id,
            AuditAction::OrderStatusChanged,
            ResourceKind::Order,
            order_id.0,
            json!({ "from": from.to_string(), "to": target.to_string() }),
        );
        self.sink.notify(DomainEvent::OrderStatusChanged {
            order_id,
            from,
            to: target,
        });
        Ok(target)
    }

    /// Buyer acknowledges receipt: completes the order and releases the
    /// escrow to the seller in the same call.
    ///
    /// The order's atomic DELIVERED -> COMPLETED step runs first and is
    /// the gate: a dispute that claims the order concurrently makes this
    /// call fail before any payout, and once the order is COMPLETED no
    /// dispute can attach, so the release that follows cannot race an
    /// adjudication. The buyer-path release itself only accepts HELD
    /// custody.
    pub fn confirm_delivery(&self, actor: &Principal, order_id: OrderId) -> Result<()> {
        let order = self.store.get_order(order_id)?;
        guard::require_buyer(actor, order.buyer_id)?;

        let tx = self
            .store
            .escrow_for_order(order_id)
            .ok_or(HoldfastError::EscrowNotFoundForOrder(order_id))?;

        self.store.update_order(order_id, |o| {
            if o.status != OrderStatus::Delivered {
                return Err(HoldfastError::ConfirmBeforeDelivery { status: o.status });
            }
            if o.buyer_confirmed {
                return Err(HoldfastError::AlreadyConfirmed(order_id));
            }
            o.buyer_confirmed = true;
            o.status = OrderStatus::Completed;
            Ok(())
        })?;

        self.escrow.release_from_held(actor.id, tx.id)?;

        tracing::info!(order = %order_id, buyer = %actor.id, "Delivery confirmed, order completed");
        self.audit.record(
            actor.id,
            AuditAction::DeliveryConfirmed,
            ResourceKind::Order,
            order_id.0,
            json!({ "escrow_id": tx.id }),
        );
        self.sink.notify(DomainEvent::OrderStatusChanged {
            order_id,
            from: OrderStatus::Delivered,
            to: OrderStatus::Completed,
        });
        Ok(())
    }

    /// Cancel an order that fulfillment has not started on. Either party
    /// or an admin may cancel; Cancelled is terminal.
    pub fn cancel(&self, actor: &Principal, order_id: OrderId, reason: &str) -> Result<()> {
        let order = self.store.get_order(order_id)?;
        guard::require_owner_or_admin(actor, order.buyer_id, order.seller_id)?;

        let from = self.store.update_order(order_id, |o| {
            if !matches!(
                o.status,
                OrderStatus::PendingPayment | OrderStatus::PaymentReceived
            ) {
                return Err(HoldfastError::OrderNotCancellable { status: o.status });
            }
            let from = o.status;
            o.status = OrderStatus::Cancelled;
            Ok(from)
        })?;

        tracing::info!(order = %order_id, %from, reason, "Order cancelled");
        self.audit.record(
            actor.id,
            AuditAction::OrderCancelled,
            ResourceKind::Order,
            order_id.0,
            json!({ "from": from.to_string(), "reason": reason }),
        );
        self.sink.notify(DomainEvent::OrderStatusChanged {
            order_id,
            from,
            to: OrderStatus::Cancelled,
        });
        Ok(())
    }

    /// Snapshot for a party to the order or an administrator.
    pub fn get(&self, actor: &Principal, order_id: OrderId) -> Result<Order> {
        let order = self.store.get_order(order_id)?;
        guard::require_owner_or_admin(actor, order.buyer_id, order.seller_id)?;
        Ok(order)
    }

    // -----------------------------------------------------------------
    // Dispute detour, driven by the dispute service. Authorization was
    // already decided there; only the state preconditions apply here.
    // -----------------------------------------------------------------

    /// Park the order in DISPUTED and link the dispute. Fails if the
    /// order is terminal, already disputed, or still unpaid.
    pub(crate) fn enter_dispute(
        &self,
        actor_id: UserId,
        order_id: OrderId,
        dispute_id: DisputeId,
    ) -> Result<OrderStatus> {
        let from = self.store.update_order(order_id, |o| {
            if !o.status.is_disputable() {
                return Err(HoldfastError::OrderNotDisputable { status: o.status });
            }
            let from = o.status;
            o.status = OrderStatus::Disputed;
            o.dispute_id = Some(dispute_id);
            Ok(from)
        })?;

        self.audit.record(
            actor_id,
            AuditAction::OrderStatusChanged,
            ResourceKind::Order,
            order_id.0,
            json!({ "from": from.to_string(), "to": "DISPUTED", "dispute_id": dispute_id }),
        );
        self.sink.notify(DomainEvent::OrderStatusChanged {
            order_id,
            from,
            to: OrderStatus::Disputed,
        });
        Ok(from)
    }

    /// Undo a just-entered dispute detour after a downstream step failed:
    /// restore the pre-dispute status and drop the link. Only unwinds the
    /// given dispute; a different claimant is left alone.
    pub(crate) fn abort_dispute(
        &self,
        actor_id: UserId,
        order_id: OrderId,
        dispute_id: DisputeId,
        restore_to: OrderStatus,
    ) -> Result<()> {
        self.store.update_order(order_id, |o| {
            if o.status != OrderStatus::Disputed || o.dispute_id != Some(dispute_id) {
                return Err(HoldfastError::OrderNotDisputed { status: o.status });
            }
            o.status = restore_to;
            o.dispute_id = None;
            Ok(())
        })?;

        self.audit.record(
            actor_id,
            AuditAction::OrderStatusChanged,
            ResourceKind::Order,
            order_id.0,
            json!({
                "from": "DISPUTED",
                "to": restore_to.to_string(),
                "dispute_id": dispute_id,
                "aborted": true,
            }),
        );
        self.sink.notify(DomainEvent::OrderStatusChanged {
            order_id,
            from: OrderStatus::Disputed,
            to: restore_to,
        });
        Ok(())
    }

    /// Leave DISPUTED for the adjudicated final status and unlink the
    /// dispute, restoring the `dispute_id` iff DISPUTED invariant.
    pub(crate) fn exit_dispute(
        &self,
        actor_id: UserId,
        order_id: OrderId,
        final_status: OrderStatus,
    ) -> Result<()> {
        if !matches!(
            final_status,
            OrderStatus::Completed | OrderStatus::Cancelled
        ) {
            return Err(HoldfastError::Internal(format!(
                "dispute exit to non-terminal status {final_status}"
            )));
        }
        let dispute_id = self.store.update_order(order_id, |o| {
            if o.status != OrderStatus::Disputed {
                return Err(HoldfastError::OrderNotDisputed { status: o.status });
            }
            let dispute_id = o.dispute_id.take();
            o.status = final_status;
            Ok(dispute_id)
        })?;

        self.audit.record(
            actor_id,
            AuditAction::OrderStatusChanged,
            ResourceKind::Order,
            order_id.0,
            json!({
                "from": "DISPUTED",
                "to": final_status.to_string(),
                "dispute_id": dispute_id,
            }),
        );
        self.sink.notify(DomainEvent::OrderStatusChanged {
            order_id,
            from: OrderStatus::Disputed,
            to: final_status,
        });
        Ok(())
    }
}
