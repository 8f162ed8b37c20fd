//! Dispute adjudication — filing, review, and resolution.
//!
//! Opening a dispute claims the order (the order's atomic DISPUTED
//! transition is the conflict gate, so two concurrent filings can never
//! both attach). Resolution claims the dispute record first, then applies
//! the fund and order effects; a concurrent resolver loses the claim and
//! fails with `AlreadyResolved` before touching any money.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::json;

use holdfast_store::{DomainEvent, MemoryStore, NotificationSink};
use holdfast_types::{
    AuditAction, Dispute, DisputeId, DisputeReason, DisputeStatus, EngineConfig, EscrowStatus,
    HoldfastError, OrderId, OrderStatus, Principal, Resolution, ResourceKind, Result,
};

use crate::audit::AuditTrail;
use crate::escrow::EscrowLedger;
use crate::guard;
use crate::orders::OrderLifecycle;

/// What a successful resolution did, for the caller's records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionOutcome {
    pub dispute_id: DisputeId,
    pub order_id: OrderId,
    pub resolution: Resolution,
    pub escrow_status: EscrowStatus,
    pub order_status: OrderStatus,
    /// Amount returned to the buyer, if any.
    pub refunded_amount: Option<Decimal>,
}

#[derive(Clone)]
pub struct DisputeService {
    store: Arc<MemoryStore>,
    orders: OrderLifecycle,
    escrow: EscrowLedger,
    audit: AuditTrail,
    sink: Arc<dyn NotificationSink>,
    config: EngineConfig,
}

impl DisputeService {
    pub fn new(
        store: Arc<MemoryStore>,
        orders: OrderLifecycle,
        escrow: EscrowLedger,
        audit: AuditTrail,
        sink: Arc<dyn NotificationSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            orders,
            escrow,
            audit,
            sink,
            config,
        }
    }

    /// File a dispute against an order. Buyer only.
    ///
    /// Validation and the active-dispute check run before anything is
    /// written. The definitive conflict check is the order's own DISPUTED
    /// transition: if a racing filing got there first, this one's record
    /// is closed out and the caller sees `DuplicateDispute`.
    pub fn open(
        &self,
        actor: &Principal,
        order_id: OrderId,
        reason: DisputeReason,
        description: String,
        evidence_urls: Vec<String>,
    ) -> Result<DisputeId> {
        let order = self.store.get_order(order_id)?;
        guard::require_buyer(actor, order.buyer_id)?;

        // State before validation: a dispute against a settled order is
        // refused as such even when the filing itself is also malformed.
        if !order.status.is_disputable() {
            return Err(HoldfastError::OrderNotDisputable {
                status: order.status,
            });
        }
        let len = description.chars().count();
        if len < self.config.min_description_chars {
            return Err(HoldfastError::DescriptionTooShort {
                len,
                min: self.config.min_description_chars,
            });
        }
        if evidence_urls.len() > self.config.max_evidence_urls {
            return Err(HoldfastError::TooManyEvidenceUrls {
                count: evidence_urls.len(),
                max: self.config.max_evidence_urls,
            });
        }
        if self.store.has_active_dispute(order_id) {
            return Err(HoldfastError::DuplicateDispute { order_id });
        }
        // Custody must be suspendable before anything is written: an
        // escrow still PENDING (payment recorded, custody not confirmed)
        // cannot take the DISPUTED edge, and finding that out after the
        // order transition would leave a half-attached dispute behind.
        if let Some(tx) = self.store.escrow_for_order(order_id) {
            if !matches!(tx.status, EscrowStatus::Held | EscrowStatus::Disputed) {
                return Err(HoldfastError::InvalidEscrowState {
                    from: tx.status,
                    to: EscrowStatus::Disputed,
                });
            }
        }

        let dispute = Dispute::new(
            order_id,
            order.buyer_id,
            order.seller_id,
            reason,
            description,
            evidence_urls,
        );
        let dispute_id = dispute.id;
        self.store.insert_dispute(dispute)?;

        let prior_status = match self.orders.enter_dispute(actor.id, order_id, dispute_id) {
            Ok(from) => from,
            Err(err) => {
                // Lost the race (or the order moved). The record must not
                // keep blocking future filings, so close it out.
                self.discard_filing(dispute_id);
                return Err(match err {
                    HoldfastError::OrderNotDisputable {
                        status: OrderStatus::Disputed,
                    } => HoldfastError::DuplicateDispute { order_id },
                    other => other,
                });
            }
        };

        if let Some(tx) = self.store.escrow_for_order(order_id) {
            match self.escrow.dispute_by(actor.id, tx.id, reason) {
                Ok(_)
                | Err(HoldfastError::InvalidEscrowState {
                    from: EscrowStatus::Disputed,
                    ..
                }) => {}
                Err(err) => {
                    // Custody could not be suspended (it moved after the
                    // pre-check above). Unwind the order transition and
                    // the record so nothing half-attached stays visible.
                    let _ = self
                        .orders
                        .abort_dispute(actor.id, order_id, dispute_id, prior_status);
                    self.discard_filing(dispute_id);
                    return Err(err);
                }
            }
        }

        tracing::info!(dispute = %dispute_id, order = %order_id, %reason, "Dispute opened");
        self.audit.record(
            actor.id,
            AuditAction::DisputeOpened,
            ResourceKind::Dispute,
            dispute_id.0,
            json!({ "order_id": order_id, "reason": reason.to_string() }),
        );
        self.sink.notify(DomainEvent::DisputeOpened {
            dispute_id,
            order_id,
            reason,
        });
        Ok(dispute_id)
    }

    /// Close out a filing that never fully attached, so it stops counting
    /// as active. Best-effort: the record is ours and freshly inserted.
    fn discard_filing(&self, dispute_id: DisputeId) {
        let _ = self.store.update_dispute(dispute_id, |d| {
            d.status = DisputeStatus::Closed;
            Ok(())
        });
    }

    /// Admin picks the dispute up: `OPEN -> UNDER_REVIEW`.
    pub fn begin_review(&self, actor: &Principal, dispute_id: DisputeId) -> Result<()> {
        guard::require_admin(actor)?;
        let order_id = self.store.update_dispute(dispute_id, |d| {
            if d.status != DisputeStatus::Open {
                return Err(HoldfastError::DisputeNotOpen { status: d.status });
            }
            d.status = DisputeStatus::UnderReview;
            Ok(d.order_id)
        })?;

        self.audit.record(
            actor.id,
            AuditAction::DisputeReviewStarted,
            ResourceKind::Dispute,
            dispute_id.0,
            json!({ "order_id": order_id }),
        );
        Ok(())
    }

    /// Adjudicate. Exactly one of the three dispositions is applied:
    ///
    /// - `RefundBuyer`: full refund, order cancelled.
    /// - `ReleaseSeller`: escrow released, order completed.
    /// - `PartialRefund`: `refund_amount` returned to the buyer, order
    ///   completed with the adjustment.
    ///
    /// The dispute record is claimed RESOLVED before any funds move; a
    /// concurrent resolver fails the claim with `AlreadyResolved` and
    /// applies nothing. The escrow's own at-most-once guard then makes a
    /// double payout impossible even if the claim were somehow bypassed.
    pub fn resolve(
        &self,
        actor: &Principal,
        dispute_id: DisputeId,
        resolution: Resolution,
        admin_notes: &str,
        refund_amount: Option<Decimal>,
    ) -> Result<ResolutionOutcome> {
        guard::require_admin(actor)?;
        if admin_notes.trim().is_empty() {
            return Err(HoldfastError::EmptyAdminNotes);
        }

        let dispute = self.store.get_dispute(dispute_id)?;
        let order_id = dispute.order_id;
        let tx = self
            .store
            .escrow_for_order(order_id)
            .ok_or(HoldfastError::EscrowNotFoundForOrder(order_id))?;

        let partial_amount = match resolution {
            Resolution::PartialRefund => {
                let amount = refund_amount.ok_or(HoldfastError::MissingRefundAmount)?;
                if amount <= Decimal::ZERO || amount > tx.amount {
                    return Err(HoldfastError::RefundOutOfRange {
                        requested: amount,
                        limit: tx.amount,
                    });
                }
                Some(amount)
            }
            Resolution::RefundBuyer | Resolution::ReleaseSeller => None,
        };

        // Claim the record. The loser of a concurrent resolve fails here
        // and never reaches the fund effects below.
        self.store.update_dispute(dispute_id, |d| {
            if !d.status.is_active() {
                return Err(HoldfastError::AlreadyResolved(dispute_id));
            }
            d.status = DisputeStatus::Resolved;
            d.resolution = Some(resolution);
            d.refund_amount = partial_amount;
            d.admin_id = Some(actor.id);
            d.admin_notes = Some(admin_notes.to_owned());
            d.resolved_at = Some(chrono::Utc::now());
            Ok(())
        })?;

        let (escrow_status, order_status, refunded_amount) = match resolution {
            Resolution::RefundBuyer => {
                self.escrow.refund_by(actor.id, tx.id, tx.amount)?;
                self.orders
                    .exit_dispute(actor.id, order_id, OrderStatus::Cancelled)?;
                (
                    EscrowStatus::Refunded,
                    OrderStatus::Cancelled,
                    Some(tx.amount),
                )
            }
            Resolution::ReleaseSeller => {
                self.escrow.release_by(actor.id, tx.id)?;
                self.orders
                    .exit_dispute(actor.id, order_id, OrderStatus::Completed)?;
                (EscrowStatus::Released, OrderStatus::Completed, None)
            }
            Resolution::PartialRefund => {
                // Validated above, always present here.
                let amount = partial_amount.ok_or(HoldfastError::MissingRefundAmount)?;
                self.escrow.refund_by(actor.id, tx.id, amount)?;
                self.orders
                    .exit_dispute(actor.id, order_id, OrderStatus::Completed)?;
                (
                    EscrowStatus::Refunded,
                    OrderStatus::Completed,
                    Some(amount),
                )
            }
        };

        tracing::info!(
            dispute = %dispute_id,
            order = %order_id,
            %resolution,
            admin = %actor.id,
            "Dispute resolved"
        );
        self.audit.record(
            actor.id,
            AuditAction::DisputeResolved,
            ResourceKind::Dispute,
            dispute_id.0,
            json!({
                "order_id": order_id,
                "resolution": resolution.to_string(),
                "refunded_amount": refunded_amount,
            }),
        );
        self.sink.notify(DomainEvent::DisputeResolved {
            dispute_id,
            order_id,
            resolution,
        });

        Ok(ResolutionOutcome {
            dispute_id,
            order_id,
            resolution,
            escrow_status,
            order_status,
            refunded_amount,
        })
    }

    /// Archive a resolved dispute: `RESOLVED -> CLOSED`. No fund effects.
    pub fn close(&self, actor: &Principal, dispute_id: DisputeId) -> Result<()> {
        guard::require_admin(actor)?;
        self.store.update_dispute(dispute_id, |d| {
            if d.status != DisputeStatus::Resolved {
                return Err(HoldfastError::DisputeNotResolved { status: d.status });
            }
            d.status = DisputeStatus::Closed;
            Ok(())
        })?;

        self.audit.record(
            actor.id,
            AuditAction::DisputeClosed,
            ResourceKind::Dispute,
            dispute_id.0,
            json!({}),
        );
        Ok(())
    }

    /// Snapshot for a party to the dispute or an administrator.
    pub fn get(&self, actor: &Principal, dispute_id: DisputeId) -> Result<Dispute> {
        let dispute = self.store.get_dispute(dispute_id)?;
        guard::require_owner_or_admin(actor, dispute.buyer_id, dispute.seller_id)?;
        Ok(dispute)
    }

    /// Disputes attached to an order, optionally filtered by status
    /// (empty slice means all).
    pub fn disputes_for_order(
        &self,
        actor: &Principal,
        order_id: OrderId,
        statuses: &[DisputeStatus],
    ) -> Result<Vec<Dispute>> {
        let order = self.store.get_order(order_id)?;
        guard::require_owner_or_admin(actor, order.buyer_id, order.seller_id)?;
        Ok(self.store.disputes_for_order(order_id, statuses))
    }
}
