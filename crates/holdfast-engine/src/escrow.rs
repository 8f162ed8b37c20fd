//! Escrow ledger — the only component allowed to settle fund disposition.
//!
//! Owns the custody state of funds for one order. All mutators run as
//! atomic read-modify-writes against the store, and the entity's own
//! monotonic guards make `RELEASED` and `REFUNDED` mutually exclusive and
//! settable exactly once: any second disposition attempt fails with
//! `AlreadyFinalized` instead of silently succeeding.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::json;

use holdfast_store::{DomainEvent, MemoryStore, NotificationSink};
use holdfast_types::{
    AuditAction, DisputeReason, EscrowId, EscrowStatus, EscrowTransaction, HoldfastError,
    OrderId, Principal, ResourceKind, Result, UserId,
};

use crate::audit::AuditTrail;
use crate::guard;

/// Shared handle over the custody records.
#[derive(Clone)]
pub struct EscrowLedger {
    store: Arc<MemoryStore>,
    audit: AuditTrail,
    sink: Arc<dyn NotificationSink>,
}

impl EscrowLedger {
    pub fn new(
        store: Arc<MemoryStore>,
        audit: AuditTrail,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self { store, audit, sink }
    }

    /// Create the custody record when payment clears (external trigger).
    ///
    /// Idempotent on `order_id`: a second call for the same order fails
    /// with `EscrowExists`. The amount must equal the order total — the
    /// ledger never invents or loses money relative to the order.
    pub fn create(
        &self,
        actor: &Principal,
        order_id: OrderId,
        buyer_id: UserId,
        seller_id: UserId,
        amount: Decimal,
    ) -> Result<EscrowId> {
        guard::require_system_or_admin(actor)?;
        let order = self.store.get_order(order_id)?;
        if amount != order.total_amount {
            return Err(HoldfastError::AmountMismatch {
                expected: order.total_amount,
                actual: amount,
            });
        }
        if buyer_id != order.buyer_id || seller_id != order.seller_id {
            return Err(HoldfastError::Internal(format!(
                "escrow parties do not match order {order_id}"
            )));
        }

        let tx = EscrowTransaction::new(order_id, buyer_id, seller_id, amount);
        let tx_id = tx.id;
        self.store.insert_escrow(tx)?;

        tracing::info!(escrow = %tx_id, order = %order_id, amount = %amount, "Escrow created");
        self.audit.record(
            actor.id,
            AuditAction::EscrowCreated,
            ResourceKind::Escrow,
            tx_id.0,
            json!({ "order_id": order_id, "amount": amount }),
        );
        self.sink.notify(DomainEvent::EscrowCreated {
            escrow_id: tx_id,
            order_id,
            amount,
        });
        Ok(tx_id)
    }

    /// `PENDING → HELD`: custody confirmed.
    pub fn hold(&self, actor: &Principal, escrow_id: EscrowId) -> Result<EscrowStatus> {
        guard::require_system_or_admin(actor)?;
        let order_id = self.store.update_escrow(escrow_id, |tx| {
            tx.mark_held()?;
            Ok(tx.order_id)
        })?;

        self.audit.record(
            actor.id,
            AuditAction::EscrowHeld,
            ResourceKind::Escrow,
            escrow_id.0,
            json!({ "order_id": order_id }),
        );
        self.sink.notify(DomainEvent::EscrowHeld {
            escrow_id,
            order_id,
        });
        Ok(EscrowStatus::Held)
    }

    /// Release custody to the seller. Valid from `HELD` and from
    /// `DISPUTED` (an admin siding with the seller).
    pub fn release(&self, actor: &Principal, escrow_id: EscrowId) -> Result<EscrowStatus> {
        guard::require_system_or_admin(actor)?;
        self.release_by(actor.id, escrow_id)
    }

    /// Suspend custody for dispute adjudication. Valid only from `HELD`.
    pub fn dispute(
        &self,
        actor: &Principal,
        escrow_id: EscrowId,
        reason: DisputeReason,
    ) -> Result<EscrowStatus> {
        guard::require_system_or_admin(actor)?;
        self.dispute_by(actor.id, escrow_id, reason)
    }

    /// Return funds to the buyer, fully or partially. Valid only from
    /// `DISPUTED`; the caller (the dispute resolution) decides the amount.
    pub fn refund(
        &self,
        actor: &Principal,
        escrow_id: EscrowId,
        amount: Decimal,
    ) -> Result<EscrowStatus> {
        guard::require_system_or_admin(actor)?;
        self.refund_by(actor.id, escrow_id, amount)
    }

    /// Snapshot for a party to the escrow or an administrator.
    pub fn get(&self, actor: &Principal, escrow_id: EscrowId) -> Result<EscrowTransaction> {
        let tx = self.store.get_escrow(escrow_id)?;
        guard::require_owner_or_admin(actor, tx.buyer_id, tx.seller_id)?;
        Ok(tx)
    }

    // -----------------------------------------------------------------
    // Crate-internal paths: ownership/role was validated by the caller
    // (delivery confirmation, dispute adjudication); the entity's own
    // state guards still apply in full.
    // -----------------------------------------------------------------

    pub(crate) fn release_by(
        &self,
        approved_by: UserId,
        escrow_id: EscrowId,
    ) -> Result<EscrowStatus> {
        let (order_id, amount) = self.store.update_escrow(escrow_id, |tx| {
            tx.mark_released(approved_by)?;
            Ok((tx.order_id, tx.amount))
        })?;

        self.released(escrow_id, order_id, amount, approved_by);
        Ok(EscrowStatus::Released)
    }

    /// Release on the buyer's delivery confirmation. Unlike the
    /// adjudication path this one never takes the DISPUTED edge: custody
    /// under dispute can only be settled by a resolution. An escrow that
    /// is already RELEASED counts as done so the call stays retry-safe.
    pub(crate) fn release_from_held(
        &self,
        approved_by: UserId,
        escrow_id: EscrowId,
    ) -> Result<EscrowStatus> {
        let applied = self.store.update_escrow(escrow_id, |tx| match tx.status {
            EscrowStatus::Held => {
                tx.mark_released(approved_by)?;
                Ok(Some((tx.order_id, tx.amount)))
            }
            EscrowStatus::Released => Ok(None),
            from => Err(HoldfastError::InvalidEscrowState {
                from,
                to: EscrowStatus::Released,
            }),
        })?;

        if let Some((order_id, amount)) = applied {
            self.released(escrow_id, order_id, amount, approved_by);
        }
        Ok(EscrowStatus::Released)
    }

    fn released(&self, escrow_id: EscrowId, order_id: OrderId, amount: Decimal, approved_by: UserId) {
        tracing::info!(escrow = %escrow_id, order = %order_id, amount = %amount, approved_by = %approved_by, "Escrow released");
        self.audit.record(
            approved_by,
            AuditAction::EscrowReleased,
            ResourceKind::Escrow,
            escrow_id.0,
            json!({ "order_id": order_id, "amount": amount }),
        );
        self.sink.notify(DomainEvent::EscrowReleased {
            escrow_id,
            order_id,
            amount,
            approved_by,
        });
    }

    pub(crate) fn dispute_by(
        &self,
        actor_id: UserId,
        escrow_id: EscrowId,
        reason: DisputeReason,
    ) -> Result<EscrowStatus> {
        let order_id = self.store.update_escrow(escrow_id, |tx| {
            tx.mark_disputed()?;
            Ok(tx.order_id)
        })?;

        tracing::info!(escrow = %escrow_id, order = %order_id, reason = %reason, "Escrow disputed");
        self.audit.record(
            actor_id,
            AuditAction::EscrowDisputed,
            ResourceKind::Escrow,
            escrow_id.0,
            json!({ "order_id": order_id, "reason": reason.to_string() }),
        );
        Ok(EscrowStatus::Disputed)
    }

    pub(crate) fn refund_by(
        &self,
        approved_by: UserId,
        escrow_id: EscrowId,
        amount: Decimal,
    ) -> Result<EscrowStatus> {
        let order_id = self.store.update_escrow(escrow_id, |tx| {
            tx.mark_refunded(amount, approved_by)?;
            Ok(tx.order_id)
        })?;

        tracing::info!(escrow = %escrow_id, order = %order_id, amount = %amount, approved_by = %approved_by, "Escrow refunded");
        self.audit.record(
            approved_by,
            AuditAction::EscrowRefunded,
            ResourceKind::Escrow,
            escrow_id.0,
            json!({ "order_id": order_id, "amount": amount }),
        );
        self.sink.notify(DomainEvent::EscrowRefunded {
            escrow_id,
            order_id,
            amount,
        });
        Ok(EscrowStatus::Refunded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holdfast_store::RecordingSink;
    use holdfast_types::Order;

    fn setup() -> (Arc<MemoryStore>, EscrowLedger, Order) {
        let store = Arc::new(MemoryStore::new());
        let sink: Arc<dyn NotificationSink> = Arc::new(RecordingSink::new());
        let audit = AuditTrail::new(store.clone(), sink.clone());
        let ledger = EscrowLedger::new(store.clone(), audit, sink);
        let order = Order::dummy(Decimal::new(100_000, 0));
        store.insert_order(order.clone()).unwrap();
        (store, ledger, order)
    }

    fn create_escrow(ledger: &EscrowLedger, order: &Order) -> EscrowId {
        ledger
            .create(
                &Principal::system(),
                order.id,
                order.buyer_id,
                order.seller_id,
                order.total_amount,
            )
            .unwrap()
    }

    #[test]
    fn create_requires_system_or_admin() {
        let (_, ledger, order) = setup();
        let err = ledger
            .create(
                &Principal::user(order.buyer_id),
                order.id,
                order.buyer_id,
                order.seller_id,
                order.total_amount,
            )
            .unwrap_err();
        assert!(matches!(err, HoldfastError::Unauthorized { .. }));
    }

    #[test]
    fn create_validates_amount_against_order_total() {
        let (_, ledger, order) = setup();
        let err = ledger
            .create(
                &Principal::system(),
                order.id,
                order.buyer_id,
                order.seller_id,
                Decimal::new(99_999, 0),
            )
            .unwrap_err();
        assert!(matches!(err, HoldfastError::AmountMismatch { .. }));
    }

    #[test]
    fn duplicate_create_fails() {
        let (_, ledger, order) = setup();
        create_escrow(&ledger, &order);
        let err = ledger
            .create(
                &Principal::system(),
                order.id,
                order.buyer_id,
                order.seller_id,
                order.total_amount,
            )
            .unwrap_err();
        assert!(matches!(err, HoldfastError::EscrowExists { .. }));
    }

    #[test]
    fn hold_then_release() {
        let (store, ledger, order) = setup();
        let id = create_escrow(&ledger, &order);
        let admin = Principal::admin(UserId::new());

        assert_eq!(ledger.hold(&Principal::system(), id).unwrap(), EscrowStatus::Held);
        assert_eq!(ledger.release(&admin, id).unwrap(), EscrowStatus::Released);

        let tx = store.get_escrow(id).unwrap();
        assert_eq!(tx.status, EscrowStatus::Released);
        assert_eq!(tx.released_by, Some(admin.id));
        assert!(tx.released_at.is_some());
    }

    #[test]
    fn double_release_blocked() {
        let (_, ledger, order) = setup();
        let id = create_escrow(&ledger, &order);
        let sys = Principal::system();
        ledger.hold(&sys, id).unwrap();
        ledger.release(&sys, id).unwrap();

        let err = ledger.release(&sys, id).unwrap_err();
        assert!(matches!(err, HoldfastError::AlreadyFinalized { .. }));
    }

    #[test]
    fn refund_after_release_blocked() {
        let (_, ledger, order) = setup();
        let id = create_escrow(&ledger, &order);
        let sys = Principal::system();
        ledger.hold(&sys, id).unwrap();
        ledger.release(&sys, id).unwrap();

        let err = ledger
            .refund(&sys, id, Decimal::new(100_000, 0))
            .unwrap_err();
        assert!(matches!(err, HoldfastError::AlreadyFinalized { .. }));
    }

    #[test]
    fn refund_requires_disputed() {
        let (_, ledger, order) = setup();
        let id = create_escrow(&ledger, &order);
        let sys = Principal::system();
        ledger.hold(&sys, id).unwrap();

        let err = ledger
            .refund(&sys, id, Decimal::new(50_000, 0))
            .unwrap_err();
        assert!(matches!(err, HoldfastError::InvalidEscrowState { .. }));
    }

    #[test]
    fn dispute_then_partial_refund() {
        let (store, ledger, order) = setup();
        let id = create_escrow(&ledger, &order);
        let sys = Principal::system();
        ledger.hold(&sys, id).unwrap();
        ledger
            .dispute(&sys, id, DisputeReason::NotReceived)
            .unwrap();
        ledger.refund(&sys, id, Decimal::new(40_000, 0)).unwrap();

        let tx = store.get_escrow(id).unwrap();
        assert_eq!(tx.status, EscrowStatus::Refunded);
        assert_eq!(tx.refunded_amount, Some(Decimal::new(40_000, 0)));
        // Original custody amount is untouched.
        assert_eq!(tx.amount, Decimal::new(100_000, 0));
    }

    #[test]
    fn buyer_path_release_never_touches_disputed_custody() {
        let (store, ledger, order) = setup();
        let id = create_escrow(&ledger, &order);
        let sys = Principal::system();
        ledger.hold(&sys, id).unwrap();
        ledger
            .dispute(&sys, id, DisputeReason::NotReceived)
            .unwrap();

        let err = ledger
            .release_from_held(order.buyer_id, id)
            .unwrap_err();
        assert!(matches!(
            err,
            HoldfastError::InvalidEscrowState {
                from: EscrowStatus::Disputed,
                to: EscrowStatus::Released,
            }
        ));
        assert_eq!(store.get_escrow(id).unwrap().status, EscrowStatus::Disputed);

        // The adjudication path still has the DISPUTED edge.
        assert_eq!(
            ledger.release_by(UserId::new(), id).unwrap(),
            EscrowStatus::Released
        );
    }

    #[test]
    fn get_enforces_ownership() {
        let (_, ledger, order) = setup();
        let id = create_escrow(&ledger, &order);

        assert!(ledger.get(&Principal::user(order.buyer_id), id).is_ok());
        assert!(ledger.get(&Principal::user(order.seller_id), id).is_ok());
        assert!(ledger.get(&Principal::admin(UserId::new()), id).is_ok());
        let err = ledger.get(&Principal::user(UserId::new()), id).unwrap_err();
        assert!(matches!(err, HoldfastError::Unauthorized { .. }));
    }

    #[test]
    fn every_mutation_audited() {
        let (store, ledger, order) = setup();
        let id = create_escrow(&ledger, &order);
        let sys = Principal::system();
        ledger.hold(&sys, id).unwrap();
        ledger.dispute(&sys, id, DisputeReason::Damaged).unwrap();
        ledger.refund(&sys, id, Decimal::new(100_000, 0)).unwrap();

        // create + hold + dispute + refund
        assert_eq!(store.audit_len(), 4);
    }
}
