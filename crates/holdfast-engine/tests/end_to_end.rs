//! End-to-end integration tests across the whole transaction plane.
//!
//! These tests exercise the full money path:
//! payment cleared -> escrow custody -> fulfillment -> either buyer
//! confirmation (release) or dispute adjudication (release / refund).
//!
//! They verify that the components hold the cross-entity invariants in
//! realistic scenarios: the dispute link, at-most-once payout, single
//! active dispute per order, and a complete audit trail.

use std::sync::Arc;

use rust_decimal::Decimal;

use holdfast_engine::{AdvanceOpts, Engine};
use holdfast_store::{AuditFilter, RecordingSink};
use holdfast_types::{
    AuditAction, DisputeReason, DisputeStatus, EngineConfig, EscrowId, EscrowStatus,
    HoldfastError, Order, OrderStatus, Principal, Resolution, UserId,
};

const DESCRIPTION: &str =
    "The package arrived two weeks late and the contents do not match the listing photos at all.";

fn ngn(n: i64) -> Decimal {
    Decimal::new(n, 0)
}

/// Route engine logs through the test harness; first caller wins.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Helper: one order with its parties, riding a fresh engine.
struct Market {
    engine: Engine,
    sink: Arc<RecordingSink>,
    buyer: Principal,
    seller: Principal,
    admin: Principal,
    order: Order,
}

impl Market {
    fn new(total: Decimal) -> Self {
        init_tracing();
        let sink = Arc::new(RecordingSink::new());
        let engine = Engine::new(EngineConfig::default(), sink.clone());
        let order = Order::dummy(total);
        engine.store.insert_order(order.clone()).unwrap();
        Self {
            engine,
            sink,
            buyer: Principal::user(order.buyer_id),
            seller: Principal::user(order.seller_id),
            admin: Principal::admin(UserId::new()),
            order,
        }
    }

    /// Payment clears: order paid, escrow created and held.
    fn pay(&self) -> EscrowId {
        let sys = Principal::system();
        self.engine
            .orders
            .advance(
                &sys,
                self.order.id,
                OrderStatus::PaymentReceived,
                AdvanceOpts::default(),
            )
            .unwrap();
        let escrow_id = self
            .engine
            .escrow
            .create(
                &sys,
                self.order.id,
                self.order.buyer_id,
                self.order.seller_id,
                self.order.total_amount,
            )
            .unwrap();
        self.engine.escrow.hold(&sys, escrow_id).unwrap();
        escrow_id
    }

    fn advance(&self, target: OrderStatus) {
        self.engine
            .orders
            .advance(&self.seller, self.order.id, target, AdvanceOpts::default())
            .unwrap();
    }

    fn deliver(&self) -> EscrowId {
        let escrow_id = self.pay();
        self.advance(OrderStatus::Processing);
        self.advance(OrderStatus::Shipped);
        self.advance(OrderStatus::Delivered);
        escrow_id
    }

    fn open_dispute(&self, reason: DisputeReason) -> holdfast_types::DisputeId {
        self.engine
            .disputes
            .open(
                &self.buyer,
                self.order.id,
                reason,
                DESCRIPTION.into(),
                vec!["https://cdn.example/evidence/9.jpg".into()],
            )
            .unwrap()
    }

    fn order_now(&self) -> Order {
        self.engine.store.get_order(self.order.id).unwrap()
    }

    fn escrow_now(&self) -> holdfast_types::EscrowTransaction {
        self.engine.store.escrow_for_order(self.order.id).unwrap()
    }
}

#[test]
fn happy_path_buyer_confirms_and_seller_is_paid() {
    let m = Market::new(ngn(85_000));
    let escrow_id = m.deliver();
    m.engine
        .orders
        .confirm_delivery(&m.buyer, m.order.id)
        .unwrap();

    let order = m.order_now();
    assert_eq!(order.status, OrderStatus::Completed);
    assert!(order.buyer_confirmed);
    assert_eq!(order.dispute_id, None);

    let tx = m.escrow_now();
    assert_eq!(tx.id, escrow_id);
    assert_eq!(tx.status, EscrowStatus::Released);
    assert_eq!(tx.released_by, Some(m.buyer.id));
    assert_eq!(tx.refunded_amount, None);

    // Total is conserved: the frozen amount never changed.
    assert_eq!(tx.amount, ngn(85_000));
}

#[test]
fn dispute_link_holds_across_the_whole_lifecycle() {
    let m = Market::new(ngn(40_000));
    m.deliver();
    assert!(m.order_now().dispute_link_consistent());

    let dispute_id = m.open_dispute(DisputeReason::WrongItem);
    let order = m.order_now();
    assert_eq!(order.status, OrderStatus::Disputed);
    assert_eq!(order.dispute_id, Some(dispute_id));
    assert!(order.dispute_link_consistent());

    m.engine
        .disputes
        .resolve(
            &m.admin,
            dispute_id,
            Resolution::ReleaseSeller,
            "Photos match the listing; buyer claim unsupported.",
            None,
        )
        .unwrap();
    let order = m.order_now();
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.dispute_id, None);
    assert!(order.dispute_link_consistent());
}

#[test]
fn refund_buyer_round_trip_cancels_and_refunds_in_full() {
    let m = Market::new(ngn(120_000));
    m.deliver();
    let dispute_id = m.open_dispute(DisputeReason::FakeProduct);

    let outcome = m
        .engine
        .disputes
        .resolve(
            &m.admin,
            dispute_id,
            Resolution::RefundBuyer,
            "Authentication check failed; item is counterfeit.",
            None,
        )
        .unwrap();

    assert_eq!(outcome.order_status, OrderStatus::Cancelled);
    assert_eq!(outcome.escrow_status, EscrowStatus::Refunded);
    assert_eq!(outcome.refunded_amount, Some(ngn(120_000)));

    assert_eq!(m.order_now().status, OrderStatus::Cancelled);
    let tx = m.escrow_now();
    assert_eq!(tx.status, EscrowStatus::Refunded);
    assert_eq!(tx.refunded_amount, Some(ngn(120_000)));

    let dispute = m.engine.store.get_dispute(dispute_id).unwrap();
    assert_eq!(dispute.status, DisputeStatus::Resolved);
    assert_eq!(dispute.resolution, Some(Resolution::RefundBuyer));
}

#[test]
fn partial_refund_scenario() {
    // The ₦150,000 order resolved with a ₦60,000 refund to the buyer.
    let m = Market::new(ngn(150_000));
    m.deliver();
    let dispute_id = m.open_dispute(DisputeReason::Damaged);

    let outcome = m
        .engine
        .disputes
        .resolve(
            &m.admin,
            dispute_id,
            Resolution::PartialRefund,
            "Two of five items damaged in transit; refunding their value.",
            Some(ngn(60_000)),
        )
        .unwrap();

    assert_eq!(outcome.refunded_amount, Some(ngn(60_000)));
    assert_eq!(outcome.order_status, OrderStatus::Completed);

    let tx = m.escrow_now();
    assert_eq!(tx.status, EscrowStatus::Refunded);
    assert_eq!(tx.refunded_amount, Some(ngn(60_000)));
    assert_eq!(tx.amount, ngn(150_000));

    let dispute = m.engine.store.get_dispute(dispute_id).unwrap();
    assert_eq!(dispute.status, DisputeStatus::Resolved);
    assert_eq!(dispute.refund_amount, Some(ngn(60_000)));
}

#[test]
fn released_escrow_admits_no_further_disposition() {
    let m = Market::new(ngn(30_000));
    let escrow_id = m.deliver();
    m.engine
        .orders
        .confirm_delivery(&m.buyer, m.order.id)
        .unwrap();

    let sys = Principal::system();
    let err = m.engine.escrow.release(&sys, escrow_id).unwrap_err();
    assert!(matches!(
        err,
        HoldfastError::AlreadyFinalized {
            status: EscrowStatus::Released,
        }
    ));
    let err = m
        .engine
        .escrow
        .refund(&sys, escrow_id, ngn(30_000))
        .unwrap_err();
    assert!(matches!(err, HoldfastError::AlreadyFinalized { .. }));
    assert_eq!(m.escrow_now().status, EscrowStatus::Released);
}

#[test]
fn skip_state_advance_rejected_with_status_unchanged() {
    let m = Market::new(ngn(10_000));
    m.pay();

    let err = m
        .engine
        .orders
        .advance(
            &m.seller,
            m.order.id,
            OrderStatus::Delivered,
            AdvanceOpts::default(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        HoldfastError::InvalidTransition {
            from: OrderStatus::PaymentReceived,
            to: OrderStatus::Delivered,
        }
    ));
    assert_eq!(m.order_now().status, OrderStatus::PaymentReceived);
}

#[test]
fn confirm_delivery_before_delivered_rejected() {
    let m = Market::new(ngn(10_000));
    m.pay();
    m.advance(OrderStatus::Processing);
    m.advance(OrderStatus::Shipped);

    let err = m
        .engine
        .orders
        .confirm_delivery(&m.buyer, m.order.id)
        .unwrap_err();
    assert!(matches!(
        err,
        HoldfastError::ConfirmBeforeDelivery {
            status: OrderStatus::Shipped,
        }
    ));
    assert_eq!(m.escrow_now().status, EscrowStatus::Held);
}

#[test]
fn non_buyer_cannot_open_dispute_and_nothing_is_written() {
    let m = Market::new(ngn(25_000));
    m.deliver();
    let audit_before = m.engine.store.audit_len();

    let outsider = Principal::user(UserId::new());
    for principal in [&outsider, &m.seller] {
        let err = m
            .engine
            .disputes
            .open(
                principal,
                m.order.id,
                DisputeReason::NotReceived,
                DESCRIPTION.into(),
                vec![],
            )
            .unwrap_err();
        assert!(matches!(err, HoldfastError::Unauthorized { .. }));
    }

    assert!(m
        .engine
        .disputes
        .disputes_for_order(&m.buyer, m.order.id, &[])
        .unwrap()
        .is_empty());
    assert_eq!(m.order_now().status, OrderStatus::Delivered);
    assert_eq!(m.engine.store.audit_len(), audit_before);
}

#[test]
fn one_active_dispute_per_order() {
    let m = Market::new(ngn(55_000));
    m.deliver();
    let first = m.open_dispute(DisputeReason::Damaged);

    let err = m
        .engine
        .disputes
        .open(
            &m.buyer,
            m.order.id,
            DisputeReason::Other,
            DESCRIPTION.into(),
            vec![],
        )
        .unwrap_err();
    assert!(matches!(err, HoldfastError::DuplicateDispute { .. }));

    // After resolution and archival the order is terminal, so a new
    // filing fails on state rather than on conflict.
    m.engine
        .disputes
        .resolve(
            &m.admin,
            first,
            Resolution::ReleaseSeller,
            "No evidence of damage provided.",
            None,
        )
        .unwrap();
    m.engine.disputes.close(&m.admin, first).unwrap();
    let err = m
        .engine
        .disputes
        .open(
            &m.buyer,
            m.order.id,
            DisputeReason::Other,
            DESCRIPTION.into(),
            vec![],
        )
        .unwrap_err();
    assert!(matches!(
        err,
        HoldfastError::OrderNotDisputable {
            status: OrderStatus::Completed,
        }
    ));
}

#[test]
fn audit_trail_covers_every_mutation_and_is_admin_gated() {
    let m = Market::new(ngn(70_000));
    m.deliver();
    let dispute_id = m.open_dispute(DisputeReason::NotReceived);
    m.engine
        .disputes
        .resolve(
            &m.admin,
            dispute_id,
            Resolution::RefundBuyer,
            "Carrier confirms the parcel was lost.",
            None,
        )
        .unwrap();

    let all = m
        .engine
        .audit
        .query(&m.admin, &AuditFilter::default())
        .unwrap();
    let actions: Vec<AuditAction> = all.iter().map(|e| e.action).collect();
    for expected in [
        AuditAction::EscrowCreated,
        AuditAction::EscrowHeld,
        AuditAction::EscrowDisputed,
        AuditAction::EscrowRefunded,
        AuditAction::DisputeOpened,
        AuditAction::DisputeResolved,
        AuditAction::OrderStatusChanged,
    ] {
        assert!(actions.contains(&expected), "missing {expected}");
    }
    for entry in &all {
        assert!(entry.verify_hash());
    }

    let err = m
        .engine
        .audit
        .query(&m.buyer, &AuditFilter::default())
        .unwrap_err();
    assert!(matches!(err, HoldfastError::AdminRequired));

    // Filtering by action narrows correctly.
    let refunds = m
        .engine
        .audit
        .query(
            &m.admin,
            &AuditFilter {
                action: Some(AuditAction::EscrowRefunded),
                ..AuditFilter::default()
            },
        )
        .unwrap();
    assert_eq!(refunds.len(), 1);
}

#[test]
fn domain_events_are_emitted_along_the_happy_path() {
    let m = Market::new(ngn(45_000));
    m.deliver();
    m.engine
        .orders
        .confirm_delivery(&m.buyer, m.order.id)
        .unwrap();

    let events = m.sink.events();
    use holdfast_store::DomainEvent;
    assert!(events
        .iter()
        .any(|e| matches!(e, DomainEvent::EscrowCreated { amount, .. } if *amount == ngn(45_000))));
    assert!(events
        .iter()
        .any(|e| matches!(e, DomainEvent::EscrowReleased { approved_by, .. } if *approved_by == m.buyer.id)));
    assert!(events.iter().any(|e| matches!(
        e,
        DomainEvent::OrderStatusChanged {
            from: OrderStatus::Delivered,
            to: OrderStatus::Completed,
            ..
        }
    )));
}
