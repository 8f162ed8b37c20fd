//! # holdfast-engine
//!
//! **Transaction Plane**: escrow custody, order fulfillment, dispute
//! adjudication, and the audit trail around all of it.
//!
//! ## Architecture
//!
//! 1. **EscrowLedger**: holds buyer funds against an order; the only
//!    component allowed to settle fund disposition (at most one payout)
//! 2. **OrderLifecycle**: walks the order along the fixed fulfillment
//!    graph, with the dispute detour as a crate-internal path
//! 3. **DisputeService**: filing, review, and adjudication; drives the
//!    other two when a resolution lands
//! 4. **AuditTrail**: best-effort append-only record of every mutation
//! 5. **guard**: pure authorization predicates, no I/O
//!
//! ## Money Flow
//!
//! ```text
//! payment cleared → EscrowLedger.create()/hold()
//!   happy path:   buyer confirms delivery → release to seller
//!   contested:    DisputeService.open() → admin resolve()
//!                   → release | refund (full or partial)
//! ```
//!
//! Released and Refunded are mutually exclusive and each settable exactly
//! once; every concurrent second attempt surfaces as a precise business
//! error instead of a double payout.

pub mod audit;
pub mod disputes;
pub mod escrow;
pub mod guard;
pub mod orders;

pub use audit::AuditTrail;
pub use disputes::{DisputeService, ResolutionOutcome};
pub use escrow::EscrowLedger;
pub use orders::{AdvanceOpts, OrderLifecycle};

use std::sync::Arc;

use holdfast_store::{MemoryStore, NotificationSink, TracingSink};
use holdfast_types::EngineConfig;

/// All components wired over one store and one sink.
#[derive(Clone)]
pub struct Engine {
    pub store: Arc<MemoryStore>,
    pub audit: AuditTrail,
    pub escrow: EscrowLedger,
    pub orders: OrderLifecycle,
    pub disputes: DisputeService,
}

impl Engine {
    #[must_use]
    pub fn new(config: EngineConfig, sink: Arc<dyn NotificationSink>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let audit = AuditTrail::new(store.clone(), sink.clone());
        let escrow = EscrowLedger::new(store.clone(), audit.clone(), sink.clone());
        let orders = OrderLifecycle::new(store.clone(), escrow.clone(), audit.clone(), sink.clone());
        let disputes = DisputeService::new(
            store.clone(),
            orders.clone(),
            escrow.clone(),
            audit.clone(),
            sink,
            config,
        );
        Self {
            store,
            audit,
            escrow,
            orders,
            disputes,
        }
    }

    /// Defaults with events going to the tracing subscriber.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default(), Arc::new(TracingSink))
    }
}
