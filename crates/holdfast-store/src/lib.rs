//! # holdfast-store
//!
//! The record-store seam of the holdfast engine, plus an in-process
//! reference implementation.
//!
//! ## Architecture
//!
//! The engine requires exactly three things of its storage, all specified
//! here at the interface:
//!
//! 1. **Atomic single-entity read-modify-write** with an optimistic version
//!    token — [`MemoryStore::update_order`] and friends. Cross-entity
//!    multi-document transactions are deliberately *not* required; each
//!    entity's own precondition guard substitutes for them.
//! 2. **Secondary-key queries** — escrow by order, disputes by
//!    (order, status set), orders by buyer/seller, audit rows by filter.
//! 3. **Append-only audit storage** — the [`AuditStore`] trait; append
//!    failures are reportable, never fatal to the business transition.
//!
//! [`NotificationSink`] is the fire-and-forget outbound half: domain events
//! for mailers and exporters, never blocking, never rolling anything back.

pub mod audit_store;
pub mod memory;
pub mod sink;

pub use audit_store::{AuditFilter, AuditStore};
pub use memory::MemoryStore;
pub use sink::{DomainEvent, NotificationSink, RecordingSink, TracingSink};
