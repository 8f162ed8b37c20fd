//! In-process reference store with per-entity atomic read-modify-write.
//!
//! `MemoryStore` stands in for the durable record store the engine is
//! deployed against. It provides exactly the two primitives the engine
//! requires, stated at the interface rather than the storage technology:
//!
//! 1. **Atomic single-entity read-modify-write**: `update_order` /
//!    `update_escrow` / `update_dispute` run the caller's
//!    validate-and-mutate closure on a copy under the entity map's write
//!    lock and commit only on success. Two concurrent transitions on the
//!    same entity can never both succeed from the same starting state; the
//!    loser re-observes the committed status and fails its own
//!    precondition check with the precise business error.
//! 2. **Secondary-key queries**: escrow by order, disputes by order and
//!    status set, orders by buyer/seller (newest first).
//!
//! Mutations never hold a lock across anything but the closure itself —
//! cross-entity sequences are deliberately not atomic (the engine's
//! per-entity guards substitute for multi-document transactions).
//!
//! Lock poisoning means a panic happened mid-write on another thread;
//! propagating that panic is the correct behavior for corrupted state.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use holdfast_types::{
    constants, AuditEntry, Dispute, DisputeId, DisputeStatus, EscrowId, EscrowTransaction,
    HoldfastError, Order, OrderId, Result, UserId,
};

use crate::audit_store::{AuditFilter, AuditStore};

/// Escrow records with the 1:1 order index maintained under one lock.
#[derive(Default)]
struct EscrowTable {
    by_id: HashMap<EscrowId, EscrowTransaction>,
    by_order: HashMap<OrderId, EscrowId>,
}

/// In-memory backing store for orders, escrows, disputes, and audit rows.
#[derive(Default)]
pub struct MemoryStore {
    orders: RwLock<HashMap<OrderId, Order>>,
    escrows: RwLock<EscrowTable>,
    disputes: RwLock<HashMap<DisputeId, Dispute>>,
    audit: RwLock<Vec<AuditEntry>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------
    // Orders
    // -----------------------------------------------------------------

    /// Insert a freshly created order.
    ///
    /// # Errors
    /// `Internal` on an id collision (UUIDv7 collisions do not happen in
    /// practice; a collision here means a caller reused an entity).
    pub fn insert_order(&self, order: Order) -> Result<()> {
        let mut orders = self.orders.write().expect("orders lock poisoned");
        if orders.contains_key(&order.id) {
            return Err(HoldfastError::Internal(format!(
                "order {} already exists",
                order.id
            )));
        }
        orders.insert(order.id, order);
        Ok(())
    }

    /// Snapshot of one order.
    pub fn get_order(&self, id: OrderId) -> Result<Order> {
        self.orders
            .read()
            .expect("orders lock poisoned")
            .get(&id)
            .cloned()
            .ok_or(HoldfastError::OrderNotFound(id))
    }

    /// Atomic read-modify-write on one order.
    ///
    /// The closure runs on a copy under the write lock; the copy is
    /// committed (version bumped, `updated_at` refreshed) only if the
    /// closure succeeds. On error nothing is visible to other readers.
    pub fn update_order<R>(
        &self,
        id: OrderId,
        f: impl FnOnce(&mut Order) -> Result<R>,
    ) -> Result<R> {
        let mut orders = self.orders.write().expect("orders lock poisoned");
        let current = orders.get(&id).ok_or(HoldfastError::OrderNotFound(id))?;
        let mut next = current.clone();
        let out = f(&mut next)?;
        next.version = current.version + 1;
        next.updated_at = Utc::now();
        orders.insert(id, next);
        Ok(out)
    }

    /// Orders for a buyer, newest first.
    #[must_use]
    pub fn orders_for_buyer(&self, buyer_id: UserId) -> Vec<Order> {
        let mut hits: Vec<Order> = self
            .orders
            .read()
            .expect("orders lock poisoned")
            .values()
            .filter(|o| o.buyer_id == buyer_id)
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        hits
    }

    /// Orders for a seller, newest first.
    #[must_use]
    pub fn orders_for_seller(&self, seller_id: UserId) -> Vec<Order> {
        let mut hits: Vec<Order> = self
            .orders
            .read()
            .expect("orders lock poisoned")
            .values()
            .filter(|o| o.seller_id == seller_id)
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        hits
    }

    // -----------------------------------------------------------------
    // Escrow transactions
    // -----------------------------------------------------------------

    /// Insert a new escrow transaction, enforcing the 1:1 order invariant.
    ///
    /// # Errors
    /// `EscrowExists` if the order already has an escrow record — the
    /// uniqueness check and the insert happen under one write guard, so a
    /// racing second `create` for the same order loses here.
    pub fn insert_escrow(&self, tx: EscrowTransaction) -> Result<()> {
        let mut table = self.escrows.write().expect("escrows lock poisoned");
        if table.by_order.contains_key(&tx.order_id) {
            return Err(HoldfastError::EscrowExists {
                order_id: tx.order_id,
            });
        }
        table.by_order.insert(tx.order_id, tx.id);
        table.by_id.insert(tx.id, tx);
        Ok(())
    }

    /// Snapshot of one escrow transaction.
    pub fn get_escrow(&self, id: EscrowId) -> Result<EscrowTransaction> {
        self.escrows
            .read()
            .expect("escrows lock poisoned")
            .by_id
            .get(&id)
            .cloned()
            .ok_or(HoldfastError::EscrowNotFound(id))
    }

    /// The escrow transaction for an order, if payment has cleared.
    #[must_use]
    pub fn escrow_for_order(&self, order_id: OrderId) -> Option<EscrowTransaction> {
        let table = self.escrows.read().expect("escrows lock poisoned");
        table
            .by_order
            .get(&order_id)
            .and_then(|id| table.by_id.get(id))
            .cloned()
    }

    /// Atomic read-modify-write on one escrow transaction.
    pub fn update_escrow<R>(
        &self,
        id: EscrowId,
        f: impl FnOnce(&mut EscrowTransaction) -> Result<R>,
    ) -> Result<R> {
        let mut table = self.escrows.write().expect("escrows lock poisoned");
        let current = table.by_id.get(&id).ok_or(HoldfastError::EscrowNotFound(id))?;
        let mut next = current.clone();
        let out = f(&mut next)?;
        next.version = current.version + 1;
        table.by_id.insert(id, next);
        Ok(out)
    }

    // -----------------------------------------------------------------
    // Disputes
    // -----------------------------------------------------------------

    /// Insert a freshly opened dispute.
    pub fn insert_dispute(&self, dispute: Dispute) -> Result<()> {
        let mut disputes = self.disputes.write().expect("disputes lock poisoned");
        if disputes.contains_key(&dispute.id) {
            return Err(HoldfastError::Internal(format!(
                "dispute {} already exists",
                dispute.id
            )));
        }
        disputes.insert(dispute.id, dispute);
        Ok(())
    }

    /// Snapshot of one dispute.
    pub fn get_dispute(&self, id: DisputeId) -> Result<Dispute> {
        self.disputes
            .read()
            .expect("disputes lock poisoned")
            .get(&id)
            .cloned()
            .ok_or(HoldfastError::DisputeNotFound(id))
    }

    /// Atomic read-modify-write on one dispute.
    pub fn update_dispute<R>(
        &self,
        id: DisputeId,
        f: impl FnOnce(&mut Dispute) -> Result<R>,
    ) -> Result<R> {
        let mut disputes = self.disputes.write().expect("disputes lock poisoned");
        let current = disputes.get(&id).ok_or(HoldfastError::DisputeNotFound(id))?;
        let mut next = current.clone();
        let out = f(&mut next)?;
        next.version = current.version + 1;
        disputes.insert(id, next);
        Ok(out)
    }

    /// Disputes for an order whose status is in `statuses` (empty = all),
    /// newest first.
    #[must_use]
    pub fn disputes_for_order(
        &self,
        order_id: OrderId,
        statuses: &[DisputeStatus],
    ) -> Vec<Dispute> {
        let mut hits: Vec<Dispute> = self
            .disputes
            .read()
            .expect("disputes lock poisoned")
            .values()
            .filter(|d| d.order_id == order_id)
            .filter(|d| statuses.is_empty() || statuses.contains(&d.status))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        hits
    }

    /// Whether any OPEN or UNDER_REVIEW dispute exists for the order.
    #[must_use]
    pub fn has_active_dispute(&self, order_id: OrderId) -> bool {
        self.disputes
            .read()
            .expect("disputes lock poisoned")
            .values()
            .any(|d| d.order_id == order_id && d.is_active())
    }

    /// Number of audit rows written so far.
    #[must_use]
    pub fn audit_len(&self) -> usize {
        self.audit.read().expect("audit lock poisoned").len()
    }
}

impl AuditStore for MemoryStore {
    fn append(&self, entry: AuditEntry) -> Result<()> {
        self.audit.write().expect("audit lock poisoned").push(entry);
        Ok(())
    }

    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>> {
        let limit = filter
            .limit
            .unwrap_or(constants::DEFAULT_AUDIT_QUERY_LIMIT)
            .min(constants::MAX_AUDIT_QUERY_LIMIT);
        let audit = self.audit.read().expect("audit lock poisoned");
        let mut hits: Vec<AuditEntry> = audit.iter().filter(|e| filter.matches(e)).cloned().collect();
        hits.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        hits.truncate(limit);
        Ok(hits)
    }
}
