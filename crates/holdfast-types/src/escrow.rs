//! # EscrowTransaction — the custody record
//!
//! One escrow transaction per order, created when payment clears. The
//! status machine is monotonic:
//!
//! ```text
//!   ┌─────────┐      ┌──────┐   release   ┌──────────┐
//!   │ PENDING ├─────▶│ HELD ├────────────▶│ RELEASED │
//!   └─────────┘      └──┬───┘             └──────────┘
//!                       │ dispute              ▲
//!                       ▼                      │ release_seller
//!                  ┌──────────┐                │
//!                  │ DISPUTED ├────────────────┘
//!                  └────┬─────┘
//!                       │ refund
//!                       ▼
//!                  ┌──────────┐
//!                  │ REFUNDED │
//!                  └──────────┘
//! ```
//!
//! `RELEASED` and `REFUNDED` are terminal and mutually exclusive; each is
//! settable exactly once. A second disposition attempt fails with
//! `AlreadyFinalized` rather than silently succeeding — this is the
//! at-most-once-payout guarantee.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{EscrowId, HoldfastError, OrderId, Result, UserId};

/// Custody status of escrowed funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EscrowStatus {
    /// Created; payment recorded but custody not yet confirmed.
    Pending,
    /// Funds are in platform custody against the order.
    Held,
    /// Funds paid out to the seller. **Terminal.**
    Released,
    /// Custody suspended pending dispute adjudication.
    Disputed,
    /// Funds returned to the buyer (fully or partially). **Terminal.**
    Refunded,
}

impl EscrowStatus {
    /// Monotonic edge set: `PENDING → HELD → {RELEASED | DISPUTED →
    /// (RELEASED | REFUNDED)}`.
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Held)
                | (Self::Held, Self::Released | Self::Disputed)
                | (Self::Disputed, Self::Released | Self::Refunded)
        )
    }

    /// The fund disposition is settled; no further mutation succeeds.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        matches!(self, Self::Released | Self::Refunded)
    }
}

impl std::fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Held => write!(f, "HELD"),
            Self::Released => write!(f, "RELEASED"),
            Self::Disputed => write!(f, "DISPUTED"),
            Self::Refunded => write!(f, "REFUNDED"),
        }
    }
}

/// The custody record for one order's funds. `amount` is write-once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowTransaction {
    pub id: EscrowId,
    /// 1:1 with the order; the store enforces uniqueness.
    pub order_id: OrderId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    /// Equals the order total at creation; never changes.
    pub amount: Decimal,
    pub status: EscrowStatus,
    /// Amount actually returned to the buyer; set exactly once, on refund.
    pub refunded_amount: Option<Decimal>,
    /// Who approved the release (admin or the confirming system path).
    pub released_by: Option<UserId>,
    pub held_at: Option<DateTime<Utc>>,
    pub released_at: Option<DateTime<Utc>>,
    pub disputed_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    /// Optimistic-concurrency token, bumped by the store on every write.
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl EscrowTransaction {
    /// New escrow in `PENDING` for the given order.
    #[must_use]
    pub fn new(order_id: OrderId, buyer_id: UserId, seller_id: UserId, amount: Decimal) -> Self {
        Self {
            id: EscrowId::new(),
            order_id,
            buyer_id,
            seller_id,
            amount,
            status: EscrowStatus::Pending,
            refunded_amount: None,
            released_by: None,
            held_at: None,
            released_at: None,
            disputed_at: None,
            refunded_at: None,
            version: 0,
            created_at: Utc::now(),
        }
    }

    fn guard(&self, target: EscrowStatus) -> Result<()> {
        if self.status.is_finalized() {
            return Err(HoldfastError::AlreadyFinalized {
                status: self.status,
            });
        }
        if !self.status.can_transition_to(target) {
            return Err(HoldfastError::InvalidEscrowState {
                from: self.status,
                to: target,
            });
        }
        Ok(())
    }

    /// `PENDING → HELD`. Sets `held_at` the first time it is entered.
    pub fn mark_held(&mut self) -> Result<()> {
        self.guard(EscrowStatus::Held)?;
        self.status = EscrowStatus::Held;
        self.held_at = Some(Utc::now());
        Ok(())
    }

    /// `HELD | DISPUTED → RELEASED`. Terminal; records the approver.
    pub fn mark_released(&mut self, approved_by: UserId) -> Result<()> {
        self.guard(EscrowStatus::Released)?;
        self.status = EscrowStatus::Released;
        self.released_by = Some(approved_by);
        self.released_at = Some(Utc::now());
        Ok(())
    }

    /// `HELD → DISPUTED`. Sets `disputed_at` the first time it is entered.
    pub fn mark_disputed(&mut self) -> Result<()> {
        self.guard(EscrowStatus::Disputed)?;
        self.status = EscrowStatus::Disputed;
        self.disputed_at = Some(Utc::now());
        Ok(())
    }

    /// `DISPUTED → REFUNDED`. Terminal. Supports partial refunds: `amount`
    /// must be positive and no greater than the amount in custody.
    pub fn mark_refunded(&mut self, amount: Decimal, approved_by: UserId) -> Result<()> {
        self.guard(EscrowStatus::Refunded)?;
        if amount <= Decimal::ZERO || amount > self.amount {
            return Err(HoldfastError::RefundExceedsEscrow {
                requested: amount,
                held: self.amount,
            });
        }
        self.status = EscrowStatus::Refunded;
        self.refunded_amount = Some(amount);
        self.released_by = Some(approved_by);
        self.refunded_at = Some(Utc::now());
        Ok(())
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl EscrowTransaction {
    pub fn dummy(amount: Decimal) -> Self {
        Self::new(OrderId::new(), UserId::new(), UserId::new(), amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn held(amount: Decimal) -> EscrowTransaction {
        let mut tx = EscrowTransaction::dummy(amount);
        tx.mark_held().unwrap();
        tx
    }

    #[test]
    fn transition_edges() {
        use EscrowStatus::*;
        assert!(Pending.can_transition_to(Held));
        assert!(Held.can_transition_to(Released));
        assert!(Held.can_transition_to(Disputed));
        assert!(Disputed.can_transition_to(Released));
        assert!(Disputed.can_transition_to(Refunded));
    }

    #[test]
    fn no_backward_or_terminal_edges() {
        use EscrowStatus::*;
        assert!(!Held.can_transition_to(Pending));
        assert!(!Released.can_transition_to(Refunded));
        assert!(!Refunded.can_transition_to(Released));
        assert!(!Pending.can_transition_to(Released));
        assert!(!Pending.can_transition_to(Disputed));
    }

    #[test]
    fn hold_sets_timestamp_once() {
        let tx = held(Decimal::new(50_000, 0));
        assert_eq!(tx.status, EscrowStatus::Held);
        assert!(tx.held_at.is_some());
    }

    #[test]
    fn release_from_held() {
        let mut tx = held(Decimal::new(50_000, 0));
        let admin = UserId::new();
        tx.mark_released(admin).unwrap();
        assert_eq!(tx.status, EscrowStatus::Released);
        assert_eq!(tx.released_by, Some(admin));
        assert!(tx.released_at.is_some());
    }

    #[test]
    fn double_release_fails_already_finalized() {
        let mut tx = held(Decimal::new(50_000, 0));
        tx.mark_released(UserId::new()).unwrap();
        let err = tx.mark_released(UserId::new()).unwrap_err();
        assert!(matches!(err, HoldfastError::AlreadyFinalized { .. }));
    }

    #[test]
    fn released_and_refunded_mutually_exclusive() {
        let mut tx = held(Decimal::new(50_000, 0));
        tx.mark_disputed().unwrap();
        tx.mark_refunded(Decimal::new(50_000, 0), UserId::new())
            .unwrap();
        let err = tx.mark_released(UserId::new()).unwrap_err();
        assert!(matches!(err, HoldfastError::AlreadyFinalized { .. }));
        assert_eq!(tx.refunded_amount, Some(Decimal::new(50_000, 0)));
        assert!(tx.released_at.is_none());
    }

    #[test]
    fn refund_only_from_disputed() {
        let mut tx = held(Decimal::new(50_000, 0));
        let err = tx
            .mark_refunded(Decimal::new(10_000, 0), UserId::new())
            .unwrap_err();
        assert!(matches!(err, HoldfastError::InvalidEscrowState { .. }));
    }

    #[test]
    fn partial_refund_within_bounds() {
        let mut tx = held(Decimal::new(150_000, 0));
        tx.mark_disputed().unwrap();
        tx.mark_refunded(Decimal::new(60_000, 0), UserId::new())
            .unwrap();
        assert_eq!(tx.status, EscrowStatus::Refunded);
        assert_eq!(tx.refunded_amount, Some(Decimal::new(60_000, 0)));
    }

    #[test]
    fn refund_over_held_amount_rejected() {
        let mut tx = held(Decimal::new(50_000, 0));
        tx.mark_disputed().unwrap();
        let err = tx
            .mark_refunded(Decimal::new(60_000, 0), UserId::new())
            .unwrap_err();
        assert!(matches!(err, HoldfastError::RefundExceedsEscrow { .. }));
        // Status unchanged after the failed attempt.
        assert_eq!(tx.status, EscrowStatus::Disputed);
    }

    #[test]
    fn zero_refund_rejected() {
        let mut tx = held(Decimal::new(50_000, 0));
        tx.mark_disputed().unwrap();
        let err = tx.mark_refunded(Decimal::ZERO, UserId::new()).unwrap_err();
        assert!(matches!(err, HoldfastError::RefundExceedsEscrow { .. }));
    }

    #[test]
    fn release_from_disputed_allowed() {
        let mut tx = held(Decimal::new(50_000, 0));
        tx.mark_disputed().unwrap();
        tx.mark_released(UserId::new()).unwrap();
        assert_eq!(tx.status, EscrowStatus::Released);
    }

    #[test]
    fn serde_roundtrip() {
        let tx = held(Decimal::new(75_000, 0));
        let json = serde_json::to_string(&tx).unwrap();
        let back: EscrowTransaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx.id, back.id);
        assert_eq!(tx.amount, back.amount);
        assert_eq!(tx.status, back.status);
    }
}
