//! Order types: line items, fulfillment status, and the order entity.
//!
//! The fulfillment status machine is strictly forward with two exits:
//!
//! ```text
//! PENDING_PAYMENT -> PAYMENT_RECEIVED -> PROCESSING -> SHIPPED -> DELIVERED -> COMPLETED
//! {PAYMENT_RECEIVED .. DELIVERED}     -> DISPUTED   -> {COMPLETED | CANCELLED}
//! {PENDING_PAYMENT, PAYMENT_RECEIVED} -> CANCELLED
//! ```
//!
//! No other edges exist. `total_amount` is computed from the line items at
//! creation and never mutated afterwards.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{DisputeId, OrderId, ProductId, UserId};

/// One purchased product line. Owned exclusively by its order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl LineItem {
    #[must_use]
    pub fn new(product_id: ProductId, quantity: u32, unit_price: Decimal) -> Self {
        Self {
            product_id,
            quantity,
            unit_price,
        }
    }

    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Fulfillment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    PendingPayment,
    PaymentReceived,
    Processing,
    Shipped,
    Delivered,
    Completed,
    Cancelled,
    Disputed,
}

impl OrderStatus {
    /// The fixed forward edge set, plus the two exits and the post-dispute
    /// convergence. This is the single authority on reachability.
    #[must_use]
    pub fn can_advance_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::PendingPayment, Self::PaymentReceived)
                | (Self::PaymentReceived, Self::Processing)
                | (Self::Processing, Self::Shipped)
                | (Self::Shipped, Self::Delivered)
                | (Self::Delivered, Self::Completed)
                | (
                    Self::PaymentReceived | Self::Processing | Self::Shipped | Self::Delivered,
                    Self::Disputed,
                )
                | (Self::PendingPayment | Self::PaymentReceived, Self::Cancelled)
                | (Self::Disputed, Self::Completed | Self::Cancelled)
        )
    }

    /// No transition is defined out of a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether a dispute may be attached in this status.
    #[must_use]
    pub fn is_disputable(&self) -> bool {
        !matches!(self, Self::Completed | Self::Cancelled | Self::Disputed)
            && *self != Self::PendingPayment
    }

    /// Whether the seller may set tracking details in this status.
    #[must_use]
    pub fn tracking_settable(&self) -> bool {
        matches!(self, Self::Processing | Self::Shipped)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PendingPayment => write!(f, "PENDING_PAYMENT"),
            Self::PaymentReceived => write!(f, "PAYMENT_RECEIVED"),
            Self::Processing => write!(f, "PROCESSING"),
            Self::Shipped => write!(f, "SHIPPED"),
            Self::Delivered => write!(f, "DELIVERED"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Disputed => write!(f, "DISPUTED"),
        }
    }
}

/// A marketplace order. Created at checkout in `PENDING_PAYMENT`; never
/// deleted — terminal states are retained for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub items: Vec<LineItem>,
    /// Sum of line totals, frozen at creation.
    pub total_amount: Decimal,
    pub status: OrderStatus,
    /// Set true only by the buyer's explicit delivery confirmation.
    pub buyer_confirmed: bool,
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    /// Non-null iff `status == Disputed`.
    pub dispute_id: Option<DisputeId>,
    /// Optimistic-concurrency token, bumped by the store on every write.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a new order in `PENDING_PAYMENT`, freezing the total.
    #[must_use]
    pub fn new(buyer_id: UserId, seller_id: UserId, items: Vec<LineItem>) -> Self {
        let total_amount = items.iter().map(LineItem::line_total).sum();
        let now = Utc::now();
        Self {
            id: OrderId::new(),
            buyer_id,
            seller_id,
            items,
            total_amount,
            status: OrderStatus::PendingPayment,
            buyer_confirmed: false,
            tracking_number: None,
            estimated_delivery: None,
            dispute_id: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// The `dispute_id ⇔ DISPUTED` pairing. Holds after every operation.
    #[must_use]
    pub fn dispute_link_consistent(&self) -> bool {
        self.dispute_id.is_some() == (self.status == OrderStatus::Disputed)
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Order {
    /// Single-line-item order between fresh users, frozen at the given total.
    pub fn dummy(total: Decimal) -> Self {
        Self::dummy_between(UserId::new(), UserId::new(), total)
    }

    pub fn dummy_between(buyer_id: UserId, seller_id: UserId, total: Decimal) -> Self {
        Self::new(
            buyer_id,
            seller_id,
            vec![LineItem::new(ProductId::new(), 1, total)],
        )
    }
}
