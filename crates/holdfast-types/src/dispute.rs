//! Dispute types: the contested-claim record and its adjudication outcome.
//!
//! A dispute is created by the order's buyer, moves through admin review,
//! and on resolution carries exactly one fund-disposition decision. For a
//! given order, at most one dispute may be OPEN or UNDER_REVIEW at a time.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{DisputeId, OrderId, UserId};

/// Why the buyer contests the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisputeReason {
    NotReceived,
    WrongItem,
    Damaged,
    FakeProduct,
    Other,
}

impl std::fmt::Display for DisputeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotReceived => write!(f, "NOT_RECEIVED"),
            Self::WrongItem => write!(f, "WRONG_ITEM"),
            Self::Damaged => write!(f, "DAMAGED"),
            Self::FakeProduct => write!(f, "FAKE_PRODUCT"),
            Self::Other => write!(f, "OTHER"),
        }
    }
}

/// Lifecycle status of a dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisputeStatus {
    /// Filed by the buyer, awaiting admin attention.
    Open,
    /// An administrator has picked it up.
    UnderReview,
    /// Adjudicated; funds and order status are settled.
    Resolved,
    /// Archived after resolution. No further effects.
    Closed,
}

impl DisputeStatus {
    /// Active disputes block a second dispute on the same order.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Open | Self::UnderReview)
    }
}

impl std::fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::UnderReview => write!(f, "UNDER_REVIEW"),
            Self::Resolved => write!(f, "RESOLVED"),
            Self::Closed => write!(f, "CLOSED"),
        }
    }
}

/// The administrator's fund-disposition decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    /// Full refund to the buyer; the order is cancelled.
    RefundBuyer,
    /// Full release to the seller; the order completes.
    ReleaseSeller,
    /// Negotiated partial refund; the order completes with an adjustment.
    PartialRefund,
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RefundBuyer => write!(f, "REFUND_BUYER"),
            Self::ReleaseSeller => write!(f, "RELEASE_SELLER"),
            Self::PartialRefund => write!(f, "PARTIAL_REFUND"),
        }
    }
}

/// A buyer-initiated contest of an order's fulfillment. Never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispute {
    pub id: DisputeId,
    pub order_id: OrderId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub reason: DisputeReason,
    /// Free text; minimum length enforced at open time.
    pub description: String,
    /// Opaque references — the engine stores no evidence content.
    pub evidence_urls: Vec<String>,
    pub status: DisputeStatus,
    /// Set exactly once, at resolution time.
    pub resolution: Option<Resolution>,
    /// Required iff `resolution == PartialRefund`.
    pub refund_amount: Option<Decimal>,
    pub admin_id: Option<UserId>,
    pub admin_notes: Option<String>,
    /// Optimistic-concurrency token, bumped by the store on every write.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Dispute {
    /// New dispute in `OPEN` against the given order.
    #[must_use]
    pub fn new(
        order_id: OrderId,
        buyer_id: UserId,
        seller_id: UserId,
        reason: DisputeReason,
        description: String,
        evidence_urls: Vec<String>,
    ) -> Self {
        Self {
            id: DisputeId::new(),
            order_id,
            buyer_id,
            seller_id,
            reason,
            description,
            evidence_urls,
            status: DisputeStatus::Open,
            resolution: None,
            refund_amount: None,
            admin_id: None,
            admin_notes: None,
            version: 0,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Test helpers. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl Dispute {
    /// Dummy dispute with a description long enough to pass validation and
    /// one randomized evidence reference.
    pub fn dummy(order_id: OrderId, buyer_id: UserId, seller_id: UserId) -> Self {
        Self::new(
            order_id,
            buyer_id,
            seller_id,
            DisputeReason::Damaged,
            "The item arrived with a cracked casing and does not power on at all.".into(),
            vec![format!(
                "https://cdn.example/evidence/{}.jpg",
                rand::random::<u64>()
            )],
        )
    }
}
