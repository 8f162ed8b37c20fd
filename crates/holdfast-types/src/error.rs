//! Error types for the holdfast escrow and dispute engine.
//!
//! All errors use the `HF_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Order lifecycle errors
//! - 2xx: Escrow ledger errors
//! - 3xx: Dispute errors
//! - 4xx: Authorization errors
//! - 5xx: Store / concurrency errors
//! - 9xx: General / internal errors
//!
//! Every failure kind carries a stable, distinct message so a client can
//! tell "you are not allowed" from "this is already resolved" from "please
//! fill in the refund amount".

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    DisputeId, DisputeStatus, EscrowId, EscrowStatus, OrderId, OrderStatus,
};

/// Central error enum for all holdfast operations.
#[derive(Debug, Error)]
pub enum HoldfastError {
    // =================================================================
    // Order Lifecycle Errors (1xx)
    // =================================================================
    /// The requested order was not found.
    #[error("HF_ERR_100: Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The requested status edge does not exist in the fulfillment graph.
    /// Covers skipped states and backward moves alike.
    #[error("HF_ERR_101: Invalid order transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Cancellation is only legal before fulfillment starts.
    #[error("HF_ERR_102: Order cannot be cancelled while {status}")]
    OrderNotCancellable { status: OrderStatus },

    /// Delivery can only be confirmed once the order is DELIVERED.
    #[error("HF_ERR_103: Delivery cannot be confirmed while order is {status}")]
    ConfirmBeforeDelivery { status: OrderStatus },

    /// The buyer already confirmed delivery of this order.
    #[error("HF_ERR_104: Delivery already confirmed for order {0}")]
    AlreadyConfirmed(OrderId),

    /// A dispute cannot be attached to an order in this status.
    #[error("HF_ERR_105: Order cannot be disputed while {status}")]
    OrderNotDisputable { status: OrderStatus },

    /// Dispute exit requires the order to currently be DISPUTED.
    #[error("HF_ERR_106: Order is {status}, not DISPUTED")]
    OrderNotDisputed { status: OrderStatus },

    // =================================================================
    // Escrow Ledger Errors (2xx)
    // =================================================================
    /// The requested escrow transaction was not found.
    #[error("HF_ERR_200: Escrow transaction not found: {0}")]
    EscrowNotFound(EscrowId),

    /// An escrow transaction already exists for this order (1:1 invariant).
    #[error("HF_ERR_201: Escrow already exists for order {order_id}")]
    EscrowExists { order_id: OrderId },

    /// Escrow amount must equal the order total at creation.
    #[error("HF_ERR_202: Escrow amount {actual} does not match order total {expected}")]
    AmountMismatch { expected: Decimal, actual: Decimal },

    /// The requested escrow status edge does not exist.
    #[error("HF_ERR_203: Invalid escrow transition: {from} -> {to}")]
    InvalidEscrowState { from: EscrowStatus, to: EscrowStatus },

    /// The escrow already reached a terminal disposition (released or
    /// refunded). This is the at-most-once-payout guarantee surfacing.
    #[error("HF_ERR_204: Escrow already finalized as {status}")]
    AlreadyFinalized { status: EscrowStatus },

    /// A refund may not exceed the amount held in custody.
    #[error("HF_ERR_205: Refund {requested} exceeds held amount {held}")]
    RefundExceedsEscrow { requested: Decimal, held: Decimal },

    /// The order has no escrow transaction attached (payment never cleared).
    #[error("HF_ERR_206: No escrow transaction exists for order {0}")]
    EscrowNotFoundForOrder(OrderId),

    // =================================================================
    // Dispute Errors (3xx)
    // =================================================================
    /// The requested dispute was not found.
    #[error("HF_ERR_300: Dispute not found: {0}")]
    DisputeNotFound(DisputeId),

    /// An open or under-review dispute already exists for this order.
    #[error("HF_ERR_301: An active dispute already exists for order {order_id}")]
    DuplicateDispute { order_id: OrderId },

    /// The dispute was already resolved. Not retryable: the adjudication
    /// already happened and exactly one payout was made.
    #[error("HF_ERR_302: Dispute already resolved: {0}")]
    AlreadyResolved(DisputeId),

    /// The dispute description does not meet the minimum length.
    #[error("HF_ERR_303: Dispute description too short: {len} chars, minimum {min}")]
    DescriptionTooShort { len: usize, min: usize },

    /// A partial refund resolution requires an explicit refund amount.
    #[error("HF_ERR_304: Refund amount is required for a partial refund")]
    MissingRefundAmount,

    /// The partial refund amount must be in (0, order total].
    #[error("HF_ERR_305: Refund amount {requested} out of range (0, {limit}]")]
    RefundOutOfRange { requested: Decimal, limit: Decimal },

    /// Admin notes are mandatory on resolution.
    #[error("HF_ERR_306: Admin notes must not be empty")]
    EmptyAdminNotes,

    /// Too many evidence attachments on a single dispute.
    #[error("HF_ERR_307: Too many evidence URLs: {count}, maximum {max}")]
    TooManyEvidenceUrls { count: usize, max: usize },

    /// Review can only begin on an OPEN dispute.
    #[error("HF_ERR_308: Dispute is {status}, not OPEN")]
    DisputeNotOpen { status: DisputeStatus },

    /// A dispute can only be closed after resolution.
    #[error("HF_ERR_309: Dispute is {status}, not RESOLVED")]
    DisputeNotResolved { status: DisputeStatus },

    // =================================================================
    // Authorization Errors (4xx)
    // =================================================================
    /// The caller does not own the resource and is not an administrator.
    #[error("HF_ERR_400: Unauthorized: {reason}")]
    Unauthorized { reason: String },

    /// The operation requires the administrator role.
    #[error("HF_ERR_401: Administrator role required")]
    AdminRequired,

    // =================================================================
    // Store / Concurrency Errors (5xx)
    // =================================================================
    /// An optimistic-concurrency write lost its race. Callers see this only
    /// when the loser's precondition cannot name a more precise outcome.
    #[error("HF_ERR_500: Version conflict: expected {expected}, found {actual}")]
    VersionConflict { expected: u64, actual: u64 },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("HF_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("HF_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// I/O error (disk, network).
    #[error("HF_ERR_902: I/O error: {0}")]
    Io(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, HoldfastError>;

impl From<std::io::Error> for HoldfastError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for HoldfastError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
