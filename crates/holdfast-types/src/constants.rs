//! System-wide constants for the holdfast engine.

/// Minimum length of a dispute description, in characters.
pub const MIN_DISPUTE_DESCRIPTION_CHARS: usize = 50;

/// Maximum number of evidence URLs on a single dispute.
pub const MAX_EVIDENCE_URLS: usize = 10;

/// Maximum line items on a single order.
pub const MAX_LINE_ITEMS: usize = 100;

/// Default cap on rows returned by an audit-log query.
pub const DEFAULT_AUDIT_QUERY_LIMIT: usize = 100;

/// Hard cap on rows returned by an audit-log query, whatever the caller asks.
pub const MAX_AUDIT_QUERY_LIMIT: usize = 1_000;
