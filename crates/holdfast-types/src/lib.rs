//! # holdfast-types
//!
//! Shared types, errors, and configuration for the **holdfast** escrow and
//! dispute-resolution engine.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`OrderId`], [`UserId`], [`EscrowId`], [`DisputeId`], [`ProductId`], [`AuditEntryId`]
//! - **Order model**: [`Order`], [`LineItem`], [`OrderStatus`]
//! - **Escrow model**: [`EscrowTransaction`], [`EscrowStatus`]
//! - **Dispute model**: [`Dispute`], [`DisputeReason`], [`DisputeStatus`], [`Resolution`]
//! - **Audit model**: [`AuditEntry`], [`AuditAction`], [`ResourceKind`]
//! - **Principals**: [`Principal`], [`Role`]
//! - **Configuration**: [`EngineConfig`]
//! - **Errors**: [`HoldfastError`] with `HF_ERR_` prefix codes
//! - **Constants**: platform limits and defaults

pub mod audit;
pub mod config;
pub mod constants;
pub mod dispute;
pub mod error;
pub mod escrow;
pub mod ids;
pub mod order;
pub mod principal;

// Re-export all primary types at crate root for ergonomic imports:
//   use holdfast_types::{Order, Dispute, EscrowTransaction, ...};

pub use audit::*;
pub use config::*;
pub use dispute::*;
pub use error::*;
pub use escrow::*;
pub use ids::*;
pub use order::*;
pub use principal::*;

// Constants are accessed via `holdfast_types::constants::FOO`
// (not re-exported to avoid name collisions).
