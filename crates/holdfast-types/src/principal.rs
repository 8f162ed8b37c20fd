//! Authenticated principal and role model.
//!
//! The identity provider authenticates callers; the engine only ever sees a
//! [`Principal`] passed explicitly into every mutating call. There is no
//! ambient "current session" — ownership and role are re-checked on each
//! operation against the resource being touched.

use serde::{Deserialize, Serialize};

use crate::UserId;

/// Closed set of roles the engine reasons about.
///
/// `System` marks trusted internal callers (payment-cleared triggers,
/// auto-release timers). It is never granted to end users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Buyer,
    Seller,
    Admin,
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buyer => write!(f, "BUYER"),
            Self::Seller => write!(f, "SELLER"),
            Self::Admin => write!(f, "ADMIN"),
            Self::System => write!(f, "SYSTEM"),
        }
    }
}

/// An authenticated caller: identity plus role set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub roles: Vec<Role>,
}

impl Principal {
    #[must_use]
    pub fn new(id: UserId, roles: Vec<Role>) -> Self {
        Self { id, roles }
    }

    /// A regular marketplace user (can buy and sell).
    #[must_use]
    pub fn user(id: UserId) -> Self {
        Self::new(id, vec![Role::Buyer, Role::Seller])
    }

    /// An administrator.
    #[must_use]
    pub fn admin(id: UserId) -> Self {
        Self::new(id, vec![Role::Admin])
    }

    /// The trusted system caller (external triggers such as payment-cleared
    /// hooks or the auto-release timer).
    #[must_use]
    pub fn system() -> Self {
        Self::new(UserId::new(), vec![Role::System])
    }

    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    #[must_use]
    pub fn is_system(&self) -> bool {
        self.has_role(Role::System)
    }
}
