//! Authorization guard — pure predicates over (principal, resource owners).
//!
//! No I/O and no state. Every mutating entry point in the engine calls one
//! of the `require_*` functions before touching the store; failures surface
//! as `Unauthorized`/`AdminRequired` and are never downgraded to a no-op.

use holdfast_types::{HoldfastError, Principal, Result, Role, UserId};

/// True iff the principal carries the administrator role.
#[must_use]
pub fn is_admin(principal: &Principal) -> bool {
    principal.is_admin()
}

/// True iff the principal is a party to the resource or an administrator.
#[must_use]
pub fn is_owner_or_admin(principal: &Principal, buyer_id: UserId, seller_id: UserId) -> bool {
    principal.id == buyer_id || principal.id == seller_id || principal.is_admin()
}

/// Administrator role, or `AdminRequired`.
pub fn require_admin(principal: &Principal) -> Result<()> {
    if is_admin(principal) {
        Ok(())
    } else {
        Err(HoldfastError::AdminRequired)
    }
}

/// Party to the resource or administrator, or `Unauthorized`.
pub fn require_owner_or_admin(
    principal: &Principal,
    buyer_id: UserId,
    seller_id: UserId,
) -> Result<()> {
    if is_owner_or_admin(principal, buyer_id, seller_id) {
        Ok(())
    } else {
        Err(HoldfastError::Unauthorized {
            reason: "caller is not a party to this resource".into(),
        })
    }
}

/// Exactly the resource's buyer, or `Unauthorized`. Admins do not get to
/// act *as* the buyer (confirming delivery, opening disputes).
pub fn require_buyer(principal: &Principal, buyer_id: UserId) -> Result<()> {
    if principal.id == buyer_id {
        Ok(())
    } else {
        Err(HoldfastError::Unauthorized {
            reason: "caller is not the order's buyer".into(),
        })
    }
}

/// The resource's seller or the trusted system caller, or `Unauthorized`.
pub fn require_seller_or_system(principal: &Principal, seller_id: UserId) -> Result<()> {
    if principal.id == seller_id || principal.has_role(Role::System) {
        Ok(())
    } else {
        Err(HoldfastError::Unauthorized {
            reason: "caller is not the order's seller".into(),
        })
    }
}

/// The trusted system caller (payment hooks, auto-release timers), or
/// `Unauthorized`.
pub fn require_system(principal: &Principal) -> Result<()> {
    if principal.has_role(Role::System) {
        Ok(())
    } else {
        Err(HoldfastError::Unauthorized {
            reason: "caller is not a trusted system principal".into(),
        })
    }
}

/// The trusted system caller or an administrator, or `Unauthorized`.
pub fn require_system_or_admin(principal: &Principal) -> Result<()> {
    if principal.has_role(Role::System) || principal.is_admin() {
        Ok(())
    } else {
        Err(HoldfastError::Unauthorized {
            reason: "caller is neither a system principal nor an administrator".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_predicate() {
        assert!(is_admin(&Principal::admin(UserId::new())));
        assert!(!is_admin(&Principal::user(UserId::new())));
        assert!(!is_admin(&Principal::system()));
    }

    #[test]
    fn owner_or_admin_accepts_both_parties() {
        let buyer = UserId::new();
        let seller = UserId::new();
        assert!(is_owner_or_admin(&Principal::user(buyer), buyer, seller));
        assert!(is_owner_or_admin(&Principal::user(seller), buyer, seller));
        assert!(is_owner_or_admin(
            &Principal::admin(UserId::new()),
            buyer,
            seller
        ));
        assert!(!is_owner_or_admin(
            &Principal::user(UserId::new()),
            buyer,
            seller
        ));
    }

    #[test]
    fn require_buyer_rejects_admin() {
        let buyer = UserId::new();
        let err = require_buyer(&Principal::admin(UserId::new()), buyer).unwrap_err();
        assert!(matches!(err, HoldfastError::Unauthorized { .. }));
        assert!(require_buyer(&Principal::user(buyer), buyer).is_ok());
    }

    #[test]
    fn require_admin_errors_distinctly() {
        let err = require_admin(&Principal::user(UserId::new())).unwrap_err();
        assert!(matches!(err, HoldfastError::AdminRequired));
    }

    #[test]
    fn seller_or_system() {
        let seller = UserId::new();
        assert!(require_seller_or_system(&Principal::user(seller), seller).is_ok());
        assert!(require_seller_or_system(&Principal::system(), seller).is_ok());
        let err =
            require_seller_or_system(&Principal::user(UserId::new()), seller).unwrap_err();
        assert!(matches!(err, HoldfastError::Unauthorized { .. }));
    }

    #[test]
    fn system_or_admin() {
        assert!(require_system_or_admin(&Principal::system()).is_ok());
        assert!(require_system_or_admin(&Principal::admin(UserId::new())).is_ok());
        assert!(require_system_or_admin(&Principal::user(UserId::new())).is_err());
    }
}
