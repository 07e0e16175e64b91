//! Guard rails for account changes.
//!
//! Checked inside the mutating transaction after the target and every other
//! active Admin row have been locked, so `other_active_admins` cannot change
//! underneath the check.

use uuid::Uuid;

use crate::api::handlers::auth::Role;

pub const OWN_ROLE: &str = "You cannot change your own role.";
pub const OWN_ACCOUNT_DISABLE: &str = "You cannot disable your own account.";
pub const OWN_ACCOUNT_DELETE: &str = "Cannot delete the currently logged-in user.";
pub const LAST_ADMIN: &str = "Cannot remove or disable the last active Admin account.";

/// Locked state of the account being changed.
#[derive(Clone, Copy, Debug)]
pub struct Target {
    pub id: Uuid,
    pub role: Option<Role>,
    pub is_active: bool,
}

impl Target {
    fn is_active_admin(&self) -> bool {
        self.is_active && self.role == Some(Role::Admin)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Change {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

/// Refuse role or activity changes that lock out the actor or the last Admin.
pub fn check_update(
    actor: Uuid,
    target: &Target,
    change: Change,
    other_active_admins: usize,
) -> Result<(), &'static str> {
    if let Some(role) = change.role {
        if actor == target.id && target.role != Some(role) {
            return Err(OWN_ROLE);
        }
        if role != Role::Admin && target.is_active_admin() && other_active_admins == 0 {
            return Err(LAST_ADMIN);
        }
    }

    if change.is_active == Some(false) {
        if actor == target.id {
            return Err(OWN_ACCOUNT_DISABLE);
        }
        if target.is_active_admin() && other_active_admins == 0 {
            return Err(LAST_ADMIN);
        }
    }
    Ok(())
}

pub fn check_delete(
    actor: Uuid,
    target: &Target,
    other_active_admins: usize,
) -> Result<(), &'static str> {
    if actor == target.id {
        return Err(OWN_ACCOUNT_DELETE);
    }
    if target.is_active_admin() && other_active_admins == 0 {
        return Err(LAST_ADMIN);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin(id: Uuid) -> Target {
        Target {
            id,
            role: Some(Role::Admin),
            is_active: true,
        }
    }

    #[test]
    fn own_role_change_is_refused_only_when_different() {
        let me = Uuid::new_v4();
        let demote = Change {
            role: Some(Role::Editor),
            ..Change::default()
        };
        let same = Change {
            role: Some(Role::Admin),
            ..Change::default()
        };
        assert_eq!(check_update(me, &admin(me), demote, 3), Err(OWN_ROLE));
        assert_eq!(check_update(me, &admin(me), same, 0), Ok(()));
    }

    #[test]
    fn own_account_cannot_be_disabled_or_deleted() {
        let me = Uuid::new_v4();
        let disable = Change {
            is_active: Some(false),
            ..Change::default()
        };
        assert_eq!(check_update(me, &admin(me), disable, 3), Err(OWN_ACCOUNT_DISABLE));
        assert_eq!(check_delete(me, &admin(me), 3), Err(OWN_ACCOUNT_DELETE));
    }

    #[test]
    fn last_active_admin_is_protected() {
        let me = Uuid::new_v4();
        let other = admin(Uuid::new_v4());
        let demote = Change {
            role: Some(Role::Inbox),
            ..Change::default()
        };
        let disable = Change {
            is_active: Some(false),
            ..Change::default()
        };

        assert_eq!(check_update(me, &other, demote, 0), Err(LAST_ADMIN));
        assert_eq!(check_update(me, &other, disable, 0), Err(LAST_ADMIN));
        assert_eq!(check_delete(me, &other, 0), Err(LAST_ADMIN));

        assert_eq!(check_update(me, &other, demote, 1), Ok(()));
        assert_eq!(check_update(me, &other, disable, 1), Ok(()));
        assert_eq!(check_delete(me, &other, 1), Ok(()));
    }

    #[test]
    fn inactive_or_non_admin_targets_are_unguarded() {
        let me = Uuid::new_v4();
        let editor = Target {
            id: Uuid::new_v4(),
            role: Some(Role::Editor),
            is_active: true,
        };
        let disabled_admin = Target {
            is_active: false,
            ..admin(Uuid::new_v4())
        };
        let disable = Change {
            is_active: Some(false),
            ..Change::default()
        };
        assert_eq!(check_update(me, &editor, disable, 0), Ok(()));
        assert_eq!(check_delete(me, &disabled_admin, 0), Ok(()));
        assert_eq!(check_update(me, &disabled_admin, Change::default(), 0), Ok(()));
    }
}
