//! Role-gated access checks.
//!
//! A front end asks a [`Guard`] before showing a protected view. The answer
//! is an [`Access`]: show a spinner while the session is restoring, send the
//! visitor to login, send a user of the wrong role to their own home, or let
//! them through.
//!
//! # Example
//!
//! ```rust,ignore
//! match Guard::ADMIN.check(&session.state().await) {
//!     Access::Granted(identity) => render_admin(identity),
//!     Access::RedirectHome(route) | Access::RedirectToLogin(route) => navigate(route),
//!     Access::Loading => spinner(),
//! }
//! ```

use crumb_core::Role;

use crate::session::{Identity, SessionState};

/// Route of the login view.
pub const LOGIN_ROUTE: &str = "/login";

/// Landing route of each role.
#[must_use]
pub const fn home_route(role: Role) -> &'static str {
    match role {
        Role::Customer => "/dashboard",
        Role::BranchAdmin => "/admin",
        Role::GeneralAdmin => "/admin-general",
    }
}

/// What a view requires of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// Anyone logged in.
    Authenticated,
    /// A user holding one of the roles.
    Roles(&'static [Role]),
}

/// Outcome of a guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access<'a> {
    /// The session is still restoring; decide later.
    Loading,
    /// Nobody is logged in; go to the login route.
    RedirectToLogin(&'static str),
    /// Logged in with the wrong role; go to that role's home.
    RedirectHome(&'static str),
    /// Show the view.
    Granted(&'a Identity),
}

impl Guard {
    /// Customer-only views (cart, checkout, order tracking).
    pub const CUSTOMER: Self = Self::Roles(&[Role::Customer]);
    /// Branch-scoped administration.
    pub const BRANCH_ADMIN: Self = Self::Roles(&[Role::BranchAdmin]);
    /// Chain-wide administration.
    pub const GENERAL_ADMIN: Self = Self::Roles(&[Role::GeneralAdmin]);
    /// Any administrator.
    pub const ADMIN: Self = Self::Roles(&[Role::BranchAdmin, Role::GeneralAdmin]);

    /// Evaluate the guard against the session.
    #[must_use]
    pub fn check(self, state: &SessionState) -> Access<'_> {
        match (state, self) {
            (SessionState::Loading, _) => Access::Loading,
            (SessionState::Anonymous, _) => Access::RedirectToLogin(LOGIN_ROUTE),
            (SessionState::Authenticated(identity), Self::Authenticated) => {
                Access::Granted(identity)
            }
            (SessionState::Authenticated(identity), Self::Roles(roles)) => {
                if roles.contains(&identity.role) {
                    Access::Granted(identity)
                } else {
                    Access::RedirectHome(home_route(identity.role))
                }
            }
        }
    }
}

impl Access<'_> {
    #[must_use]
    pub const fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    /// Where to navigate instead of showing the view, if anywhere.
    #[must_use]
    pub const fn redirect(&self) -> Option<&'static str> {
        match self {
            Self::RedirectToLogin(route) | Self::RedirectHome(route) => Some(*route),
            Self::Loading | Self::Granted(_) => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crumb_core::UserId;

    use super::*;

    fn logged_in(role: Role) -> SessionState {
        SessionState::Authenticated(Identity {
            id: UserId::new(1),
            username: "u".to_string(),
            email: None,
            name: None,
            role,
            branch: None,
        })
    }

    #[test]
    fn test_loading_and_anonymous() {
        assert_eq!(Guard::ADMIN.check(&SessionState::Loading), Access::Loading);
        assert_eq!(
            Guard::Authenticated.check(&SessionState::Anonymous).redirect(),
            Some("/login")
        );
    }

    #[test]
    fn test_wrong_role_goes_home() {
        let customer = logged_in(Role::Customer);
        assert_eq!(Guard::ADMIN.check(&customer).redirect(), Some("/dashboard"));

        let branch_admin = logged_in(Role::BranchAdmin);
        assert_eq!(
            Guard::GENERAL_ADMIN.check(&branch_admin).redirect(),
            Some("/admin")
        );

        let general = logged_in(Role::GeneralAdmin);
        assert_eq!(
            Guard::CUSTOMER.check(&general).redirect(),
            Some("/admin-general")
        );
    }

    #[test]
    fn test_granted() {
        let branch_admin = logged_in(Role::BranchAdmin);
        assert!(Guard::ADMIN.check(&branch_admin).is_granted());
        assert!(Guard::Authenticated.check(&branch_admin).is_granted());
        assert!(Guard::Roles(&Role::ALL).check(&branch_admin).is_granted());
    }
}
