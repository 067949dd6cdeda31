//! `miniteacher-auth`: pure session/RBAC boundary of the client.
//!
//! No IO and no async: everything here is a function of an [`AuthSnapshot`]
//! or a value inside one. The async lifecycle lives in `miniteacher-session`.

pub mod credentials;
pub mod guard;
pub mod nav;
pub mod profile;
pub mod roles;
pub mod routes;
pub mod session;
pub mod snapshot;

pub use credentials::{is_recovery_link, NewPassword, PasswordResetRequest, SignInForm};
pub use guard::{
    decide, explain_access, guard, guest_guard, AccessDecision, AccessExplanation, DenialKind,
};
pub use nav::{admin_entry, base_navigation, navigation_for, NavItem};
pub use profile::{initials_for, role_label, Profile};
pub use roles::{has_at_least_privilege, Role};
pub use routes::{Route, RoutePolicy};
pub use session::{validate_session, Session, SessionUser, SessionValidationError};
pub use snapshot::AuthSnapshot;
