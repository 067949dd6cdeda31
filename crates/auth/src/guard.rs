use serde::Serialize;

use miniteacher_core::UserId;

use crate::{has_at_least_privilege, AuthSnapshot, Role, Route, RoutePolicy};

/// What the router should do for a navigation target.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "decision", content = "to")]
pub enum AccessDecision {
    /// Auth state is still settling; show a neutral placeholder.
    Wait,
    /// Replace the current location with this route.
    Redirect(Route),
    /// Mount the target view.
    Render,
}

/// Gate a protected view.
///
/// - No IO
/// - No panics
/// - Loading is checked first so no redirect is decided on unsettled state.
/// - Role disqualification requires a resolved profile; a pending profile
///   under a live session is let through.
pub fn guard(snapshot: &AuthSnapshot, required_max_role: Option<Role>) -> AccessDecision {
    if snapshot.is_loading() {
        return AccessDecision::Wait;
    }
    if !snapshot.is_authenticated() {
        return AccessDecision::Redirect(Route::Login);
    }
    if let (Some(threshold), Some(role)) = (required_max_role, snapshot.role()) {
        if !has_at_least_privilege(role, threshold) {
            return AccessDecision::Redirect(Route::Dashboard);
        }
    }
    AccessDecision::Render
}

/// Gate the sign-in view: signed-in users are sent to the landing page.
pub fn guest_guard(snapshot: &AuthSnapshot) -> AccessDecision {
    if snapshot.is_loading() {
        AccessDecision::Wait
    } else if snapshot.is_authenticated() {
        AccessDecision::Redirect(Route::Dashboard)
    } else {
        AccessDecision::Render
    }
}

/// Decide for a named route according to its [`RoutePolicy`].
pub fn decide(snapshot: &AuthSnapshot, route: Route) -> AccessDecision {
    match route.policy() {
        RoutePolicy::Public => AccessDecision::Render,
        RoutePolicy::GuestOnly => guest_guard(snapshot),
        RoutePolicy::Protected { required_max_role } => guard(snapshot, required_max_role),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Decision explanation (diagnostics)
// ─────────────────────────────────────────────────────────────────────────────

/// Debuggable account of a guard decision.
#[derive(Debug, Clone, Serialize)]
pub struct AccessExplanation {
    pub decision: AccessDecision,
    pub reason: String,
    pub subject: Option<UserId>,
    pub role: Option<Role>,
    pub required_max_role: Option<Role>,
    /// Role check skipped because the profile has not resolved.
    pub profile_pending: bool,
    pub denial: Option<DenialKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    Loading,
    Unauthenticated,
    InsufficientRole,
}

/// Explain why [`guard`] decides the way it does for this snapshot.
pub fn explain_access(
    snapshot: &AuthSnapshot,
    required_max_role: Option<Role>,
) -> AccessExplanation {
    let decision = guard(snapshot, required_max_role);
    let role = snapshot.role();
    let profile_pending = snapshot.profile_pending() && required_max_role.is_some();

    let (reason, denial) = match decision {
        AccessDecision::Wait => (
            "Session or profile fetch still in flight".to_string(),
            Some(DenialKind::Loading),
        ),
        AccessDecision::Redirect(Route::Login) => {
            ("No active session".to_string(), Some(DenialKind::Unauthenticated))
        }
        AccessDecision::Redirect(_) => {
            let (role, threshold) = (
                role.map(Role::id).unwrap_or_default(),
                required_max_role.map(Role::id).unwrap_or_default(),
            );
            (
                format!("Role {} is less privileged than required role {}", role, threshold),
                Some(DenialKind::InsufficientRole),
            )
        }
        AccessDecision::Render => {
            let reason = match (required_max_role, role) {
                (None, _) => "Authenticated; no role requirement".to_string(),
                (Some(threshold), Some(role)) => {
                    format!("Role {} satisfies required role {}", role.id(), threshold.id())
                }
                (Some(_), None) => {
                    "Authenticated; profile pending, role check deferred".to_string()
                }
            };
            (reason, None)
        }
    };

    AccessExplanation {
        decision,
        reason,
        subject: snapshot.subject(),
        role,
        required_max_role,
        profile_pending,
        denial,
    }
}
