use serde::{Deserialize, Serialize};

use crate::Role;

/// Named client-side routes the guard can redirect to or protect.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Login,
    ForgotPassword,
    ResetPassword,
    Dashboard,
    Chatbots,
    Challenges,
    Settings,
    Admin,
}

/// How a route is gated.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RoutePolicy {
    /// Reachable in any state.
    Public,
    /// Only meaningful while signed out (the sign-in page).
    GuestOnly,
    /// Requires a session and, optionally, a minimum privilege.
    Protected { required_max_role: Option<Role> },
}

impl Route {
    pub const ALL: [Route; 8] = [
        Route::Login,
        Route::ForgotPassword,
        Route::ResetPassword,
        Route::Dashboard,
        Route::Chatbots,
        Route::Challenges,
        Route::Settings,
        Route::Admin,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::ForgotPassword => "/forgot-password",
            Route::ResetPassword => "/reset-password",
            Route::Dashboard => "/dashboard",
            Route::Chatbots => "/chatbots",
            Route::Challenges => "/challenges",
            Route::Settings => "/settings",
            Route::Admin => "/admin",
        }
    }

    /// Resolve a location path, including nested paths like `/challenges/12`.
    pub fn from_path(path: &str) -> Option<Route> {
        Route::ALL.into_iter().find(|route| route.matches(path))
    }

    /// Whether `path` is this route or nested below it, by whole segments.
    /// Query string and fragment are ignored.
    pub fn matches(self, path: &str) -> bool {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        path.strip_prefix(self.path())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    pub fn policy(self) -> RoutePolicy {
        match self {
            Route::Login => RoutePolicy::GuestOnly,
            Route::ForgotPassword | Route::ResetPassword => RoutePolicy::Public,
            Route::Admin => RoutePolicy::Protected {
                required_max_role: Some(Role::Instructor),
            },
            Route::Dashboard | Route::Chatbots | Route::Challenges | Route::Settings => {
                RoutePolicy::Protected {
                    required_max_role: None,
                }
            }
        }
    }
}

impl core::fmt::Display for Route {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_exact_and_nested_paths() {
        assert_eq!(Route::from_path("/login"), Some(Route::Login));
        assert_eq!(Route::from_path("/challenges/12"), Some(Route::Challenges));
        assert_eq!(Route::from_path("/reset-password#type=recovery"), Some(Route::ResetPassword));
        assert_eq!(Route::from_path("/dashboard?tab=1"), Some(Route::Dashboard));
    }

    #[test]
    fn does_not_match_on_partial_segment() {
        assert_eq!(Route::from_path("/administration"), None);
        assert_eq!(Route::from_path("/"), None);
    }

    #[test]
    fn every_route_round_trips_through_its_path() {
        for route in Route::ALL {
            assert_eq!(Route::from_path(route.path()), Some(route));
        }
    }

    #[test]
    fn admin_requires_instructor() {
        assert_eq!(
            Route::Admin.policy(),
            RoutePolicy::Protected {
                required_max_role: Some(Role::Instructor)
            }
        );
        assert_eq!(Route::Login.policy(), RoutePolicy::GuestOnly);
    }
}
