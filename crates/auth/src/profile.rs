use serde::{Deserialize, Serialize};

use miniteacher_core::UserId;

use crate::Role;

/// Application-level user record keyed by the authenticated subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(rename = "role_id")]
    pub role: Role,
}

impl Profile {
    /// Avatar initials: first letter of the name followed by the first letter
    /// of the last name (or the nick when there is no last name).
    pub fn initials(&self) -> String {
        let first = first_char(self.name.as_deref());
        let second =
            first_char(self.lastname.as_deref()).or_else(|| first_char(self.nick.as_deref()));

        let initials: String = first
            .into_iter()
            .chain(second)
            .flat_map(char::to_uppercase)
            .collect();

        if initials.is_empty() {
            "U".to_string()
        } else {
            initials
        }
    }

    pub fn display_nick(&self) -> &str {
        self.nick.as_deref().filter(|n| !n.is_empty()).unwrap_or("User")
    }
}

fn first_char(value: Option<&str>) -> Option<char> {
    value.and_then(|v| v.chars().next())
}

/// Initials for the top bar; `"U"` when no profile has resolved.
pub fn initials_for(profile: Option<&Profile>) -> String {
    profile.map(Profile::initials).unwrap_or_else(|| "U".to_string())
}

/// Role badge shown on the dashboard.
///
/// An unresolved profile is shown as the least privileged role.
pub fn role_label(profile: Option<&Profile>) -> &'static str {
    profile.map(|p| p.role).unwrap_or(Role::IndependentLearner).label()
}
