use core::cmp::Ordering;

use serde::{Deserialize, Serialize};

use miniteacher_core::DomainError;

/// Application role, as stored in the profile's `role_id` column.
///
/// The scale is ordinal: a lower id means more privilege. Access control is a
/// single threshold comparison against this scale (see
/// [`has_at_least_privilege`]); there are no per-resource permissions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Role {
    Administrator,
    Instructor,
    Student,
    IndependentLearner,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Administrator,
        Role::Instructor,
        Role::Student,
        Role::IndependentLearner,
    ];

    /// Numeric id used by the profile store.
    pub fn id(self) -> u8 {
        match self {
            Role::Administrator => 1,
            Role::Instructor => 2,
            Role::Student => 3,
            Role::IndependentLearner => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Administrator => "Administrator",
            Role::Instructor => "Instructor",
            Role::Student => "Student",
            Role::IndependentLearner => "Independent learner",
        }
    }

    /// Whether this role sees the administrative entry points.
    pub fn is_privileged(self) -> bool {
        has_at_least_privilege(self, Role::Instructor)
    }
}

/// `role` is at least as privileged as `threshold`.
///
/// This is the only access predicate in the client.
pub fn has_at_least_privilege(role: Role, threshold: Role) -> bool {
    role <= threshold
}

/// More privileged roles order first.
impl Ord for Role {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id().cmp(&other.id())
    }
}

impl PartialOrd for Role {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl TryFrom<u8> for Role {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Role::Administrator),
            2 => Ok(Role::Instructor),
            3 => Ok(Role::Student),
            4 => Ok(Role::IndependentLearner),
            other => Err(DomainError::validation(format!("unknown role_id {}", other))),
        }
    }
}

impl From<Role> for u8 {
    fn from(value: Role) -> Self {
        value.id()
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn administrator_outranks_everyone() {
        for role in Role::ALL {
            assert!(has_at_least_privilege(Role::Administrator, role));
        }
    }

    #[test]
    fn privileged_roles_are_admin_and_instructor() {
        assert!(Role::Administrator.is_privileged());
        assert!(Role::Instructor.is_privileged());
        assert!(!Role::Student.is_privileged());
        assert!(!Role::IndependentLearner.is_privileged());
    }

    #[test]
    fn deserializes_from_numeric_role_id() {
        let role: Role = serde_json::from_str("3").unwrap();
        assert_eq!(role, Role::Student);
        assert_eq!(serde_json::to_string(&Role::Instructor).unwrap(), "2");
    }

    #[test]
    fn unknown_role_id_is_rejected() {
        assert!(serde_json::from_str::<Role>("7").is_err());
        assert!(matches!(Role::try_from(0), Err(DomainError::Validation(_))));
    }

    fn any_role() -> impl Strategy<Value = Role> {
        prop::sample::select(Role::ALL.to_vec())
    }

    proptest! {
        /// The predicate agrees with the numeric threshold test on `role_id`.
        #[test]
        fn predicate_matches_numeric_threshold(role in any_role(), threshold in any_role()) {
            prop_assert_eq!(has_at_least_privilege(role, threshold), role.id() <= threshold.id());
        }

        #[test]
        fn id_round_trips(role in any_role()) {
            prop_assert_eq!(Role::try_from(role.id()).unwrap(), role);
        }
    }
}
