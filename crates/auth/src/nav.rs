//! Role-aware navigation entries.
//!
//! Derived from the current profile on every call; never cached.

use serde::Serialize;

use crate::{Profile, Route};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub title: &'static str,
    pub route: Route,
}

impl NavItem {
    pub const fn new(title: &'static str, route: Route) -> Self {
        Self { title, route }
    }

    /// Highlight state for the current location.
    pub fn is_active(&self, current_path: &str) -> bool {
        self.route.matches(current_path)
    }
}

const BASE: [NavItem; 4] = [
    NavItem::new("Home", Route::Dashboard),
    NavItem::new("AI Tutor", Route::Chatbots),
    NavItem::new("Challenges", Route::Challenges),
    NavItem::new("Settings", Route::Settings),
];

pub fn base_navigation() -> Vec<NavItem> {
    BASE.to_vec()
}

/// The administrative entry shown to privileged roles only.
pub fn admin_entry() -> NavItem {
    NavItem::new("Admin", Route::Admin)
}

/// Entries visible to `profile`.
///
/// For a privileged role the admin entry goes immediately before the last base
/// entry; everyone else (including an unresolved profile) gets `base` as is.
pub fn navigation_for(base: &[NavItem], profile: Option<&Profile>) -> Vec<NavItem> {
    let mut items = base.to_vec();
    if profile.is_some_and(|p| p.role.is_privileged()) {
        let at = items.len().saturating_sub(1);
        items.insert(at, admin_entry());
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use miniteacher_core::UserId;
    use proptest::prelude::*;

    fn profile(role: Role) -> Profile {
        Profile {
            id: UserId::new(),
            name: None,
            lastname: None,
            nick: None,
            role,
        }
    }

    #[test]
    fn administrator_gets_admin_before_settings() {
        let base = base_navigation();
        let items = navigation_for(&base, Some(&profile(Role::Administrator)));

        assert_eq!(items.len(), base.len() + 1);
        assert_eq!(items[3], admin_entry());
        assert_eq!(items.last().map(|i| i.route), Some(Route::Settings));
    }

    #[test]
    fn student_gets_base_list() {
        let base = base_navigation();
        assert_eq!(navigation_for(&base, Some(&profile(Role::Student))), base);
    }

    #[test]
    fn unresolved_profile_gets_base_list() {
        let base = base_navigation();
        assert_eq!(navigation_for(&base, None), base);
    }

    #[test]
    fn empty_base_still_receives_admin_entry() {
        let items = navigation_for(&[], Some(&profile(Role::Instructor)));
        assert_eq!(items, vec![admin_entry()]);
    }

    #[test]
    fn active_entry_matches_nested_location() {
        let challenges = NavItem::new("Challenges", Route::Challenges);
        assert!(challenges.is_active("/challenges/42"));
        assert!(challenges.is_active("/challenges?page=2"));
        assert!(!challenges.is_active("/dashboard"));
    }

    #[test]
    fn active_entry_requires_whole_segment() {
        let settings = NavItem::new("Settings", Route::Settings);
        assert!(settings.is_active("/settings"));
        assert!(!settings.is_active("/settingsx"));
    }

    proptest! {
        /// Property: output is the base list, plus exactly one admin entry in
        /// the penultimate slot for privileged roles.
        #[test]
        fn admin_entry_only_for_privileged(
            role in prop::sample::select(Role::ALL.to_vec()),
            len in 1usize..6,
        ) {
            let base: Vec<NavItem> = base_navigation().into_iter().cycle().take(len).collect();
            let items = navigation_for(&base, Some(&profile(role)));

            if role.is_privileged() {
                prop_assert_eq!(items.len(), base.len() + 1);
                prop_assert_eq!(&items[len - 1], &admin_entry());
                let mut without = items.clone();
                without.remove(len - 1);
                prop_assert_eq!(without, base);
            } else {
                prop_assert_eq!(items, base);
            }
        }
    }
}
