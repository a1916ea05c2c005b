//! Reverse index of manager references that did not resolve yet.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use dashmap::DashMap;

/// identifier -> ids of the users waiting for a manager with that identifier
type Waiting = HashMap<String, BTreeSet<String>>;

/// Users whose manager was given by an identifier that matched no user.
///
/// Keyed per application. When a user that answers to one of the
/// identifiers is created or updated, the waiting users are re-pointed at it.
#[derive(Clone, Default)]
pub(super) struct PendingManagers {
    apps: Arc<DashMap<String, Waiting>>,
}

impl PendingManagers {
    /// Record that `user_id` waits for a manager known as `identifier`.
    pub fn record(&self, app_id: &str, identifier: &str, user_id: &str) {
        self.apps
            .entry(app_id.to_string())
            .or_default()
            .entry(identifier.to_string())
            .or_default()
            .insert(user_id.to_string());
    }

    /// Drop every entry for `user_id`.
    pub fn forget(&self, app_id: &str, user_id: &str) {
        if let Some(mut waiting) = self.apps.get_mut(app_id) {
            waiting.retain(|_, users| {
                users.remove(user_id);
                !users.is_empty()
            });
        }
    }

    /// Remove and return the users waiting for any of `identifiers`.
    pub fn take_matching(&self, app_id: &str, identifiers: &[String]) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        if let Some(mut waiting) = self.apps.get_mut(app_id) {
            for identifier in identifiers {
                if let Some(users) = waiting.remove(identifier) {
                    found.extend(users);
                }
            }
        }
        found
    }

    /// Identifiers `user_id` is waiting for.
    #[cfg(test)]
    pub fn waiting_for(&self, app_id: &str, user_id: &str) -> Vec<String> {
        self.apps
            .get(app_id)
            .map(|waiting| {
                let mut identifiers: Vec<String> = waiting
                    .iter()
                    .filter(|(_, users)| users.contains(user_id))
                    .map(|(identifier, _)| identifier.clone())
                    .collect();
                identifiers.sort();
                identifiers
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_take() {
        let pending = PendingManagers::default();
        pending.record("app", "boss@example.com", "u-1");
        pending.record("app", "boss@example.com", "u-2");
        pending.record("app", "ext-9", "u-3");

        let found = pending.take_matching(
            "app",
            &["boss@example.com".to_string(), "other".to_string()],
        );
        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec!["u-1", "u-2"]);

        assert!(
            pending
                .take_matching("app", &["boss@example.com".to_string()])
                .is_empty()
        );
        assert_eq!(pending.waiting_for("app", "u-3"), vec!["ext-9"]);
    }

    #[test]
    fn test_scoped_by_app() {
        let pending = PendingManagers::default();
        pending.record("app-a", "boss", "u-1");
        assert!(pending.take_matching("app-b", &["boss".to_string()]).is_empty());
        assert_eq!(pending.take_matching("app-a", &["boss".to_string()]).len(), 1);
    }

    #[test]
    fn test_forget() {
        let pending = PendingManagers::default();
        pending.record("app", "boss", "u-1");
        pending.record("app", "boss", "u-2");
        pending.forget("app", "u-1");

        assert!(pending.waiting_for("app", "u-1").is_empty());
        let found = pending.take_matching("app", &["boss".to_string()]);
        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec!["u-2"]);
    }
}
