// assignation.rs - Localization Key Ownership
// Records which module signatures own which localization keys so that one
// module cannot purge strings another module still depends on.

use std::collections::HashMap;

use log::debug;

use crate::error::LocalizerError;

/// Key -> ordered owner list.
#[derive(Debug, Default)]
pub struct KeyAssignation {
    owners: HashMap<String, Vec<String>>,
}

impl KeyAssignation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `owner` on every key.
    ///
    /// All-or-nothing: every key is checked before anything is recorded, so a
    /// duplicate anywhere in the list leaves the registry untouched.
    pub fn assign_keys<S: AsRef<str>>(
        &mut self,
        keys: &[S],
        owner: &str,
    ) -> Result<Vec<String>, LocalizerError> {
        let mut seen: Vec<&str> = Vec::with_capacity(keys.len());
        for key in keys {
            let key = key.as_ref();
            let owned = self
                .owners
                .get(key)
                .map_or(false, |owners| owners.iter().any(|o| o == owner));
            if owned || seen.contains(&key) {
                return Err(LocalizerError::AlreadyAssigned {
                    key: key.to_string(),
                    owner: owner.to_string(),
                });
            }
            seen.push(key);
        }

        for key in &seen {
            self.owners
                .entry(key.to_string())
                .or_default()
                .push(owner.to_string());
        }
        Ok(seen.into_iter().map(str::to_string).collect())
    }

    /// Remove `owner` from every key it holds; returns the keys divested.
    pub fn divest_keys<S: AsRef<str>>(&mut self, keys: &[S], owner: &str) -> Vec<String> {
        let mut divested = Vec::new();
        for key in keys {
            let key = key.as_ref();
            let Some(owners) = self.owners.get_mut(key) else {
                debug!("[LOCALIZER] Key '{}' has no owners, skipping divest by '{}'", key, owner);
                continue;
            };
            let Some(position) = owners.iter().position(|o| o == owner) else {
                debug!("[LOCALIZER] Key '{}' is not owned by '{}', skipping", key, owner);
                continue;
            };
            owners.remove(position);
            divested.push(key.to_string());
        }
        divested
    }

    pub fn is_assigned(&self, key: &str) -> bool {
        self.owners.get(key).map_or(false, |owners| !owners.is_empty())
    }

    pub fn owners(&self, key: &str) -> &[String] {
        self.owners.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Drop keys nobody owns anymore and return them.
    pub fn prune(&mut self) -> Vec<String> {
        let free: Vec<String> = self
            .owners
            .iter()
            .filter(|(_, owners)| owners.is_empty())
            .map(|(key, _)| key.clone())
            .collect();
        for key in &free {
            self.owners.remove(key);
        }
        free
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_then_divest_frees_keys() {
        let mut keys = KeyAssignation::new();
        keys.assign_keys(&["A", "B"], "owner1").unwrap();
        assert!(keys.is_assigned("A"));
        assert!(keys.is_assigned("B"));

        let divested = keys.divest_keys(&["A", "B"], "owner1");
        assert_eq!(divested, vec!["A".to_string(), "B".to_string()]);
        assert!(!keys.is_assigned("A"));
        assert!(!keys.is_assigned("B"));
    }

    #[test]
    fn test_double_assignment_fails_and_keeps_ownership() {
        let mut keys = KeyAssignation::new();
        keys.assign_keys(&["A"], "owner1").unwrap();

        let err = keys.assign_keys(&["A"], "owner1").unwrap_err();
        assert!(matches!(err, LocalizerError::AlreadyAssigned { ref key, .. } if key == "A"));
        assert!(keys.is_assigned("A"));
        assert_eq!(keys.owners("A"), ["owner1".to_string()]);
    }

    #[test]
    fn test_failed_assignment_rolls_back_whole_call() {
        let mut keys = KeyAssignation::new();
        keys.assign_keys(&["B"], "owner1").unwrap();

        assert!(keys.assign_keys(&["A", "B"], "owner1").is_err());
        assert!(!keys.is_assigned("A"));

        assert!(keys.assign_keys(&["C", "C"], "owner2").is_err());
        assert!(!keys.is_assigned("C"));
    }

    #[test]
    fn test_shared_keys_survive_one_owner_leaving() {
        let mut keys = KeyAssignation::new();
        keys.assign_keys(&["A"], "owner1").unwrap();
        keys.assign_keys(&["A"], "owner2").unwrap();
        assert_eq!(keys.owners("A").len(), 2);

        keys.divest_keys(&["A"], "owner1");
        assert!(keys.is_assigned("A"));
        assert!(keys.prune().is_empty());

        keys.divest_keys(&["A"], "owner2");
        assert_eq!(keys.prune(), vec!["A".to_string()]);
        assert!(keys.owners("A").is_empty());
    }

    #[test]
    fn test_divest_skips_unknown_and_foreign_keys() {
        let mut keys = KeyAssignation::new();
        keys.assign_keys(&["A"], "owner1").unwrap();
        let divested = keys.divest_keys(&["A", "Z"], "owner2");
        assert!(divested.is_empty());
        assert!(keys.is_assigned("A"));
    }
}
