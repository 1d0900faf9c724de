//! Merging of named collections (envs, labels, volumes)
//!
//! Entries are keyed by an optional name. Updates replace the value of every
//! entry with a matching name, or append a new entry at the end in the order
//! the updates were given. Removals drop the first entry with a matching name.
//! Anonymous entries are never touched by updates or removals.

use indexmap::IndexMap;

use crate::error::{CoreError, Result};

/// An element of a mergeable collection
pub trait MergeEntry: Sized {
    /// The value an update assigns to an entry
    type Value: Clone;

    /// Human readable collection name used in errors ("env", "label", ...)
    const KIND: &'static str;

    /// The key used to match updates and removals
    fn entry_name(&self) -> Option<&str>;

    fn assign(&mut self, value: Self::Value);

    /// Build a new named entry for an unmatched update
    fn named(name: &str, value: Self::Value) -> Self;

    /// Validate the whole collection, returning one message per problem
    fn validate(entries: &[Self]) -> Vec<String>;
}

/// Apply updates then removals to `entries` and validate the result.
///
/// All validation problems are reported together.
pub fn merge<T: MergeEntry>(
    mut entries: Vec<T>,
    updates: &IndexMap<String, T::Value>,
    removals: &[String],
) -> Result<Vec<T>> {
    for (name, value) in updates {
        let mut matched = false;
        for entry in entries.iter_mut() {
            if entry.entry_name() == Some(name.as_str()) {
                entry.assign(value.clone());
                matched = true;
            }
        }
        if !matched {
            entries.push(T::named(name, value.clone()));
        }
    }

    for name in removals {
        if let Some(index) = entries
            .iter()
            .position(|e| e.entry_name() == Some(name.as_str()))
        {
            entries.remove(index);
        }
    }

    let errors = T::validate(&entries);
    if errors.is_empty() {
        Ok(entries)
    } else {
        Err(CoreError::InvalidEntries {
            subject: format!("{} configuration", T::KIND),
            errors,
        })
    }
}

/// Parsed command line changes for one collection
#[derive(Debug, Clone)]
pub struct ChangeSet<T: MergeEntry> {
    /// Anonymous entries, appended before the merge
    pub additions: Vec<T>,
    pub updates: IndexMap<String, T::Value>,
    pub removals: Vec<String>,
}

impl<T: MergeEntry> Default for ChangeSet<T> {
    fn default() -> Self {
        Self {
            additions: Vec::new(),
            updates: IndexMap::new(),
            removals: Vec::new(),
        }
    }
}

impl<T: MergeEntry> ChangeSet<T> {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.updates.is_empty() && self.removals.is_empty()
    }

    /// Apply these changes to an existing collection
    pub fn apply(&self, mut entries: Vec<T>) -> Result<Vec<T>>
    where
        T: Clone,
    {
        entries.extend(self.additions.iter().cloned());
        merge(entries, &self.updates, &self.removals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Pair {
        name: Option<String>,
        value: String,
    }

    impl Pair {
        fn new(name: Option<&str>, value: &str) -> Self {
            Self {
                name: name.map(str::to_string),
                value: value.to_string(),
            }
        }
    }

    impl MergeEntry for Pair {
        type Value = String;
        const KIND: &'static str = "pair";

        fn entry_name(&self) -> Option<&str> {
            self.name.as_deref()
        }

        fn assign(&mut self, value: String) {
            self.value = value;
        }

        fn named(name: &str, value: String) -> Self {
            Self::new(Some(name), &value)
        }

        fn validate(entries: &[Self]) -> Vec<String> {
            entries
                .iter()
                .enumerate()
                .filter(|(_, e)| e.value == "bad")
                .map(|(i, _)| format!("pair entry #{i} is bad"))
                .collect()
        }
    }

    fn updates(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_merge_updates_in_place_and_appends_in_order() {
        let entries = vec![Pair::new(Some("A"), "1"), Pair::new(Some("B"), "2")];
        let merged = merge(
            entries,
            &updates(&[("Z", "26"), ("A", "10"), ("C", "3")]),
            &[],
        )
        .unwrap();

        assert_eq!(
            merged,
            vec![
                Pair::new(Some("A"), "10"),
                Pair::new(Some("B"), "2"),
                Pair::new(Some("Z"), "26"),
                Pair::new(Some("C"), "3"),
            ]
        );
    }

    #[test]
    fn test_empty_change_keeps_entries_and_order() {
        let entries = vec![
            Pair::new(Some("C"), "3"),
            Pair::new(None, "{{ configMap:settings }}"),
            Pair::new(Some("A"), "1"),
            Pair::new(Some("B"), "2"),
        ];
        let merged = merge(entries.clone(), &IndexMap::new(), &[]).unwrap();
        assert_eq!(merged, entries);
    }

    #[test]
    fn test_merge_updates_every_duplicate() {
        let entries = vec![Pair::new(Some("A"), "1"), Pair::new(Some("A"), "2")];
        let merged = merge(entries, &updates(&[("A", "x")]), &[]).unwrap();
        assert!(merged.iter().all(|p| p.value == "x"));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_removes_first_match_only() {
        let entries = vec![
            Pair::new(Some("A"), "1"),
            Pair::new(Some("B"), "2"),
            Pair::new(Some("A"), "3"),
        ];
        let merged = merge(entries, &IndexMap::new(), &["A".to_string()]).unwrap();
        assert_eq!(
            merged,
            vec![Pair::new(Some("B"), "2"), Pair::new(Some("A"), "3")]
        );
    }

    #[test]
    fn test_merge_removal_of_missing_name_is_noop() {
        let entries = vec![Pair::new(Some("A"), "1")];
        let merged = merge(entries.clone(), &IndexMap::new(), &["Q".to_string()]).unwrap();
        assert_eq!(merged, entries);
    }

    #[test]
    fn test_merge_leaves_anonymous_entries_alone() {
        let entries = vec![Pair::new(None, "anon"), Pair::new(Some("A"), "1")];
        let merged = merge(entries, &updates(&[("A", "2")]), &["A".to_string()]).unwrap();
        assert_eq!(merged, vec![Pair::new(None, "anon")]);
    }

    #[test]
    fn test_merge_reports_all_errors() {
        let entries = vec![Pair::new(Some("A"), "bad")];
        let err = merge(entries, &updates(&[("B", "bad")]), &[]).unwrap_err();
        match err {
            CoreError::InvalidEntries { subject, errors } => {
                assert_eq!(subject, "pair configuration");
                assert_eq!(errors.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
