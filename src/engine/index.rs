//! Exact-lookup pre-filter over registered search terms.
//!
//! Terms whose qualifying field is an exact name are stored in
//! case-insensitive hash maps so a hive walk pays a map lookup instead of a
//! linear scan; everything else goes to the generic list. The index is a
//! performance pre-filter only: every candidate it yields is re-validated
//! against the term's full criteria set at match time.

use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::term::{Criteria, SearchTerm};

/// Which structure a term was classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Bucket {
    KeyName,
    KeyPath,
    ValueName,
    Generic,
}

#[derive(Default)]
pub(crate) struct TermIndex {
    terms: Vec<Arc<SearchTerm>>,
    key_name_specs: HashMap<String, Vec<Arc<SearchTerm>>>,
    key_path_specs: HashMap<String, Vec<Arc<SearchTerm>>>,
    value_name_specs: HashMap<String, Vec<Arc<SearchTerm>>>,
    generic_specs: Vec<Arc<SearchTerm>>,
}

const NO_TERMS: &[Arc<SearchTerm>] = &[];

impl TermIndex {
    pub(crate) fn new() -> Self {
        TermIndex::default()
    }

    /// Classify and store a validated term. Classification picks the first
    /// applicable bucket in priority order: exact key name, exact key path,
    /// exact value name, generic.
    pub(crate) fn add(&mut self, mut term: SearchTerm) -> Bucket {
        term.id = self.terms.len();
        let required = term.required();
        let term = Arc::new(term);
        self.terms.push(term.clone());

        let bucket = if required.contains(Criteria::KEY_NAME)
            && !required.contains(Criteria::VALUE_NAME)
        {
            self.key_name_specs
                .entry(term.key_name().to_lowercase())
                .or_default()
                .push(term);
            Bucket::KeyName
        } else if required.contains(Criteria::KEY_PATH)
            && !required.contains(Criteria::VALUE_NAME)
        {
            self.key_path_specs
                .entry(term.key_path().to_lowercase())
                .or_default()
                .push(term);
            Bucket::KeyPath
        } else if required.contains(Criteria::VALUE_NAME) {
            self.value_name_specs
                .entry(term.value_name().to_lowercase())
                .or_default()
                .push(term);
            Bucket::ValueName
        } else {
            self.generic_specs.push(term);
            Bucket::Generic
        };
        bucket
    }

    /// Exact-key-name candidates for a key's short name.
    pub(crate) fn for_key_name(&self, name: &str) -> &[Arc<SearchTerm>] {
        self.key_name_specs
            .get(&name.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(NO_TERMS)
    }

    /// Exact-key-path candidates for a key's full path.
    pub(crate) fn for_key_path(&self, path: &str) -> &[Arc<SearchTerm>] {
        self.key_path_specs
            .get(&path.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(NO_TERMS)
    }

    /// Exact-value-name candidates for a value's name.
    pub(crate) fn for_value_name(&self, name: &str) -> &[Arc<SearchTerm>] {
        self.value_name_specs
            .get(&name.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(NO_TERMS)
    }

    /// Terms requiring linear evaluation against every key or value.
    pub(crate) fn generic(&self) -> &[Arc<SearchTerm>] {
        &self.generic_specs
    }

    /// All registered terms, in registration (id) order.
    pub(crate) fn terms(&self) -> &[Arc<SearchTerm>] {
        &self.terms
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TermSpec;

    fn term(adjust: impl FnOnce(&mut TermSpec)) -> SearchTerm {
        let mut spec = TermSpec::default();
        adjust(&mut spec);
        SearchTerm::from_spec(&spec).unwrap()
    }

    #[test]
    fn key_name_only_goes_to_key_name_map() {
        let mut index = TermIndex::new();
        let bucket = index.add(term(|s| s.key = Some("Run".to_string())));
        assert_eq!(bucket, Bucket::KeyName);
        assert_eq!(index.for_key_name("Run").len(), 1);
        assert!(index.generic().is_empty());
    }

    #[test]
    fn lookups_are_case_insensitive() {
        let mut index = TermIndex::new();
        index.add(term(|s| s.key = Some("RunOnce".to_string())));
        assert_eq!(index.for_key_name("runonce").len(), 1);
        assert_eq!(index.for_key_name("RUNONCE").len(), 1);
        assert!(index.for_key_name("run").is_empty());
    }

    #[test]
    fn key_path_with_data_criteria_still_indexes_by_path() {
        let mut index = TermIndex::new();
        let bucket = index.add(term(|s| {
            s.path = Some("ROOT\\Software".to_string());
            s.data = Some("x".to_string());
        }));
        assert_eq!(bucket, Bucket::KeyPath);
        assert_eq!(index.for_key_path("root\\software").len(), 1);
    }

    #[test]
    fn value_name_beats_path_and_key_never_applies_with_value_name() {
        let mut index = TermIndex::new();
        let bucket = index.add(term(|s| {
            s.key = Some("Run".to_string());
            s.value = Some("Shell".to_string());
        }));
        assert_eq!(bucket, Bucket::ValueName);
        assert!(index.for_key_name("Run").is_empty());
        assert_eq!(index.for_value_name("shell").len(), 1);
    }

    #[test]
    fn regex_only_terms_are_generic() {
        let mut index = TermIndex::new();
        let bucket = index.add(term(|s| s.key_regex = Some("Run.*".to_string())));
        assert_eq!(bucket, Bucket::Generic);
        assert_eq!(index.generic().len(), 1);
    }

    #[test]
    fn every_term_lands_in_exactly_one_bucket() {
        let mut index = TermIndex::new();
        index.add(term(|s| s.key = Some("a".to_string())));
        index.add(term(|s| s.path = Some("b".to_string())));
        index.add(term(|s| s.value = Some("c".to_string())));
        index.add(term(|s| s.value_regex = Some("d.*".to_string())));

        let indexed = index.for_key_name("a").len()
            + index.for_key_path("b").len()
            + index.for_value_name("c").len()
            + index.generic().len();
        assert_eq!(indexed, index.terms().len());
        // Ids follow registration order.
        for (expected, t) in index.terms().iter().enumerate() {
            assert_eq!(t.id(), expected);
        }
    }
}
