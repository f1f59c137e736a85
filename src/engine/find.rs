//! Walk orchestrator.
//!
//! [`RegFind`] owns the term index and the per-walk match table, drives one
//! traversal of a hive, and streams newly produced matches to
//! caller-supplied callbacks while the walk is in progress. The engine is
//! single-threaded and synchronous: callbacks run in-line and `find`
//! returns only after the walker exhausts the hive.

use anyhow::{Context, Result};
use log::{debug, error, info};

use crate::config::{TermSpec, TermTemplate};
use crate::engine::index::TermIndex;
use crate::engine::matcher::{lookup_key_spec, lookup_value_spec};
use crate::engine::matches::{Match, MatchTable};
use crate::engine::term::SearchTerm;
use crate::hive::{HiveKey, HiveSource, HiveValue, WalkSink};

/// Walk life cycle of the most recent `find` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindState {
    Idle,
    HiveLoaded,
    Walking,
    Done,
    Failed,
}

/// Registry search engine: registered terms plus the aggregate matches of
/// the most recent walk.
///
/// Term registration and matching are strictly sequential phases; an engine
/// instance must not be shared across concurrent walks.
pub struct RegFind {
    index: TermIndex,
    table: MatchTable,
    state: FindState,
}

impl Default for RegFind {
    fn default() -> Self {
        Self::new()
    }
}

impl RegFind {
    pub fn new() -> Self {
        RegFind {
            index: TermIndex::new(),
            table: MatchTable::new(),
            state: FindState::Idle,
        }
    }

    /// Register one validated term. Returns the id the engine assigned to
    /// it.
    pub fn add_search_term(&mut self, term: SearchTerm) -> usize {
        debug!("Registering search term: {}", term.description());
        let id = self.index.terms().len();
        self.index.add(term);
        id
    }

    /// Build and register a batch of declarative term specifications.
    ///
    /// A malformed spec is dropped and reported; the rest of the batch is
    /// processed regardless. Returns the rejected specs as
    /// `(batch index, error)` pairs.
    pub fn add_terms(&mut self, specs: &[TermSpec]) -> Vec<(usize, anyhow::Error)> {
        let mut rejected = Vec::new();
        for (idx, spec) in specs.iter().enumerate() {
            match SearchTerm::from_spec(spec) {
                Ok(term) => {
                    self.add_search_term(term);
                }
                Err(e) => {
                    error!("Rejected search term #{idx}: {e:#}");
                    rejected.push((idx, e));
                }
            }
        }
        rejected
    }

    /// Register every term of a template; each registered term carries the
    /// template name.
    pub fn add_template(&mut self, template: &TermTemplate) -> Vec<(usize, anyhow::Error)> {
        let mut rejected = Vec::new();
        for (idx, spec) in template.terms.iter().enumerate() {
            match SearchTerm::from_spec(spec) {
                Ok(mut term) => {
                    term.set_term_name(&template.name);
                    self.add_search_term(term);
                }
                Err(e) => {
                    error!(
                        "Rejected search term #{idx} of template '{}': {e:#}",
                        template.name
                    );
                    rejected.push((idx, e));
                }
            }
        }
        rejected
    }

    /// Number of active (accepted) terms.
    pub fn term_count(&self) -> usize {
        self.index.terms().len()
    }

    /// Walk life cycle of the most recent `find` call.
    pub fn state(&self) -> FindState {
        self.state
    }

    /// Log a description of every registered term.
    pub fn log_specs(&self) {
        info!("Registry search details:");
        for term in self.index.terms() {
            info!("  [{}] {}", term.term_name(), term.description());
        }
    }

    /// Aggregate matches of the most recent walk, one per matched term.
    pub fn matches(&self) -> impl Iterator<Item = &Match> {
        self.table.iter()
    }

    pub fn clear_matches(&mut self) {
        self.table.clear();
    }

    /// Load a hive from `source` and walk it once, evaluating every
    /// registered term against every key and value.
    ///
    /// `on_key` / `on_value` are invoked in-line for each key/value event
    /// that affected at least one term; they receive the aggregate matches
    /// updated by that event. Per-term match state is cleared first, so
    /// results never leak across `find` calls on the same engine.
    ///
    /// A hive load failure or a walk error is fatal to this call; matches
    /// already streamed to the callbacks before a walk error remain valid.
    pub fn find<S, KF, VF>(&mut self, source: &mut S, on_key: KF, on_value: VF) -> Result<()>
    where
        S: HiveSource + ?Sized,
        KF: FnMut(&[&Match]),
        VF: FnMut(&[&Match]),
    {
        self.table.clear();
        self.state = FindState::Idle;

        if self.index.is_empty() {
            debug!("No search terms registered, nothing to find");
        }

        let mut hive = match source.load_hive() {
            Ok(hive) => hive,
            Err(e) => {
                self.state = FindState::Failed;
                return Err(e).context("cannot load hive");
            }
        };
        self.state = FindState::HiveLoaded;

        self.state = FindState::Walking;
        let mut on_key = on_key;
        let mut on_value = on_value;
        let walked = {
            let mut sink = EngineSink {
                index: &self.index,
                table: &mut self.table,
                on_key: &mut on_key,
                on_value: &mut on_value,
            };
            hive.walk(&mut sink)
        };
        drop(hive);

        match walked {
            Ok(()) => {
                self.state = FindState::Done;
                debug!("Hive walk done, {} terms matched", self.table.len());
                Ok(())
            }
            Err(e) => {
                self.state = FindState::Failed;
                Err(e).context("cannot walk hive")
            }
        }
    }
}

/// Adapter between the walker contract and the matching engine.
struct EngineSink<'a, KF, VF> {
    index: &'a TermIndex,
    table: &'a mut MatchTable,
    on_key: &'a mut KF,
    on_value: &'a mut VF,
}

impl<KF, VF> EngineSink<'_, KF, VF>
where
    KF: FnMut(&[&Match]),
    VF: FnMut(&[&Match]),
{
    fn key_matches(&mut self, key: &dyn HiveKey) -> Vec<usize> {
        let mut affected = Vec::new();

        for term in self.index.for_key_name(key.name()) {
            if term.depends_on_value_or_data() {
                continue;
            }
            if lookup_key_spec(term, key) {
                self.table.record_key(term, key);
                affected.push(term.id());
            }
        }

        for term in self.index.for_key_path(key.path()) {
            if term.depends_on_value_or_data() {
                continue;
            }
            if lookup_key_spec(term, key) {
                self.table.record_key(term, key);
                affected.push(term.id());
            }
        }

        for term in self.index.generic() {
            if term.depends_on_value_or_data() {
                continue;
            }
            if lookup_key_spec(term, key) {
                self.table.record_key(term, key);
                affected.push(term.id());
            }
        }

        affected
    }

    fn value_matches(&mut self, value: &dyn HiveValue) -> Vec<usize> {
        let mut affected = Vec::new();
        let parent = value.parent();

        for term in self.index.for_key_name(parent.name()) {
            if !term.depends_on_value_or_data() {
                continue;
            }
            if lookup_value_spec(term, value) {
                self.table.record_value(term, value);
                affected.push(term.id());
            }
        }

        for term in self.index.for_key_path(parent.path()) {
            if !term.depends_on_value_or_data() {
                continue;
            }
            if lookup_value_spec(term, value) {
                self.table.record_value(term, value);
                affected.push(term.id());
            }
        }

        for term in self.index.for_value_name(value.name()) {
            if lookup_value_spec(term, value) {
                self.table.record_value(term, value);
                affected.push(term.id());
            }
        }

        for term in self.index.generic() {
            if !term.depends_on_value_or_data() {
                continue;
            }
            if lookup_value_spec(term, value) {
                self.table.record_value(term, value);
                affected.push(term.id());
            }
        }

        affected
    }
}

impl<KF, VF> WalkSink for EngineSink<'_, KF, VF>
where
    KF: FnMut(&[&Match]),
    VF: FnMut(&[&Match]),
{
    fn on_key(&mut self, key: &dyn HiveKey) {
        let affected = self.key_matches(key);
        if affected.is_empty() {
            return;
        }
        let hits: Vec<&Match> = affected
            .iter()
            .filter_map(|id| self.table.get(*id))
            .collect();
        (self.on_key)(&hits);
    }

    fn on_value(&mut self, value: &dyn HiveValue) {
        let affected = self.value_matches(value);
        if affected.is_empty() {
            return;
        }
        let hits: Vec<&Match> = affected
            .iter()
            .filter_map(|id| self.table.get(*id))
            .collect();
        (self.on_value)(&hits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::wide::utf16le_bytes;
    use crate::hive::{MemoryHive, ValueKind};

    fn sz(text: &str) -> Vec<u8> {
        let mut data = utf16le_bytes(text);
        data.extend_from_slice(&[0, 0]);
        data
    }

    #[test]
    fn find_streams_and_aggregates() {
        let mut engine = RegFind::new();
        let mut spec = TermSpec::default();
        spec.value = Some("Shell".to_string());
        assert!(engine.add_terms(&[spec]).is_empty());

        let mut hive = MemoryHive::new("ROOT");
        hive.add_value("A", "Shell", ValueKind::Sz, &sz("explorer.exe"));
        hive.add_value("B", "Shell", ValueKind::Sz, &sz("cmd.exe"));

        let mut events = 0;
        engine
            .find(&mut hive, |_keys| {}, |values| {
                events += 1;
                assert_eq!(values.len(), 1);
            })
            .unwrap();

        assert_eq!(events, 2);
        assert_eq!(engine.state(), FindState::Done);
        let all: Vec<&Match> = engine.matches().collect();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].values.len(), 2);
    }

    #[test]
    fn failing_source_is_fatal() {
        struct BadSource;
        impl HiveSource for BadSource {
            fn load_hive(&mut self) -> Result<Box<dyn crate::hive::Hive + '_>> {
                anyhow::bail!("truncated hive")
            }
        }

        let mut engine = RegFind::new();
        let mut spec = TermSpec::default();
        spec.key = Some("Run".to_string());
        engine.add_terms(&[spec]);

        let err = engine
            .find(&mut BadSource, |_| {}, |_| {})
            .unwrap_err();
        assert!(format!("{err:#}").contains("cannot load hive"));
        assert_eq!(engine.state(), FindState::Failed);
        assert_eq!(engine.matches().count(), 0);
    }

    #[test]
    fn matches_reset_between_finds() {
        let mut engine = RegFind::new();
        let mut spec = TermSpec::default();
        spec.key = Some("Run".to_string());
        engine.add_terms(&[spec]);

        let mut hive = MemoryHive::new("ROOT");
        hive.add_key("Run");

        engine.find(&mut hive, |_| {}, |_| {}).unwrap();
        assert_eq!(engine.matches().next().unwrap().keys.len(), 1);

        engine.find(&mut hive, |_| {}, |_| {}).unwrap();
        // still one snapshot, not two accumulated across walks
        assert_eq!(engine.matches().next().unwrap().keys.len(), 1);
    }
}
