//! # regfind
//!
//! A criteria-based search engine for Windows registry hives.
//!
//! ## Overview
//!
//! regfind evaluates declarative search terms against every key and value
//! of a registry hive in a single pass. Terms combine criteria on key
//! names, key paths, value names, value types, data content and data size;
//! a key or value matches a term only when it satisfies every criterion
//! the term carries. Matches are streamed to callbacks during the walk and
//! aggregated per term for inspection afterwards.
//!
//! ## Features
//!
//! - **Composite terms**: key name/path, value name, value type, data
//!   content, data substring and data size criteria, freely combined
//! - **Exact-lookup index**: terms anchored on an exact name are resolved
//!   with a hash lookup instead of a linear scan
//! - **Type-aware data matching**: UTF-16 string values, multi-strings,
//!   DWORD/QWORD numerics and raw binary each compare the way the
//!   registry stores them
//! - **Owned match snapshots**: results stay valid after the hive closes
//! - **YAML configuration**: term lists and named templates load from
//!   declarative documents; a malformed term never rejects the batch
//!
//! ## Usage
//!
//! ```no_run
//! use regfind::{RegFind, TermSpec};
//! use regfind::hive::{MemoryHive, ValueKind};
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut engine = RegFind::new();
//!
//! let mut spec = TermSpec::default();
//! spec.key = Some("Run".to_string());
//! engine.add_terms(&[spec]);
//!
//! let mut hive = MemoryHive::new("ROOT");
//! hive.add_key("Software\\Microsoft\\Windows\\CurrentVersion\\Run");
//!
//! engine.find(&mut hive, |keys| {
//!     for m in keys {
//!         println!("hit for term [{}]", m.term().term_name());
//!     }
//! }, |_values| {})?;
//!
//! for m in engine.matches() {
//!     println!("{} keys, {} values", m.keys.len(), m.values.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`config`]: declarative term specifications and YAML loading
//! - [`engine`]: term model, index, criterion evaluation and the walk
//!   orchestrator
//! - [`hive`]: hive access traits and the in-memory hive implementation

/// Declarative term specifications and YAML loading
pub mod config;

/// Term model, index, criterion evaluation and the walk orchestrator
pub mod engine;

/// Hive access traits and the in-memory hive implementation
pub mod hive;

pub use config::{
    specs_from_yaml, specs_from_yaml_file, template_from_yaml, template_from_yaml_file, TermSpec,
    TermTemplate,
};
pub use engine::find::{FindState, RegFind};
pub use engine::matches::{KeyMatch, Match, ValueMatch};
pub use engine::term::{Criteria, SearchTerm};
