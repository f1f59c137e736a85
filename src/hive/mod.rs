//! Hive-facing interface of the search engine.
//!
//! Hive binary-format parsing lives outside this crate. The engine only
//! requires something that can be loaded into a walkable key/value tree and
//! that calls back once per key and once per value during a single
//! traversal. [`MemoryHive`] is a reference implementation of that contract
//! backed by an in-memory tree.

mod memory;

pub use memory::MemoryHive;

use anyhow::Result;
use chrono::{DateTime, Utc};

/// Registry value data types, matching the on-disk hive type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    None,
    Sz,
    ExpandSz,
    Binary,
    Dword,
    DwordBigEndian,
    Link,
    MultiSz,
    ResourceList,
    FullResourceDescriptor,
    ResourceRequirementsList,
    Qword,
}

/// Registry type names as they appear in term configurations.
const VALUE_TYPE_NAMES: &[(&str, ValueKind)] = &[
    ("_REG_NONE_", ValueKind::None),
    ("REG_SZ", ValueKind::Sz),
    ("REG_EXPAND_SZ", ValueKind::ExpandSz),
    ("REG_BINARY", ValueKind::Binary),
    ("REG_DWORD", ValueKind::Dword),
    ("REG_DWORD_LITTLE_ENDIAN", ValueKind::Dword),
    ("REG_DWORD_BIG_ENDIAN", ValueKind::DwordBigEndian),
    ("REG_LINK", ValueKind::Link),
    ("REG_MULTI_SZ", ValueKind::MultiSz),
    ("REG_RESOURCE_LIST", ValueKind::ResourceList),
    ("REG_FULL_RESOURCE_DESCRIPTOR", ValueKind::FullResourceDescriptor),
    ("REG_RESOURCE_REQUIREMENTS_LIST", ValueKind::ResourceRequirementsList),
    ("REG_QWORD", ValueKind::Qword),
    ("REG_QWORD_LITTLE_ENDIAN", ValueKind::Qword),
];

impl ValueKind {
    /// Resolve a registry type name (e.g. `REG_SZ`) to a kind.
    pub fn from_type_name(name: &str) -> Option<Self> {
        VALUE_TYPE_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, kind)| *kind)
    }

    /// Canonical registry type name for this kind.
    pub fn type_name(&self) -> &'static str {
        VALUE_TYPE_NAMES
            .iter()
            .find(|(_, kind)| kind == self)
            .map(|(name, _)| *name)
            .unwrap_or("_REG_NONE_")
    }

    /// True for the text-typed values (`REG_SZ`, `REG_EXPAND_SZ`,
    /// `REG_MULTI_SZ`) whose data is UTF-16.
    pub fn is_string_family(&self) -> bool {
        matches!(self, ValueKind::Sz | ValueKind::ExpandSz | ValueKind::MultiSz)
    }

    /// True for the fixed-width integer values.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ValueKind::Dword | ValueKind::DwordBigEndian | ValueKind::Qword
        )
    }
}

/// Kind of a registry key node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Root,
    Standard,
}

/// Read-only accessor for one live registry key during a walk.
pub trait HiveKey {
    /// Full path of the key from the hive root, `\`-separated.
    fn path(&self) -> &str;
    /// Short (leaf) name of the key.
    fn name(&self) -> &str;
    /// Class name of the key, often empty.
    fn class_name(&self) -> &str;
    fn subkey_count(&self) -> u32;
    fn value_count(&self) -> u32;
    fn last_modified(&self) -> DateTime<Utc>;
    fn kind(&self) -> KeyKind;
}

/// Read-only accessor for one live registry value during a walk.
pub trait HiveValue {
    /// Value name; the default value of a key has an empty name.
    fn name(&self) -> &str;
    fn kind(&self) -> ValueKind;
    /// Raw value data. May be empty.
    fn data(&self) -> &[u8];
    /// The key this value is attached to.
    fn parent(&self) -> &dyn HiveKey;
}

/// Receiver for walk events. The walker must report every key exactly once
/// (pre-order; sibling order is unspecified) and every value under each key
/// exactly once.
pub trait WalkSink {
    fn on_key(&mut self, key: &dyn HiveKey);
    fn on_value(&mut self, value: &dyn HiveValue);
}

/// A loaded hive that can be traversed exactly once per call.
pub trait Hive {
    /// Walk the whole tree, reporting keys and values to `sink`. An error
    /// aborts the walk; events already delivered remain valid.
    fn walk(&mut self, sink: &mut dyn WalkSink) -> Result<()>;
}

/// Source a hive can be loaded from. Loading failures are fatal to the
/// enclosing search: no partial results are produced.
pub trait HiveSource {
    fn load_hive(&mut self) -> Result<Box<dyn Hive + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_kind_from_type_name() {
        assert_eq!(ValueKind::from_type_name("REG_SZ"), Some(ValueKind::Sz));
        assert_eq!(
            ValueKind::from_type_name("REG_DWORD_LITTLE_ENDIAN"),
            Some(ValueKind::Dword)
        );
        assert_eq!(
            ValueKind::from_type_name("REG_QWORD_LITTLE_ENDIAN"),
            Some(ValueKind::Qword)
        );
        assert_eq!(ValueKind::from_type_name("REG_BOGUS"), None);
        assert_eq!(ValueKind::from_type_name("reg_sz"), None);
    }

    #[test]
    fn value_kind_type_name_round_trip() {
        assert_eq!(ValueKind::Sz.type_name(), "REG_SZ");
        assert_eq!(ValueKind::Dword.type_name(), "REG_DWORD");
        assert_eq!(ValueKind::MultiSz.type_name(), "REG_MULTI_SZ");
    }

    #[test]
    fn value_kind_families() {
        assert!(ValueKind::Sz.is_string_family());
        assert!(ValueKind::MultiSz.is_string_family());
        assert!(!ValueKind::Binary.is_string_family());
        assert!(ValueKind::Dword.is_numeric());
        assert!(ValueKind::DwordBigEndian.is_numeric());
        assert!(ValueKind::Qword.is_numeric());
        assert!(!ValueKind::Sz.is_numeric());
    }
}
