//! In-memory hive tree.
//!
//! A programmatically built key/value tree implementing the walker contract.
//! Used as the reference walker in tests and wherever a hive has already
//! been decoded by an external parser.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::hive::{Hive, HiveKey, HiveSource, HiveValue, KeyKind, ValueKind, WalkSink};

/// One key node of a [`MemoryHive`].
#[derive(Debug, Clone)]
pub struct MemoryKey {
    name: String,
    path: String,
    class_name: String,
    last_modified: DateTime<Utc>,
    kind: KeyKind,
    subkeys: Vec<MemoryKey>,
    values: Vec<MemoryValue>,
}

#[derive(Debug, Clone)]
struct MemoryValue {
    name: String,
    kind: ValueKind,
    data: Vec<u8>,
}

impl MemoryKey {
    fn new(name: &str, path: &str, kind: KeyKind) -> Self {
        MemoryKey {
            name: name.to_string(),
            path: path.to_string(),
            class_name: String::new(),
            last_modified: Utc::now(),
            kind,
            subkeys: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn set_class_name(&mut self, class_name: &str) {
        self.class_name = class_name.to_string();
    }

    pub fn set_last_modified(&mut self, when: DateTime<Utc>) {
        self.last_modified = when;
    }

    /// Attach a value to this key.
    pub fn add_value(&mut self, name: &str, kind: ValueKind, data: &[u8]) {
        self.values.push(MemoryValue {
            name: name.to_string(),
            kind,
            data: data.to_vec(),
        });
    }
}

impl HiveKey for MemoryKey {
    fn path(&self) -> &str {
        &self.path
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn subkey_count(&self) -> u32 {
        self.subkeys.len() as u32
    }

    fn value_count(&self) -> u32 {
        self.values.len() as u32
    }

    fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    fn kind(&self) -> KeyKind {
        self.kind
    }
}

struct MemoryValueRef<'a> {
    value: &'a MemoryValue,
    parent: &'a MemoryKey,
}

impl HiveValue for MemoryValueRef<'_> {
    fn name(&self) -> &str {
        &self.value.name
    }

    fn kind(&self) -> ValueKind {
        self.value.kind
    }

    fn data(&self) -> &[u8] {
        &self.value.data
    }

    fn parent(&self) -> &dyn HiveKey {
        self.parent
    }
}

/// An in-memory registry hive.
///
/// Key paths are `\`-separated and rooted at the root key's name:
/// a key added as `Software\Run` under a root named `ROOT` has the full
/// path `ROOT\Software\Run` and the short name `Run`.
#[derive(Debug, Clone)]
pub struct MemoryHive {
    root: MemoryKey,
}

impl MemoryHive {
    /// Create a hive with the given root key name.
    pub fn new(root_name: &str) -> Self {
        MemoryHive {
            root: MemoryKey::new(root_name, root_name, KeyKind::Root),
        }
    }

    /// Create or retrieve the key at `path` (relative to the root),
    /// creating intermediate keys as needed.
    pub fn add_key(&mut self, path: &str) -> &mut MemoryKey {
        let mut current = &mut self.root;
        for part in path.split('\\').filter(|p| !p.is_empty()) {
            let pos = current.subkeys.iter().position(|k| k.name == part);
            current = match pos {
                Some(idx) => &mut current.subkeys[idx],
                None => {
                    let full = format!("{}\\{}", current.path, part);
                    current.subkeys.push(MemoryKey::new(part, &full, KeyKind::Standard));
                    let last = current.subkeys.len() - 1;
                    &mut current.subkeys[last]
                }
            };
        }
        current
    }

    /// Attach a value to the key at `path`, creating the key if needed.
    pub fn add_value(&mut self, path: &str, name: &str, kind: ValueKind, data: &[u8]) {
        self.add_key(path).add_value(name, kind, data);
    }

    fn walk_key(key: &MemoryKey, sink: &mut dyn WalkSink) {
        sink.on_key(key);
        for value in &key.values {
            sink.on_value(&MemoryValueRef { value, parent: key });
        }
        for subkey in &key.subkeys {
            Self::walk_key(subkey, sink);
        }
    }
}

impl Hive for MemoryHive {
    fn walk(&mut self, sink: &mut dyn WalkSink) -> Result<()> {
        Self::walk_key(&self.root, sink);
        Ok(())
    }
}

impl HiveSource for MemoryHive {
    fn load_hive(&mut self) -> Result<Box<dyn Hive + '_>> {
        Ok(Box::new(MemoryWalk { hive: self }))
    }
}

struct MemoryWalk<'a> {
    hive: &'a MemoryHive,
}

impl Hive for MemoryWalk<'_> {
    fn walk(&mut self, sink: &mut dyn WalkSink) -> Result<()> {
        MemoryHive::walk_key(&self.hive.root, sink);
        Ok(())
    }
}
