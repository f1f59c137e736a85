//! Search terms: declarative pattern specifications over registry keys and
//! values.
//!
//! A term is a bitmask of required criteria plus the payloads backing each
//! criterion. Matching requires every requested criterion to be satisfied
//! independently (logical AND across categories); exact and regex variants
//! within one category are alternatives. Terms are immutable after build.

use std::fmt::Write as _;

use anyhow::{bail, Context, Result};
use bitflags::bitflags;
use regex::bytes::Regex as BytesRegex;
use regex::Regex;

use crate::config::TermSpec;
use crate::engine::wide::{utf16le_bytes, utf16le_lossy};
use crate::hive::ValueKind;

bitflags! {
    /// Criteria a search term can require. Each flag is independent; a term
    /// combining several flags matches only keys/values satisfying all of
    /// them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Criteria: u16 {
        const KEY_NAME = 1;
        const KEY_NAME_REGEX = 1 << 1;
        const KEY_PATH = 1 << 2;
        const KEY_PATH_REGEX = 1 << 3;
        const VALUE_NAME = 1 << 4;
        const VALUE_NAME_REGEX = 1 << 5;
        const VALUE_TYPE = 1 << 6;
        const DATA_SIZE_EQUAL = 1 << 7;
        const DATA_SIZE_LESS = 1 << 8;
        const DATA_SIZE_MORE = 1 << 9;
        const DATA_CONTENT = 1 << 10;
        const DATA_CONTENT_REGEX = 1 << 11;
        const DATA_CONTAINS = 1 << 12;
    }
}

impl Criteria {
    /// Key short-name category (exact or regex).
    pub const KEY_NAME_MASK: Criteria =
        Criteria::KEY_NAME.union(Criteria::KEY_NAME_REGEX);

    /// Key full-path category.
    pub const KEY_PATH_MASK: Criteria =
        Criteria::KEY_PATH.union(Criteria::KEY_PATH_REGEX);

    /// Value-name category.
    pub const VALUE_NAME_MASK: Criteria =
        Criteria::VALUE_NAME.union(Criteria::VALUE_NAME_REGEX);

    /// Value-type category.
    pub const VALUE_TYPE_MASK: Criteria = Criteria::VALUE_TYPE;

    /// Data category: content, regex, contains, and all size bounds.
    pub const DATA_MASK: Criteria = Criteria::DATA_CONTENT
        .union(Criteria::DATA_CONTENT_REGEX)
        .union(Criteria::DATA_CONTAINS)
        .union(Criteria::DATA_SIZE_EQUAL)
        .union(Criteria::DATA_SIZE_LESS)
        .union(Criteria::DATA_SIZE_MORE);

    /// Every criterion that can only be decided against a value.
    pub const VALUE_OR_DATA_MASK: Criteria = Criteria::VALUE_NAME_MASK
        .union(Criteria::VALUE_TYPE_MASK)
        .union(Criteria::DATA_MASK);
}

/// One validated search term.
pub struct SearchTerm {
    pub(crate) id: usize,
    required: Criteria,
    term_name: String,

    key_name: String,
    key_name_regex: Option<Regex>,

    key_path: String,
    key_path_regex: Option<Regex>,

    value_name: String,
    value_name_regex: Option<Regex>,

    value_kind: Option<ValueKind>,

    data_size: u64,
    // Inclusive bounds, derived once at build time.
    data_size_low: u64,
    data_size_high: u64,

    data_content: Vec<u8>,
    // UTF-16LE mirror of the content pattern, so text-typed values can be
    // compared without re-encoding at match time.
    wide_data_content: Vec<u8>,
    wide_content_text: String,

    data_contains: Vec<u8>,
    wide_data_contains: Vec<u8>,

    data_regex_pattern: String,
    data_regex: Option<BytesRegex>,
    wide_data_regex: Option<Regex>,
}

/// Anchored, case-insensitive text regex. Matching uses whole-string
/// semantics.
fn compile_text_regex(field: &str, pattern: &str) -> Result<Regex> {
    Regex::new(&format!("(?i)^(?:{pattern})$"))
        .with_context(|| format!("invalid regex for field '{field}': '{pattern}'"))
}

fn compile_bytes_regex(field: &str, pattern: &str) -> Result<BytesRegex> {
    BytesRegex::new(&format!("(?si-u)^(?:{pattern})$"))
        .with_context(|| format!("invalid byte regex for field '{field}': '{pattern}'"))
}

/// Decode a hex data pattern. An optional `0x` prefix is stripped; an
/// odd-length string is left-padded with one `0` nibble before decoding.
/// The padding is preserved legacy behavior: it changes the numeric value
/// of the pattern (`123` decodes as `01 23`), it does not merely fix
/// parsing.
pub(crate) fn decode_hex_pattern(field: &str, input: &str) -> Result<Vec<u8>> {
    let digits = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    if digits.is_empty() {
        bail!("empty hex pattern for field '{field}'");
    }
    let padded = if digits.len() % 2 == 1 {
        format!("0{digits}")
    } else {
        digits.to_string()
    };
    hex::decode(&padded).with_context(|| format!("invalid hex for field '{field}': '{input}'"))
}

/// Parse a size specification: a decimal byte count with an optional
/// `K`/`M`/`G` suffix (an extra trailing `B` is accepted).
pub(crate) fn parse_data_size(field: &str, input: &str) -> Result<u64> {
    let trimmed = input.trim();
    let upper = trimmed.to_ascii_uppercase();
    let (digits, multiplier) = if let Some(n) = upper.strip_suffix("KB").or_else(|| upper.strip_suffix('K')) {
        (n.to_string(), 1024u64)
    } else if let Some(n) = upper.strip_suffix("MB").or_else(|| upper.strip_suffix('M')) {
        (n.to_string(), 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix("GB").or_else(|| upper.strip_suffix('G')) {
        (n.to_string(), 1024 * 1024 * 1024)
    } else {
        (upper, 1)
    };
    let count: u64 = digits
        .trim()
        .parse()
        .with_context(|| format!("invalid size for field '{field}': '{input}'"))?;
    count
        .checked_mul(multiplier)
        .with_context(|| format!("size overflow for field '{field}': '{input}'"))
}

impl SearchTerm {
    /// Build a validated term from a declarative specification.
    ///
    /// Every recognized field present sets its payload and ORs the matching
    /// criterion bit. A spec with no recognized criterion, an invalid
    /// regex, an invalid value type, or an invalid size bound is rejected.
    pub fn from_spec(spec: &TermSpec) -> Result<Self> {
        let mut term = SearchTerm {
            id: 0,
            required: Criteria::empty(),
            term_name: spec.name.clone().unwrap_or_else(|| "DEFAULT".to_string()),
            key_name: String::new(),
            key_name_regex: None,
            key_path: String::new(),
            key_path_regex: None,
            value_name: String::new(),
            value_name_regex: None,
            value_kind: None,
            data_size: 0,
            data_size_low: 0,
            data_size_high: 0,
            data_content: Vec::new(),
            wide_data_content: Vec::new(),
            wide_content_text: String::new(),
            data_contains: Vec::new(),
            wide_data_contains: Vec::new(),
            data_regex_pattern: String::new(),
            data_regex: None,
            wide_data_regex: None,
        };

        if let Some(key) = &spec.key {
            term.key_name = key.clone();
            term.required |= Criteria::KEY_NAME;
        }
        if let Some(pattern) = &spec.key_regex {
            term.key_name = pattern.clone();
            term.key_name_regex = Some(compile_text_regex("key_regex", pattern)?);
            term.required |= Criteria::KEY_NAME_REGEX;
        }

        if let Some(path) = &spec.path {
            term.key_path = path.clone();
            term.required |= Criteria::KEY_PATH;
        }
        if let Some(pattern) = &spec.path_regex {
            term.key_path = pattern.clone();
            term.key_path_regex = Some(compile_text_regex("path_regex", pattern)?);
            term.required |= Criteria::KEY_PATH_REGEX;
        }

        if let Some(value) = &spec.value {
            term.value_name = value.clone();
            term.required |= Criteria::VALUE_NAME;
        }
        if let Some(pattern) = &spec.value_regex {
            term.value_name = pattern.clone();
            term.value_name_regex = Some(compile_text_regex("value_regex", pattern)?);
            term.required |= Criteria::VALUE_NAME_REGEX;
        }

        if let Some(type_name) = &spec.value_type {
            let kind = ValueKind::from_type_name(type_name)
                .with_context(|| format!("invalid registry value type '{type_name}'"))?;
            if kind == ValueKind::None {
                bail!("invalid registry value type '{type_name}'");
            }
            term.value_kind = Some(kind);
            term.required |= Criteria::VALUE_TYPE;
        }

        if let Some(literal) = &spec.data {
            term.data_content = literal.as_bytes().to_vec();
            term.wide_data_content = utf16le_bytes(literal);
            term.wide_content_text = literal.clone();
            term.required |= Criteria::DATA_CONTENT;
        }
        if let Some(hex_pattern) = &spec.data_hex {
            let bytes = decode_hex_pattern("data_hex", hex_pattern)?;
            // The wide mirror of a hex pattern is the raw bytes themselves,
            // reinterpreted as UTF-16 when compared against SZ values.
            term.wide_content_text = utf16le_lossy(&bytes);
            term.wide_data_content = bytes.clone();
            term.data_content = bytes;
            term.required |= Criteria::DATA_CONTENT;
        }

        if let Some(size) = &spec.data_size {
            term.data_size = parse_data_size("data_size", size)?;
            term.required |= Criteria::DATA_SIZE_EQUAL;
        }
        if let Some(size) = &spec.data_size_less_than {
            let limit = parse_data_size("data_size_less_than", size)?;
            if limit == 0 {
                bail!("invalid zero size for field 'data_size_less_than'");
            }
            term.data_size_high = limit - 1;
            term.required |= Criteria::DATA_SIZE_LESS;
        }
        if let Some(size) = &spec.data_size_more_than {
            let limit = parse_data_size("data_size_more_than", size)?;
            term.data_size_low = limit
                .checked_add(1)
                .context("size overflow for field 'data_size_more_than'")?;
            term.required |= Criteria::DATA_SIZE_MORE;
        }
        if let Some(size) = &spec.data_size_at_most {
            let limit = parse_data_size("data_size_at_most", size)?;
            if limit == 0 {
                bail!("invalid zero size for field 'data_size_at_most'");
            }
            term.data_size_high = limit;
            term.required |= Criteria::DATA_SIZE_LESS;
        }
        if let Some(size) = &spec.data_size_at_least {
            term.data_size_low = parse_data_size("data_size_at_least", size)?;
            term.required |= Criteria::DATA_SIZE_MORE;
        }

        if let Some(pattern) = &spec.data_regex {
            term.data_regex = Some(compile_bytes_regex("data_regex", pattern)?);
            term.wide_data_regex = Some(compile_text_regex("data_regex", pattern)?);
            term.data_regex_pattern = pattern.clone();
            term.required |= Criteria::DATA_CONTENT_REGEX;
        }

        if let Some(literal) = &spec.data_contains {
            term.data_contains = literal.as_bytes().to_vec();
            term.wide_data_contains = utf16le_bytes(literal);
            term.required |= Criteria::DATA_CONTAINS;
        }
        if let Some(hex_pattern) = &spec.data_contains_hex {
            let bytes = decode_hex_pattern("data_contains_hex", hex_pattern)?;
            term.wide_data_contains = bytes.clone();
            term.data_contains = bytes;
            term.required |= Criteria::DATA_CONTAINS;
        }

        if term.required.is_empty() {
            bail!("search term has no recognized criteria, nothing to search for");
        }

        Ok(term)
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn required(&self) -> Criteria {
        self.required
    }

    /// Name of the template this term was issued from, `DEFAULT` otherwise.
    pub fn term_name(&self) -> &str {
        &self.term_name
    }

    pub(crate) fn set_term_name(&mut self, name: &str) {
        self.term_name = name.to_string();
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    pub fn key_path(&self) -> &str {
        &self.key_path
    }

    pub fn value_name(&self) -> &str {
        &self.value_name
    }

    pub(crate) fn key_name_regex(&self) -> Option<&Regex> {
        self.key_name_regex.as_ref()
    }

    pub(crate) fn key_path_regex(&self) -> Option<&Regex> {
        self.key_path_regex.as_ref()
    }

    pub(crate) fn value_name_regex(&self) -> Option<&Regex> {
        self.value_name_regex.as_ref()
    }

    pub fn value_kind(&self) -> Option<ValueKind> {
        self.value_kind
    }

    pub(crate) fn data_content(&self) -> &[u8] {
        &self.data_content
    }

    pub(crate) fn wide_data_content(&self) -> &[u8] {
        &self.wide_data_content
    }

    pub(crate) fn wide_content_text(&self) -> &str {
        &self.wide_content_text
    }

    pub(crate) fn data_contains(&self) -> &[u8] {
        &self.data_contains
    }

    pub(crate) fn wide_data_contains(&self) -> &[u8] {
        &self.wide_data_contains
    }

    pub(crate) fn data_regex(&self) -> Option<&BytesRegex> {
        self.data_regex.as_ref()
    }

    pub(crate) fn wide_data_regex(&self) -> Option<&Regex> {
        self.wide_data_regex.as_ref()
    }

    pub(crate) fn data_size(&self) -> u64 {
        self.data_size
    }

    pub(crate) fn data_size_low(&self) -> u64 {
        self.data_size_low
    }

    pub(crate) fn data_size_high(&self) -> u64 {
        self.data_size_high
    }

    pub fn depends_on_key_name(&self) -> bool {
        self.required.intersects(Criteria::KEY_NAME_MASK)
    }

    pub fn depends_on_key_path(&self) -> bool {
        self.required.intersects(Criteria::KEY_PATH_MASK)
    }

    pub fn depends_on_value_name(&self) -> bool {
        self.required.intersects(Criteria::VALUE_NAME_MASK)
    }

    pub fn depends_on_value_type(&self) -> bool {
        self.required.intersects(Criteria::VALUE_TYPE_MASK)
    }

    pub fn depends_on_data(&self) -> bool {
        self.required.intersects(Criteria::DATA_MASK)
    }

    /// True if the term can only be decided against a value (never a bare
    /// key).
    pub fn depends_on_value_or_data(&self) -> bool {
        self.required.intersects(Criteria::VALUE_OR_DATA_MASK)
    }

    /// Human-readable summary of what this term searches for.
    pub fn description(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if self.required.contains(Criteria::KEY_NAME) {
            parts.push(format!("KeyName is {}", self.key_name));
        }
        if self.required.contains(Criteria::KEY_NAME_REGEX) {
            parts.push(format!("KeyName matches regex {}", self.key_name));
        }
        if self.required.contains(Criteria::KEY_PATH) {
            parts.push(format!("KeyPath is {}", self.key_path));
        }
        if self.required.contains(Criteria::KEY_PATH_REGEX) {
            parts.push(format!("KeyPath matches regex {}", self.key_path));
        }
        if self.required.contains(Criteria::VALUE_NAME) {
            parts.push(format!("Name is {}", self.value_name));
        }
        if self.required.contains(Criteria::VALUE_NAME_REGEX) {
            parts.push(format!("Name matches regex {}", self.value_name));
        }
        if let Some(kind) = self.value_kind {
            parts.push(format!("Value type is {}", kind.type_name()));
        }
        if self.required.contains(Criteria::DATA_SIZE_EQUAL) {
            parts.push(format!("Data size is {}", self.data_size));
        }
        if self.required.contains(Criteria::DATA_SIZE_LESS) {
            parts.push(format!("Data size is at most {}", self.data_size_high));
        }
        if self.required.contains(Criteria::DATA_SIZE_MORE) {
            parts.push(format!("Data size is at least {}", self.data_size_low));
        }
        if self.required.contains(Criteria::DATA_CONTENT) {
            parts.push(format!("Data is 0x{}", hex::encode(&self.data_content)));
        }
        if self.required.contains(Criteria::DATA_CONTENT_REGEX) {
            parts.push(format!("Data matches regex {}", self.data_regex_pattern));
        }
        if self.required.contains(Criteria::DATA_CONTAINS) {
            parts.push(format!("Data contains 0x{}", hex::encode(&self.data_contains)));
        }
        parts.join(", ")
    }

    /// The required criteria as a `A | B | C` flag list.
    pub fn criteria_description(&self) -> String {
        let names = [
            (Criteria::KEY_NAME, "KEY_NAME"),
            (Criteria::KEY_NAME_REGEX, "KEY_NAME_REGEX"),
            (Criteria::KEY_PATH, "KEY_PATH"),
            (Criteria::KEY_PATH_REGEX, "KEY_PATH_REGEX"),
            (Criteria::VALUE_NAME, "VALUE_NAME"),
            (Criteria::VALUE_NAME_REGEX, "VALUE_NAME_REGEX"),
            (Criteria::VALUE_TYPE, "VALUE_TYPE"),
            (Criteria::DATA_SIZE_EQUAL, "DATA_SIZE_EQUAL"),
            (Criteria::DATA_SIZE_LESS, "DATA_SIZE_LESS"),
            (Criteria::DATA_SIZE_MORE, "DATA_SIZE_MORE"),
            (Criteria::DATA_CONTENT, "DATA_CONTENT"),
            (Criteria::DATA_CONTENT_REGEX, "DATA_CONTENT_REGEX"),
            (Criteria::DATA_CONTAINS, "DATA_CONTAINS"),
        ];
        let mut out = String::new();
        for (flag, name) in names {
            if self.required.contains(flag) {
                if !out.is_empty() {
                    let _ = write!(out, " | ");
                }
                let _ = write!(out, "{name}");
            }
        }
        out
    }
}

impl std::fmt::Debug for SearchTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchTerm")
            .field("id", &self.id)
            .field("required", &self.required)
            .field("term_name", &self.term_name)
            .field("description", &self.description())
            .finish()
    }
}
