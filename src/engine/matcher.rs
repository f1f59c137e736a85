//! Criterion evaluators.
//!
//! Pure functions testing one live key or value against one term. Each
//! category evaluator returns the subset of its category's criteria that
//! the key/value actually satisfies; the composing lookup functions AND the
//! categories together and short-circuit as soon as a required category
//! fails entirely. Missing or empty data is "no match", never an error.

use memchr::memmem;

use crate::engine::term::{Criteria, SearchTerm};
use crate::engine::wide::{caseless_eq, multi_sz_strings, sz_text, utf16le_lossy};
use crate::hive::{HiveKey, HiveValue, ValueKind};

/// Key short-name category: exact and/or regex.
pub(crate) fn match_key_name(term: &SearchTerm, key: &dyn HiveKey) -> Criteria {
    let mut matched = Criteria::empty();

    if term.required().contains(Criteria::KEY_NAME)
        && caseless_eq(term.key_name(), key.name())
    {
        matched |= Criteria::KEY_NAME;
    }

    if term.required().contains(Criteria::KEY_NAME_REGEX) && !key.name().is_empty() {
        if let Some(regex) = term.key_name_regex() {
            if regex.is_match(key.name()) {
                matched |= Criteria::KEY_NAME_REGEX;
            }
        }
    }

    matched
}

/// Key full-path category.
pub(crate) fn match_key_path(term: &SearchTerm, key: &dyn HiveKey) -> Criteria {
    let mut matched = Criteria::empty();

    if term.required().contains(Criteria::KEY_PATH)
        && caseless_eq(term.key_path(), key.path())
    {
        matched |= Criteria::KEY_PATH;
    }

    if term.required().contains(Criteria::KEY_PATH_REGEX) && !key.path().is_empty() {
        if let Some(regex) = term.key_path_regex() {
            if regex.is_match(key.path()) {
                matched |= Criteria::KEY_PATH_REGEX;
            }
        }
    }

    matched
}

/// Value-name category. Exact takes precedence over regex when both bits
/// are set. No empty-name guard here: the default value of a key has an
/// empty name and must stay matchable.
pub(crate) fn match_value_name(term: &SearchTerm, value: &dyn HiveValue) -> Criteria {
    let mut matched = Criteria::empty();

    if term.required().contains(Criteria::VALUE_NAME) {
        if caseless_eq(term.value_name(), value.name()) {
            matched |= Criteria::VALUE_NAME;
        }
    } else if term.required().contains(Criteria::VALUE_NAME_REGEX) {
        if let Some(regex) = term.value_name_regex() {
            if regex.is_match(value.name()) {
                matched |= Criteria::VALUE_NAME_REGEX;
            }
        }
    }

    matched
}

/// Value-type category.
pub(crate) fn match_value_type(term: &SearchTerm, value: &dyn HiveValue) -> Criteria {
    if term.required().contains(Criteria::VALUE_TYPE) && term.value_kind() == Some(value.kind()) {
        Criteria::VALUE_TYPE
    } else {
        Criteria::empty()
    }
}

/// Exact numeric compare: the pattern is big-endian hex, zero-extended on
/// the left when shorter than the value width; the value is the native
/// little-endian representation.
fn numeric_content_eq(pattern: &[u8], data: &[u8], width: usize) -> bool {
    if pattern.is_empty() || pattern.len() > width || data.len() != width {
        return false;
    }
    let mut be = [0u8; 8];
    be[8 - pattern.len()..].copy_from_slice(pattern);
    let wanted = u64::from_be_bytes(be);
    let actual = match width {
        4 => u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as u64,
        8 => u64::from_le_bytes([
            data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
        ]),
        _ => return false,
    };
    wanted == actual
}

/// Exact data-content compare, value-type aware.
pub(crate) fn exact_datas(term: &SearchTerm, value: &dyn HiveValue) -> Criteria {
    if !term.required().contains(Criteria::DATA_CONTENT) {
        return Criteria::empty();
    }
    let data = value.data();
    if term.data_content().is_empty() || data.is_empty() {
        return Criteria::empty();
    }

    let matched = match value.kind() {
        ValueKind::MultiSz => multi_sz_strings(data)
            .iter()
            .any(|s| caseless_eq(s, term.wide_content_text())),
        ValueKind::Sz | ValueKind::ExpandSz => {
            caseless_eq(&sz_text(data), term.wide_content_text())
        }
        ValueKind::Dword => numeric_content_eq(term.data_content(), data, 4),
        ValueKind::Qword => numeric_content_eq(term.data_content(), data, 8),
        _ => data == term.data_content(),
    };

    if matched {
        Criteria::DATA_CONTENT
    } else {
        Criteria::empty()
    }
}

/// Data-content regex, value-type aware. Binary values are tested both as
/// raw bytes and as UTF-16 text since the pattern may target either
/// encoding; numeric types never support content regex.
pub(crate) fn regex_datas(term: &SearchTerm, value: &dyn HiveValue) -> Criteria {
    if !term.required().contains(Criteria::DATA_CONTENT_REGEX) {
        return Criteria::empty();
    }
    let data = value.data();
    if data.is_empty() {
        return Criteria::empty();
    }

    let matched = match value.kind() {
        ValueKind::MultiSz => {
            let Some(regex) = term.wide_data_regex() else {
                return Criteria::empty();
            };
            multi_sz_strings(data).iter().any(|s| regex.is_match(s))
        }
        ValueKind::Sz | ValueKind::ExpandSz => term
            .wide_data_regex()
            .is_some_and(|regex| regex.is_match(&sz_text(data))),
        ValueKind::Binary => {
            term.data_regex().is_some_and(|regex| regex.is_match(data))
                || term
                    .wide_data_regex()
                    .is_some_and(|regex| regex.is_match(&utf16le_lossy(data)))
        }
        _ => false,
    };

    if matched {
        Criteria::DATA_CONTENT_REGEX
    } else {
        Criteria::empty()
    }
}

/// Data-contains substring search. String-family values are scanned with
/// the wide form of the pattern, everything else with the raw bytes;
/// numeric types never support "contains".
pub(crate) fn datas_contains(term: &SearchTerm, value: &dyn HiveValue) -> Criteria {
    if !term.required().contains(Criteria::DATA_CONTAINS) {
        return Criteria::empty();
    }
    let data = value.data();

    let needle: &[u8] = match value.kind() {
        ValueKind::Dword | ValueKind::DwordBigEndian | ValueKind::Qword => {
            return Criteria::empty()
        }
        ValueKind::Sz | ValueKind::ExpandSz | ValueKind::MultiSz => term.wide_data_contains(),
        _ => term.data_contains(),
    };

    if needle.is_empty() || data.is_empty() {
        return Criteria::empty();
    }
    if memmem::find(data, needle).is_some() {
        Criteria::DATA_CONTAINS
    } else {
        Criteria::empty()
    }
}

/// Data-size bounds, precomputed as inclusive limits at build time.
pub(crate) fn datas_size_match(term: &SearchTerm, value: &dyn HiveValue) -> Criteria {
    let mut matched = Criteria::empty();
    let size = value.data().len() as u64;
    if size == 0 {
        return matched;
    }

    if term.required().contains(Criteria::DATA_SIZE_EQUAL) && term.data_size() == size {
        matched |= Criteria::DATA_SIZE_EQUAL;
    }
    if term.required().contains(Criteria::DATA_SIZE_LESS) && size <= term.data_size_high() {
        matched |= Criteria::DATA_SIZE_LESS;
    }
    if term.required().contains(Criteria::DATA_SIZE_MORE) && size >= term.data_size_low() {
        matched |= Criteria::DATA_SIZE_MORE;
    }
    matched
}

/// The whole data category: content, regex, size, contains.
pub(crate) fn match_data_and_size(term: &SearchTerm, value: &dyn HiveValue) -> Criteria {
    let mut matched = Criteria::empty();
    let required = term.required();

    if required.contains(Criteria::DATA_CONTENT) {
        matched |= exact_datas(term, value);
    }
    if required.contains(Criteria::DATA_CONTENT_REGEX) {
        matched |= regex_datas(term, value);
    }
    if required.intersects(
        Criteria::DATA_SIZE_EQUAL | Criteria::DATA_SIZE_LESS | Criteria::DATA_SIZE_MORE,
    ) {
        matched |= datas_size_match(term, value);
    }
    if required.contains(Criteria::DATA_CONTAINS) {
        matched |= datas_contains(term, value);
    }

    matched
}

/// Decide whether a key satisfies a term's full criteria set. Only
/// key-level categories apply; callers must not route value-dependent
/// terms here.
pub(crate) fn lookup_key_spec(term: &SearchTerm, key: &dyn HiveKey) -> bool {
    let required = term.required();
    let mut matched = Criteria::empty();

    if term.depends_on_key_name() {
        let wanted = required & Criteria::KEY_NAME_MASK;
        let got = match_key_name(term, key);
        if got != wanted {
            return false;
        }
        matched |= got;
    }

    if term.depends_on_key_path() {
        let wanted = required & Criteria::KEY_PATH_MASK;
        let got = match_key_path(term, key);
        if got != wanted {
            return false;
        }
        matched |= got;
    }

    matched == required
}

/// Decide whether a value satisfies a term's full criteria set, running
/// only the categories the term requires and short-circuiting on the first
/// failed category.
pub(crate) fn lookup_value_spec(term: &SearchTerm, value: &dyn HiveValue) -> bool {
    let required = term.required();
    let mut matched = Criteria::empty();

    if term.depends_on_key_name() {
        let wanted = required & Criteria::KEY_NAME_MASK;
        let got = match_key_name(term, value.parent());
        if got != wanted {
            return false;
        }
        matched |= got;
    }

    if term.depends_on_key_path() {
        let wanted = required & Criteria::KEY_PATH_MASK;
        let got = match_key_path(term, value.parent());
        if got != wanted {
            return false;
        }
        matched |= got;
    }

    if term.depends_on_value_type() {
        let wanted = required & Criteria::VALUE_TYPE_MASK;
        let got = match_value_type(term, value);
        if got != wanted {
            return false;
        }
        matched |= got;
    }

    if term.depends_on_value_name() {
        let wanted = required & Criteria::VALUE_NAME_MASK;
        let got = match_value_name(term, value);
        if got != wanted {
            return false;
        }
        matched |= got;
    }

    if term.depends_on_data() {
        let wanted = required & Criteria::DATA_MASK;
        let got = match_data_and_size(term, value);
        if got != wanted {
            return false;
        }
        matched |= got;
    }

    matched == required
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TermSpec;
    use crate::engine::wide::utf16le_bytes;
    use crate::hive::{Hive, MemoryHive, WalkSink};

    fn term(adjust: impl FnOnce(&mut TermSpec)) -> SearchTerm {
        let mut spec = TermSpec::default();
        adjust(&mut spec);
        SearchTerm::from_spec(&spec).unwrap()
    }

    fn sz(text: &str) -> Vec<u8> {
        let mut data = utf16le_bytes(text);
        data.extend_from_slice(&[0, 0]);
        data
    }

    fn multi_sz(parts: &[&str]) -> Vec<u8> {
        let mut data = Vec::new();
        for part in parts {
            data.extend_from_slice(&utf16le_bytes(part));
            data.extend_from_slice(&[0, 0]);
        }
        data.extend_from_slice(&[0, 0]);
        data
    }

    /// Run `check` against every value walked out of `hive`.
    fn with_each_value(hive: &mut MemoryHive, mut check: impl FnMut(&dyn HiveValue)) {
        struct Sink<'a, F: FnMut(&dyn HiveValue)> {
            check: &'a mut F,
        }
        impl<F: FnMut(&dyn HiveValue)> WalkSink for Sink<'_, F> {
            fn on_key(&mut self, _key: &dyn HiveKey) {}
            fn on_value(&mut self, value: &dyn HiveValue) {
                (self.check)(value)
            }
        }
        hive.walk(&mut Sink { check: &mut check }).unwrap();
    }

    fn single_value_hive(kind: ValueKind, data: &[u8]) -> MemoryHive {
        let mut hive = MemoryHive::new("ROOT");
        hive.add_value("Key", "val", kind, data);
        hive
    }

    fn value_matches(term: &SearchTerm, kind: ValueKind, data: &[u8]) -> bool {
        let mut hive = single_value_hive(kind, data);
        let mut result = false;
        with_each_value(&mut hive, |value| result = lookup_value_spec(term, value));
        result
    }

    #[test]
    fn exact_data_multi_sz_matches_embedded_string_only() {
        let t = term(|s| s.data = Some("bar".to_string()));
        assert!(value_matches(&t, ValueKind::MultiSz, &multi_sz(&["foo", "bar", "baz"])));
        assert!(!value_matches(&t, ValueKind::MultiSz, &multi_sz(&["foobar"])));
    }

    #[test]
    fn exact_data_sz_is_case_insensitive_full_compare() {
        let t = term(|s| s.data = Some("Explorer.EXE".to_string()));
        assert!(value_matches(&t, ValueKind::Sz, &sz("explorer.exe")));
        assert!(!value_matches(&t, ValueKind::Sz, &sz("explorer.exe /extra")));
        assert!(value_matches(&t, ValueKind::ExpandSz, &sz("EXPLORER.exe")));
    }

    #[test]
    fn exact_data_dword_honors_endianness() {
        let t = term(|s| s.data_hex = Some("00000001".to_string()));
        assert!(value_matches(&t, ValueKind::Dword, &[1, 0, 0, 0]));
        assert!(!value_matches(&t, ValueKind::Dword, &[0, 0, 0, 1]));
    }

    #[test]
    fn exact_data_dword_short_pattern_zero_extends() {
        // The odd-length quirk turns "1" into the single byte 0x01.
        let t = term(|s| s.data_hex = Some("1".to_string()));
        assert!(value_matches(&t, ValueKind::Dword, &[1, 0, 0, 0]));
        assert!(!value_matches(&t, ValueKind::Dword, &[1, 0, 0]));
    }

    #[test]
    fn exact_data_qword() {
        let t = term(|s| s.data_hex = Some("0000000000000100".to_string()));
        assert!(value_matches(&t, ValueKind::Qword, &[0, 1, 0, 0, 0, 0, 0, 0]));
        assert!(!value_matches(&t, ValueKind::Qword, &[1, 0, 0, 0, 0, 0, 0, 0]));
        // Pattern longer than the value width never matches.
        let wide = term(|s| s.data_hex = Some("000000000000000100".to_string()));
        assert!(!value_matches(&wide, ValueKind::Qword, &[0, 1, 0, 0, 0, 0, 0, 0]));
    }

    #[test]
    fn exact_data_binary_requires_full_equality() {
        let t = term(|s| s.data_hex = Some("deadbeef".to_string()));
        assert!(value_matches(&t, ValueKind::Binary, &[0xde, 0xad, 0xbe, 0xef]));
        assert!(!value_matches(&t, ValueKind::Binary, &[0xde, 0xad, 0xbe, 0xef, 0x00]));
        assert!(!value_matches(&t, ValueKind::Binary, &[0xde, 0xad]));
    }

    #[test]
    fn empty_data_never_matches_content() {
        let t = term(|s| s.data = Some("x".to_string()));
        assert!(!value_matches(&t, ValueKind::Sz, &[]));
    }

    #[test]
    fn regex_data_sz_and_multi_sz() {
        let t = term(|s| s.data_regex = Some(r"c:\\.*\.exe".to_string()));
        assert!(value_matches(&t, ValueKind::Sz, &sz(r"C:\tools\evil.exe")));
        assert!(!value_matches(&t, ValueKind::Sz, &sz(r"C:\tools\evil.dll")));
        assert!(value_matches(
            &t,
            ValueKind::MultiSz,
            &multi_sz(&["nothing", r"c:\x\y.exe"])
        ));
    }

    #[test]
    fn regex_data_binary_tries_both_encodings() {
        let t = term(|s| s.data_regex = Some("payload".to_string()));
        // raw ASCII bytes
        assert!(value_matches(&t, ValueKind::Binary, b"payload"));
        // UTF-16LE bytes
        assert!(value_matches(&t, ValueKind::Binary, &utf16le_bytes("payload")));
        assert!(!value_matches(&t, ValueKind::Binary, b"other"));
    }

    #[test]
    fn regex_data_never_matches_numeric_types() {
        let t = term(|s| s.data_regex = Some(".*".to_string()));
        assert!(!value_matches(&t, ValueKind::Dword, &[1, 0, 0, 0]));
        assert!(!value_matches(&t, ValueKind::Qword, &[1, 0, 0, 0, 0, 0, 0, 0]));
    }

    #[test]
    fn contains_uses_wide_pattern_for_string_family() {
        let t = term(|s| s.data_contains = Some("evil".to_string()));
        assert!(value_matches(&t, ValueKind::Sz, &sz(r"C:\evil\tool.exe")));
        assert!(value_matches(&t, ValueKind::MultiSz, &multi_sz(&["an evil entry"])));
        // Raw pattern against binary data
        assert!(value_matches(&t, ValueKind::Binary, b"xx evil xx"));
        // Wide pattern does not appear in raw ASCII of a binary value
        // unless the data really is UTF-16.
        assert!(value_matches(&t, ValueKind::Binary, b"evil"));
        assert!(!value_matches(&t, ValueKind::Dword, &[0x65, 0x76, 0x69, 0x6c]));
    }

    #[test]
    fn size_range_combines_bounds() {
        let t = term(|s| {
            s.data_size_more_than = Some("10".to_string());
            s.data_size_less_than = Some("100".to_string());
        });
        assert!(value_matches(&t, ValueKind::Binary, &[0u8; 50]));
        assert!(!value_matches(&t, ValueKind::Binary, &[0u8; 10]));
        assert!(!value_matches(&t, ValueKind::Binary, &[0u8; 100]));
        assert!(!value_matches(&t, ValueKind::Binary, &[0u8; 5]));
    }

    #[test]
    fn size_equal() {
        let t = term(|s| s.data_size = Some("4".to_string()));
        assert!(value_matches(&t, ValueKind::Binary, &[0u8; 4]));
        assert!(!value_matches(&t, ValueKind::Binary, &[0u8; 5]));
    }

    #[test]
    fn value_type_and_name_criteria() {
        let t = term(|s| {
            s.value = Some("Shell".to_string());
            s.value_type = Some("REG_SZ".to_string());
        });
        let mut hive = MemoryHive::new("ROOT");
        hive.add_value("K", "Shell", ValueKind::Sz, &sz("explorer.exe"));
        hive.add_value("K", "Shell", ValueKind::ExpandSz, &sz("explorer.exe"));
        hive.add_value("K", "Other", ValueKind::Sz, &sz("explorer.exe"));

        let mut hits = 0;
        with_each_value(&mut hive, |value| {
            if lookup_value_spec(&t, value) {
                hits += 1;
            }
        });
        assert_eq!(hits, 1);
    }

    #[test]
    fn value_name_regex_matches_default_empty_name() {
        let t = term(|s| s.value_regex = Some(".*".to_string()));
        let mut hive = MemoryHive::new("ROOT");
        hive.add_value("K", "", ValueKind::Sz, &sz("default"));
        let mut matched = false;
        with_each_value(&mut hive, |value| matched = lookup_value_spec(&t, value));
        assert!(matched);
    }

    #[test]
    fn and_semantics_require_every_category() {
        let t = term(|s| {
            s.path = Some("ROOT\\K".to_string());
            s.value = Some("v".to_string());
            s.data = Some("hit".to_string());
        });
        let mut hive = MemoryHive::new("ROOT");
        hive.add_value("K", "v", ValueKind::Sz, &sz("hit")); // all three
        hive.add_value("K", "v", ValueKind::Sz, &sz("miss")); // wrong data
        hive.add_value("K", "w", ValueKind::Sz, &sz("hit")); // wrong name
        hive.add_value("Other", "v", ValueKind::Sz, &sz("hit")); // wrong path

        let mut hits = 0;
        with_each_value(&mut hive, |value| {
            if lookup_value_spec(&t, value) {
                hits += 1;
            }
        });
        assert_eq!(hits, 1);
    }

    #[test]
    fn key_lookup_matches_name_and_path() {
        let t = term(|s| s.key = Some("Run".to_string()));
        let mut hive = MemoryHive::new("ROOT");
        hive.add_key("Software\\Run");

        struct Sink<'a> {
            term: &'a SearchTerm,
            hits: usize,
        }
        impl WalkSink for Sink<'_> {
            fn on_key(&mut self, key: &dyn HiveKey) {
                if lookup_key_spec(self.term, key) {
                    self.hits += 1;
                }
            }
            fn on_value(&mut self, _value: &dyn HiveValue) {}
        }
        let mut sink = Sink { term: &t, hits: 0 };
        hive.walk(&mut sink).unwrap();
        assert_eq!(sink.hits, 1);
    }

    #[test]
    fn key_name_regex_is_anchored() {
        let t = term(|s| s.key_regex = Some("Run".to_string()));
        let mut hive = MemoryHive::new("ROOT");
        hive.add_key("Run");
        hive.add_key("RunOnce");

        struct Sink<'a> {
            term: &'a SearchTerm,
            names: Vec<String>,
        }
        impl WalkSink for Sink<'_> {
            fn on_key(&mut self, key: &dyn HiveKey) {
                if lookup_key_spec(self.term, key) {
                    self.names.push(key.name().to_string());
                }
            }
            fn on_value(&mut self, _value: &dyn HiveValue) {}
        }
        let mut sink = Sink { term: &t, names: Vec::new() };
        hive.walk(&mut sink).unwrap();
        assert_eq!(sink.names, vec!["Run"]);
    }
}
