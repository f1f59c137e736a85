//! UTF-16 helpers for registry string data.
//!
//! Registry string values (`REG_SZ`, `REG_EXPAND_SZ`, `REG_MULTI_SZ`) store
//! UTF-16LE code units; comparisons against configured patterns happen on
//! the decoded text.

use widestring::U16Str;

/// Encode a literal as UTF-16LE bytes, the way it would be stored in a
/// string-typed registry value (without a terminator).
pub(crate) fn utf16le_bytes(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

/// Raw bytes reinterpreted as UTF-16LE code units. A trailing odd byte is
/// dropped.
pub(crate) fn utf16le_units(data: &[u8]) -> Vec<u16> {
    data.chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Lossy decode of raw bytes as UTF-16LE text, embedded NULs included.
pub(crate) fn utf16le_lossy(data: &[u8]) -> String {
    U16Str::from_slice(&utf16le_units(data)).to_string_lossy()
}

/// Decode a `REG_SZ`/`REG_EXPAND_SZ` payload: text up to the first NUL
/// terminator.
pub(crate) fn sz_text(data: &[u8]) -> String {
    let units = utf16le_units(data);
    let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
    U16Str::from_slice(&units[..end]).to_string_lossy()
}

/// Decode a `REG_MULTI_SZ` payload into its embedded NUL-terminated
/// substrings; empty substrings (including the final double-NUL) are
/// skipped.
pub(crate) fn multi_sz_strings(data: &[u8]) -> Vec<String> {
    let units = utf16le_units(data);
    units
        .split(|&u| u == 0)
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| U16Str::from_slice(chunk).to_string_lossy())
        .collect()
}

/// Case-insensitive text equality.
pub(crate) fn caseless_eq(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_literal() {
        let bytes = utf16le_bytes("Run");
        assert_eq!(bytes, vec![b'R', 0, b'u', 0, b'n', 0]);
        assert_eq!(utf16le_lossy(&bytes), "Run");
    }

    #[test]
    fn sz_text_stops_at_terminator() {
        let mut bytes = utf16le_bytes("cmd.exe");
        bytes.extend_from_slice(&[0, 0]);
        assert_eq!(sz_text(&bytes), "cmd.exe");
        // garbage after the terminator is ignored
        bytes.extend_from_slice(&utf16le_bytes("junk"));
        assert_eq!(sz_text(&bytes), "cmd.exe");
    }

    #[test]
    fn multi_sz_splits_on_nuls() {
        let mut bytes = Vec::new();
        for s in ["foo", "bar", "baz"] {
            bytes.extend_from_slice(&utf16le_bytes(s));
            bytes.extend_from_slice(&[0, 0]);
        }
        bytes.extend_from_slice(&[0, 0]);
        assert_eq!(multi_sz_strings(&bytes), vec!["foo", "bar", "baz"]);
    }

    #[test]
    fn odd_trailing_byte_is_dropped() {
        let mut bytes = utf16le_bytes("ab");
        bytes.push(0x41);
        assert_eq!(utf16le_lossy(&bytes), "ab");
    }

    #[test]
    fn caseless_eq_handles_mixed_case() {
        assert!(caseless_eq("CurrentVersion", "currentversion"));
        assert!(!caseless_eq("Current", "CurrentVersion"));
    }
}
