use chrono::NaiveDateTime;

/// Long ISO layout used by current MediaWiki exports.
const LAYOUT_LONG: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Compact layout found in some older dumps.
const LAYOUT_COMPACT: &str = "%Y%m%d%H%M%S";

/// Parses the base-10 digit prefix of `text` as an unsigned 64-bit integer.
///
/// Leading whitespace is skipped and trailing non-digit bytes are ignored,
/// so `" 123"` and `"123abc"` both yield 123. Returns `None` when no digit
/// is found or the value overflows.
pub fn parse_u64(text: &str) -> Option<u64> {
    let mut value: u64 = 0;
    let mut seen = false;
    for byte in text.trim_start().bytes() {
        if !byte.is_ascii_digit() {
            break;
        }
        value = value
            .checked_mul(10)?
            .checked_add(u64::from(byte - b'0'))?;
        seen = true;
    }
    seen.then_some(value)
}

/// Parses a MediaWiki timestamp into milliseconds since the Unix epoch.
///
/// The two known layouts are tried in order (`2024-01-15T09:30:00Z`, then
/// `20240115093000`); the first that consumes the whole input wins. Times
/// are interpreted as UTC.
pub fn parse_timestamp(text: &str) -> Option<u64> {
    let text = text.trim();
    let parsed = NaiveDateTime::parse_from_str(text, LAYOUT_LONG)
        .or_else(|_| NaiveDateTime::parse_from_str(text, LAYOUT_COMPACT))
        .ok()?;
    u64::try_from(parsed.and_utc().timestamp_millis()).ok()
}
