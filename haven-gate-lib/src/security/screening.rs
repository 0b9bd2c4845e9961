//! Suspicious query parameter screening.
//!
//! A coarse heuristic that rejects query values resembling SQL injection,
//! path traversal or script injection. It is not a parser. Legitimate text
//! that happens to contain one of these sequences is rejected too.

use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreatKind {
    SqlInjection,
    PathTraversal,
    ScriptInjection,
}

impl ThreatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatKind::SqlInjection => "sql_injection",
            ThreatKind::PathTraversal => "path_traversal",
            ThreatKind::ScriptInjection => "script_injection",
        }
    }
}

impl fmt::Display for ThreatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The first query parameter that matched a suspicious pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreeningHit {
    pub param: String,
    pub kind: ThreatKind,
}

struct SuspiciousPattern {
    kind: ThreatKind,
    regex: Regex,
}

static SUSPICIOUS_PATTERNS: LazyLock<Vec<SuspiciousPattern>> = LazyLock::new(|| {
    let pattern = |kind, re: &str| SuspiciousPattern {
        kind,
        regex: Regex::new(re).expect("screening pattern must compile"),
    };
    vec![
        // quote followed by a statement terminator, comment or SQL keyword
        pattern(
            ThreatKind::SqlInjection,
            r#"(?i)['"`]\s*(?:;|--|#|/\*|\b(?:or|and|union|select|insert|update|delete|drop|exec)\b)"#,
        ),
        pattern(
            ThreatKind::SqlInjection,
            r"(?i)\b(?:union\s+(?:all\s+)?select|drop\s+(?:table|database)|insert\s+into|delete\s+from|truncate\s+table)\b",
        ),
        pattern(ThreatKind::PathTraversal, r"(?:^|[/\\])\.\.(?:[/\\]|$)"),
        pattern(ThreatKind::ScriptInjection, r"(?i)<\s*/?\s*script\b"),
        pattern(
            ThreatKind::ScriptInjection,
            r"(?i)\bon(?:load|error|click|mouseover|mouseout|focus|blur|submit|change|input|keydown|keyup|keypress)\s*=",
        ),
        pattern(ThreatKind::ScriptInjection, r"(?i)javascript\s*:"),
    ]
});

/// Check one decoded value against the pattern set.
pub fn screen_value(value: &str) -> Option<ThreatKind> {
    SUSPICIOUS_PATTERNS
        .iter()
        .find(|p| p.regex.is_match(value))
        .map(|p| p.kind)
}

/// Screen every value of a raw (still encoded) query string.
pub fn screen_query(query: Option<&str>) -> Result<(), ScreeningHit> {
    let Some(query) = query else {
        return Ok(());
    };

    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = decode_component(value);
        if let Some(kind) = screen_value(&value) {
            return Err(ScreeningHit { param: decode_component(name).into_owned(), kind });
        }
    }
    Ok(())
}

/// Decode `application/x-www-form-urlencoded` escapes. Malformed escapes are
/// kept literally; invalid UTF-8 is replaced.
fn decode_component(raw: &str) -> Cow<'_, str> {
    if !raw.bytes().any(|b| b == b'%' || b == b'+') {
        return Cow::Borrowed(raw);
    }

    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .filter(|h| h.iter().all(u8::is_ascii_hexdigit))
                    .and_then(|h| std::str::from_utf8(h).ok());
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(byte) => {
                        out.push(byte);
                        i += 2;
                    }
                    None => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    Cow::Owned(String::from_utf8_lossy(&out).into_owned())
}
