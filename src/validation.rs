use crate::errors::{ConfigError, ConfigResult};
use regex::Regex;
use std::sync::OnceLock;

fn identifier_regex() -> &'static Regex {
    static IDENTIFIER_REGEX: OnceLock<Regex> = OnceLock::new();
    IDENTIFIER_REGEX.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap())
}

fn range_regex() -> &'static Regex {
    static RANGE_REGEX: OnceLock<Regex> = OnceLock::new();
    RANGE_REGEX.get_or_init(|| Regex::new(r"^(\d*),(\d*)$").unwrap())
}

/// InfluxQL keywords that must be quoted when used as identifiers
const KEYWORDS: &[&str] = &[
    "ALL", "ALTER", "ANALYZE", "ANY", "AS", "ASC", "BEGIN", "BY", "CARDINALITY", "CREATE",
    "CONTINUOUS", "DATABASE", "DATABASES", "DEFAULT", "DELETE", "DESC", "DESTINATIONS",
    "DIAGNOSTICS", "DISTINCT", "DROP", "DURATION", "END", "EVERY", "EXACT", "EXPLAIN", "FIELD",
    "FOR", "FROM", "GRANT", "GRANTS", "GROUP", "GROUPS", "IN", "INF", "INSERT", "INTO", "KEY",
    "KEYS", "KILL", "LIMIT", "MEASUREMENT", "MEASUREMENTS", "NAME", "OFFSET", "ON", "ORDER",
    "PASSWORD", "POLICIES", "POLICY", "PRIVILEGES", "QUERIES", "QUERY", "READ", "REPLICATION",
    "RESAMPLE", "RETENTION", "REVOKE", "SELECT", "SERIES", "SET", "SHARD", "SHARDS", "SLIMIT",
    "SOFFSET", "STATS", "SUBSCRIPTION", "SUBSCRIPTIONS", "TAG", "TO", "USER", "USERS", "VALUES",
    "WHERE", "WITH", "WRITE",
];

/// Escape a name for use inside a double-quoted InfluxQL identifier
pub fn escape_identifier(name: &str) -> String {
    name.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Quote an identifier only when it is not a plain, non-keyword name
pub fn quote_ident(name: &str) -> String {
    let is_keyword = KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(name));
    if identifier_regex().is_match(name) && !is_keyword {
        name.to_string()
    } else {
        format!("\"{}\"", escape_identifier(name))
    }
}

/// Split a comma separated flag value, ignoring surrounding commas and blanks
pub fn split_list(value: &str) -> Vec<String> {
    value
        .trim_matches(|c| c == ',' || c == ' ')
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn has_wildcard(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Whole-string match where `*` is any run of characters and `?` exactly one
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            c => expr.push_str(&regex::escape(&c.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr).map(|re| re.is_match(name)).unwrap_or(false)
}

/// Inclusive, 1-based window over the measurement list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementRange {
    pub start: usize,
    pub end: usize,
}

impl Default for MeasurementRange {
    fn default() -> Self {
        Self {
            start: 1,
            end: usize::MAX,
        }
    }
}

impl MeasurementRange {
    /// Parse `start,end`; either side may be empty
    pub fn parse(value: &str) -> ConfigResult<Self> {
        let invalid = || ConfigError::InvalidRange(value.to_string());
        let captures = range_regex().captures(value).ok_or_else(invalid)?;

        let mut range = Self::default();
        if let Some(start) = captures.get(1).filter(|m| !m.as_str().is_empty()) {
            range.start = start.as_str().parse().map_err(|_| invalid())?;
        }
        if let Some(end) = captures.get(2).filter(|m| !m.as_str().is_empty()) {
            range.end = end.as_str().parse().map_err(|_| invalid())?;
        }
        if range.start == 0 || range.start > range.end {
            return Err(invalid());
        }
        Ok(range)
    }

    /// Whether the zero-based position falls inside the window
    pub fn contains(&self, index: usize) -> bool {
        index + 1 >= self.start && index < self.end
    }
}
