//! SQL injection screening for credential input
//!
//! A plain substring scan, run by the host on user-supplied credentials. The
//! engine only ever sees the boolean verdict.

/// Known injection fragments, matched against upper-cased input
pub const SQL_INJECTION_PATTERNS: [&str; 5] = [
    "' OR '1'='1",
    "\" OR \"1\"=\"1",
    "; DROP TABLE",
    "--",
    "UNION SELECT",
];

/// Return the first known injection fragment found in `input`
pub fn find_sql_injection(input: &str) -> Option<&'static str> {
    let upper = input.to_uppercase();
    SQL_INJECTION_PATTERNS
        .iter()
        .copied()
        .find(|pattern| upper.contains(pattern))
}

/// Whether `input` contains a known injection fragment
pub fn detect_sql_injection(input: &str) -> bool {
    find_sql_injection(input).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_known_fragments() {
        assert!(detect_sql_injection("admin' OR '1'='1"));
        assert!(detect_sql_injection("x\" or \"1\"=\"1"));
        assert!(detect_sql_injection("bob; drop table users"));
        assert!(detect_sql_injection("admin'--"));
        assert!(detect_sql_injection("1 union select password from users"));
    }

    #[test]
    fn test_clean_credentials_pass() {
        assert!(!detect_sql_injection("user"));
        assert!(!detect_sql_injection("correct-horse battery"));
        assert!(!detect_sql_injection(""));
    }

    #[test]
    fn test_reports_matching_fragment() {
        assert_eq!(find_sql_injection("a union SELECT b"), Some("UNION SELECT"));
        assert_eq!(find_sql_injection("plain"), None);
    }
}
