//! Data-driven attack pattern detectors.
//!
//! Detectors are a static table of (label, regex) pairs so new patterns can
//! be added without touching call sites. Heuristic coverage, not a WAF.

use std::sync::LazyLock;

use regex::Regex;

pub struct Detector {
    pub label: &'static str,
    regex: Regex,
}

impl Detector {
    fn new(label: &'static str, pattern: &str) -> Self {
        Self {
            label,
            // Patterns are compile-time constants; a bad one is a bug.
            regex: Regex::new(pattern).expect("invalid detector pattern"),
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

static DETECTORS: LazyLock<Vec<Detector>> = LazyLock::new(|| {
    vec![
        Detector::new(
            "sql_injection",
            r"(?i)(\bunion\s+(all\s+)?select\b|\bselect\s+[\w\s,*]+\s+from\b|\binsert\s+into\b|\bdrop\s+(table|database)\b|\bdelete\s+from\b|\bupdate\s+\w+\s+set\b|'\s*(or|and)\s+[\w']+\s*=|\bor\s+1\s*=\s*1\b|--\s|;\s*(drop|alter|truncate)\b|\bexec(ute)?\s*\(|\bsleep\s*\(|\bbenchmark\s*\(|\binformation_schema\b)",
        ),
        Detector::new(
            "xss",
            r"(?i)(<\s*script|<\s*/\s*script|javascript\s*:|vbscript\s*:|\bon(load|error|click|mouseover|focus|submit)\s*=|<\s*iframe|<\s*embed|<\s*object|document\.(cookie|write|location)|\beval\s*\(|\bexpression\s*\(|<\s*svg[^>]*on\w+)",
        ),
        Detector::new(
            "path_traversal",
            r"(?i)(\.\./|\.\.\\|%2e%2e%2f|%2e%2e/|\.\.%2f|%252e%252e|/etc/(passwd|shadow)|c:\\windows)",
        ),
        Detector::new(
            "command_injection",
            r"(?i)(;\s*(ls|cat|rm|wget|curl|sh|bash|cmd|powershell|whoami|id)\b|\|\s*(ls|cat|rm|wget|curl|nc|sh|bash)\b|\$\([^)]*\)|`[^`]+`|&&\s*(ls|cat|rm|wget|curl)\b|\bnc\s+-e\b)",
        ),
        Detector::new(
            "ldap_injection",
            r#"(?i)(\(\s*[&|!]\s*\(|\*\s*\)\s*\(|\buid\s*=\s*\*|\bobjectclass\s*=\s*\*|\)\s*\(\s*\||[^\w]\(\s*cn\s*=)"#,
        ),
    ]
});

static SCANNER_AGENTS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)sqlmap",
        r"(?i)nikto",
        r"(?i)nessus",
        r"(?i)\bnmap\b",
        r"(?i)masscan",
        r"(?i)acunetix",
        r"(?i)dirbuster",
        r"(?i)gobuster",
        r"(?i)wpscan",
        r"(?i)burp(suite|collaborator)?",
        r"(?i)owasp[\s-]?zap",
        r"(?i)metasploit",
        r"(?i)hydra",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("invalid scanner pattern"))
    .collect()
});

/// Scan a value against every detector, returning the label of the first
/// match.
pub fn scan(value: &str) -> Option<&'static str> {
    DETECTORS.iter().find(|d| d.matches(value)).map(|d| d.label)
}

/// True if the user agent matches a known scanner signature.
pub fn is_scanner_user_agent(user_agent: &str) -> bool {
    SCANNER_AGENTS.iter().any(|r| r.is_match(user_agent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tautology_injection_is_tagged_sql() {
        assert_eq!(scan("1' OR 1=1--"), Some("sql_injection"));
        assert_eq!(scan("name' or 'a'='a"), Some("sql_injection"));
        assert_eq!(scan("UNION SELECT password FROM users"), Some("sql_injection"));
    }

    #[test]
    fn script_tags_are_tagged_xss() {
        assert_eq!(scan("<script>alert(1)</script>"), Some("xss"));
        assert_eq!(scan("<img src=x onerror=alert(1)>"), Some("xss"));
        assert_eq!(scan("javascript:void(0)"), Some("xss"));
    }

    #[test]
    fn traversal_and_command_injection() {
        assert_eq!(scan("../../etc/passwd"), Some("path_traversal"));
        assert_eq!(scan("x; cat /etc/hosts"), Some("command_injection"));
        assert_eq!(scan("$(rm -rf /)"), Some("command_injection"));
    }

    #[test]
    fn ldap_filter_injection() {
        assert_eq!(scan("*)(uid=*"), Some("ldap_injection"));
    }

    #[test]
    fn benign_text_passes() {
        assert_eq!(scan("John Doe"), None);
        assert_eq!(scan("john@example.com"), None);
        assert_eq!(scan("a perfectly ordinary sentence"), None);
    }

    #[test]
    fn scanner_agents_are_flagged() {
        assert!(is_scanner_user_agent("sqlmap/1.7-dev"));
        assert!(is_scanner_user_agent("Mozilla/5.0 zgrab Nikto/2.1.6"));
        assert!(!is_scanner_user_agent(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64)"
        ));
    }
}
