//! Wildcard matching for bucket names.
//!
//! Patterns use `*` for any run of characters and `?` for exactly one
//! character. Everything else is literal, including regex metacharacters.

use regex::{Regex, RegexBuilder};

/// A wildcard pattern compiled once and matched against many names.
#[derive(Debug, Clone)]
pub struct Pattern {
    matcher: Matcher,
}

#[derive(Debug, Clone)]
enum Matcher {
    Any,
    Regex(Regex),
    Nothing,
}

impl Pattern {
    /// Compile `pattern`. An empty pattern and `*` match every name. A
    /// pattern that fails to compile matches nothing.
    pub fn new(pattern: &str) -> Self {
        let matcher = if pattern.is_empty() || pattern == "*" {
            Matcher::Any
        } else {
            match RegexBuilder::new(&glob_to_regex(pattern))
                .dot_matches_new_line(true)
                .build()
            {
                Ok(re) => Matcher::Regex(re),
                Err(e) => {
                    tracing::warn!("Bucket pattern '{pattern}' does not compile, it matches nothing: {e}");
                    Matcher::Nothing
                }
            }
        };
        Self { matcher }
    }

    /// Report whether `name` matches the pattern as a whole.
    pub fn is_match(&self, name: &str) -> bool {
        match &self.matcher {
            Matcher::Any => true,
            Matcher::Regex(re) => re.is_match(name),
            Matcher::Nothing => false,
        }
    }
}

/// Report whether `name` matches the wildcard `pattern` as a whole.
pub fn matches(name: &str, pattern: &str) -> bool {
    Pattern::new(pattern).is_match(name)
}

/// Translate a wildcard pattern into an anchored regular expression.
fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    let mut literal = String::new();
    for ch in pattern.chars() {
        match ch {
            '*' | '?' => {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                out.push_str(if ch == '*' { ".*" } else { "." });
            }
            _ => literal.push(ch),
        }
    }
    out.push_str(&regex::escape(&literal));
    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_and_empty_match_everything() {
        for name in ["", "a", "prod-logs", "weird.name+(x)"] {
            assert!(matches(name, "*"));
            assert!(matches(name, ""));
        }
    }

    #[test]
    fn test_prefix_pattern() {
        assert!(matches("prod-logs", "prod-*"));
        assert!(matches("prod-", "prod-*"));
        assert!(!matches("dev-logs", "prod-*"));
    }

    #[test]
    fn test_question_mark_is_exactly_one_char() {
        assert!(matches("a1b", "a?b"));
        assert!(!matches("ab", "a?b"));
        assert!(!matches("a12b", "a?b"));
    }

    #[test]
    fn test_match_is_anchored() {
        assert!(!matches("my-prod-logs", "prod-*"));
        assert!(!matches("logs-old", "*-logs"));
        assert!(matches("app-logs", "*-logs"));
        assert!(!matches("prod", "pro"));
    }

    #[test]
    fn test_metacharacters_are_literal() {
        assert!(matches("a+b", "a+b"));
        assert!(!matches("aab", "a+b"));
        assert!(matches("logs.2024", "logs.*"));
        assert!(!matches("logsx2024", "logs.2*"));
        assert!(matches("(x)", "(?)"));
        assert!(!matches("x", "(x"));
        assert!(matches("[a]", "[a]"));
        assert!(!matches("a", "[a]"));
    }

    #[test]
    fn test_wildcards_match_newlines() {
        assert!(matches("a\nb", "a*"));
        assert!(matches("a\nb", "a?b"));
        assert!(matches("\n", "?"));
    }

    #[test]
    fn test_uncompilable_pattern_matches_nothing() {
        let huge = "x?".repeat(200_000);
        assert!(!matches("x", &huge));
        assert!(!Pattern::new(&huge).is_match(""));
    }

    #[test]
    fn test_compiled_pattern_is_reusable() {
        let p = Pattern::new("prod-*");
        assert!(p.is_match("prod-a"));
        assert!(p.is_match("prod-b"));
        assert!(!p.is_match("dev-a"));
        assert!(Pattern::new("").is_match("anything"));
    }

    #[test]
    fn test_glob_to_regex() {
        assert_eq!(glob_to_regex("logs*"), "^logs.*$");
        assert_eq!(glob_to_regex("a?b"), "^a.b$");
        assert_eq!(glob_to_regex("a.b"), "^a\\.b$");
    }
}
