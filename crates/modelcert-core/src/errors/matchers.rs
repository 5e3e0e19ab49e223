use regex::{Regex, RegexBuilder};

/// Predicate over raw error text.
#[derive(Debug, Clone)]
pub enum Matcher {
    Pattern(PatternMatcher),
    Token(TokenMatcher),
}

impl Matcher {
    pub fn patterns(patterns: &[&str]) -> Result<Self, regex::Error> {
        Ok(Matcher::Pattern(PatternMatcher::new(patterns)?))
    }

    pub fn tokens(tokens: &[&str]) -> Self {
        Matcher::Token(TokenMatcher::new(tokens))
    }

    pub fn matches(&self, raw: &str) -> bool {
        match self {
            Matcher::Pattern(m) => m.matches(raw),
            Matcher::Token(m) => m.matches(raw),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PatternMatcher {
    patterns: Vec<Regex>,
    case_sensitive: bool,
}

impl PatternMatcher {
    pub fn new(patterns: &[&str]) -> Result<Self, regex::Error> {
        Self::build(patterns, false)
    }

    pub fn case_sensitive(patterns: &[&str]) -> Result<Self, regex::Error> {
        Self::build(patterns, true)
    }

    fn build(patterns: &[&str], case_sensitive: bool) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(!case_sensitive)
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            patterns,
            case_sensitive,
        })
    }

    pub fn matches(&self, raw: &str) -> bool {
        if self.case_sensitive {
            return self.patterns.iter().any(|re| re.is_match(raw));
        }
        let lowered = raw.to_lowercase();
        self.patterns.iter().any(|re| re.is_match(&lowered))
    }
}

/// Literal substrings (status codes, provider error codes), matched verbatim.
#[derive(Debug, Clone)]
pub struct TokenMatcher {
    tokens: Vec<String>,
}

impl TokenMatcher {
    pub fn new(tokens: &[&str]) -> Self {
        Self {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn matches(&self, raw: &str) -> bool {
        self.tokens.iter().any(|t| raw.contains(t.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_is_case_insensitive_by_default() {
        let m = PatternMatcher::new(&["accessdeniedexception", "access denied"]).unwrap();
        assert!(m.matches("AccessDeniedException: nope"));
        assert!(m.matches("ACCESS DENIED"));
        assert!(!m.matches("all good"));
    }

    #[test]
    fn case_sensitive_pattern() {
        let m = PatternMatcher::case_sensitive(&["Throttling"]).unwrap();
        assert!(m.matches("ThrottlingException"));
        assert!(!m.matches("throttlingexception"));
    }

    #[test]
    fn token_is_verbatim() {
        let m = TokenMatcher::new(&["429", "ECONNRESET"]);
        assert!(m.matches("HTTP 429 Too Many Requests"));
        assert!(m.matches("read ECONNRESET"));
        assert!(!m.matches("read econnreset"));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        assert!(Matcher::patterns(&["(unclosed"]).is_err());
    }

    #[test]
    fn enum_dispatch() {
        let p = Matcher::patterns(&["time(d)? ?out"]).unwrap();
        let t = Matcher::tokens(&["504"]);
        assert!(p.matches("Request Timed Out"));
        assert!(t.matches("status 504"));
        assert!(!t.matches("status 500"));
    }
}
