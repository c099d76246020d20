//! Interest filters: a name prefix plus an optional pattern over the
//! remaining components.

use crate::error::Error;
use crate::name::{Component, Name};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Selects the Interests delivered to one application callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestFilter {
    prefix: Name,
    pattern: Option<String>,
    allow_loopback: bool,
}

impl InterestFilter {
    /// Creates a filter matching every Interest under `prefix`.
    pub fn new(prefix: impl Into<Name>) -> Self {
        Self {
            prefix: prefix.into(),
            pattern: None,
            allow_loopback: true,
        }
    }

    /// Creates a filter whose remaining components must satisfy `pattern`.
    ///
    /// The pattern is a sequence of angle-bracket tokens, e.g.
    /// `"<><b><c>?"`: `<>` matches any single component, `<b>` matches the
    /// literal component `b`, and a token may be followed by `?`, `*` or
    /// `+`. The pattern is not validated here; a malformed pattern is
    /// reported when the filter is first matched against a name.
    pub fn with_pattern(prefix: impl Into<Name>, pattern: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            pattern: Some(pattern.into()),
            allow_loopback: true,
        }
    }

    /// Sets whether locally expressed Interests may be delivered to this
    /// filter (default true).
    pub fn allow_loopback(mut self, allow: bool) -> Self {
        self.allow_loopback = allow;
        self
    }

    pub fn prefix(&self) -> &Name {
        &self.prefix
    }

    pub fn loopback_allowed(&self) -> bool {
        self.allow_loopback
    }

    /// Checks whether `name` matches this filter.
    ///
    /// Fails with `Error::InterestFilter` when the pattern cannot be
    /// compiled.
    pub fn matches(&self, name: &Name) -> Result<bool, Error> {
        if !self.prefix.is_prefix_of(name) {
            return Ok(false);
        }
        let Some(pattern) = &self.pattern else {
            return Ok(true);
        };

        let tokens = compile(pattern)?;
        let suffix: Vec<&Component> = name.components().skip(self.prefix.len()).collect();
        Ok(match_tokens(&tokens, &suffix))
    }
}

impl From<&str> for InterestFilter {
    fn from(prefix: &str) -> Self {
        InterestFilter::new(prefix)
    }
}

impl From<Name> for InterestFilter {
    fn from(prefix: Name) -> Self {
        InterestFilter::new(prefix)
    }
}

impl fmt::Display for InterestFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix)?;
        if let Some(pattern) = &self.pattern {
            write!(f, "?{pattern}")?;
        }
        Ok(())
    }
}

/* ---------------------------------------------------------------- *
 * Name pattern
 * ---------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq, Eq)]
enum Matcher {
    Any,
    Literal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quantifier {
    One,
    Optional,
    ZeroOrMore,
    OneOrMore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    matcher: Matcher,
    quantifier: Quantifier,
}

fn compile(pattern: &str) -> Result<Vec<Token>, Error> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '<' {
            return Err(Error::InterestFilter(format!(
                "unexpected '{c}' outside component token in pattern '{pattern}'"
            )));
        }

        let mut literal = String::new();
        let mut closed = false;
        for c in chars.by_ref() {
            if c == '>' {
                closed = true;
                break;
            }
            if c == '<' {
                return Err(Error::InterestFilter(format!(
                    "nested '<' in pattern '{pattern}'"
                )));
            }
            literal.push(c);
        }
        if !closed {
            return Err(Error::InterestFilter(format!(
                "unterminated component token in pattern '{pattern}'"
            )));
        }

        let quantifier = match chars.peek() {
            Some('?') => {
                chars.next();
                Quantifier::Optional
            }
            Some('*') => {
                chars.next();
                Quantifier::ZeroOrMore
            }
            Some('+') => {
                chars.next();
                Quantifier::OneOrMore
            }
            _ => Quantifier::One,
        };

        let matcher = if literal.is_empty() {
            Matcher::Any
        } else {
            Matcher::Literal(literal)
        };
        tokens.push(Token { matcher, quantifier });
    }

    Ok(tokens)
}

fn component_matches(matcher: &Matcher, component: &Component) -> bool {
    match matcher {
        Matcher::Any => true,
        Matcher::Literal(text) => component.value().as_ref() == text.as_bytes(),
    }
}

/// Backtracking match of `tokens` against the whole of `components`.
fn match_tokens(tokens: &[Token], components: &[&Component]) -> bool {
    let Some((token, rest)) = tokens.split_first() else {
        return components.is_empty();
    };

    let head_matches = components
        .first()
        .is_some_and(|c| component_matches(&token.matcher, c));

    match token.quantifier {
        Quantifier::One => head_matches && match_tokens(rest, &components[1..]),
        Quantifier::Optional => {
            match_tokens(rest, components)
                || (head_matches && match_tokens(rest, &components[1..]))
        }
        Quantifier::ZeroOrMore => {
            match_tokens(rest, components)
                || (head_matches && match_tokens(tokens, &components[1..]))
        }
        Quantifier::OneOrMore => {
            head_matches
                && (match_tokens(rest, &components[1..])
                    || match_tokens(tokens, &components[1..]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    #[test]
    fn prefix_only() {
        let filter = InterestFilter::new("/Hello/World");
        assert!(filter.matches(&name("/Hello/World")).unwrap());
        assert!(filter.matches(&name("/Hello/World/a/b")).unwrap());
        assert!(!filter.matches(&name("/Bye/World")).unwrap());
        assert!(!filter.matches(&name("/Hello")).unwrap());
    }

    #[test]
    fn pattern_matching() {
        let filter = InterestFilter::with_pattern("/Hello/World", "<><b><c>?");
        assert!(!filter.matches(&name("/Hello/World/a")).unwrap());
        assert!(filter.matches(&name("/Hello/World/a/b")).unwrap());
        assert!(filter.matches(&name("/Hello/World/a/b/c")).unwrap());
        assert!(!filter.matches(&name("/Hello/World/a/b/d")).unwrap());
    }

    #[test]
    fn repetition() {
        let filter = InterestFilter::with_pattern("/", "<a>+<b>*");
        assert!(filter.matches(&name("/a")).unwrap());
        assert!(filter.matches(&name("/a/a/b/b")).unwrap());
        assert!(!filter.matches(&name("/b")).unwrap());
        assert!(!filter.matches(&name("/a/c")).unwrap());
    }

    #[test]
    fn malformed_pattern_fails_at_match_time() {
        // construction succeeds
        let filter = InterestFilter::with_pattern("/Hello/World", "<><b");
        // matching reports the error
        let err = filter.matches(&name("/Hello/World/a/b")).unwrap_err();
        assert!(matches!(err, Error::InterestFilter(_)));

        let filter = InterestFilter::with_pattern("/", "a<b>");
        assert!(filter.matches(&name("/a/b")).is_err());
    }

    #[test]
    fn loopback_flag_defaults_to_true() {
        assert!(InterestFilter::new("/").loopback_allowed());
        assert!(!InterestFilter::new("/").allow_loopback(false).loopback_allowed());
    }
}
