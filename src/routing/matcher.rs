//! Route pattern matching.
//!
//! # Responsibilities
//! - Parse route patterns into static, parameter and catch-all segments
//! - Match request paths and capture parameters
//! - Rank patterns by specificity
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - A trailing slash is ignored (`/docs/` matches `/docs`)
//! - Catch-all is only legal as the last segment and needs at least one segment
//! - No regex to guarantee O(n) matching

use std::cmp::Ordering;

use thiserror::Error;

/// Error produced when a pattern string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern must start with '/': {0}")]
    MissingLeadingSlash(String),
    #[error("empty segment in pattern: {0}")]
    EmptySegment(String),
    #[error("malformed placeholder '{segment}' in pattern: {pattern}")]
    MalformedPlaceholder { pattern: String, segment: String },
    #[error("catch-all must be the last segment: {0}")]
    CatchAllNotLast(String),
    #[error("duplicate parameter '{name}' in pattern: {pattern}")]
    DuplicateParam { pattern: String, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
    CatchAll(String),
}

/// A compiled route pattern such as `/email/verify/{id}/{hash}` or `/docs/{*slug}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

/// Parameters captured by a successful match, in pattern order.
pub type Params = Vec<(String, String)>;

impl RoutePattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let Some(rest) = pattern.strip_prefix('/') else {
            return Err(PatternError::MissingLeadingSlash(pattern.to_string()));
        };

        let mut segments = Vec::new();
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        if !rest.is_empty() {
            for raw in rest.split('/') {
                if matches!(segments.last(), Some(Segment::CatchAll(_))) {
                    return Err(PatternError::CatchAllNotLast(pattern.to_string()));
                }
                segments.push(parse_segment(pattern, raw)?);
            }
        }

        let mut seen = Vec::new();
        for segment in &segments {
            if let Segment::Param(name) | Segment::CatchAll(name) = segment {
                if seen.contains(&name) {
                    return Err(PatternError::DuplicateParam {
                        pattern: pattern.to_string(),
                        name: name.clone(),
                    });
                }
                seen.push(name);
            }
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Fill the placeholders from `params`. None if any is missing or empty.
    pub fn url(&self, params: &[(&str, &str)]) -> Option<String> {
        let lookup = |name: &str| {
            params
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| *v)
                .filter(|v| !v.is_empty())
        };

        let mut url = String::new();
        for segment in &self.segments {
            url.push('/');
            match segment {
                Segment::Static(s) => url.push_str(s),
                Segment::Param(name) => {
                    let value = lookup(name)?;
                    url.extend(url::form_urlencoded::byte_serialize(value.as_bytes()));
                }
                Segment::CatchAll(name) => url.push_str(lookup(name)?),
            }
        }
        if url.is_empty() {
            url.push('/');
        }
        Some(url)
    }

    /// Match a request path, returning the captured parameters.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let path = path.strip_prefix('/').unwrap_or(path);
        let path = path.strip_suffix('/').unwrap_or(path);
        let mut parts: Vec<&str> = if path.is_empty() {
            Vec::new()
        } else {
            path.split('/').collect()
        };

        let mut params = Vec::new();
        for (idx, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Static(expected) => {
                    if parts.get(idx) != Some(&expected.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = parts.get(idx).filter(|v| !v.is_empty())?;
                    params.push((name.clone(), value.to_string()));
                }
                Segment::CatchAll(name) => {
                    if parts.len() <= idx {
                        return None;
                    }
                    let rest = parts.split_off(idx).join("/");
                    params.push((name.clone(), rest));
                    return Some(params);
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(params)
    }

    fn has_catch_all(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::CatchAll(_)))
    }

    fn static_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Static(_)))
            .count()
    }

    fn param_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Param(_)))
            .count()
    }

    /// Order two patterns from most to least specific.
    ///
    /// Catch-alls rank last, then patterns with fewer parameters, then
    /// patterns with more static segments. Equal patterns compare equal so a
    /// stable sort keeps declaration order.
    pub fn specificity_cmp(&self, other: &Self) -> Ordering {
        self.has_catch_all()
            .cmp(&other.has_catch_all())
            .then_with(|| self.param_count().cmp(&other.param_count()))
            .then_with(|| other.static_count().cmp(&self.static_count()))
    }
}

fn parse_segment(pattern: &str, raw: &str) -> Result<Segment, PatternError> {
    if raw.is_empty() {
        return Err(PatternError::EmptySegment(pattern.to_string()));
    }

    let malformed = || PatternError::MalformedPlaceholder {
        pattern: pattern.to_string(),
        segment: raw.to_string(),
    };

    match raw.strip_prefix('{') {
        Some(inner) => {
            let name = inner.strip_suffix('}').ok_or_else(malformed)?;
            let (catch_all, name) = match name.strip_prefix('*') {
                Some(n) => (true, n),
                None => (false, name),
            };
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(malformed());
            }
            Ok(if catch_all {
                Segment::CatchAll(name.to_string())
            } else {
                Segment::Param(name.to_string())
            })
        }
        None if raw.contains(['{', '}']) => Err(malformed()),
        None => Ok(Segment::Static(raw.to_string())),
    }
}

/// Match `subject` against a glob in which `*` stands for any run of characters.
pub fn glob_matches(pattern: &str, subject: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return subject.is_empty();
    };
    let Some(mut rest) = subject.strip_prefix(first) else {
        return false;
    };

    let pieces: Vec<&str> = parts.collect();
    let Some((last, middle)) = pieces.split_last() else {
        // No wildcard at all: exact match.
        return rest.is_empty();
    };

    for piece in middle {
        match rest.find(piece) {
            Some(pos) => rest = &rest[pos + piece.len()..],
            None => return false,
        }
    }

    rest.len() >= last.len() && rest.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_static_pattern() {
        let pattern = RoutePattern::parse("/email/verify").unwrap();
        assert_eq!(pattern.matches("/email/verify"), Some(vec![]));
        assert_eq!(pattern.matches("/email/verify/"), Some(vec![]));
        assert_eq!(pattern.matches("/email"), None);
        assert_eq!(pattern.matches("/email/verify/1"), None);
        assert_eq!(pattern.matches("/Email/verify"), None); // Case sensitive
    }

    #[test]
    fn test_url_generation() {
        let verify = RoutePattern::parse("/email/verify/{id}/{hash}").unwrap();
        assert_eq!(
            verify.url(&[("hash", "abc"), ("id", "7")]).as_deref(),
            Some("/email/verify/7/abc")
        );
        assert_eq!(verify.url(&[("id", "7")]), None);

        let docs = RoutePattern::parse("/docs/{*slug}").unwrap();
        assert_eq!(
            docs.url(&[("slug", "guides/setup")]).as_deref(),
            Some("/docs/guides/setup")
        );
        assert_eq!(RoutePattern::parse("/").unwrap().url(&[]).as_deref(), Some("/"));
    }

    #[test]
    fn test_root_pattern() {
        let pattern = RoutePattern::parse("/").unwrap();
        assert_eq!(pattern.matches("/"), Some(vec![]));
        assert_eq!(pattern.matches("/up"), None);
    }

    #[test]
    fn test_param_capture() {
        let pattern = RoutePattern::parse("/email/verify/{id}/{hash}").unwrap();
        assert_eq!(
            pattern.matches("/email/verify/7/abc"),
            Some(params(&[("id", "7"), ("hash", "abc")]))
        );
        assert_eq!(pattern.matches("/email/verify/7"), None);
        assert_eq!(pattern.matches("/email/verify//abc"), None);
    }

    #[test]
    fn test_catch_all() {
        let pattern = RoutePattern::parse("/docs/{*slug}").unwrap();
        assert_eq!(
            pattern.matches("/docs/guides/install"),
            Some(params(&[("slug", "guides/install")]))
        );
        assert_eq!(pattern.matches("/docs"), None);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            RoutePattern::parse("docs"),
            Err(PatternError::MissingLeadingSlash(_))
        ));
        assert!(matches!(
            RoutePattern::parse("/docs//x"),
            Err(PatternError::EmptySegment(_))
        ));
        assert!(matches!(
            RoutePattern::parse("/docs/{*a}/b"),
            Err(PatternError::CatchAllNotLast(_))
        ));
        assert!(matches!(
            RoutePattern::parse("/posts/{id"),
            Err(PatternError::MalformedPlaceholder { .. })
        ));
        assert!(matches!(
            RoutePattern::parse("/a/{id}/{id}"),
            Err(PatternError::DuplicateParam { .. })
        ));
    }

    #[test]
    fn test_specificity_order() {
        let mut patterns: Vec<RoutePattern> = ["/docs/{*slug}", "/posts/{id}", "/posts/new", "/"]
            .iter()
            .map(|p| RoutePattern::parse(p).unwrap())
            .collect();
        patterns.sort_by(|a, b| a.specificity_cmp(b));

        let order: Vec<&str> = patterns.iter().map(|p| p.as_str()).collect();
        assert_eq!(order, vec!["/posts/new", "/", "/posts/{id}", "/docs/{*slug}"]);
    }

    #[test]
    fn test_glob_matches() {
        assert!(glob_matches("stripe/*", "stripe/charge"));
        assert!(glob_matches("stripe/*", "stripe/"));
        assert!(!glob_matches("stripe/*", "stripes/charge"));
        assert!(glob_matches(
            "https://*.cloudworkstations.dev/login",
            "https://abc-123.cloudworkstations.dev/login"
        ));
        assert!(!glob_matches(
            "https://*.cloudworkstations.dev/login",
            "https://abc.cloudworkstations.dev/login/extra"
        ));
        assert!(glob_matches("exact", "exact"));
        assert!(!glob_matches("exact", "exact/more"));
        assert!(glob_matches("*", "anything"));
        assert!(glob_matches("a*b*c", "a-x-b-y-c"));
        assert!(!glob_matches("a*bc", "abc-"));
    }
}
