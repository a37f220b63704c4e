//! URL pattern matching
//!
//! Decides whether a saved block element applies to the current page. Patterns
//! are matched against the parsed current URL:
//!
//! - `exact_page`: byte-exact string equality.
//! - `site_wide`: host equality or dot-suffixed subdomain.
//! - `path_pattern`: the `site_wide` host rule plus a path prefix where `*`
//!   matches any run of characters.
//!
//! # Examples
//!
//! ```
//! use veil_core::pattern::matches;
//! use veil_core::PatternType;
//!
//! assert!(matches("https://www.example.com/x", "example.com", PatternType::SiteWide).unwrap());
//! assert!(!matches("https://other.com", "example.com", PatternType::SiteWide).unwrap());
//! ```

use url::Url;

use crate::types::PatternType;

/// Error type for pattern matching.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

// =============================================================================
// Matching
// =============================================================================

/// Match `current_url` against a stored pattern.
///
/// Empty inputs never match. A `current_url` that cannot be parsed is an error;
/// a pattern that cannot be parsed simply does not match.
pub fn matches(current_url: &str, pattern: &str, pattern_type: PatternType) -> Result<bool, PatternError> {
    if current_url.is_empty() || pattern.is_empty() {
        return Ok(false);
    }

    let current = Url::parse(current_url).map_err(|e| PatternError::InvalidUrl {
        url: current_url.to_string(),
        reason: e.to_string(),
    })?;

    let matched = match pattern_type {
        PatternType::ExactPage => current_url == pattern,
        PatternType::SiteWide => match parse_pattern_url(pattern) {
            Some(pattern_url) => host_matches(&current, &pattern_url),
            None => false,
        },
        PatternType::PathPattern => match parse_pattern_url(pattern) {
            Some(pattern_url) => {
                host_matches(&current, &pattern_url)
                    && PathProgram::compile(pattern_url.path()).matches(current.path())
            }
            None => false,
        },
    };

    Ok(matched)
}

/// Match with a pattern type in its stored string form.
/// Unknown pattern types never match.
pub fn matches_str(current_url: &str, pattern: &str, pattern_type: &str) -> Result<bool, PatternError> {
    if current_url.is_empty() || pattern.is_empty() {
        return Ok(false);
    }
    match PatternType::parse(pattern_type) {
        Some(ty) => matches(current_url, pattern, ty),
        None => {
            // Still reject garbage URLs so callers see the same error either way
            Url::parse(current_url).map_err(|e| PatternError::InvalidUrl {
                url: current_url.to_string(),
                reason: e.to_string(),
            })?;
            Ok(false)
        }
    }
}

/// Parse a stored pattern, assuming `https://` when it has no scheme.
fn parse_pattern_url(pattern: &str) -> Option<Url> {
    if pattern.contains("://") {
        Url::parse(pattern).ok()
    } else {
        Url::parse(&format!("https://{}", pattern)).ok()
    }
}

fn host_matches(current: &Url, pattern: &Url) -> bool {
    let (Some(current_host), Some(pattern_host)) = (current.host_str(), pattern.host_str()) else {
        return false;
    };
    if pattern_host.is_empty() {
        return false;
    }
    walk_host_suffixes(current_host).any(|suffix| suffix == pattern_host)
}

// =============================================================================
// Host Suffixes
// =============================================================================

/// Iterator over a host and each of its dot-separated parents.
pub struct HostSuffixIter<'a> {
    current: Option<&'a str>,
}

impl<'a> Iterator for HostSuffixIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.current?;
        self.current = result.find('.').map(|dot| &result[dot + 1..]).filter(|rest| !rest.is_empty());
        Some(result)
    }
}

/// Walk host suffixes from most specific to least specific.
///
/// `a.b.example.com` yields `a.b.example.com`, `b.example.com`, `example.com`, `com`.
pub fn walk_host_suffixes(host: &str) -> HostSuffixIter<'_> {
    HostSuffixIter {
        current: if host.is_empty() { None } else { Some(host) },
    }
}

// =============================================================================
// Path Programs
// =============================================================================

/// Path matching opcodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathOp {
    /// Assert the next literal starts at the current position
    AssertStart,
    /// Find a literal at (anchored) or after (floating) the current position
    FindLit(String),
    /// `*` wildcard: the next literal may float
    SkipAny,
    /// Match complete; anything may follow
    Done,
}

/// A compiled path pattern. Matching is anchored at the start of the path and
/// is a prefix match: trailing characters after the last literal are allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathProgram {
    ops: Vec<PathOp>,
}

impl PathProgram {
    pub fn compile(pattern_path: &str) -> Self {
        let mut ops = vec![PathOp::AssertStart];
        let mut parts = pattern_path.split('*').peekable();
        while let Some(part) = parts.next() {
            if !part.is_empty() {
                ops.push(PathOp::FindLit(part.to_string()));
            }
            if parts.peek().is_some() {
                ops.push(PathOp::SkipAny);
            }
        }
        ops.push(PathOp::Done);
        Self { ops }
    }

    pub fn ops(&self) -> &[PathOp] {
        &self.ops
    }

    /// Leftmost literal placement is sufficient because nothing anchors the end.
    pub fn matches(&self, path: &str) -> bool {
        let mut pos = 0usize;
        let mut anchored = false;

        for op in &self.ops {
            match op {
                PathOp::AssertStart => anchored = true,
                PathOp::SkipAny => anchored = false,
                PathOp::FindLit(literal) => {
                    let rest = &path[pos..];
                    if anchored {
                        if !rest.starts_with(literal.as_str()) {
                            return false;
                        }
                        pos += literal.len();
                    } else {
                        match rest.find(literal.as_str()) {
                            Some(found) => pos += found + literal.len(),
                            None => return false,
                        }
                    }
                    anchored = true;
                }
                PathOp::Done => return true,
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(url: &str, pattern: &str) -> bool {
        matches(url, pattern, PatternType::SiteWide).unwrap()
    }

    fn path(url: &str, pattern: &str) -> bool {
        matches(url, pattern, PatternType::PathPattern).unwrap()
    }

    fn exact(url: &str, pattern: &str) -> bool {
        matches(url, pattern, PatternType::ExactPage).unwrap()
    }

    #[test]
    fn test_site_wide_hosts() {
        assert!(site("https://example.com/page", "example.com"));
        assert!(site("https://www.example.com/x", "example.com"));
        assert!(site("https://api.v2.example.com/endpoint", "example.com"));
        assert!(!site("https://other.com", "example.com"));
        assert!(!site("https://notexample.com", "example.com"));
    }

    #[test]
    fn test_site_wide_ignores_everything_but_host() {
        assert!(site("https://example.com/any/path/here", "example.com"));
        assert!(site("https://example.com/page?param=value", "example.com"));
        assert!(site("https://example.com/page#section", "example.com"));
        assert!(site("http://example.com:8080/page", "example.com"));
        assert!(site("https://example.com/", "https://example.com/some/path"));
    }

    #[test]
    fn test_site_wide_real_sites() {
        for url in [
            "https://www.google.com/search",
            "https://mail.google.com/inbox",
            "https://drive.google.com/file/123",
            "https://docs.google.com/document/123",
        ] {
            assert!(site(url, "google.com"), "{url}");
        }
        assert!(site("https://m.youtube.com/watch", "youtube.com"));
    }

    #[test]
    fn test_path_pattern_wildcards() {
        assert!(path("https://example.com/videos", "example.com/videos"));
        assert!(path("https://example.com/videos/watch/123", "example.com/videos/*"));
        assert!(path("https://example.com/videos/watch/123?x=1", "example.com/videos/*"));
        assert!(path("https://example.com/videos/category/action/movie/123", "example.com/videos/*"));
        assert!(path("https://example.com/videos/123/comments/456", "example.com/videos/*/comments/*"));
        assert!(!path("https://example.com/music", "example.com/videos/*"));
        assert!(!path("https://other.com/videos", "example.com/videos"));
    }

    #[test]
    fn test_path_pattern_ignores_query_and_hash() {
        assert!(path("https://example.com/videos/watch?id=123", "example.com/videos/*"));
        assert!(path("https://example.com/videos/watch#comments", "example.com/videos/*"));
        assert!(path("https://example.com/videos/watch", "https://example.com/videos/*"));
        assert!(path("https://example.com/", "example.com/"));
    }

    #[test]
    fn test_path_pattern_is_prefix_match() {
        assert!(path("https://example.com/videos/extra", "example.com/videos"));
        assert!(path("https://www.youtube.com/watch?v=123", "youtube.com/watch*"));
        assert!(!path("https://www.youtube.com/", "youtube.com/watch*"));
        assert!(!path("https://www.youtube.com/playlist?list=123", "youtube.com/watch*"));
    }

    #[test]
    fn test_path_pattern_inner_wildcard() {
        assert!(path("https://github.com/user/repo/issues", "github.com/*/issues"));
        assert!(path("https://github.com/user/repo/issues/123", "github.com/*/issues"));
        assert!(!path("https://github.com/user/repo/pulls", "github.com/*/issues"));
    }

    #[test]
    fn test_exact_page_is_byte_exact() {
        let pattern = "https://example.com/page";
        assert!(exact("https://example.com/page", pattern));
        assert!(!exact("https://example.com/page?param=value", pattern));
        assert!(!exact("https://example.com/page#section", pattern));
        assert!(!exact("http://example.com/page", pattern));
        assert!(!exact("https://www.example.com/page", pattern));
        assert!(!exact("https://example.com/Page", pattern));
        assert!(!exact("https://example.com:8080/page", pattern));
        assert!(!exact("https://example.com/page/", pattern));
        assert!(!exact("https://example.com/page/subpage", pattern));
    }

    #[test]
    fn test_empty_inputs_are_false() {
        assert_eq!(matches("", "example.com", PatternType::SiteWide), Ok(false));
        assert_eq!(matches("https://example.com", "", PatternType::SiteWide), Ok(false));
    }

    #[test]
    fn test_invalid_url_is_an_error() {
        let err = matches("not-a-valid-url", "example.com", PatternType::SiteWide).unwrap_err();
        assert!(matches!(err, PatternError::InvalidUrl { .. }));
        assert!(matches_str("not-a-valid-url", "example.com", "bogus").is_err());
    }

    #[test]
    fn test_unknown_pattern_type_is_false() {
        assert_eq!(matches_str("https://example.com/page", "example.com", "invalid_type"), Ok(false));
        assert_eq!(matches_str("https://example.com/page", "example.com", "site_wide"), Ok(true));
    }

    #[test]
    fn test_walk_host_suffixes() {
        let suffixes: Vec<&str> = walk_host_suffixes("a.b.example.com").collect();
        assert_eq!(suffixes, vec!["a.b.example.com", "b.example.com", "example.com", "com"]);
        assert_eq!(walk_host_suffixes("").count(), 0);
    }

    #[test]
    fn test_compile_path_program() {
        let program = PathProgram::compile("/videos/*/comments");
        assert_eq!(
            program.ops(),
            &[
                PathOp::AssertStart,
                PathOp::FindLit("/videos/".to_string()),
                PathOp::SkipAny,
                PathOp::FindLit("/comments".to_string()),
                PathOp::Done,
            ]
        );
    }
}
