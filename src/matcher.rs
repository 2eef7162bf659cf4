use crate::transform::Transform;
use std::fmt;
use std::sync::Arc;

/// A parsed `Content-Type` value.
///
/// Only the essence (`type/subtype`) takes part in matching. Parameters are kept
/// in declaration order and handed to the transform untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    essence: String,
    params: Vec<(String, String)>,
}

impl MediaType {
    /// Parses a header value such as `text/html; charset=utf-8`.
    ///
    /// Returns `None` when the value has no `type/subtype` part.
    pub fn parse(value: &str) -> Option<MediaType> {
        let mut parts = value.split(';');
        let essence = parts.next()?.trim();

        let (ty, subtype) = essence.split_once('/')?;
        if ty.is_empty() || subtype.is_empty() || subtype.contains('/') {
            return None;
        }

        let params = parts
            .filter_map(|param| {
                let (name, value) = param.split_once('=')?;
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                let value = value.trim();
                let value = value
                    .strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .unwrap_or(value);
                Some((name.to_string(), value.to_string()))
            })
            .collect();

        Some(MediaType {
            essence: essence.to_string(),
            params,
        })
    }

    /// Returns the `type/subtype` part.
    pub fn essence(&self) -> &str {
        &self.essence
    }

    /// Returns the parameters in declaration order.
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Returns the value of the first parameter called `name` (case-insensitive).
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.essence)?;
        for (name, value) in &self.params {
            write!(f, "; {name}={value}")?;
        }
        Ok(())
    }
}

/// A rule for selecting a transform by media type essence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// Matches one essence exactly, e.g. `text/html`.
    Exact(String),
    /// Matches every essence starting with the prefix, e.g. `text/`.
    Prefix(String),
}

impl Pattern {
    /// Creates an exact pattern.
    pub fn exact(essence: impl Into<String>) -> Self {
        Pattern::Exact(essence.into())
    }

    /// Creates a prefix pattern.
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Pattern::Prefix(prefix.into())
    }

    /// Returns whether `essence` satisfies this pattern.
    pub fn matches(&self, essence: &str) -> bool {
        match self {
            Pattern::Exact(expected) => essence == expected,
            Pattern::Prefix(prefix) => essence.starts_with(prefix.as_str()),
        }
    }
}

/// Result of a successful registry lookup.
#[derive(Clone)]
pub struct Match {
    /// The transform registered for the media type.
    pub transform: Arc<dyn Transform>,
    /// The parsed declared media type.
    pub media_type: MediaType,
}

impl fmt::Debug for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Match")
            .field("media_type", &self.media_type)
            .finish_non_exhaustive()
    }
}

/// Ordered set of media type patterns and their transforms.
///
/// Lookups walk the patterns in registration order and the first match wins.
/// The registry is built once and then shared read-only between requests.
#[derive(Clone, Default)]
pub struct Registry {
    rules: Vec<(Pattern, Arc<dyn Transform>)>,
}

impl Registry {
    /// Creates a registry with no rules; every response passes through.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in rules for every enabled feature.
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::empty();

        #[cfg(feature = "html")]
        registry.register(Pattern::exact("text/html"), crate::minify::Html);
        #[cfg(feature = "json")]
        registry.register(Pattern::exact("application/json"), crate::minify::Json);
        #[cfg(feature = "svg")]
        registry.register(Pattern::exact("image/svg+xml"), crate::minify::Svg);

        registry
    }

    /// Appends a rule. It is consulted after every rule registered before it.
    pub fn register<T>(&mut self, pattern: Pattern, transform: T) -> &mut Self
    where
        T: Transform,
    {
        self.rules.push((pattern, Arc::new(transform)));
        self
    }

    /// Finds the transform for a declared `Content-Type` value.
    ///
    /// `None` means the body should pass through unmodified.
    pub fn find(&self, declared: &str) -> Option<Match> {
        let media_type = MediaType::parse(declared)?;

        self.rules
            .iter()
            .find(|(pattern, _)| pattern.matches(media_type.essence()))
            .map(|(_, transform)| Match {
                transform: Arc::clone(transform),
                media_type,
            })
    }

    /// Returns the number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns whether the registry has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|(pattern, _)| pattern))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransformError;
    use crate::transform::transform_fn;
    use bytes::BytesMut;

    fn tagging(tag: &'static [u8]) -> impl Transform {
        transform_fn(move |_: &MediaType, _: &[u8], out: &mut BytesMut| {
            out.extend_from_slice(tag);
            Ok::<_, TransformError>(())
        })
    }

    fn run(found: &Match) -> BytesMut {
        let mut out = BytesMut::new();
        found
            .transform
            .transform(&found.media_type, b"", &mut out)
            .unwrap();
        out
    }

    #[test]
    fn test_parse_essence_only() {
        let media = MediaType::parse("text/html").unwrap();
        assert_eq!(media.essence(), "text/html");
        assert!(media.params().is_empty());
    }

    #[test]
    fn test_parse_with_params() {
        let media = MediaType::parse(" image/svg+xml ; charset=\"utf-8\"; q=1 ").unwrap();
        assert_eq!(media.essence(), "image/svg+xml");
        assert_eq!(media.param("Charset"), Some("utf-8"));
        assert_eq!(media.param("q"), Some("1"));
        assert_eq!(media.to_string(), "image/svg+xml; charset=utf-8; q=1");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(MediaType::parse("").is_none());
        assert!(MediaType::parse("html").is_none());
        assert!(MediaType::parse("text/").is_none());
        assert!(MediaType::parse("/html").is_none());
        assert!(MediaType::parse("a/b/c").is_none());
    }

    #[test]
    fn test_pattern_matching_is_case_sensitive() {
        assert!(Pattern::exact("text/html").matches("text/html"));
        assert!(!Pattern::exact("text/html").matches("Text/HTML"));
        assert!(!Pattern::exact("text/html").matches("text/html5"));
        assert!(Pattern::prefix("text/").matches("text/css"));
        assert!(!Pattern::prefix("text/").matches("image/svg+xml"));
    }

    #[test]
    fn test_first_registered_wins() {
        let mut registry = Registry::empty();
        registry
            .register(Pattern::prefix("text/"), tagging(b"prefix"))
            .register(Pattern::exact("text/html"), tagging(b"exact"));

        let found = registry.find("text/html; charset=utf-8").unwrap();
        assert_eq!(&run(&found)[..], b"prefix");
        assert_eq!(found.media_type.param("charset"), Some("utf-8"));
    }

    #[test]
    fn test_no_match() {
        let mut registry = Registry::empty();
        registry.register(Pattern::exact("text/html"), tagging(b"html"));

        assert!(registry.find("application/octet-stream").is_none());
        assert!(registry.find("not a media type").is_none());
    }

    #[test]
    fn test_empty_registry() {
        let registry = Registry::empty();
        assert!(registry.is_empty());
        assert!(registry.find("text/html").is_none());
    }

    #[test]
    #[cfg(all(feature = "html", feature = "json", feature = "svg"))]
    fn test_default_registrations() {
        let registry = Registry::with_defaults();
        assert_eq!(registry.len(), 3);
        assert!(registry.find("text/html").is_some());
        assert!(registry.find("application/json").is_some());
        assert!(registry.find("image/svg+xml").is_some());
        assert!(registry.find("text/plain").is_none());
        assert!(registry.find("image/png").is_none());
    }

    #[test]
    fn test_debug_lists_patterns() {
        let mut registry = Registry::empty();
        registry.register(Pattern::exact("text/html"), tagging(b""));
        assert_eq!(format!("{registry:?}"), r#"[Exact("text/html")]"#);
    }
}
