use std::fmt::{self, Display, Formatter};
use std::sync::LazyLock;

use regex_lite::Regex;
use smol_str::SmolStr;

/// Prefix marking a path that is resolved against the caller's namespace.
pub const RELATIVE_MARKER: char = '@';

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[#A-Za-z0-9.,_:|-]+").expect("identifier pattern is valid"));

static SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[#A-Za-z0-9,_:|-]+$").expect("segment pattern is valid"));

/// Dotted identifier naming a dispatchable program, e.g. `users.list`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionPath(SmolStr);

impl FunctionPath {
    pub fn new(path: impl Into<SmolStr>) -> Self {
        Self(path.into())
    }

    /// Extracts the first run of identifier characters from a raw request
    /// value, the way `f=` is read.
    pub fn extract(raw: &str) -> Option<Self> {
        IDENTIFIER.find(raw).map(|m| Self::new(m.as_str()))
    }

    /// Translates a transport path such as `/users/list` to `users.list`.
    pub fn from_route(route: &str) -> Option<Self> {
        let dotted = route
            .trim_matches('/')
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join(".");
        Self::extract(&dotted).filter(|path| path.as_str() == dotted)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_relative(&self) -> bool {
        self.0.starts_with(RELATIVE_MARKER)
    }

    /// Path with its last segment removed plus a trailing dot, so `@sibling`
    /// inside `a.b.c` becomes `a.b.sibling`. Empty for a single-segment path.
    pub fn namespace(&self) -> SmolStr {
        match self.0.rfind('.') {
            Some(idx) => SmolStr::new(&self.0[..=idx]),
            None => SmolStr::default(),
        }
    }

    /// Replaces the relative marker with `namespace`.
    pub fn with_namespace(&self, namespace: &str) -> Self {
        match self.0.strip_prefix(RELATIVE_MARKER) {
            Some(rest) => Self::new(format!("{}{}", namespace, rest)),
            None => self.clone(),
        }
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// An absolute path is dispatchable only when every segment is non-empty
    /// and made of identifier characters, which keeps computed names from
    /// reaching outside the source root.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && self.segments().all(|s| SEGMENT.is_match(s))
    }
}

impl Display for FunctionPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FunctionPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::plain("users.list", Some("users.list"))]
    #[case::trims_garbage("  users.list ", Some("users.list"))]
    #[case::stops_at_slash("users/../etc", Some("users"))]
    #[case::punctuation("a:b|c-d,e#1", Some("a:b|c-d,e#1"))]
    #[case::nothing("/// ", None)]
    fn test_extract(#[case] raw: &str, #[case] expected: Option<&str>) {
        assert_eq!(
            FunctionPath::extract(raw).as_ref().map(FunctionPath::as_str),
            expected
        );
    }

    #[rstest]
    #[case::nested("/users/list", Some("users.list"))]
    #[case::trailing("users/list/", Some("users.list"))]
    #[case::root("/", None)]
    #[case::bad_chars("/users/li st", None)]
    fn test_from_route(#[case] route: &str, #[case] expected: Option<&str>) {
        assert_eq!(
            FunctionPath::from_route(route).as_ref().map(FunctionPath::as_str),
            expected
        );
    }

    #[rstest]
    #[case("a.b.c", "a.b.")]
    #[case("a", "")]
    fn test_namespace(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(FunctionPath::from(path).namespace(), expected);
    }

    #[test]
    fn test_with_namespace() {
        let path = FunctionPath::from("@sib");
        assert!(path.is_relative());
        assert_eq!(path.with_namespace("a.b.").as_str(), "a.b.sib");
        assert_eq!(FunctionPath::from("x.y").with_namespace("a."), FunctionPath::from("x.y"));
    }

    #[rstest]
    #[case("a.b.c", true)]
    #[case("a..c", false)]
    #[case(".a", false)]
    #[case("a.", false)]
    #[case("", false)]
    #[case("a/b", false)]
    #[case("@a", false)]
    fn test_is_valid(#[case] path: &str, #[case] expected: bool) {
        assert_eq!(FunctionPath::from(path).is_valid(), expected);
    }
}
