use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value};

use crate::path::FunctionPath;

/// Parameters of one request: an ordered string map plus what the transport
/// knows about the route and the `Accept` header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParams {
    values: Map<String, Value>,
    route: Option<String>,
    accept: Option<String>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(mut self, route: Option<&str>) -> Self {
        self.route = route.map(str::to_string);
        self
    }

    pub fn with_accept(mut self, accept: Option<&str>) -> Self {
        self.accept = accept.map(str::to_string);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), Value::String(value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    pub fn accept(&self) -> Option<&str> {
        self.accept.as_deref()
    }

    /// All parameters as an object, for the `request` primitive.
    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }

    /// `f` when it contains identifier characters, otherwise the route alias.
    pub fn function_name(&self) -> Option<FunctionPath> {
        match self.get("f") {
            Some(f) => FunctionPath::extract(f),
            None => self.route().and_then(FunctionPath::from_route),
        }
    }

    pub fn batch_envelope(&self) -> Option<&str> {
        self.get("rpkg").or_else(|| self.get("mreq"))
    }

    /// A copy of `self` with every key of `other` added or replaced.
    pub fn overlay(&self, other: &RequestParams) -> RequestParams {
        let mut merged = self.clone();
        for (key, value) in &other.values {
            merged.values.insert(key.clone(), value.clone());
        }
        merged
    }

    pub fn accepts_json(&self) -> bool {
        match self.accept() {
            None => true,
            Some(accept) => accept.contains("json") || accept.contains("*/*"),
        }
    }

    /// Parses an `application/x-www-form-urlencoded` string.
    pub fn from_urlencoded(input: &str) -> Self {
        let mut params = Self::new();
        params.extend(url::form_urlencoded::parse(input.as_bytes()).into_owned());
        params
    }

    /// Decodes the params of a batch entry: base64 of a url-encoded string.
    pub fn from_encoded(encoded: &str) -> Option<Self> {
        let bytes = STANDARD.decode(encoded.trim()).ok()?;
        let query = String::from_utf8(bytes).ok()?;
        Some(Self::from_urlencoded(&query))
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for RequestParams {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RequestParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut params = Self::new();
        params.extend(iter);
        params
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn params(pairs: &[(&str, &str)]) -> RequestParams {
        pairs.iter().copied().collect()
    }

    #[rstest]
    #[case::from_f(params(&[("f", "users.list")]), None, Some("users.list"))]
    #[case::f_is_sanitized(params(&[("f", "<users.list>")]), None, Some("users.list"))]
    #[case::f_wins_over_route(params(&[("f", "a")]), Some("/b/c"), Some("a"))]
    #[case::route_alias(params(&[]), Some("/b/c"), Some("b.c"))]
    #[case::garbage_f(params(&[("f", "///")]), Some("/b/c"), None)]
    #[case::nothing(params(&[]), None, None)]
    fn test_function_name(
        #[case] params: RequestParams,
        #[case] route: Option<&str>,
        #[case] expected: Option<&str>,
    ) {
        let params = params.with_route(route);
        assert_eq!(
            params.function_name().as_ref().map(FunctionPath::as_str),
            expected
        );
    }

    #[rstest]
    #[case(params(&[("rpkg", "a"), ("mreq", "b")]), Some("a"))]
    #[case(params(&[("mreq", "b")]), Some("b"))]
    #[case(params(&[("f", "x")]), None)]
    fn test_batch_envelope(#[case] params: RequestParams, #[case] expected: Option<&str>) {
        assert_eq!(params.batch_envelope(), expected);
    }

    #[rstest]
    #[case(None, true)]
    #[case(Some("application/json"), true)]
    #[case(Some("*/*"), true)]
    #[case(Some("text/html"), false)]
    fn test_accepts_json(#[case] accept: Option<&str>, #[case] expected: bool) {
        assert_eq!(RequestParams::new().with_accept(accept).accepts_json(), expected);
    }

    #[test]
    fn test_overlay_replaces_and_adds() {
        let base = params(&[("f", "a"), ("token", "t")]);
        let merged = base.overlay(&params(&[("f", "b"), ("id", "1")]));

        assert_eq!(merged.get("f"), Some("b"));
        assert_eq!(merged.get("token"), Some("t"));
        assert_eq!(merged.get("id"), Some("1"));
        assert_eq!(base.get("f"), Some("a"));
    }

    #[test]
    fn test_from_encoded() {
        let encoded = STANDARD.encode("f=users.get&id=4&name=a%20b");
        let decoded = RequestParams::from_encoded(&encoded).unwrap();
        assert_eq!(
            decoded.to_value(),
            json!({"f": "users.get", "id": "4", "name": "a b"})
        );
    }

    #[test]
    fn test_from_encoded_rejects_bad_base64() {
        assert_eq!(RequestParams::from_encoded("***"), None);
    }
}
