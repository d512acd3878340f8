use serde_json::{Map, Value};
use tracing::{debug, warn};
use wind_lang::{Unwind, value};

use crate::status::Status;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

const RESPONSE_FIELD: &str = "response";

/// A value handed to `reply`, after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Empty,
    Text(String),
    /// Always carries a `response` status field.
    Structured(Map<String, Value>),
}

impl Reply {
    /// Normalization is idempotent: an object that already has a `response`
    /// field is kept as is.
    pub fn normalize(value: Value) -> Self {
        match value {
            Value::Array(items) => {
                let mut map = Map::with_capacity(2);
                map.insert(RESPONSE_FIELD.to_string(), Status::Ok.into());
                map.insert("data".to_string(), Value::Array(items));
                Reply::Structured(map)
            }
            Value::Object(map) if map.contains_key(RESPONSE_FIELD) => Reply::Structured(map),
            Value::Object(map) => {
                let mut with_status = Map::with_capacity(map.len() + 1);
                with_status.insert(RESPONSE_FIELD.to_string(), Status::Ok.into());
                with_status.extend(map);
                Reply::Structured(with_status)
            }
            Value::String(s) if !s.is_empty() => Reply::Text(s),
            Value::Bool(true) => Reply::Text("true".to_string()),
            Value::Number(n) if n.as_f64().is_some_and(|f| f != 0.0) => Reply::Text(n.to_string()),
            _ => Reply::Empty,
        }
    }

    /// `{response: <status>, error: <message>}`
    pub fn error(status: Status, message: impl Into<String>) -> Self {
        let mut map = Map::with_capacity(2);
        map.insert(RESPONSE_FIELD.to_string(), status.into());
        map.insert("error".to_string(), Value::String(message.into()));
        Reply::Structured(map)
    }

    /// The `response` field of a structured reply.
    pub fn status(&self) -> Option<u64> {
        match self {
            Reply::Structured(map) => map.get(RESPONSE_FIELD).and_then(Value::as_u64),
            _ => None,
        }
    }

    /// A structured reply whose status is anything but OK.
    pub fn is_failure(&self) -> bool {
        matches!(self, Reply::Structured(_))
            && self.status() != Some(u64::from(Status::Ok.code()))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Reply::Empty)
    }

    pub fn into_value(self) -> Value {
        match self {
            Reply::Empty => Value::Null,
            Reply::Text(s) => Value::String(s),
            Reply::Structured(map) => Value::Object(map),
        }
    }
}

/// Transport-neutral output of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub content_type: Option<String>,
    pub body: String,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            content_type: None,
            body: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyState {
    /// Nothing written, content type undecided.
    Open,
    /// Content type chosen, nothing written.
    TypeDecided,
    /// Header and some body bytes written.
    Flushed,
    /// No further writes permitted.
    Terminated,
}

/// The single funnel for output of one top-level request.
#[derive(Debug, Clone)]
pub struct ReplyEngine {
    state: ReplyState,
    content_type: Option<String>,
    pending: Option<Reply>,
    response: Response,
}

impl Default for ReplyEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplyEngine {
    pub fn new() -> Self {
        Self {
            state: ReplyState::Open,
            content_type: None,
            pending: None,
            response: Response::default(),
        }
    }

    pub fn state(&self) -> ReplyState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state == ReplyState::Terminated
    }

    /// Routes a reply according to where the execution currently is:
    ///
    /// - nested (`internal_call > 0`): captured as pending, unwind to the
    ///   call site;
    /// - top level of a batch entry: captured as pending, unwind to the batch
    ///   loop without writing;
    /// - true top level: written once, then the request is over.
    pub fn reply(&mut self, value: Value, nested: bool, batch: bool) -> Unwind {
        let reply = Reply::normalize(value);

        if nested {
            self.pending = Some(reply);
            return Unwind::Return;
        }

        if batch {
            self.pending = Some(reply);
            return Unwind::Suppressed;
        }

        self.emit(reply);
        Unwind::Terminated
    }

    pub fn take_pending(&mut self) -> Option<Reply> {
        self.pending.take()
    }

    pub fn set_pending(&mut self, reply: Option<Reply>) {
        self.pending = reply;
    }

    /// Explicit content type; wins over the default chosen at emission time.
    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        match self.state {
            ReplyState::Open | ReplyState::TypeDecided => {
                self.content_type = Some(content_type.into());
                self.state = ReplyState::TypeDecided;
            }
            ReplyState::Flushed | ReplyState::Terminated => {
                warn!(state = ?self.state, "content type set after output was written");
            }
        }
    }

    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        match self.state {
            ReplyState::Open | ReplyState::TypeDecided => {
                self.response.headers.push((name.into(), value.into()));
            }
            ReplyState::Flushed | ReplyState::Terminated => {
                warn!(state = ?self.state, "header emitted after output was written");
            }
        }
    }

    /// Writes diagnostic text, flushing the header on first use.
    pub fn echo(&mut self, text: &str) {
        match self.state {
            ReplyState::Terminated => {}
            ReplyState::Flushed => self.response.body.push_str(text),
            ReplyState::Open | ReplyState::TypeDecided => {
                self.write_header(TEXT_CONTENT_TYPE);
                self.state = ReplyState::Flushed;
                self.response.body.push_str(text);
            }
        }
    }

    /// Ends the request without writing anything further.
    pub fn terminate(&mut self) {
        self.state = ReplyState::Terminated;
    }

    /// Writes `reply` as the whole response body. Once anything has been
    /// written this only terminates.
    pub fn emit(&mut self, reply: Reply) -> bool {
        if matches!(self.state, ReplyState::Flushed | ReplyState::Terminated) {
            debug!(state = ?self.state, "reply after output was written, terminating");
            self.state = ReplyState::Terminated;
            return false;
        }

        match reply {
            Reply::Empty => {}
            Reply::Text(text) => {
                self.write_header(TEXT_CONTENT_TYPE);
                self.response.body = text;
            }
            Reply::Structured(map) => {
                self.write_header(JSON_CONTENT_TYPE);
                self.response.body = Value::Object(map).to_string();
            }
        }

        self.state = ReplyState::Terminated;
        true
    }

    pub fn finish(self) -> Response {
        self.response
    }

    fn write_header(&mut self, default: &str) {
        let content_type = self
            .content_type
            .clone()
            .unwrap_or_else(|| default.to_string());
        self.response.content_type = Some(content_type);
    }
}

/// Text written by `echo`: arguments joined by spaces, newline-terminated.
pub fn echo_line(args: &[Value]) -> String {
    let mut line = args.iter().map(value::to_text).collect::<Vec<_>>().join(" ");
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case::array(json!([1, 2]), Reply::Structured(json_map(json!({"response": 200, "data": [1, 2]}))))]
    #[case::object_gets_status(json!({"a": 1}), Reply::Structured(json_map(json!({"response": 200, "a": 1}))))]
    #[case::object_keeps_status(json!({"a": 1, "response": 404}), Reply::Structured(json_map(json!({"a": 1, "response": 404}))))]
    #[case::text(json!("hi"), Reply::Text("hi".to_string()))]
    #[case::empty_string(json!(""), Reply::Empty)]
    #[case::null(json!(null), Reply::Empty)]
    #[case::false_is_empty(json!(false), Reply::Empty)]
    #[case::zero_is_empty(json!(0), Reply::Empty)]
    #[case::true_is_text(json!(true), Reply::Text("true".to_string()))]
    #[case::number_is_text(json!(12.5), Reply::Text("12.5".to_string()))]
    fn test_normalize(#[case] value: Value, #[case] expected: Reply) {
        assert_eq!(Reply::normalize(value), expected);
    }

    fn json_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = Reply::normalize(json!({"x": [1], "response": 409}));
        let twice = Reply::normalize(once.clone().into_value());
        assert_eq!(once, twice);
        assert_eq!(twice.status(), Some(409));
    }

    #[test]
    fn test_injected_status_comes_first() {
        let Reply::Structured(map) = Reply::normalize(json!({"b": 1, "a": 2})) else {
            panic!("expected structured reply");
        };
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["response", "b", "a"]);
    }

    #[test]
    fn test_is_failure() {
        assert!(Reply::error(Status::CustomError, "boom").is_failure());
        assert!(!Reply::normalize(json!({"ok": true})).is_failure());
        assert!(!Reply::Text("x".to_string()).is_failure());
    }

    #[test]
    fn test_nested_reply_is_pending() {
        let mut engine = ReplyEngine::new();
        assert_eq!(engine.reply(json!([1]), true, false), Unwind::Return);
        assert_eq!(engine.take_pending().and_then(|r| r.status()), Some(200));
        assert_eq!(engine.state(), ReplyState::Open);
        assert_eq!(engine.finish().body, "");
    }

    #[test]
    fn test_batch_reply_is_suppressed() {
        let mut engine = ReplyEngine::new();
        assert_eq!(engine.reply(json!("x"), false, true), Unwind::Suppressed);
        assert_eq!(engine.take_pending(), Some(Reply::Text("x".to_string())));
        assert_eq!(engine.finish(), Response::default());
    }

    #[test]
    fn test_top_level_reply_emits_once() {
        let mut engine = ReplyEngine::new();
        assert_eq!(engine.reply(json!({"a": 1}), false, false), Unwind::Terminated);
        assert_eq!(engine.reply(json!({"b": 2}), false, false), Unwind::Terminated);

        let response = engine.finish();
        assert_eq!(response.body, r#"{"response":200,"a":1}"#);
        assert_eq!(response.content_type.as_deref(), Some(JSON_CONTENT_TYPE));
    }

    #[test]
    fn test_explicit_content_type_wins() {
        let mut engine = ReplyEngine::new();
        engine.set_content_type("text/csv");
        assert_eq!(engine.state(), ReplyState::TypeDecided);
        engine.reply(json!("a,b"), false, false);

        let response = engine.finish();
        assert_eq!(response.content_type.as_deref(), Some("text/csv"));
        assert_eq!(response.body, "a,b");
    }

    #[test]
    fn test_reply_after_echo_only_terminates() {
        let mut engine = ReplyEngine::new();
        engine.echo(&echo_line(&[json!("debug"), json!(1)]));
        assert_eq!(engine.state(), ReplyState::Flushed);

        engine.reply(json!({"a": 1}), false, false);
        assert!(engine.is_terminated());

        let response = engine.finish();
        assert_eq!(response.body, "debug 1\n");
        assert_eq!(response.content_type.as_deref(), Some(TEXT_CONTENT_TYPE));
    }

    #[test]
    fn test_headers_after_flush_are_dropped() {
        let mut engine = ReplyEngine::new();
        engine.add_header("X-A", "1");
        engine.echo("x");
        engine.add_header("X-B", "2");
        assert_eq!(
            engine.finish().headers,
            vec![("X-A".to_string(), "1".to_string())]
        );
    }

    #[test]
    fn test_empty_top_level_reply_writes_nothing() {
        let mut engine = ReplyEngine::new();
        engine.reply(json!(null), false, false);
        assert!(engine.is_terminated());
        assert_eq!(engine.finish().content_type, None);
    }
}
