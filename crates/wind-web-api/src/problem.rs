use axum::http::StatusCode;
use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde::ser::SerializeMap;

/// An `application/problem+json` style error body.
#[derive(Debug)]
pub struct ProblemDetails {
    status: StatusCode,
    title: String,
    detail: Option<String>,
    instance: Option<String>,
}

impl Serialize for ProblemDetails {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", "about:blank")?;
        map.serialize_entry("status", &self.status.as_u16())?;
        map.serialize_entry("title", &self.title)?;
        if let Some(detail) = &self.detail {
            map.serialize_entry("detail", detail)?;
        }
        if let Some(instance) = &self.instance {
            map.serialize_entry("instance", instance)?;
        }
        map.end()
    }
}

impl ProblemDetails {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            title: status.canonical_reason().unwrap_or("Error").to_string(),
            detail: None,
            instance: None,
        }
    }

    pub fn with_title(mut self, value: impl Into<String>) -> Self {
        self.title = value.into();
        self
    }

    pub fn with_detail(mut self, value: impl Into<String>) -> Self {
        self.detail = Some(value.into());
        self
    }

    pub fn with_instance(mut self, value: impl Into<String>) -> Self {
        self.instance = Some(value.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ProblemDetails {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(&self)).into_response();
        response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_problem() {
        let problem = ProblemDetails::new(StatusCode::INTERNAL_SERVER_ERROR)
            .with_detail("boom")
            .with_instance("users.list");
        let json = serde_json::to_value(&problem).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "type": "about:blank",
                "status": 500,
                "title": "Internal Server Error",
                "detail": "boom",
                "instance": "users.list",
            })
        );
    }

    #[test]
    fn test_problem_response() {
        let response = ProblemDetails::new(StatusCode::INTERNAL_SERVER_ERROR)
            .with_title("Unhandled fault")
            .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/problem+json"
        );
    }
}
