use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{
        HeaderMap, HeaderName, HeaderValue, StatusCode, Uri,
        header::{ACCEPT, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{debug, error, warn};
use wind_core::{DispatchError, DispatchOptions, Dispatcher, ProgramCache, RequestParams};

use crate::problem::ProblemDetails;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ProgramCache>,
    pub options: DispatchOptions,
}

impl AppState {
    pub fn new(cache: ProgramCache, options: DispatchOptions) -> Self {
        Self {
            cache: Arc::new(cache),
            options,
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("Dispatcher task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(error = %self, "request failed");

        let problem = ProblemDetails::new(StatusCode::INTERNAL_SERVER_ERROR);
        match self {
            ApiError::Dispatch(DispatchError::Unhandled { path, fault }) => problem
                .with_title("Unhandled fault")
                .with_detail(fault.to_string())
                .with_instance(path),
            ApiError::Task(e) => problem.with_detail(e.to_string()),
        }
        .into_response()
    }
}

/// Handles `/` and every `/{*path}` for both GET and POST.
pub async fn dispatch(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let params = request_params(&uri, &headers, &body);
    debug!(path = uri.path(), params = params.len(), "dispatching request");

    let AppState { cache, options } = state;
    let response =
        tokio::task::spawn_blocking(move || Dispatcher::with_options(cache, options).main(params))
            .await??;

    Ok(into_http_response(response))
}

/// Query string merged with a form-encoded body; body values win.
pub fn request_params(uri: &Uri, headers: &HeaderMap, body: &[u8]) -> RequestParams {
    let mut params = uri
        .query()
        .map(RequestParams::from_urlencoded)
        .unwrap_or_default();

    if !body.is_empty() && is_form(headers) {
        params.extend(url::form_urlencoded::parse(body).into_owned());
    }

    let route = match uri.path() {
        "" | "/" => None,
        path => Some(path),
    };
    let accept = headers.get(ACCEPT).and_then(|v| v.to_str().ok());

    params.with_route(route).with_accept(accept)
}

fn is_form(headers: &HeaderMap) -> bool {
    match headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        None => true,
        Some(content_type) => content_type.starts_with(FORM_CONTENT_TYPE),
    }
}

pub fn into_http_response(response: wind_core::Response) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::OK);
    let mut http = (status, response.body).into_response();
    let headers = http.headers_mut();

    match response
        .content_type
        .as_deref()
        .map(HeaderValue::from_str)
    {
        Some(Ok(value)) => {
            headers.insert(CONTENT_TYPE, value);
        }
        Some(Err(_)) => {
            warn!(content_type = ?response.content_type, "invalid content type dropped");
            headers.remove(CONTENT_TYPE);
        }
        None => {
            headers.remove(CONTENT_TYPE);
        }
    }

    for (name, value) in response.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => warn!(%name, %value, "invalid header dropped"),
        }
    }

    http
}
