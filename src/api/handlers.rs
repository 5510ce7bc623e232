use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{HeaderValue, Method, Request, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;

use super::instrument::WriterHandler;
use super::writer::{ResponseWriter, http_error};
use crate::AppState;
use crate::error::Result;

const DEFAULT_NAME: &str = "World";

#[derive(Clone, Debug, Serialize)]
pub struct GreetingResponse {
    pub message: String,
}

/// `GET /hello?name=<name>`
#[derive(Debug, Default, Clone, Copy)]
pub struct Greeter;

impl Greeter {
    /// First non-empty `name` query value, or the default.
    fn name_from(req: &Request<Body>) -> String {
        Query::<Vec<(String, String)>>::try_from_uri(req.uri())
            .ok()
            .and_then(|Query(pairs)| {
                pairs
                    .into_iter()
                    .find(|(key, _)| key == "name")
                    .map(|(_, value)| value)
            })
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_NAME.to_string())
    }

    fn encode<T: Serialize>(resp: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(resp)?)
    }
}

#[async_trait]
impl WriterHandler for Greeter {
    async fn serve(&self, req: Request<Body>, w: &mut dyn ResponseWriter) {
        if req.method() != Method::GET {
            http_error(w, StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
            return;
        }

        let resp = GreetingResponse {
            message: format!("Hello {}", Self::name_from(&req)),
        };

        let body = match Self::encode(&resp) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode greeting");
                http_error(w, e.status_code(), "failed to encode response");
                return;
            }
        };

        w.set_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        if let Err(e) = w.write_body(&body) {
            tracing::warn!(error = %e, "failed to write greeting");
        }
    }
}

/// Prometheus scrape endpoint, served on the metrics listener.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    state.recorder.update_runtime_metrics();

    match state.recorder.gather() {
        Ok((body, content_type)) => {
            ([(header::CONTENT_TYPE, content_type)], body).into_response()
        }
        Err(e) => e.into_response(),
    }
}
