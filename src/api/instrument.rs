//! Per-request instrumentation for writer-style handlers.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    response::Response,
};
use futures_util::future::BoxFuture;
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::Service;
use tracing::Instrument;

use super::writer::{ResponseBuffer, ResponseWriter, StatusRecorder};
use crate::observability::{LabelSet, MetricsRecorder};

/// A handler that emits its response through a [`ResponseWriter`].
#[async_trait]
pub trait WriterHandler: Send + Sync + 'static {
    async fn serve(&self, req: Request<Body>, w: &mut dyn ResponseWriter);
}

/// Wraps a [`WriterHandler`] and records one counter increment and one
/// latency observation per invocation, labelled by method, the static
/// route `path` and the captured status.
///
/// The handler's output is buffered; recording happens after the handler
/// returns and just before the buffered response is handed back to hyper.
pub struct Instrumented<H> {
    path: &'static str,
    recorder: Arc<MetricsRecorder>,
    inner: Arc<H>,
}

impl<H> Clone for Instrumented<H> {
    fn clone(&self) -> Self {
        Self {
            path: self.path,
            recorder: self.recorder.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<H: WriterHandler> Instrumented<H> {
    pub fn new(path: &'static str, recorder: Arc<MetricsRecorder>, inner: H) -> Self {
        Self {
            path,
            recorder,
            inner: Arc::new(inner),
        }
    }

    async fn handle(&self, req: Request<Body>) -> Response {
        let span = tracing::info_span!(
            "http_request",
            method = %req.method(),
            path = self.path,
        );

        let mut observation =
            Observation::start(self.recorder.clone(), req.method().clone(), self.path);

        self.inner
            .serve(req, observation.writer())
            .instrument(span)
            .await;

        observation.finish().into_response()
    }
}

impl<H: WriterHandler> Service<Request<Body>> for Instrumented<H> {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let this = self.clone();
        Box::pin(async move { Ok(this.handle(req).await) })
    }
}

/// In-flight measurement for a single request.
///
/// Records on `finish`, or on drop if the handler panicked (status 500) or
/// the request future was cancelled (status captured so far).
struct Observation {
    recorder: Arc<MetricsRecorder>,
    method: Method,
    path: &'static str,
    writer: StatusRecorder<ResponseBuffer>,
    start: Instant,
    recorded: bool,
}

impl Observation {
    fn start(recorder: Arc<MetricsRecorder>, method: Method, path: &'static str) -> Self {
        let writer = StatusRecorder::new(ResponseBuffer::new());
        Self {
            recorder,
            method,
            path,
            writer,
            start: Instant::now(),
            recorded: false,
        }
    }

    fn writer(&mut self) -> &mut StatusRecorder<ResponseBuffer> {
        &mut self.writer
    }

    fn finish(mut self) -> ResponseBuffer {
        self.record(self.writer.status());
        let (buffer, _) = std::mem::take(&mut self.writer).into_parts();
        buffer
    }

    fn record(&mut self, status: StatusCode) {
        let elapsed = self.start.elapsed().as_secs_f64();
        let labels = LabelSet::new(&self.method, self.path, status);

        self.recorder.increment(&labels);
        self.recorder.observe(&labels, elapsed);
        self.recorded = true;

        tracing::debug!(
            method = %labels.method,
            path = %labels.path,
            status = %labels.status,
            elapsed_seconds = elapsed,
            "request recorded"
        );
    }
}

impl Drop for Observation {
    fn drop(&mut self) {
        if self.recorded {
            return;
        }

        let status = if std::thread::panicking() {
            tracing::error!(path = self.path, "handler panicked");
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            tracing::warn!(path = self.path, "request cancelled before handler returned");
            self.writer.status()
        };
        self.record(status);
    }
}
