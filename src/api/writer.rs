//! Writer-style response construction with status capture.
//!
//! Handlers behind the instrumentation layer emit their response through
//! [`ResponseWriter`]. [`ResponseBuffer`] is the transport end and
//! [`StatusRecorder`] decorates any writer to remember the status that will
//! actually reach the client.

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::Response,
};
use std::io;

/// The three response operations a handler can perform.
pub trait ResponseWriter: Send {
    fn set_header(&mut self, name: HeaderName, value: HeaderValue);

    fn set_status(&mut self, status: StatusCode);

    fn write_body(&mut self, bytes: &[u8]) -> io::Result<()>;
}

/// Buffers a response until the handler returns.
///
/// The status is committed by the first `set_status` call or, failing that,
/// by the first body write (implicitly 200). Later status writes are ignored.
#[derive(Debug, Default)]
pub struct ResponseBuffer {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// A handler that wrote nothing still produces an empty 200.
    pub fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}

impl ResponseWriter for ResponseBuffer {
    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        if self.status.is_some() {
            tracing::warn!(header = %name, "header set after response was committed");
            return;
        }
        self.headers.insert(name, value);
    }

    fn set_status(&mut self, status: StatusCode) {
        match self.status {
            Some(committed) => {
                tracing::warn!(
                    committed = committed.as_u16(),
                    ignored = status.as_u16(),
                    "superfluous status write"
                );
            }
            None => self.status = Some(status),
        }
    }

    fn write_body(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(bytes);
        Ok(())
    }
}

/// Decorates a writer and captures the status it sends.
///
/// The captured status starts at 200, the implicit default, and only
/// `set_status` changes it. Once the response is committed the captured
/// value is frozen, mirroring what the transport does.
#[derive(Debug)]
pub struct StatusRecorder<W> {
    inner: W,
    status: StatusCode,
    committed: bool,
}

impl<W: ResponseWriter> StatusRecorder<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            status: StatusCode::OK,
            committed: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn into_parts(self) -> (W, StatusCode) {
        (self.inner, self.status)
    }
}

impl<W: ResponseWriter + Default> Default for StatusRecorder<W> {
    fn default() -> Self {
        Self::new(W::default())
    }
}

impl<W: ResponseWriter> ResponseWriter for StatusRecorder<W> {
    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.inner.set_header(name, value);
    }

    fn set_status(&mut self, status: StatusCode) {
        if !self.committed {
            self.status = status;
            self.committed = true;
        }
        self.inner.set_status(status);
    }

    fn write_body(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.committed = true;
        self.inner.write_body(bytes)
    }
}

/// Reply with a plain-text error body.
pub fn http_error(w: &mut dyn ResponseWriter, status: StatusCode, message: &str) {
    w.set_header(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    w.set_header(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    w.set_status(status);
    if let Err(e) = w.write_body(format!("{}\n", message).as_bytes()) {
        tracing::warn!(error = %e, "failed to write error body");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Writer whose body writes always fail.
    struct BrokenPipe;

    impl ResponseWriter for BrokenPipe {
        fn set_header(&mut self, _name: HeaderName, _value: HeaderValue) {}

        fn set_status(&mut self, _status: StatusCode) {}

        fn write_body(&mut self, _bytes: &[u8]) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "client went away"))
        }
    }

    #[test]
    fn test_body_without_status_captures_200() {
        let mut w = StatusRecorder::new(ResponseBuffer::new());
        w.write_body(b"hi").unwrap();

        let (buffer, status) = w.into_parts();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(buffer.status(), Some(StatusCode::OK));
    }

    #[test]
    fn test_explicit_status_captured() {
        let mut w = StatusRecorder::new(ResponseBuffer::new());
        w.set_status(StatusCode::METHOD_NOT_ALLOWED);
        w.write_body(b"nope").unwrap();

        assert_eq!(w.status(), StatusCode::METHOD_NOT_ALLOWED);
        let (buffer, _) = w.into_parts();
        assert_eq!(buffer.into_response().status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_first_status_wins() {
        let mut w = StatusRecorder::new(ResponseBuffer::new());
        w.set_status(StatusCode::CREATED);
        w.set_status(StatusCode::INTERNAL_SERVER_ERROR);

        let (buffer, status) = w.into_parts();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(buffer.into_response().status(), StatusCode::CREATED);
    }

    #[test]
    fn test_status_after_body_is_ignored() {
        let mut w = StatusRecorder::new(ResponseBuffer::new());
        w.write_body(b"{}").unwrap();
        w.set_status(StatusCode::INTERNAL_SERVER_ERROR);

        let (buffer, status) = w.into_parts();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(buffer.into_response().status(), StatusCode::OK);
    }

    #[test]
    fn test_nothing_written_is_empty_200() {
        let w = StatusRecorder::new(ResponseBuffer::new());
        let (buffer, status) = w.into_parts();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(buffer.status(), None);
        assert_eq!(buffer.into_response().status(), StatusCode::OK);
    }

    #[test]
    fn test_headers_pass_through() {
        let mut w = StatusRecorder::new(ResponseBuffer::new());
        w.set_header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        w.write_body(b"{}").unwrap();

        let (buffer, _) = w.into_parts();
        let response = buffer.into_response();
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_write_error_is_forwarded() {
        let mut w = StatusRecorder::new(BrokenPipe);
        let err = w.write_body(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_http_error_shape() {
        let mut w = StatusRecorder::new(ResponseBuffer::new());
        http_error(&mut w, StatusCode::METHOD_NOT_ALLOWED, "method not allowed");

        assert_eq!(w.status(), StatusCode::METHOD_NOT_ALLOWED);
        let (buffer, _) = w.into_parts();
        let response = buffer.into_response();
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
        assert_eq!(
            response.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
            "nosniff"
        );
    }
}
