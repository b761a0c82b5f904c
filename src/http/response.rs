//! HTTP response building module
//!
//! Builds success responses that stream a resolved file and error responses
//! backed by the configured error page.

use futures_util::TryStreamExt;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Bytes, Frame};
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Method, Response, StatusCode};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::handler::resolver::ResolvedTarget;

/// Body type shared by every response the server emits
pub type ResponseBody = http_body_util::combinators::BoxBody<Bytes, io::Error>;

pub const ERROR_CONTENT_TYPE: &str = "text/html; charset=UTF-8";

/// Body used for 403/404/500 when the error page cannot be read
pub const FALLBACK_ERROR_PAGE: &str = "<html><body><h1>500 Internal Error</h1></body></html>";

/// Fixed in-memory body
pub fn full_body(data: impl Into<Bytes>) -> ResponseBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> ResponseBody {
    full_body(Bytes::new())
}

/// A file opened for a GET response, with its size taken from the open handle
pub struct OpenedFile {
    file: File,
    len: u64,
}

impl OpenedFile {
    pub async fn open(target: &ResolvedTarget) -> io::Result<Self> {
        let file = File::open(target.path()).await?;
        let len = file.metadata().await?.len();
        Ok(Self { file, len })
    }

    pub const fn len(&self) -> u64 {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// What a success response carries
pub enum SuccessBody {
    /// GET: the file is streamed; the handle is dropped with the body
    Stream(OpenedFile),
    /// HEAD: headers only, advertising the size a GET would send
    HeadersOnly { len: u64 },
}

/// Build a 200 response for a resolved file
pub fn build_success_response(mime: &str, body: SuccessBody) -> Response<ResponseBody> {
    let (len, body) = match body {
        SuccessBody::Stream(opened) => {
            let len = opened.len;
            let stream = ReaderStream::new(opened.file).map_ok(Frame::data);
            (len, StreamBody::new(stream).boxed())
        }
        SuccessBody::HeadersOnly { len } => (len, empty_body()),
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, mime)
        .header(CONTENT_LENGTH, len)
        .body(body)
        .unwrap_or_else(|e| {
            log_build_error("200", &e);
            internal_error_response()
        })
}

/// Error page source for 403/404/500 responses
#[derive(Debug, Clone)]
pub struct ErrorPage {
    path: PathBuf,
}

impl ErrorPage {
    /// Error page `file_name` inside `document_root`
    pub fn new(document_root: &Path, file_name: &str) -> Self {
        Self {
            path: document_root.join(file_name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Error page bytes, or the inline fallback if the file cannot be read
    pub async fn load(&self) -> Bytes {
        match tokio::fs::read(&self.path).await {
            Ok(data) => Bytes::from(data),
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    crate::logger::warning(&format!(
                        "Failed to read error page '{}': {e}",
                        self.path.display()
                    ));
                }
                Bytes::from_static(FALLBACK_ERROR_PAGE.as_bytes())
            }
        }
    }

    /// Body for an error status: the page for 403/404/500, `"<code> <reason>"` otherwise
    pub async fn body_for(&self, status: StatusCode) -> Bytes {
        match status.as_u16() {
            403 | 404 | 500 => self.load().await,
            code => Bytes::from(format!(
                "{code} {}",
                status.canonical_reason().unwrap_or("Error")
            )),
        }
    }
}

/// Build an error response; `method` decides whether body bytes are sent
pub async fn build_error_response(
    page: &ErrorPage,
    status: StatusCode,
    method: &Method,
) -> Response<ResponseBody> {
    let data = page.body_for(status).await;
    let len = data.len();
    let body = if method == Method::HEAD {
        empty_body()
    } else {
        full_body(data)
    };

    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, ERROR_CONTENT_TYPE)
        .header(CONTENT_LENGTH, len)
        .body(body)
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            internal_error_response()
        })
}

/// Last-resort 500 used when a response cannot be built
fn internal_error_response() -> Response<ResponseBody> {
    let mut response = Response::new(full_body(FALLBACK_ERROR_PAGE));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::severe(&format!("Failed to build {status} response: {error}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::resolver::PathResolver;

    async fn body_bytes(response: Response<ResponseBody>) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    fn header<'a>(response: &'a Response<ResponseBody>, name: &str) -> &'a str {
        response.headers().get(name).unwrap().to_str().unwrap()
    }

    #[tokio::test]
    async fn test_error_page_used_for_page_statuses() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("50x.html"), "<h1>custom</h1>").unwrap();
        let page = ErrorPage::new(dir.path(), "50x.html");

        for status in [
            StatusCode::FORBIDDEN,
            StatusCode::NOT_FOUND,
            StatusCode::INTERNAL_SERVER_ERROR,
        ] {
            let response = build_error_response(&page, status, &Method::GET).await;
            assert_eq!(response.status(), status);
            assert_eq!(header(&response, "content-type"), ERROR_CONTENT_TYPE);
            assert_eq!(header(&response, "content-length"), "15");
            assert_eq!(body_bytes(response).await, "<h1>custom</h1>");
        }
    }

    #[tokio::test]
    async fn test_missing_error_page_uses_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let page = ErrorPage::new(dir.path(), "50x.html");

        let response = build_error_response(&page, StatusCode::FORBIDDEN, &Method::GET).await;
        assert_eq!(
            header(&response, "content-length"),
            FALLBACK_ERROR_PAGE.len().to_string()
        );
        assert_eq!(body_bytes(response).await, FALLBACK_ERROR_PAGE);
    }

    #[tokio::test]
    async fn test_other_statuses_use_code_and_reason() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("50x.html"), "<h1>custom</h1>").unwrap();
        let page = ErrorPage::new(dir.path(), "50x.html");

        let response =
            build_error_response(&page, StatusCode::METHOD_NOT_ALLOWED, &Method::POST).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(header(&response, "content-type"), ERROR_CONTENT_TYPE);
        assert_eq!(body_bytes(response).await, "405 Method Not Allowed");
    }

    #[tokio::test]
    async fn test_head_error_has_no_body() {
        let dir = tempfile::tempdir().unwrap();
        let page = ErrorPage::new(dir.path(), "50x.html");
        let response = build_error_response(&page, StatusCode::NOT_FOUND, &Method::HEAD).await;
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_success_streams_exact_file() {
        let dir = tempfile::tempdir().unwrap();
        let content = vec![b'x'; 100_000];
        std::fs::write(dir.path().join("big.bin"), &content).unwrap();
        let resolver = PathResolver::new(dir.path(), "index.html").unwrap();
        let target = resolver.resolve("/big.bin").await.unwrap();

        let opened = OpenedFile::open(&target).await.unwrap();
        assert_eq!(opened.len(), 100_000);
        let response = build_success_response(FALLBACK_MIME_FOR_TEST, SuccessBody::Stream(opened));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "content-length"), "100000");
        assert_eq!(header(&response, "content-type"), FALLBACK_MIME_FOR_TEST);
        assert_eq!(body_bytes(response).await.as_ref(), content.as_slice());
    }

    #[tokio::test]
    async fn test_head_success_sends_no_bytes() {
        let response = build_success_response("text/html", SuccessBody::HeadersOnly { len: 42 });
        assert_eq!(header(&response, "content-length"), "42");
        assert!(body_bytes(response).await.is_empty());
    }

    const FALLBACK_MIME_FOR_TEST: &str = crate::http::mime::FALLBACK_MIME;
}
