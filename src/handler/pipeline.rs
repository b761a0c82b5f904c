//! Request pipeline module
//!
//! Runs each request through security, method, path and content-type checks
//! in a fixed order. The first failing stage ends the request with the error
//! response for its status.

use hyper::{Method, Response, StatusCode};
use std::future::Future;
use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use thiserror::Error;

use crate::handler::access::AccessRecorder;
use crate::handler::resolver::{PathResolver, ResolvedTarget};
use crate::http::mime::{self, ContentTypeResolver};
use crate::http::response::{self, ErrorPage, OpenedFile, ResponseBody, SuccessBody};
use crate::logger;
use crate::security::SecurityStore;

/// Request data the pipeline needs, extracted from the wire request
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    /// Request target as received, including any query string
    pub uri: String,
    pub remote_ip: IpAddr,
    /// Host name of the client; the IP in text form when not resolved
    pub remote_host: String,
    /// Raw `Host` header value, if present
    pub host_header: Option<String>,
}

impl RequestContext {
    pub fn new(method: Method, uri: impl Into<String>, remote_ip: IpAddr) -> Self {
        Self {
            method,
            uri: uri.into(),
            remote_ip,
            remote_host: remote_ip.to_string(),
            host_header: None,
        }
    }

    #[must_use]
    pub fn with_host_header(mut self, host: impl Into<String>) -> Self {
        self.host_header = Some(host.into());
        self
    }

    #[must_use]
    pub fn with_remote_host(mut self, host: impl Into<String>) -> Self {
        self.remote_host = host.into();
        self
    }
}

/// Why a request was refused by the security stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Blacklisted,
    HostNotAllowed,
    HostHeaderNotAllowed,
}

impl RejectReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Blacklisted => "blacklisted",
            Self::HostNotAllowed => "host not allowed",
            Self::HostHeaderNotAllowed => "Host header not allowed",
        }
    }
}

/// Terminal failures of the pipeline, each mapped to one status code
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("security rejection: {}", .0.as_str())]
    SecurityRejection(RejectReason),
    #[error("method not allowed: {0}")]
    MethodNotAllowed(Method),
    #[error("resource not found")]
    ResourceNotFound,
    #[error("I/O failure: {0}")]
    IoFailure(#[from] io::Error),
}

impl RequestError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::SecurityRejection(_) => StatusCode::FORBIDDEN,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::ResourceNotFound => StatusCode::NOT_FOUND,
            Self::IoFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Capability to turn a request into a response
pub trait RequestHandler: Send + Sync {
    fn handle(
        &self,
        ctx: RequestContext,
    ) -> impl Future<Output = Response<ResponseBody>> + Send;
}

/// A file ready to be sent, after the content-type stage
struct PreparedResponse {
    mime: String,
    body: SuccessBody,
}

/// The static file request pipeline
pub struct RequestPipeline {
    security: Arc<SecurityStore>,
    resolver: PathResolver,
    content_types: ContentTypeResolver,
    error_page: ErrorPage,
    access: Arc<AccessRecorder>,
}

impl RequestPipeline {
    pub fn new(
        security: Arc<SecurityStore>,
        resolver: PathResolver,
        content_types: ContentTypeResolver,
        error_page: ErrorPage,
        access: Arc<AccessRecorder>,
    ) -> Self {
        Self {
            security,
            resolver,
            content_types,
            error_page,
            access,
        }
    }

    pub fn access(&self) -> &Arc<AccessRecorder> {
        &self.access
    }

    /// Run every stage for `ctx` and produce the response
    pub async fn process(&self, ctx: &RequestContext) -> Response<ResponseBody> {
        let ip = ctx.remote_ip.to_string();
        logger::log_request(&ip, &ctx.remote_host, ctx.method.as_str(), &ctx.uri);

        let outcome = match self.admit(ctx, &ip).await {
            Ok(target) => self.prepare(ctx, &target).await,
            Err(err) => Err(err),
        };
        self.finish(ctx, &ip, outcome).await
    }

    /// Received -> PathResolved
    async fn admit(&self, ctx: &RequestContext, ip: &str) -> Result<ResolvedTarget, RequestError> {
        self.check_security(ctx, ip)?;
        check_method(&ctx.method)?;
        self.resolver
            .resolve(&ctx.uri)
            .await
            .ok_or(RequestError::ResourceNotFound)
    }

    async fn finish(
        &self,
        ctx: &RequestContext,
        ip: &str,
        outcome: Result<PreparedResponse, RequestError>,
    ) -> Response<ResponseBody> {
        match outcome {
            Ok(prepared) => self.respond(ctx, ip, prepared),
            Err(err) => self.fail(ctx, ip, &err).await,
        }
    }

    /// Received -> SecurityChecked
    fn check_security(&self, ctx: &RequestContext, ip: &str) -> Result<(), RequestError> {
        // One snapshot for all three checks so a concurrent mutation cannot
        // split the decision.
        let snapshot = self.security.snapshot();
        if !snapshot.enabled {
            return Ok(());
        }
        if snapshot.is_blacklisted(ip) {
            return Err(RequestError::SecurityRejection(RejectReason::Blacklisted));
        }
        if !snapshot.is_host_allowed(&ctx.remote_host, ip) {
            return Err(RequestError::SecurityRejection(RejectReason::HostNotAllowed));
        }
        // Stricter re-check of the raw Host header against a configured whitelist
        let hosts = &snapshot.allowed_hosts;
        if let Some(header) = ctx.host_header.as_deref() {
            if !hosts.is_empty() && !hosts.contains(header) && !hosts.contains(strip_port(header))
            {
                return Err(RequestError::SecurityRejection(
                    RejectReason::HostHeaderNotAllowed,
                ));
            }
        }
        Ok(())
    }

    /// PathResolved -> ContentTypeResolved
    async fn prepare(
        &self,
        ctx: &RequestContext,
        target: &ResolvedTarget,
    ) -> Result<PreparedResponse, RequestError> {
        let mime = self.content_types.mime_type_of(target.path());
        let body = if ctx.method == Method::HEAD {
            let len = tokio::fs::metadata(target.path()).await?.len();
            SuccessBody::HeadersOnly { len }
        } else {
            SuccessBody::Stream(OpenedFile::open(target).await?)
        };
        Ok(PreparedResponse { mime, body })
    }

    /// ContentTypeResolved -> Responded
    fn respond(
        &self,
        ctx: &RequestContext,
        ip: &str,
        prepared: PreparedResponse,
    ) -> Response<ResponseBody> {
        let response = response::build_success_response(&prepared.mime, prepared.body);

        if mime::is_html(&prepared.mime) {
            logger::log_html_access(ip, &ctx.uri);
            if ctx.host_header.as_deref().map(strip_port) == Some(ip) {
                logger::log_ip_host_access(ip);
            }
            self.access.record_hit(ip);
        } else {
            logger::log_resource_access(ip, &ctx.uri, &prepared.mime);
        }
        response
    }

    async fn fail(
        &self,
        ctx: &RequestContext,
        ip: &str,
        err: &RequestError,
    ) -> Response<ResponseBody> {
        match err {
            RequestError::SecurityRejection(reason) => {
                logger::log_rejection(ip, &ctx.uri, reason.as_str());
            }
            RequestError::IoFailure(e) => {
                logger::severe(&format!("{ip} - failed to read {}: {e}", ctx.uri));
            }
            RequestError::MethodNotAllowed(_) | RequestError::ResourceNotFound => {}
        }
        let status = err.status();
        logger::log_error_response(ip, status.as_u16(), &ctx.uri);
        response::build_error_response(&self.error_page, status, &ctx.method).await
    }
}

impl RequestHandler for RequestPipeline {
    fn handle(
        &self,
        ctx: RequestContext,
    ) -> impl Future<Output = Response<ResponseBody>> + Send {
        async move { self.process(&ctx).await }
    }
}

/// SecurityChecked -> MethodChecked
fn check_method(method: &Method) -> Result<(), RequestError> {
    match *method {
        Method::GET | Method::HEAD => Ok(()),
        _ => Err(RequestError::MethodNotAllowed(method.clone())),
    }
}

/// Host part of a `Host` header value (`example.com:8080` -> `example.com`)
fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        // Bracketed IPv6 literal
        return rest.split(']').next().unwrap_or(rest);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') && port.bytes().all(|b| b.is_ascii_digit()) => {
            name
        }
        _ => host,
    }
}
