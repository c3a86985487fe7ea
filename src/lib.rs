use std::net::SocketAddr;
use std::num::NonZeroU16;

use anyhow::{Context as _, Result};
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{warn, Instrument as _};

use crate::header::{ALLOW, CONTENT_LENGTH, CONTENT_TYPE};
use crate::resolve::{ResolveError, Resolver};

pub use config::{Config, ProtocolConfig};
pub use error::Error;
pub use header::HeaderMap;
pub use session::Session;

pub mod config;
pub mod error;
pub mod header;
pub mod io;
pub mod mime;
pub mod resolve;
pub mod server;
pub mod session;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Connect,
    Options,
    Trace,
    Patch,
}

macro_rules! method {
    ($(($method:ident, $name:ident, $enc:literal)),+) => {
        impl Method {
            $(pub const $name: Bytes = Bytes::from_static($enc);)+

            #[inline]
            pub fn as_bytes(&self) -> &'static [u8] {
                match self {
                    $(Self::$method => $enc,)+
                }
            }
        }

        /// Parses an upper-case method token.
        impl TryFrom<Bytes> for Method {
            type Error = crate::error::Error;

            #[inline]
            fn try_from(method: Bytes) -> Result<Self, Self::Error> {
                match method.as_ref() {
                    $($enc => Ok(Self::$method),)+
                    other => Err(Error::lossy(Error::InvalidMethod, other)),
                }
            }
        }
    };
}

method! {
    (Get, GET, b"GET"),
    (Head, HEAD, b"HEAD"),
    (Post, POST, b"POST"),
    (Put, PUT, b"PUT"),
    (Delete, DELETE, b"DELETE"),
    (Connect, CONNECT, b"CONNECT"),
    (Options, OPTIONS, b"OPTIONS"),
    (Trace, TRACE, b"TRACE"),
    (Patch, PATCH, b"PATCH")
}

impl std::fmt::Display for Method {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.as_bytes()))
    }
}

/// A parsed request. Header names are lower-cased, everything else is kept as received.
#[derive(Debug, PartialEq, Eq)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: Bytes,
    pub(crate) version: Bytes,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<Bytes>,
}

impl Request {
    #[inline]
    pub fn method(&self) -> Method {
        self.method
    }

    /// Raw request target, not decoded nor normalized.
    #[inline]
    pub fn path(&self) -> &Bytes {
        &self.path
    }

    #[inline]
    pub fn version(&self) -> &Bytes {
        &self.version
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[inline]
    pub fn header<K: AsRef<[u8]>>(&self, name: K) -> Option<&Bytes> {
        self.headers.get(name)
    }

    /// Present iff the request declared a `Content-Length`.
    #[inline]
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.method,
            String::from_utf8_lossy(&self.path),
            String::from_utf8_lossy(&self.version)
        )
    }
}

macro_rules! status_code {
    ($(($name:ident, $code:literal, $repr:literal)),+) => {
        impl StatusCode {
            $(
                pub const $name: StatusCode = StatusCode(match NonZeroU16::new($code) {
                    Some(code) => code,
                    None => panic!("status code must be non-zero"),
                });
            )+

            /// Reason phrase of this status code.
            #[inline]
            pub fn as_str(&self) -> &'static str {
                match self.as_u16() {
                    $($code => $repr,)+
                    _ => "Unknown",
                }
            }
        }
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(transparent)]
pub struct StatusCode(NonZeroU16);

status_code! {
    (OK, 200, "OK"),
    (CREATED, 201, "Created"),
    (NO_CONTENT, 204, "No Content"),
    (MOVED_PERMANENTLY, 301, "Moved Permanently"),
    (FOUND, 302, "Found"),
    (NOT_MODIFIED, 304, "Not Modified"),
    (BAD_REQUEST, 400, "Bad Request"),
    (FORBIDDEN, 403, "Forbidden"),
    (NOT_FOUND, 404, "Not Found"),
    (METHOD_NOT_ALLOWED, 405, "Method Not Allowed"),
    (REQUEST_TIMEOUT, 408, "Request Timeout"),
    (LENGTH_REQUIRED, 411, "Length Required"),
    (PAYLOAD_TOO_LARGE, 413, "Payload Too Large"),
    (INTERNAL_SERVER_ERROR, 500, "Internal Server Error"),
    (NOT_IMPLEMENTED, 501, "Not Implemented"),
    (HTTP_VERSION_NOT_SUPPORTED, 505, "HTTP Version Not Supported")
}

impl StatusCode {
    /// Status code in the `100..=999` range.
    #[inline]
    pub fn new(code: u16) -> Option<Self> {
        if (100..1000).contains(&code) {
            NonZeroU16::new(code).map(Self)
        } else {
            None
        }
    }

    #[inline]
    pub fn as_u16(&self) -> u16 {
        self.0.into()
    }
}

impl Default for StatusCode {
    #[inline]
    fn default() -> Self {
        Self::OK
    }
}

impl std::fmt::Display for StatusCode {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.as_str())
    }
}

/// A finalized response, ready to be serialized.
///
/// Obtained from [`ResponseBuilder::finalize`], which applies all defaults exactly once.
#[derive(Debug, PartialEq, Eq)]
pub struct Response {
    pub(crate) version: Bytes,
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<Bytes>,
}

impl Response {
    #[inline]
    pub fn builder(status: StatusCode) -> ResponseBuilder {
        ResponseBuilder {
            status,
            ..Default::default()
        }
    }

    #[inline]
    pub fn version(&self) -> &Bytes {
        &self.version
    }

    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[inline]
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }
}

#[derive(Debug, Default)]
pub struct ResponseBuilder {
    status: StatusCode,
    version: Option<Bytes>,
    headers: HeaderMap,
    body: Option<Bytes>,
    mimetype: Option<Bytes>,
}

impl ResponseBuilder {
    #[inline]
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    #[inline]
    pub fn version(mut self, version: impl Into<Bytes>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set a header, written back with exactly the given name.
    #[inline]
    pub fn header(mut self, name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[inline]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    #[inline]
    pub fn mimetype(mut self, mimetype: impl Into<Bytes>) -> Self {
        self.mimetype = Some(mimetype.into());
        self
    }

    /// Apply defaults and derive the content headers from the body.
    ///
    /// A response with a body always gets `Content-Type` and `Content-Length`, one without a body
    /// gets neither (even if they were set explicitly).
    pub fn finalize(self, protocol: &ProtocolConfig) -> Response {
        let Self {
            status,
            version,
            mut headers,
            body,
            mimetype,
        } = self;

        let version = version.unwrap_or_else(|| Bytes::from(protocol.version.clone()));

        match &body {
            Some(body) => {
                let mimetype = mimetype.unwrap_or(Bytes::from_static(mime::TEXT_PLAIN.as_bytes()));

                let content_type = if mime::is_text(&mimetype) && !mime::has_charset(&mimetype) {
                    let mut value = mimetype.to_vec();
                    value.extend_from_slice(b"; charset=");
                    value.extend_from_slice(protocol.charset.as_bytes());
                    Bytes::from(value)
                } else {
                    mimetype
                };

                headers.replace(CONTENT_TYPE, content_type);
                headers.replace(CONTENT_LENGTH, body.len().to_string());
            }
            None => {
                headers.remove(CONTENT_TYPE);
                headers.remove(CONTENT_LENGTH);
            }
        }

        Response {
            version,
            status,
            headers,
            body,
        }
    }
}

/// Handle a single HTTP/1.x exchange with a client and close the connection.
pub async fn handle_connection<S>(stream: S, peer: SocketAddr, cfg: &Config) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let span = tracing::info_span!("connection", %peer);

    let mut session = Session::new(stream, cfg.protocol()).with_span(span.clone());
    let resolver = Resolver::new(cfg.document_root());

    let served = serve(&mut session, &resolver, cfg).instrument(span).await;

    // the connection is closed even if the exchange failed
    let closed = session.close().await.context("close connection");

    served.and(closed)
}

async fn serve<S>(session: &mut Session<S>, resolver: &Resolver, cfg: &Config) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let response = match session.read_request().await {
        Ok(req) => respond(&req, resolver, cfg).await,

        Err(error) if error.is_bad_request() => {
            warn!(%error, "malformed request");
            Response::builder(StatusCode::BAD_REQUEST).body(error.to_string())
        }

        Err(error) => return Err(error).context("read request"),
    };

    session
        .send_response(response)
        .await
        .context("send response")
}

async fn respond(req: &Request, resolver: &Resolver, cfg: &Config) -> ResponseBuilder {
    let version = cfg.protocol().version.as_bytes();
    if !req.version().eq_ignore_ascii_case(version) {
        return Response::builder(StatusCode::HTTP_VERSION_NOT_SUPPORTED);
    }

    if req.method() != Method::Get {
        return Response::builder(StatusCode::METHOD_NOT_ALLOWED).header(ALLOW, Method::GET);
    }

    match resolver.load(req.path()).await {
        Ok((body, mimetype)) => Response::builder(StatusCode::OK)
            .body(body)
            .mimetype(mimetype),

        Err(ResolveError::NotFound) => Response::builder(StatusCode::NOT_FOUND).body("Not found"),

        Err(ResolveError::OutsideRoot) => {
            warn!(path = %String::from_utf8_lossy(req.path()), "path escapes document root");
            Response::builder(StatusCode::FORBIDDEN).body("Forbidden")
        }

        Err(error @ ResolveError::InvalidPath) => {
            Response::builder(StatusCode::BAD_REQUEST).body(error.to_string())
        }

        Err(error @ ResolveError::Io(_)) => {
            warn!(%error, "failed to load requested file");
            Response::builder(StatusCode::INTERNAL_SERVER_ERROR).body(error.to_string())
        }
    }
}
