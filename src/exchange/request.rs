//! Inbound half of an exchange and the exchange handle itself.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use url::form_urlencoded;

use crate::identifiers::ExchangeId;
use crate::transport::WebSocket;

use super::{HeaderMap, Response};

// ============================================================================
// Constants
// ============================================================================

/// Content type marking a binary request body.
pub const BINARY_CONTENT_TYPE: &str = "application/octet-stream";

// ============================================================================
// Method
// ============================================================================

/// Request method, classified once at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`: poll for server data.
    Get,
    /// `POST`: deliver client data.
    Post,
    /// `OPTIONS`: CORS preflight.
    Options,
    /// Anything else.
    Other(String),
}

impl Method {
    /// Classifies a method string.
    #[must_use]
    pub fn parse(method: &str) -> Self {
        if method.eq_ignore_ascii_case("GET") {
            Self::Get
        } else if method.eq_ignore_ascii_case("POST") {
            Self::Post
        } else if method.eq_ignore_ascii_case("OPTIONS") {
            Self::Options
        } else {
            Self::Other(method.to_owned())
        }
    }

    /// Returns the method name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Options => "OPTIONS",
            Self::Other(method) => method,
        }
    }
}

impl From<&str> for Method {
    fn from(method: &str) -> Self {
        Self::parse(method)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Exchange
// ============================================================================

/// Shared inner data.
struct ExchangeInner {
    id: ExchangeId,
    method: Method,
    headers: HeaderMap,
    query: FxHashMap<String, String>,
    body: Bytes,
    is_binary: bool,
    response: Response,
    websocket: Mutex<Option<Arc<dyn WebSocket>>>,
}

/// One inbound request paired with its outbound [`Response`].
///
/// Cloning yields another handle to the same exchange; identity is
/// [`Exchange::id`].
#[derive(Clone)]
pub struct Exchange {
    inner: Arc<ExchangeInner>,
}

impl Exchange {
    /// Starts building an exchange.
    #[inline]
    #[must_use]
    pub fn builder(method: impl Into<Method>) -> ExchangeBuilder {
        ExchangeBuilder::new(method.into())
    }

    /// Returns the exchange identity.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ExchangeId {
        self.inner.id
    }

    /// Returns the request method.
    #[inline]
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    /// Returns the request headers.
    #[inline]
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.inner.headers
    }

    /// Returns one request header, ignoring case.
    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers.get(name)
    }

    /// Returns one query parameter.
    #[inline]
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.inner.query.get(name).map(String::as_str)
    }

    /// Returns the full request body.
    #[inline]
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.inner.body
    }

    /// Returns `true` if the body is marked as binary by its content type.
    #[inline]
    #[must_use]
    pub fn is_binary(&self) -> bool {
        self.inner.is_binary
    }

    /// Returns the response handle.
    #[inline]
    #[must_use]
    pub fn response(&self) -> &Response {
        &self.inner.response
    }

    /// Returns `true` if an upgraded socket is still attached.
    #[must_use]
    pub fn has_websocket(&self) -> bool {
        self.inner.websocket.lock().is_some()
    }

    /// Takes the upgraded socket; later calls return `None`.
    #[must_use]
    pub fn take_websocket(&self) -> Option<Arc<dyn WebSocket>> {
        self.inner.websocket.lock().take()
    }
}

impl PartialEq for Exchange {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Exchange {}

impl fmt::Debug for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("id", &self.inner.id)
            .field("method", &self.inner.method)
            .field("headers", &self.inner.headers)
            .field("body_len", &self.inner.body.len())
            .field("websocket", &self.has_websocket())
            .finish()
    }
}

// ============================================================================
// ExchangeBuilder
// ============================================================================

/// Builder for [`Exchange`], used by the HTTP layer.
///
/// # Example
///
/// ```ignore
/// let exchange = Exchange::builder("POST")
///     .header("Content-Type", "text/plain")
///     .query_string("transport=polling&sid=abc")
///     .body("6:4hello")
///     .build();
/// ```
pub struct ExchangeBuilder {
    method: Method,
    headers: HeaderMap,
    query: FxHashMap<String, String>,
    body: Bytes,
    websocket: Option<Arc<dyn WebSocket>>,
}

impl ExchangeBuilder {
    /// Creates a builder for `method`.
    #[must_use]
    fn new(method: Method) -> Self {
        Self {
            method,
            headers: HeaderMap::new(),
            query: FxHashMap::default(),
            body: Bytes::new(),
            websocket: None,
        }
    }

    /// Adds a request header.
    #[inline]
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Parses and adds every parameter of a raw query string.
    #[must_use]
    pub fn query_string(mut self, query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        self.query.extend(
            form_urlencoded::parse(query.as_bytes())
                .map(|(key, value)| (key.into_owned(), value.into_owned())),
        );
        self
    }

    /// Adds one query parameter.
    #[inline]
    #[must_use]
    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Sets the request body.
    #[inline]
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Attaches an upgraded socket.
    #[inline]
    #[must_use]
    pub fn websocket(mut self, socket: impl WebSocket) -> Self {
        self.websocket = Some(Arc::new(socket));
        self
    }

    /// Attaches an already shared upgraded socket.
    #[inline]
    #[must_use]
    pub fn shared_websocket(mut self, socket: Arc<dyn WebSocket>) -> Self {
        self.websocket = Some(socket);
        self
    }

    /// Builds the exchange.
    #[must_use]
    pub fn build(self) -> Exchange {
        let id = ExchangeId::generate();
        let is_binary = self
            .headers
            .get("content-type")
            .and_then(|value| value.split(';').next())
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(BINARY_CONTENT_TYPE));

        Exchange {
            inner: Arc::new(ExchangeInner {
                id,
                method: self.method,
                headers: self.headers,
                query: self.query,
                body: self.body,
                is_binary,
                response: Response::new(id),
                websocket: Mutex::new(self.websocket),
            }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
