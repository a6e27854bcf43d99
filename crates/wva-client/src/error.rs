//! Error types for WVA web service operations

use std::fmt;

use thiserror::Error;

/// Result type alias for WVA client operations
pub type Result<T> = std::result::Result<T, WvaError>;

/// Errors that can occur while talking to the WVA web services
#[derive(Error, Debug)]
pub enum WvaError {
    /// The request never produced a response (DNS, connect, TLS, timeout...)
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The device answered with a non-success status
    #[error("Unexpected HTTP status {status} ({kind})")]
    Http { status: u16, kind: HttpErrorKind },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl WvaError {
    /// Create an HTTP error from a status code
    pub fn from_status(status: u16) -> Self {
        Self::Http {
            status,
            kind: HttpErrorKind::from_status(status),
        }
    }

    /// HTTP status code carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Categories of HTTP failures reported by the WVA web services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpErrorKind {
    /// 400: unparseable URI or document, bad record fields
    BadRequest,
    /// 401: missing or wrong credentials
    Unauthorized,
    /// 403: URI not manageable by the web services user
    Forbidden,
    /// 404: URI not recognized
    NotFound,
    /// 405: method not supported for this URI
    MethodNotAllowed,
    /// 406: requested content type cannot be produced
    NotAcceptable,
    /// 414: URI longer than the device can parse
    RequestUriTooLong,
    /// 415: document content type not accepted for this URI
    UnsupportedMediaType,
    /// 500: unexpected device-side failure
    InternalServerError,
    /// 503: transient state, e.g. bus data not yet received
    ServiceUnavailable,
    /// Any other non-success status
    Other,
}

impl HttpErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            405 => Self::MethodNotAllowed,
            406 => Self::NotAcceptable,
            414 => Self::RequestUriTooLong,
            415 => Self::UnsupportedMediaType,
            500 => Self::InternalServerError,
            503 => Self::ServiceUnavailable,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for HttpErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BadRequest => "bad request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not found",
            Self::MethodNotAllowed => "method not allowed",
            Self::NotAcceptable => "not acceptable",
            Self::RequestUriTooLong => "request URI too long",
            Self::UnsupportedMediaType => "unsupported media type",
            Self::InternalServerError => "internal server error",
            Self::ServiceUnavailable => "service unavailable",
            Self::Other => "unexpected status",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(HttpErrorKind::from_status(401), HttpErrorKind::Unauthorized);
        assert_eq!(HttpErrorKind::from_status(414), HttpErrorKind::RequestUriTooLong);
        assert_eq!(
            HttpErrorKind::from_status(503),
            HttpErrorKind::ServiceUnavailable
        );
        assert_eq!(HttpErrorKind::from_status(418), HttpErrorKind::Other);
    }

    #[test]
    fn test_error_display() {
        let err = WvaError::from_status(404);
        assert_eq!(err.to_string(), "Unexpected HTTP status 404 (not found)");
        assert_eq!(err.status(), Some(404));
    }
}
