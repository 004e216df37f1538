use serde_json::Value;
use std::fmt;
use strum::Display;

/// The documented failure classes for non-2xx stream and control responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ErrorKind {
    #[strum(serialize = "Bad Request")]
    BadRequest,
    Unauthorized,
    Forbidden,
    #[strum(serialize = "Unknown")]
    NotFound,
    #[strum(serialize = "Not Acceptable")]
    NotAcceptable,
    #[strum(serialize = "Too Long")]
    TooLong,
    #[strum(serialize = "Range Unacceptable")]
    RangeUnacceptable,
    #[strum(serialize = "Rate Limited")]
    RateLimited,
    #[strum(serialize = "Service Unavailable")]
    ServiceUnavailable,
    #[strum(serialize = "http")]
    Http,
}

impl ErrorKind {
    pub fn from_status(status: u16) -> Self {
        use ErrorKind::*;
        match status {
            400 => BadRequest,
            401 => Unauthorized,
            403 => Forbidden,
            404 => NotFound,
            406 => NotAcceptable,
            413 => TooLong,
            416 => RangeUnacceptable,
            420 => RateLimited,
            500 => ServiceUnavailable,
            _ => Http,
        }
    }

    pub fn message(&self) -> &'static str {
        use ErrorKind::*;
        match self {
            BadRequest => "No authorized followings found for your request.",
            Unauthorized => "HTTP authentication failed due to invalid OAuth request.",
            Forbidden => "The connecting account is not permitted to access this endpoint.",
            NotFound => "There is nothing at this URL, which means the resource does not exist.",
            NotAcceptable => "At least one request parameter is invalid.",
            TooLong => "A parameter list is too long.",
            RangeUnacceptable => "The `count` parameter was used in an invalid way.",
            RateLimited => "The client has connected too frequently.",
            ServiceUnavailable => "A streaming server is temporarily overloaded.",
            Http => "There was an unknown error.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusErr {
    pub kind: ErrorKind,
    pub status: u16,
}

impl StatusErr {
    pub fn new(status: u16) -> Self {
        Self {
            kind: ErrorKind::from_status(status),
            status,
        }
    }
}

impl std::error::Error for StatusErr {}

impl fmt::Display for StatusErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            ErrorKind::Http => write!(f, "{}", self.kind.message()),
            kind => write!(f, "{} - {}", kind, kind.message()),
        }
    }
}

/// A failure below HTTP: the connection could not be made, timed out, or broke mid-body.
#[derive(Debug)]
pub enum TransportErr {
    Timeout(String),
    Io(String),
    Http(reqwest::Error),
}

impl TransportErr {
    pub fn is_timeout(&self) -> bool {
        match self {
            TransportErr::Timeout(_) => true,
            TransportErr::Http(e) => e.is_timeout(),
            TransportErr::Io(_) => false,
        }
    }
}

impl std::error::Error for TransportErr {}

impl fmt::Display for TransportErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransportErr::Timeout(msg) => write!(f, "timed out: {}", msg),
            TransportErr::Io(msg) => write!(f, "{}", msg),
            TransportErr::Http(e) => write!(f, "{}", e),
        }
    }
}

impl From<reqwest::Error> for TransportErr {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

#[derive(Debug)]
pub enum RequestErr {
    /// The request never produced a response.
    Transport { url: String, inner: TransportErr },
    /// The response had a non-2xx status.
    Status { url: String, inner: StatusErr },
    /// A 2xx response whose body carries an `errors` list.
    Application {
        url: String,
        message: String,
        body: Value,
    },
    Json { url: String, inner: serde_json::Error },
    /// The request queue is gone; its client was dropped.
    QueueClosed,
}

impl RequestErr {
    pub fn status(&self) -> Option<&StatusErr> {
        match self {
            RequestErr::Status { inner, .. } => Some(inner),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RequestErr::Transport { inner, .. } if inner.is_timeout())
    }
}

impl std::error::Error for RequestErr {}

impl fmt::Display for RequestErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use RequestErr::*;
        match self {
            Transport { url, inner } => write!(f, "request to {} failed: {}", url, inner),
            Status { url, inner } => write!(f, "{} ({} from {})", inner, inner.status, url),
            Application { url, message, .. } => write!(f, "{} responded with: {}", url, message),
            Json { url, inner } => write!(f, "could not parse the response from {}: {}", url, inner),
            QueueClosed => write!(f, "the request queue has shut down"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_messages_follow_the_documented_table() {
        let err = StatusErr::new(420);
        assert_eq!(err.kind, ErrorKind::RateLimited);
        assert_eq!(
            err.to_string(),
            "Rate Limited - The client has connected too frequently."
        );
        assert_eq!(
            StatusErr::new(404).to_string(),
            "Unknown - There is nothing at this URL, which means the resource does not exist."
        );
    }

    #[test]
    fn unknown_statuses_fall_back_to_http() {
        let err = StatusErr::new(503);
        assert_eq!(err.kind, ErrorKind::Http);
        assert_eq!(err.to_string(), "There was an unknown error.");
        assert_eq!(err.kind.to_string(), "http");
    }
}
