use crate::event::UserId;
use crate::request::{ErrorKind, RequestErr, StatusErr, TransportErr};
use crate::response::DecodeErr;

use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Errors that stop the binary before any stream is opened.
pub enum FatalErr {
    Logger(log::SetLoggerError),
    Dotenv(dotenv::Error),
    Transport(TransportErr),
    StdIo(std::io::Error),
    ConfigErr(String),
}

impl FatalErr {
    pub fn config(var: impl fmt::Display, value: impl fmt::Display, allowed: impl fmt::Display) -> Self {
        Self::ConfigErr(format!(
            "{0} is set to `{1}`, which is invalid.\n{3:7}{0} must be {2}.",
            var, value, allowed, ""
        ))
    }
}

impl std::error::Error for FatalErr {}
impl fmt::Debug for FatalErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{}", self)
    }
}

impl fmt::Display for FatalErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        use FatalErr::*;
        write!(
            f,
            "{}",
            match self {
                Logger(e) => format!("{}", e),
                Dotenv(e) => format!("could not read the `.env` file.\n{:7}{}", "", e),
                Transport(e) => format!("could not build the HTTP client.\n{:7}{}", "", e),
                StdIo(e) => format!("{}", e),
                ConfigErr(e) => e.to_string(),
            }
        )
    }
}

impl From<log::SetLoggerError> for FatalErr {
    fn from(e: log::SetLoggerError) -> Self {
        Self::Logger(e)
    }
}
impl From<dotenv::Error> for FatalErr {
    fn from(e: dotenv::Error) -> Self {
        Self::Dotenv(e)
    }
}
impl From<TransportErr> for FatalErr {
    fn from(e: TransportErr) -> Self {
        Self::Transport(e)
    }
}
impl From<std::io::Error> for FatalErr {
    fn from(e: std::io::Error) -> Self {
        Self::StdIo(e)
    }
}

/// A recoverable problem reported on a stream's event channel.
#[derive(Debug)]
pub enum Error {
    /// Opening the stream failed, or it broke mid-read.
    Request(RequestErr),
    Decode(DecodeErr),
    /// No bytes (not even keep-alives) arrived within the stall timeout.
    Stall(Duration),
    /// A message whose kind is known but whose payload is not.
    MalformedMessage {
        kind: &'static str,
        inner: serde_json::Error,
    },
    UnrecognizedMessage(Arc<Value>),
    AddUsers {
        users: Vec<UserId>,
        inner: RequestErr,
    },
    RemoveUser {
        user: UserId,
        inner: RequestErr,
    },
    /// A `control` message whose locator cannot be joined onto the site stream host.
    ControlUri {
        uri: String,
        inner: url::ParseError,
    },
}

impl Error {
    /// The typed HTTP status failure behind this error, if any.
    pub fn status(&self) -> Option<&StatusErr> {
        match self {
            Error::Request(e) | Error::AddUsers { inner: e, .. } | Error::RemoveUser { inner: e, .. } => {
                e.status()
            }
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        self.status().map(|status| status.kind)
    }
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Error::*;
        match self {
            Request(e) => write!(f, "{}", e),
            Decode(e) => write!(f, "{}", e),
            Stall(timeout) => write!(f, "no data received for {:?}; the stream has stalled", timeout),
            MalformedMessage { kind, inner } => write!(f, "could not read `{}` message: {}", kind, inner),
            UnrecognizedMessage(value) => write!(f, "Unrecognized message: {}", value),
            AddUsers { users, inner } => write!(
                f,
                "could not add {} user(s) to the stream: {}",
                users.len(),
                inner
            ),
            RemoveUser { user, inner } => {
                write!(f, "could not remove user {} from the stream: {}", user, inner)
            }
            ControlUri { uri, inner } => write!(f, "invalid control uri `{}`: {}", uri, inner),
        }
    }
}

impl From<RequestErr> for Error {
    fn from(e: RequestErr) -> Self {
        Self::Request(e)
    }
}
impl From<DecodeErr> for Error {
    fn from(e: DecodeErr) -> Self {
        Self::Decode(e)
    }
}
