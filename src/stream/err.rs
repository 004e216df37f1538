use crate::event::{InvalidId, UserId};
use crate::request::RequestErr;
use std::fmt;

/// A rejected edit to a list parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamErr {
    AlreadyPresent { param: String, term: String },
    NotPresent { param: String, term: String },
    InvalidTerm(String),
}

impl std::error::Error for ParamErr {}

impl fmt::Display for ParamErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ParamErr::*;
        match self {
            AlreadyPresent { param, term } if param == "track" => write!(f, "Already tracking {}", term),
            AlreadyPresent { param, term } => write!(f, "`{}` already contains {}", param, term),
            NotPresent { param, term } if param == "track" => write!(f, "Not tracking {}", term),
            NotPresent { param, term } => write!(f, "`{}` does not contain {}", param, term),
            InvalidTerm(term) => write!(f, "`{}` is not a valid list term", term),
        }
    }
}

/// A rejected change to a site stream's subscribers.
#[derive(Debug)]
pub enum SiteErr {
    InvalidId(InvalidId),
    TooManyUsers { requested: usize, max: usize },
    AlreadyPresent(UserId),
    NotPresent(UserId),
    /// The control endpoints are only known once the stream has connected.
    NotConnected,
    Request(RequestErr),
    /// The configured site stream host cannot carry the site resource.
    Host(url::ParseError),
}

impl std::error::Error for SiteErr {}

impl fmt::Display for SiteErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use SiteErr::*;
        match self {
            InvalidId(e) => write!(f, "{}", e),
            TooManyUsers { requested, max } => write!(
                f,
                "a site stream can follow at most {} users; this would make {}",
                max, requested
            ),
            AlreadyPresent(id) => write!(f, "User {} is already in the stream", id),
            NotPresent(id) => write!(f, "User {} is not in the stream", id),
            NotConnected => write!(f, "the stream has not received its control uri yet"),
            Request(e) => write!(f, "{}", e),
            Host(e) => write!(f, "invalid site stream host: {}", e),
        }
    }
}

impl From<InvalidId> for SiteErr {
    fn from(e: InvalidId) -> Self {
        Self::InvalidId(e)
    }
}
impl From<url::ParseError> for SiteErr {
    fn from(e: url::ParseError) -> Self {
        Self::Host(e)
    }
}
impl From<RequestErr> for SiteErr {
    fn from(e: RequestErr) -> Self {
        Self::Request(e)
    }
}

#[derive(Debug)]
pub enum PoolErr {
    Site(SiteErr),
    NotInPool(UserId),
    AlreadyInPool(UserId),
}

impl std::error::Error for PoolErr {}

impl fmt::Display for PoolErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PoolErr::Site(e) => write!(f, "{}", e),
            PoolErr::NotInPool(id) => write!(f, "User {} is not in pool", id),
            PoolErr::AlreadyInPool(id) => write!(f, "User {} is already in pool", id),
        }
    }
}

impl From<SiteErr> for PoolErr {
    fn from(e: SiteErr) -> Self {
        Self::Site(e)
    }
}
impl From<url::ParseError> for PoolErr {
    fn from(e: url::ParseError) -> Self {
        Self::Site(SiteErr::Host(e))
    }
}
impl From<InvalidId> for PoolErr {
    fn from(e: InvalidId) -> Self {
        Self::Site(SiteErr::InvalidId(e))
    }
}
