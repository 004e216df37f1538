//! Everything a stream reports back to its owner.
mod id;
pub mod message;

pub use id::{InvalidId, UserId};
pub use message::{Message, Route};

use crate::err::Error;
use crate::stream::{Algorithm, Operation};

use hashbrown::HashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
pub enum Event {
    /// About to open the stream.  Parameters have been finalized.
    BeforeConnect,
    Connect,
    /// A scheduled retry fired and the stream is being reopened.
    Reconnect,
    /// The server closed the stream.
    End,
    /// The stream stalled or its request timed out.
    Timeout,
    /// The stream was destroyed; no more events follow.
    Destroy,
    Retry {
        algorithm: Algorithm,
        operation: Operation,
        delay: Duration,
        attempt: u32,
        retries: u32,
    },
    /// A retry delay reached its ceiling.
    RetryMax {
        algorithm: Algorithm,
        operation: Operation,
    },
    Error(Error),
    /// Every decoded object, before classification.
    Data(Arc<Value>),
    Message {
        message: Message,
        /// The subscriber a site stream message was delivered for.
        for_user: Option<UserId>,
    },
    AddUsersToQueue(Vec<UserId>),
    AddUsersToStream {
        users: Vec<UserId>,
        names: HashMap<UserId, String>,
    },
    FailedToAddUsers(Vec<UserId>),
    RemoveUser(UserId),
}

impl Event {
    pub fn name(&self) -> String {
        match self {
            Event::BeforeConnect => "beforeConnect".into(),
            Event::Connect => "connect".into(),
            Event::Reconnect => "reconnect".into(),
            Event::End => "end".into(),
            Event::Timeout => "timeout".into(),
            Event::Destroy => "destroy".into(),
            Event::Retry { .. } => "retry".into(),
            Event::RetryMax { .. } => "retryMax".into(),
            Event::Error(_) => "error".into(),
            Event::Data(_) => "data".into(),
            Event::Message { message, .. } => message.name(),
            Event::AddUsersToQueue(_) => "addUsersToQueue".into(),
            Event::AddUsersToStream { .. } => "addUsersToStream".into(),
            Event::FailedToAddUsers(_) => "failedToAddUsers".into(),
            Event::RemoveUser(_) => "removeUser".into(),
        }
    }

    pub fn message(&self) -> Option<&Message> {
        match self {
            Event::Message { message, .. } => Some(message),
            _ => None,
        }
    }
}
