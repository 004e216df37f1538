//! A client for long-lived streaming JSON APIs in the style of Twitter's streaming endpoints.
//!
//! Streams reconnect on their own: network failures back off linearly, HTTP errors back off
//! exponentially, and a stream that goes quiet for too long is torn down and reopened.  Every
//! outbound request, streaming or not, passes through a single rate-limited queue owned by the
//! [`Client`].
//!
//! # Notes on data flow
//! * **Client → Scheduler**:
//! Each request is queued and started no sooner than `1000 / MAX_REQUESTS_PER_SECOND` ms after
//! the previous one.  One-shot calls hold the queue until their body has been read; streams
//! only until their headers arrive.
//!
//! * **Transport → Decoder**:
//! Body chunks are fed to an incremental decoder that yields one JSON value per complete
//! top-level object, however the bytes were split.
//!
//! * **Decoder → Dispatcher**:
//! Each value is reported raw as `Event::Data`, then classified into a [`Message`]: control
//! messages, social events, disconnect notices, and tweets routed by retweet, reply and mention.
//! Tweets seen for the first time also produce a `unique:` twin.
//!
//! * **Stream → Caller**:
//! Everything arrives as an [`Event`] on the channel handed back with the stream.
//!
//! [`Message`]: event::Message
//! [`Event`]: event::Event
pub mod client;
pub mod config;
pub mod err;
pub mod event;
pub mod request;
pub mod response;
pub mod stream;

mod resource;

pub use client::{Client, Events};
pub use err::{Error, FatalErr};
pub use event::{Event, Message, UserId};
pub use stream::{Pool, SiteStream, Stream};
