//! The entry point: one [`Client`] owns one request queue, and every stream, pool and one-shot
//! call made through it waits its turn in that queue.
use crate::config::Config;
use crate::event::Event;
use crate::request::{Executor, HttpTransport, Method, Params, RequestErr, Scheduler, Transport, TransportErr};
use crate::resource;
use crate::response::Dedup;
use crate::stream::{Plain, Pool, Setup, SiteErr, SiteStream, Stream};

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use url::Url;

/// Where a stream's events arrive.
pub type Events = mpsc::UnboundedReceiver<Event>;

#[derive(Clone)]
pub struct Client {
    executor: Executor,
    cfg: Arc<Config>,
}

impl Client {
    /// Builds a client that talks HTTP.  Must be called from inside a tokio runtime.
    pub fn new(cfg: Config) -> Result<Self, TransportErr> {
        let transport = HttpTransport::new(&cfg)?;
        Ok(Self::with_transport(cfg, Arc::new(transport)))
    }

    pub fn with_transport(cfg: Config, transport: Arc<dyn Transport>) -> Self {
        let scheduler = Scheduler::new(&cfg);
        let executor = Executor::new(scheduler, transport, &cfg);
        Self {
            executor,
            cfg: Arc::new(cfg),
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub async fn get(&self, url: &Url, params: Params) -> Result<Value, RequestErr> {
        self.executor.get(url, params).await
    }

    pub async fn post(&self, url: &Url, params: Params) -> Result<Value, RequestErr> {
        self.executor.post(url, params).await
    }

    fn setup(&self, method: Method, resource: Url, params: Params) -> (Setup, Events) {
        let (events, receiver) = mpsc::unbounded_channel();
        let setup = Setup {
            executor: self.executor.clone(),
            cfg: self.cfg.clone(),
            method,
            resource,
            params,
            events,
            dedup: Dedup::shared(*self.cfg.max_saved_tweet_ids),
        };
        (setup, receiver)
    }

    /// Opens a stream against any streaming resource.
    pub fn stream(&self, method: Method, resource: Url, params: Params) -> (Stream, Events) {
        let (setup, events) = self.setup(method, resource, params);
        (Stream::spawn(setup, Plain), events)
    }

    /// Tweets matching `track`, `follow` or `locations`.
    pub fn public_stream(&self, params: Params) -> (Stream, Events) {
        self.stream(Method::Post, resource::filter(), params)
    }

    pub fn sample_stream(&self, params: Params) -> (Stream, Events) {
        self.stream(Method::Get, resource::sample(), params)
    }

    pub fn firehose(&self, params: Params) -> (Stream, Events) {
        self.stream(Method::Get, resource::firehose(), params)
    }

    pub fn user_stream(&self, params: Params) -> (Stream, Events) {
        self.stream(Method::Get, resource::user(), params)
    }

    /// Opens a site stream following `users`, at most `MAX_USERS` of them.
    pub fn site_stream<S: AsRef<str>>(&self, users: &[S]) -> Result<(SiteStream, Events), SiteErr> {
        let (setup, events) = self.setup(Method::Get, resource::site(&self.cfg)?, Params::new());
        Ok((SiteStream::spawn(setup, users)?, events))
    }

    /// An empty pool whose shards all report on the returned channel.
    pub fn pool(&self) -> (Pool, Events) {
        let (events, receiver) = mpsc::unbounded_channel();
        (Pool::new(self.executor.clone(), self.cfg.clone(), events), receiver)
    }
}
