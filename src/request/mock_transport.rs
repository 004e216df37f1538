//! A scripted stand-in for the network, used in place of `HttpTransport` in tests.
use super::{Request, Response, Transport, TransportErr};

use futures::channel::mpsc;
use futures::future::{self, BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

pub(crate) enum Reply {
    /// 200 with a body that stays open; feed it with [`MockTransport::push`].
    Open,
    /// A complete body with the given status.
    Body(u16, Vec<u8>),
    Status(u16),
    Fail(TransportErr),
    /// Never answers.
    Hang,
}

impl Reply {
    pub(crate) fn json(value: Value) -> Self {
        Reply::Body(200, value.to_string().into_bytes())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Sent {
    pub(crate) request: Request,
    pub(crate) at: Instant,
}

type Feed = mpsc::UnboundedSender<Result<Vec<u8>, TransportErr>>;
type Responder = Box<dyn Fn(&Request) -> Reply + Send + Sync>;

pub(crate) struct MockTransport {
    responder: Responder,
    sent: Mutex<Vec<Sent>>,
    feeds: Mutex<Vec<Feed>>,
}

impl MockTransport {
    pub(crate) fn new(responder: impl Fn(&Request) -> Reply + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            sent: Mutex::new(Vec::new()),
            feeds: Mutex::new(Vec::new()),
        })
    }

    /// Every stream opens successfully and every control request succeeds with `{}`.
    pub(crate) fn open() -> Arc<Self> {
        Self::new(|req| match req.timeout {
            None => Reply::Open,
            Some(_) => Reply::json(serde_json::json!({})),
        })
    }

    pub(crate) fn sent(&self) -> Vec<Sent> {
        self.sent.lock().expect("test lock").clone()
    }

    pub(crate) fn sent_to(&self, path_suffix: &str) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|s| s.request.url.path().ends_with(path_suffix))
            .collect()
    }

    pub(crate) fn open_bodies(&self) -> usize {
        self.feeds.lock().expect("test lock").len()
    }

    /// Writes `text` into the `n`th body opened by this transport.
    pub(crate) fn push(&self, n: usize, text: &str) {
        let feeds = self.feeds.lock().expect("test lock");
        let _ = feeds[n].unbounded_send(Ok(text.as_bytes().to_vec()));
    }

    pub(crate) fn break_body(&self, n: usize, err: TransportErr) {
        let feeds = self.feeds.lock().expect("test lock");
        let _ = feeds[n].unbounded_send(Err(err));
    }

    /// Ends the `n`th body cleanly.
    pub(crate) fn close(&self, n: usize) {
        self.feeds.lock().expect("test lock")[n].close_channel();
    }
}

impl Transport for MockTransport {
    fn send(&self, request: Request) -> BoxFuture<'static, Result<Response, TransportErr>> {
        let reply = (self.responder)(&request);
        self.sent.lock().expect("test lock").push(Sent {
            request,
            at: Instant::now(),
        });
        match reply {
            Reply::Open => {
                let (feed, body) = mpsc::unbounded();
                self.feeds.lock().expect("test lock").push(feed);
                future::ready(Ok(Response {
                    status: 200,
                    body: body.boxed(),
                }))
                .boxed()
            }
            Reply::Body(status, bytes) => future::ready(Ok(Response {
                status,
                body: stream::iter(vec![Ok(bytes)]).boxed(),
            }))
            .boxed(),
            Reply::Status(status) => future::ready(Ok(Response {
                status,
                body: stream::empty().boxed(),
            }))
            .boxed(),
            Reply::Fail(err) => future::ready(Err(err)).boxed(),
            Reply::Hang => future::pending().boxed(),
        }
    }
}
