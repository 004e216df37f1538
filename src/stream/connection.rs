//! The task behind every [`Stream`](super::Stream).
//!
//! The driver owns everything mutable about a connection: the in-flight connect request, the
//! open body, the decoder, the stall timer and the retry state.  It sleeps in a single
//! `select!` until one of them (or a command from the handle) wakes it, handles that one
//! wake-up synchronously, and goes back to sleep.  Stream kinds that need more than a plain
//! connection plug in through [`Hooks`].
use super::retry::{Key, Retry, Tick};
use super::{emit, lock, Algorithm, Command, Emitter, Operation, Shared};
use crate::config::Config;
use crate::err::Error;
use crate::event::{Event, Message, UserId};
use crate::request::{Executor, Method, Params, RequestErr, Response, TransportErr};
use crate::response::{dispatch, Decoder, SharedDedup};

use futures::future::{self, BoxFuture, FutureExt};
use futures::stream::{BoxStream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, Sleep};
use url::Url;


/// Everything a stream needs that is not specific to its kind.
pub(crate) struct Setup {
    pub(crate) executor: Executor,
    pub(crate) cfg: Arc<Config>,
    pub(crate) method: Method,
    pub(crate) resource: Url,
    pub(crate) params: Params,
    pub(crate) events: Emitter,
    pub(crate) dedup: SharedDedup,
}

/// Extension points for stream kinds layered on a plain connection.
pub(crate) trait Hooks: Send + 'static {
    /// Commands the handle (or the hooks' own spawned requests) can send to the task.
    type Cmd: Send + 'static;

    /// Runs after `BeforeConnect` is emitted; may rewrite the outbound parameters.
    fn before_connect(&mut self, _params: &mut Params) {}

    /// Runs whenever the connection is torn down, whatever the cause.
    fn on_disconnect(&mut self) {}

    /// Sees every message before it is emitted.
    fn on_message(
        &mut self,
        _message: &Message,
        _for_user: Option<&UserId>,
        _ctx: &mut Ctx<'_, Self::Cmd>,
    ) {
    }

    fn on_command(&mut self, _cmd: Self::Cmd, _ctx: &mut Ctx<'_, Self::Cmd>) {}

    /// Runs a retry of anything other than [`Operation::Connect`].
    fn on_retry(&mut self, _operation: Operation, _ctx: &mut Ctx<'_, Self::Cmd>) {}
}

/// A stream with no behavior beyond connecting and classifying messages.
pub(crate) struct Plain;

impl Hooks for Plain {
    type Cmd = ();
}

/// What hooks may touch while they run.
pub(crate) struct Ctx<'a, C> {
    pub(crate) executor: &'a Executor,
    pub(crate) connected: bool,
    events: &'a Emitter,
    commands: &'a mpsc::UnboundedSender<Command<C>>,
    retry: &'a mut Retry,
}

impl<'a, C: Send + 'static> Ctx<'a, C> {
    pub(crate) fn emit(&self, event: Event) {
        emit(self.events, event)
    }

    pub(crate) fn retry(&mut self, algorithm: Algorithm, operation: Operation) {
        let events = self.events;
        self.retry
            .schedule(algorithm, operation, &mut |event| emit(events, event));
    }

    /// Runs `task` in the background and hands its output back to the hooks as a command.
    pub(crate) fn spawn<F>(&self, task: F)
    where
        F: Future<Output = C> + Send + 'static,
    {
        let commands = self.commands.clone();
        tokio::spawn(async move {
            if commands.send(Command::Hook(task.await)).is_err() {
                log::debug!("Stream shut down before a background request finished");
            }
        });
    }
}

macro_rules! ctx {
    ($driver:ident) => {
        Ctx {
            executor: &$driver.executor,
            connected: $driver.body.is_some(),
            events: &$driver.events,
            commands: &$driver.commands,
            retry: &mut $driver.retry,
        }
    };
}

enum Wake<C> {
    Command(Command<C>),
    Tick(Tick),
    Connected(Result<Response, RequestErr>),
    Chunk(Option<Result<Vec<u8>, TransportErr>>),
    Stalled,
}

pub(crate) struct Driver<H: Hooks> {
    method: Method,
    resource: Url,
    shared: Arc<Mutex<Shared>>,
    executor: Executor,
    events: Emitter,
    commands: mpsc::UnboundedSender<Command<H::Cmd>>,
    inbox: mpsc::UnboundedReceiver<Command<H::Cmd>>,
    retry: Retry,
    ticks: mpsc::UnboundedReceiver<Tick>,
    dedup: SharedDedup,
    stall_timeout: Duration,
    connecting: Option<BoxFuture<'static, Result<Response, RequestErr>>>,
    body: Option<BoxStream<'static, Result<Vec<u8>, TransportErr>>>,
    decoder: Decoder,
    stall: Option<Pin<Box<Sleep>>>,
    hooks: H,
}

async fn pending_or<F: Future + Unpin>(slot: &mut Option<F>) -> F::Output {
    match slot {
        Some(fut) => fut.await,
        None => future::pending().await,
    }
}

async fn next_chunk(
    body: &mut Option<BoxStream<'static, Result<Vec<u8>, TransportErr>>>,
) -> Option<Result<Vec<u8>, TransportErr>> {
    match body {
        Some(body) => body.next().await,
        None => future::pending().await,
    }
}

impl<H: Hooks> Driver<H> {
    pub(crate) fn new(
        setup: Setup,
        shared: Arc<Mutex<Shared>>,
        commands: mpsc::UnboundedSender<Command<H::Cmd>>,
        inbox: mpsc::UnboundedReceiver<Command<H::Cmd>>,
        hooks: H,
    ) -> Self {
        let (retry, ticks) = Retry::new(&setup.cfg);
        Self {
            method: setup.method,
            resource: setup.resource,
            shared,
            executor: setup.executor,
            events: setup.events,
            commands,
            inbox,
            retry,
            ticks,
            dedup: setup.dedup,
            stall_timeout: *setup.cfg.stall_timeout,
            connecting: None,
            body: None,
            decoder: Decoder::new(),
            stall: None,
            hooks,
        }
    }

    pub(crate) async fn run(mut self) {
        self.connect();
        loop {
            let wake = tokio::select! {
                Some(command) = self.inbox.recv() => Wake::Command(command),
                Some(tick) = self.ticks.recv() => Wake::Tick(tick),
                result = pending_or(&mut self.connecting) => Wake::Connected(result),
                chunk = next_chunk(&mut self.body) => Wake::Chunk(chunk),
                () = pending_or(&mut self.stall) => Wake::Stalled,
            };
            if !self.handle(wake) {
                break;
            }
        }
        log::debug!("Stream to {} shut down", self.resource);
    }

    /// Returns `false` once the stream is destroyed.
    fn handle(&mut self, wake: Wake<H::Cmd>) -> bool {
        match wake {
            Wake::Command(Command::Pause) => self.pause(),
            Wake::Command(Command::Resume) => self.connect(),
            Wake::Command(Command::Reconnect) => self.reconnect(),
            Wake::Command(Command::Destroy) => {
                self.destroy();
                return false;
            }
            Wake::Command(Command::Hook(cmd)) => {
                let mut ctx = ctx!(self);
                self.hooks.on_command(cmd, &mut ctx);
            }
            Wake::Tick(Tick::Fire(key)) => self.fire(key),
            Wake::Tick(Tick::Reset(key)) => self.retry.reset(&key),
            Wake::Connected(result) => {
                self.connecting = None;
                self.on_response(result);
            }
            Wake::Chunk(Some(Ok(bytes))) => self.on_chunk(&bytes),
            Wake::Chunk(Some(Err(e))) => self.on_broken(Some(e)),
            Wake::Chunk(None) => self.on_broken(None),
            Wake::Stalled => self.on_stall(),
        }
        true
    }

    fn emit(&self, event: Event) {
        emit(&self.events, event)
    }

    fn schedule(&mut self, algorithm: Algorithm, operation: Operation) {
        let events = &self.events;
        self.retry
            .schedule(algorithm, operation, &mut |event| emit(events, event));
    }

    fn is_open(&self) -> bool {
        self.connecting.is_some() || self.body.is_some()
    }

    fn may_connect(&self) -> bool {
        let shared = lock(&self.shared);
        !(shared.paused || shared.destroyed)
    }

    fn connect(&mut self) {
        if self.is_open() {
            return;
        }
        let params = {
            let mut shared = lock(&self.shared);
            if shared.paused || shared.destroyed {
                log::debug!("Not connecting to {}: paused or destroyed", self.resource);
                return;
            }
            emit(&self.events, Event::BeforeConnect);
            self.hooks.before_connect(&mut shared.params);
            shared.params.clone()
        };
        log::info!("Connecting to {}", self.resource);
        self.connecting = Some(
            self.executor
                .stream(self.method, self.resource.clone(), params)
                .boxed(),
        );
    }

    fn reconnect(&mut self) {
        if !self.is_open() || !self.may_connect() {
            return;
        }
        self.teardown();
        self.emit(Event::Reconnect);
        self.connect();
    }

    fn fire(&mut self, key: Key) {
        if !self.retry.fired(&key) {
            return;
        }
        match key.operation {
            Operation::Connect => {
                if self.may_connect() && !self.is_open() {
                    self.emit(Event::Reconnect);
                    self.connect();
                }
            }
            operation => {
                let mut ctx = ctx!(self);
                self.hooks.on_retry(operation, &mut ctx);
            }
        }
    }

    fn teardown(&mut self) {
        self.connecting = None;
        self.body = None;
        self.stall = None;
        self.decoder = Decoder::new();
        lock(&self.shared).connected = false;
        self.hooks.on_disconnect();
    }

    fn pause(&mut self) {
        self.teardown();
        self.retry.cancel(&Operation::Connect);
        log::info!("Paused stream to {}", self.resource);
    }

    fn destroy(&mut self) {
        self.teardown();
        self.retry.cancel_all();
        lock(&self.shared).destroyed = true;
        log::info!("Destroyed stream to {}", self.resource);
        self.emit(Event::Destroy);
    }

    fn arm_stall(&mut self) {
        let deadline = Instant::now() + self.stall_timeout;
        match &mut self.stall {
            Some(stall) => stall.as_mut().reset(deadline),
            None => self.stall = Some(Box::pin(time::sleep_until(deadline))),
        }
    }

    fn on_response(&mut self, result: Result<Response, RequestErr>) {
        match result {
            Ok(response) => {
                lock(&self.shared).connected = true;
                self.body = Some(response.body);
                self.decoder = Decoder::new();
                self.arm_stall();
                log::info!("Connected to {}", self.resource);
                self.emit(Event::Connect);
            }
            Err(e) => {
                // HTTP errors back off exponentially, network errors linearly
                let algorithm = match e.status() {
                    Some(_) => Algorithm::Exponential,
                    None => Algorithm::Linear,
                };
                let timed_out = e.is_timeout();
                log::warn!("Could not connect to {}: {}", self.resource, e);
                self.emit(Event::Error(e.into()));
                if timed_out {
                    self.emit(Event::Timeout);
                }
                self.schedule(algorithm, Operation::Connect);
            }
        }
    }

    fn on_chunk(&mut self, bytes: &[u8]) {
        self.arm_stall();
        self.decoder.push(bytes);

        let mut events = Vec::new();
        let mut failure = None;
        for next in self.decoder.by_ref() {
            match next {
                Ok(value) => dispatch(value, &self.dedup, &mut |event| events.push(event)),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        for event in events {
            if let Event::Message { message, for_user } = &event {
                let mut ctx = ctx!(self);
                self.hooks.on_message(message, for_user.as_ref(), &mut ctx);
            }
            self.emit(event);
        }

        if let Some(e) = failure {
            log::warn!("Unreadable data from {}: {}", self.resource, e);
            self.teardown();
            self.emit(Event::Error(Error::Decode(e)));
            self.schedule(Algorithm::Exponential, Operation::Connect);
        }
    }

    fn on_broken(&mut self, failure: Option<TransportErr>) {
        self.teardown();
        let algorithm = match failure {
            Some(inner) => {
                let e = RequestErr::Transport {
                    url: self.resource.to_string(),
                    inner,
                };
                let timed_out = e.is_timeout();
                log::warn!("Stream from {} broke: {}", self.resource, e);
                self.emit(Event::Error(e.into()));
                if timed_out {
                    // a read timeout is a stall as far as backoff is concerned
                    self.emit(Event::Timeout);
                    Algorithm::Linear
                } else {
                    Algorithm::Exponential
                }
            }
            None => {
                log::warn!("Stream from {} was closed by the server", self.resource);
                self.emit(Event::End);
                Algorithm::Exponential
            }
        };
        self.schedule(algorithm, Operation::Connect);
    }

    fn on_stall(&mut self) {
        log::warn!(
            "No data from {} for {:?}; reconnecting",
            self.resource,
            self.stall_timeout
        );
        self.teardown();
        self.emit(Event::Timeout);
        self.emit(Event::Error(Error::Stall(self.stall_timeout)));
        self.schedule(Algorithm::Linear, Operation::Connect);
    }
}
