//! Long-lived streams: a [`Stream`] handle per connection, [`SiteStream`] for multiplexed
//! per-user streams with a subscriber roster, and [`Pool`] for spreading users across as many
//! site streams as it takes.
//!
//! Each stream is driven by its own task.  The handle only flips flags and sends commands, so
//! every method on it returns immediately; everything the task observes is reported as an
//! [`Event`] on the channel returned alongside the handle.
mod connection;
mod err;
mod params;
mod pool;
mod retry;
mod site;

pub use err::{ParamErr, PoolErr, SiteErr};
pub use pool::{Pool, Shard};
pub use retry::{Algorithm, Operation};
pub use site::SiteStream;

pub(crate) use connection::{Ctx, Hooks, Plain, Setup};

use crate::event::Event;
use crate::request::Params;

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

pub(crate) type Emitter = mpsc::UnboundedSender<Event>;

/// Sends `event` to whoever holds the receiving end, if anyone still does.
pub(crate) fn emit(events: &Emitter, event: Event) {
    if let Err(unsent) = events.send(event) {
        log::trace!("Dropped `{}` event: no receiver", unsent.0.name());
    }
}

pub(crate) enum Command<C> {
    Pause,
    Resume,
    Reconnect,
    Destroy,
    Hook(C),
}

/// State the handle reads synchronously and the driving task keeps current.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub(crate) params: Params,
    pub(crate) connected: bool,
    pub(crate) paused: bool,
    pub(crate) destroyed: bool,
}

impl Shared {
    pub(crate) fn recover(poisoned: PoisonError<MutexGuard<Self>>) -> MutexGuard<Self> {
        log::error!("{}", &poisoned);
        poisoned.into_inner()
    }
}

pub(crate) fn lock(shared: &Mutex<Shared>) -> MutexGuard<Shared> {
    shared.lock().unwrap_or_else(Shared::recover)
}

/// Handle to one streaming connection.  Dropping it destroys the stream.
pub struct Stream<C: Send + 'static = ()> {
    shared: Arc<Mutex<Shared>>,
    commands: mpsc::UnboundedSender<Command<C>>,
}

impl<C: Send + 'static> Stream<C> {
    /// Starts the task that drives the connection.  It connects on its first poll.
    pub(crate) fn spawn<H: Hooks<Cmd = C>>(setup: Setup, hooks: H) -> Self {
        let shared = Arc::new(Mutex::new(Shared {
            params: params::with_defaults(setup.params.clone()),
            ..Shared::default()
        }));
        let (commands, inbox) = mpsc::unbounded_channel();
        let driver = connection::Driver::new(setup, shared.clone(), commands.clone(), inbox, hooks);
        tokio::spawn(driver.run());
        Self { shared, commands }
    }

    pub(crate) fn send(&self, command: Command<C>) {
        if self.commands.send(command).is_err() {
            log::debug!("Command sent to a stream that has already shut down");
        }
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.shared).connected
    }

    pub fn is_paused(&self) -> bool {
        lock(&self.shared).paused
    }

    pub fn is_destroyed(&self) -> bool {
        lock(&self.shared).destroyed
    }

    /// A snapshot of the parameters the next connection will be opened with.
    pub fn params(&self) -> Params {
        lock(&self.shared).params.clone()
    }

    /// Closes the connection and holds off reconnecting until [`Stream::resume`].
    pub fn pause(&self) {
        {
            let mut shared = lock(&self.shared);
            if shared.paused || shared.destroyed {
                return;
            }
            shared.paused = true;
        }
        self.send(Command::Pause);
    }

    pub fn resume(&self) {
        {
            let mut shared = lock(&self.shared);
            if !shared.paused || shared.destroyed {
                return;
            }
            shared.paused = false;
        }
        self.send(Command::Resume);
    }

    /// Closes the connection for good.  A `Destroy` event is the last one sent.
    pub fn destroy(&self) {
        {
            let mut shared = lock(&self.shared);
            if shared.destroyed {
                return;
            }
            shared.destroyed = true;
        }
        self.send(Command::Destroy);
    }

    /// Reopens the connection so that changed parameters take effect.
    pub fn reconnect(&self) {
        self.send(Command::Reconnect);
    }

    /// Adds terms to a comma-joined list parameter, reconnecting if a connection is open.
    pub fn add_terms<S: AsRef<str>>(&self, param: &str, terms: &[S]) -> Result<(), ParamErr> {
        params::add(&mut lock(&self.shared).params, param, terms)?;
        self.reconnect();
        Ok(())
    }

    pub fn remove_terms<S: AsRef<str>>(&self, param: &str, terms: &[S]) -> Result<(), ParamErr> {
        params::remove(&mut lock(&self.shared).params, param, terms)?;
        self.reconnect();
        Ok(())
    }

    pub fn list(&self, param: &str) -> BTreeSet<String> {
        params::list(&lock(&self.shared).params, param)
    }

    pub fn track<S: AsRef<str>>(&self, terms: &[S]) -> Result<(), ParamErr> {
        self.add_terms("track", terms)
    }

    pub fn untrack<S: AsRef<str>>(&self, terms: &[S]) -> Result<(), ParamErr> {
        self.remove_terms("track", terms)
    }

    pub fn tracking(&self, term: &str) -> bool {
        self.list("track").contains(term)
    }

    pub fn track_list(&self) -> Vec<String> {
        self.list("track").into_iter().collect()
    }

    pub fn track_count(&self) -> usize {
        self.list("track").len()
    }
}

impl<C: Send + 'static> Drop for Stream<C> {
    fn drop(&mut self) {
        self.destroy();
    }
}
