//! Per-operation backoff.
//!
//! Each `(operation, algorithm)` pair keeps its own delay and attempt count.  A retry that is
//! requested while one is already pending for the same pair is folded into it.  Once a retry
//! has fired and the stream stays quiet for the reset period, the pair starts over from its
//! initial delay.
use crate::config::Config;
use crate::event::{Event, UserId};

use hashbrown::HashMap;
use std::fmt;
use std::time::Duration;
use strum::Display;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;

#[cfg(test)]
mod test;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Algorithm {
    /// Grows by the start delay each attempt.  Used for network-level failures.
    Linear,
    /// Doubles each attempt.  Used for HTTP errors and broken streams.
    Exponential,
}

/// What a retry will do when it fires.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    Connect,
    AddUsers(Vec<UserId>),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operation::Connect => write!(f, "connect"),
            Operation::AddUsers(users) => write!(f, "addUsers({})", users.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Key {
    pub(crate) operation: Operation,
    pub(crate) algorithm: Algorithm,
}

/// Timer messages for the task that owns the [`Retry`].
#[derive(Debug)]
pub(crate) enum Tick {
    Fire(Key),
    Reset(Key),
}

#[derive(Debug)]
struct State {
    delay: Duration,
    attempt: u32,
    retries: u32,
    pending: Option<JoinHandle<()>>,
    reset: Option<JoinHandle<()>>,
}

impl State {
    fn new(start: Duration) -> Self {
        Self {
            delay: start,
            attempt: 1,
            retries: 0,
            pending: None,
            reset: None,
        }
    }

    fn abort(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
        if let Some(reset) = self.reset.take() {
            reset.abort();
        }
    }
}

#[derive(Debug)]
pub(crate) struct Retry {
    states: HashMap<Key, State>,
    cfg: Config,
    ticks: mpsc::UnboundedSender<Tick>,
}

impl Retry {
    pub(crate) fn new(cfg: &Config) -> (Self, mpsc::UnboundedReceiver<Tick>) {
        let (ticks, tick_rx) = mpsc::unbounded_channel();
        let retry = Self {
            states: HashMap::new(),
            cfg: cfg.clone(),
            ticks,
        };
        (retry, tick_rx)
    }

    /// Schedules `operation` to run after the pair's next delay.
    pub(crate) fn schedule(
        &mut self,
        algorithm: Algorithm,
        operation: Operation,
        emit: &mut dyn FnMut(Event),
    ) {
        let (start, max) = self.cfg.backoff(algorithm);
        let key = Key {
            operation,
            algorithm,
        };
        let state = self
            .states
            .entry(key.clone())
            .or_insert_with(|| State::new(start));
        if state.pending.is_some() {
            log::debug!("A {} retry of {} is already pending", algorithm, key.operation);
            return;
        }
        if let Some(reset) = state.reset.take() {
            reset.abort();
        }

        if state.attempt > 1 {
            state.delay = match algorithm {
                Algorithm::Linear => state.delay + start,
                Algorithm::Exponential => state.delay * 2,
            };
        }
        if state.delay >= max {
            state.delay = max;
            log::warn!("{} retries of {} have reached {:?}", algorithm, key.operation, max);
            emit(Event::RetryMax {
                algorithm,
                operation: key.operation.clone(),
            });
        }
        log::info!(
            "Retrying {} in {:?} ({} attempt {})",
            key.operation,
            state.delay,
            algorithm,
            state.attempt
        );
        emit(Event::Retry {
            algorithm,
            operation: key.operation.clone(),
            delay: state.delay,
            attempt: state.attempt,
            retries: state.retries,
        });

        let (delay, ticks) = (state.delay, self.ticks.clone());
        state.pending = Some(tokio::spawn(async move {
            time::sleep(delay).await;
            let _ = ticks.send(Tick::Fire(key));
        }));
        state.attempt += 1;
    }

    /// Marks a retry as fired and starts its reset timer.  Returns `false` for a retry that was
    /// cancelled before its tick was handled.
    pub(crate) fn fired(&mut self, key: &Key) -> bool {
        let state = match self.states.get_mut(key) {
            Some(state) if state.pending.is_some() => state,
            _ => return false,
        };
        state.pending = None;

        let (reset_after, ticks, key) = (*self.cfg.backoff_reset, self.ticks.clone(), key.clone());
        state.reset = Some(tokio::spawn(async move {
            time::sleep(reset_after).await;
            let _ = ticks.send(Tick::Reset(key));
        }));
        true
    }

    /// Rewinds a pair to its start delay.  Pairs for anything but [`Operation::Connect`] are
    /// keyed by the batch they retry, so they are forgotten instead.
    pub(crate) fn reset(&mut self, key: &Key) {
        let (start, _) = self.cfg.backoff(key.algorithm);
        // a reset timer that was aborted after its tick was sent must not count
        let state = match self.states.get_mut(key).filter(|s| s.reset.is_some()) {
            Some(state) => state,
            None => return,
        };
        if key.operation != Operation::Connect {
            self.states.remove(key);
            log::debug!("{} backoff for {} dropped", key.algorithm, key.operation);
            return;
        }
        state.attempt = 1;
        state.delay = start;
        state.retries += 1;
        state.reset = None;
        log::debug!("{} backoff for {} reset", key.algorithm, key.operation);
    }

    /// Cancels any pending retries of `operation`, under either algorithm.
    pub(crate) fn cancel(&mut self, operation: &Operation) {
        for (key, state) in self.states.iter_mut() {
            if &key.operation == operation {
                if let Some(pending) = state.pending.take() {
                    pending.abort();
                }
            }
        }
    }

    pub(crate) fn cancel_all(&mut self) {
        for state in self.states.values_mut() {
            state.abort();
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        self.states.len()
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self, operation: &Operation) -> bool {
        self.states
            .iter()
            .any(|(key, state)| &key.operation == operation && state.pending.is_some())
    }
}

impl Drop for Retry {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
