//! A pool spreads any number of users over as many site streams as their count requires, and
//! can hold ordinary streams too.  Every shard reports on the same event channel and shares
//! one record of recently seen tweets, so a tweet delivered on two shards is unique only once.
//!
//! Users can also be queued one at a time.  Queued users are held back until the queue is big
//! enough to fill a site stream's initial `follow`, or until no one else has been queued for
//! the add-user window, and are then added together.  A burst of single adds thereby opens one
//! site stream that names them all, instead of costing an `add_user` request each.
use super::{emit, Emitter, Plain, PoolErr, Setup, SiteStream, Stream};
use crate::config::Config;
use crate::event::UserId;
use crate::request::{Executor, Method, Params};
use crate::response::{dispatch, Dedup, SharedDedup};
use crate::resource;

use hashbrown::HashSet;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::task::JoinHandle;
use tokio::time;
use url::Url;


#[derive(Clone)]
pub enum Shard {
    Stream(Arc<Stream>),
    Site(Arc<SiteStream>),
}

impl Shard {
    fn destroy(&self) {
        match self {
            Shard::Stream(stream) => stream.destroy(),
            Shard::Site(site) => site.destroy(),
        }
    }

    fn site(&self) -> Option<&Arc<SiteStream>> {
        match self {
            Shard::Site(site) => Some(site),
            Shard::Stream(_) => None,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::error!("{}", &poisoned);
        poisoned.into_inner()
    })
}

/// Users waiting to be added together, and the timer that will add them.
#[derive(Default)]
struct Queue {
    users: Vec<UserId>,
    flush: Option<JoinHandle<()>>,
}

impl Queue {
    fn take(&mut self) -> Vec<UserId> {
        if let Some(flush) = self.flush.take() {
            flush.abort();
        }
        std::mem::take(&mut self.users)
    }
}

struct Inner {
    executor: Executor,
    cfg: Arc<Config>,
    events: Emitter,
    dedup: SharedDedup,
    shards: Mutex<Vec<Shard>>,
    queue: Mutex<Queue>,
}

/// Handle to a pool.  Clones share the same shards.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<Inner>,
}

impl Pool {
    pub(crate) fn new(executor: Executor, cfg: Arc<Config>, events: Emitter) -> Self {
        let dedup = Dedup::shared(*cfg.max_saved_tweet_ids);
        Self {
            inner: Arc::new(Inner {
                executor,
                cfg,
                events,
                dedup,
                shards: Mutex::new(Vec::new()),
                queue: Mutex::new(Queue::default()),
            }),
        }
    }

    fn setup(&self, method: Method, resource: Url, params: Params) -> Setup {
        let inner = &self.inner;
        Setup {
            executor: inner.executor.clone(),
            cfg: inner.cfg.clone(),
            method,
            resource,
            params,
            events: inner.events.clone(),
            dedup: inner.dedup.clone(),
        }
    }

    fn add_stream(&self, method: Method, resource: Url, params: Params) -> Arc<Stream> {
        let stream = Arc::new(Stream::spawn(self.setup(method, resource, params), Plain));
        lock(&self.inner.shards).push(Shard::Stream(stream.clone()));
        stream
    }

    pub fn public_stream(&self, params: Params) -> Arc<Stream> {
        self.add_stream(Method::Post, resource::filter(), params)
    }

    pub fn sample_stream(&self, params: Params) -> Arc<Stream> {
        self.add_stream(Method::Get, resource::sample(), params)
    }

    pub fn firehose(&self, params: Params) -> Arc<Stream> {
        self.add_stream(Method::Get, resource::firehose(), params)
    }

    pub fn user_stream(&self, params: Params) -> Arc<Stream> {
        self.add_stream(Method::Get, resource::user(), params)
    }

    fn open_site<S: AsRef<str>>(&self, users: &[S]) -> Result<Arc<SiteStream>, PoolErr> {
        let setup = self.setup(Method::Get, resource::site(&self.inner.cfg)?, Params::new());
        Ok(Arc::new(SiteStream::spawn(setup, users)?))
    }

    /// Opens a new site shard for `users` without looking at spare capacity elsewhere.
    pub fn site_stream<S: AsRef<str>>(&self, users: &[S]) -> Result<Arc<SiteStream>, PoolErr> {
        let site = self.open_site(users)?;
        lock(&self.inner.shards).push(Shard::Site(site.clone()));
        Ok(site)
    }

    /// Adds users right away, topping up existing site streams before opening new ones.
    /// Users already somewhere in the pool are skipped.
    pub fn add_users<S: AsRef<str>>(&self, ids: &[S]) -> Result<(), PoolErr> {
        let users = ids
            .iter()
            .map(|id| id.as_ref().parse())
            .collect::<Result<Vec<UserId>, _>>()?;
        self.spread(users)
    }

    pub fn add_user(&self, id: &str) -> Result<(), PoolErr> {
        self.add_users(&[id])
    }

    fn spread(&self, users: Vec<UserId>) -> Result<(), PoolErr> {
        let mut shards = lock(&self.inner.shards);
        let mut seen = HashSet::new();
        let mut fresh: Vec<UserId> = users
            .into_iter()
            .filter(|id| !holds(&shards, id) && seen.insert(id.clone()))
            .collect();

        for site in shards.iter().filter_map(Shard::site) {
            if fresh.is_empty() {
                break;
            }
            let take = site.spare().min(fresh.len());
            if take > 0 {
                site.add_users(&fresh.drain(..take).collect::<Vec<_>>())?;
            }
        }
        while !fresh.is_empty() {
            let take = (*self.inner.cfg.max_users).min(fresh.len());
            let batch: Vec<UserId> = fresh.drain(..take).collect();
            log::info!("Opening a new site stream for {} user(s)", batch.len());
            shards.push(Shard::Site(self.open_site(&batch)?));
        }
        Ok(())
    }

    /// Queues a user to be added along with whoever else is queued shortly after.
    ///
    /// The queue is added as soon as it holds `MAX_INITIAL_USERS` users, or once the add-user
    /// window passes without another user being queued.
    pub fn queue_user(&self, id: &str) -> Result<(), PoolErr> {
        let user: UserId = id.parse()?;
        if self.has_user(&user) {
            return Err(PoolErr::AlreadyInPool(user));
        }
        let full = {
            let mut queue = lock(&self.inner.queue);
            if queue.users.contains(&user) {
                return Err(PoolErr::AlreadyInPool(user));
            }
            queue.users.push(user);
            if queue.users.len() >= *self.inner.cfg.max_initial_users {
                Some(queue.take())
            } else {
                if let Some(flush) = queue.flush.take() {
                    flush.abort();
                }
                queue.flush = Some(self.flush_after(*self.inner.cfg.add_user_timeout));
                None
            }
        };
        match full {
            Some(users) => self.spread(users),
            None => Ok(()),
        }
    }

    fn flush_after(&self, window: std::time::Duration) -> JoinHandle<()> {
        let pool: Weak<Inner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            time::sleep(window).await;
            if let Some(inner) = pool.upgrade() {
                let pool = Pool { inner };
                let users = {
                    let mut queue = lock(&pool.inner.queue);
                    queue.flush = None;
                    std::mem::take(&mut queue.users)
                };
                log::debug!("Adding {} queued user(s)", users.len());
                if let Err(e) = pool.spread(users) {
                    log::error!("Could not add queued users: {}", e);
                }
            }
        })
    }

    /// Users queued by [`Pool::queue_user`] and not yet added.
    pub fn queued_users(&self) -> Vec<UserId> {
        lock(&self.inner.queue).users.clone()
    }

    /// Removes a user from whichever site stream holds it, or drops it from the queue.
    pub fn remove_user(&self, id: &str) -> Result<(), PoolErr> {
        let user: UserId = id.parse()?;
        {
            let mut queue = lock(&self.inner.queue);
            if let Some(at) = queue.users.iter().position(|queued| queued == &user) {
                queue.users.remove(at);
                return Ok(());
            }
        }
        match self.site_streams().into_iter().find(|site| site.has_user(&user)) {
            Some(site) => Ok(site.remove_user(id)?),
            None => Err(PoolErr::NotInPool(user)),
        }
    }

    /// Feeds `message` through the same classification as data arriving on a shard.
    pub fn simulate(&self, message: Value, for_user: Option<&UserId>) {
        let raw = match for_user {
            Some(user) => json!({"for_user": user, "message": message}),
            None => message,
        };
        let events = &self.inner.events;
        dispatch(raw, &self.inner.dedup, &mut |event| emit(events, event));
    }

    pub fn shards(&self) -> Vec<Shard> {
        lock(&self.inner.shards).clone()
    }

    pub fn shard_count(&self) -> usize {
        lock(&self.inner.shards).len()
    }

    pub fn site_streams(&self) -> Vec<Arc<SiteStream>> {
        lock(&self.inner.shards)
            .iter()
            .filter_map(Shard::site)
            .cloned()
            .collect()
    }

    pub fn has_user(&self, id: &UserId) -> bool {
        holds(&lock(&self.inner.shards), id)
    }

    pub fn has_user_in_stream(&self, id: &UserId) -> bool {
        self.site_streams().iter().any(|site| site.has_user_in_stream(id))
    }

    pub fn has_user_in_queue(&self, id: &UserId) -> bool {
        self.site_streams().iter().any(|site| site.has_user_in_queue(id))
    }

    pub fn users(&self) -> Vec<UserId> {
        self.site_streams().iter().flat_map(|site| site.users()).collect()
    }

    pub fn users_in_stream(&self) -> Vec<UserId> {
        self.site_streams()
            .iter()
            .flat_map(|site| site.users_in_stream())
            .collect()
    }

    pub fn users_in_queue(&self) -> Vec<UserId> {
        self.site_streams()
            .iter()
            .flat_map(|site| site.users_in_queue())
            .collect()
    }

    pub fn failed_to_add_users(&self) -> Vec<UserId> {
        self.site_streams()
            .iter()
            .flat_map(|site| site.failed_to_add_users())
            .collect()
    }

    /// Destroys every shard and forgets anyone still queued.
    pub fn destroy(&self) {
        lock(&self.inner.queue).take();
        let shards = std::mem::take(&mut *lock(&self.inner.shards));
        for shard in &shards {
            shard.destroy();
        }
    }
}

fn holds(shards: &[Shard], id: &UserId) -> bool {
    shards
        .iter()
        .filter_map(Shard::site)
        .any(|site| site.has_user(id))
}
