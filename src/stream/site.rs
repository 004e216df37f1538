//! Site streams: one connection carrying messages for many users.
//!
//! Only the first batch of users can be named when the stream is opened (the `follow`
//! parameter).  The server answers with a `control` message naming a per-connection control
//! uri; everyone else is added through `add_user.json` requests against it, and each batch is
//! confirmed against `info.json` before it counts as part of the stream.  Until then users sit
//! in the queue.  On every reconnect the whole roster is queued again and replayed.
mod roster;

use self::roster::{Endpoints, Roster};
use super::{emit, Algorithm, Command, Ctx, Emitter, Hooks, Operation, Setup, SiteErr, Stream};
use crate::config::Config;
use crate::err::Error;
use crate::event::message::{Social, SocialKind};
use crate::event::{Event, Message, UserId};
use crate::request::{Executor, Params, RequestErr};

use hashbrown::{HashMap, HashSet};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use url::Url;


pub(crate) enum SiteCmd {
    Add(Vec<UserId>),
    Remove(UserId),
    Posted {
        users: Vec<UserId>,
        result: Result<(), RequestErr>,
    },
    Confirmed {
        users: Vec<UserId>,
        result: Result<Value, RequestErr>,
    },
    Removed {
        user: UserId,
        result: Result<(), RequestErr>,
    },
}

fn lock(roster: &Mutex<Roster>) -> MutexGuard<Roster> {
    roster.lock().unwrap_or_else(Roster::recover)
}

fn join(users: &[UserId]) -> String {
    users
        .iter()
        .map(UserId::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// `user_id -> name` for everyone `info.json` says the stream follows.
fn followed(info: &Value) -> HashMap<UserId, String> {
    info["info"]["users"]
        .as_array()
        .map(|users| {
            users
                .iter()
                .filter_map(|user| {
                    let id = UserId::from_value(&user["id"])
                        .or_else(|| UserId::from_value(&user["id_str"]))?;
                    let name = user["name"].as_str().unwrap_or_default().to_string();
                    Some((id, name))
                })
                .collect()
        })
        .unwrap_or_default()
}

struct SiteHooks {
    roster: Arc<Mutex<Roster>>,
    host: Url,
    max_initial_users: usize,
    max_users_per_request: usize,
    /// The batch named in `follow` on the current connection.
    initial: Vec<UserId>,
    /// Users posted to `add_user.json` and not yet confirmed or failed.
    adding: HashSet<UserId>,
}

impl SiteHooks {
    fn endpoints(&self) -> Option<Endpoints> {
        lock(&self.roster).control.clone()
    }

    fn post_batches(&mut self, users: Vec<UserId>, ctx: &mut Ctx<'_, SiteCmd>) {
        let endpoints = match self.endpoints() {
            Some(endpoints) if ctx.connected => endpoints,
            _ => return,
        };
        let users: Vec<UserId> = users
            .into_iter()
            .filter(|id| self.adding.insert(id.clone()))
            .collect();
        for batch in users.chunks(self.max_users_per_request) {
            let (executor, url, users) = (ctx.executor.clone(), endpoints.add_user.clone(), batch.to_vec());
            ctx.spawn(async move {
                let mut params = Params::new();
                params.insert("user_id".to_string(), join(&users));
                let result = match executor.post(&url, params).await {
                    // add_user.json answers with an empty or non-JSON body
                    Ok(_) | Err(RequestErr::Json { .. }) => Ok(()),
                    Err(e) => Err(e),
                };
                SiteCmd::Posted { users, result }
            });
        }
    }

    fn confirm(&self, users: Vec<UserId>, ctx: &mut Ctx<'_, SiteCmd>) {
        let endpoints = match self.endpoints() {
            Some(endpoints) if !users.is_empty() => endpoints,
            _ => return,
        };
        let executor = ctx.executor.clone();
        ctx.spawn(async move {
            let result = executor.get(&endpoints.info, Params::new()).await;
            SiteCmd::Confirmed { users, result }
        });
    }

    fn remove(&self, user: UserId, ctx: &mut Ctx<'_, SiteCmd>) {
        match self.endpoints() {
            Some(endpoints) if ctx.connected => {
                let executor = ctx.executor.clone();
                ctx.spawn(async move {
                    let mut params = Params::new();
                    params.insert("user_id".to_string(), user.to_string());
                    let result = executor.post(&endpoints.remove_user, params).await.map(drop);
                    SiteCmd::Removed { user, result }
                });
            }
            _ => self.removed(user, ctx),
        }
    }

    fn removed(&self, user: UserId, ctx: &mut Ctx<'_, SiteCmd>) {
        if lock(&self.roster).remove(&user) {
            log::info!("Removed user {} from site stream", user);
            ctx.emit(Event::RemoveUser(user));
        }
    }

    fn settle(&self, users: Vec<UserId>, info: Value, ctx: &mut Ctx<'_, SiteCmd>) {
        let names = followed(&info);
        let (added, failed) = lock(&self.roster).confirm(&users, |id| names.contains_key(id));
        if !added.is_empty() {
            log::info!("{} user(s) confirmed in site stream", added.len());
            let names = added
                .iter()
                .filter_map(|id| names.get(id).map(|name| (id.clone(), name.clone())))
                .collect();
            ctx.emit(Event::AddUsersToStream {
                users: added,
                names,
            });
        }
        if !failed.is_empty() {
            log::warn!("The server refused {} user(s)", failed.len());
            ctx.emit(Event::FailedToAddUsers(failed));
        }
    }

    fn settled(&mut self, users: &[UserId]) {
        for id in users {
            self.adding.remove(id);
        }
    }

    fn still_queued(&self, users: Vec<UserId>) -> Vec<UserId> {
        let roster = lock(&self.roster);
        let queued = users.into_iter().filter(|id| roster.in_queue.contains(id)).collect();
        queued
    }

    fn on_control(&mut self, control_uri: &str, ctx: &mut Ctx<'_, SiteCmd>) {
        let endpoints = match Endpoints::new(&self.host, control_uri) {
            Ok(endpoints) => endpoints,
            Err(inner) => {
                ctx.emit(Event::Error(Error::ControlUri {
                    uri: control_uri.to_string(),
                    inner,
                }));
                return;
            }
        };
        log::info!("Site stream control uri: {}", control_uri);
        let rest = {
            let mut roster = lock(&self.roster);
            roster.control = Some(endpoints);
            let rest: Vec<UserId> = roster
                .in_queue
                .ids()
                .iter()
                .filter(|id| !self.initial.contains(id))
                .cloned()
                .collect();
            rest
        };
        let initial = self.still_queued(self.initial.clone());
        self.confirm(initial, ctx);
        self.post_batches(rest, ctx);
    }
}

impl Hooks for SiteHooks {
    type Cmd = SiteCmd;

    fn before_connect(&mut self, params: &mut Params) {
        let queued = lock(&self.roster).requeue();
        self.initial = queued.into_iter().take(self.max_initial_users).collect();
        if self.initial.is_empty() {
            params.remove("follow");
        } else {
            params.insert("follow".to_string(), join(&self.initial));
        }
    }

    fn on_disconnect(&mut self) {
        lock(&self.roster).control = None;
        self.adding.clear();
    }

    fn on_message(&mut self, message: &Message, for_user: Option<&UserId>, ctx: &mut Ctx<'_, SiteCmd>) {
        match (message, for_user) {
            (Message::Control(control), _) => self.on_control(&control.control_uri, ctx),
            (
                Message::Social(Social {
                    kind: SocialKind::AccessRevoked,
                    ..
                }),
                Some(user),
            ) => {
                log::info!("User {} revoked access to the site stream", user);
                self.removed(user.clone(), ctx);
            }
            _ => (),
        }
    }

    fn on_command(&mut self, cmd: SiteCmd, ctx: &mut Ctx<'_, SiteCmd>) {
        match cmd {
            SiteCmd::Add(users) => self.post_batches(users, ctx),
            SiteCmd::Remove(user) => self.remove(user, ctx),
            SiteCmd::Posted { users, result: Ok(()) } => self.confirm(users, ctx),
            SiteCmd::Posted {
                users,
                result: Err(inner),
            }
            | SiteCmd::Confirmed {
                users,
                result: Err(inner),
            } => {
                self.settled(&users);
                log::warn!("Could not add {} user(s): {}", users.len(), inner);
                ctx.emit(Event::Error(Error::AddUsers {
                    users: users.clone(),
                    inner,
                }));
                ctx.retry(Algorithm::Exponential, Operation::AddUsers(users));
            }
            SiteCmd::Confirmed {
                users,
                result: Ok(info),
            } => {
                self.settled(&users);
                self.settle(users, info, ctx)
            }
            SiteCmd::Removed { user, result: Ok(()) } => self.removed(user, ctx),
            SiteCmd::Removed {
                user,
                result: Err(inner),
            } => {
                log::warn!("Could not remove user {}: {}", user, inner);
                ctx.emit(Event::Error(Error::RemoveUser { user, inner }));
            }
        }
    }

    fn on_retry(&mut self, operation: Operation, ctx: &mut Ctx<'_, SiteCmd>) {
        if let Operation::AddUsers(users) = operation {
            let users = self.still_queued(users);
            if !users.is_empty() {
                self.post_batches(users, ctx);
            }
        }
    }
}

/// Handle to a site stream.  Dropping it destroys the stream.
pub struct SiteStream {
    stream: Stream<SiteCmd>,
    roster: Arc<Mutex<Roster>>,
    executor: Executor,
    events: Emitter,
}

impl SiteStream {
    pub(crate) fn spawn<S: AsRef<str>>(setup: Setup, users: &[S]) -> Result<Self, SiteErr> {
        let users = parse_ids(users)?;
        let cfg: Arc<Config> = setup.cfg.clone();
        let mut roster = Roster::new(*cfg.max_users);
        roster.enqueue(&users)?;
        let roster = Arc::new(Mutex::new(roster));

        let (executor, events) = (setup.executor.clone(), setup.events.clone());
        if !users.is_empty() {
            emit(&events, Event::AddUsersToQueue(users));
        }
        let hooks = SiteHooks {
            roster: roster.clone(),
            host: cfg.site_stream_host.0.clone(),
            max_initial_users: *cfg.max_initial_users,
            max_users_per_request: *cfg.max_users_per_request,
            initial: Vec::new(),
            adding: HashSet::new(),
        };
        Ok(Self {
            stream: Stream::spawn(setup, hooks),
            roster,
            executor,
            events,
        })
    }

    pub fn add_user(&self, id: &str) -> Result<(), SiteErr> {
        self.add_users(&[id])
    }

    /// Queues users for the stream.  Either every id is accepted or none is.
    pub fn add_users<S: AsRef<str>>(&self, ids: &[S]) -> Result<(), SiteErr> {
        let users = parse_ids(ids)?;
        lock(&self.roster).enqueue(&users)?;
        if users.is_empty() {
            return Ok(());
        }
        log::debug!("Queued {} user(s) for the site stream", users.len());
        emit(&self.events, Event::AddUsersToQueue(users.clone()));
        self.stream.send(Command::Hook(SiteCmd::Add(users)));
        Ok(())
    }

    /// Unsubscribes a user, through the control endpoint when the stream is connected.
    pub fn remove_user(&self, id: &str) -> Result<(), SiteErr> {
        let user: UserId = id.parse()?;
        if !lock(&self.roster).has(&user) {
            return Err(SiteErr::NotPresent(user));
        }
        self.stream.send(Command::Hook(SiteCmd::Remove(user)));
        Ok(())
    }

    /// Asks the control endpoint who the stream is following right now.
    pub async fn info(&self) -> Result<Value, SiteErr> {
        let endpoints = lock(&self.roster).control.clone().ok_or(SiteErr::NotConnected)?;
        Ok(self.executor.get(&endpoints.info, Params::new()).await?)
    }

    pub fn control_uri(&self) -> Option<String> {
        lock(&self.roster).control.as_ref().map(|c| c.uri.clone())
    }

    pub fn has_user(&self, id: &UserId) -> bool {
        lock(&self.roster).has(id)
    }

    pub fn has_user_in_stream(&self, id: &UserId) -> bool {
        lock(&self.roster).in_stream.contains(id)
    }

    pub fn has_user_in_queue(&self, id: &UserId) -> bool {
        lock(&self.roster).in_queue.contains(id)
    }

    /// Confirmed users followed by queued ones.
    pub fn users(&self) -> Vec<UserId> {
        lock(&self.roster).users()
    }

    pub fn users_in_stream(&self) -> Vec<UserId> {
        lock(&self.roster).in_stream.ids().to_vec()
    }

    pub fn users_in_queue(&self) -> Vec<UserId> {
        lock(&self.roster).in_queue.ids().to_vec()
    }

    pub fn failed_to_add_users(&self) -> Vec<UserId> {
        lock(&self.roster).failed.clone()
    }

    pub fn user_count(&self) -> usize {
        lock(&self.roster).len()
    }

    pub(crate) fn spare(&self) -> usize {
        lock(&self.roster).spare()
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_connected()
    }

    pub fn is_paused(&self) -> bool {
        self.stream.is_paused()
    }

    pub fn params(&self) -> Params {
        self.stream.params()
    }

    pub fn pause(&self) {
        self.stream.pause()
    }

    pub fn resume(&self) {
        self.stream.resume()
    }

    pub fn destroy(&self) {
        self.stream.destroy()
    }
}

fn parse_ids<S: AsRef<str>>(ids: &[S]) -> Result<Vec<UserId>, SiteErr> {
    Ok(ids
        .iter()
        .map(|id| id.as_ref().parse())
        .collect::<Result<Vec<UserId>, _>>()?)
}
