use crate::event::UserId;
use crate::stream::SiteErr;

use hashbrown::HashSet;
use std::sync::{MutexGuard, PoisonError};
use url::Url;

/// An ordered set of user ids.
#[derive(Debug, Default, Clone)]
pub(crate) struct Members {
    order: Vec<UserId>,
    index: HashSet<UserId>,
}

impl Members {
    pub(crate) fn contains(&self, id: &UserId) -> bool {
        self.index.contains(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn ids(&self) -> &[UserId] {
        &self.order
    }

    pub(crate) fn insert(&mut self, id: UserId) -> bool {
        if self.index.insert(id.clone()) {
            self.order.push(id);
            true
        } else {
            false
        }
    }

    pub(crate) fn remove(&mut self, id: &UserId) -> bool {
        if self.index.remove(id) {
            self.order.retain(|member| member != id);
            true
        } else {
            false
        }
    }

    fn take(&mut self) -> Vec<UserId> {
        self.index.clear();
        std::mem::take(&mut self.order)
    }
}

/// The site stream's control endpoints, known once a `control` message has arrived.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Endpoints {
    pub(crate) uri: String,
    pub(crate) add_user: Url,
    pub(crate) remove_user: Url,
    pub(crate) info: Url,
}

impl Endpoints {
    pub(crate) fn new(host: &Url, control_uri: &str) -> Result<Self, url::ParseError> {
        let endpoint = |name: &str| host.join(&format!("{}/{}", control_uri, name));
        Ok(Self {
            uri: control_uri.to_string(),
            add_user: endpoint("add_user.json")?,
            remove_user: endpoint("remove_user.json")?,
            info: endpoint("info.json")?,
        })
    }
}

/// Who a site stream follows.
///
/// Every subscriber is either confirmed in the stream or waiting in the queue, never both.
/// Users the server refused to add are remembered separately and are not subscribers.
#[derive(Debug, Default)]
pub(crate) struct Roster {
    pub(crate) in_stream: Members,
    pub(crate) in_queue: Members,
    pub(crate) failed: Vec<UserId>,
    pub(crate) control: Option<Endpoints>,
    max_users: usize,
}

impl Roster {
    pub(crate) fn new(max_users: usize) -> Self {
        Self {
            max_users,
            ..Self::default()
        }
    }

    pub(crate) fn recover(poisoned: PoisonError<MutexGuard<Self>>) -> MutexGuard<Self> {
        log::error!("{}", &poisoned);
        poisoned.into_inner()
    }

    pub(crate) fn has(&self, id: &UserId) -> bool {
        self.in_stream.contains(id) || self.in_queue.contains(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.in_stream.len() + self.in_queue.len()
    }

    pub(crate) fn spare(&self) -> usize {
        self.max_users.saturating_sub(self.len())
    }

    pub(crate) fn users(&self) -> Vec<UserId> {
        self.in_stream
            .ids()
            .iter()
            .chain(self.in_queue.ids())
            .cloned()
            .collect()
    }

    /// Queues every id or none: each must be new and the total must fit.
    pub(crate) fn enqueue(&mut self, ids: &[UserId]) -> Result<(), SiteErr> {
        let requested = self.len() + ids.len();
        if requested > self.max_users {
            return Err(SiteErr::TooManyUsers {
                requested,
                max: self.max_users,
            });
        }
        let mut batch = HashSet::with_capacity(ids.len());
        for id in ids {
            if self.has(id) || !batch.insert(id) {
                return Err(SiteErr::AlreadyPresent(id.clone()));
            }
        }
        for id in ids {
            self.in_queue.insert(id.clone());
            self.failed.retain(|failed| failed != id);
        }
        Ok(())
    }

    pub(crate) fn remove(&mut self, id: &UserId) -> bool {
        self.in_stream.remove(id) | self.in_queue.remove(id)
    }

    /// Moves everyone back to the queue, confirmed users first, for a fresh connection.
    pub(crate) fn requeue(&mut self) -> Vec<UserId> {
        let mut users = self.in_stream.take();
        users.extend(self.in_queue.take());
        for id in &users {
            self.in_queue.insert(id.clone());
        }
        users
    }

    /// Settles a batch once the server has said who it is actually following.
    ///
    /// Returns `(added, failed)`.  Ids no longer in the queue (removed meanwhile, or already
    /// settled) are ignored.
    pub(crate) fn confirm(
        &mut self,
        batch: &[UserId],
        following: impl Fn(&UserId) -> bool,
    ) -> (Vec<UserId>, Vec<UserId>) {
        let (mut added, mut failed) = (Vec::new(), Vec::new());
        for id in batch.iter().filter(|id| self.in_queue.contains(id)) {
            if following(id) {
                added.push(id.clone());
            } else {
                failed.push(id.clone());
            }
        }
        for id in &added {
            self.in_queue.remove(id);
            self.in_stream.insert(id.clone());
        }
        for id in &failed {
            self.in_queue.remove(id);
        }
        self.failed.extend(failed.iter().cloned());
        (added, failed)
    }
}
