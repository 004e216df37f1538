use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use strum::{AsRefStr, EnumString};

/// `created_at` as the APIs write it: `Wed Aug 27 13:08:45 +0000 2008`.
const CREATED_AT: &str = "%a %b %d %H:%M:%S %z %Y";

#[derive(Debug, Clone, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum SocialKind {
    Block,
    Unblock,
    Favorite,
    Unfavorite,
    Follow,
    Unfollow,
    ListCreated,
    ListDestroyed,
    ListUpdated,
    ListMemberAdded,
    ListMemberRemoved,
    ListUserSubscribed,
    ListUserUnsubscribed,
    UserUpdate,
    AccessRevoked,
    QuotedTweet,
    FavoritedRetweet,
    RetweetedRetweet,
    Mute,
    Unmute,
    #[strum(default)]
    Other(String),
}

impl SocialKind {
    pub fn name(&self) -> &str {
        match self {
            SocialKind::Other(name) => name,
            known => known.as_ref(),
        }
    }
}

/// A user-stream event such as a follow or a favorite.
///
/// `target` is dropped when it is the same user as `source`, as it is for most list events,
/// and a `user_update` carries its `source` alone.
#[derive(Debug, Clone, PartialEq)]
pub struct Social {
    pub kind: SocialKind,
    pub source: Option<Value>,
    pub target: Option<Value>,
    pub target_object: Option<Value>,
    pub created_at: Option<DateTime<FixedOffset>>,
}

#[derive(Deserialize)]
struct RawSocial {
    event: String,
    source: Option<Value>,
    target: Option<Value>,
    target_object: Option<Value>,
    created_at: Option<String>,
}

impl Social {
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        let raw = RawSocial::deserialize(value)?;
        let kind = SocialKind::from_str(&raw.event).unwrap_or(SocialKind::Other(raw.event));

        let target = match (&raw.source, raw.target) {
            _ if kind == SocialKind::UserUpdate => None,
            (Some(source), Some(target)) if source["id_str"] == target["id_str"] => None,
            (_, target) => target,
        };
        let source = raw.source;
        let created_at = raw
            .created_at
            .and_then(|at| DateTime::parse_from_str(&at, CREATED_AT).ok());

        Ok(Self {
            kind,
            source,
            target,
            target_object: raw.target_object.filter(|obj| !obj.is_null()),
            created_at,
        })
    }
}
