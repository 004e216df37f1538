//! Typed forms of the messages a stream can carry.
mod disconnect;
mod social;

pub use disconnect::{Disconnect, DisconnectReason, StreamName};
pub use social::{Social, SocialKind};

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Warning(Warning),
    Control(Control),
    Delete(Delete),
    ScrubGeo(ScrubGeo),
    Limit(Limit),
    StatusWithheld(StatusWithheld),
    UserWithheld(UserWithheld),
    /// The follow list sent at the start of a user stream.
    Friends(Arc<Value>),
    Social(Social),
    Disconnect(Disconnect),
    /// Sent alongside every [`Message::Disconnect`], named after its reason.
    Disconnected {
        reason: DisconnectReason,
        stream_name: StreamName,
    },
    Tweet {
        route: Route,
        /// Set on the second copy of each route when this is the first sighting of the tweet.
        unique: bool,
        tweet: Arc<Value>,
    },
}

impl Message {
    /// The conventional event name, e.g. `delete`, `follow`, or `unique:tweet:mention:pie`.
    pub fn name(&self) -> String {
        match self {
            Message::Warning(_) => "warning".into(),
            Message::Control(_) => "control".into(),
            Message::Delete(_) => "delete".into(),
            Message::ScrubGeo(_) => "scrub_geo".into(),
            Message::Limit(_) => "limit".into(),
            Message::StatusWithheld(_) => "status_withheld".into(),
            Message::UserWithheld(_) => "user_withheld".into(),
            Message::Friends(_) => "friends".into(),
            Message::Social(social) => social.kind.name().into(),
            Message::Disconnect(_) => "disconnect".into(),
            Message::Disconnected { reason, .. } => reason.name().into(),
            Message::Tweet { route, unique: false, .. } => route.to_string(),
            Message::Tweet { route, unique: true, .. } => format!("unique:{}", route),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Warning {
    pub code: Option<String>,
    pub message: Option<String>,
    pub percent_full: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Control {
    pub control_uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "Ids")]
pub struct Delete {
    pub id_str: Option<String>,
    pub user_id_str: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "Ids")]
pub struct ScrubGeo {
    pub user_id_str: Option<String>,
    pub up_to_status_id_str: Option<String>,
}

/// More tweets matched a filter than the stream could deliver.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Limit {
    pub track: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "Ids")]
pub struct StatusWithheld {
    pub id_str: Option<String>,
    pub user_id_str: Option<String>,
    pub withheld_in_countries: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "Ids")]
pub struct UserWithheld {
    pub id_str: Option<String>,
    pub withheld_in_countries: Vec<String>,
}

/// The ids a housekeeping payload can carry.  Each may come as its `*_str` field, as the bare
/// integer field, or not at all.
#[derive(Deserialize, Default)]
#[serde(default)]
struct Ids {
    #[serde(deserialize_with = "any_id")]
    id_str: Option<String>,
    #[serde(deserialize_with = "any_id")]
    id: Option<String>,
    #[serde(deserialize_with = "any_id")]
    user_id_str: Option<String>,
    #[serde(deserialize_with = "any_id")]
    user_id: Option<String>,
    #[serde(deserialize_with = "any_id")]
    up_to_status_id_str: Option<String>,
    #[serde(deserialize_with = "any_id")]
    up_to_status_id: Option<String>,
    withheld_in_countries: Vec<String>,
}

fn any_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(id)) => Some(id),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    })
}

impl From<Ids> for Delete {
    fn from(ids: Ids) -> Self {
        Self {
            id_str: ids.id_str.or(ids.id),
            user_id_str: ids.user_id_str.or(ids.user_id),
        }
    }
}

impl From<Ids> for ScrubGeo {
    fn from(ids: Ids) -> Self {
        Self {
            user_id_str: ids.user_id_str.or(ids.user_id),
            up_to_status_id_str: ids.up_to_status_id_str.or(ids.up_to_status_id),
        }
    }
}

impl From<Ids> for StatusWithheld {
    fn from(ids: Ids) -> Self {
        Self {
            id_str: ids.id_str.or(ids.id),
            user_id_str: ids.user_id_str.or(ids.user_id),
            withheld_in_countries: ids.withheld_in_countries,
        }
    }
}

impl From<Ids> for UserWithheld {
    fn from(ids: Ids) -> Self {
        Self {
            id_str: ids.id_str.or(ids.id),
            withheld_in_countries: ids.withheld_in_countries,
        }
    }
}

/// Which facet of a tweet a [`Message::Tweet`] reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Tweet,
    Retweet,
    /// Keyed by the id of the retweeted tweet.
    RetweetOf(String),
    Reply,
    /// Keyed by the id of the tweet replied to.
    ReplyTo(String),
    Mention,
    /// Keyed by screen name.
    MentionOf(String),
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Route::Tweet => write!(f, "tweet"),
            Route::Retweet => write!(f, "tweet:retweet"),
            Route::RetweetOf(id) => write!(f, "tweet:retweet:{}", id),
            Route::Reply => write!(f, "tweet:reply"),
            Route::ReplyTo(id) => write!(f, "tweet:reply:{}", id),
            Route::Mention => write!(f, "tweet:mention"),
            Route::MentionOf(name) => write!(f, "tweet:mention:{}", name),
        }
    }
}
