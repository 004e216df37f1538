//! Classifying decoded values into [`Event`]s.
//!
//! Every value is first reported raw as [`Event::Data`].  Site stream values wrap the real
//! message in a `{"for_user": .., "message": ..}` envelope, which is unwrapped so that every
//! derived event names the subscriber it was delivered for.  The message is then matched, in
//! order, against the housekeeping kinds in `CONTROL_MESSAGES`, user-stream social events,
//! disconnect notices, and finally tweets.  Whatever is left over is an error.
use super::{Dedup, SharedDedup};
use crate::err::Error;
use crate::event::message::*;
use crate::event::{Event, UserId};

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

#[cfg(test)]
mod test;

type Extract = fn(&Value) -> Result<Message, serde_json::Error>;

/// Top-level keys that mark housekeeping messages, with how to read each payload.
const CONTROL_MESSAGES: [(&str, Extract); 8] = [
    ("warning", warning),
    ("control", control),
    ("delete", delete),
    ("scrub_geo", scrub_geo),
    ("limit", limit),
    ("status_withheld", status_withheld),
    ("user_withheld", user_withheld),
    ("friends", friends),
];

fn warning(v: &Value) -> Result<Message, serde_json::Error> {
    Warning::deserialize(v).map(Message::Warning)
}
fn control(v: &Value) -> Result<Message, serde_json::Error> {
    Control::deserialize(v).map(Message::Control)
}
fn delete(v: &Value) -> Result<Message, serde_json::Error> {
    #[derive(Deserialize)]
    struct Body {
        #[serde(default)]
        status: Delete,
    }
    Body::deserialize(v).map(|body| Message::Delete(body.status))
}
fn scrub_geo(v: &Value) -> Result<Message, serde_json::Error> {
    ScrubGeo::deserialize(v).map(Message::ScrubGeo)
}
fn limit(v: &Value) -> Result<Message, serde_json::Error> {
    Limit::deserialize(v).map(Message::Limit)
}
fn status_withheld(v: &Value) -> Result<Message, serde_json::Error> {
    StatusWithheld::deserialize(v).map(Message::StatusWithheld)
}
fn user_withheld(v: &Value) -> Result<Message, serde_json::Error> {
    UserWithheld::deserialize(v).map(Message::UserWithheld)
}
fn friends(v: &Value) -> Result<Message, serde_json::Error> {
    Ok(Message::Friends(Arc::new(v.clone())))
}

/// The fields that decide how a tweet is routed.
#[derive(Deserialize, Default)]
#[serde(default)]
struct TweetFields {
    id_str: Option<String>,
    retweeted_status: Option<RetweetedStatus>,
    in_reply_to_status_id_str: Option<String>,
    in_reply_to_screen_name: Option<String>,
    entities: Option<Entities>,
}

#[derive(Deserialize)]
struct RetweetedStatus {
    id_str: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Entities {
    user_mentions: Option<Vec<Mention>>,
}

#[derive(Deserialize)]
struct Mention {
    screen_name: String,
}

impl TweetFields {
    fn routes(self) -> Vec<Route> {
        let mut routes = vec![Route::Tweet];
        if let Some(retweeted) = self.retweeted_status {
            routes.push(Route::Retweet);
            routes.push(Route::RetweetOf(retweeted.id_str));
        }
        if let Some(id) = self.in_reply_to_status_id_str {
            routes.push(Route::Reply);
            routes.push(Route::ReplyTo(id));
        }
        if let Some(name) = self.in_reply_to_screen_name {
            routes.push(Route::Mention);
            routes.push(Route::MentionOf(name));
        } else if let Some(mentions) = self.entities.and_then(|e| e.user_mentions) {
            for mention in mentions {
                routes.push(Route::Mention);
                routes.push(Route::MentionOf(mention.screen_name));
            }
        }
        routes
    }
}

fn is_present(value: Option<&Value>) -> bool {
    value.map_or(false, |v| !v.is_null())
}

/// Classifies one decoded value, passing every resulting event to `emit`.
pub fn dispatch(raw: Value, dedup: &SharedDedup, emit: &mut dyn FnMut(Event)) {
    let raw = Arc::new(raw);
    emit(Event::Data(raw.clone()));

    let envelope = match (raw.get("for_user"), raw.get("message")) {
        (Some(user), Some(message)) if !user.is_null() && !message.is_null() => {
            Some((Arc::new(message.clone()), UserId::from_value(user)))
        }
        _ => None,
    };
    let (body, for_user) = match envelope {
        Some(unwrapped) => unwrapped,
        None => (raw, None),
    };
    match classify(body, dedup) {
        Ok(messages) => {
            for message in messages {
                emit(Event::Message {
                    message,
                    for_user: for_user.clone(),
                })
            }
        }
        Err(e) => emit(Event::Error(e)),
    }
}

fn classify(body: Arc<Value>, dedup: &SharedDedup) -> Result<Vec<Message>, Error> {
    for &(kind, extract) in CONTROL_MESSAGES.iter() {
        if let Some(payload) = body.get(kind).filter(|v| !v.is_null()) {
            let message = extract(payload).map_err(|inner| Error::MalformedMessage { kind, inner })?;
            return Ok(vec![message]);
        }
    }

    if is_present(body.get("event")) {
        let social = Social::from_value(&body).map_err(|inner| Error::MalformedMessage {
            kind: "event",
            inner,
        })?;
        return Ok(vec![Message::Social(social)]);
    }

    if let Some(payload) = body.get("disconnect").filter(|v| !v.is_null()) {
        let disconnect = Disconnect::from_value(payload).map_err(|inner| Error::MalformedMessage {
            kind: "disconnect",
            inner,
        })?;
        log::warn!(
            "Stream disconnected by the server: {} ({})",
            disconnect.reason.name(),
            disconnect.code
        );
        let named = Message::Disconnected {
            reason: disconnect.reason.clone(),
            stream_name: disconnect.stream_name.clone(),
        };
        return Ok(vec![Message::Disconnect(disconnect), named]);
    }

    if is_present(body.get("text")) {
        let fields = TweetFields::deserialize(&*body).unwrap_or_else(|e| {
            log::debug!("Routing a tweet as a plain tweet: {}", e);
            TweetFields::default()
        });
        let unique = match &fields.id_str {
            Some(id) => dedup.lock().unwrap_or_else(Dedup::recover).check(id),
            None => false,
        };
        let mut messages = Vec::new();
        for route in fields.routes() {
            messages.push(Message::Tweet {
                route: route.clone(),
                unique: false,
                tweet: body.clone(),
            });
            if unique {
                messages.push(Message::Tweet {
                    route,
                    unique: true,
                    tweet: body.clone(),
                });
            }
        }
        return Ok(messages);
    }

    log::warn!("Unrecognized message: {}", body);
    Err(Error::UnrecognizedMessage(body))
}
