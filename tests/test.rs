use firehose::config;
use firehose::event::message::{Message, Route};
use firehose::event::{Event, UserId};
use firehose::request::{ErrorKind, Request, Response, StatusErr, Transport, TransportErr};
use firehose::response::{dispatch, Decoder, Dedup, SharedDedup};
use firehose::stream::ParamErr;
use firehose::Client;

use futures::future::{self, BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use hashbrown::HashMap;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

const STREAM_SAMPLE: &str = include_str!("../test_data/stream_sample.jsonl");

type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

fn events_for(raw: Value, dedup: &SharedDedup) -> Vec<Event> {
    let mut events = Vec::new();
    dispatch(raw, dedup, &mut |event| events.push(event));
    events
}

fn names(events: &[Event]) -> Vec<String> {
    events.iter().map(Event::name).collect()
}

#[test]
fn a_delete_names_the_status_and_its_author() {
    let events = events_for(
        json!({"delete": {"status": {"id_str": "1234", "user_id_str": "3"}}}),
        &Dedup::shared(10),
    );

    assert_eq!(names(&events), ["data", "delete"]);
    match events[1].message() {
        Some(Message::Delete(delete)) => {
            assert_eq!(
                (delete.id_str.as_deref(), delete.user_id_str.as_deref()),
                (Some("1234"), Some("3"))
            );
        }
        other => panic!("expected a delete, got {:?}", other),
    }
}

#[test]
fn a_reply_by_screen_name_is_a_mention() {
    let tweet = json!({"text": "hi", "in_reply_to_screen_name": "pie"});
    let events = events_for(tweet.clone(), &Dedup::shared(10));

    assert_eq!(names(&events), ["data", "tweet", "tweet:mention", "tweet:mention:pie"]);
    for event in &events[1..] {
        match event.message() {
            Some(Message::Tweet { tweet: body, .. }) => assert_eq!(**body, tweet),
            other => panic!("expected a tweet, got {:?}", other),
        }
    }
}

#[test]
fn only_the_first_delivery_of_a_tweet_is_unique() {
    let dedup = Dedup::shared(10);
    let tweet = json!({"id_str": "99", "text": "once"});

    assert_eq!(names(&events_for(tweet.clone(), &dedup)), ["data", "tweet", "unique:tweet"]);
    assert_eq!(names(&events_for(tweet, &dedup)), ["data", "tweet"]);
}

#[test]
fn the_oldest_tweet_id_is_forgotten_past_capacity() {
    let dedup = Dedup::shared(5000);
    let tweet = |n: usize| json!({"id_str": n.to_string(), "text": "numbered"});
    for n in 0..=5000 {
        events_for(tweet(n), &dedup);
    }

    assert!(names(&events_for(tweet(0), &dedup)).contains(&"unique:tweet".to_string()));
    assert!(!names(&events_for(tweet(5000), &dedup)).contains(&"unique:tweet".to_string()));
}

#[test]
fn the_sample_decodes_and_classifies() {
    let dedup = Dedup::shared(5000);
    let mut decoder = Decoder::new();
    let mut events = Vec::new();
    for piece in STREAM_SAMPLE.as_bytes().chunks(7) {
        decoder.push(piece);
        for value in decoder.by_ref() {
            let value = value.expect("the sample is valid JSON");
            dispatch(value, &dedup, &mut |event| events.push(event));
        }
    }

    let names = names(&events);
    let count = |name: &str| names.iter().filter(|n| *n == name).count();
    assert_eq!(count("data"), 10);
    assert_eq!(count("tweet"), 5);
    assert_eq!(count("unique:tweet"), 4);
    assert_eq!(count("tweet:retweet:1050118621198921728"), 1);
    assert_eq!(count("tweet:reply:1050118621198921728"), 1);
    assert_eq!(count("tweet:mention:TwitterDev"), 1);
    assert_eq!(count("tweet:mention:TwitterAPI"), 1);
    assert_eq!(count("favorite"), 1);
    assert!(events.iter().all(|e| !matches!(e, Event::Error(_))));

    let for_user: UserId = "1888".parse().expect("valid id");
    let routed = events
        .iter()
        .filter(|e| matches!(e, Event::Message { for_user: Some(user), .. } if user == &for_user))
        .count();
    assert_eq!(routed, 1 + 6);
    assert!(events.iter().any(|e| matches!(
        e.message(),
        Some(Message::Tweet { route: Route::MentionOf(name), .. }) if name == "someone"
    )));
}

#[test]
fn unrecognized_messages_are_reported_not_fatal() {
    let events = events_for(json!({"something_new": true}), &Dedup::shared(10));
    assert_eq!(names(&events), ["data", "error"]);
}

#[test]
fn the_status_table_names_each_failure() {
    let rate_limited = StatusErr::new(420);
    assert_eq!(rate_limited.kind, ErrorKind::RateLimited);
    assert_eq!(rate_limited.kind.to_string(), "Rate Limited");
    assert_eq!(ErrorKind::from_status(401), ErrorKind::Unauthorized);
    assert_eq!(ErrorKind::from_status(413), ErrorKind::TooLong);
    assert_eq!(ErrorKind::from_status(418), ErrorKind::Http);
}

#[test]
fn config_comes_from_the_environment() -> TestResult {
    let mut env = HashMap::new();
    env.insert("MAX_REQUESTS_PER_SECOND".to_string(), "5".to_string());
    env.insert("MAX_USERS".to_string(), "200".to_string());

    let cfg = config::from_env(env)?;
    assert_eq!(*cfg.max_requests_per_second, 5);
    assert_eq!(*cfg.max_users, 200);
    assert_eq!(*cfg.max_initial_users, 100);

    let mut env = HashMap::new();
    env.insert("MAX_REQUESTS_PER_SECOND".to_string(), "0".to_string());
    assert!(config::from_env(env).is_err());
    Ok(())
}

#[test]
fn user_ids_are_numeric_strings() {
    assert!("12345".parse::<UserId>().is_ok());
    assert!("".parse::<UserId>().is_err());
    assert!("12a".parse::<UserId>().is_err());
    assert_eq!(UserId::from_value(&json!(42)).map(|id| id.to_string()), Some("42".to_string()));
    assert_eq!(UserId::from_value(&json!("42")).map(|id| id.to_string()), Some("42".to_string()));
}

/// Answers every request with the same body, cut into fixed pieces, that then stays open.
struct Replay {
    pieces: Vec<Vec<u8>>,
    sent: Mutex<Vec<Request>>,
}

impl Transport for Replay {
    fn send(&self, request: Request) -> BoxFuture<'static, Result<Response, TransportErr>> {
        self.sent.lock().expect("test lock").push(request);
        let pieces: Vec<Result<Vec<u8>, TransportErr>> = self.pieces.iter().cloned().map(Ok).collect();
        let body = stream::iter(pieces).chain(stream::pending()).boxed();
        future::ready(Ok(Response { status: 200, body })).boxed()
    }
}

#[tokio::test(start_paused = true)]
async fn a_sample_stream_reports_everything_it_reads() -> TestResult {
    let transport = Arc::new(Replay {
        pieces: STREAM_SAMPLE.as_bytes().chunks(100).map(<[u8]>::to_vec).collect(),
        sent: Mutex::new(Vec::new()),
    });
    let client = Client::with_transport(config::Config::default(), transport.clone());
    let (stream, mut events) = client.sample_stream(Default::default());

    let mut seen: Vec<String> = Vec::new();
    while seen.iter().filter(|name| name.as_str() == "data").count() < 10 {
        match events.recv().await {
            Some(event) => seen.push(event.name()),
            None => panic!("the stream shut down"),
        }
    }

    assert_eq!(seen[..2], ["beforeConnect", "connect"]);
    assert!(stream.is_connected());
    let sent = transport.sent.lock().expect("test lock").clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].url.path(), "/1.1/statuses/sample.json");
    assert_eq!(sent[0].params["stall_warnings"], "true");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn list_parameters_reject_bad_edits() -> TestResult {
    let transport = Arc::new(Replay {
        pieces: Vec::new(),
        sent: Mutex::new(Vec::new()),
    });
    let client = Client::with_transport(config::Config::default(), transport);
    let (stream, _events) = client.public_stream(Default::default());

    stream.track(&["rust", "tokio"])?;
    assert_eq!(stream.track_list(), ["rust", "tokio"]);
    assert_eq!(stream.untrack(&["go"]), Err(ParamErr::NotPresent {
        param: "track".to_string(),
        term: "go".to_string(),
    }));
    assert_eq!(stream.untrack(&["go"]).map_err(|e| e.to_string()), Err("Not tracking go".to_string()));
    assert!(matches!(stream.track(&["a,b"]), Err(ParamErr::InvalidTerm(_))));
    stream.untrack(&["rust", "tokio"])?;
    assert!(!stream.params().contains_key("track"));
    Ok(())
}
