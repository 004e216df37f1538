use super::*;
use serde_json::json;

fn run_with(dedup: &SharedDedup, value: Value) -> Vec<Event> {
    let mut events = Vec::new();
    dispatch(value, dedup, &mut |e| events.push(e));
    events
}

fn run(value: Value) -> Vec<Event> {
    run_with(&Dedup::shared(5000), value)
}

fn names(events: &[Event]) -> Vec<String> {
    events.iter().map(Event::name).collect()
}

fn messages(events: Vec<Event>) -> Vec<(Message, Option<UserId>)> {
    events
        .into_iter()
        .filter_map(|e| match e {
            Event::Message { message, for_user } => Some((message, for_user)),
            _ => None,
        })
        .collect()
}

#[test]
fn raw_data_is_always_reported_first() {
    let events = run(json!({"limit": {"track": 12}}));
    match &events[0] {
        Event::Data(raw) => assert_eq!(**raw, json!({"limit": {"track": 12}})),
        other => panic!("expected data, got {:?}", other),
    }
    assert_eq!(names(&events), vec!["data", "limit"]);
}

#[test]
fn deletes_carry_the_status_and_user_ids() {
    let events = run(json!({"delete": {"status": {"id_str": "1234", "user_id_str": "3"}}}));
    assert_eq!(
        messages(events),
        vec![(
            Message::Delete(Delete {
                id_str: Some("1234".into()),
                user_id_str: Some("3".into())
            }),
            None
        )]
    );
}

#[test]
fn housekeeping_messages_are_typed() {
    let cases = vec![
        (
            json!({"warning": {"code": "FALLING_BEHIND", "message": "behind", "percent_full": 60}}),
            Message::Warning(Warning {
                code: Some("FALLING_BEHIND".into()),
                message: Some("behind".into()),
                percent_full: Some(60),
            }),
        ),
        (
            json!({"control": {"control_uri": "/1.1/site/c/01_225167_334389048B872A533002B34D73F8C29FD09EFC50"}}),
            Message::Control(Control {
                control_uri: "/1.1/site/c/01_225167_334389048B872A533002B34D73F8C29FD09EFC50".into(),
            }),
        ),
        (
            json!({"scrub_geo": {"user_id_str": "14090548", "up_to_status_id_str": "23260136625"}}),
            Message::ScrubGeo(ScrubGeo {
                user_id_str: Some("14090548".into()),
                up_to_status_id_str: Some("23260136625".into()),
            }),
        ),
        (
            json!({"status_withheld": {"id_str": "1", "user_id_str": "2", "withheld_in_countries": ["DE", "AR"]}}),
            Message::StatusWithheld(StatusWithheld {
                id_str: Some("1".into()),
                user_id_str: Some("2".into()),
                withheld_in_countries: vec!["DE".into(), "AR".into()],
            }),
        ),
        (
            json!({"user_withheld": {"id_str": "2", "withheld_in_countries": ["DE"]}}),
            Message::UserWithheld(UserWithheld {
                id_str: Some("2".into()),
                withheld_in_countries: vec!["DE".into()],
            }),
        ),
        (
            json!({"friends": [1, 2, 3]}),
            Message::Friends(Arc::new(json!([1, 2, 3]))),
        ),
    ];
    for (input, expected) in cases {
        assert_eq!(messages(run(input)), vec![(expected, None)]);
    }
}

#[test]
fn withheld_notices_with_numeric_ids_are_still_reported() {
    let status = run(json!({"status_withheld": {"id": 1234, "user_id": 3, "withheld_in_countries": ["DE"]}}));
    assert_eq!(names(&status), vec!["data", "status_withheld"]);
    assert_eq!(
        messages(status),
        vec![(
            Message::StatusWithheld(StatusWithheld {
                id_str: Some("1234".into()),
                user_id_str: Some("3".into()),
                withheld_in_countries: vec!["DE".into()],
            }),
            None
        )]
    );

    let user = run(json!({"user_withheld": {"id": 3, "withheld_in_countries": ["DE"]}}));
    assert_eq!(names(&user), vec!["data", "user_withheld"]);
    assert!(matches!(
        &messages(user)[0].0,
        Message::UserWithheld(UserWithheld { id_str: Some(id), .. }) if id == "3"
    ));
}

#[test]
fn missing_ids_do_not_suppress_housekeeping_events() {
    let cases = vec![
        (json!({"delete": {"status": {"id_str": "1234"}}}), "delete"),
        (json!({"delete": {}}), "delete"),
        (json!({"scrub_geo": {"user_id": 14090548}}), "scrub_geo"),
        (json!({"warning": {"message": "behind"}}), "warning"),
        (json!({"user_withheld": {}}), "user_withheld"),
    ];
    for (input, name) in cases {
        assert_eq!(names(&run(input)), vec!["data", name]);
    }

    assert_eq!(
        messages(run(json!({"delete": {"status": {"id": 1234}}}))),
        vec![(
            Message::Delete(Delete {
                id_str: Some("1234".into()),
                user_id_str: None,
            }),
            None
        )]
    );
}

#[test]
fn a_reply_to_a_screen_name_is_a_mention() {
    let events = run(json!({"text": "hi", "in_reply_to_screen_name": "pie"}));
    assert_eq!(
        names(&events),
        vec!["data", "tweet", "tweet:mention", "tweet:mention:pie"]
    );
    for (message, _) in messages(events) {
        match message {
            Message::Tweet { tweet, .. } => {
                assert_eq!(*tweet, json!({"text": "hi", "in_reply_to_screen_name": "pie"}))
            }
            other => panic!("expected a tweet, got {:?}", other),
        }
    }
}

#[test]
fn retweets_replies_and_mentions_are_all_routed() {
    let events = run(json!({
        "text": "RT @a: hello @b @c",
        "retweeted_status": {"id_str": "77"},
        "in_reply_to_status_id_str": "55",
        "entities": {"user_mentions": [{"screen_name": "b"}, {"screen_name": "c"}]}
    }));
    assert_eq!(
        names(&events),
        vec![
            "data",
            "tweet",
            "tweet:retweet",
            "tweet:retweet:77",
            "tweet:reply",
            "tweet:reply:55",
            "tweet:mention",
            "tweet:mention:b",
            "tweet:mention",
            "tweet:mention:c",
        ]
    );
}

#[test]
fn a_named_reply_suppresses_entity_mentions() {
    let events = run(json!({
        "text": "@pie hello @b",
        "in_reply_to_screen_name": "pie",
        "entities": {"user_mentions": [{"screen_name": "pie"}, {"screen_name": "b"}]}
    }));
    assert_eq!(
        names(&events),
        vec!["data", "tweet", "tweet:mention", "tweet:mention:pie"]
    );
}

#[test]
fn first_sightings_get_unique_twins() {
    let dedup = Dedup::shared(5000);
    let tweet = json!({"text": "hello", "id_str": "9", "in_reply_to_status_id_str": "3"});

    let first = run_with(&dedup, tweet.clone());
    assert_eq!(
        names(&first),
        vec![
            "data",
            "tweet",
            "unique:tweet",
            "tweet:reply",
            "unique:tweet:reply",
            "tweet:reply:3",
            "unique:tweet:reply:3",
        ]
    );
    let second = run_with(&dedup, tweet);
    assert_eq!(
        names(&second),
        vec!["data", "tweet", "tweet:reply", "tweet:reply:3"]
    );
}

#[test]
fn the_oldest_tweet_id_is_forgotten_first() {
    let dedup = Dedup::shared(5000);
    let unique_count = |events: &[Event]| {
        events
            .iter()
            .filter(|e| e.name() == "unique:tweet")
            .count()
    };
    for id in 0..=5000 {
        let events = run_with(&dedup, json!({"text": "t", "id_str": id.to_string()}));
        assert_eq!(unique_count(&events), 1);
    }
    // "0" was the oldest of 5001 ids and has been evicted; "5000" is still remembered
    assert_eq!(unique_count(&run_with(&dedup, json!({"text": "t", "id_str": "0"}))), 1);
    assert_eq!(unique_count(&run_with(&dedup, json!({"text": "t", "id_str": "5000"}))), 0);
}

#[test]
fn site_envelopes_are_unwrapped_and_attributed() {
    let events = run(json!({
        "for_user": 1888,
        "message": {"event": "follow", "source": {"id_str": "1"}, "target": {"id_str": "1888"}}
    }));
    let mut messages = messages(events);
    assert_eq!(messages.len(), 1);
    let (message, for_user) = messages.remove(0);
    assert_eq!(for_user, Some("1888".parse().expect("valid id")));
    match message {
        Message::Social(social) => {
            assert_eq!(social.kind, SocialKind::Follow);
            assert_eq!(social.target, Some(json!({"id_str": "1888"})));
        }
        other => panic!("expected a social event, got {:?}", other),
    }
}

#[test]
fn disconnects_are_reported_generically_and_by_reason() {
    let events = run(json!({
        "disconnect": {"code": 2, "stream_name": "mondaysundayrunday-kfalter", "reason": "duplicate stream"}
    }));
    assert_eq!(names(&events), vec!["data", "disconnect", "duplicate stream"]);
    match &messages(events)[1].0 {
        Message::Disconnected {
            reason,
            stream_name,
        } => {
            assert_eq!(*reason, DisconnectReason::DuplicateStream);
            assert_eq!(stream_name.0, vec!["mondaysundayrunday", "kfalter"]);
        }
        other => panic!("expected a disconnect, got {:?}", other),
    }
}

#[test]
fn malformed_housekeeping_payloads_are_errors() {
    let events = run(json!({"limit": {"track": "lots"}}));
    assert_eq!(names(&events), vec!["data", "error"]);
    assert!(matches!(
        events[1],
        Event::Error(Error::MalformedMessage { kind: "limit", .. })
    ));
}

#[test]
fn unknown_shapes_are_errors() {
    let events = run(json!({"something": "new"}));
    match &events[1] {
        Event::Error(Error::UnrecognizedMessage(value)) => {
            assert_eq!(**value, json!({"something": "new"}))
        }
        other => panic!("expected an unrecognized message, got {:?}", other),
    }
}
