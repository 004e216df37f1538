use super::*;
use crate::config::{ExponentialBackoffMax, LinearBackoffMax};
use tokio::time::Instant;

fn retries(events: &[Event]) -> Vec<(Duration, u32, u32)> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Retry {
                delay,
                attempt,
                retries,
                ..
            } => Some((*delay, *attempt, *retries)),
            _ => None,
        })
        .collect()
}

fn maxed(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, Event::RetryMax { .. }))
        .count()
}

async fn fire(retry: &mut Retry, ticks: &mut mpsc::UnboundedReceiver<Tick>) -> Duration {
    let t0 = Instant::now();
    match ticks.recv().await {
        Some(Tick::Fire(key)) => assert!(retry.fired(&key)),
        other => panic!("expected a retry to fire, got {:?}", other),
    }
    Instant::now() - t0
}

#[tokio::test(start_paused = true)]
async fn exponential_delays_double_until_capped() {
    let cfg = Config {
        exponential_max: ExponentialBackoffMax(Duration::from_secs(20)),
        ..Config::default()
    };
    let (mut retry, mut ticks) = Retry::new(&cfg);
    let mut events = Vec::new();

    let mut waited = Vec::new();
    for _ in 0..4 {
        retry.schedule(Algorithm::Exponential, Operation::Connect, &mut |e| events.push(e));
        waited.push(fire(&mut retry, &mut ticks).await);
    }

    let secs = Duration::from_secs;
    assert_eq!(
        retries(&events),
        vec![(secs(5), 1, 0), (secs(10), 2, 0), (secs(20), 3, 0), (secs(20), 4, 0)]
    );
    assert_eq!(waited, vec![secs(5), secs(10), secs(20), secs(20)]);
    assert_eq!(maxed(&events), 2);
}

#[tokio::test(start_paused = true)]
async fn linear_delays_grow_by_the_start_delay() {
    let cfg = Config {
        linear_max: LinearBackoffMax(Duration::from_millis(600)),
        ..Config::default()
    };
    let (mut retry, mut ticks) = Retry::new(&cfg);
    let mut events = Vec::new();

    for _ in 0..3 {
        retry.schedule(Algorithm::Linear, Operation::Connect, &mut |e| events.push(e));
        fire(&mut retry, &mut ticks).await;
    }

    let millis = Duration::from_millis;
    let delays: Vec<_> = retries(&events).into_iter().map(|(d, _, _)| d).collect();
    assert_eq!(delays, vec![millis(250), millis(500), millis(600)]);
    assert_eq!(maxed(&events), 1);
}

#[tokio::test(start_paused = true)]
async fn a_retry_requested_while_one_is_pending_is_coalesced() {
    let (mut retry, mut ticks) = Retry::new(&Config::default());
    let mut events = Vec::new();

    retry.schedule(Algorithm::Linear, Operation::Connect, &mut |e| events.push(e));
    retry.schedule(Algorithm::Linear, Operation::Connect, &mut |e| events.push(e));
    assert!(retry.is_pending(&Operation::Connect));
    fire(&mut retry, &mut ticks).await;

    assert_eq!(retries(&events).len(), 1);
    assert!(!retry.is_pending(&Operation::Connect));
}

#[tokio::test(start_paused = true)]
async fn algorithms_and_operations_back_off_independently() {
    let (mut retry, _ticks) = Retry::new(&Config::default());
    let mut events = Vec::new();
    let batch = Operation::AddUsers(vec!["1".parse().expect("valid id")]);

    retry.schedule(Algorithm::Linear, Operation::Connect, &mut |e| events.push(e));
    retry.schedule(Algorithm::Exponential, Operation::Connect, &mut |e| events.push(e));
    retry.schedule(Algorithm::Exponential, batch.clone(), &mut |e| events.push(e));

    assert_eq!(retries(&events).len(), 3);
    assert!(retry.is_pending(&batch));
}

#[tokio::test(start_paused = true)]
async fn a_quiet_period_after_firing_resets_the_backoff() {
    let (mut retry, mut ticks) = Retry::new(&Config::default());
    let mut events = Vec::new();

    retry.schedule(Algorithm::Exponential, Operation::Connect, &mut |e| events.push(e));
    fire(&mut retry, &mut ticks).await;
    retry.schedule(Algorithm::Exponential, Operation::Connect, &mut |e| events.push(e));
    fire(&mut retry, &mut ticks).await;

    let t0 = Instant::now();
    match ticks.recv().await {
        Some(Tick::Reset(key)) => retry.reset(&key),
        other => panic!("expected a reset, got {:?}", other),
    }
    assert_eq!(Instant::now() - t0, Duration::from_secs(30));

    retry.schedule(Algorithm::Exponential, Operation::Connect, &mut |e| events.push(e));
    assert_eq!(
        retries(&events).last(),
        Some(&(Duration::from_secs(5), 1, 1))
    );
}

#[tokio::test(start_paused = true)]
async fn cancelled_retries_never_fire() {
    let (mut retry, mut ticks) = Retry::new(&Config::default());
    let mut events = Vec::new();

    retry.schedule(Algorithm::Exponential, Operation::Connect, &mut |e| events.push(e));
    retry.cancel(&Operation::Connect);

    assert!(!retry.is_pending(&Operation::Connect));
    assert!(time::timeout(Duration::from_secs(60), ticks.recv())
        .await
        .is_err());
}

#[tokio::test(start_paused = true)]
async fn recovered_batches_are_forgotten() {
    let (mut retry, mut ticks) = Retry::new(&Config::default());
    let mut events = Vec::new();
    let batch = |id: &str| Operation::AddUsers(vec![id.parse().expect("valid id")]);

    retry.schedule(Algorithm::Linear, Operation::Connect, &mut |e| events.push(e));
    fire(&mut retry, &mut ticks).await;
    for id in ["1", "2"] {
        retry.schedule(Algorithm::Exponential, batch(id), &mut |e| events.push(e));
        fire(&mut retry, &mut ticks).await;
    }
    assert_eq!(retry.tracked(), 3);

    for _ in 0..3 {
        match ticks.recv().await {
            Some(Tick::Reset(key)) => retry.reset(&key),
            other => panic!("expected a reset, got {:?}", other),
        }
    }

    assert_eq!(retry.tracked(), 1);
    retry.schedule(Algorithm::Linear, Operation::Connect, &mut |e| events.push(e));
    assert_eq!(
        retries(&events).last(),
        Some(&(Duration::from_millis(250), 1, 1))
    );
}
