//! Load testing for the event relay.

use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

mod common;

use common::{client, start_programmable_upstream, start_relay, test_config};

/// Tracks concurrent event fetches seen by the upstream.
#[derive(Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_fanout_respects_concurrency_limit() {
    let in_flight = Arc::new(InFlight::default());
    let tracker = in_flight.clone();
    let upstream = start_programmable_upstream(move |req| {
        let tracker = tracker.clone();
        async move {
            if req.path.starts_with("/getUserById/") {
                let ids: Vec<u32> = (1..=20).collect();
                return (200, json!({ "events": ids }).to_string());
            }
            tracker.enter();
            tokio::time::sleep(Duration::from_millis(50)).await;
            tracker.exit();
            let id = req.path.trim_start_matches("/getEventById/").to_string();
            (200, json!({ "id": id }).to_string())
        }
    })
    .await;

    let mut config = test_config(upstream);
    config.fanout.concurrency = 5;
    let relay = start_relay(config).await;

    let start = Instant::now();
    let res = client().get(relay.url("/getEventsByUserId/1")).send().await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(res.status(), 200);
    let events: Vec<Value> = res.json().await.unwrap();
    let ids: Vec<String> = events.iter().map(|e| e["id"].as_str().unwrap().to_string()).collect();
    let expected: Vec<String> = (1..=20).map(|i| i.to_string()).collect();
    assert_eq!(ids, expected);

    let peak = in_flight.peak.load(Ordering::SeqCst);
    assert!(peak <= 5, "peak concurrency {} exceeded limit", peak);
    assert!(peak > 1, "fan-out ran serially");
    // 20 fetches at 5 wide: about four rounds, well under the serial 1s.
    assert!(elapsed < Duration::from_millis(900), "took {:?}", elapsed);
}

#[tokio::test]
async fn test_concurrent_writes() {
    let writes = Arc::new(AtomicUsize::new(0));
    let w = writes.clone();
    let upstream = start_programmable_upstream(move |_req| {
        w.fetch_add(1, Ordering::SeqCst);
        async { (200, r#"{"stored":true}"#.into()) }
    })
    .await;

    let relay = start_relay(test_config(upstream)).await;
    let http = client();
    let concurrency = 20;
    let requests_per_task = 10;

    let mut handles = Vec::new();
    for task in 0..concurrency {
        let http = http.clone();
        let url = relay.url("/addEvent");
        handles.push(tokio::spawn(async move {
            let mut ok = 0;
            for i in 0..requests_per_task {
                let res = http
                    .post(&url)
                    .json(&json!({ "name": format!("e{}", i), "userId": task }))
                    .send()
                    .await
                    .unwrap();
                if res.status() == 200 {
                    ok += 1;
                }
            }
            ok
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        succeeded += handle.await.unwrap();
    }

    let total = concurrency * requests_per_task;
    println!("Concurrent writes: {}/{} succeeded", succeeded, total);
    assert_eq!(succeeded, total);
    assert_eq!(writes.load(Ordering::SeqCst), total);
    assert_eq!(relay.relay.breaker().state().as_str(), "closed");
}
