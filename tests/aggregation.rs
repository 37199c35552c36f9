use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use route_latency::latency::report::{build_report, OverallMean, Report};
use route_latency::latency::Aggregator;
use route_latency::store::{AggregateStore, Keys, MemoryStore};

fn setup() -> (Arc<MemoryStore>, Arc<Aggregator>) {
    let store = Arc::new(MemoryStore::new());
    let agg = Arc::new(Aggregator::new(
        store.clone(),
        Keys::new("it"),
        Duration::from_millis(5000),
    ));
    (store, agg)
}

async fn report(store: &MemoryStore, agg: &Aggregator) -> Report {
    build_report(store, agg.keys(), 100).await.unwrap()
}

#[tokio::test]
async fn home_about_scenario() {
    let (store, agg) = setup();
    agg.record("/home", 100.0);
    agg.record("/home", 200.0);
    agg.record("/about", 50.0);
    agg.flush_now().await.unwrap();

    let report = report(&store, &agg).await;
    let rows: Vec<_> = report
        .entries
        .iter()
        .map(|e| (e.route.as_str(), e.average, e.count))
        .collect();
    assert_eq!(rows, [("/home", 150.0, 2), ("/about", 50.0, 1)]);
    assert_eq!(report.overall_mean, OverallMean::Value(100.0));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["overall_mean"], 100.0);
    assert_eq!(json["entries"][0]["route"], "/home");
    assert_eq!(json["settings"]["enabled"], false);
}

#[tokio::test]
async fn empty_report_is_na() {
    let (store, agg) = setup();
    let report = report(&store, &agg).await;
    assert!(report.entries.is_empty());
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["overall_mean"], "n/a");
}

#[tokio::test]
async fn interleaving_order_does_not_matter() {
    let mut samples = Vec::new();
    for i in 0..60u32 {
        let route = format!("/r{}", i % 4);
        samples.push((route, f64::from(i) * 1.5));
    }

    let (store_a, agg_a) = setup();
    for (route, ms) in &samples {
        agg_a.record(route.as_str(), *ms);
    }
    agg_a.flush_now().await.unwrap();

    let (store_b, agg_b) = setup();
    let mut shuffled = samples.clone();
    shuffled.shuffle(&mut StdRng::seed_from_u64(7));
    for (i, (route, ms)) in shuffled.iter().enumerate() {
        agg_b.record(route.as_str(), *ms);
        if i % 9 == 0 {
            agg_b.flush_now().await.unwrap();
        }
    }
    agg_b.flush_now().await.unwrap();

    assert_eq!(report(&store_a, &agg_a).await, report(&store_b, &agg_b).await);
}

#[tokio::test]
async fn limit_keeps_the_slowest_routes() {
    let (store, agg) = setup();
    for i in 1..=20u32 {
        agg.record(format!("/r{i}"), f64::from(i));
    }
    agg.flush_now().await.unwrap();

    let report = build_report(store.as_ref(), agg.keys(), 3).await.unwrap();
    let routes: Vec<_> = report.entries.iter().map(|e| e.route.as_str()).collect();
    assert_eq!(routes, ["/r20", "/r19", "/r18"]);
    assert_eq!(report.overall_mean, OverallMean::Value(19.0));
}

#[tokio::test]
async fn clear_twice_then_empty() {
    let (store, agg) = setup();
    agg.record("/a", 1.0);
    agg.flush_now().await.unwrap();

    agg.clear_all().await.unwrap();
    agg.clear_all().await.unwrap();

    assert!(report(&store, &agg).await.entries.is_empty());
    // Only route keys are cleared
    let counts = store
        .hash_get_many(&agg.keys().counts, &["/a".to_owned()])
        .await
        .unwrap();
    assert_eq!(counts, vec![None]);
}

#[tokio::test]
async fn independent_aggregators_share_nothing_but_the_store() {
    let store = Arc::new(MemoryStore::new());
    let keys = Keys::new("shared");
    let a = Aggregator::new(store.clone(), keys.clone(), Duration::from_secs(5));
    let b = Aggregator::new(store.clone(), keys.clone(), Duration::from_secs(5));

    a.record("/x", 10.0);
    b.record("/x", 30.0);
    assert_eq!(a.pending_routes(), 1);
    a.flush_now().await.unwrap();
    assert_eq!(b.pending_routes(), 1);
    b.flush_now().await.unwrap();

    let report = build_report(store.as_ref(), &keys, 10).await.unwrap();
    assert_eq!(report.entries[0].average, 20.0);
    assert_eq!(report.entries[0].count, 2);
}
