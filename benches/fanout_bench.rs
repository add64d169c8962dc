//! Benchmarks for publish fan-out and query parsing
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use gqlws::connection::ChannelConnection;
use gqlws::graphql::{self, Schema};
use gqlws::protocol::StartPayload;
use gqlws::subscriptions::SubscriptionsManager;
use serde_json::json;
use std::sync::Arc;

const SUBSCRIPTION: &str = "subscription ($room: String) { onMessage { room body author { name } } }";

fn manager_with_subscribers(
    count: usize,
    filtered: bool,
) -> (
    SubscriptionsManager,
    Vec<tokio::sync::mpsc::UnboundedReceiver<String>>,
) {
    let schema = Schema::builder().passthrough_subscription("onMessage").build();
    let mut manager = SubscriptionsManager::new(Arc::new(schema));
    if filtered {
        manager = manager.with_filter("onMessage", |payload, variables, _| {
            Ok(variables.map(|v| v["room"] == payload["room"]).unwrap_or(true))
        });
    }

    let mut receivers = Vec::with_capacity(count);
    for i in 0..count {
        let (conn, rx) = ChannelConnection::channel(format!("conn-{}", i));
        let room = if i % 10 == 0 { "hot" } else { "cold" };
        manager.handle_start(
            &conn,
            "1".to_string(),
            StartPayload::new(SUBSCRIPTION).with_variables(json!({ "room": room })),
        );
        receivers.push(rx);
    }

    (manager, receivers)
}

fn drain(receivers: &mut [tokio::sync::mpsc::UnboundedReceiver<String>]) {
    for rx in receivers {
        while rx.try_recv().is_ok() {}
    }
}

fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish");
    let payload = json!({"room": "hot", "body": "hello", "author": {"name": "ada", "id": 7}});

    for size in [10, 100, 1000] {
        group.throughput(Throughput::Elements(size as u64));

        let (manager, mut receivers) = manager_with_subscribers(size, false);
        drain(&mut receivers);
        group.bench_function(format!("unfiltered_{}", size), |b| {
            b.iter(|| {
                let report = manager.publish("onMessage", black_box(&payload));
                drain(&mut receivers);
                report
            })
        });

        let (manager, mut receivers) = manager_with_subscribers(size, true);
        drain(&mut receivers);
        group.bench_function(format!("filtered_{}", size), |b| {
            b.iter(|| {
                let report = manager.publish("onMessage", black_box(&payload));
                drain(&mut receivers);
                report
            })
        });
    }

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    group.bench_function("subscription", |b| {
        b.iter(|| graphql::parse(black_box(SUBSCRIPTION)).unwrap())
    });

    let large = format!(
        "query Dashboard($id: ID!, $first: Int = 10) {{ {} }}",
        (0..50)
            .map(|i| format!("f{i}: item(id: $id, first: $first) {{ id name tags {{ label }} }}"))
            .collect::<Vec<_>>()
            .join(" ")
    );
    group.bench_function("large_query", |b| {
        b.iter(|| graphql::parse(black_box(&large)).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_publish, bench_parse);
criterion_main!(benches);
