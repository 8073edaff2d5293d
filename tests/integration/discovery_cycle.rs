//! End-to-end collection cycles against the scripted broker.

use std::sync::{Arc, Mutex};

use activemq_exporter::discovery::{
    STATISTICS_TARGETS, discover_destinations, run_collection_cycle,
};
use pretty_assertions::assert_eq;

use crate::helpers::{MockBroker, broker_reply, destination_reply, fast_timing, test_config};

#[tokio::test]
async fn full_cycle_collects_queues_and_topics() {
    let queried = Arc::new(Mutex::new(Vec::new()));
    let queried_by_broker = queried.clone();

    let broker = MockBroker::start(move |target| {
        queried_by_broker.lock().unwrap().push(target.to_string());
        vec![
            destination_reply("queue://orders", &[("size", "4"), ("enqueueCount", "100")]),
            // Duplicate delivery: the later record must win.
            destination_reply("queue://orders", &[("size", "7"), ("enqueueCount", "100")]),
            destination_reply("topic://events", &[("enqueueCount", "12")]),
            destination_reply("queue://ActiveMQ.Advisory.Stats", &[("size", "1")]),
            broker_reply("amq-prod-1"),
        ]
    })
    .await;

    let result = discover_destinations(&test_config(broker.port), &fast_timing())
        .await
        .expect("cycle should succeed");

    assert_eq!(result.broker_name.as_deref(), Some("amq-prod-1"));
    assert_eq!(result.queues["orders"]["size"], "7");
    assert_eq!(result.queues["orders"]["enqueueCount"], "100");
    assert_eq!(result.topics["events"]["enqueueCount"], "12");

    // Broker-internal destinations are still visible in the raw result;
    // they are filtered at publication time.
    assert!(result.queues.contains_key("ActiveMQ.Advisory.Stats"));

    // The wildcard query already produced destinations, so the broker-level
    // target is never issued.
    let queried = queried.lock().unwrap();
    assert_eq!(*queried, vec![STATISTICS_TARGETS[0].to_string()]);
}

#[tokio::test]
async fn zero_replies_is_an_empty_success() {
    let queried = Arc::new(Mutex::new(Vec::new()));
    let queried_by_broker = queried.clone();

    let broker = MockBroker::start(move |target| {
        queried_by_broker.lock().unwrap().push(target.to_string());
        Vec::new()
    })
    .await;

    let result = discover_destinations(&test_config(broker.port), &fast_timing())
        .await
        .expect("empty cycle is still a success");

    assert!(result.queues.is_empty());
    assert!(result.topics.is_empty());
    assert_eq!(result.broker_name, None);

    // With nothing discovered, every target gets its turn.
    let queried = queried.lock().unwrap();
    assert_eq!(queried.len(), STATISTICS_TARGETS.len());
}

#[tokio::test]
async fn broker_level_reply_without_destinations() {
    let broker = MockBroker::start(|target| {
        if target == "ActiveMQ.Statistics.Broker" {
            vec![broker_reply("amq-standby")]
        } else {
            Vec::new()
        }
    })
    .await;

    let result = discover_destinations(&test_config(broker.port), &fast_timing())
        .await
        .expect("cycle should succeed");

    assert_eq!(result.broker_name.as_deref(), Some("amq-standby"));
    assert!(result.queues.is_empty());
    assert!(result.topics.is_empty());
}

#[tokio::test]
async fn garbage_replies_are_discarded_without_failing_the_cycle() {
    let broker = MockBroker::start(|_| {
        vec![
            // No map marker: ignored without a decode attempt.
            "statistics temporarily unavailable".to_string(),
            // Map marker but broken markup: decode failure, discarded.
            "<map><entry><string>size</entry>".to_string(),
        ]
    })
    .await;

    let result = discover_destinations(&test_config(broker.port), &fast_timing())
        .await
        .expect("garbage replies must not fail the cycle");

    assert!(result.queues.is_empty());
    assert!(result.topics.is_empty());
}

#[tokio::test]
async fn connection_failure_yields_failed_outcome() {
    // Nothing listens on port 1.
    let outcome = run_collection_cycle(test_config(1), fast_timing()).await;

    assert!(!outcome.success);
    assert!(outcome.result.is_none());
    assert!(outcome.duration_seconds() > 0.0);
}

#[tokio::test]
async fn successful_cycle_outcome_carries_the_result() {
    let broker = MockBroker::start(|_| {
        vec![destination_reply("queue://orders", &[("size", "4")])]
    })
    .await;

    let outcome = run_collection_cycle(test_config(broker.port), fast_timing()).await;

    assert!(outcome.success);
    assert!(outcome.duration_seconds() > 0.0);
    let result = outcome.result.expect("successful cycle carries a result");
    assert_eq!(result.queues["orders"]["size"], "4");
}
