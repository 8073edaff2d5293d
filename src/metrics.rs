//! Prometheus metric definitions and outcome publication.
//!
//! The recorder is the only state shared between the scraper task and
//! concurrent `/metrics` readers; every series value is swapped atomically
//! inside the `metrics` machinery. Enqueue/dequeue totals are monotonic
//! counters written with absolute broker values so they survive cycles that
//! fail to report a destination.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

use crate::{CollectionOutcome, DestinationStats, RESERVED_DESTINATION_PREFIX};

pub struct Metric {
    pub name: &'static str,
    description: &'static str,
}

pub const COUNTERS: [Metric; 4] = [
    QUEUE_ENQUEUE_COUNT,
    QUEUE_DEQUEUE_COUNT,
    TOPIC_ENQUEUE_COUNT,
    TOPIC_DEQUEUE_COUNT,
];

pub const GAUGES: [Metric; 7] = [
    QUEUE_SIZE,
    QUEUE_CONSUMER_COUNT,
    QUEUE_PRODUCER_COUNT,
    TOPIC_CONSUMER_COUNT,
    TOPIC_PRODUCER_COUNT,
    SCRAPE_SUCCESS,
    SCRAPE_DURATION,
];

// QUEUE Metrics --------------------------

pub const QUEUE_SIZE: Metric = Metric {
    name: "activemq_queue_size",
    description: "Queue size (pending messages)",
};

pub const QUEUE_ENQUEUE_COUNT: Metric = Metric {
    name: "activemq_queue_enqueue_count",
    description: "Total enqueued messages",
};

pub const QUEUE_DEQUEUE_COUNT: Metric = Metric {
    name: "activemq_queue_dequeue_count",
    description: "Total dequeued messages",
};

pub const QUEUE_CONSUMER_COUNT: Metric = Metric {
    name: "activemq_queue_consumer_count",
    description: "Active consumers",
};

pub const QUEUE_PRODUCER_COUNT: Metric = Metric {
    name: "activemq_queue_producer_count",
    description: "Active producers",
};

// TOPIC Metrics --------------------------

pub const TOPIC_ENQUEUE_COUNT: Metric = Metric {
    name: "activemq_topic_enqueue_count",
    description: "Total enqueued messages",
};

pub const TOPIC_DEQUEUE_COUNT: Metric = Metric {
    name: "activemq_topic_dequeue_count",
    description: "Total dequeued messages",
};

pub const TOPIC_CONSUMER_COUNT: Metric = Metric {
    name: "activemq_topic_consumer_count",
    description: "Active consumers",
};

pub const TOPIC_PRODUCER_COUNT: Metric = Metric {
    name: "activemq_topic_producer_count",
    description: "Active producers",
};

// SCRAPE Metrics --------------------------

pub const SCRAPE_SUCCESS: Metric = Metric {
    name: "activemq_scrape_success",
    description: "Whether the last scrape was successful",
};

pub const SCRAPE_DURATION: Metric = Metric {
    name: "activemq_scrape_duration_seconds",
    description: "Duration of the last scrape",
};

/// Install the Prometheus recorder and describe every series.
///
/// Returns the handle the HTTP layer renders on `/metrics`.
pub fn init_metrics() -> PrometheusHandle {
    info!("initializing metrics recorder");

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    for metric in COUNTERS {
        metrics::describe_counter!(metric.name, metric.description);
    }
    for metric in GAUGES {
        metrics::describe_gauge!(metric.name, metric.description);
    }

    handle
}

/// Map one cycle outcome into the registry.
///
/// Destinations whose stripped name starts with the reserved broker-internal
/// prefix are excluded. A failed cycle only flips the success/duration
/// indicators; the destination series keep their previous values until the
/// next successful cycle overwrites them.
pub fn publish_outcome(outcome: &CollectionOutcome) {
    metrics::gauge!(SCRAPE_SUCCESS.name).set(if outcome.success { 1.0 } else { 0.0 });
    metrics::gauge!(SCRAPE_DURATION.name).set(outcome.duration_seconds());

    let Some(result) = &outcome.result else {
        return;
    };

    let broker = result.broker_name.clone().unwrap_or_else(|| "unknown".to_string());

    for (queue, stats) in &result.queues {
        if queue.starts_with(RESERVED_DESTINATION_PREFIX) {
            continue;
        }

        if let Some(size) = numeric_attr(stats, "size", queue) {
            metrics::gauge!(QUEUE_SIZE.name, "queue" => queue.clone(), "broker" => broker.clone())
                .set(size as f64);
        }
        if let Some(enqueued) = numeric_attr(stats, "enqueueCount", queue) {
            metrics::counter!(QUEUE_ENQUEUE_COUNT.name, "queue" => queue.clone(), "broker" => broker.clone())
                .absolute(enqueued);
        }
        if let Some(dequeued) = numeric_attr(stats, "dequeueCount", queue) {
            metrics::counter!(QUEUE_DEQUEUE_COUNT.name, "queue" => queue.clone(), "broker" => broker.clone())
                .absolute(dequeued);
        }
        if let Some(consumers) = numeric_attr(stats, "consumerCount", queue) {
            metrics::gauge!(QUEUE_CONSUMER_COUNT.name, "queue" => queue.clone(), "broker" => broker.clone())
                .set(consumers as f64);
        }
        if let Some(producers) = numeric_attr(stats, "producerCount", queue) {
            metrics::gauge!(QUEUE_PRODUCER_COUNT.name, "queue" => queue.clone(), "broker" => broker.clone())
                .set(producers as f64);
        }
    }

    for (topic, stats) in &result.topics {
        if topic.starts_with(RESERVED_DESTINATION_PREFIX) {
            continue;
        }

        if let Some(enqueued) = numeric_attr(stats, "enqueueCount", topic) {
            metrics::counter!(TOPIC_ENQUEUE_COUNT.name, "topic" => topic.clone(), "broker" => broker.clone())
                .absolute(enqueued);
        }
        if let Some(dequeued) = numeric_attr(stats, "dequeueCount", topic) {
            metrics::counter!(TOPIC_DEQUEUE_COUNT.name, "topic" => topic.clone(), "broker" => broker.clone())
                .absolute(dequeued);
        }
        if let Some(consumers) = numeric_attr(stats, "consumerCount", topic) {
            metrics::gauge!(TOPIC_CONSUMER_COUNT.name, "topic" => topic.clone(), "broker" => broker.clone())
                .set(consumers as f64);
        }
        if let Some(producers) = numeric_attr(stats, "producerCount", topic) {
            metrics::gauge!(TOPIC_PRODUCER_COUNT.name, "topic" => topic.clone(), "broker" => broker.clone())
                .set(producers as f64);
        }
    }
}

/// Read one numeric attribute. A missing attribute counts as zero; a present
/// but non-numeric value skips only this metric.
fn numeric_attr(stats: &DestinationStats, key: &str, destination: &str) -> Option<u64> {
    match stats.get(key) {
        None => Some(0),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("failed to parse {key}={raw:?} for {destination}");
                None
            }
        },
    }
}
