pub mod api;
pub mod config;
pub mod correlator;
pub mod decode;
pub mod discovery;
pub mod error;
pub mod metrics;
pub mod scraper;
pub mod session;
pub mod stomp;

use std::collections::HashMap;
use std::time::Duration;

/// Destination names starting with this prefix belong to the broker itself
/// (advisory topics, statistics plumbing) and are kept out of the published
/// metrics.
pub const RESERVED_DESTINATION_PREFIX: &str = "ActiveMQ.";

/// Flat attribute map for one destination, exactly as decoded from a
/// statistics reply. Values stay raw strings; numeric parsing happens at
/// publication time.
pub type DestinationStats = HashMap<String, String>;

/// Kind of a broker destination, derived from the URI-style prefix on its
/// identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationKind {
    Queue,
    Topic,
}

impl DestinationKind {
    /// Split a `queue://name` / `topic://name` identifier into its kind and
    /// the stripped name. Identifiers without a recognized prefix yield
    /// `None` and are not routed anywhere.
    pub fn split_uri(identifier: &str) -> Option<(DestinationKind, &str)> {
        if let Some(name) = identifier.strip_prefix("queue://") {
            Some((DestinationKind::Queue, name))
        } else if let Some(name) = identifier.strip_prefix("topic://") {
            Some((DestinationKind::Topic, name))
        } else {
            None
        }
    }
}

/// Everything one collection cycle discovered about the broker.
///
/// Owned exclusively by the cycle that produced it; the publishing layer
/// reads it once and the next cycle starts from a fresh instance.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryResult {
    /// Broker identity as reported in the replies, if any reply carried one.
    pub broker_name: Option<String>,

    /// Per-queue statistics, keyed by stripped destination name.
    pub queues: HashMap<String, DestinationStats>,

    /// Per-topic statistics, keyed by stripped destination name.
    pub topics: HashMap<String, DestinationStats>,
}

impl DiscoveryResult {
    /// Route a decoded record under its destination identifier.
    ///
    /// Duplicate names within one cycle are last-write-wins; records without
    /// a recognized `queue://` / `topic://` prefix are dropped.
    pub fn insert(&mut self, identifier: &str, stats: DestinationStats) {
        match DestinationKind::split_uri(identifier) {
            Some((DestinationKind::Queue, name)) => {
                self.queues.insert(name.to_string(), stats);
            }
            Some((DestinationKind::Topic, name)) => {
                self.topics.insert(name.to_string(), stats);
            }
            None => {}
        }
    }

    /// Whether any destination has been routed into either table.
    pub fn has_destinations(&self) -> bool {
        !self.queues.is_empty() || !self.topics.is_empty()
    }
}

/// The one artifact a collection cycle hands to its caller.
#[derive(Debug, Clone)]
pub struct CollectionOutcome {
    /// False only for connection-level failures; an empty result is a
    /// success.
    pub success: bool,

    /// Wall-clock time the cycle took, recorded on every path.
    pub duration: Duration,

    /// Discovered statistics, absent when the cycle failed.
    pub result: Option<DiscoveryResult>,
}

impl CollectionOutcome {
    pub fn duration_seconds(&self) -> f64 {
        self.duration.as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_uri_recognizes_queue_and_topic_prefixes() {
        assert_eq!(
            DestinationKind::split_uri("queue://orders"),
            Some((DestinationKind::Queue, "orders"))
        );
        assert_eq!(
            DestinationKind::split_uri("topic://events.audit"),
            Some((DestinationKind::Topic, "events.audit"))
        );
        assert_eq!(DestinationKind::split_uri("orders"), None);
        assert_eq!(DestinationKind::split_uri("temp-queue://x"), None);
    }

    #[test]
    fn insert_routes_by_prefix_and_strips_it() {
        let mut result = DiscoveryResult::default();
        result.insert("queue://orders", DestinationStats::new());
        result.insert("topic://events", DestinationStats::new());

        assert!(result.queues.contains_key("orders"));
        assert!(result.topics.contains_key("events"));
        assert!(!result.topics.contains_key("orders"));
        assert!(!result.queues.contains_key("events"));
    }

    #[test]
    fn insert_is_last_write_wins() {
        let mut result = DiscoveryResult::default();

        let mut first = DestinationStats::new();
        first.insert("size".to_string(), "4".to_string());
        result.insert("queue://orders", first);

        let mut second = DestinationStats::new();
        second.insert("size".to_string(), "7".to_string());
        result.insert("queue://orders", second);

        assert_eq!(result.queues["orders"]["size"], "7");
        assert_eq!(result.queues.len(), 1);
    }
}
