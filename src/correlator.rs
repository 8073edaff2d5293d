//! Reply correlation for the statistics exchange.
//!
//! The broker streams an unknown number of reply messages with no explicit
//! end-of-stream marker, so the orchestrator terminates on silence rather
//! than on a reply count. This module tracks the liveness signals that
//! decision is based on and accumulates the per-destination tables.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::decode::{decode_map, has_map_marker};
use crate::DiscoveryResult;

/// Tracks reply arrival and routes decoded records into the cycle's
/// accumulating [`DiscoveryResult`]. Owned exclusively by one collection
/// cycle.
#[derive(Debug)]
pub struct ReplyCorrelator {
    last_reply: Instant,
    reply_since_reset: bool,
    any_reply: bool,
    result: DiscoveryResult,
}

impl ReplyCorrelator {
    pub fn new() -> Self {
        Self {
            last_reply: Instant::now(),
            reply_since_reset: false,
            any_reply: false,
            result: DiscoveryResult::default(),
        }
    }

    /// Process one reply body.
    ///
    /// Liveness is recorded unconditionally: an empty or garbage reply still
    /// proves the broker is talking to us. Only bodies carrying the map
    /// marker are decoded, and a decode failure discards just that message.
    pub fn on_reply(&mut self, body: &str) {
        self.reply_since_reset = true;
        self.any_reply = true;
        self.last_reply = Instant::now();

        if !has_map_marker(body) {
            return;
        }

        let record = match decode_map(body) {
            Ok(record) => record,
            Err(e) => {
                warn!("discarding statistics reply: {e}");
                return;
            }
        };

        if let Some(broker_name) = record.broker_name {
            self.result.broker_name = Some(broker_name);
        }

        if let Some(destination) = record.destination_name {
            debug!("found destination: {destination}");
            self.result.insert(&destination, record.attributes);
        }
    }

    /// True once the silence since the last reply exceeds `threshold` and at
    /// least one record has been routed. Never true for a cycle that has not
    /// produced a destination, no matter how long the silence.
    pub fn quiet_period_elapsed(&self, threshold: Duration) -> bool {
        self.result.has_destinations() && self.last_reply.elapsed() > threshold
    }

    /// Clear the per-target "new reply since last check" flag.
    pub fn reset_reply_flag(&mut self) {
        self.reply_since_reset = false;
    }

    /// Whether a reply arrived since the last [`reset_reply_flag`] call.
    ///
    /// [`reset_reply_flag`]: ReplyCorrelator::reset_reply_flag
    pub fn replied_since_reset(&self) -> bool {
        self.reply_since_reset
    }

    /// Whether any reply at all arrived during this cycle.
    pub fn any_reply(&self) -> bool {
        self.any_reply
    }

    pub fn has_destinations(&self) -> bool {
        self.result.has_destinations()
    }

    /// Routed (queues, topics) counts so far.
    pub fn destination_counts(&self) -> (usize, usize) {
        (self.result.queues.len(), self.result.topics.len())
    }

    /// Hand the accumulated tables to the cycle.
    pub fn into_result(self) -> DiscoveryResult {
        self.result
    }
}

impl Default for ReplyCorrelator {
    fn default() -> Self {
        Self::new()
    }
}
