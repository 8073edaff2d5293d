//! Discovery orchestration: one collection cycle against the broker.
//!
//! A cycle connects, subscribes a private reply channel, walks the fixed list
//! of statistics query targets and collects the streamed replies until the
//! quiet period says the burst is over. The cycle runner wraps the whole
//! thing in error and panic isolation so a broken cycle can never take the
//! scraper down with it.

use std::time::{Duration, Instant};

use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::correlator::ReplyCorrelator;
use crate::error::CollectResult;
use crate::session::BrokerSession;
use crate::{CollectionOutcome, DiscoveryResult};

/// Statistics query targets, in the order they are issued. The wildcard
/// destination query comes first; once it yields any destination the
/// broker-level query is skipped.
pub const STATISTICS_TARGETS: [&str; 2] = [
    "ActiveMQ.Statistics.Destination.>",
    "ActiveMQ.Statistics.Broker",
];

/// Timing knobs for the reply poll loop. `Default` carries the production
/// values; tests shrink them.
#[derive(Debug, Clone)]
pub struct DiscoveryTiming {
    /// Upper bound on waiting for replies to one query target.
    pub reply_timeout: Duration,

    /// Poll granularity inside the wait loop.
    pub poll_tick: Duration,

    /// Reply silence treated as end of the burst.
    pub quiet_period: Duration,
}

impl Default for DiscoveryTiming {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::from_secs(15),
            poll_tick: Duration::from_secs(1),
            quiet_period: Duration::from_secs(3),
        }
    }
}

/// Run one discovery exchange end to end.
///
/// Only connection-level failures surface as errors; everything else
/// degrades to a smaller (possibly empty) result. Teardown runs on every
/// exit path.
#[instrument(skip_all)]
pub async fn discover_destinations(
    config: &Config,
    timing: &DiscoveryTiming,
) -> CollectResult<DiscoveryResult> {
    let mut correlator = ReplyCorrelator::new();
    let mut session = BrokerSession::connect(config).await?;

    let driven = drive_queries(&mut session, &mut correlator, timing).await;

    // Teardown is unconditional; disconnect is a no-op on a dead session.
    session.disconnect().await;

    driven?;

    let result = correlator.into_result();
    if let Some(broker_name) = &result.broker_name {
        debug!("broker name: {broker_name}");
    }
    Ok(result)
}

async fn drive_queries(
    session: &mut BrokerSession,
    correlator: &mut ReplyCorrelator,
    timing: &DiscoveryTiming,
) -> CollectResult<()> {
    let reply_channel = format!("/temp-queue/stats.reply.{}", reply_suffix());
    session.subscribe(&reply_channel, "1", "auto").await?;

    for target in STATISTICS_TARGETS {
        debug!("sending statistics request to {target}");
        correlator.reset_reply_flag();

        if let Err(e) = session
            .send(target, "", &[("reply-to", reply_channel.as_str())])
            .await
        {
            error!("skipping target {target}: {e}");
            continue;
        }

        let started = Instant::now();
        while started.elapsed() < timing.reply_timeout {
            tokio::time::sleep(timing.poll_tick).await;

            while let Some(frame) = session.try_recv_message() {
                correlator.on_reply(&frame.body);
            }
            if correlator.replied_since_reset() {
                correlator.reset_reply_flag();
            }

            if correlator.quiet_period_elapsed(timing.quiet_period) {
                break;
            }
        }

        // A non-empty result from the wildcard query means the remaining
        // targets add no new destinations worth waiting for.
        if correlator.has_destinations() {
            let (queues, topics) = correlator.destination_counts();
            info!("found {queues} queues and {topics} topics");
            break;
        }
    }

    Ok(())
}

/// Collision-resistant suffix for the cycle's private reply destination.
fn reply_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Run one collection cycle with total isolation.
///
/// The cycle executes in its own task; errors and panics both map to a
/// failed outcome. Elapsed wall-clock time is recorded on every path. This
/// is the sole operation the scraper invokes.
pub async fn run_collection_cycle(config: Config, timing: DiscoveryTiming) -> CollectionOutcome {
    let started = Instant::now();

    let cycle = tokio::spawn(async move { discover_destinations(&config, &timing).await });

    let result = match cycle.await {
        Ok(Ok(result)) => Some(result),
        Ok(Err(e)) => {
            error!("collection cycle failed: {e}");
            None
        }
        Err(e) => {
            error!("collection cycle panicked: {e}");
            None
        }
    };

    CollectionOutcome {
        success: result.is_some(),
        duration: started.elapsed(),
        result,
    }
}
