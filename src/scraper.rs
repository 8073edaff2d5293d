//! Background scraper actor.
//!
//! One actor owns the collection schedule for the whole process: cycles run
//! strictly sequentially on its task (the scrape is awaited inside the select
//! arm, so a new tick cannot start a cycle before the previous teardown
//! finished). Each outcome is pushed into the Prometheus registry and
//! broadcast to any observers.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, instrument, warn};

use crate::CollectionOutcome;
use crate::config::Config;
use crate::discovery::{DiscoveryTiming, run_collection_cycle};
use crate::metrics::publish_outcome;

/// Commands that can be sent to a ScraperActor
#[derive(Debug)]
pub enum ScraperCommand {
    /// Trigger an immediate collection cycle (bypassing the interval timer)
    ScrapeNow {
        respond_to: oneshot::Sender<CollectionOutcome>,
    },

    /// Gracefully shut down the scraper
    Shutdown,
}

/// Summary of one finished cycle, broadcast to observers.
#[derive(Debug, Clone)]
pub struct CycleEvent {
    pub success: bool,
    pub duration_seconds: f64,
    pub queues: usize,
    pub topics: usize,
}

/// Actor that runs collection cycles on a fixed interval.
pub struct ScraperActor {
    config: Config,

    timing: DiscoveryTiming,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<ScraperCommand>,

    /// Broadcast sender for publishing cycle summaries
    event_tx: broadcast::Sender<CycleEvent>,

    interval_duration: Duration,
}

impl ScraperActor {
    pub fn new(
        config: Config,
        timing: DiscoveryTiming,
        command_rx: mpsc::Receiver<ScraperCommand>,
        event_tx: broadcast::Sender<CycleEvent>,
    ) -> Self {
        let interval_duration = Duration::from_secs(config.scrape_interval_secs);
        Self {
            config,
            timing,
            command_rx,
            event_tx,
            interval_duration,
        }
    }

    /// Run the actor's main loop.
    ///
    /// The first tick fires immediately, so the initial scrape happens at
    /// startup rather than one interval later.
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        info!(
            "starting background scraper (interval: {}s)",
            self.interval_duration.as_secs()
        );

        let mut ticker = interval(self.interval_duration);
        // A cycle stuck at its timeout delays the next trigger; it must not
        // cause a burst of catch-up cycles afterwards.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.scrape().await;
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        ScraperCommand::ScrapeNow { respond_to } => {
                            debug!("received ScrapeNow command");
                            let outcome = self.scrape().await;
                            let _ = respond_to.send(outcome);
                        }

                        ScraperCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("scraper actor stopped");
    }

    async fn scrape(&self) -> CollectionOutcome {
        let outcome = run_collection_cycle(self.config.clone(), self.timing.clone()).await;

        publish_outcome(&outcome);
        info!("metrics updated in {:.2}s", outcome.duration_seconds());

        let event = CycleEvent {
            success: outcome.success,
            duration_seconds: outcome.duration_seconds(),
            queues: outcome.result.as_ref().map_or(0, |r| r.queues.len()),
            topics: outcome.result.as_ref().map_or(0, |r| r.topics.len()),
        };

        // No receivers is fine; the registry already holds the snapshot.
        if self.event_tx.send(event).is_err() {
            debug!("no receivers for cycle event");
        }

        outcome
    }
}

/// Handle for controlling a ScraperActor
#[derive(Clone)]
pub struct ScraperHandle {
    sender: mpsc::Sender<ScraperCommand>,
}

impl ScraperHandle {
    /// Spawn the scraper as a tokio task and return a handle to it.
    pub fn spawn(
        config: Config,
        timing: DiscoveryTiming,
        event_tx: broadcast::Sender<CycleEvent>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);

        let actor = ScraperActor::new(config, timing, cmd_rx, event_tx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Trigger an immediate collection cycle and wait for its outcome.
    pub async fn scrape_now(&self) -> Option<CollectionOutcome> {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(ScraperCommand::ScrapeNow { respond_to: tx })
            .await
            .is_err()
        {
            error!("failed to send ScrapeNow command");
            return None;
        }
        rx.await.ok()
    }

    /// Gracefully shut down the scraper.
    pub async fn shutdown(&self) {
        let _ = self.sender.send(ScraperCommand::Shutdown).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BrokerEndpoint, Credentials};

    fn unreachable_config() -> Config {
        Config {
            endpoints: vec![BrokerEndpoint {
                host: "127.0.0.1".to_string(),
                port: 1,
            }],
            credentials: Credentials {
                user: "monitor".to_string(),
                password: "monitor".to_string(),
            },
            use_tls: false,
            scrape_interval_secs: 3600,
            http_port: 0,
        }
    }

    #[tokio::test]
    async fn failed_cycle_yields_failed_outcome_with_duration() {
        let (event_tx, mut event_rx) = broadcast::channel(4);
        let handle = ScraperHandle::spawn(
            unreachable_config(),
            DiscoveryTiming::default(),
            event_tx,
        );

        let outcome = handle.scrape_now().await.expect("scraper should respond");

        assert!(!outcome.success);
        assert!(outcome.result.is_none());
        assert!(outcome.duration_seconds() > 0.0);

        // The startup scrape and the manual one both broadcast an event.
        let event = event_rx.recv().await.unwrap();
        assert!(!event.success);
        assert_eq!(event.queues, 0);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_stops_the_actor() {
        let (event_tx, _event_rx) = broadcast::channel(4);
        let handle = ScraperHandle::spawn(
            unreachable_config(),
            DiscoveryTiming::default(),
            event_tx,
        );

        handle.shutdown().await;

        // Commands after shutdown are not answered.
        assert!(handle.scrape_now().await.is_none());
    }
}
