use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::source::StatsSource;
use crate::stats::{StatsSnapshot, StatusTally, IDLE};

/// How a wait ended, when it ended without an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Every worker reported idle
    AllIdle {
        /// Number of polls it took
        polls: u32,
    },
    /// The deadline passed while some workers were still busy
    TimedOut {
        /// Number of polls made
        polls: u32,
        /// Tally of the final poll
        last: StatusTally,
    },
    /// The user interrupted the wait
    Interrupted,
}

impl PollOutcome {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            PollOutcome::AllIdle { .. } => 0,
            PollOutcome::TimedOut { .. } => 2,
            // Ctrl+C is not a failure
            PollOutcome::Interrupted => 0,
        }
    }
}

/// Polls a stats source until all workers are idle or the timeout passes
pub struct Poller<S: StatsSource> {
    config: Arc<Config>,
    source: S,
}

impl<S: StatsSource> Poller<S> {
    /// Create a new Poller
    pub fn new(config: Config, source: S) -> Self {
        Self {
            config: Arc::new(config),
            source,
        }
    }

    /// Poll until every worker is idle or the deadline passes.
    ///
    /// The deadline is fixed before the first poll. Fetch and decode errors
    /// end the wait immediately; they are never retried.
    pub async fn run(&self) -> Result<PollOutcome> {
        // A timeout past the end of the clock means no deadline at all
        let deadline = Instant::now().checked_add(self.config.timeout());
        if deadline.is_none() {
            debug!(
                "Timeout of {}s is out of range, waiting without a deadline",
                self.config.timeout_secs
            );
        }
        let mut polls: u32 = 0;

        loop {
            polls += 1;

            let document = self.source.fetch().await?;
            let snapshot = StatsSnapshot::from_value(&document)?;
            if polls == 1 {
                if let Some(ref version) = snapshot.version {
                    debug!("Stats server reports uWSGI version {}", version);
                }
            }

            let tally = StatusTally::from_snapshot(&snapshot);
            if tally.all_idle() {
                info!("All {} workers idle after {} poll(s)", tally.total(), polls);
                return Ok(PollOutcome::AllIdle { polls });
            }

            println!("{}", tally);
            for worker in snapshot.workers.iter().filter(|w| w.status_label() != IDLE) {
                debug!("Worker {} is {}", worker.display_id(), worker.status_label());
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!("Deadline passed after {} poll(s): {}", polls, tally);
                return Ok(PollOutcome::TimedOut { polls, last: tally });
            }

            sleep(self.config.poll_interval()).await;
        }
    }
}

/// Run the poller until it finishes or a shutdown signal arrives
pub async fn wait_for_idle<S: StatsSource>(
    poller: &Poller<S>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<PollOutcome> {
    let shutdown = async move {
        // No sender left means nobody can interrupt us
        if let Err(RecvError::Closed) = shutdown_rx.recv().await {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = poller.run() => result,
        _ = shutdown => {
            debug!("Shutdown signal received");
            Ok(PollOutcome::Interrupted)
        }
    }
}
