// Scheduler tick loop (§4.6), grounded on
// `supabase_repository::job_worker::SupabaseJobWorker::run`/`tick`: a single
// poll loop that sleeps between ticks, except here each tick walks every
// registered launcher on its own interval rather than claiming one job.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{error, instrument};

use crate::jobs::{JobHandler, JobQueue};
use crate::scheduler::launcher::{run_launcher_once, JobLauncher, LauncherRetryState};

struct ScheduledLauncher {
    launcher: Arc<dyn JobLauncher>,
    interval: Duration,
    retry: LauncherRetryState,
    next_attempt: Instant,
}

/// Owns the launcher roster and the job-handler registry jobs enqueued by
/// launchers are dispatched to immediately (§4.6: "executed immediately").
pub struct Scheduler {
    queue: Arc<JobQueue>,
    launchers: Vec<ScheduledLauncher>,
    handlers: HashMap<&'static str, Arc<dyn JobHandler>>,
    poll_interval: Duration,
}

impl Scheduler {
    pub fn new(queue: Arc<JobQueue>, poll_interval: Duration) -> Self {
        Self { queue, launchers: Vec::new(), handlers: HashMap::new(), poll_interval }
    }

    pub fn register_launcher(&mut self, launcher: Arc<dyn JobLauncher>, interval: Duration) {
        self.launchers.push(ScheduledLauncher {
            launcher,
            interval,
            retry: LauncherRetryState::default(),
            next_attempt: Instant::now(),
        });
    }

    pub fn register_handler(&mut self, job_type: &'static str, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(job_type, handler);
    }

    #[instrument(skip_all)]
    pub async fn run(&mut self) -> ! {
        loop {
            self.tick().await;
            sleep(self.poll_interval).await;
        }
    }

    /// Runs every launcher whose interval has elapsed, dispatching any job
    /// it enqueues to a matching handler in the same tick.
    #[instrument(skip(self))]
    pub async fn tick(&mut self) {
        let now = Instant::now();
        for scheduled in &mut self.launchers {
            if scheduled.next_attempt > now {
                continue;
            }

            match run_launcher_once(&scheduled.launcher, &self.queue, &mut scheduled.retry).await {
                Some(backoff) => scheduled.next_attempt = now + backoff,
                None => scheduled.next_attempt = now + scheduled.interval,
            }
        }

        if let Err(e) = self.dispatch_approved_jobs().await {
            error!(error = %e, "failed to dispatch approved jobs this tick");
        }
    }

    /// Drains every approved job against its registered handler, one claim
    /// at a time, until the queue has nothing left to dispatch.
    async fn dispatch_approved_jobs(&self) -> anyhow::Result<()> {
        let cancel = Arc::new(AtomicBool::new(false));
        loop {
            if !self.queue.dispatch_next(&self.handlers, cancel.clone()).await? {
                break;
            }
        }
        Ok(())
    }
}
