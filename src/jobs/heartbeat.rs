// Drop-guarded background heartbeat, grounded verbatim on
// `supabase_repository::job_worker::JobHeartbeat`: a periodic ticker keeps
// `jobs.heartbeat_at` fresh while a job runs, and dropping the guard (normal
// completion, early return, or panic unwind) aborts the ticker task so it
// never outlives the job it watches.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::store::GraphStore;

pub struct JobHeartbeat {
    handle: JoinHandle<()>,
}

impl JobHeartbeat {
    pub fn start(store: Arc<GraphStore>, job_id: Uuid, period: Duration) -> Self {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let handle = tokio::spawn(async move {
            loop {
                ticker.tick().await;
                match store.heartbeat_job(job_id).await {
                    Ok(()) => debug!(job_id = %job_id, "job heartbeat ticked"),
                    Err(err) => {
                        warn!(job_id = %job_id, error = %err, "job heartbeat failed");
                        break;
                    }
                }
            }
        });

        Self { handle }
    }
}

impl Drop for JobHeartbeat {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
