// Job queue (§4.7): state machine, atomic claiming, Drop-guarded heartbeat,
// stale-job recovery, and a progress broadcast stream. Orchestration layer
// over `store::jobs`; grounded directly on
// `supabase_repository::{mod.rs, job_worker.rs}`'s `fetch_job_for_worker`,
// `JobHeartbeat`, and `run`/`tick` poll loop.

mod heartbeat;
mod queue;

pub use heartbeat::JobHeartbeat;
pub use queue::{is_conflict_error, Job, JobHandler, JobProgressEvent, JobQueue, JobQueueError, JobStage, JobStatus, JobUpdate};
