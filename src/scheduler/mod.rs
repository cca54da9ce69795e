// Scheduler and launchers (§4.6): condition-gated maintenance jobs dispatched
// on their own intervals, plus the annealing cycle a breathing job runs.
// Grounded on `supabase_repository::job_worker`'s poll-loop shape, generalized
// from "claim one job" to "check N launchers, claim whatever they enqueue".

mod breathing;
mod category_refresh;
mod epistemic_remeasurement;
mod launcher;
#[allow(clippy::module_inception)]
mod scheduler;

pub use breathing::{BreathingJobHandler, BreathingLauncher};
pub use category_refresh::{CategoryRefreshJobHandler, CategoryRefreshLauncher};
pub use epistemic_remeasurement::{EpistemicRemeasurementJobHandler, EpistemicRemeasurementLauncher};
pub use launcher::{run_launcher_once, JobLauncher, LauncherError, LauncherRetryState, LAUNCHER_MAX_RETRIES};
pub use scheduler::Scheduler;
