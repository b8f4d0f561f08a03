//! The configuration for the chunk server, given from environment variables and lazy
//! initialized when needed.

use std::num::NonZeroUsize;
use std::time::Duration;
use std::env;

use once_cell::race::OnceNonZeroUsize;


/// Default interval between two wake-ups of the chunk server worker, in milliseconds.
const DEFAULT_WORKER_INTERVAL_MS: usize = 10;


/// Return the interval between two wake-ups of the chunk server worker. Shorter
/// intervals service requests earlier at the cost of more idle polling.
///
/// To change this interval, set `VOXEND_WORKER_INTERVAL_MS` to a non-zero amount of
/// milliseconds.
pub fn worker_interval() -> Duration {
    static ENV: OnceNonZeroUsize = OnceNonZeroUsize::new();
    let ms = ENV.get_or_init(|| {
        env::var("VOXEND_WORKER_INTERVAL_MS").ok()
            .and_then(|raw| raw.parse().ok())
            .and_then(NonZeroUsize::new)
            .unwrap_or(NonZeroUsize::new(DEFAULT_WORKER_INTERVAL_MS).unwrap())
    });
    Duration::from_millis(ms.get() as u64)
}
