//! Logging setup and activity records.
//!
//! Library code logs through the `log` facade. The binary installs a
//! `tracing-subscriber` formatter whose `tracing-log` bridge forwards those
//! records, filtered by `RUST_LOG`.

use std::fmt::Display;
use std::future::Future;

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,action_node=debug";

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .try_init();
}

/// `RUST_LOG` when set and valid, otherwise [`DEFAULT_FILTER`].
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Run `work` as a named activity, logging its start and outcome.
///
/// The result is returned untouched; failures are logged, not handled.
pub async fn activity<T, E, F>(name: &str, work: F) -> Result<T, E>
where
    E: Display,
    F: Future<Output = Result<T, E>>,
{
    log::info!("activity [{}] started.", name);
    match work.await {
        Ok(value) => {
            log::info!("activity [{}] finished.", name);
            Ok(value)
        }
        Err(e) => {
            log::error!("activity [{}] failed.", name);
            log::error!("activity [{}] raised error: {}", name, e);
            Err(e)
        }
    }
}
