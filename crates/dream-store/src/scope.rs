//! Scoped store sessions.
//!
//! [`scoped`] runs a closure against a store and then performs the exit
//! protocol on every path: sync, then release staging only if both the body
//! and the sync succeeded. On failure the staging location is logged and
//! kept, and the body's error is the one returned.

use std::path::{Path, PathBuf};

use tracing::{error, warn};

use crate::error::StoreError;
use crate::traits::{ProjectStore, ScopeExit};

/// Logs the staging location if the body unwinds.
struct PanicGuard {
    staging: Option<PathBuf>,
}

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            if let Some(path) = &self.staging {
                error!(
                    path = %path.display(),
                    "run panicked; unsynced work, if any, is left in the staging directory"
                );
            }
        }
    }
}

fn log_preserved(staging: Option<&Path>) {
    if let Some(path) = staging {
        error!(
            path = %path.display(),
            "run failed, local state has NOT been removed; it may help to recover or clean up by hand"
        );
    }
}

/// Run `body` against `store`, then sync and release.
///
/// - Body and sync succeed: staging is removed and the body's value returned.
/// - Body succeeds, sync fails: staging is kept and the sync error returned.
/// - Body fails: sync is still attempted once (its failure is only logged),
///   staging is kept, and the body's error returned.
pub fn scoped<S, T, E, F>(store: &mut S, body: F) -> Result<T, E>
where
    S: ProjectStore + ?Sized,
    E: From<StoreError>,
    F: FnOnce(&mut S) -> Result<T, E>,
{
    let guard = PanicGuard {
        staging: store.staging_dir().map(Path::to_path_buf),
    };
    let outcome = body(&mut *store);
    drop(guard);

    match outcome {
        Ok(value) => match store.sync() {
            Ok(_) => {
                store.release(ScopeExit::Clean)?;
                Ok(value)
            }
            Err(sync_err) => {
                release_failed(store);
                Err(sync_err.into())
            }
        },
        Err(err) => {
            if let Err(sync_err) = store.sync() {
                error!(error = %sync_err, "sync during failing exit also failed");
            }
            release_failed(store);
            Err(err)
        }
    }
}

fn release_failed<S: ProjectStore + ?Sized>(store: &mut S) {
    if let Err(e) = store.release(ScopeExit::Failed) {
        warn!(error = %e, "failed to release store after a failed run");
    }
    log_preserved(store.staging_dir());
}
