//! Background persistence for the durable tier

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Duration, Utc};
use flume::{Receiver, Sender};
use log::{debug, warn};

use super::durable::DurableStore;
use super::eviction::EvictionPolicy;
use super::object::CachedObject;

/// Work item for the persistence worker
pub(super) enum WriteJob {
    /// Persist an object, then enforce the eviction policy
    Put(CachedObject),
    /// Drop every durable entry, then release one pending clear
    Clear,
    /// Acknowledge once all earlier jobs have been applied
    Flush(Sender<()>),
    Shutdown,
}

/// Strictly increasing write stamps, so entries written back-to-back still
/// have a total recency order
fn next_stamp(last: &mut Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    let stamp = match *last {
        Some(prev) if now <= prev => prev + Duration::microseconds(1),
        _ => now,
    };
    *last = Some(stamp);
    stamp
}

/// Main worker function - runs in a dedicated thread.
///
/// Durable failures are logged and absorbed here; nothing is reported back
/// to cache callers.
#[expect(
    clippy::needless_pass_by_value,
    reason = "Values moved into thread, need ownership"
)]
pub(super) fn persistence_worker(
    store: Arc<dyn DurableStore>,
    policy: EvictionPolicy,
    jobs: Receiver<WriteJob>,
    pending_clears: Arc<AtomicUsize>,
) {
    let mut last_stamp = None;

    for job in jobs {
        match job {
            WriteJob::Put(mut object) => {
                object.timestamp = next_stamp(&mut last_stamp);
                if let Err(e) = store.put(&object) {
                    warn!("Durable write for {} failed: {e}", object.key);
                    continue;
                }
                debug!("Persisted {} ({} bytes)", object.key, object.size);

                if let Err(e) = policy.enforce(store.as_ref()) {
                    warn!("Cache eviction pass failed: {e}");
                }
            }

            WriteJob::Clear => {
                if let Err(e) = store.clear() {
                    warn!("Failed to clear durable cache: {e}");
                }
                pending_clears.fetch_sub(1, Ordering::SeqCst);
            }

            WriteJob::Flush(ack) => {
                let _ = ack.send(());
            }

            WriteJob::Shutdown => break,
        }
    }
}
