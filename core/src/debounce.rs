//! Rearmable single-fire timer used for idle-stream detection.
//!
//! DLNA renderers reconnect aggressively (seek, buffer, probe), so a stream
//! must not be declared closed the instant one TCP connection drops. The
//! debounce is rearmed after every block write; when it finally fires with
//! no write having rearmed it in the meantime, the last-known args are
//! handed to the caller's close check.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::runtime::TaskSpawner;

/// A single rearmable, single-fire timer.
///
/// `A` is the payload type threaded through to the fire callback — for the
/// HTTP gateway this is `(message_id, chat_id, local_token, size)`.
pub struct Debounce<A> {
    generation: Arc<AtomicU64>,
    args: Arc<Mutex<Option<A>>>,
    closed: Arc<AtomicBool>,
    timeout: Duration,
    spawner: Arc<dyn TaskSpawner>,
}

impl<A> Clone for Debounce<A> {
    fn clone(&self) -> Self {
        Self {
            generation: Arc::clone(&self.generation),
            args: Arc::clone(&self.args),
            closed: Arc::clone(&self.closed),
            timeout: self.timeout,
            spawner: Arc::clone(&self.spawner),
        }
    }
}

impl<A> Debounce<A>
where
    A: Clone + Send + Sync + 'static,
{
    /// Creates a debounce with the given fire delay. Nothing is scheduled
    /// until the first call to [`Debounce::update_args`].
    pub fn new(timeout: Duration, spawner: Arc<dyn TaskSpawner>) -> Self {
        Self {
            generation: Arc::new(AtomicU64::new(0)),
            args: Arc::new(Mutex::new(None)),
            closed: Arc::new(AtomicBool::new(false)),
            timeout,
            spawner,
        }
    }

    /// Cancels any pending fire, stores `args`, and schedules exactly one
    /// fire of `on_fire` in `timeout` from now.
    ///
    /// Returns `false` if this debounce has already been permanently closed
    /// via [`Debounce::close`] — the owning session is gone and no further
    /// rearming is possible without creating a new `Debounce`.
    pub fn update_args<F, Fut>(&self, args: A, on_fire: F) -> bool
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        *self.args.lock() = Some(args);
        self.arm(on_fire)
    }

    /// Reschedules the timer without changing the stored args. Used when a
    /// fire determines the session is still alive (some transport is still
    /// open) and wants to wait again before re-checking.
    pub fn reschedule<F, Fut>(&self, on_fire: F) -> bool
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        self.arm(on_fire)
    }

    /// Marks the debounce as permanently closed. Any in-flight timer from a
    /// prior generation will still run but will observe the new generation
    /// mismatch and no-op.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn arm<F, Fut>(&self, on_fire: F) -> bool
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let my_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = Arc::clone(&self.generation);
        let args = Arc::clone(&self.args);
        let closed = Arc::clone(&self.closed);
        let timeout = self.timeout;

        self.spawner.spawn(async move {
            tokio::time::sleep(timeout).await;
            if closed.load(Ordering::SeqCst) {
                return;
            }
            if generation.load(Ordering::SeqCst) != my_generation {
                // superseded by a later update_args/reschedule call
                return;
            }
            let fired_args = args.lock().clone();
            if let Some(fired_args) = fired_args {
                on_fire(fired_args).await;
            }
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::TokioSpawner;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_timeout_with_latest_args() {
        let spawner = Arc::new(TokioSpawner::current());
        let debounce = Debounce::new(Duration::from_millis(50), spawner);
        let observed = Arc::new(Mutex::new(Vec::<u32>::new()));

        let fire_count = Arc::new(AtomicUsize::new(0));
        let make_cb = |observed: Arc<Mutex<Vec<u32>>>, fire_count: Arc<AtomicUsize>| {
            move |args: u32| {
                let observed = Arc::clone(&observed);
                let fire_count = Arc::clone(&fire_count);
                async move {
                    observed.lock().push(args);
                    fire_count.fetch_add(1, Ordering::SeqCst);
                }
            }
        };

        debounce.update_args(1, make_cb(observed.clone(), fire_count.clone()));
        tokio::time::advance(Duration::from_millis(20)).await;
        // Rearm with a newer value before the first fire — should cancel it.
        debounce.update_args(2, make_cb(observed.clone(), fire_count.clone()));
        tokio::time::advance(Duration::from_millis(60)).await;
        tokio::task::yield_now().await;

        assert_eq!(fire_count.load(Ordering::SeqCst), 1);
        assert_eq!(*observed.lock(), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn close_prevents_further_rearming() {
        let spawner = Arc::new(TokioSpawner::current());
        let debounce: Debounce<u32> = Debounce::new(Duration::from_millis(10), spawner);
        debounce.close();
        assert!(!debounce.update_args(1, |_: u32| async {}));
        assert!(!debounce.reschedule(|_: u32| async {}));
    }
}
