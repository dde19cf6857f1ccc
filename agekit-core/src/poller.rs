use std::{
    future::Future,
    ops::ControlFlow,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    thread::{self, ThreadId},
    time::Duration,
};

use tokio::{
    runtime::Handle,
    sync::oneshot,
    time::{interval_at, Instant, MissedTickBehavior},
};

/// Owns the single polling task of a client.
///
/// Starting a new task always stops the previous one first, so at most one task is active at any
/// time. A stopped task never runs its tick again, even if a request was in flight, and never
/// dispatches once `start` or `cancel` returned.
#[derive(Debug, Default)]
pub(crate) struct Poller {
    active: Arc<Mutex<Option<PollHandle>>>,
    next_id: AtomicU64,
    gate: DispatchGate,
}

#[derive(Debug)]
struct PollHandle {
    id: u64,
    url: String,
    shutdown: oneshot::Sender<()>,
}

impl Poller {
    /// Cancels any active task, then runs `tick` every `interval` on `runtime` until it breaks or
    /// the task is cancelled. The first tick happens one interval after the start. `tick`
    /// receives the id of its task.
    ///
    /// Ticks never overlap: the next interval is only awaited once the previous tick completed.
    pub(crate) fn start<F, Fut>(&self, runtime: &Handle, url: &str, interval: Duration, mut tick: F)
    where
        F: FnMut(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (shutdown, mut shutdown_rx) = oneshot::channel();

        self.gate.run(|| {
            let mut active = lock(&self.active);
            if let Some(previous) = active.take() {
                tracing::debug!(id = previous.id, url = %previous.url, "cancelling previous polling");
                let _ = previous.shutdown.send(());
            }
            *active = Some(PollHandle {
                id,
                url: url.to_string(),
                shutdown,
            });
        });

        let slot = Arc::clone(&self.active);
        let url = url.to_string();
        tracing::debug!(id, %url, ?interval, "starting polling");
        runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => {
                        tracing::debug!(id, %url, "polling cancelled");
                        return;
                    }
                    flow = async {
                        ticker.tick().await;
                        tick(id).await
                    } => {
                        if flow.is_break() {
                            break;
                        }
                    }
                }
            }

            tracing::debug!(id, %url, "polling finished");
            let mut active = lock(&slot);
            if active.as_ref().is_some_and(|handle| handle.id == id) {
                *active = None;
            }
        });
    }

    /// Stops the active task, if any. Returns whether a task was stopped; calling it again is a
    /// no-op.
    pub(crate) fn cancel(&self) -> bool {
        self.gate.run(|| lock(&self.active).take().map(Self::stop).is_some())
    }

    /// Stops the task `id` if it is still the active one. A newer task is left running.
    pub(crate) fn cancel_task(&self, id: u64) -> bool {
        self.gate.run(|| {
            let mut active = lock(&self.active);
            if active.as_ref().is_some_and(|handle| handle.id == id) {
                active.take().map(Self::stop).is_some()
            } else {
                false
            }
        })
    }

    fn stop(handle: PollHandle) {
        tracing::debug!(id = handle.id, url = %handle.url, "cancelling polling");
        let _ = handle.shutdown.send(());
    }

    /// Runs `dispatch` only if the task `id` is still the active one. Returns whether it ran.
    ///
    /// `start` and `cancel` wait for a running `dispatch` from other threads. Called from within
    /// `dispatch` on the same thread, they do not wait, so callbacks may start a new task.
    pub(crate) fn dispatch_if_active(&self, id: u64, dispatch: impl FnOnce()) -> bool {
        self.gate.run(|| {
            let is_active = lock(&self.active)
                .as_ref()
                .is_some_and(|handle| handle.id == id);
            if is_active {
                dispatch();
            } else {
                tracing::debug!(id, "superseded polling, dropping dispatch");
            }
            is_active
        })
    }

    /// Runs `dispatch` exclusively of `start` and `cancel` from other threads.
    pub(crate) fn dispatch<R>(&self, dispatch: impl FnOnce() -> R) -> R {
        self.gate.run(dispatch)
    }

    /// The id of the active task.
    pub(crate) fn active_id(&self) -> Option<u64> {
        lock(&self.active).as_ref().map(|handle| handle.id)
    }

    /// The URL of the active task.
    pub(crate) fn active_url(&self) -> Option<String> {
        lock(&self.active).as_ref().map(|handle| handle.url.clone())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Serializes dispatches with task switches. Re-entrant on the thread holding it.
#[derive(Debug, Default)]
struct DispatchGate {
    lock: Mutex<()>,
    owner: Mutex<Option<ThreadId>>,
}

impl DispatchGate {
    fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        let current = thread::current().id();
        if *lock(&self.owner) == Some(current) {
            return f();
        }

        let _guard = lock(&self.lock);
        *lock(&self.owner) = Some(current);
        let _owner = OwnerReset(&self.owner);
        f()
    }
}

/// Clears the gate owner, also when a callback panics.
struct OwnerReset<'a>(&'a Mutex<Option<ThreadId>>);

impl Drop for OwnerReset<'_> {
    fn drop(&mut self) {
        *lock(self.0) = None;
    }
}
