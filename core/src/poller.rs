//! Polling controller: keeps a view fresh on a fixed cadence.
//!
//! A view is activated with a fetch closure. Activation runs one fetch
//! immediately and, for `RefreshSchedule::Every`, one more per interval.
//! The task is owned by the returned `ActiveView`:
//!
//!   - `deactivate()` stops the schedule and aborts an in-flight fetch;
//!     nothing is published afterwards.
//!   - Dropping the handle does the same without waiting.
//!
//! Fetches for one view never overlap. A tick that comes due while a fetch
//! is still running is skipped, so refreshes are published in issue order
//! and `Refresh::seq` increases by one per completed fetch.

use std::future::Future;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshSchedule {
    /// Fetch once on activation.
    Once,
    /// Fetch on activation, then every interval.
    Every(Duration),
}

/// One completed fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct Refresh<T> {
    pub seq:          u64,
    pub completed_at: Instant,
    pub value:        T,
}

pub struct ActiveView<T> {
    name:     String,
    rx:       watch::Receiver<Option<Refresh<T>>>,
    shutdown: Option<oneshot::Sender<()>>,
    task:     Option<JoinHandle<()>>,
}

impl<T> ActiveView<T>
where
    T: Send + Sync + 'static,
{
    /// Start polling. Must be called inside a Tokio runtime.
    pub fn activate<F, Fut>(name: impl Into<String>, schedule: RefreshSchedule, fetch: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let name = name.into();
        let (tx, rx) = watch::channel(None);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_view(name.clone(), schedule, fetch, tx, shutdown_rx));
        log::debug!("view={name} activated ({schedule:?})");
        Self {
            name,
            rx,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A receiver that wakes on every published refresh.
    pub fn subscribe(&self) -> watch::Receiver<Option<Refresh<T>>> {
        self.rx.clone()
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop polling and wait for the task to exit.
    pub async fn deactivate(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    log::warn!("view={} task ended abnormally: {e}", self.name);
                }
            }
        }
        log::debug!("view={} deactivated", self.name);
    }
}

impl<T: Clone> ActiveView<T> {
    /// The most recently completed refresh, if any.
    pub fn latest(&self) -> Option<Refresh<T>> {
        self.rx.borrow().clone()
    }
}

impl<T> Drop for ActiveView<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_view<T, F, Fut>(
    name: String,
    schedule: RefreshSchedule,
    mut fetch: F,
    tx: watch::Sender<Option<Refresh<T>>>,
    mut shutdown: oneshot::Receiver<()>,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = T>,
{
    let mut seq = 0u64;
    let start = Instant::now();

    if !fetch_and_publish(&name, &mut fetch, &tx, &mut shutdown, &mut seq).await {
        return;
    }

    let RefreshSchedule::Every(period) = schedule else {
        return;
    };

    let mut ticker = tokio::time::interval_at(start + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
        }
        if !fetch_and_publish(&name, &mut fetch, &tx, &mut shutdown, &mut seq).await {
            break;
        }
    }
}

/// Returns false when shutdown won the race; the fetch result is discarded.
async fn fetch_and_publish<T, F, Fut>(
    name: &str,
    fetch: &mut F,
    tx: &watch::Sender<Option<Refresh<T>>>,
    shutdown: &mut oneshot::Receiver<()>,
    seq: &mut u64,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = &mut *shutdown => false,
        value = fetch() => {
            *seq += 1;
            tx.send_replace(Some(Refresh {
                seq:          *seq,
                completed_at: Instant::now(),
                value,
            }));
            log::debug!("view={name} refresh seq={seq}");
            true
        }
    }
}
