//! Background work that reports back to the UI thread.

use crate::scheduler::{Poster, Scheduler, TimerHandle};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("{0:#}")]
    Failed(anyhow::Error),
    #[error("worker panicked: {0}")]
    Panicked(String),
    #[error("could not start worker: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type TaskOutcome<T> = Result<T, TaskError>;

/// Runs blocking operations on short-lived worker threads and delivers their
/// outcome through the UI scheduler.
pub struct TaskCoordinator<S> {
    poster: Poster<S>,
    in_flight: Arc<AtomicUsize>,
}

impl<S> Clone for TaskCoordinator<S> {
    fn clone(&self) -> Self {
        Self { poster: self.poster.clone(), in_flight: Arc::clone(&self.in_flight) }
    }
}

impl<S: 'static> TaskCoordinator<S> {
    pub fn new(poster: Poster<S>) -> Self {
        Self { poster, in_flight: Arc::new(AtomicUsize::new(0)) }
    }

    /// Operations submitted but whose callbacks have not run yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Returns as soon as the worker is started. Exactly one of the callbacks
    /// later runs on the UI thread.
    pub fn submit<T, Op, OnOk, OnErr>(&self, label: &str, operation: Op, on_success: OnOk, on_failure: OnErr)
    where
        T: Send + 'static,
        Op: FnOnce() -> anyhow::Result<T> + Send + 'static,
        OnOk: FnOnce(&mut S, T) + Send + 'static,
        OnErr: FnOnce(&mut S, TaskError) + Send + 'static,
    {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let deliver = Delivery {
            poster: self.poster.clone(),
            in_flight: Arc::clone(&self.in_flight),
            on_success,
            on_failure,
        };
        // The delivery is needed again if the thread never starts, so it is
        // handed over through a channel instead of being moved into the closure.
        let (tx, rx) = crossbeam_channel::bounded::<Delivery<S, OnOk, OnErr>>(1);
        let name = format!("task-{label}");
        log::debug!("Submitting {name}");
        let spawned = thread::Builder::new().name(name.clone()).spawn(move || {
            let outcome = match panic::catch_unwind(AssertUnwindSafe(operation)) {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(TaskError::Failed(err)),
                Err(payload) => Err(TaskError::Panicked(panic_message(payload.as_ref()))),
            };
            if let Ok(deliver) = rx.recv() {
                deliver.send(outcome);
            }
        });
        match spawned {
            Ok(_) => {
                let _ = tx.send(deliver);
            }
            Err(e) => {
                log::error!("Failed to spawn {name}: {e}");
                deliver.send(Err(TaskError::Spawn(e)));
            }
        }
    }
}

struct Delivery<S, OnOk, OnErr> {
    poster: Poster<S>,
    in_flight: Arc<AtomicUsize>,
    on_success: OnOk,
    on_failure: OnErr,
}

impl<S: 'static, OnOk, OnErr> Delivery<S, OnOk, OnErr> {
    fn send<T>(self, outcome: TaskOutcome<T>)
    where
        T: Send + 'static,
        OnOk: FnOnce(&mut S, T) + Send + 'static,
        OnErr: FnOnce(&mut S, TaskError) + Send + 'static,
    {
        let Delivery { poster, in_flight, on_success, on_failure } = self;
        poster.post(move |state, _| {
            in_flight.fetch_sub(1, Ordering::SeqCst);
            match outcome {
                Ok(value) => on_success(state, value),
                Err(err) => {
                    log::warn!("Background task failed: {err}");
                    on_failure(state, err)
                }
            }
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Collapses a burst of triggers into one job run `quiet` after the last trigger.
#[derive(Debug)]
pub struct Debouncer {
    quiet: Duration,
    pending: Option<TimerHandle>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self { quiet, pending: None }
    }

    pub fn trigger<S>(
        &mut self,
        sched: &mut Scheduler<S>,
        job: impl FnOnce(&mut S, &mut Scheduler<S>) + Send + 'static,
    ) {
        self.cancel(sched);
        self.pending = Some(sched.schedule_after(self.quiet, job));
    }

    pub fn cancel<S>(&mut self, sched: &mut Scheduler<S>) {
        if let Some(handle) = self.pending.take() {
            sched.cancel(handle);
        }
    }

    pub fn is_pending<S>(&self, sched: &Scheduler<S>) -> bool {
        self.pending.is_some_and(|h| sched.is_scheduled(h))
    }
}

/// Monotonic request tokens; only the newest one may apply its result.
#[derive(Debug, Default)]
pub struct RequestSeq {
    latest: u64,
}

impl RequestSeq {
    pub fn next(&mut self) -> u64 {
        self.latest += 1;
        self.latest
    }

    pub fn is_latest(&self, token: u64) -> bool {
        token == self.latest
    }
}
