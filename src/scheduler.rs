//! Cooperative scheduler owned by the UI thread.
//!
//! Timers and jobs posted from worker threads are both run from [`Scheduler::pump`],
//! which the UI calls once per frame. Nothing here ever runs a job on the thread
//! that posted it.

use crossbeam_channel::{Receiver, Sender};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub type Job<S> = Box<dyn FnOnce(&mut S, &mut Scheduler<S>) + Send>;

type Waker = Arc<dyn Fn() + Send + Sync>;

/// Identifies a scheduled timer. Stays valid (as a no-op) after the timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    deadline: Instant,
    id: u64,
}

pub struct Scheduler<S> {
    timers: BTreeMap<(Instant, u64), Job<S>>,
    next_id: u64,
    now: Instant,
    inbox: Receiver<Job<S>>,
    outbox: Sender<Job<S>>,
    waker: Option<Waker>,
}

/// Cross-thread handle that hands a job back to the UI thread.
pub struct Poster<S> {
    tx: Sender<Job<S>>,
    waker: Option<Waker>,
}

impl<S> Clone for Poster<S> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone(), waker: self.waker.clone() }
    }
}

impl<S> Poster<S> {
    pub fn post(&self, job: impl FnOnce(&mut S, &mut Scheduler<S>) + Send + 'static) {
        if self.tx.send(Box::new(job)).is_err() {
            log::warn!("UI scheduler is gone; dropping posted job");
            return;
        }
        if let Some(wake) = &self.waker {
            wake();
        }
    }
}

impl<S> Default for Scheduler<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Scheduler<S> {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(now: Instant) -> Self {
        let (outbox, inbox) = crossbeam_channel::unbounded();
        Self { timers: BTreeMap::new(), next_id: 0, now, inbox, outbox, waker: None }
    }

    /// Installs the callback used to wake the UI loop when a job is posted.
    /// Only posters created afterwards carry it.
    pub fn set_waker(&mut self, wake: impl Fn() + Send + Sync + 'static) {
        self.waker = Some(Arc::new(wake));
    }

    pub fn poster(&self) -> Poster<S> {
        Poster { tx: self.outbox.clone(), waker: self.waker.clone() }
    }

    /// Time as of the last pump.
    #[cfg(test)]
    pub fn now(&self) -> Instant {
        self.now
    }

    pub fn schedule_after(
        &mut self,
        delay: Duration,
        job: impl FnOnce(&mut S, &mut Scheduler<S>) + Send + 'static,
    ) -> TimerHandle {
        self.insert(self.now + delay, Box::new(job))
    }

    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.timers.remove(&(handle.deadline, handle.id)).is_some()
    }

    pub fn is_scheduled(&self, handle: TimerHandle) -> bool {
        self.timers.contains_key(&(handle.deadline, handle.id))
    }

    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Runs posted jobs, then every timer due at `now`, in deadline order.
    /// Work scheduled while pumping waits for the next pump.
    pub fn pump(&mut self, state: &mut S, now: Instant) -> Option<Instant> {
        if now > self.now {
            self.now = now;
        }
        while let Ok(job) = self.inbox.try_recv() {
            self.insert(self.now, job);
        }

        let watermark = self.next_id;
        loop {
            let due = match self.timers.first_key_value() {
                Some((&(deadline, id), _)) => deadline <= self.now && id < watermark,
                None => false,
            };
            if !due {
                break;
            }
            if let Some((_, job)) = self.timers.pop_first() {
                job(state, self);
            }
        }
        self.next_deadline()
    }

    fn insert(&mut self, deadline: Instant, job: Job<S>) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.timers.insert((deadline, id), job);
        TimerHandle { deadline, id }
    }
}
