#![forbid(unsafe_code)]

//! Control-thread marshalling.
//!
//! Session state is `!Send` and lives on one control thread. Other threads
//! submit closures through a [`ControlHandle`]; the control thread runs them
//! when it calls [`ControlLoop::pump`] and the submitting thread blocks until
//! its closure has run.
//!
//! # How It Works
//!
//! 1. The control thread creates a [`ControlLoop`] owning its state `T`.
//! 2. Worker threads receive cloned [`ControlHandle`]s.
//! 3. [`ControlHandle::run_sync`] sends a job and waits on a one-shot reply
//!    channel.
//! 4. The control thread calls [`ControlLoop::pump`] each run-loop turn (or
//!    [`ControlLoop::pump_timeout`] to wait for work).
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Loop dropped | Control thread finished | `run_sync` returns [`ControlError::Disconnected`] |
//! | Job panicked | Closure panicked on the control thread | Waiting caller gets `Disconnected` |
//! | `run_sync` on the control thread | Would wait on itself | Panics |

use std::sync::mpsc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use tracing::trace;

type Job<T> = Box<dyn FnOnce(&mut T) + Send>;

/// Error returned by [`ControlHandle::run_sync`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlError {
    /// The control loop is gone, or dropped the job without running it.
    Disconnected,
}

impl std::fmt::Display for ControlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "control loop disconnected"),
        }
    }
}

impl std::error::Error for ControlError {}

/// Control-thread side: owns the state and runs submitted jobs.
pub struct ControlLoop<T> {
    state: T,
    tx: mpsc::Sender<Job<T>>,
    rx: mpsc::Receiver<Job<T>>,
    thread: ThreadId,
}

impl<T> std::fmt::Debug for ControlLoop<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlLoop")
            .field("thread", &self.thread)
            .finish_non_exhaustive()
    }
}

impl<T> ControlLoop<T> {
    /// Bind a loop owning `state` to the calling thread.
    #[must_use]
    pub fn new(state: T) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            state,
            tx,
            rx,
            thread: thread::current().id(),
        }
    }

    /// A handle other threads use to reach this loop.
    #[must_use]
    pub fn handle(&self) -> ControlHandle<T> {
        ControlHandle {
            tx: self.tx.clone(),
            control_thread: self.thread,
        }
    }

    /// Whether the calling thread is this loop's control thread.
    #[must_use]
    pub fn is_control_thread(&self) -> bool {
        thread::current().id() == self.thread
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> &T {
        &self.state
    }

    #[inline]
    pub fn state_mut(&mut self) -> &mut T {
        &mut self.state
    }

    /// Run every queued job. Returns how many ran.
    pub fn pump(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job(&mut self.state);
            ran += 1;
        }
        if ran > 0 {
            trace!(jobs = ran, "control loop pumped");
        }
        ran
    }

    /// Wait up to `timeout` for a job, then run everything queued.
    pub fn pump_timeout(&mut self, timeout: Duration) -> usize {
        match self.rx.recv_timeout(timeout) {
            Ok(job) => {
                job(&mut self.state);
                1 + self.pump()
            }
            Err(_) => 0,
        }
    }

    /// Consume the loop, returning its state. Queued jobs are dropped and
    /// their callers see [`ControlError::Disconnected`].
    pub fn into_state(self) -> T {
        self.state
    }
}

/// Cross-thread handle to a [`ControlLoop`].
pub struct ControlHandle<T> {
    tx: mpsc::Sender<Job<T>>,
    control_thread: ThreadId,
}

impl<T> Clone for ControlHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            control_thread: self.control_thread,
        }
    }
}

impl<T> std::fmt::Debug for ControlHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlHandle")
            .field("control_thread", &self.control_thread)
            .finish()
    }
}

impl<T> ControlHandle<T> {
    /// Run `job` on the control thread and wait for its result.
    ///
    /// # Panics
    ///
    /// Panics when called from the control thread itself, which would wait
    /// forever on its own queue.
    pub fn run_sync<R, F>(&self, job: F) -> Result<R, ControlError>
    where
        F: FnOnce(&mut T) -> R + Send + 'static,
        R: Send + 'static,
    {
        assert!(
            thread::current().id() != self.control_thread,
            "ControlHandle::run_sync called on the control thread"
        );
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        let job: Job<T> = Box::new(move |state| {
            // The caller may have given up; nothing to report then.
            let _ = reply_tx.send(job(state));
        });
        self.tx.send(job).map_err(|_| ControlError::Disconnected)?;
        reply_rx.recv().map_err(|_| ControlError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_sync_executes_on_control_thread() {
        let mut control = ControlLoop::new(Vec::<u32>::new());
        let handle = control.handle();
        let worker = thread::spawn(move || {
            handle
                .run_sync(|state: &mut Vec<u32>| {
                    state.push(7);
                    state.len()
                })
                .expect("loop alive")
        });
        let mut ran = 0;
        while ran == 0 {
            ran = control.pump_timeout(Duration::from_millis(50));
        }
        assert_eq!(worker.join().expect("worker"), 1);
        assert_eq!(control.state(), &vec![7]);
    }

    #[test]
    fn dropped_loop_disconnects() {
        let control = ControlLoop::new(0u8);
        let handle = control.handle();
        drop(control);
        let result = thread::spawn(move || handle.run_sync(|n: &mut u8| *n))
            .join()
            .expect("worker");
        assert_eq!(result, Err(ControlError::Disconnected));
    }

    #[test]
    fn pump_without_jobs_is_zero() {
        let mut control = ControlLoop::new(());
        assert!(control.is_control_thread());
        assert_eq!(control.pump(), 0);
        assert_eq!(control.pump_timeout(Duration::from_millis(1)), 0);
    }

    #[test]
    #[should_panic(expected = "control thread")]
    fn run_sync_on_control_thread_panics() {
        let control = ControlLoop::new(());
        let _ = control.handle().run_sync(|_| ());
    }

    #[test]
    fn error_display() {
        assert_eq!(
            ControlError::Disconnected.to_string(),
            "control loop disconnected"
        );
    }
}
