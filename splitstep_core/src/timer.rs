//! Countdown timer engine.
//!
//! A countdown from `n` emits `n, n-1, ..., 0` (the first value immediately,
//! then one per tick period) and then finishes exactly once. Nothing is
//! scheduled until the countdown is started. Each countdown runs as its own
//! tokio task and delivers onto an mpsc channel so arrival order matches
//! emission order.

use crate::{Error, Result};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval, MissedTickBehavior};

/// Default tick period
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Message produced by a running countdown, tagged with the generation it
/// was started for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerEvent {
    Tick { generation: u64, remaining: u32 },
    Finished { generation: u64 },
}

impl TimerEvent {
    pub fn generation(&self) -> u64 {
        match self {
            TimerEvent::Tick { generation, .. } | TimerEvent::Finished { generation } => {
                *generation
            }
        }
    }
}

/// A countdown that has not been started yet
#[derive(Clone, Copy, Debug)]
pub struct Countdown {
    total_seconds: u32,
    period: Duration,
}

impl Countdown {
    /// Create a countdown of `total_seconds` (at least 1).
    pub fn new(total_seconds: u32) -> Result<Self> {
        if total_seconds == 0 {
            return Err(Error::ZeroDuration);
        }
        Ok(Self {
            total_seconds,
            period: TICK_PERIOD,
        })
    }

    /// Override the tick period (shortened seconds for tests and demos).
    ///
    /// A zero period cannot be scheduled and fails with
    /// [`Error::TimerScheduling`].
    pub fn with_period(mut self, period: Duration) -> Result<Self> {
        if period.is_zero() {
            return Err(Error::TimerScheduling(
                "tick period must be longer than zero".to_string(),
            ));
        }
        self.period = period;
        Ok(self)
    }

    pub fn total_seconds(&self) -> u32 {
        self.total_seconds
    }

    /// Start ticking onto `tx`, tagging every event with `generation`.
    ///
    /// Fails with [`Error::TimerScheduling`] when called outside a tokio
    /// runtime.
    pub fn spawn(self, generation: u64, tx: mpsc::UnboundedSender<TimerEvent>) -> Result<TimerHandle> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::TimerScheduling(e.to_string()))?;

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let task = runtime.spawn(run_countdown(self, generation, tx, cancel_rx));

        tracing::debug!(
            generation,
            total_seconds = self.total_seconds,
            "Countdown started"
        );

        Ok(TimerHandle {
            cancel: Some(cancel_tx),
            task,
        })
    }

    /// Start ticking onto a private channel and return the receiving end.
    pub fn start(self) -> Result<CountdownReceiver> {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = self.spawn(0, tx)?;
        Ok(CountdownReceiver {
            rx,
            handle: Some(handle),
            finished: false,
        })
    }
}

async fn run_countdown(
    countdown: Countdown,
    generation: u64,
    tx: mpsc::UnboundedSender<TimerEvent>,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    // The first tick of a tokio interval completes immediately.
    let mut ticker = interval(countdown.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    for remaining in (0..=countdown.total_seconds).rev() {
        tokio::select! {
            biased;
            _ = &mut cancel_rx => {
                tracing::debug!(generation, remaining, "Countdown cancelled");
                return;
            }
            _ = ticker.tick() => {
                if tx.send(TimerEvent::Tick { generation, remaining }).is_err() {
                    tracing::debug!(generation, "Countdown receiver dropped, stopping");
                    return;
                }
            }
        }
    }

    let _ = tx.send(TimerEvent::Finished { generation });
}

/// Owner of a running countdown task. Dropping it cancels the countdown.
#[derive(Debug)]
pub struct TimerHandle {
    cancel: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Stop the countdown and release its interval.
    pub fn cancel(mut self) {
        self.stop();
    }

    /// Resolve once the countdown task has exited, for whatever reason.
    ///
    /// Must not be awaited again after it has resolved.
    pub(crate) async fn join(&mut self) -> std::result::Result<(), JoinError> {
        (&mut self.task).await
    }

    fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        self.task.abort();
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Consumer side of a standalone countdown.
#[derive(Debug)]
pub struct CountdownReceiver {
    rx: mpsc::UnboundedReceiver<TimerEvent>,
    handle: Option<TimerHandle>,
    finished: bool,
}

impl CountdownReceiver {
    /// Next remaining-seconds value, or None once finished or cancelled.
    pub async fn next(&mut self) -> Option<u32> {
        if self.finished || self.handle.is_none() {
            return None;
        }
        match self.rx.recv().await {
            Some(TimerEvent::Tick { remaining, .. }) => Some(remaining),
            Some(TimerEvent::Finished { .. }) | None => {
                self.finished = true;
                self.handle = None;
                None
            }
        }
    }

    /// Whether the countdown reached zero and reported completion.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Cancel the countdown. No values are returned afterwards.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.cancel();
        }
        while self.rx.try_recv().is_ok() {}
    }
}
