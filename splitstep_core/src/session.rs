//! Session execution engine.
//!
//! A [`Session`] walks an exercise through `ActiveSet(0)`, optional
//! `RestingAfter(i)` phases and `ActiveSet(i+1)` until `Done`. Timer-driven
//! phases advance when their countdown finishes; manual sets advance on
//! [`Session::complete_set`].
//!
//! The session is owned by a single task. Countdown events reach it over one
//! mpsc channel and carry the generation they were started for, so a tick
//! from a phase that has already been left is discarded instead of acted on.

use crate::duration::format_mmss;
use crate::sequencer;
use crate::timer::{Countdown, TimerEvent, TimerHandle, TICK_PERIOD};
use crate::{Error, ExerciseDefinition, Phase, Result, SessionEvent, SessionSummary};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Mutable state of a started session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionState {
    pub phase: Phase,
    /// Remaining seconds of the current countdown, if the phase is timed
    pub remaining: Option<u32>,
    /// Full length of the current countdown, if the phase is timed
    pub total: Option<u32>,
    /// Bumped on every phase change
    pub generation: u64,
}

/// Where a session is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    NotStarted,
    Running,
    Completed,
    Abandoned,
}

pub struct Session {
    id: Uuid,
    definition: ExerciseDefinition,
    state: Option<SessionState>,
    status: SessionStatus,
    timer: Option<TimerHandle>,
    timer_tx: mpsc::UnboundedSender<TimerEvent>,
    timer_rx: mpsc::UnboundedReceiver<TimerEvent>,
    events: mpsc::UnboundedSender<SessionEvent>,
    tick_period: Duration,
    started_at: Option<DateTime<Utc>>,
    listener_gone: bool,
}

impl Session {
    /// Create a session for `definition`, emitting onto `events`.
    ///
    /// The definition is validated up front; nothing runs until [`start`](Self::start).
    pub fn new(
        definition: ExerciseDefinition,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Self> {
        definition.validate()?;
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();

        Ok(Self {
            id: Uuid::new_v4(),
            definition,
            state: None,
            status: SessionStatus::NotStarted,
            timer: None,
            timer_tx,
            timer_rx,
            events,
            tick_period: TICK_PERIOD,
            started_at: None,
            listener_gone: false,
        })
    }

    /// Use a different countdown tick period.
    ///
    /// A zero period fails with [`Error::TimerScheduling`].
    pub fn with_tick_period(mut self, period: Duration) -> Result<Self> {
        if period.is_zero() {
            return Err(Error::TimerScheduling(
                "tick period must be longer than zero".to_string(),
            ));
        }
        self.tick_period = period;
        Ok(self)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn definition(&self) -> &ExerciseDefinition {
        &self.definition
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn state(&self) -> Option<&SessionState> {
        self.state.as_ref()
    }

    /// Current phase; None before start and after cancel.
    pub fn phase(&self) -> Option<Phase> {
        self.state.map(|s| s.phase)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Completed | SessionStatus::Abandoned
        )
    }

    /// Whether a countdown is currently driving the phase.
    pub fn has_active_timer(&self) -> bool {
        self.timer.is_some()
    }

    /// Whether the session is waiting on [`complete_set`](Self::complete_set).
    pub fn awaiting_manual(&self) -> bool {
        self.status == SessionStatus::Running
            && self.timer.is_none()
            && matches!(self.phase(), Some(Phase::ActiveSet(_)))
    }

    /// Enter `ActiveSet(0)`.
    pub fn start(&mut self) -> Result<()> {
        if self.status != SessionStatus::NotStarted {
            return Err(Error::InvalidTransition(format!(
                "session {} already started",
                self.id
            )));
        }

        tracing::info!(
            session_id = %self.id,
            exercise = %self.definition.id,
            sub_type = %self.definition.sub_type(),
            sets = self.definition.sets,
            "Starting session"
        );

        self.status = SessionStatus::Running;
        self.started_at = Some(Utc::now());
        self.state = Some(SessionState {
            phase: Phase::ActiveSet(0),
            remaining: None,
            total: None,
            generation: 0,
        });
        self.enter_phase(Phase::ActiveSet(0))
    }

    /// Manual "set complete" signal for rep and reaction sets.
    pub fn complete_set(&mut self) -> Result<()> {
        if !self.awaiting_manual() {
            return Err(Error::InvalidTransition(format!(
                "no manual set in progress (phase: {:?})",
                self.phase()
            )));
        }
        self.advance()
    }

    /// Move to the phase after the current one.
    pub fn advance(&mut self) -> Result<()> {
        let phase = self.running_phase()?;

        match phase {
            Phase::ActiveSet(i) => match sequencer::rest_after(&self.definition, i)? {
                Some(_) => self.enter_phase(Phase::RestingAfter(i)),
                None => self.finish(),
            },
            Phase::RestingAfter(i) => {
                sequencer::check_set_index(&self.definition, i + 1)?;
                self.enter_phase(Phase::ActiveSet(i + 1))
            }
            Phase::Done => Err(Error::InvalidTransition(
                "session is already done".to_string(),
            )),
        }
    }

    /// Abandon the session. It does not become Done and emits nothing further.
    pub fn cancel(&mut self) {
        if self.is_terminal() {
            return;
        }

        tracing::info!(session_id = %self.id, phase = ?self.phase(), "Session abandoned");
        self.stop_timer();
        self.state = None;
        self.status = SessionStatus::Abandoned;
    }

    /// Wait for the next countdown event and act on it.
    ///
    /// Returns `Ok(false)` without waiting when no countdown is running. A
    /// countdown task that exits without finishing abandons the session with
    /// [`Error::TimerScheduling`].
    pub async fn process_next(&mut self) -> Result<bool> {
        loop {
            let Some(timer) = self.timer.as_mut() else {
                return Ok(false);
            };

            // Queued events win over the exit notice, so a normal finish is
            // always seen before the task is observed as gone.
            let event = tokio::select! {
                biased;
                event = self.timer_rx.recv() => event,
                joined = timer.join() => {
                    self.timer = None;
                    let reason = match joined {
                        Ok(()) => "countdown task exited before finishing".to_string(),
                        Err(e) => format!("countdown task failed: {}", e),
                    };
                    tracing::error!(session_id = %self.id, "{}", reason);
                    self.cancel();
                    return Err(Error::TimerScheduling(reason));
                }
            };

            let Some(event) = event else {
                return Ok(false);
            };
            if self.handle_timer_event(event)? {
                return Ok(true);
            }
        }
    }

    /// Drive timed phases until the session needs a manual signal or ends.
    pub async fn run_until_idle(&mut self) -> Result<()> {
        while self.process_next().await? {}
        Ok(())
    }

    /// Apply one countdown event. Returns false for a stale event.
    fn handle_timer_event(&mut self, event: TimerEvent) -> Result<bool> {
        let Some(state) = self.state.as_mut() else {
            return Ok(false);
        };
        if event.generation() != state.generation {
            tracing::debug!(
                event_generation = event.generation(),
                current_generation = state.generation,
                "Discarding stale timer event"
            );
            return Ok(false);
        }

        match event {
            TimerEvent::Tick { remaining, .. } => {
                state.remaining = Some(remaining);
                let phase = state.phase;
                let total_seconds = state.total.unwrap_or(remaining);
                tracing::debug!(?phase, remaining, "Tick");
                self.emit(SessionEvent::Remaining {
                    phase,
                    seconds: remaining,
                    total_seconds,
                    display: format_mmss(remaining),
                });
            }
            TimerEvent::Finished { .. } => {
                self.timer = None;
                self.advance()?;
            }
        }
        Ok(true)
    }

    fn enter_phase(&mut self, phase: Phase) -> Result<()> {
        self.stop_timer();

        let generation = match self.state.as_mut() {
            Some(state) => {
                state.generation += 1;
                state.phase = phase;
                state.remaining = None;
                state.total = None;
                state.generation
            }
            None => return Err(Error::InvalidTransition("session not started".into())),
        };

        tracing::info!(session_id = %self.id, ?phase, generation, "Phase changed");
        self.emit(SessionEvent::PhaseChanged {
            phase,
            set_index: phase.set_index(),
        });

        let countdown_seconds = match phase {
            Phase::ActiveSet(_) => sequencer::active_duration(&self.definition),
            Phase::RestingAfter(i) => sequencer::rest_after(&self.definition, i)?,
            Phase::Done => None,
        };

        if let Some(seconds) = countdown_seconds {
            let spawned = Countdown::new(seconds)
                .and_then(|c| c.with_period(self.tick_period))
                .and_then(|c| c.spawn(generation, self.timer_tx.clone()));
            match spawned {
                Ok(handle) => {
                    if let Some(state) = self.state.as_mut() {
                        state.remaining = Some(seconds);
                        state.total = Some(seconds);
                    }
                    self.timer = Some(handle);
                }
                Err(e) => {
                    tracing::error!(session_id = %self.id, "Failed to start countdown: {}", e);
                    self.cancel();
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.enter_phase(Phase::Done)?;
        self.status = SessionStatus::Completed;

        let finished_at = Utc::now();
        let summary = SessionSummary {
            session_id: self.id,
            exercise_id: self.definition.id.clone(),
            sets_completed: self.definition.sets,
            started_at: self.started_at.unwrap_or(finished_at),
            finished_at,
        };

        tracing::info!(
            session_id = %self.id,
            sets = summary.sets_completed,
            elapsed_seconds = (summary.finished_at - summary.started_at).num_seconds(),
            "Session complete"
        );
        self.emit(SessionEvent::Completed(summary));
        Ok(())
    }

    fn running_phase(&self) -> Result<Phase> {
        match (self.status, self.state) {
            (SessionStatus::Running, Some(state)) => Ok(state.phase),
            (status, _) => Err(Error::InvalidTransition(format!(
                "session is not running (status: {:?})",
                status
            ))),
        }
    }

    /// Cancel any countdown and drop events it already queued.
    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        while self.timer_rx.try_recv().is_ok() {}
    }

    fn emit(&mut self, event: SessionEvent) {
        if self.events.send(event).is_err() && !self.listener_gone {
            self.listener_gone = true;
            tracing::warn!(session_id = %self.id, "Session listener dropped, events discarded");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExerciseKind;

    fn definition(kind: ExerciseKind, sets: u32, rest: u32) -> ExerciseDefinition {
        ExerciseDefinition {
            id: "drill".into(),
            name: "Drill".into(),
            favorite: false,
            sets,
            rest_duration_seconds: rest,
            kind,
        }
    }

    fn session(def: ExerciseDefinition) -> (Session, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Session::new(def, tx).unwrap(), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(e) = rx.try_recv() {
            events.push(e);
        }
        events
    }

    fn phases(events: &[SessionEvent]) -> Vec<Phase> {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::PhaseChanged { phase, .. } => Some(*phase),
                _ => None,
            })
            .collect()
    }

    /// (phase, remaining) for every tick, in order
    fn ticks(events: &[SessionEvent]) -> Vec<(Phase, u32)> {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Remaining { phase, seconds, .. } => Some((*phase, *seconds)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_reps_without_rest_advances_manually() {
        crate::logging::init_test();
        let (mut s, mut rx) = session(definition(ExerciseKind::Reps { reps: 10 }, 3, 0));

        s.start().unwrap();
        assert!(!s.has_active_timer());
        assert!(s.awaiting_manual());

        for _ in 0..3 {
            s.complete_set().unwrap();
            s.run_until_idle().await.unwrap();
        }

        let events = drain(&mut rx);
        assert_eq!(
            phases(&events),
            vec![
                Phase::ActiveSet(0),
                Phase::ActiveSet(1),
                Phase::ActiveSet(2),
                Phase::Done
            ]
        );
        assert!(ticks(&events).is_empty());
        assert_eq!(s.status(), SessionStatus::Completed);
        assert!(matches!(events.last(), Some(SessionEvent::Completed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reps_with_rest_has_no_trailing_rest() {
        let (mut s, mut rx) = session(definition(ExerciseKind::Reps { reps: 10 }, 3, 2));

        s.start().unwrap();
        for _ in 0..3 {
            s.complete_set().unwrap();
            s.run_until_idle().await.unwrap();
        }

        let events = drain(&mut rx);
        assert_eq!(
            phases(&events),
            vec![
                Phase::ActiveSet(0),
                Phase::RestingAfter(0),
                Phase::ActiveSet(1),
                Phase::RestingAfter(1),
                Phase::ActiveSet(2),
                Phase::Done
            ]
        );
        assert_eq!(
            ticks(&events),
            vec![
                (Phase::RestingAfter(0), 2),
                (Phase::RestingAfter(0), 1),
                (Phase::RestingAfter(0), 0),
                (Phase::RestingAfter(1), 2),
                (Phase::RestingAfter(1), 1),
                (Phase::RestingAfter(1), 0),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_sets_timeline() {
        let (mut s, mut rx) = session(definition(
            ExerciseKind::TimedSets {
                set_duration_seconds: 5,
            },
            2,
            3,
        ));

        s.start().unwrap();
        s.run_until_idle().await.unwrap();
        assert_eq!(s.phase(), Some(Phase::Done));

        let events = drain(&mut rx);
        let mut timeline = Vec::new();
        for e in &events {
            match e {
                SessionEvent::PhaseChanged { phase, .. } => timeline.push(format!("{:?}", phase)),
                SessionEvent::Remaining { seconds, .. } => timeline.push(seconds.to_string()),
                SessionEvent::Completed(_) => timeline.push("completed".into()),
            }
        }
        assert_eq!(
            timeline.join(" "),
            "ActiveSet(0) 5 4 3 2 1 0 RestingAfter(0) 3 2 1 0 ActiveSet(1) 5 4 3 2 1 0 Done completed"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_display_is_formatted() {
        let (mut s, mut rx) = session(definition(
            ExerciseKind::TimedSets {
                set_duration_seconds: 75,
            },
            1,
            0,
        ));

        s.start().unwrap();
        assert!(s.process_next().await.unwrap());

        let events = drain(&mut rx);
        assert_eq!(
            events[1],
            SessionEvent::Remaining {
                phase: Phase::ActiveSet(0),
                seconds: 75,
                total_seconds: 75,
                display: "01:15".into(),
            }
        );
        assert_eq!(s.state().unwrap().remaining, Some(75));
        assert_eq!(s.state().unwrap().total, Some(75));
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_signal_rejected_during_timed_set() {
        let (mut s, _rx) = session(definition(
            ExerciseKind::TimedSets {
                set_duration_seconds: 5,
            },
            2,
            0,
        ));
        s.start().unwrap();
        assert!(matches!(s.complete_set(), Err(Error::InvalidTransition(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_rest_is_not_done() {
        let (mut s, mut rx) = session(definition(ExerciseKind::Reps { reps: 8 }, 2, 10));

        s.start().unwrap();
        s.complete_set().unwrap();
        assert_eq!(s.phase(), Some(Phase::RestingAfter(0)));
        assert!(s.process_next().await.unwrap());
        assert!(s.process_next().await.unwrap());

        s.cancel();
        drain(&mut rx);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!s.process_next().await.unwrap());

        assert!(drain(&mut rx).is_empty());
        assert_eq!(s.status(), SessionStatus::Abandoned);
        assert_eq!(s.phase(), None);
        assert!(s.is_terminal());
        assert!(matches!(s.advance(), Err(Error::InvalidTransition(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_generation_is_discarded() {
        let (mut s, mut rx) = session(definition(
            ExerciseKind::TimedSets {
                set_duration_seconds: 5,
            },
            2,
            0,
        ));
        s.start().unwrap();
        drain(&mut rx);

        let current = s.state().unwrap().generation;
        let stale = TimerEvent::Finished {
            generation: current - 1,
        };
        assert!(!s.handle_timer_event(stale).unwrap());
        assert_eq!(s.phase(), Some(Phase::ActiveSet(0)));
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_increments_per_phase() {
        let (mut s, _rx) = session(definition(ExerciseKind::Reps { reps: 5 }, 2, 0));
        s.start().unwrap();
        let first = s.state().unwrap().generation;
        s.complete_set().unwrap();
        let second = s.state().unwrap().generation;
        assert!(second > first);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_fails() {
        let (mut s, _rx) = session(definition(ExerciseKind::Reps { reps: 5 }, 1, 0));
        s.start().unwrap();
        assert!(matches!(s.start(), Err(Error::InvalidTransition(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaction_sets_are_manual() {
        let (mut s, mut rx) = session(definition(
            ExerciseKind::Reaction {
                reps: 6,
                cones: 4,
                rep_duration_seconds: 3,
            },
            2,
            0,
        ));
        s.start().unwrap();
        assert!(s.awaiting_manual());
        s.complete_set().unwrap();
        s.complete_set().unwrap();

        assert_eq!(s.status(), SessionStatus::Completed);
        assert_eq!(
            phases(&drain(&mut rx)),
            vec![Phase::ActiveSet(0), Phase::ActiveSet(1), Phase::Done]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_listener_does_not_stop_countdown() {
        let (mut s, rx) = session(definition(
            ExerciseKind::TimedSets {
                set_duration_seconds: 3,
            },
            2,
            1,
        ));
        drop(rx);

        s.start().unwrap();
        s.run_until_idle().await.unwrap();
        assert_eq!(s.status(), SessionStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_summary_reports_all_sets() {
        let (mut s, mut rx) = session(definition(ExerciseKind::Reps { reps: 5 }, 2, 0));
        s.start().unwrap();
        s.complete_set().unwrap();
        s.complete_set().unwrap();

        let summary = drain(&mut rx)
            .into_iter()
            .find_map(|e| match e {
                SessionEvent::Completed(summary) => Some(summary),
                _ => None,
            })
            .unwrap();
        assert_eq!(summary.session_id, s.id());
        assert_eq!(summary.exercise_id, "drill");
        assert_eq!(summary.sets_completed, 2);
        assert!(summary.finished_at >= summary.started_at);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rest_ticks_carry_rest_total() {
        let (mut s, mut rx) = session(definition(
            ExerciseKind::TimedSets {
                set_duration_seconds: 4,
            },
            2,
            2,
        ));
        s.start().unwrap();
        s.run_until_idle().await.unwrap();

        let totals: Vec<(Phase, u32)> = drain(&mut rx)
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Remaining {
                    phase,
                    total_seconds,
                    ..
                } => Some((*phase, *total_seconds)),
                _ => None,
            })
            .collect();
        assert!(totals
            .iter()
            .all(|(phase, total)| match phase {
                Phase::ActiveSet(_) => *total == 4,
                Phase::RestingAfter(_) => *total == 2,
                Phase::Done => false,
            }));
        assert_eq!(totals.len(), 5 + 3 + 5);
    }

    #[test]
    fn test_zero_tick_period_rejected() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = Session::new(definition(ExerciseKind::Reps { reps: 5 }, 1, 0), tx)
            .unwrap()
            .with_tick_period(Duration::ZERO);
        assert!(matches!(result, Err(Error::TimerScheduling(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_exiting_early_abandons_session() {
        let (mut s, _rx) = session(definition(
            ExerciseKind::TimedSets {
                set_duration_seconds: 3,
            },
            1,
            0,
        ));
        s.start().unwrap();

        // Swap in a countdown that reports elsewhere, so the session's own
        // channel never sees a Finished before the task exits.
        let generation = s.state().unwrap().generation;
        let (other_tx, _other_rx) = mpsc::unbounded_channel();
        s.stop_timer();
        s.timer = Some(Countdown::new(1).unwrap().spawn(generation, other_tx).unwrap());

        let result = tokio::time::timeout(Duration::from_secs(3600), s.run_until_idle())
            .await
            .expect("session must not hang when its countdown exits");
        assert!(matches!(result, Err(Error::TimerScheduling(_))));
        assert_eq!(s.status(), SessionStatus::Abandoned);
        assert!(!s.has_active_timer());
        assert_eq!(s.phase(), None);
    }

    #[test]
    fn test_invalid_definition_rejected() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = Session::new(definition(ExerciseKind::Reps { reps: 5 }, 0, 0), tx);
        assert!(matches!(result, Err(Error::InvalidDefinition(_))));
    }

    #[test]
    fn test_timer_failure_abandons_session() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut s = Session::new(
            definition(
                ExerciseKind::TimedSets {
                    set_duration_seconds: 5,
                },
                1,
                0,
            ),
            tx,
        )
        .unwrap();

        // No tokio runtime on a plain test thread.
        assert!(matches!(s.start(), Err(Error::TimerScheduling(_))));
        assert_eq!(s.status(), SessionStatus::Abandoned);
        assert!(!s.has_active_timer());
    }
}
