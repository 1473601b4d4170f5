//! Debug session state machine
//!
//! Manages the lifecycle of a debug session from refresh through completion
//! or failure, and emits [`SessionEvent`]s for the presentation layer.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::autoplay::AutoPlay;
use super::breakpoint::{self, ViewDeclaration};
use super::collector::{self, VIEW_ERROR};
use super::engine::{Environment, StepEngine};
use super::events::{BreakpointHit, SessionEvent};
use super::history::{ExecutionHistory, Snapshot, SourceRange};
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::interp::{InterpreterOptions, JsonConverter, NativeConverter};

/// Hard limit on steps taken by a single step-to-breakpoint
pub const MAX_BREAKPOINT_STEPS: usize = 100_000;

/// Debug session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No interpreter
    Idle,
    /// Interpreter built, waiting for a step
    Ready,
    /// A single manual step is executing
    Stepping,
    /// Bulk-stepping toward the next breakpoint
    SteppingToBreakpoint,
    /// Auto-play timer active
    Running,
    /// Program finished
    Complete,
    /// Initialization or execution failed
    Error,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Ready => write!(f, "ready"),
            Self::Stepping => write!(f, "stepping"),
            Self::SteppingToBreakpoint => write!(f, "stepping_to_breakpoint"),
            Self::Running => write!(f, "running"),
            Self::Complete => write!(f, "complete"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl SessionState {
    /// Whether the session can take another step
    pub fn is_steppable(self) -> bool {
        matches!(
            self,
            Self::Ready | Self::Stepping | Self::SteppingToBreakpoint | Self::Running
        )
    }
}

/// Result of a stepping operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// Stepped; more work remains
    Stepped,
    /// Stopped on a `view()` call
    Breakpoint,
    /// The program has finished
    Complete,
}

/// A formula debugging session
pub struct DebugSession {
    config: Config,
    converter: Rc<dyn NativeConverter>,
    state: SessionState,
    engine: Option<StepEngine>,
    history: ExecutionHistory,
    views: Vec<ViewDeclaration>,
    last_breakpoint: Option<BreakpointHit>,
    /// Captured console lines, oldest dropped beyond `output.max_events`
    output: VecDeque<String>,
    last_error: Option<String>,
    autoplay: Option<AutoPlay>,
    events_tx: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl std::fmt::Debug for DebugSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugSession")
            .field("state", &self.state)
            .field("history", &self.history.len())
            .field("views", &self.views.len())
            .field("auto_play", &self.autoplay.is_some())
            .finish()
    }
}

impl DebugSession {
    /// Create an idle session using the JSON converter
    pub fn new(config: Config) -> Self {
        let converter = Rc::new(JsonConverter::new(config.interpreter.max_conversion_depth));
        Self::with_converter(config, converter)
    }

    /// Create an idle session with a custom value converter
    pub fn with_converter(config: Config, converter: Rc<dyn NativeConverter>) -> Self {
        Self {
            config,
            converter,
            state: SessionState::Idle,
            engine: None,
            history: ExecutionHistory::new(),
            views: Vec::new(),
            last_breakpoint: None,
            output: VecDeque::new(),
            last_error: None,
            autoplay: None,
            events_tx: None,
        }
    }

    /// Create an idle session behind the shared handle auto-play needs
    pub fn shared(config: Config) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new(config)))
    }

    /// Receiver for session events
    ///
    /// Each call replaces the previous channel. Events emitted before the
    /// first call are not buffered.
    pub fn take_event_receiver(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events_tx = Some(tx);
        rx
    }

    // === Accessors ===

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn history(&self) -> &ExecutionHistory {
        &self.history
    }

    pub fn views(&self) -> &[ViewDeclaration] {
        &self.views
    }

    pub fn engine(&self) -> Option<&StepEngine> {
        self.engine.as_ref()
    }

    pub fn last_breakpoint(&self) -> Option<&BreakpointHit> {
        self.last_breakpoint.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn output(&self) -> impl Iterator<Item = &str> {
        self.output.iter().map(String::as_str)
    }

    pub fn is_auto_playing(&self) -> bool {
        self.autoplay.is_some()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Variables of the latest snapshot
    pub fn current_variables(&self) -> BTreeMap<String, serde_json::Value> {
        self.history
            .last()
            .map(|s| s.variables.clone())
            .unwrap_or_default()
    }

    // === Lifecycle ===

    /// Replace the session with a fresh one for `program`
    ///
    /// Cancels auto-play and discards the old interpreter and history
    /// whatever the current state.
    pub fn refresh(&mut self, program: &str, env: &Environment) -> Result<()> {
        self.stop_auto_play();
        self.engine = None;
        self.history = ExecutionHistory::new();
        self.views.clear();
        self.last_breakpoint = None;
        self.output.clear();
        self.last_error = None;

        let options = InterpreterOptions {
            max_call_depth: self.config.interpreter.max_call_depth,
            max_conversion_depth: self.config.interpreter.max_conversion_depth,
        };
        let engine = match StepEngine::new(program, env, self.converter.clone(), options) {
            Ok(engine) => engine,
            Err(e) => {
                tracing::warn!(error = %e, "Session initialization failed");
                self.fail(&e);
                return Err(e);
            }
        };

        let snapshot = engine.snapshot(0, BTreeMap::new());
        self.views = engine.views().to_vec();
        self.engine = Some(engine);
        self.record(snapshot);
        self.set_state(SessionState::Ready);

        tracing::info!(views = self.views.len(), "Session ready");
        Ok(())
    }

    /// Tear the session down to `Idle`
    pub fn close(&mut self) {
        self.stop_auto_play();
        self.engine = None;
        self.set_state(SessionState::Idle);
        tracing::info!(snapshots = self.history.len(), "Session closed");
    }

    // === Stepping ===

    /// Take one manual step, cancelling auto-play first
    pub fn step_forward(&mut self) -> Result<StepOutcome> {
        self.stop_auto_play();
        self.check_steppable("step")?;
        if self.state == SessionState::Complete {
            return Ok(StepOutcome::Complete);
        }
        self.step_once()
    }

    /// Step until a `view()` breakpoint or completion
    ///
    /// When already paused at a breakpoint, steps first until that call has
    /// left the stack so the same breakpoint is not reported again.
    pub fn step_to_breakpoint(&mut self) -> Result<StepOutcome> {
        self.stop_auto_play();
        self.check_steppable("step to breakpoint")?;
        if self.state == SessionState::Complete {
            return Ok(StepOutcome::Complete);
        }

        let prior = self.state;
        self.set_state(SessionState::SteppingToBreakpoint);

        // Frame depth and node of a breakpoint we are leaving
        let mut leaving = self.engine.as_ref().and_then(|engine| {
            let stack = engine.current_stack();
            breakpoint::is_at_breakpoint(&stack)
                .then(|| (stack.len() - 1, stack[stack.len() - 1].node.clone()))
        });

        let start = self.history.len();
        for _ in 0..MAX_BREAKPOINT_STEPS {
            let outcome = self.step_once()?;
            if outcome == StepOutcome::Complete {
                tracing::debug!(steps = self.history.len() - start, "Ran to completion");
                return Ok(StepOutcome::Complete);
            }

            if let Some((depth, node)) = &leaving {
                let stack = self.current_stack();
                let still_there = stack
                    .get(*depth)
                    .is_some_and(|frame| Rc::ptr_eq(&frame.node, node));
                if still_there {
                    continue;
                }
                leaving = None;
            }

            if outcome == StepOutcome::Breakpoint {
                self.set_state(prior);
                tracing::debug!(steps = self.history.len() - start, "Reached breakpoint");
                return Ok(StepOutcome::Breakpoint);
            }
        }

        let err = Error::StepCeilingExceeded(MAX_BREAKPOINT_STEPS);
        tracing::warn!("{err}");
        self.emit(SessionEvent::Error {
            message: err.to_string(),
        });
        self.set_state(prior);
        Err(err)
    }

    /// Re-highlight the second-to-last snapshot
    ///
    /// Never steps, appends or changes state. `None` with fewer than two
    /// snapshots.
    pub fn step_backward(&self) -> Option<SourceRange> {
        let range = self.history.second_to_last()?.range;
        self.emit(SessionEvent::Highlight { range });
        Some(range)
    }

    /// Start auto-play, or stop it if it is running
    ///
    /// Returns whether auto-play is now active. Must be called from within a
    /// [`tokio::task::LocalSet`].
    pub fn toggle_auto_play(session: &Rc<RefCell<Self>>) -> Result<bool> {
        let mut this = session.borrow_mut();
        if this.autoplay.is_some() {
            this.stop_auto_play();
            return Ok(false);
        }

        if !matches!(this.state, SessionState::Ready) {
            return Err(Error::invalid_state("start auto-play", this.state));
        }

        let interval = this.config.autoplay.interval();
        this.set_state(SessionState::Running);
        this.autoplay = Some(AutoPlay::start(session, interval));
        Ok(true)
    }

    /// One timer-driven step
    pub(super) fn auto_step(&mut self) -> Result<StepOutcome> {
        if self.state != SessionState::Running {
            return Err(Error::invalid_state("auto-step", self.state));
        }
        self.step_once()
    }

    // === Internals ===

    fn check_steppable(&self, action: &str) -> Result<()> {
        match self.state {
            SessionState::Idle => Err(Error::SessionNotActive),
            SessionState::Error => Err(Error::invalid_state(action, self.state)),
            _ => Ok(()),
        }
    }

    fn current_stack(&self) -> Vec<crate::interp::ExecutionFrame> {
        self.engine
            .as_ref()
            .map(StepEngine::current_stack)
            .unwrap_or_default()
    }

    /// Advance the engine once and record the result
    fn step_once(&mut self) -> Result<StepOutcome> {
        let prior = self.state;
        self.state = SessionState::Stepping;

        let Some(engine) = self.engine.as_mut() else {
            self.state = prior;
            return Err(Error::SessionNotActive);
        };

        let more = match engine.step() {
            Ok(more) => more,
            Err(e) => {
                self.drain_output();
                tracing::warn!(error = %e, step = self.history.len(), "Execution failed");
                self.state = prior;
                self.fail(&e);
                return Err(e);
            }
        };

        let stack = engine.current_stack();
        let step = self.history.len();
        let hit = if more && breakpoint::is_at_breakpoint(&stack) {
            stack.last().map(|frame| {
                let pairs = breakpoint::extract_view_pairs(&frame.node);
                let names = breakpoint::pair_names(&pairs);
                let values =
                    collector::collect_with_marker(engine.converter(), &stack, &names, VIEW_ERROR);
                BreakpointHit {
                    step,
                    pairs,
                    values,
                }
            })
        } else {
            None
        };

        let snapshot = engine.snapshot(
            step,
            hit.as_ref().map(|h| h.values.clone()).unwrap_or_default(),
        );
        self.record(snapshot);
        self.drain_output();

        let at_breakpoint = hit.is_some();
        if let Some(hit) = hit {
            tracing::debug!(step, pairs = hit.pairs.len(), "Breakpoint hit");
            self.emit(SessionEvent::BreakpointHit(hit.clone()));
            self.last_breakpoint = Some(hit);
        }

        self.state = prior;
        if !more {
            self.cancel_timer();
            self.set_state(SessionState::Complete);
            tracing::info!(steps = step, "Program complete");
            return Ok(StepOutcome::Complete);
        }

        Ok(if at_breakpoint {
            StepOutcome::Breakpoint
        } else {
            StepOutcome::Stepped
        })
    }

    fn record(&mut self, snapshot: Snapshot) {
        let step = snapshot.step;
        let range = snapshot.range;
        self.history.append(snapshot);
        self.emit(SessionEvent::SnapshotAppended { step, range });
        self.emit(SessionEvent::Highlight { range });
    }

    fn drain_output(&mut self) {
        let Some(engine) = &self.engine else {
            return;
        };
        let max = self.config.output.max_events;
        for text in engine.take_output() {
            if max == 0 {
                break;
            }
            while self.output.len() >= max {
                self.output.pop_front();
            }
            self.output.push_back(text.clone());
            self.emit(SessionEvent::Output { text });
        }
    }

    fn fail(&mut self, error: &Error) {
        self.cancel_timer();
        self.last_error = Some(error.to_string());
        self.emit(SessionEvent::Error {
            message: error.to_string(),
        });
        self.set_state(SessionState::Error);
    }

    /// Cancel auto-play, returning from `Running` to `Ready`
    fn stop_auto_play(&mut self) {
        if self.cancel_timer() && self.state == SessionState::Running {
            self.set_state(SessionState::Ready);
        }
    }

    /// Cancel the auto-play task without touching the state
    fn cancel_timer(&mut self) -> bool {
        match self.autoplay.take() {
            Some(autoplay) => {
                autoplay.cancel();
                true
            }
            None => false,
        }
    }

    fn set_state(&mut self, to: SessionState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        tracing::debug!(%from, %to, "Session state changed");
        self.emit(SessionEvent::StateChanged { from, to });
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.events_tx {
            // A dropped receiver only means nobody is listening
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ready(src: &str) -> DebugSession {
        let mut session = DebugSession::new(Config::default());
        session.refresh(src, &Environment::new()).unwrap();
        session
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_refresh_captures_snapshot_zero() {
        let session = ready("let x = 1;");
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.history().len(), 1);
        let first = session.history().get(0).unwrap();
        assert_eq!(first.step, 0);
        assert!(first.breakpoint_values.is_empty());
    }

    #[test]
    fn test_empty_program_enters_error_state() {
        let mut session = DebugSession::new(Config::default());
        let err = session.refresh("   ", &Environment::new()).unwrap_err();
        assert!(matches!(err, Error::EmptyProgram));
        assert_eq!(session.state(), SessionState::Error);
        assert!(session.history().is_empty());
        assert!(session.step_forward().is_err());
    }

    #[test]
    fn test_parse_error_enters_error_state() {
        let mut session = DebugSession::new(Config::default());
        let err = session.refresh("let = 3", &Environment::new()).unwrap_err();
        assert!(matches!(err, Error::ParseFailed { .. }));
        assert_eq!(session.state(), SessionState::Error);
        assert!(session.last_error().is_some());
    }

    #[test]
    fn test_step_in_idle_is_rejected() {
        let mut session = DebugSession::new(Config::default());
        assert!(matches!(session.step_forward(), Err(Error::SessionNotActive)));
    }

    #[test]
    fn test_cyclic_and_oversized_arrays_never_abort() {
        let mut session = ready("var a = [1]; a.push(a); var s = a + ''; console.log(a);");
        while session.step_forward().unwrap() != StepOutcome::Complete {}
        assert_eq!(session.current_variables().get("s"), Some(&json!("1,")));
        assert_eq!(session.output().collect::<Vec<_>>(), vec!["1,"]);

        let mut session = ready("var b = []; b[4000000000] = 1;");
        let err = loop {
            match session.step_forward() {
                Ok(StepOutcome::Complete) => panic!("expected error"),
                Ok(_) => continue,
                Err(e) => break e,
            }
        };
        assert!(matches!(
            err,
            Error::Execution(crate::interp::RuntimeError::Range(_))
        ));
        assert_eq!(session.state(), SessionState::Error);
    }

    #[test]
    fn test_completion_then_no_op_steps() {
        let mut session = ready("x = 1;");
        let mut outcome = StepOutcome::Stepped;
        while outcome != StepOutcome::Complete {
            outcome = session.step_forward().unwrap();
        }
        assert_eq!(session.state(), SessionState::Complete);
        assert_eq!(session.current_variables().get("x"), Some(&json!(1)));

        let len = session.history().len();
        assert_eq!(session.step_forward().unwrap(), StepOutcome::Complete);
        assert_eq!(session.step_to_breakpoint().unwrap(), StepOutcome::Complete);
        assert_eq!(session.history().len(), len);
    }

    #[test]
    fn test_step_backward_never_mutates_history() {
        let mut session = ready("let a = 1; let b = a + 1;");
        assert_eq!(session.step_backward(), None);
        for _ in 0..4 {
            session.step_forward().unwrap();
        }
        let before = session.history().as_slice().to_vec();
        let range = session.step_backward().unwrap();
        assert_eq!(range, before[before.len() - 2].range);
        session.step_backward();
        assert_eq!(session.history().as_slice(), before.as_slice());
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_step_to_breakpoint_end_to_end() {
        let mut session = ready(r#"let x = 1; view([["x","X value"]]); x = 2;"#);
        let mut rx = session.take_event_receiver();

        assert_eq!(session.step_to_breakpoint().unwrap(), StepOutcome::Breakpoint);
        assert_eq!(session.state(), SessionState::Ready);
        let snap = session.history().last().unwrap();
        assert_eq!(snap.breakpoint_values, BTreeMap::from([("x".to_string(), json!(1))]));

        let hits: Vec<BreakpointHit> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::BreakpointHit(hit) => Some(hit),
                _ => None,
            })
            .collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(
            hits[0].pairs,
            vec![breakpoint::ViewPair::new("x", "X value")]
        );

        assert_eq!(session.step_to_breakpoint().unwrap(), StepOutcome::Complete);
        assert_eq!(session.state(), SessionState::Complete);
        assert_eq!(session.current_variables().get("x"), Some(&json!(2)));
    }

    #[test]
    fn test_step_to_breakpoint_moves_between_views_in_a_loop() {
        let src = r#"
            for (let i = 0; i < 3; i++) {
                view([["i", "Index"]]);
            }
        "#;
        let mut session = ready(src);
        let mut seen = Vec::new();
        while session.step_to_breakpoint().unwrap() == StepOutcome::Breakpoint {
            let hit = session.last_breakpoint().unwrap();
            seen.push(hit.values.get("i").cloned());
        }
        assert_eq!(seen, vec![Some(json!(0)), Some(json!(1)), Some(json!(2))]);
    }

    #[test]
    fn test_infinite_loop_hits_step_ceiling() {
        let mut session = ready("while (true) { }");
        let mut rx = session.take_event_receiver();
        let err = session.step_to_breakpoint().unwrap_err();
        assert!(matches!(err, Error::StepCeilingExceeded(MAX_BREAKPOINT_STEPS)));
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.history().len(), MAX_BREAKPOINT_STEPS + 1);
        assert!(drain(&mut rx)
            .iter()
            .any(|e| matches!(e, SessionEvent::Error { .. })));
    }

    #[test]
    fn test_execution_error_keeps_history() {
        let mut session = ready("let a = 1; a = missing;");
        let err = loop {
            match session.step_forward() {
                Ok(_) => continue,
                Err(e) => break e,
            }
        };
        assert!(matches!(err, Error::Execution(_)));
        assert_eq!(session.state(), SessionState::Error);
        assert!(session.history().len() > 1);
        assert!(session.last_error().unwrap().contains("missing"));
        assert!(session.step_to_breakpoint().is_err());
    }

    #[test]
    fn test_events_follow_each_step() {
        let mut session = ready("let a = 1;");
        let mut rx = session.take_event_receiver();
        session.step_forward().unwrap();
        let events = drain(&mut rx);
        assert!(matches!(events[0], SessionEvent::SnapshotAppended { step: 1, .. }));
        assert!(matches!(events[1], SessionEvent::Highlight { .. }));
    }

    #[test]
    fn test_console_output_is_bounded() {
        let mut config = Config::default();
        config.output.max_events = 2;
        let mut session = DebugSession::new(config);
        session
            .refresh(
                "for (let i = 0; i < 5; i++) { console.log(i); }",
                &Environment::new(),
            )
            .unwrap();
        while session.step_forward().unwrap() != StepOutcome::Complete {}
        assert_eq!(session.output().collect::<Vec<_>>(), vec!["3", "4"]);
    }

    #[test]
    fn test_refresh_replaces_session_wholesale() {
        let mut session = ready("let a = 1;");
        session.step_forward().unwrap();
        session.refresh("let b = 2;", &Environment::new()).unwrap();
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.state(), SessionState::Ready);
        session.close();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.engine().is_none());
    }

    #[test]
    fn test_state_display_matches_serde_names() {
        for state in [
            SessionState::Idle,
            SessionState::SteppingToBreakpoint,
            SessionState::Complete,
        ] {
            let serialized = serde_json::to_value(state).unwrap();
            assert_eq!(serialized, json!(state.to_string()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_play_runs_to_completion() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let session = DebugSession::shared(Config::default());
                session
                    .borrow_mut()
                    .refresh("let a = 1; let b = a * 2;", &Environment::new())
                    .unwrap();

                assert!(DebugSession::toggle_auto_play(&session).unwrap());
                assert_eq!(session.borrow().state(), SessionState::Running);

                for _ in 0..200 {
                    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                    if session.borrow().state() == SessionState::Complete {
                        break;
                    }
                }

                let session = session.borrow();
                assert_eq!(session.state(), SessionState::Complete);
                assert!(!session.is_auto_playing());
                assert_eq!(session.current_variables().get("b"), Some(&json!(2)));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_play_stops_on_execution_error() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let session = DebugSession::shared(Config::default());
                session
                    .borrow_mut()
                    .refresh("let a = 1; a = missing;", &Environment::new())
                    .unwrap();

                assert!(DebugSession::toggle_auto_play(&session).unwrap());
                for _ in 0..200 {
                    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                    if session.borrow().state() == SessionState::Error {
                        break;
                    }
                }

                let session = session.borrow();
                assert_eq!(session.state(), SessionState::Error);
                assert!(!session.is_auto_playing());
                assert!(session.history().len() > 1);
                assert_eq!(session.current_variables().get("a"), Some(&json!(1)));
                assert!(session.last_error().unwrap().contains("missing is not defined"));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_cancels_auto_play() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let session = DebugSession::shared(Config::default());
                session
                    .borrow_mut()
                    .refresh("while (true) { }", &Environment::new())
                    .unwrap();

                assert!(DebugSession::toggle_auto_play(&session).unwrap());
                tokio::time::sleep(std::time::Duration::from_millis(2_100)).await;
                let stepped = session.borrow().history().len();
                assert!(stepped > 1);

                assert!(!DebugSession::toggle_auto_play(&session).unwrap());
                assert_eq!(session.borrow().state(), SessionState::Ready);

                tokio::time::sleep(std::time::Duration::from_millis(5_000)).await;
                assert_eq!(session.borrow().history().len(), stepped);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_step_cancels_auto_play() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let session = DebugSession::shared(Config::default());
                session
                    .borrow_mut()
                    .refresh("while (true) { }", &Environment::new())
                    .unwrap();
                DebugSession::toggle_auto_play(&session).unwrap();

                session.borrow_mut().step_forward().unwrap();
                assert!(!session.borrow().is_auto_playing());
                assert_eq!(session.borrow().state(), SessionState::Ready);

                let len = session.borrow().history().len();
                tokio::time::sleep(std::time::Duration::from_millis(5_000)).await;
                assert_eq!(session.borrow().history().len(), len);
            })
            .await;
    }
}
