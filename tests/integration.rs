//! End-to-end integration tests for the formula debugger
//!
//! These tests drive the library's debug session against the fixture
//! scripts and run the `formulize` binary the way a user would.

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

use formulize::debugger::{self, DebugSession, SessionEvent, SessionState, StepOutcome};
use formulize::common::config::Config;
use serde_json::json;

/// Test context with an isolated config directory
struct TestContext {
    /// Temporary directory for this test
    temp_dir: tempfile::TempDir,
    /// Path to fixtures directory
    fixtures_dir: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let fixtures_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures");
        Self {
            temp_dir,
            fixtures_dir,
        }
    }

    fn fixture(&self, name: &str) -> PathBuf {
        self.fixtures_dir.join(name)
    }

    fn read_fixture(&self, name: &str) -> String {
        fs::read_to_string(self.fixture(name)).expect("Failed to read fixture")
    }

    /// Write a config.toml the binary will pick up
    fn write_config(&self, content: &str) {
        let dir = self.temp_dir.path().join("formulize");
        fs::create_dir_all(&dir).expect("Failed to create config dir");
        fs::write(dir.join("config.toml"), content).expect("Failed to write config");
    }

    fn run_formulize(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_formulize"))
            .args(args)
            .env("XDG_CONFIG_HOME", self.temp_dir.path())
            .env("RUST_LOG", "off")
            .output()
            .expect("Failed to run formulize")
    }

    fn run_formulize_ok(&self, args: &[&str]) -> String {
        let output = self.run_formulize(args);
        assert!(
            output.status.success(),
            "formulize {:?} failed:\nstdout: {}\nstderr: {}",
            args,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).into_owned()
    }
}

fn invoice_session(ctx: &TestContext) -> DebugSession {
    let program = ctx.read_fixture("invoice.js");
    let env = debugger::parse_environment(&ctx.read_fixture("invoice.env.json")).unwrap();
    let mut session = DebugSession::new(Config::default());
    session.refresh(&program, &env).unwrap();
    session
}

#[test]
fn test_breakpoints_in_order() {
    let ctx = TestContext::new();
    let mut session = invoice_session(&ctx);
    assert_eq!(session.views().len(), 2);

    let mut subtotals = Vec::new();
    loop {
        match session.step_to_breakpoint().unwrap() {
            StepOutcome::Complete => break,
            _ => {
                let hit = session.last_breakpoint().unwrap();
                if let Some(value) = hit.values.get("subtotal") {
                    subtotals.push(value.clone());
                } else {
                    assert_eq!(hit.values.get("total"), Some(&json!(37.5)));
                }
            }
        }
    }

    assert_eq!(subtotals, vec![json!(20), json!(25)]);
    assert_eq!(session.state(), SessionState::Complete);
    assert_eq!(session.output().collect::<Vec<_>>(), vec!["total 37.50"]);
}

#[test]
fn test_history_steps_are_contiguous() {
    let ctx = TestContext::new();
    let mut session = invoice_session(&ctx);
    while session.step_forward().unwrap() != StepOutcome::Complete {}

    let history = session.history();
    assert!(history.len() > 10);
    for (i, snapshot) in history.iter().enumerate() {
        assert_eq!(snapshot.step, i);
    }
    let breakpoints = history.iter().filter(|s| s.is_breakpoint()).count();
    assert!(breakpoints >= 3);
    assert_eq!(
        session.current_variables().get("total"),
        Some(&json!(37.5))
    );
}

#[test]
fn test_step_backward_highlights_previous_snapshot() {
    let ctx = TestContext::new();
    let mut session = invoice_session(&ctx);
    assert_eq!(session.step_backward(), None);

    session.step_forward().unwrap();
    session.step_forward().unwrap();
    let previous = session.history().second_to_last().unwrap().range;
    let len = session.history().len();

    assert_eq!(session.step_backward(), Some(previous));
    assert_eq!(session.history().len(), len);
}

#[test]
fn test_events_report_breakpoints_and_completion() {
    let ctx = TestContext::new();
    let program = ctx.read_fixture("invoice.js");
    let env = debugger::parse_environment(&ctx.read_fixture("invoice.env.json")).unwrap();
    let mut session = DebugSession::new(Config::default());
    let mut events = session.take_event_receiver();
    session.refresh(&program, &env).unwrap();
    while session.step_to_breakpoint().unwrap() != StepOutcome::Complete {}

    let mut hit_steps = Vec::new();
    let mut completed = false;
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::BreakpointHit(hit) => hit_steps.push(hit.step),
            SessionEvent::StateChanged {
                to: SessionState::Complete,
                ..
            } => completed = true,
            _ => {}
        }
    }
    // Every step that lands on a view() call reports, including the steps
    // taken while leaving one
    assert!(hit_steps.len() >= 3);
    assert!(hit_steps.windows(2).all(|w| w[0] < w[1]));
    assert!(completed);
}

#[test]
fn test_refresh_restarts_from_step_zero() {
    let ctx = TestContext::new();
    let mut session = invoice_session(&ctx);
    session.step_to_breakpoint().unwrap();
    assert!(session.history().len() > 1);

    session
        .refresh("let a = 1;", &debugger::Environment::new())
        .unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.history().len(), 1);
    assert!(session.views().is_empty());
    assert!(session.last_breakpoint().is_none());
}

#[test]
fn test_environment_must_be_object() {
    assert!(debugger::parse_environment("[1, 2]").is_err());
    assert!(debugger::parse_environment("{\"a\": 1}").is_ok());
}

#[test]
fn test_cli_run_json_report() {
    let ctx = TestContext::new();
    let script = ctx.fixture("invoice.js");
    let env = ctx.fixture("invoice.env.json");
    let stdout = ctx.run_formulize_ok(&[
        "run",
        script.to_str().unwrap(),
        "--env",
        env.to_str().unwrap(),
        "--json",
    ]);

    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["breakpoints"].as_array().unwrap().len(), 3);
    assert_eq!(report["variables"]["tax"], json!(12.5));
    assert_eq!(report["output"], json!(["total 37.50"]));
    assert!(report["steps"].as_u64().unwrap() > 0);
}

#[test]
fn test_cli_views_lists_declarations() {
    let ctx = TestContext::new();
    let script = ctx.fixture("invoice.js");
    let stdout = ctx.run_formulize_ok(&["views", script.to_str().unwrap()]);

    assert!(stdout.contains("2 view() call(s)"));
    assert!(stdout.contains("line 9: subtotal (Running subtotal)"));
    assert!(stdout.contains("line 15: tax (Tax), total (Grand total)"));
}

#[test]
fn test_cli_run_reports_parse_errors() {
    let ctx = TestContext::new();
    let script = ctx.temp_dir.path().join("broken.js");
    fs::write(&script, "let = ;").unwrap();

    let output = ctx.run_formulize(&["run", script.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error:"));
}

#[test]
fn test_cli_scenario_passes() {
    let ctx = TestContext::new();
    let scenario = ctx.fixture("invoice.yaml");
    let stdout = ctx.run_formulize_ok(&["test", scenario.to_str().unwrap()]);
    assert!(stdout.contains("Test Passed"));
}

#[test]
fn test_config_loading() {
    let ctx = TestContext::new();
    ctx.write_config("[interpreter]\nmax_call_depth = 8\n");

    let script = ctx.temp_dir.path().join("deep.js");
    fs::write(
        &script,
        "function down(n) { return n == 0 ? 0 : down(n - 1); }\nlet r = down(50);",
    )
    .unwrap();

    let output = ctx.run_formulize(&["run", script.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("call stack"));
}
