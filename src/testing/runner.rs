//! Test runner implementation
//!
//! Executes test scenarios against an in-process debug session, asserting
//! on structured session data rather than on printed output.

use std::collections::BTreeMap;
use std::path::Path;

use colored::Colorize;

use crate::common::{config::Config, Error, Result};
use crate::debugger::{DebugSession, Environment, StepOutcome};

use super::config::{StepExpectation, TestScenario, TestStep, VariableAssertion};

/// Result of a test run
#[derive(Debug)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub steps_run: usize,
    pub steps_total: usize,
    pub error: Option<String>,
}

/// Session plus the inputs needed to refresh it
struct ScenarioContext {
    session: DebugSession,
    program: String,
    env: Environment,
}

/// Run a test scenario from a YAML file
pub fn run_scenario(path: &Path, verbose: bool) -> Result<TestResult> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read test scenario '{}': {}",
            path.display(),
            e
        ))
    })?;

    let scenario: TestScenario = serde_yaml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse test scenario: {}", e)))?;

    let scenario_dir = path.parent().unwrap_or(Path::new("."));
    let program = load_program(&scenario, scenario_dir)?;

    run_loaded(scenario, program, verbose)
}

/// Resolve the scenario's script, inline or from a file beside it
fn load_program(scenario: &TestScenario, scenario_dir: &Path) -> Result<String> {
    match (&scenario.target.program, &scenario.target.program_file) {
        (Some(program), None) => Ok(program.clone()),
        (None, Some(file)) => {
            let file = if file.is_relative() {
                scenario_dir.join(file)
            } else {
                file.clone()
            };
            crate::common::read_file(&file)
        }
        (Some(_), Some(_)) => Err(Error::Config(
            "Scenario target sets both 'program' and 'program_file'".to_string(),
        )),
        (None, None) => Err(Error::Config(
            "Scenario target needs 'program' or 'program_file'".to_string(),
        )),
    }
}

fn run_loaded(scenario: TestScenario, program: String, verbose: bool) -> Result<TestResult> {
    let steps_total = scenario.steps.len();

    println!(
        "\n{} {}",
        "Running Test:".blue().bold(),
        scenario.name.white().bold()
    );

    if let Some(desc) = &scenario.description {
        println!("  {}", desc.dimmed());
    }

    let mut ctx = ScenarioContext {
        session: DebugSession::new(Config::default()),
        program,
        env: scenario.target.env.clone(),
    };

    println!("\n{}", "Starting debug session...".cyan());
    if let Err(e) = ctx.session.refresh(&ctx.program, &ctx.env) {
        println!("  {} {}", "✗".red(), e);
        return Ok(TestResult {
            name: scenario.name,
            passed: false,
            steps_run: 0,
            steps_total,
            error: Some(e.to_string()),
        });
    }
    if verbose {
        println!(
            "  {} view() call(s), {} environment value(s)",
            ctx.session.views().len(),
            ctx.env.len()
        );
    }
    println!("  {} Session ready", "✓".green());

    println!("\n{}", "Steps:".cyan());

    for (i, step) in scenario.steps.iter().enumerate() {
        let step_num = i + 1;

        if let Err(e) = execute_step(&mut ctx, step, step_num, verbose) {
            println!("  {} Step {}: {}", "✗".red(), step_num, e);
            ctx.session.close();

            return Ok(TestResult {
                name: scenario.name.clone(),
                passed: false,
                steps_run: step_num,
                steps_total,
                error: Some(e.to_string()),
            });
        }
    }

    ctx.session.close();

    println!(
        "\n{} {}\n",
        "✓".green().bold(),
        "Test Passed".green().bold()
    );

    Ok(TestResult {
        name: scenario.name,
        passed: true,
        steps_run: steps_total,
        steps_total,
        error: None,
    })
}

/// Execute a single test step
fn execute_step(
    ctx: &mut ScenarioContext,
    step: &TestStep,
    step_num: usize,
    verbose: bool,
) -> Result<()> {
    match step {
        TestStep::Step { count, expect } => {
            execute_step_step(ctx, count.unwrap_or(1), expect.as_ref(), step_num, verbose)
        }
        TestStep::StepToBreakpoint { expect } => {
            let result = ctx.session.step_to_breakpoint();
            let summary = check_result(result, expect.as_ref())?;
            println!(
                "  {} Step {}: step to breakpoint -> {}",
                "✓".green(),
                step_num,
                summary
            );
            Ok(())
        }
        TestStep::StepBack { highlights } => {
            execute_step_back_step(ctx, highlights.as_deref(), step_num)
        }
        TestStep::Refresh { program, expect } => {
            if let Some(program) = program {
                ctx.program = program.clone();
            }
            let result = ctx
                .session
                .refresh(&ctx.program, &ctx.env)
                .map(|()| StepOutcome::Stepped);
            check_result(result, expect.as_ref())?;
            println!("  {} Step {}: refresh", "✓".green(), step_num);
            Ok(())
        }
        TestStep::ExpectState { state, history_len } => {
            let actual = ctx.session.state();
            if actual != *state {
                return Err(Error::TestAssertion(format!(
                    "Expected state '{}', got '{}'",
                    state, actual
                )));
            }
            if let Some(expected_len) = history_len {
                let len = ctx.session.history().len();
                if len != *expected_len {
                    return Err(Error::TestAssertion(format!(
                        "Expected {} snapshots, got {}",
                        expected_len, len
                    )));
                }
            }
            println!("  {} Step {}: state is {}", "✓".green(), step_num, state);
            Ok(())
        }
        TestStep::InspectVariables { asserts } => {
            execute_inspect_variables_step(ctx, asserts, step_num)
        }
        TestStep::InspectBreakpoint { pairs, values } => {
            execute_inspect_breakpoint_step(ctx, pairs.as_deref(), values.as_ref(), step_num)
        }
        TestStep::CheckOutput { contains, equals } => {
            execute_check_output_step(ctx, contains.as_deref(), equals.as_deref(), step_num)
        }
    }
}

/// Compare a stepping result against its expectation
///
/// Returns a short description of what happened for the report line.
fn check_result(
    result: Result<StepOutcome>,
    expect: Option<&StepExpectation>,
) -> Result<String> {
    let default = StepExpectation::default();
    let expect = expect.unwrap_or(&default);
    let expected_success = expect.success.unwrap_or(true);

    match result {
        Ok(outcome) => {
            if !expected_success {
                return Err(Error::TestAssertion(format!(
                    "Expected failure but got outcome '{:?}'",
                    outcome
                )));
            }
            if let Some(expected) = expect.outcome {
                if outcome != expected {
                    return Err(Error::TestAssertion(format!(
                        "Expected outcome '{:?}', got '{:?}'",
                        expected, outcome
                    )));
                }
            }
            Ok(format!("{:?}", outcome).to_lowercase())
        }
        Err(e) => {
            if expected_success {
                return Err(Error::TestAssertion(format!(
                    "Expected success but got error: {}",
                    e
                )));
            }
            if let Some(expected_substr) = &expect.error_contains {
                let message = e.to_string();
                if !message.contains(expected_substr.as_str()) {
                    return Err(Error::TestAssertion(format!(
                        "Expected error containing '{}', got '{}'",
                        expected_substr, message
                    )));
                }
            }
            Ok(format!("failed as expected ({})", e))
        }
    }
}

/// Execute one or more manual steps
fn execute_step_step(
    ctx: &mut ScenarioContext,
    count: usize,
    expect: Option<&StepExpectation>,
    step_num: usize,
    verbose: bool,
) -> Result<()> {
    let mut result = Ok(StepOutcome::Stepped);
    for _ in 0..count.max(1) {
        result = ctx.session.step_forward();
        if !matches!(result, Ok(StepOutcome::Stepped) | Ok(StepOutcome::Breakpoint)) {
            break;
        }
    }
    let summary = check_result(result, expect)?;

    println!(
        "  {} Step {}: step x{} -> {}",
        "✓".green(),
        step_num,
        count.max(1),
        summary
    );
    if verbose {
        if let Some(snapshot) = ctx.session.history().last() {
            println!(
                "    step {} at {}",
                snapshot.step,
                snapshot.range.to_string().dimmed()
            );
        }
    }
    Ok(())
}

/// Execute a step back and check the highlighted text
fn execute_step_back_step(
    ctx: &mut ScenarioContext,
    highlights: Option<&str>,
    step_num: usize,
) -> Result<()> {
    let Some(range) = ctx.session.step_backward() else {
        return Err(Error::TestAssertion(
            "Nothing to step back to (fewer than two snapshots)".to_string(),
        ));
    };

    if let Some(expected) = highlights {
        let actual = ctx.program.get(range.start..range.end).unwrap_or("");
        if actual != expected {
            return Err(Error::TestAssertion(format!(
                "Expected highlight '{}', got '{}' ({})",
                expected, actual, range
            )));
        }
    }

    println!(
        "  {} Step {}: step back to {}",
        "✓".green(),
        step_num,
        range
    );
    Ok(())
}

/// Execute an inspect variables step
fn execute_inspect_variables_step(
    ctx: &mut ScenarioContext,
    asserts: &[VariableAssertion],
    step_num: usize,
) -> Result<()> {
    let vars = ctx.session.current_variables();

    for assertion in asserts {
        match vars.get(&assertion.name) {
            Some(value) => {
                if assertion.absent {
                    return Err(Error::TestAssertion(format!(
                        "Variable '{}' should be absent, got '{}'",
                        assertion.name, value
                    )));
                }

                if let Some(expected_value) = &assertion.value {
                    if value != expected_value {
                        return Err(Error::TestAssertion(format!(
                            "Variable '{}': expected value '{}', got '{}'",
                            assertion.name, expected_value, value
                        )));
                    }
                }

                if let Some(expected_substr) = &assertion.value_contains {
                    let text = value.to_string();
                    if !text.contains(expected_substr.as_str()) {
                        return Err(Error::TestAssertion(format!(
                            "Variable '{}': expected value containing '{}', got '{}'",
                            assertion.name, expected_substr, text
                        )));
                    }
                }
            }
            None if assertion.absent => {}
            None => {
                let available: Vec<&str> = vars.keys().map(String::as_str).collect();
                return Err(Error::TestAssertion(format!(
                    "Variable '{}' not found. Available: {:?}",
                    assertion.name, available
                )));
            }
        }
    }

    let checked: Vec<&str> = asserts.iter().map(|a| a.name.as_str()).collect();
    println!(
        "  {} Step {}: inspect variables ({:?})",
        "✓".green(),
        step_num,
        checked
    );

    Ok(())
}

/// Execute an inspect breakpoint step
fn execute_inspect_breakpoint_step(
    ctx: &mut ScenarioContext,
    pairs: Option<&[(String, String)]>,
    values: Option<&BTreeMap<String, serde_json::Value>>,
    step_num: usize,
) -> Result<()> {
    let Some(hit) = ctx.session.last_breakpoint() else {
        return Err(Error::TestAssertion("No breakpoint has been hit".to_string()));
    };

    if let Some(expected_pairs) = pairs {
        let actual: Vec<(String, String)> = hit
            .pairs
            .iter()
            .map(|p| (p.name.clone(), p.label.clone()))
            .collect();
        if actual.as_slice() != expected_pairs {
            return Err(Error::TestAssertion(format!(
                "Expected view pairs {:?}, got {:?}",
                expected_pairs, actual
            )));
        }
    }

    if let Some(expected_values) = values {
        for (name, expected) in expected_values {
            match hit.values.get(name) {
                Some(actual) if actual == expected => {}
                Some(actual) => {
                    return Err(Error::TestAssertion(format!(
                        "Breakpoint value '{}': expected '{}', got '{}'",
                        name, expected, actual
                    )));
                }
                None => {
                    return Err(Error::TestAssertion(format!(
                        "Breakpoint value '{}' was not recorded",
                        name
                    )));
                }
            }
        }
    }

    println!(
        "  {} Step {}: inspect breakpoint (step {})",
        "✓".green(),
        step_num,
        hit.step
    );
    Ok(())
}

/// Execute a check output step
fn execute_check_output_step(
    ctx: &mut ScenarioContext,
    contains: Option<&str>,
    equals: Option<&[String]>,
    step_num: usize,
) -> Result<()> {
    let lines: Vec<&str> = ctx.session.output().collect();

    if let Some(expected_substr) = contains {
        if !lines.iter().any(|line| line.contains(expected_substr)) {
            return Err(Error::TestAssertion(format!(
                "Output does not contain '{}'. Got: {:?}",
                expected_substr, lines
            )));
        }
    }

    if let Some(expected) = equals {
        if lines != expected.iter().map(String::as_str).collect::<Vec<_>>() {
            return Err(Error::TestAssertion(format!(
                "Output mismatch. Expected: {:?}, got: {:?}",
                expected, lines
            )));
        }
    }

    println!("  {} Step {}: check output", "✓".green(), step_num);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn scenario_file(yaml: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_passing_scenario() {
        let file = scenario_file(
            r#"
name: total breakpoint
target:
  program: |
    let total = price * qty;
    view([["total", "Total"]]);
  env:
    price: 4
    qty: 3
steps:
  - action: expect_state
    state: ready
    history_len: 1
  - action: step_to_breakpoint
    expect:
      outcome: breakpoint
  - action: inspect_breakpoint
    pairs: [["total", "Total"]]
    values:
      total: 12
  - action: inspect_variables
    asserts:
      - name: total
        value: 12
      - name: missing
        absent: true
  - action: step_to_breakpoint
    expect:
      outcome: complete
  - action: expect_state
    state: complete
"#,
        );
        let result = run_scenario(file.path(), false).unwrap();
        assert!(result.passed, "{:?}", result.error);
        assert_eq!(result.steps_run, 6);
    }

    #[test]
    fn test_failing_assertion_reports_step() {
        let file = scenario_file(
            r#"
name: wrong value
target:
  program: "let a = 1;"
steps:
  - action: step_to_breakpoint
  - action: inspect_variables
    asserts:
      - name: a
        value: 2
"#,
        );
        let result = run_scenario(file.path(), false).unwrap();
        assert!(!result.passed);
        assert_eq!(result.steps_run, 2);
        assert!(result.error.unwrap().contains("expected value '2'"));
    }

    #[test]
    fn test_expected_failure_on_refresh() {
        let file = scenario_file(
            r#"
name: broken refresh
target:
  program: "let a = 1;"
steps:
  - action: refresh
    program: "let = ;"
    expect:
      success: false
  - action: expect_state
    state: error
"#,
        );
        let result = run_scenario(file.path(), false).unwrap();
        assert!(result.passed, "{:?}", result.error);
    }

    #[test]
    fn test_target_needs_program() {
        let file = scenario_file("name: empty\ntarget: {}\nsteps: []\n");
        assert!(matches!(
            run_scenario(file.path(), false),
            Err(Error::Config(_))
        ));
    }
}
