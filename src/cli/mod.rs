//! CLI command handling
//!
//! Dispatches CLI commands to an in-process debug session and formats
//! output.

mod interactive;

use std::collections::BTreeMap;
use std::path::Path;

use crate::commands::Commands;
use crate::common::{config::Config, read_file, Error, Result};
use crate::debugger::{
    self, BreakpointHit, DebugSession, Environment, StepOutcome, ViewDeclaration,
};
use crate::interp::parse_program;
use crate::testing;

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config: Config) -> Result<()> {
    match command {
        Commands::Run { file, env, json } => {
            let program = read_file(&file)?;
            let env = load_environment(env.as_deref())?;
            let report = run_to_completion(&program, &env, config)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for hit in &report.breakpoints {
                    print_breakpoint_hit(hit);
                }
                for line in &report.output {
                    println!("console: {}", line);
                }
                println!("Completed in {} steps", report.steps);
                print_variables(&report.variables);
            }
            Ok(())
        }

        Commands::Views { file } => {
            let program = read_file(&file)?;
            let ast = parse_program(&program)?;
            let views = debugger::breakpoint::scan_views(&ast, &program);
            print_views(&views);
            Ok(())
        }

        Commands::Debug { file, env } => {
            let program = read_file(&file)?;
            let env = load_environment(env.as_deref())?;
            interactive::run(&file, program, env, config).await
        }

        Commands::Test { paths, verbose } => {
            let mut failed = 0;
            for path in &paths {
                let result = testing::run_scenario(path, verbose)?;
                if !result.passed {
                    failed += 1;
                }
            }
            if failed > 0 {
                return Err(Error::TestAssertion(format!(
                    "{} of {} scenarios failed",
                    failed,
                    paths.len()
                )));
            }
            Ok(())
        }
    }
}

/// Everything a batch run observed
#[derive(Debug, serde::Serialize)]
pub struct RunReport {
    pub steps: usize,
    pub breakpoints: Vec<BreakpointHit>,
    pub variables: BTreeMap<String, serde_json::Value>,
    pub output: Vec<String>,
}

/// Step `program` to completion, collecting every breakpoint hit
pub fn run_to_completion(program: &str, env: &Environment, config: Config) -> Result<RunReport> {
    let mut session = DebugSession::new(config);
    session.refresh(program, env)?;

    let mut breakpoints = Vec::new();
    loop {
        match session.step_to_breakpoint()? {
            StepOutcome::Complete => break,
            StepOutcome::Breakpoint | StepOutcome::Stepped => {
                if let Some(hit) = session.last_breakpoint() {
                    breakpoints.push(hit.clone());
                }
            }
        }
    }

    Ok(RunReport {
        steps: session.history().len() - 1,
        breakpoints,
        variables: session.current_variables(),
        output: session.output().map(str::to_string).collect(),
    })
}

/// Read an environment JSON file, or an empty environment
pub fn load_environment(path: Option<&Path>) -> Result<Environment> {
    match path {
        Some(path) => debugger::parse_environment(&read_file(path)?),
        None => Ok(Environment::new()),
    }
}

fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => format!("{:?}", s),
        other => other.to_string(),
    }
}

fn print_breakpoint_hit(hit: &BreakpointHit) {
    println!("Breakpoint at step {}:", hit.step);
    for (pair, value) in hit.labeled_values() {
        let value = value.map(format_value).unwrap_or_else(|| "<not found>".to_string());
        println!("  {} ({}) = {}", pair.label, pair.name, value);
    }
}

fn print_variables(variables: &BTreeMap<String, serde_json::Value>) {
    if variables.is_empty() {
        println!("No variables");
    } else {
        println!("Variables:");
        for (name, value) in variables {
            println!("  {} = {}", name, format_value(value));
        }
    }
}

fn print_views(views: &[ViewDeclaration]) {
    if views.is_empty() {
        println!("No view() calls found");
        return;
    }
    println!("{} view() call(s):", views.len());
    for (i, view) in views.iter().enumerate() {
        let pairs = view
            .pairs
            .iter()
            .map(|p| format!("{} ({})", p.name, p.label))
            .collect::<Vec<_>>()
            .join(", ");
        println!("  #{} line {}: {}", i + 1, view.line, pairs);
    }
}
