//! Interactive debugger prompt
//!
//! Reads commands from stdin while printing session events as they arrive,
//! so auto-play output appears between prompts.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::common::{config::Config, Error, Result};
use crate::debugger::{
    DebugSession, Environment, SessionEvent, SessionState, SourceRange, StepOutcome,
};

const HELP: &str = "\
Commands:
  step [n]   take n evaluation steps (default 1)
  next       run to the next view() breakpoint
  back       highlight the previous step
  play       start or stop auto-play
  vars       show variables
  stack      show the call stack
  history    list recorded steps
  reset      restart from the beginning
  quit       exit";

/// A parsed prompt command
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Step(usize),
    Next,
    Back,
    Play,
    Vars,
    Stack,
    History,
    Reset,
    Help,
    Quit,
}

fn parse_input(line: &str) -> std::result::Result<Input, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(Input::Step(1));
    };
    let input = match command {
        "s" | "step" => match words.next() {
            Some(n) => Input::Step(n.parse().map_err(|_| format!("not a step count: {n}"))?),
            None => Input::Step(1),
        },
        "n" | "next" => Input::Next,
        "b" | "back" => Input::Back,
        "p" | "play" => Input::Play,
        "v" | "vars" => Input::Vars,
        "bt" | "stack" => Input::Stack,
        "h" | "history" => Input::History,
        "r" | "reset" => Input::Reset,
        "?" | "help" => Input::Help,
        "q" | "quit" | "exit" => Input::Quit,
        other => return Err(format!("unknown command '{other}' (try 'help')")),
    };
    Ok(input)
}

/// Run the prompt until `quit` or end of input
pub async fn run(file: &Path, program: String, env: Environment, config: Config) -> Result<()> {
    let log = crate::common::logging::init_interactive();
    if let Some((path, _)) = &log {
        println!("Logging to {}", path.display());
    }

    let session = DebugSession::shared(config);
    let mut events = session.borrow_mut().take_event_receiver();
    session.borrow_mut().refresh(&program, &env)?;

    println!("Debugging {} ({} view() call(s))", file.display(), session.borrow().views().len());
    println!("{HELP}");
    print_events(&mut events, &program);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match parse_input(&line) {
                    Ok(Input::Quit) => break,
                    Ok(input) => {
                        if let Err(e) = execute(&session, input, &program, &env) {
                            print_error(&e);
                        }
                    }
                    Err(message) => println!("{}", message.yellow()),
                }
                print_events(&mut events, &program);
            }
            Some(event) = events.recv() => {
                print_event(&event, &program);
            }
        }
    }

    session.borrow_mut().close();
    Ok(())
}

fn execute(
    session: &Rc<RefCell<DebugSession>>,
    input: Input,
    program: &str,
    env: &Environment,
) -> Result<()> {
    match input {
        Input::Step(n) => {
            for _ in 0..n.max(1) {
                if session.borrow_mut().step_forward()? == StepOutcome::Complete {
                    break;
                }
            }
        }
        Input::Next => {
            session.borrow_mut().step_to_breakpoint()?;
        }
        Input::Back => {
            if session.borrow().step_backward().is_none() {
                println!("Nothing to go back to");
            }
        }
        Input::Play => {
            let playing = DebugSession::toggle_auto_play(session)?;
            println!("Auto-play {}", if playing { "started" } else { "stopped" });
        }
        Input::Vars => {
            let variables = session.borrow().current_variables();
            if variables.is_empty() {
                println!("No variables");
            }
            for (name, value) in variables {
                println!("  {} = {}", name.bold(), value);
            }
        }
        Input::Stack => {
            let session = session.borrow();
            match session.history().last() {
                Some(snapshot) if !snapshot.stack.is_empty() => {
                    for (i, frame) in snapshot.stack.iter().rev().enumerate() {
                        println!("#{} {}", i, frame);
                    }
                }
                _ => println!("No stack frames"),
            }
        }
        Input::History => {
            let session = session.borrow();
            for snapshot in session.history().iter() {
                let marker = if snapshot.is_breakpoint() { "*" } else { " " };
                println!(
                    "{} {:>5}  {:<10} {}",
                    marker,
                    snapshot.step,
                    snapshot.range.to_string(),
                    excerpt(program, snapshot.range)
                );
            }
        }
        Input::Reset => {
            session.borrow_mut().refresh(program, env)?;
        }
        Input::Help => println!("{HELP}"),
        Input::Quit => {}
    }
    Ok(())
}

fn print_events(events: &mut UnboundedReceiver<SessionEvent>, program: &str) {
    while let Ok(event) = events.try_recv() {
        print_event(&event, program);
    }
}

fn print_event(event: &SessionEvent, program: &str) {
    match event {
        SessionEvent::Highlight { range } => print_highlight(program, *range),
        SessionEvent::BreakpointHit(hit) => {
            println!("{}", format!("Breakpoint (step {})", hit.step).cyan().bold());
            for (pair, value) in hit.labeled_values() {
                let value = value.map(|v| v.to_string()).unwrap_or_else(|| "<not found>".to_string());
                println!("  {} ({}) = {}", pair.label, pair.name, value);
            }
        }
        SessionEvent::Output { text } => println!("{} {}", "console:".dimmed(), text),
        SessionEvent::Error { message } => println!("{}", message.red()),
        SessionEvent::StateChanged { to, .. } => match to {
            SessionState::Complete => println!("{}", "Program complete".green()),
            SessionState::Error => println!("{}", "Session stopped on error".red()),
            _ => {}
        },
        SessionEvent::SnapshotAppended { .. } => {}
    }
}

/// Errors the session can step past are warnings; the rest stop it
fn print_error(error: &Error) {
    if error.is_fatal() {
        println!("{}", error.to_string().red());
    } else {
        println!("{}", error.to_string().yellow());
    }
}

/// First line of the highlighted source, shortened
fn excerpt(program: &str, range: SourceRange) -> String {
    if range.is_empty() {
        return String::new();
    }
    let text = program.get(range.start..range.end).unwrap_or("");
    let first = text.lines().next().unwrap_or("");
    if first.chars().count() > 40 {
        format!("{}...", first.chars().take(40).collect::<String>())
    } else {
        first.to_string()
    }
}

fn print_highlight(program: &str, range: SourceRange) {
    if range.is_empty() {
        return;
    }
    let line_start = program
        .get(..range.start)
        .and_then(|p| p.rfind('\n').map(|i| i + 1))
        .unwrap_or(0);
    let line_end = program
        .get(range.end..)
        .and_then(|rest| rest.find('\n').map(|i| range.end + i))
        .unwrap_or(program.len());
    let (Some(before), Some(active), Some(after)) = (
        program.get(line_start..range.start),
        program.get(range.start..range.end),
        program.get(range.end..line_end),
    ) else {
        return;
    };
    let line = program[..line_start].matches('\n').count() + 1;
    println!("{:>4} | {}{}{}", line, before, active.on_blue(), after);
}
