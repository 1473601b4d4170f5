//! Step engine: owns one interpreter and advances it a step at a time

use std::collections::BTreeMap;
use std::rc::Rc;

use super::breakpoint::{self, ViewDeclaration};
use super::collector;
use super::history::{Snapshot, SourceRange};
use super::resolver::scope_label;
use crate::common::{Error, Result};
use crate::interp::ast::declared_names;
use crate::interp::{
    ExecutionFrame, Interpreter, InterpreterOptions, NativeConverter, Value,
};

/// Global utility returning the environment as JSON text
pub const ENV_JSON_FUNCTION: &str = "getVariablesJSON";

/// Environment of named values supplied at construction
pub type Environment = serde_json::Map<String, serde_json::Value>;

/// Owns the interpreter for one session
pub struct StepEngine {
    interpreter: Interpreter,
    program: Rc<str>,
    converter: Rc<dyn NativeConverter>,
    declared: Vec<String>,
    views: Vec<ViewDeclaration>,
}

impl std::fmt::Debug for StepEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepEngine")
            .field("program_len", &self.program.len())
            .field("declared", &self.declared)
            .field("done", &self.interpreter.is_done())
            .finish()
    }
}

impl StepEngine {
    /// Build an interpreter for `program` with `env` bound as globals
    ///
    /// Fails for blank programs and for programs that do not parse.
    #[tracing::instrument(skip_all, fields(program_len = program.len(), env_len = env.len()))]
    pub fn new(
        program: &str,
        env: &Environment,
        converter: Rc<dyn NativeConverter>,
        options: InterpreterOptions,
    ) -> Result<Self> {
        if program.trim().is_empty() {
            return Err(Error::EmptyProgram);
        }

        let interpreter = Interpreter::new(program, options)?;

        for (name, raw) in env {
            let value = match converter.from_native(raw) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(name = %name, error = %e, "Binding raw environment value");
                    Value::from(raw.to_string())
                }
            };
            interpreter.set_global(name, value);
        }

        let env_json = serde_json::Value::Object(env.clone()).to_string();
        interpreter.set_global(
            ENV_JSON_FUNCTION,
            Value::native(ENV_JSON_FUNCTION, move |_, _| Ok(Value::from(env_json.as_str()))),
        );
        interpreter.set_global(
            breakpoint::VIEW_FUNCTION,
            Value::native(breakpoint::VIEW_FUNCTION, |_, _| Ok(Value::Undefined)),
        );

        let declared = declared_names(interpreter.program());
        let views = breakpoint::scan_views(interpreter.program(), program);
        tracing::debug!(declared = declared.len(), views = views.len(), "Engine ready");

        Ok(Self {
            interpreter,
            program: Rc::from(program),
            converter,
            declared,
            views,
        })
    }

    /// Advance one evaluation step; `Ok(false)` once the program has ended
    pub fn step(&mut self) -> Result<bool> {
        Ok(self.interpreter.step()?)
    }

    /// Stack snapshot, outermost frame first
    pub fn current_stack(&self) -> Vec<ExecutionFrame> {
        self.interpreter.stack()
    }

    /// Last value produced by an expression statement
    pub fn current_value(&self) -> Value {
        self.interpreter.current_value()
    }

    pub fn is_done(&self) -> bool {
        self.interpreter.is_done()
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Variable names the program declares or assigns
    pub fn declared_names(&self) -> &[String] {
        &self.declared
    }

    /// View calls found in the program text
    pub fn views(&self) -> &[ViewDeclaration] {
        &self.views
    }

    pub fn converter(&self) -> &dyn NativeConverter {
        self.converter.as_ref()
    }

    /// Console lines written since the last call
    pub fn take_output(&self) -> Vec<String> {
        self.interpreter.take_output()
    }

    /// Capture the current position as snapshot number `step`
    pub fn snapshot(
        &self,
        step: usize,
        breakpoint_values: BTreeMap<String, serde_json::Value>,
    ) -> Snapshot {
        let stack = self.current_stack();
        let range = stack
            .last()
            .map(|frame| SourceRange::new(frame.node.start, frame.node.end))
            .unwrap_or_default();

        let variables = if stack.is_empty() {
            // A finished program still exposes its globals
            let globals = [ExecutionFrame {
                node: self.interpreter.program().clone(),
                scope: Some(self.interpreter.global_scope().clone()),
                function: None,
            }];
            collector::collect(self.converter(), &globals, &self.declared)
        } else {
            collector::collect(self.converter(), &stack, &self.declared)
        };

        Snapshot {
            step,
            range,
            variables,
            stack: describe_stack(&stack, &self.program),
            timestamp_ms: Snapshot::now_ms(),
            breakpoint_values,
        }
    }
}

/// Human-readable frame descriptions, outermost first
pub fn describe_stack(stack: &[ExecutionFrame], program: &str) -> Vec<String> {
    let len = stack.len();
    stack
        .iter()
        .enumerate()
        .map(|(index, frame)| {
            let node = &frame.node;
            let location = program
                .get(..node.start)
                .map(|prefix| prefix.matches('\n').count() + 1)
                .unwrap_or(1);
            let mut text = format!("{} (line {location})", node.describe());
            if let Some(func) = &frame.function {
                if let crate::interp::NodeKind::FunctionDeclaration(def)
                | crate::interp::NodeKind::FunctionExpression(def) = &func.kind
                {
                    text.push_str(&format!(" in {}", def.display_name()));
                }
            }
            text.push_str(&format!(" [{}]", scope_label(index, len)));
            text
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::JsonConverter;
    use serde_json::json;

    fn engine(src: &str, env: serde_json::Value) -> Result<StepEngine> {
        let env = match env {
            serde_json::Value::Object(map) => map,
            _ => Environment::new(),
        };
        StepEngine::new(
            src,
            &env,
            Rc::new(JsonConverter::default()),
            InterpreterOptions::default(),
        )
    }

    fn run_to_end(engine: &mut StepEngine) {
        while engine.step().unwrap() {}
    }

    #[test]
    fn test_blank_program_is_rejected() {
        assert!(matches!(engine("  \n\t", json!({})), Err(Error::EmptyProgram)));
    }

    #[test]
    fn test_parse_failure_carries_position() {
        match engine("let x = ;", json!({})).unwrap_err() {
            Error::ParseFailed { message } => assert!(message.contains("1:"), "message: {message}"),
            other => panic!("expected parse failure, got {other:?}"),
        }
    }

    #[test]
    fn test_deeply_nested_program_fails_to_parse() {
        let src = format!("var x = {}1{};", "(".repeat(100_000), ")".repeat(100_000));
        match engine(&src, json!({})).unwrap_err() {
            Error::ParseFailed { message } => assert!(message.contains("Nesting too deep")),
            other => panic!("expected parse failure, got {other:?}"),
        }
    }

    #[test]
    fn test_environment_bound_as_globals() {
        let mut e = engine("var y = m * x + b;", json!({"m": 2, "x": 3, "b": 1})).unwrap();
        run_to_end(&mut e);
        let snap = e.snapshot(1, BTreeMap::new());
        assert_eq!(snap.variables.get("y"), Some(&json!(7)));
    }

    #[test]
    fn test_get_variables_json_returns_environment() {
        let mut e = engine("var text = getVariablesJSON();", json!({"a": 1})).unwrap();
        run_to_end(&mut e);
        let snap = e.snapshot(1, BTreeMap::new());
        assert_eq!(snap.variables.get("text"), Some(&json!("{\"a\":1}")));
    }

    #[test]
    fn test_unconvertible_env_entry_binds_raw_text() {
        let env = json!({"deep": [[[1]]]}).as_object().cloned().unwrap();
        let mut e = StepEngine::new(
            "var t = typeof deep;",
            &env,
            Rc::new(JsonConverter::new(1)),
            InterpreterOptions::default(),
        )
        .unwrap();
        run_to_end(&mut e);
        assert_eq!(e.current_value(), Value::Undefined);
        let snap = e.snapshot(1, BTreeMap::new());
        assert_eq!(snap.variables.get("t"), Some(&json!("string")));
    }

    #[test]
    fn test_view_is_a_callable_no_op() {
        let mut e = engine(r#"let x = 1; view([["x", "X"]]); x = 2;"#, json!({})).unwrap();
        let mut hits = 0;
        while e.step().unwrap() {
            if breakpoint::is_at_breakpoint(&e.current_stack()) {
                hits += 1;
            }
        }
        assert!(hits > 0);
        assert_eq!(e.views().len(), 1);
    }

    #[test]
    fn test_initial_snapshot_highlights_whole_program() {
        let src = "let a = 1;";
        let e = engine(src, json!({})).unwrap();
        let snap = e.snapshot(0, BTreeMap::new());
        assert_eq!(snap.step, 0);
        assert_eq!(snap.range, SourceRange::new(0, src.len()));
        assert_eq!(snap.stack.len(), 1);
        assert!(snap.stack[0].starts_with("Program"));
        assert!(snap.breakpoint_values.is_empty());
    }

    #[test]
    fn test_final_snapshot_has_empty_range() {
        let mut e = engine("1 + 1;", json!({})).unwrap();
        run_to_end(&mut e);
        assert!(e.is_done());
        assert_eq!(e.current_value(), Value::from(2.0));
        assert_eq!(e.snapshot(9, BTreeMap::new()).range, SourceRange::default());
    }

    #[test]
    fn test_final_snapshot_keeps_globals() {
        let mut e = engine("let a = 2; let b = a * 3;", json!({})).unwrap();
        run_to_end(&mut e);
        let snap = e.snapshot(1, BTreeMap::new());
        assert!(snap.stack.is_empty());
        assert_eq!(snap.variables.get("b"), Some(&json!(6)));
    }

    #[test]
    fn test_stack_descriptions_name_function_and_scope() {
        let src = "function sq(n) {\n  return n * n;\n}\nsq(3);";
        let mut e = engine(src, json!({})).unwrap();
        loop {
            assert!(e.step().unwrap(), "never reached the multiplication");
            let stack = e.current_stack();
            if stack.last().map(|f| f.node.type_name()) == Some("BinaryExpression") {
                let described = describe_stack(&stack, src);
                let top = described.last().unwrap();
                assert!(top.contains("BinaryExpression *"), "{top}");
                assert!(top.contains("line 2"), "{top}");
                assert!(top.contains("in sq"), "{top}");
                assert!(top.ends_with("[Local-0]"), "{top}");
                assert!(described[0].ends_with("[Global]"));
                break;
            }
        }
    }
}
