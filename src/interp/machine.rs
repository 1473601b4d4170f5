//! Frame-stack evaluator
//!
//! Every pending piece of work is a [`Frame`] on an explicit stack. A call
//! to [`Interpreter::step`] performs one unit of work on the top frame:
//! pushing a child node, consuming a child's result, or completing the
//! frame. Child results travel through a single `returned` register.

use std::rc::Rc;

use super::ast::{
    callee_name, BinaryOp, DeclarationKind, LogicalOp, MemberProperty, NodeKind,
    NodeRef, UnaryOp, UpdateOp,
};
use super::builtins::{self, OutputBuffer};
use super::parser::parse_program;
use super::scope::Scope;
use super::value::{Function, Value};
use super::{ParseError, RuntimeError};

/// Call frames in this phase are waiting for the callee's body
const CALL_AWAITING_BODY: u8 = 5;

/// Furthest an assignment may write past the end of an array
const MAX_ARRAY_GAP: usize = 1_000_000;

/// Read-only view of one stack entry, handed to the debugger each step
#[derive(Debug, Clone)]
pub struct ExecutionFrame {
    /// Node being evaluated
    pub node: NodeRef,
    /// Scope the node evaluates in
    pub scope: Option<Rc<Scope>>,
    /// Declaration of the function this frame belongs to, if any
    pub function: Option<NodeRef>,
}

/// Limits applied to a single interpreter
#[derive(Debug, Clone)]
pub struct InterpreterOptions {
    /// Maximum nesting of script function calls
    pub max_call_depth: usize,
    /// Nesting limit for `JSON.stringify` and `console.log` of structures
    pub max_conversion_depth: usize,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self {
            max_call_depth: 256,
            max_conversion_depth: 32,
        }
    }
}

/// Assignment target after its object and key have been evaluated
enum Place {
    Binding(String),
    Property { object: Value, key: String },
}

struct Frame {
    node: NodeRef,
    scope: Rc<Scope>,
    function: Option<NodeRef>,
    phase: u8,
    index: usize,
    values: Vec<Value>,
    this: Value,
    callee: Option<Value>,
    place: Option<Place>,
}

impl Frame {
    fn new(node: NodeRef, scope: Rc<Scope>, function: Option<NodeRef>) -> Self {
        Self {
            node,
            scope,
            function,
            phase: 0,
            index: 0,
            values: Vec::new(),
            this: Value::Undefined,
            callee: None,
            place: None,
        }
    }

    fn is_loop(&self) -> bool {
        matches!(
            self.node.kind,
            NodeKind::ForStatement { .. }
                | NodeKind::WhileStatement { .. }
                | NodeKind::DoWhileStatement { .. }
        )
    }

    fn is_call_boundary(&self) -> bool {
        matches!(self.node.kind, NodeKind::CallExpression { .. })
            && self.phase == CALL_AWAITING_BODY
    }
}

/// A single-stepping interpreter over one parsed program
pub struct Interpreter {
    program: NodeRef,
    global: Rc<Scope>,
    frames: Vec<Frame>,
    returned: Option<Value>,
    last_value: Value,
    output: OutputBuffer,
    options: InterpreterOptions,
    call_depth: usize,
}

impl Interpreter {
    /// Parse `source` and prepare to run it from the first statement
    pub fn new(source: &str, options: InterpreterOptions) -> Result<Self, ParseError> {
        let program = parse_program(source)?;
        let global = Scope::global();
        let output = OutputBuffer::default();
        builtins::install(&global, &output, options.max_conversion_depth);

        if let NodeKind::Program { body } = &program.kind {
            hoist(body, &global);
        }

        let frames = vec![Frame::new(program.clone(), global.clone(), None)];

        Ok(Self {
            program,
            global,
            frames,
            returned: None,
            last_value: Value::Undefined,
            output,
            options,
            call_depth: 0,
        })
    }

    pub fn program(&self) -> &NodeRef {
        &self.program
    }

    pub fn global_scope(&self) -> &Rc<Scope> {
        &self.global
    }

    /// Define (or overwrite) a global binding
    pub fn set_global(&self, name: &str, value: Value) {
        self.global.declare(name, value, false);
    }

    /// Value of the most recent expression statement
    pub fn current_value(&self) -> Value {
        self.last_value.clone()
    }

    pub fn is_done(&self) -> bool {
        self.frames.is_empty()
    }

    /// Snapshot of the stack, outermost frame first
    pub fn stack(&self) -> Vec<ExecutionFrame> {
        self.frames
            .iter()
            .map(|f| ExecutionFrame {
                node: f.node.clone(),
                scope: Some(f.scope.clone()),
                function: f.function.clone(),
            })
            .collect()
    }

    /// Drain lines written by `console.log` since the last call
    pub fn take_output(&self) -> Vec<String> {
        std::mem::take(&mut *self.output.borrow_mut())
    }

    /// Perform one evaluation step
    ///
    /// Returns `Ok(false)` once the program has finished.
    pub fn step(&mut self) -> Result<bool, RuntimeError> {
        let Some(frame) = self.frames.last() else {
            return Ok(false);
        };
        let node = frame.node.clone();
        let top = self.frames.len() - 1;

        match &node.kind {
            NodeKind::Program { body } | NodeKind::BlockStatement { body } => {
                let index = self.frames[top].index;
                match body.get(index) {
                    Some(child) => {
                        self.frames[top].index += 1;
                        self.push(child);
                    }
                    None => self.complete(None),
                }
            }

            NodeKind::ExpressionStatement { expression } => {
                if self.frames[top].phase == 0 {
                    self.frames[top].phase = 1;
                    self.push(expression);
                } else {
                    self.last_value = self.take_returned();
                    self.complete(None);
                }
            }

            NodeKind::VariableDeclaration { kind, declarations } => {
                let frame = &mut self.frames[top];
                let Some(decl) = declarations.get(frame.index) else {
                    self.complete(None);
                    return Ok(self.can_continue());
                };
                let value = if frame.phase == 0 {
                    if let Some(init) = &decl.init {
                        frame.phase = 1;
                        self.push(init);
                        return Ok(self.can_continue());
                    }
                    None
                } else {
                    Some(self.take_returned())
                };

                let scope = self.frames[top].scope.clone();
                declare(&scope, *kind, &decl.name, value);

                let frame = &mut self.frames[top];
                frame.phase = 0;
                frame.index += 1;
                if frame.index >= declarations.len() {
                    self.complete(None);
                }
            }

            NodeKind::FunctionDeclaration(_) | NodeKind::EmptyStatement => self.complete(None),

            NodeKind::IfStatement {
                test,
                consequent,
                alternate,
            } => {
                if self.frames[top].phase == 0 {
                    self.frames[top].phase = 1;
                    self.push(test);
                } else if self.take_returned().truthy() {
                    self.replace_with(consequent);
                } else {
                    match alternate {
                        Some(alt) => self.replace_with(alt),
                        None => self.complete(None),
                    }
                }
            }

            NodeKind::ForStatement {
                init,
                test,
                update,
                body,
            } => loop {
                match self.frames[top].phase {
                    0 => {
                        self.frames[top].phase = 1;
                        if let Some(init) = init {
                            self.push(init);
                            break;
                        }
                    }
                    1 => {
                        self.returned = None;
                        self.frames[top].phase = 2;
                        match test {
                            Some(test) => {
                                self.push(test);
                                break;
                            }
                            None => self.returned = Some(Value::Bool(true)),
                        }
                    }
                    2 => {
                        if self.take_returned().truthy() {
                            self.frames[top].phase = 3;
                            self.push(body);
                        } else {
                            self.complete(None);
                        }
                        break;
                    }
                    3 => {
                        self.returned = None;
                        self.frames[top].phase = 4;
                        if let Some(update) = update {
                            self.push(update);
                            break;
                        }
                    }
                    _ => {
                        self.returned = None;
                        self.frames[top].phase = 1;
                    }
                }
            },

            NodeKind::WhileStatement { test, body } => {
                if self.frames[top].phase == 0 {
                    self.frames[top].phase = 1;
                    self.push(test);
                } else if self.take_returned().truthy() {
                    self.frames[top].phase = 0;
                    self.push(body);
                } else {
                    self.complete(None);
                }
            }

            NodeKind::DoWhileStatement { body, test } => match self.frames[top].phase {
                0 => {
                    self.frames[top].phase = 1;
                    self.push(body);
                }
                1 => {
                    self.frames[top].phase = 2;
                    self.push(test);
                }
                _ => {
                    if self.take_returned().truthy() {
                        self.frames[top].phase = 1;
                        self.push(body);
                    } else {
                        self.complete(None);
                    }
                }
            },

            NodeKind::ReturnStatement { argument } => {
                if self.frames[top].phase == 0 {
                    if let Some(arg) = argument {
                        self.frames[top].phase = 1;
                        self.push(arg);
                        return Ok(self.can_continue());
                    }
                }
                let value = self.take_returned();
                let boundary = self
                    .frames
                    .iter()
                    .rposition(Frame::is_call_boundary)
                    .ok_or_else(|| RuntimeError::Syntax("Illegal return statement".to_string()))?;
                self.frames.truncate(boundary + 1);
                self.returned = Some(value);
            }

            NodeKind::BreakStatement => {
                let target = self.loop_target("break")?;
                self.frames.truncate(target);
                self.returned = None;
            }

            NodeKind::ContinueStatement => {
                let target = self.loop_target("continue")?;
                self.frames.truncate(target + 1);
                let frame = &mut self.frames[target];
                frame.phase = match frame.node.kind {
                    NodeKind::ForStatement { .. } => 3,
                    NodeKind::WhileStatement { .. } => 0,
                    _ => 1,
                };
                self.returned = None;
            }

            NodeKind::ThrowStatement { argument } => {
                if self.frames[top].phase == 0 {
                    self.frames[top].phase = 1;
                    self.push(argument);
                } else {
                    let value = self.take_returned();
                    return Err(RuntimeError::Thrown(value.to_display()));
                }
            }

            // === Expressions ===
            NodeKind::Literal(lit) => {
                let value = match lit {
                    super::ast::Literal::Number(n) => Value::Number(*n),
                    super::ast::Literal::String(s) => Value::from(s.as_str()),
                    super::ast::Literal::Boolean(b) => Value::Bool(*b),
                    super::ast::Literal::Null => Value::Null,
                };
                self.complete(Some(value));
            }

            NodeKind::Identifier { name } => {
                let value = self.frames[top]
                    .scope
                    .lookup(name)
                    .ok_or_else(|| RuntimeError::NotDefined(name.clone()))?;
                self.complete(Some(value));
            }

            NodeKind::ArrayExpression { elements } => {
                self.collect_pending(top);
                let index = self.frames[top].index;
                match elements.get(index) {
                    Some(el) => {
                        self.frames[top].index += 1;
                        self.push(el);
                    }
                    None => {
                        let items = std::mem::take(&mut self.frames[top].values);
                        self.complete(Some(Value::array(items)));
                    }
                }
            }

            NodeKind::ObjectExpression { properties } => {
                self.collect_pending(top);
                let index = self.frames[top].index;
                match properties.get(index) {
                    Some((_, value)) => {
                        self.frames[top].index += 1;
                        self.push(value);
                    }
                    None => {
                        let values = std::mem::take(&mut self.frames[top].values);
                        let props = properties
                            .iter()
                            .map(|(k, _)| k.clone())
                            .zip(values)
                            .collect();
                        self.complete(Some(Value::object(props)));
                    }
                }
            }

            NodeKind::FunctionExpression(def) => {
                let closure = Value::Function(Rc::new(Function::Closure {
                    node: node.clone(),
                    def: def.clone(),
                    scope: self.frames[top].scope.clone(),
                }));
                self.complete(Some(closure));
            }

            NodeKind::UnaryExpression { operator, argument } => {
                if self.frames[top].phase == 0 {
                    // typeof tolerates undeclared identifiers
                    if let (UnaryOp::TypeOf, NodeKind::Identifier { name }) =
                        (operator, &argument.kind)
                    {
                        if self.frames[top].scope.lookup(name).is_none() {
                            self.complete(Some(Value::from("undefined")));
                            return Ok(self.can_continue());
                        }
                    }
                    self.frames[top].phase = 1;
                    self.push(argument);
                } else {
                    let value = self.take_returned();
                    let result = match operator {
                        UnaryOp::Minus => Value::Number(-value.to_number()),
                        UnaryOp::Plus => Value::Number(value.to_number()),
                        UnaryOp::Not => Value::Bool(!value.truthy()),
                        UnaryOp::TypeOf => Value::from(value.type_of()),
                    };
                    self.complete(Some(result));
                }
            }

            NodeKind::BinaryExpression {
                operator,
                left,
                right,
            } => match self.frames[top].phase {
                0 => {
                    self.frames[top].phase = 1;
                    self.push(left);
                }
                1 => {
                    let lhs = self.take_returned();
                    self.frames[top].values.push(lhs);
                    self.frames[top].phase = 2;
                    self.push(right);
                }
                _ => {
                    let rhs = self.take_returned();
                    let lhs = self.frames[top].values.pop().unwrap_or(Value::Undefined);
                    self.complete(Some(binary(*operator, &lhs, &rhs)));
                }
            },

            NodeKind::LogicalExpression {
                operator,
                left,
                right,
            } => match self.frames[top].phase {
                0 => {
                    self.frames[top].phase = 1;
                    self.push(left);
                }
                1 => {
                    let lhs = self.take_returned();
                    let short_circuit = match operator {
                        LogicalOp::And => !lhs.truthy(),
                        LogicalOp::Or => lhs.truthy(),
                    };
                    if short_circuit {
                        self.complete(Some(lhs));
                    } else {
                        self.frames[top].phase = 2;
                        self.push(right);
                    }
                }
                _ => {
                    let rhs = self.take_returned();
                    self.complete(Some(rhs));
                }
            },

            NodeKind::ConditionalExpression {
                test,
                consequent,
                alternate,
            } => {
                if self.frames[top].phase == 0 {
                    self.frames[top].phase = 1;
                    self.push(test);
                } else if self.take_returned().truthy() {
                    self.replace_with(consequent);
                } else {
                    self.replace_with(alternate);
                }
            }

            NodeKind::AssignmentExpression {
                operator,
                target,
                value,
            } => {
                if self.frames[top].phase < 3 && !self.resolve_place(top, target)? {
                    return Ok(self.can_continue());
                }
                if self.frames[top].phase == 3 {
                    self.frames[top].phase = 4;
                    self.push(value);
                } else {
                    let rhs = self.take_returned();
                    let place = self.frames[top].place.take();
                    let Some(place) = place else {
                        return Err(RuntimeError::Syntax(
                            "Invalid assignment target".to_string(),
                        ));
                    };
                    let result = match operator.binary() {
                        Some(op) => binary(op, &self.read_place(top, &place)?, &rhs),
                        None => rhs,
                    };
                    self.write_place(top, place, result.clone())?;
                    self.complete(Some(result));
                }
            }

            NodeKind::UpdateExpression {
                operator,
                prefix,
                argument,
            } => {
                if !self.resolve_place(top, argument)? {
                    return Ok(self.can_continue());
                }
                let place = self.frames[top].place.take().ok_or_else(|| {
                    RuntimeError::Syntax("Invalid update target".to_string())
                })?;
                let old = self.read_place(top, &place)?.to_number();
                let new = match operator {
                    UpdateOp::Increment => old + 1.0,
                    UpdateOp::Decrement => old - 1.0,
                };
                self.write_place(top, place, Value::Number(new))?;
                self.complete(Some(Value::Number(if *prefix { new } else { old })));
            }

            NodeKind::MemberExpression { object, property } => match self.frames[top].phase {
                0 => {
                    self.frames[top].phase = 1;
                    self.push(object);
                }
                1 => {
                    let obj = self.take_returned();
                    match property {
                        MemberProperty::Named(name) => {
                            let value = get_property(&obj, name)?;
                            self.complete(Some(value));
                        }
                        MemberProperty::Computed(expr) => {
                            self.frames[top].this = obj;
                            self.frames[top].phase = 2;
                            self.push(expr);
                        }
                    }
                }
                _ => {
                    let key = property_key(&self.take_returned());
                    let obj = std::mem::replace(&mut self.frames[top].this, Value::Undefined);
                    let value = get_property(&obj, &key)?;
                    self.complete(Some(value));
                }
            },

            NodeKind::CallExpression { callee, arguments } => {
                self.step_call(top, callee, arguments)?;
            }
        }

        Ok(self.can_continue())
    }

    fn can_continue(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Push `node` above the top frame, creating a scope where the node
    /// introduces one
    fn push(&mut self, node: &NodeRef) {
        let (scope, function) = match self.frames.last() {
            Some(top) => (top.scope.clone(), top.function.clone()),
            None => (self.global.clone(), None),
        };
        self.push_in(node, scope, function);
    }

    fn push_in(&mut self, node: &NodeRef, scope: Rc<Scope>, function: Option<NodeRef>) {
        let scope = match &node.kind {
            NodeKind::BlockStatement { body } => {
                let block = Scope::block(&scope);
                hoist(body, &block);
                block
            }
            NodeKind::ForStatement { .. } => Scope::block(&scope),
            _ => scope,
        };
        self.frames.push(Frame::new(node.clone(), scope, function));
    }

    /// Pop the top frame, handing `value` to the frame below
    fn complete(&mut self, value: Option<Value>) {
        self.frames.pop();
        self.returned = value;
    }

    /// Replace the top frame with `node`, evaluated in the same scope
    fn replace_with(&mut self, node: &NodeRef) {
        if let Some(frame) = self.frames.pop() {
            self.returned = None;
            self.push_in(node, frame.scope, frame.function);
        }
    }

    fn take_returned(&mut self) -> Value {
        self.returned.take().unwrap_or(Value::Undefined)
    }

    /// Move a child's result into the frame's value list if one is pending
    fn collect_pending(&mut self, top: usize) {
        if self.frames[top].index > self.frames[top].values.len() {
            let value = self.take_returned();
            self.frames[top].values.push(value);
        }
    }

    /// Index of the innermost loop frame within the current function
    fn loop_target(&self, keyword: &str) -> Result<usize, RuntimeError> {
        let illegal = || RuntimeError::Syntax(format!("Illegal {keyword} statement"));
        let index = self
            .frames
            .iter()
            .rposition(|f| f.is_loop() || f.is_call_boundary())
            .ok_or_else(illegal)?;
        if self.frames[index].is_call_boundary() {
            return Err(illegal());
        }
        Ok(index)
    }

    /// Drive phases 0..=2 of an assignment target
    ///
    /// Returns `Ok(true)` once `place` is set (phase 3), `Ok(false)` when a
    /// child frame was pushed and the step is over.
    fn resolve_place(&mut self, top: usize, target: &NodeRef) -> Result<bool, RuntimeError> {
        match (&target.kind, self.frames[top].phase) {
            (NodeKind::Identifier { name }, _) => {
                self.frames[top].place = Some(Place::Binding(name.clone()));
            }
            (NodeKind::MemberExpression { object, .. }, 0) => {
                self.frames[top].phase = 1;
                self.push(object);
                return Ok(false);
            }
            (NodeKind::MemberExpression { property, .. }, 1) => {
                let obj = self.take_returned();
                match property {
                    MemberProperty::Named(name) => {
                        self.frames[top].place = Some(Place::Property {
                            object: obj,
                            key: name.clone(),
                        });
                    }
                    MemberProperty::Computed(expr) => {
                        self.frames[top].this = obj;
                        self.frames[top].phase = 2;
                        self.push(expr);
                        return Ok(false);
                    }
                }
            }
            (NodeKind::MemberExpression { .. }, _) => {
                let key = property_key(&self.take_returned());
                let obj = std::mem::replace(&mut self.frames[top].this, Value::Undefined);
                self.frames[top].place = Some(Place::Property { object: obj, key });
            }
            _ => {
                return Err(RuntimeError::Syntax(
                    "Invalid left-hand side in assignment".to_string(),
                ))
            }
        }
        self.frames[top].phase = 3;
        Ok(true)
    }

    fn read_place(&self, top: usize, place: &Place) -> Result<Value, RuntimeError> {
        match place {
            Place::Binding(name) => self.frames[top]
                .scope
                .lookup(name)
                .ok_or_else(|| RuntimeError::NotDefined(name.clone())),
            Place::Property { object, key } => get_property(object, key),
        }
    }

    fn write_place(&self, top: usize, place: Place, value: Value) -> Result<(), RuntimeError> {
        match place {
            Place::Binding(name) => {
                let scope = &self.frames[top].scope;
                if !scope.assign(&name, value.clone())? {
                    // Sloppy-mode assignment to an undeclared name creates a global
                    scope.root().declare(&name, value, false);
                }
                Ok(())
            }
            Place::Property { object, key } => set_property(&object, key, value),
        }
    }

    fn step_call(
        &mut self,
        top: usize,
        callee: &NodeRef,
        arguments: &[NodeRef],
    ) -> Result<(), RuntimeError> {
        loop {
            match self.frames[top].phase {
                0 => {
                    if let NodeKind::MemberExpression { object, .. } = &callee.kind {
                        self.frames[top].phase = 1;
                        self.push(object);
                    } else {
                        self.frames[top].phase = 4;
                        self.push(callee);
                    }
                    return Ok(());
                }
                1 => {
                    let this = self.take_returned();
                    let NodeKind::MemberExpression { property, .. } = &callee.kind else {
                        return Err(RuntimeError::Syntax("Invalid method call".to_string()));
                    };
                    match property {
                        MemberProperty::Named(name) => {
                            let func = get_property(&this, name)?;
                            let frame = &mut self.frames[top];
                            frame.this = this;
                            frame.callee = Some(func);
                            frame.phase = 3;
                        }
                        MemberProperty::Computed(expr) => {
                            self.frames[top].this = this;
                            self.frames[top].phase = 2;
                            self.push(expr);
                            return Ok(());
                        }
                    }
                }
                2 => {
                    let key = property_key(&self.take_returned());
                    let func = get_property(&self.frames[top].this, &key)?;
                    self.frames[top].callee = Some(func);
                    self.frames[top].phase = 3;
                }
                4 => {
                    let func = self.take_returned();
                    self.frames[top].callee = Some(func);
                    self.frames[top].phase = 3;
                }
                3 => {
                    self.collect_pending(top);
                    let index = self.frames[top].index;
                    if let Some(arg) = arguments.get(index) {
                        self.frames[top].index += 1;
                        self.push(arg);
                        return Ok(());
                    }
                    return self.invoke(top, callee);
                }
                _ => {
                    let value = self.take_returned();
                    self.call_depth = self.call_depth.saturating_sub(1);
                    self.complete(Some(value));
                    return Ok(());
                }
            }
        }
    }

    fn invoke(&mut self, top: usize, callee: &NodeRef) -> Result<(), RuntimeError> {
        let frame = &mut self.frames[top];
        let func = frame.callee.take().unwrap_or(Value::Undefined);
        let args = std::mem::take(&mut frame.values);
        let this = std::mem::replace(&mut frame.this, Value::Undefined);

        let Value::Function(func) = func else {
            let name = callee_name(callee).unwrap_or_else(|| "expression".to_string());
            return Err(RuntimeError::type_error(format!("{name} is not a function")));
        };

        match func.as_ref() {
            Function::Native { func, .. } => {
                let result = func(&this, &args)?;
                self.complete(Some(result));
            }
            Function::Closure { node, def, scope } => {
                if self.call_depth >= self.options.max_call_depth {
                    return Err(RuntimeError::Range(
                        "Maximum call stack size exceeded".to_string(),
                    ));
                }
                self.call_depth += 1;

                let local = Scope::function(scope);
                for (i, param) in def.params.iter().enumerate() {
                    local.declare(param, args.get(i).cloned().unwrap_or(Value::Undefined), false);
                }
                if let NodeKind::BlockStatement { body } = &def.body.kind {
                    hoist(body, &local);
                }

                self.frames[top].phase = CALL_AWAITING_BODY;
                self.returned = None;
                // The body shares the function scope rather than opening a block
                self.frames
                    .push(Frame::new(def.body.clone(), local, Some(node.clone())));
            }
        }
        Ok(())
    }
}

/// Bind hoisted declarations: function declarations into `scope`, `var`
/// names into the enclosing function scope
fn hoist(body: &[NodeRef], scope: &Rc<Scope>) {
    for stmt in body {
        if let NodeKind::FunctionDeclaration(def) = &stmt.kind {
            if let Some(name) = &def.name {
                let closure = Value::Function(Rc::new(Function::Closure {
                    node: stmt.clone(),
                    def: def.clone(),
                    scope: scope.clone(),
                }));
                scope.declare(name, closure, false);
            }
        }
    }
    let target = scope.function_scope();
    for stmt in body {
        hoist_vars(stmt, &target);
    }
}

fn hoist_vars(node: &NodeRef, scope: &Rc<Scope>) {
    match &node.kind {
        NodeKind::VariableDeclaration {
            kind: DeclarationKind::Var,
            declarations,
        } => {
            for decl in declarations {
                if !scope.has_own(&decl.name) {
                    scope.declare(&decl.name, Value::Undefined, false);
                }
            }
        }
        NodeKind::BlockStatement { body } => {
            for stmt in body {
                hoist_vars(stmt, scope);
            }
        }
        NodeKind::IfStatement {
            consequent,
            alternate,
            ..
        } => {
            hoist_vars(consequent, scope);
            if let Some(alt) = alternate {
                hoist_vars(alt, scope);
            }
        }
        NodeKind::ForStatement { init, body, .. } => {
            if let Some(init) = init {
                hoist_vars(init, scope);
            }
            hoist_vars(body, scope);
        }
        NodeKind::WhileStatement { body, .. } | NodeKind::DoWhileStatement { body, .. } => {
            hoist_vars(body, scope);
        }
        _ => {}
    }
}

fn declare(scope: &Rc<Scope>, kind: DeclarationKind, name: &str, value: Option<Value>) {
    match kind {
        DeclarationKind::Var => {
            let target = scope.function_scope();
            // `var x;` leaves an existing binding alone
            if let Some(value) = value {
                target.declare(name, value, false);
            } else if !target.has_own(name) {
                target.declare(name, Value::Undefined, false);
            }
        }
        DeclarationKind::Let => scope.declare(name, value.unwrap_or(Value::Undefined), false),
        DeclarationKind::Const => scope.declare(name, value.unwrap_or(Value::Undefined), true),
    }
}

fn property_key(value: &Value) -> String {
    value.to_display()
}

fn get_property(object: &Value, key: &str) -> Result<Value, RuntimeError> {
    match object {
        Value::Undefined | Value::Null => Err(RuntimeError::type_error(format!(
            "Cannot read properties of {} (reading '{key}')",
            object.to_display()
        ))),
        Value::Object(props) => Ok(props.borrow().get(key).cloned().unwrap_or(Value::Undefined)),
        other => Ok(builtins::primitive_property(other, key).unwrap_or(Value::Undefined)),
    }
}

fn set_property(object: &Value, key: String, value: Value) -> Result<(), RuntimeError> {
    match object {
        Value::Object(props) => {
            props.borrow_mut().insert(key, value);
            Ok(())
        }
        Value::Array(items) => {
            let index = key.parse::<usize>().map_err(|_| {
                RuntimeError::type_error(format!("Cannot set array property '{key}'"))
            })?;
            let mut items = items.borrow_mut();
            if index >= items.len() {
                if index - items.len() > MAX_ARRAY_GAP {
                    return Err(RuntimeError::Range(format!(
                        "Array index {index} is too far past the end (length {})",
                        items.len()
                    )));
                }
                items.resize(index + 1, Value::Undefined);
            }
            items[index] = value;
            Ok(())
        }
        other => Err(RuntimeError::type_error(format!(
            "Cannot set properties of {} (setting '{key}')",
            other.to_display()
        ))),
    }
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Value {
    let is_text = |v: &Value| {
        matches!(
            v,
            Value::Str(_) | Value::Array(_) | Value::Object(_) | Value::Function(_)
        )
    };
    match op {
        BinaryOp::Add if is_text(lhs) || is_text(rhs) => {
            Value::from(format!("{}{}", lhs.to_display(), rhs.to_display()))
        }
        BinaryOp::Add => Value::Number(lhs.to_number() + rhs.to_number()),
        BinaryOp::Sub => Value::Number(lhs.to_number() - rhs.to_number()),
        BinaryOp::Mul => Value::Number(lhs.to_number() * rhs.to_number()),
        BinaryOp::Div => Value::Number(lhs.to_number() / rhs.to_number()),
        BinaryOp::Mod => Value::Number(lhs.to_number() % rhs.to_number()),
        BinaryOp::Pow => Value::Number(lhs.to_number().powf(rhs.to_number())),
        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::LtEq | BinaryOp::GtEq => {
            let ordering = match (lhs, rhs) {
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => lhs.to_number().partial_cmp(&rhs.to_number()),
            };
            let Some(ordering) = ordering else {
                return Value::Bool(false);
            };
            Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Gt => ordering.is_gt(),
                BinaryOp::LtEq => ordering.is_le(),
                _ => ordering.is_ge(),
            })
        }
        BinaryOp::Eq => Value::Bool(lhs.loose_equals(rhs)),
        BinaryOp::NotEq => Value::Bool(!lhs.loose_equals(rhs)),
        BinaryOp::StrictEq => Value::Bool(lhs.strict_equals(rhs)),
        BinaryOp::StrictNotEq => Value::Bool(!lhs.strict_equals(rhs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Run to completion and return the global binding `name`
    fn eval_global(src: &str, name: &str) -> Value {
        let mut interp = Interpreter::new(src, InterpreterOptions::default()).unwrap();
        let mut steps = 0;
        while interp.step().unwrap() {
            steps += 1;
            assert!(steps < 100_000, "runaway program");
        }
        interp.global_scope().get_own(name).unwrap_or(Value::Undefined)
    }

    #[test]
    fn test_arithmetic_and_precedence() {
        assert_eq!(eval_global("var r = 1 + 2 * 3 - 4 / 2;", "r"), Value::from(5.0));
        assert_eq!(eval_global("var r = 2 ** 3 ** 2;", "r"), Value::from(512.0));
        assert_eq!(eval_global("var r = 7 % 3;", "r"), Value::from(1.0));
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(
            eval_global("var r = 'y = ' + 2 + 1;", "r"),
            Value::from("y = 21")
        );
    }

    #[test]
    fn test_functions_and_closures() {
        let src = "
            function makeAdder(a) { return function (b) { return a + b; }; }
            var add2 = makeAdder(2);
            var r = add2(40);
        ";
        assert_eq!(eval_global(src, "r"), Value::from(42.0));
    }

    #[test]
    fn test_recursion() {
        let src = "function fact(n) { if (n <= 1) { return 1; } return n * fact(n - 1); } var r = fact(5);";
        assert_eq!(eval_global(src, "r"), Value::from(120.0));
    }

    #[test]
    fn test_arrow_functions() {
        let src = "const sq = x => x * x; const add = (a, b) => { return a + b; }; var r = add(sq(3), 1);";
        assert_eq!(eval_global(src, "r"), Value::from(10.0));
    }

    #[test]
    fn test_loops_break_continue() {
        let src = "
            var total = 0;
            for (let i = 0; i < 10; i++) {
                if (i % 2 === 0) { continue; }
                if (i > 7) { break; }
                total += i;
            }
            var n = 0;
            while (true) { n++; if (n >= 3) break; }
            do { n += 10; } while (n < 20);
        ";
        assert_eq!(eval_global(src, "total"), Value::from(16.0));
        assert_eq!(eval_global(src, "n"), Value::from(23.0));
    }

    #[test]
    fn test_arrays_objects_and_methods() {
        let src = "
            var xs = [1, 2];
            xs.push(3);
            xs[4] = 5;
            var o = { w: 0.5, label: 'weight' };
            o.w *= 4;
            var r = xs.length + o.w + o['label'].length;
            var s = (2 / 3).toFixed(2);
        ";
        assert_eq!(eval_global(src, "r"), Value::from(13.0));
        assert_eq!(eval_global(src, "s"), Value::from("0.67"));
    }

    #[test]
    fn test_math_builtins() {
        assert_eq!(
            eval_global("var r = Math.max(1, Math.sqrt(16), Math.abs(-3));", "r"),
            Value::from(4.0)
        );
    }

    #[test]
    fn test_sloppy_assignment_creates_global() {
        assert_eq!(eval_global("x = 1;", "x"), Value::from(1.0));
    }

    #[test]
    fn test_block_scoped_let_shadows() {
        let src = "let a = 1; { let a = 2; var inner = a; } var outer = a;";
        assert_eq!(eval_global(src, "inner"), Value::from(2.0));
        assert_eq!(eval_global(src, "outer"), Value::from(1.0));
    }

    #[test]
    fn test_hoisted_function_called_before_declaration() {
        assert_eq!(
            eval_global("var r = twice(4); function twice(n) { return n * 2; }", "r"),
            Value::from(8.0)
        );
    }

    #[test]
    fn test_reference_error() {
        let mut interp = Interpreter::new("var y = missing + 1;", InterpreterOptions::default()).unwrap();
        let err = loop {
            match interp.step() {
                Ok(true) => continue,
                Ok(false) => panic!("expected error"),
                Err(e) => break e,
            }
        };
        assert_eq!(err, RuntimeError::NotDefined("missing".to_string()));
    }

    #[test]
    fn test_calling_non_function_is_type_error() {
        let mut interp = Interpreter::new("var f = 1; f();", InterpreterOptions::default()).unwrap();
        let err = loop {
            match interp.step() {
                Ok(true) => continue,
                Ok(false) => panic!("expected error"),
                Err(e) => break e,
            }
        };
        assert!(err.to_string().contains("f is not a function"));
    }

    #[test]
    fn test_call_depth_limit() {
        let mut interp = Interpreter::new(
            "function f() { return f(); } f();",
            InterpreterOptions {
                max_call_depth: 16,
                ..InterpreterOptions::default()
            },
        )
        .unwrap();
        let err = loop {
            match interp.step() {
                Ok(true) => continue,
                Ok(false) => panic!("expected error"),
                Err(e) => break e,
            }
        };
        assert!(matches!(err, RuntimeError::Range(_)));
    }

    #[test]
    fn test_distant_array_index_is_range_error() {
        let mut interp =
            Interpreter::new("var a = []; a[4000000000] = 1;", InterpreterOptions::default())
                .unwrap();
        let err = loop {
            match interp.step() {
                Ok(true) => continue,
                Ok(false) => panic!("expected error"),
                Err(e) => break e,
            }
        };
        assert!(matches!(err, RuntimeError::Range(_)));

        // Growing by a modest gap still works
        assert_eq!(eval_global("var a = []; a[9] = 1; var n = a.length;", "n"), Value::from(10.0));
    }

    #[test]
    fn test_cyclic_array_in_string_context() {
        let src = "var a = [1]; a.push(a); var s = a + ''; console.log(a);";
        let mut interp = Interpreter::new(src, InterpreterOptions::default()).unwrap();
        while interp.step().unwrap() {}
        assert_eq!(interp.global_scope().get_own("s"), Some(Value::from("1,")));
        assert_eq!(interp.take_output(), vec!["1,"]);
    }

    #[test]
    fn test_stringify_uses_configured_depth() {
        let src = "var s = JSON.stringify([[[1]]]);";
        let options = InterpreterOptions {
            max_conversion_depth: 1,
            ..InterpreterOptions::default()
        };
        let mut interp = Interpreter::new(src, options).unwrap();
        let err = loop {
            match interp.step() {
                Ok(true) => continue,
                Ok(false) => panic!("expected error"),
                Err(e) => break e,
            }
        };
        assert!(matches!(err, RuntimeError::Type(_)));
        assert_eq!(eval_global(src, "s"), Value::from("[[[1]]]"));
    }

    #[test]
    fn test_const_reassignment_fails() {
        let mut interp = Interpreter::new("const c = 1; c = 2;", InterpreterOptions::default()).unwrap();
        let err = loop {
            match interp.step() {
                Ok(true) => continue,
                Ok(false) => panic!("expected error"),
                Err(e) => break e,
            }
        };
        assert!(err.to_string().contains("constant"));
    }

    #[test]
    fn test_stack_reports_nodes_outermost_first() {
        let mut interp = Interpreter::new("var a = 1 + 2;", InterpreterOptions::default()).unwrap();
        interp.step().unwrap(); // Program pushes the declaration
        interp.step().unwrap(); // declaration pushes the binary expression
        let stack = interp.stack();
        let kinds: Vec<&str> = stack.iter().map(|f| f.node.type_name()).collect();
        assert_eq!(kinds, vec!["Program", "VariableDeclaration", "BinaryExpression"]);
    }

    #[test]
    fn test_function_frames_record_their_function() {
        let src = "function f(p) { return p; } f(1);";
        let mut interp = Interpreter::new(src, InterpreterOptions::default()).unwrap();
        let mut saw_function_frame = false;
        while interp.step().unwrap() {
            if let Some(top) = interp.stack().last() {
                if let Some(func) = &top.function {
                    assert_eq!(func.type_name(), "FunctionDeclaration");
                    saw_function_frame = true;
                }
            }
        }
        assert!(saw_function_frame);
    }

    #[test]
    fn test_console_output_is_captured() {
        let mut interp = Interpreter::new("console.log('a', 1); console.log([1, 2]);", InterpreterOptions::default()).unwrap();
        while interp.step().unwrap() {}
        assert_eq!(interp.take_output(), vec!["a 1", "[1,2]"]);
        assert!(interp.take_output().is_empty());
    }

    #[test]
    fn test_completion_reports_false_once_stack_empties() {
        let mut interp = Interpreter::new("1;", InterpreterOptions::default()).unwrap();
        let mut results = Vec::new();
        loop {
            let more = interp.step().unwrap();
            results.push(more);
            if !more {
                break;
            }
        }
        assert_eq!(results.last(), Some(&false));
        assert!(interp.is_done());
        assert_eq!(interp.current_value(), Value::from(1.0));
        assert!(!interp.step().unwrap());
    }
}
