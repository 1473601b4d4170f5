//! Syntax tree for the formula scripting subset
//!
//! Every node records the byte range it was parsed from so the debugger can
//! highlight the code that is currently executing. Node-specific data lives
//! in the [`NodeKind`] variants.

use std::fmt;
use std::rc::Rc;

/// A syntax node with its source byte range
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub start: usize,
    pub end: usize,
    pub kind: NodeKind,
}

/// Shared handle to a syntax node
pub type NodeRef = Rc<Node>;

/// Node payload, keyed by node kind
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Program {
        body: Vec<NodeRef>,
    },

    // === Statements ===
    VariableDeclaration {
        kind: DeclarationKind,
        declarations: Vec<Declarator>,
    },
    FunctionDeclaration(Rc<FunctionDef>),
    ExpressionStatement {
        expression: NodeRef,
    },
    BlockStatement {
        body: Vec<NodeRef>,
    },
    IfStatement {
        test: NodeRef,
        consequent: NodeRef,
        alternate: Option<NodeRef>,
    },
    ForStatement {
        init: Option<NodeRef>,
        test: Option<NodeRef>,
        update: Option<NodeRef>,
        body: NodeRef,
    },
    WhileStatement {
        test: NodeRef,
        body: NodeRef,
    },
    DoWhileStatement {
        body: NodeRef,
        test: NodeRef,
    },
    ReturnStatement {
        argument: Option<NodeRef>,
    },
    BreakStatement,
    ContinueStatement,
    ThrowStatement {
        argument: NodeRef,
    },
    EmptyStatement,

    // === Expressions ===
    Literal(Literal),
    Identifier {
        name: String,
    },
    ArrayExpression {
        elements: Vec<NodeRef>,
    },
    ObjectExpression {
        properties: Vec<(String, NodeRef)>,
    },
    FunctionExpression(Rc<FunctionDef>),
    UnaryExpression {
        operator: UnaryOp,
        argument: NodeRef,
    },
    UpdateExpression {
        operator: UpdateOp,
        prefix: bool,
        argument: NodeRef,
    },
    BinaryExpression {
        operator: BinaryOp,
        left: NodeRef,
        right: NodeRef,
    },
    LogicalExpression {
        operator: LogicalOp,
        left: NodeRef,
        right: NodeRef,
    },
    AssignmentExpression {
        operator: AssignOp,
        target: NodeRef,
        value: NodeRef,
    },
    ConditionalExpression {
        test: NodeRef,
        consequent: NodeRef,
        alternate: NodeRef,
    },
    CallExpression {
        callee: NodeRef,
        arguments: Vec<NodeRef>,
    },
    MemberExpression {
        object: NodeRef,
        property: MemberProperty,
    },
}

/// `var`, `let` or `const`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Var,
    Let,
    Const,
}

impl DeclarationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Var => "var",
            Self::Let => "let",
            Self::Const => "const",
        }
    }
}

/// One `name = init` entry of a variable declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    pub name: String,
    pub init: Option<NodeRef>,
}

/// Shared definition for declarations, expressions and arrow functions
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: Option<String>,
    pub params: Vec<String>,
    /// A block for regular functions, any expression for concise arrows
    pub body: NodeRef,
    pub is_arrow: bool,
}

impl FunctionDef {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

/// Literal values appearing directly in source
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
}

impl Literal {
    /// Text coercion used for `view()` labels and names
    pub fn to_text(&self) -> String {
        match self {
            Literal::Number(n) => super::value::format_number(*n),
            Literal::String(s) => s.clone(),
            Literal::Boolean(b) => b.to_string(),
            Literal::Null => "null".to_string(),
        }
    }
}

/// Property part of a member expression
#[derive(Debug, Clone, PartialEq)]
pub enum MemberProperty {
    /// `obj.name`
    Named(String),
    /// `obj[expr]`
    Computed(NodeRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Minus,
    Plus,
    Not,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
}

impl AssignOp {
    /// The binary operator a compound assignment applies
    pub fn binary(self) -> Option<BinaryOp> {
        match self {
            Self::Assign => None,
            Self::AddAssign => Some(BinaryOp::Add),
            Self::SubAssign => Some(BinaryOp::Sub),
            Self::MulAssign => Some(BinaryOp::Mul),
            Self::DivAssign => Some(BinaryOp::Div),
            Self::ModAssign => Some(BinaryOp::Mod),
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minus => write!(f, "-"),
            Self::Plus => write!(f, "+"),
            Self::Not => write!(f, "!"),
            Self::TypeOf => write!(f, "typeof"),
        }
    }
}

impl fmt::Display for UpdateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Increment => write!(f, "++"),
            Self::Decrement => write!(f, "--"),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Pow => "**",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::LtEq => "<=",
            Self::GtEq => ">=",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::StrictEq => "===",
            Self::StrictNotEq => "!==",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "&&"),
            Self::Or => write!(f, "||"),
        }
    }
}

impl fmt::Display for AssignOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Assign => "=",
            Self::AddAssign => "+=",
            Self::SubAssign => "-=",
            Self::MulAssign => "*=",
            Self::DivAssign => "/=",
            Self::ModAssign => "%=",
        };
        write!(f, "{s}")
    }
}

impl Node {
    pub fn new(start: usize, end: usize, kind: NodeKind) -> NodeRef {
        Rc::new(Self { start, end, kind })
    }

    /// ESTree-style kind tag
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Program { .. } => "Program",
            NodeKind::VariableDeclaration { .. } => "VariableDeclaration",
            NodeKind::FunctionDeclaration(_) => "FunctionDeclaration",
            NodeKind::ExpressionStatement { .. } => "ExpressionStatement",
            NodeKind::BlockStatement { .. } => "BlockStatement",
            NodeKind::IfStatement { .. } => "IfStatement",
            NodeKind::ForStatement { .. } => "ForStatement",
            NodeKind::WhileStatement { .. } => "WhileStatement",
            NodeKind::DoWhileStatement { .. } => "DoWhileStatement",
            NodeKind::ReturnStatement { .. } => "ReturnStatement",
            NodeKind::BreakStatement => "BreakStatement",
            NodeKind::ContinueStatement => "ContinueStatement",
            NodeKind::ThrowStatement { .. } => "ThrowStatement",
            NodeKind::EmptyStatement => "EmptyStatement",
            NodeKind::Literal(_) => "Literal",
            NodeKind::Identifier { .. } => "Identifier",
            NodeKind::ArrayExpression { .. } => "ArrayExpression",
            NodeKind::ObjectExpression { .. } => "ObjectExpression",
            NodeKind::FunctionExpression(def) if def.is_arrow => "ArrowFunctionExpression",
            NodeKind::FunctionExpression(_) => "FunctionExpression",
            NodeKind::UnaryExpression { .. } => "UnaryExpression",
            NodeKind::UpdateExpression { .. } => "UpdateExpression",
            NodeKind::BinaryExpression { .. } => "BinaryExpression",
            NodeKind::LogicalExpression { .. } => "LogicalExpression",
            NodeKind::AssignmentExpression { .. } => "AssignmentExpression",
            NodeKind::ConditionalExpression { .. } => "ConditionalExpression",
            NodeKind::CallExpression { .. } => "CallExpression",
            NodeKind::MemberExpression { .. } => "MemberExpression",
        }
    }

    /// Kind tag plus the kind-specific detail worth showing in a stack trace
    pub fn describe(&self) -> String {
        let detail = match &self.kind {
            NodeKind::VariableDeclaration { kind, declarations } => {
                let names: Vec<&str> = declarations.iter().map(|d| d.name.as_str()).collect();
                Some(format!("{} {}", kind.as_str(), names.join(", ")))
            }
            NodeKind::FunctionDeclaration(def) | NodeKind::FunctionExpression(def) => {
                Some(format!("{}({})", def.display_name(), def.params.join(", ")))
            }
            NodeKind::Identifier { name } => Some(name.clone()),
            NodeKind::Literal(lit) => Some(lit.to_text()),
            NodeKind::UnaryExpression { operator, .. } => Some(operator.to_string()),
            NodeKind::UpdateExpression { operator, .. } => Some(operator.to_string()),
            NodeKind::BinaryExpression { operator, .. } => Some(operator.to_string()),
            NodeKind::LogicalExpression { operator, .. } => Some(operator.to_string()),
            NodeKind::AssignmentExpression {
                operator, target, ..
            } => match &target.kind {
                NodeKind::Identifier { name } => Some(format!("{name} {operator}")),
                _ => Some(operator.to_string()),
            },
            NodeKind::CallExpression { callee, .. } => callee_name(callee).map(|n| format!("{n}()")),
            NodeKind::MemberExpression {
                property: MemberProperty::Named(name),
                ..
            } => Some(format!(".{name}")),
            _ => None,
        };

        match detail {
            Some(detail) => format!("{} {}", self.type_name(), detail),
            None => self.type_name().to_string(),
        }
    }

    /// Source text this node was parsed from
    pub fn source<'a>(&self, program: &'a str) -> &'a str {
        program.get(self.start..self.end).unwrap_or("")
    }
}

/// Name of a plain identifier or dotted member callee, if it has one
pub fn callee_name(callee: &Node) -> Option<String> {
    match &callee.kind {
        NodeKind::Identifier { name } => Some(name.clone()),
        NodeKind::MemberExpression {
            object,
            property: MemberProperty::Named(prop),
        } => callee_name(object).map(|obj| format!("{obj}.{prop}")),
        _ => None,
    }
}

/// Visit `node` and every node beneath it, including function bodies
pub fn walk(node: &NodeRef, visit: &mut dyn FnMut(&NodeRef)) {
    visit(node);
    match &node.kind {
        NodeKind::Program { body } | NodeKind::BlockStatement { body } => {
            for child in body {
                walk(child, visit);
            }
        }
        NodeKind::VariableDeclaration { declarations, .. } => {
            for init in declarations.iter().filter_map(|d| d.init.as_ref()) {
                walk(init, visit);
            }
        }
        NodeKind::FunctionDeclaration(def) | NodeKind::FunctionExpression(def) => {
            walk(&def.body, visit);
        }
        NodeKind::ExpressionStatement { expression } => walk(expression, visit),
        NodeKind::IfStatement {
            test,
            consequent,
            alternate,
        } => {
            walk(test, visit);
            walk(consequent, visit);
            if let Some(alt) = alternate {
                walk(alt, visit);
            }
        }
        NodeKind::ForStatement {
            init,
            test,
            update,
            body,
        } => {
            for part in [init, test, update].into_iter().flatten() {
                walk(part, visit);
            }
            walk(body, visit);
        }
        NodeKind::WhileStatement { test, body } | NodeKind::DoWhileStatement { body, test } => {
            walk(test, visit);
            walk(body, visit);
        }
        NodeKind::ReturnStatement { argument } => {
            if let Some(arg) = argument {
                walk(arg, visit);
            }
        }
        NodeKind::ThrowStatement { argument }
        | NodeKind::UnaryExpression { argument, .. }
        | NodeKind::UpdateExpression { argument, .. } => walk(argument, visit),
        NodeKind::ArrayExpression { elements } => {
            for el in elements {
                walk(el, visit);
            }
        }
        NodeKind::ObjectExpression { properties } => {
            for (_, value) in properties {
                walk(value, visit);
            }
        }
        NodeKind::BinaryExpression { left, right, .. }
        | NodeKind::LogicalExpression { left, right, .. } => {
            walk(left, visit);
            walk(right, visit);
        }
        NodeKind::AssignmentExpression { target, value, .. } => {
            walk(target, visit);
            walk(value, visit);
        }
        NodeKind::ConditionalExpression {
            test,
            consequent,
            alternate,
        } => {
            walk(test, visit);
            walk(consequent, visit);
            walk(alternate, visit);
        }
        NodeKind::CallExpression { callee, arguments } => {
            walk(callee, visit);
            for arg in arguments {
                walk(arg, visit);
            }
        }
        NodeKind::MemberExpression { object, property } => {
            walk(object, visit);
            if let MemberProperty::Computed(prop) = property {
                walk(prop, visit);
            }
        }
        NodeKind::BreakStatement
        | NodeKind::ContinueStatement
        | NodeKind::EmptyStatement
        | NodeKind::Literal(_)
        | NodeKind::Identifier { .. } => {}
    }
}

/// Names the program binds, in order of first appearance
///
/// Covers declarations, function names, parameters, and plain identifiers
/// assigned without a declaration (which become globals).
pub fn declared_names(program: &NodeRef) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    };

    walk(program, &mut |node| match &node.kind {
        NodeKind::VariableDeclaration { declarations, .. } => {
            for decl in declarations {
                push(&decl.name);
            }
        }
        NodeKind::FunctionDeclaration(def) | NodeKind::FunctionExpression(def) => {
            if let (Some(name), false) = (&def.name, def.is_arrow) {
                push(name);
            }
            for param in &def.params {
                push(param);
            }
        }
        NodeKind::AssignmentExpression { target, .. }
        | NodeKind::UpdateExpression {
            argument: target, ..
        } => {
            if let NodeKind::Identifier { name } = &target.kind {
                push(name);
            }
        }
        _ => {}
    });

    names
}
