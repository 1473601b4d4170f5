//! `view()` breakpoint detection and argument extraction
//!
//! A view call looks like `view([["x", "X value"], ["y", "Y"]])`: the
//! callee is the bare identifier `view` and the first argument is an array
//! of `[name, label]` literal pairs.

use serde::Serialize;

use crate::interp::ast::walk;
use crate::interp::{ExecutionFrame, Node, NodeKind, NodeRef};

/// Callee name that marks a breakpoint
pub const VIEW_FUNCTION: &str = "view";

/// One `[name, label]` pair from a view call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewPair {
    pub name: String,
    pub label: String,
}

impl ViewPair {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
        }
    }
}

/// A view call found by scanning the program text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewDeclaration {
    pub start: usize,
    pub end: usize,
    /// 1-based source line of the call
    pub line: usize,
    pub pairs: Vec<ViewPair>,
}

/// Whether `node` is a call to `view`
pub fn is_view_call(node: &Node) -> bool {
    matches!(
        &node.kind,
        NodeKind::CallExpression { callee, .. }
            if matches!(&callee.kind, NodeKind::Identifier { name } if name == VIEW_FUNCTION)
    )
}

/// True exactly when the top frame is evaluating a `view` call
pub fn is_at_breakpoint(stack: &[ExecutionFrame]) -> bool {
    stack.last().is_some_and(|frame| is_view_call(&frame.node))
}

fn literal_text(node: &Node) -> Option<String> {
    match &node.kind {
        NodeKind::Literal(lit) => Some(lit.to_text()),
        _ => None,
    }
}

/// Ordered `(name, label)` pairs of a view call
///
/// Elements that are not arrays of at least two literals are skipped.
/// Anything other than a view call with an array first argument yields an
/// empty list.
pub fn extract_view_pairs(node: &Node) -> Vec<ViewPair> {
    if !is_view_call(node) {
        return Vec::new();
    }
    let NodeKind::CallExpression { arguments, .. } = &node.kind else {
        return Vec::new();
    };
    let Some(NodeKind::ArrayExpression { elements }) = arguments.first().map(|a| &a.kind) else {
        tracing::debug!("view() called without an array argument");
        return Vec::new();
    };

    let mut pairs = Vec::with_capacity(elements.len());
    for (i, element) in elements.iter().enumerate() {
        let pair = match &element.kind {
            NodeKind::ArrayExpression { elements } if elements.len() >= 2 => {
                literal_text(&elements[0]).zip(literal_text(&elements[1]))
            }
            _ => None,
        };
        match pair {
            Some((name, label)) => pairs.push(ViewPair { name, label }),
            None => tracing::debug!(index = i, kind = element.type_name(), "Skipping malformed view pair"),
        }
    }
    pairs
}

/// Names of the pairs in order, as handed to the variable collector
pub fn pair_names(pairs: &[ViewPair]) -> Vec<String> {
    pairs.iter().map(|p| p.name.clone()).collect()
}

/// Statically list every view call in `program`
pub fn scan_views(program: &NodeRef, source: &str) -> Vec<ViewDeclaration> {
    let mut views = Vec::new();
    walk(program, &mut |node| {
        if is_view_call(node) {
            let line = source
                .get(..node.start)
                .map(|prefix| prefix.matches('\n').count() + 1)
                .unwrap_or(1);
            views.push(ViewDeclaration {
                start: node.start,
                end: node.end,
                line,
                pairs: extract_view_pairs(node),
            });
        }
    });
    views
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::parse_program;

    /// The expression of the first statement of `src`
    fn first_expression(src: &str) -> NodeRef {
        let program = parse_program(src).unwrap();
        let NodeKind::Program { body } = &program.kind else {
            unreachable!()
        };
        match &body[0].kind {
            NodeKind::ExpressionStatement { expression } => expression.clone(),
            other => panic!("not an expression statement: {other:?}"),
        }
    }

    #[test]
    fn test_extracts_pairs_in_order() {
        let call = first_expression(r#"view([["x", "X"], ["y", "Y"]]);"#);
        assert!(is_view_call(&call));
        assert_eq!(
            extract_view_pairs(&call),
            vec![ViewPair::new("x", "X"), ViewPair::new("y", "Y")]
        );
    }

    #[test]
    fn test_short_pair_is_skipped() {
        let call = first_expression(r#"view([["x"]]);"#);
        assert!(extract_view_pairs(&call).is_empty());
    }

    #[test]
    fn test_malformed_pairs_skipped_individually() {
        let call = first_expression(r#"view([["a", "A"], [b, "B"], "c", ["d", 4, "extra"]]);"#);
        assert_eq!(
            extract_view_pairs(&call),
            vec![ViewPair::new("a", "A"), ViewPair::new("d", "4")]
        );
    }

    #[test]
    fn test_non_array_argument_yields_nothing() {
        let call = first_expression("view(x);");
        assert!(is_view_call(&call));
        assert!(extract_view_pairs(&call).is_empty());
        assert!(extract_view_pairs(&first_expression("view();")).is_empty());
    }

    #[test]
    fn test_other_callees_are_not_views() {
        assert!(!is_view_call(&first_expression(r#"show([["x", "X"]]);"#)));
        assert!(!is_view_call(&first_expression(r#"lib.view([["x", "X"]]);"#)));
    }

    #[test]
    fn test_scan_views_finds_nested_calls() {
        let src = "let x = 1;\nview([[\"x\", \"X\"]]);\nfunction f() {\n  view([[\"y\", \"Y\"]]);\n}\n";
        let program = parse_program(src).unwrap();
        let views = scan_views(&program, src);
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].line, 2);
        assert_eq!(views[0].pairs, vec![ViewPair::new("x", "X")]);
        assert_eq!(views[1].line, 4);
        assert_eq!(&src[views[1].start..views[1].end], "view([[\"y\", \"Y\"]])");
    }
}
