//! Scope resolution over a stack snapshot

use crate::interp::{ExecutionFrame, Value};

/// A binding located on the stack
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub value: Value,
    /// `"Global"` for the bottom frame, `"Local-<depth>"` otherwise
    pub scope_label: String,
}

/// Label for the frame at `index` in a stack of `len` frames
pub fn scope_label(index: usize, len: usize) -> String {
    if index == 0 {
        "Global".to_string()
    } else {
        format!("Local-{}", len - 1 - index)
    }
}

/// Find `name` on the stack, innermost frame first
///
/// Each frame's own scope bindings are consulted; the first value that is
/// not `undefined` wins and outer frames are never looked at after a hit.
pub fn find(stack: &[ExecutionFrame], name: &str) -> Option<Resolved> {
    let len = stack.len();
    for (index, frame) in stack.iter().enumerate().rev() {
        let Some(scope) = &frame.scope else {
            continue;
        };
        match scope.get_own(name) {
            Some(value) if !value.is_undefined() => {
                let scope_label = scope_label(index, len);
                tracing::trace!(name, scope = %scope_label, "Resolved binding");
                return Some(Resolved { value, scope_label });
            }
            _ => continue,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::{Node, NodeKind, Scope};
    use std::rc::Rc;

    fn frame(scope: Option<Rc<Scope>>) -> ExecutionFrame {
        ExecutionFrame {
            node: Node::new(0, 0, NodeKind::EmptyStatement),
            scope,
            function: None,
        }
    }

    /// global <- local1 <- local0, one frame per scope
    fn three_frames() -> (Vec<ExecutionFrame>, [Rc<Scope>; 3]) {
        let global = Scope::global();
        let outer = Scope::function(&global);
        let inner = Scope::block(&outer);
        let stack = vec![
            frame(Some(global.clone())),
            frame(Some(outer.clone())),
            frame(Some(inner.clone())),
        ];
        (stack, [global, outer, inner])
    }

    #[test]
    fn test_labels_each_frame() {
        let (stack, [global, outer, inner]) = three_frames();
        global.declare("g", Value::from(1.0), false);
        outer.declare("o", Value::from(2.0), false);
        inner.declare("i", Value::from(3.0), false);

        let g = find(&stack, "g").unwrap();
        assert_eq!(g.value, Value::from(1.0));
        assert_eq!(g.scope_label, "Global");

        assert_eq!(find(&stack, "o").unwrap().scope_label, "Local-1");
        assert_eq!(find(&stack, "i").unwrap().scope_label, "Local-0");
    }

    #[test]
    fn test_innermost_binding_shadows() {
        let (stack, [global, _, inner]) = three_frames();
        global.declare("x", Value::from(1.0), false);
        inner.declare("x", Value::from(2.0), false);

        let found = find(&stack, "x").unwrap();
        assert_eq!(found.value, Value::from(2.0));
        assert_eq!(found.scope_label, "Local-0");
    }

    #[test]
    fn test_undefined_binding_is_skipped() {
        let (stack, [global, _, inner]) = three_frames();
        global.declare("x", Value::from(1.0), false);
        inner.declare("x", Value::Undefined, false);

        assert_eq!(find(&stack, "x").unwrap().scope_label, "Global");
    }

    #[test]
    fn test_frames_without_scope_are_skipped() {
        let global = Scope::global();
        global.declare("x", Value::from(5.0), false);
        let stack = vec![frame(Some(global)), frame(None)];
        assert_eq!(find(&stack, "x").unwrap().value, Value::from(5.0));
    }

    #[test]
    fn test_missing_name_is_none() {
        let (stack, _) = three_frames();
        assert!(find(&stack, "nope").is_none());
        assert!(find(&[], "nope").is_none());
    }
}
