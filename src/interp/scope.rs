//! Lexical binding environments

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use super::value::Value;
use super::RuntimeError;

#[derive(Debug, Clone)]
struct Binding {
    value: Value,
    constant: bool,
}

/// A binding environment chained to its enclosing scope
#[derive(Debug)]
pub struct Scope {
    bindings: RefCell<BTreeMap<String, Binding>>,
    parent: Option<Rc<Scope>>,
    /// Function and global scopes receive `var` declarations
    function_scope: bool,
}

impl Scope {
    pub fn global() -> Rc<Self> {
        Rc::new(Self {
            bindings: RefCell::new(BTreeMap::new()),
            parent: None,
            function_scope: true,
        })
    }

    pub fn function(parent: &Rc<Scope>) -> Rc<Self> {
        Rc::new(Self {
            bindings: RefCell::new(BTreeMap::new()),
            parent: Some(parent.clone()),
            function_scope: true,
        })
    }

    pub fn block(parent: &Rc<Scope>) -> Rc<Self> {
        Rc::new(Self {
            bindings: RefCell::new(BTreeMap::new()),
            parent: Some(parent.clone()),
            function_scope: false,
        })
    }

    pub fn parent(&self) -> Option<&Rc<Scope>> {
        self.parent.as_ref()
    }

    pub fn is_global(&self) -> bool {
        self.parent.is_none()
    }

    /// Own-binding lookup; does not consult parent scopes
    pub fn get_own(&self, name: &str) -> Option<Value> {
        self.bindings.borrow().get(name).map(|b| b.value.clone())
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }

    /// Names bound directly in this scope
    pub fn own_names(&self) -> Vec<String> {
        self.bindings.borrow().keys().cloned().collect()
    }

    /// Chain lookup, innermost first
    pub fn lookup(&self, name: &str) -> Option<Value> {
        match self.get_own(name) {
            Some(value) => Some(value),
            None => self.parent.as_ref().and_then(|p| p.lookup(name)),
        }
    }

    /// Create or overwrite a binding in this scope
    pub fn declare(&self, name: &str, value: Value, constant: bool) {
        self.bindings
            .borrow_mut()
            .insert(name.to_string(), Binding { value, constant });
    }

    /// Nearest enclosing function (or global) scope
    pub fn function_scope(self: &Rc<Self>) -> Rc<Scope> {
        let mut scope = self.clone();
        while !scope.function_scope {
            match scope.parent.clone() {
                Some(parent) => scope = parent,
                None => break,
            }
        }
        scope
    }

    /// The outermost scope of the chain
    pub fn root(self: &Rc<Self>) -> Rc<Scope> {
        let mut scope = self.clone();
        while let Some(parent) = scope.parent.clone() {
            scope = parent;
        }
        scope
    }

    /// Assign to an existing binding anywhere in the chain
    ///
    /// Returns `Ok(false)` when no scope binds `name`.
    pub fn assign(&self, name: &str, value: Value) -> Result<bool, RuntimeError> {
        {
            let mut bindings = self.bindings.borrow_mut();
            if let Some(binding) = bindings.get_mut(name) {
                if binding.constant {
                    return Err(RuntimeError::type_error(format!(
                        "Assignment to constant variable '{name}'"
                    )));
                }
                binding.value = value;
                return Ok(true);
            }
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => Ok(false),
        }
    }
}
